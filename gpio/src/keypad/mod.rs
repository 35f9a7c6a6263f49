mod grid;
mod matrix;

use std::fmt::Debug;
use crate::GpioResult;
pub use grid::*;
pub use matrix::*;

/// Outcome of one full scan of a keypad.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScanResult<K> {
    /// No key is pressed.
    NoKey,
    /// Exactly one key is pressed.
    Single(K),
    /// More than one key is pressed at the same time. Never treated as input.
    Ambiguous,
}

impl<K> ScanResult<K> {
    /// Whether at least one key was found pressed, ambiguous or not.
    pub fn any_pressed(&self) -> bool {
        !matches!(self, ScanResult::NoKey)
    }
}

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    type Key;

    /// Scans every key once and reports what is pressed right now.
    fn scan(&mut self) -> GpioResult<ScanResult<Self::Key>>;
}
