//! Press tracking for the keypad matrix.
//!
//! There is no timed filtering here: a key press is registered on the transition
//! from "nothing pressed" to "exactly one key pressed" between two consecutive
//! scans, and held keys are not registered again until everything is released.

mod edge;
mod state;

pub use edge::*;
pub use state::*;
