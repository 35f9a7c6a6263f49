//! GPIO plumbing for the keyclock terminal: line traits, the gpiod backend, an
//! in-memory keypad for tests, matrix keypad scanning, press tracking and PWM.

pub mod gpiod;
pub mod debounce;
pub mod pwm;
pub mod keypad;
pub mod sim;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO lines available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the GPIO line at `index`. It is released when the pin is dropped.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if there is no such line.
    /// - `GpioError::AlreadyInUse` if the line is already claimed.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>>;
}

/// Which electrical level counts as "active".
///
/// Keypad rows and columns are usually wired active-low: a row is strobed by
/// pulling it low, and a pressed key pulls its column low against the pull-up.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

/// Pull resistor configuration of an input.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

/// Output stage configuration. Ignored for inputs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDriveMode {
    /// Driven high or low with low impedance.
    #[default] PushPull,
    /// Driven low, floating when high.
    OpenDrain,
    /// Driven high, floating when low.
    OpenSource,
}

/// A claimed GPIO line, configured before it is turned into an input or output.
pub trait GpioPin: Debug {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>>;
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>>;

    /// # Errors
    /// - `GpioError::NotSupported` if the backend has no notion of active level.
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    /// # Errors
    /// - `GpioError::NotSupported` if the backend cannot configure bias.
    fn set_bias(&mut self, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    /// # Errors
    /// - `GpioError::NotSupported` if the backend cannot configure the drive mode.
    fn set_drive_mode(&mut self, _mode: GpioDriveMode) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

pub trait GpioInput: Debug {
    /// Reads the logical state of the line, `true` meaning active.
    fn read(&self) -> GpioResult<bool>;
}

pub trait GpioOutput: Debug {
    /// Drives the line to the logical state `value`, `true` meaning active.
    fn write(&self, value: bool) -> GpioResult<()>;
}
