mod sysfs;

use crate::GpioResult;
use std::fmt::Debug;
use std::time::Duration;
pub use sysfs::*;

/// A single PWM output channel.
pub trait PwmPin: Debug {
    /// Gets the period of the output signal.
    fn period(&self) -> GpioResult<Duration>;
    /// Sets the period of the output signal.
    ///
    /// Some backends refuse a period shorter than the current duty cycle, so
    /// lower the duty cycle first when shortening the period.
    fn set_period(&mut self, period: Duration) -> GpioResult<()>;

    /// Gets how long the signal stays high within each period.
    fn duty(&self) -> GpioResult<Duration>;
    /// Sets how long the signal stays high within each period.
    fn set_duty(&mut self, duty: Duration) -> GpioResult<()>;

    fn is_enabled(&self) -> GpioResult<bool>;
    fn enable(&mut self) -> GpioResult<()>;
    fn disable(&mut self) -> GpioResult<()>;
}

impl dyn PwmPin + '_ {
    /// Outputs a square wave of `frequency_hz` with a 50% duty cycle and enables
    /// the channel.
    pub fn play_square_wave(&mut self, frequency_hz: f64) -> GpioResult<()> {
        if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
            return Err(crate::GpioError::InvalidArgument);
        }
        let period = Duration::from_secs_f64(frequency_hz.recip());
        self.set_duty(Duration::ZERO)?;
        self.set_period(period)?;
        self.set_duty(period / 2)?;
        self.enable()
    }
}
