use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};
use log::debug;
use keyclock_gpio::{GpioOutput, GpioResult};
use crate::feedback::{LedColor, StatusLed};

/// A common RGB LED on three GPIO outputs that switches itself off after a while.
pub struct RgbLed<'a> {
    red: &'a dyn GpioOutput,
    green: &'a dyn GpioOutput,
    blue: &'a dyn GpioOutput,
    stays_on_for: Duration,
    color: LedColor,
    /// Set by the first [RgbLed::update] after the LED was lit.
    lit_since: Option<Instant>,
}

impl<'a> RgbLed<'a> {
    pub fn new(
        red: &'a dyn GpioOutput,
        green: &'a dyn GpioOutput,
        blue: &'a dyn GpioOutput,
        stays_on_for: Duration,
    ) -> GpioResult<Self> {
        let mut led = RgbLed {
            red,
            green,
            blue,
            stays_on_for,
            color: LedColor::default(),
            lit_since: None,
        };
        led.clear()?;
        Ok(led)
    }

    fn clear(&mut self) -> GpioResult<()> {
        self.red.write(false)?;
        self.green.write(false)?;
        self.blue.write(false)?;
        self.color = LedColor::default();
        self.lit_since = None;
        Ok(())
    }
}

impl Debug for RgbLed<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RgbLed({:?}, stays on for {:?})", self.color, self.stays_on_for)
    }
}

impl StatusLed for RgbLed<'_> {
    fn turn_on(&mut self, color: LedColor) -> GpioResult<()> {
        self.clear()?;
        self.red.write(color.red)?;
        self.green.write(color.green)?;
        self.blue.write(color.blue)?;
        self.color = color;
        Ok(())
    }

    fn turn_off(&mut self) -> GpioResult<()> {
        self.clear()
    }

    fn update(&mut self, now: Instant) -> GpioResult<()> {
        if self.color.is_off() {
            return Ok(());
        }
        match self.lit_since {
            None => self.lit_since = Some(now),
            Some(since) if now.saturating_duration_since(since) >= self.stays_on_for => {
                debug!("LED was on for {:?}, turning it off.", self.stays_on_for);
                self.clear()?;
            }
            Some(_) => {}
        }
        Ok(())
    }
}
