//! GPIO driver backed by the Linux GPIO character device, through the gpiod crate.
//!
//! Every line is requested with the pin's active level, bias and drive mode, so
//! the keypad logic only ever sees logical "active"/"inactive" values.

use crate::{
    GpioActiveLevel, GpioBias, GpioDriveMode, GpioDriver, GpioError, GpioInput, GpioOutput,
    GpioPin, GpioResult,
};
use bitvec::vec::BitVec;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::AtomicU8;

const CONSUMER: &str = env!("CARGO_PKG_NAME");

/// A GPIO chip such as `/dev/gpiochip0`, handing out each line at most once.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    claimed: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let lines = chip.num_lines() as usize;
        GpiodDriver {
            chip,
            claimed: BitVec::repeat(false, lines),
        }
    }

    /// Opens the chip at `path`, e.g. `/dev/gpiochip0`, or by name, e.g. `gpiochip0`.
    pub fn open(path: &str) -> GpioResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path)?))
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.claimed.len())
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        match self.claimed.get(index).map(|bit| *bit) {
            None => return Err(GpioError::InvalidArgument),
            Some(true) => return Err(GpioError::AlreadyInUse),
            Some(false) => {}
        }
        self.claimed.set_aliased(index, true);

        Ok(Box::new(GpiodPin {
            driver: self,
            line: index as u32,
            settings: LineSettings::default(),
        }))
    }
}

/// How a line is requested from the kernel.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct LineSettings {
    active_level: GpioActiveLevel,
    bias: GpioBias,
    drive_mode: GpioDriveMode,
}

fn active(level: GpioActiveLevel) -> gpiod::Active {
    match level {
        GpioActiveLevel::High => gpiod::Active::High,
        GpioActiveLevel::Low => gpiod::Active::Low,
    }
}

fn bias(bias: GpioBias) -> gpiod::Bias {
    match bias {
        GpioBias::None => gpiod::Bias::Disable,
        GpioBias::PullUp => gpiod::Bias::PullUp,
        GpioBias::PullDown => gpiod::Bias::PullDown,
    }
}

fn drive(mode: GpioDriveMode) -> gpiod::Drive {
    match mode {
        GpioDriveMode::PushPull => gpiod::Drive::PushPull,
        GpioDriveMode::OpenDrain => gpiod::Drive::OpenDrain,
        GpioDriveMode::OpenSource => gpiod::Drive::OpenSource,
    }
}

struct GpiodPin<'a> {
    driver: &'a GpiodDriver,
    line: u32,
    settings: LineSettings,
}

impl Debug for GpiodPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.line)
    }
}

impl GpioPin for GpiodPin<'_> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        let settings = self.settings;
        let lines = self.driver.chip.request_lines(
            gpiod::Options::input([self.line])
                .consumer(CONSUMER)
                .active(active(settings.active_level))
                .bias(bias(settings.bias)),
        )?;
        Ok(Box::new(GpiodInput { pin: self, lines }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        let settings = self.settings;
        let lines = self.driver.chip.request_lines(
            gpiod::Options::output([self.line])
                .consumer(CONSUMER)
                .active(active(settings.active_level))
                .bias(bias(settings.bias))
                .drive(drive(settings.drive_mode)),
        )?;
        Ok(Box::new(GpiodOutput { pin: self, lines }))
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.settings.active_level = level;
        Ok(())
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.settings.bias = bias;
        Ok(())
    }

    fn set_drive_mode(&mut self, mode: GpioDriveMode) -> GpioResult<()> {
        self.settings.drive_mode = mode;
        Ok(())
    }
}

impl Drop for GpiodPin<'_> {
    fn drop(&mut self) {
        self.driver.claimed.set_aliased(self.line as usize, false);
    }
}

struct GpiodInput<'a> {
    pin: &'a GpiodPin<'a>,
    lines: gpiod::Lines<gpiod::Input>,
}

impl Debug for GpiodInput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.pin)
    }
}

impl GpioInput for GpiodInput<'_> {
    fn read(&self) -> GpioResult<bool> {
        let [value] = self.lines.get_values([false])?;
        Ok(value)
    }
}

struct GpiodOutput<'a> {
    pin: &'a GpiodPin<'a>,
    lines: gpiod::Lines<gpiod::Output>,
}

impl Debug for GpiodOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for GpiodOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.lines.set_values([value])?;
        Ok(())
    }
}
