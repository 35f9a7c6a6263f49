//! PWM channels exposed by the kernel under `/sys/class/pwm`.

use crate::pwm::PwmPin;
use crate::{GpioError, GpioResult};
use log::warn;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SYSFS_PWM_ROOT: &str = "/sys/class/pwm";

/// A PWM chip, e.g. `/sys/class/pwm/pwmchip0`.
pub struct SysfsPwmChip {
    base_path: PathBuf,
}

impl SysfsPwmChip {
    /// Opens `pwmchip{index}`.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the chip does not exist.
    pub fn open(index: usize) -> GpioResult<Self> {
        Self::open_at(Path::new(SYSFS_PWM_ROOT).join(format!("pwmchip{}", index)))
    }

    /// Opens a chip directory at an explicit path.
    pub fn open_at(base_path: impl Into<PathBuf>) -> GpioResult<Self> {
        let base_path = base_path.into();
        if !base_path.is_dir() {
            return Err(GpioError::InvalidArgument);
        }
        Ok(SysfsPwmChip { base_path })
    }

    /// Gets the amount of channels on this chip.
    pub fn count(&self) -> GpioResult<usize> {
        let content = std::fs::read_to_string(self.base_path.join("npwm"))?;
        content
            .trim()
            .parse()
            .map_err(|_| GpioError::Other("parsing PWM channel count failed".to_string()))
    }

    /// Exports `channel`, making it available as a [SysfsPwmPin].
    ///
    /// The channel is unexported again when the pin is dropped.
    pub fn export(&self, channel: usize) -> GpioResult<SysfsPwmPin> {
        if channel >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        let path = self.base_path.join(format!("pwm{}", channel));
        if !path.exists() {
            std::fs::write(self.base_path.join("export"), channel.to_string())?;
        }
        if !path.exists() {
            return Err(GpioError::Other(format!("exporting PWM channel {} failed", channel)));
        }

        Ok(SysfsPwmPin {
            chip_path: self.base_path.clone(),
            base_path: path,
            channel,
        })
    }
}

impl Debug for SysfsPwmChip {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SysfsPwmChip({:?})", self.base_path)
    }
}

pub struct SysfsPwmPin {
    chip_path: PathBuf,
    base_path: PathBuf,
    channel: usize,
}

impl SysfsPwmPin {
    fn read_ns(&self, attribute: &str) -> GpioResult<Duration> {
        let content = std::fs::read_to_string(self.base_path.join(attribute))?;
        let ns: u64 = content
            .trim()
            .parse()
            .map_err(|_| GpioError::Other(format!("parsing PWM {} failed", attribute)))?;
        Ok(Duration::from_nanos(ns))
    }

    fn write_ns(&self, attribute: &str, value: Duration) -> GpioResult<()> {
        std::fs::write(self.base_path.join(attribute), value.as_nanos().to_string())?;
        Ok(())
    }
}

impl Debug for SysfsPwmPin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SysfsPwmPin({:?})", self.base_path)
    }
}

impl PwmPin for SysfsPwmPin {
    fn period(&self) -> GpioResult<Duration> {
        self.read_ns("period")
    }

    fn set_period(&mut self, period: Duration) -> GpioResult<()> {
        self.write_ns("period", period)
    }

    fn duty(&self) -> GpioResult<Duration> {
        self.read_ns("duty_cycle")
    }

    fn set_duty(&mut self, duty: Duration) -> GpioResult<()> {
        self.write_ns("duty_cycle", duty)
    }

    fn is_enabled(&self) -> GpioResult<bool> {
        let content = std::fs::read_to_string(self.base_path.join("enable"))?;
        match content.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            _ => Err(GpioError::Other("parsing PWM enabled state failed".to_string())),
        }
    }

    fn enable(&mut self) -> GpioResult<()> {
        std::fs::write(self.base_path.join("enable"), "1")?;
        Ok(())
    }

    fn disable(&mut self) -> GpioResult<()> {
        std::fs::write(self.base_path.join("enable"), "0")?;
        Ok(())
    }
}

impl Drop for SysfsPwmPin {
    fn drop(&mut self) {
        if let Err(e) = self.disable() {
            warn!("Failed to disable {:?}: {}", self, e);
        }
        if let Err(e) = std::fs::write(self.chip_path.join("unexport"), self.channel.to_string()) {
            warn!("Failed to unexport {:?}: {}", self, e);
        }
    }
}
