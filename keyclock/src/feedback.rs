//! Turning PIN outcomes into light and sound.

use std::fmt::Debug;
use std::time::Instant;
use log::{debug, warn};
use keyclock_gpio::GpioResult;
use crate::session::PinOutcome;

/// Which channels of the RGB status LED are lit.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LedColor {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl LedColor {
    pub const RED: LedColor = LedColor { red: true, green: false, blue: false };
    pub const GREEN: LedColor = LedColor { red: false, green: true, blue: false };
    /// Red and green together.
    pub const YELLOW: LedColor = LedColor { red: true, green: true, blue: false };

    pub fn is_off(&self) -> bool {
        !(self.red || self.green || self.blue)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SoundKind {
    /// A key was registered.
    Normal,
    /// Access granted.
    Success,
    /// Access denied, or input timed out.
    Error,
}

pub trait StatusLed: Debug {
    fn turn_on(&mut self, color: LedColor) -> GpioResult<()>;
    fn turn_off(&mut self) -> GpioResult<()>;

    /// Advances any time-based behaviour, like switching off after a while.
    fn update(&mut self, _now: Instant) -> GpioResult<()> {
        Ok(())
    }
}

pub trait SoundPlayer: Debug {
    /// Starts playing the cue for `kind`, replacing whatever was playing.
    fn play(&mut self, kind: SoundKind) -> GpioResult<()>;

    /// Advances playback.
    fn update(&mut self, _now: Instant) -> GpioResult<()> {
        Ok(())
    }

    /// Cuts off whatever is playing and silences the output.
    fn stop(&mut self) -> GpioResult<()> {
        Ok(())
    }
}

/// Maps each [PinOutcome] to an LED state and a sound.
///
/// Fire-and-forget: failures of the LED or the buzzer are logged and never
/// reach the input loop.
#[derive(Debug)]
pub struct FeedbackDispatcher<'a> {
    led: &'a mut dyn StatusLed,
    sound: &'a mut dyn SoundPlayer,
}

impl<'a> FeedbackDispatcher<'a> {
    pub fn new(led: &'a mut dyn StatusLed, sound: &'a mut dyn SoundPlayer) -> Self {
        FeedbackDispatcher { led, sound }
    }

    pub fn dispatch(&mut self, outcome: &PinOutcome) {
        let (color, kind) = match outcome {
            PinOutcome::KeyAccepted { .. } => (None, SoundKind::Normal),
            PinOutcome::Granted(_) => (Some(LedColor::GREEN), SoundKind::Success),
            PinOutcome::Denied => (Some(LedColor::RED), SoundKind::Error),
            PinOutcome::TimedOut => (Some(LedColor::YELLOW), SoundKind::Error),
        };
        debug!("Feedback for {:?}: LED {:?}, sound {:?}.", outcome, color, kind);

        let led_result = match color {
            Some(color) => self.led.turn_on(color),
            None => self.led.turn_off(),
        };
        if let Err(e) = led_result {
            warn!("Failed to set status LED: {}", e);
        }
        if let Err(e) = self.sound.play(kind) {
            warn!("Failed to play {:?} sound: {}", kind, e);
        }
    }

    /// Switches the LED off and silences the buzzer, for shutdown.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.led.turn_off() {
            warn!("Failed to turn off status LED: {}", e);
        }
        if let Err(e) = self.sound.stop() {
            warn!("Failed to stop audio: {}", e);
        }
    }

    /// Pumps the collaborators' own timers.
    pub fn update(&mut self, now: Instant) {
        if let Err(e) = self.led.update(now) {
            warn!("Failed to update status LED: {}", e);
        }
        if let Err(e) = self.sound.update(now) {
            warn!("Failed to update audio: {}", e);
        }
    }
}
