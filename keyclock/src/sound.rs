//! Audio cues on a PWM-driven buzzer.

use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};
use log::{debug, info};
use keyclock_gpio::GpioResult;
use keyclock_gpio::pwm::PwmPin;
use crate::feedback::{SoundKind, SoundPlayer};

/// A single step of a cue: a square wave of the given frequency, or silence.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tone {
    pub frequency_hz: Option<f64>,
    pub duration: Duration,
}

impl Tone {
    pub const fn note(frequency_hz: f64, millis: u64) -> Self {
        Tone { frequency_hz: Some(frequency_hz), duration: Duration::from_millis(millis) }
    }

    pub const fn pause(millis: u64) -> Self {
        Tone { frequency_hz: None, duration: Duration::from_millis(millis) }
    }
}

const NORMAL_CUE: [Tone; 1] = [Tone::note(2000.0, 80)];
const SUCCESS_CUE: [Tone; 3] = [Tone::note(1500.0, 100), Tone::pause(40), Tone::note(2500.0, 150)];
const ERROR_CUE: [Tone; 3] = [Tone::note(400.0, 200), Tone::pause(60), Tone::note(400.0, 200)];

/// Gets the tones played for `kind`.
pub fn cue(kind: SoundKind) -> &'static [Tone] {
    match kind {
        SoundKind::Normal => &NORMAL_CUE,
        SoundKind::Success => &SUCCESS_CUE,
        SoundKind::Error => &ERROR_CUE,
    }
}

/// Finds the tone playing `elapsed` into `tones`, with its index.
fn tone_at(tones: &[Tone], elapsed: Duration) -> Option<(usize, Tone)> {
    let mut end = Duration::ZERO;
    for (index, tone) in tones.iter().enumerate() {
        end += tone.duration;
        if elapsed < end {
            return Some((index, *tone));
        }
    }
    None
}

#[derive(Debug)]
struct Playback {
    kind: SoundKind,
    tones: &'static [Tone],
    /// Set by the first update after the cue was started.
    started: Option<Instant>,
    /// Index of the tone the PWM channel is currently set to.
    applied: Option<usize>,
}

/// Plays cues on a PWM channel, advanced by [SoundPlayer::update].
pub struct BuzzerSounds<'a> {
    pwm: &'a mut dyn PwmPin,
    playback: Option<Playback>,
}

impl<'a> BuzzerSounds<'a> {
    pub fn new(pwm: &'a mut dyn PwmPin) -> Self {
        BuzzerSounds { pwm, playback: None }
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }
}

impl Debug for BuzzerSounds<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuzzerSounds({:?}, playing {:?})", self.pwm, self.playback.as_ref().map(|p| p.kind))
    }
}

impl SoundPlayer for BuzzerSounds<'_> {
    fn play(&mut self, kind: SoundKind) -> GpioResult<()> {
        if let Some(playback) = &self.playback {
            debug!("Replacing {:?} sound with {:?}.", playback.kind, kind);
        }
        self.playback = Some(Playback {
            kind,
            tones: cue(kind),
            started: None,
            applied: None,
        });
        Ok(())
    }

    /// Sets the PWM channel to the tone due at `now`.
    ///
    /// Disables the channel during pauses and once the cue is over.
    fn update(&mut self, now: Instant) -> GpioResult<()> {
        let Some(playback) = &mut self.playback else {
            return Ok(());
        };
        let started = *playback.started.get_or_insert(now);

        match tone_at(playback.tones, now.saturating_duration_since(started)) {
            Some((index, _)) if playback.applied == Some(index) => {}
            Some((index, tone)) => {
                match tone.frequency_hz {
                    Some(frequency) => self.pwm.play_square_wave(frequency)?,
                    None => self.pwm.disable()?,
                }
                playback.applied = Some(index);
            }
            None => {
                self.playback = None;
                self.pwm.disable()?;
                debug!("Audio playback finished.");
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> GpioResult<()> {
        if self.is_playing() {
            debug!("Cutting off {:?} sound.", self.playback.as_ref().map(|p| p.kind));
        }
        self.playback = None;
        self.pwm.disable()
    }
}

/// Stand-in when no buzzer is configured.
#[derive(Debug, Default)]
pub struct SilentSounds;

impl SoundPlayer for SilentSounds {
    fn play(&mut self, kind: SoundKind) -> GpioResult<()> {
        info!("(silent) {:?} sound.", kind);
        Ok(())
    }
}
