//! The module for the main input loop.

use std::time::{Duration, Instant};
use log::{debug, info, warn};
use keyclock_gpio::debounce::PressEdge;
use keyclock_gpio::keypad::Keypad;
use crate::config::KeypadSettings;
use crate::credentials::{CredentialStore, CredentialValidator};
use crate::feedback::FeedbackDispatcher;
use crate::session::{PinInputSession, PinOutcome};

/// Throttles keypad scans to one per `interval`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CadenceClock {
    interval: Duration,
    /// `None` until the first scan, so the first tick always scans.
    last_update: Option<Instant>,
}

impl CadenceClock {
    pub fn new(interval: Duration) -> Self {
        CadenceClock { interval, last_update: None }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.last_update
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_update = Some(now);
    }
}

/// The keypad input loop state.
pub struct App<'a> {
    /// The keypad scanned once per update interval.
    keypad: &'a mut dyn Keypad<Key = char>,
    /// Turns scans into single presses, one per key going down.
    edge: PressEdge,
    /// The PIN being entered and its timeout.
    session: PinInputSession,
    /// Checks full PINs against the credential store.
    validator: CredentialValidator<'a>,
    /// LED and buzzer.
    feedback: FeedbackDispatcher<'a>,
    /// When the keypad was last scanned.
    cadence: CadenceClock,
}

impl<'a> App<'a> {
    pub fn new(
        keypad: &'a mut dyn Keypad<Key = char>,
        store: &'a mut dyn CredentialStore,
        feedback: FeedbackDispatcher<'a>,
        settings: &KeypadSettings,
    ) -> App<'a> {
        App {
            keypad,
            edge: PressEdge::new(),
            session: PinInputSession::new(settings.max_pin_length, settings.keypress_timeout),
            validator: CredentialValidator::new(store, settings.max_pin_length),
            feedback,
            cadence: CadenceClock::new(settings.update_interval),
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &PinInputSession {
        &self.session
    }

    /// Runs one tick of the input loop at `now`. Never blocks.
    ///
    /// The LED and buzzer are advanced on every call. The keypad is scanned, and
    /// the timeout checked, only once per update interval. Returns what happened
    /// in this tick, after it was signalled to the user.
    pub fn update(&mut self, now: Instant) -> Option<PinOutcome> {
        self.feedback.update(now);

        if !self.cadence.is_due(now) {
            return None;
        }

        let before = self.session.state();
        let pressed = match self.keypad.scan() {
            Ok(scan) => self.edge.register(&scan),
            Err(e) => {
                warn!("Failed to scan keypad: {}", e);
                None
            }
        };
        let pressed = pressed.map(|key| self.session.on_edge_key_press(key, now, &mut self.validator));

        // A key pressed in this tick restarted the timer, so at most one of these is set.
        let timed_out = self.session.check_timeout(now);
        let outcome = pressed.or(timed_out);

        let after = self.session.state();
        if before != after {
            debug!("PIN entry {:?} -> {:?}, {} keys entered.", before, after, self.session.buffer().len());
        }

        self.cadence.mark(now);
        if let Some(outcome) = &outcome {
            self.feedback.dispatch(outcome);
        }
        outcome
    }

    /// Leaves the outputs dark and silent. Called once the loop has stopped.
    pub fn shutdown(&mut self) {
        info!("Shutting down, turning off LED and buzzer.");
        self.feedback.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use keyclock_gpio::{GpioInput, GpioOutput};
    use keyclock_gpio::keypad::{KeypadGrid, MatrixKeypad};
    use keyclock_gpio::sim::SimMatrix;
    use crate::config::Config;
    use crate::credentials::{CredentialError, UserId};
    use crate::feedback::{LedColor, SoundKind};
    use crate::feedback::tests::{Effect, Recorder};
    use crate::led::RgbLed;
    use crate::session::SessionState;
    use crate::sound::BuzzerSounds;
    use crate::sound::tests::FakePwm;
    use proptest::prelude::*;

    const TICK: Duration = Duration::from_millis(50);

    #[derive(Debug, Default)]
    struct SharedStore {
        lookups: Rc<RefCell<Vec<String>>>,
        broken: bool,
    }

    impl CredentialStore for SharedStore {
        fn lookup_user_id_by_pin(&mut self, pin: &str) -> Result<Option<UserId>, CredentialError> {
            self.lookups.borrow_mut().push(pin.to_string());
            if self.broken {
                return Err(std::io::Error::from(std::io::ErrorKind::NotFound).into());
            }
            Ok(match pin {
                "123A" => Some(UserId(1)),
                "ABCD" => Some(UserId(2)),
                "2580" => Some(UserId(3)),
                _ => None,
            })
        }
    }

    /// Handles to everything the app under test talks to.
    struct Handles {
        sim: SimMatrix,
        effects: Recorder,
        lookups: Rc<RefCell<Vec<String>>>,
        led_updates: Rc<RefCell<usize>>,
    }

    impl Handles {
        /// Presses `key` for one scan, then releases it for one scan.
        fn tap(&self, app: &mut App<'_>, key: char, now: &mut Instant) -> Option<PinOutcome> {
            let (row, column) = position(key);
            self.sim.press(row, column);
            *now += TICK;
            let outcome = app.update(*now);
            self.sim.release(row, column);
            *now += TICK;
            assert_eq!(app.update(*now), None);
            outcome
        }

        fn type_pin(&self, app: &mut App<'_>, pin: &str, now: &mut Instant) -> Vec<Option<PinOutcome>> {
            pin.chars().map(|key| self.tap(app, key, now)).collect()
        }
    }

    fn position(key: char) -> (usize, usize) {
        let grid = KeypadGrid::standard();
        (0..grid.rows())
            .flat_map(|row| (0..grid.columns()).map(move |column| (row, column)))
            .find(|&(row, column)| grid.label(row, column) == Some(key))
            .unwrap()
    }

    /// Builds an app on a simulated standard keypad and runs `f` with it.
    fn run<R>(broken_store: bool, f: impl FnOnce(&mut App<'_>, &Handles) -> R) -> R {
        let settings = Config::default().keypad_settings().unwrap();
        let sim = SimMatrix::new(4, 4);
        let rows: Vec<_> = (0..4).map(|r| sim.row_output(r)).collect();
        let columns: Vec<_> = (0..4).map(|c| sim.column_input(c)).collect();
        let mut keypad = MatrixKeypad::new(
            rows.iter().map(|r| r as &dyn GpioOutput).collect(),
            columns.iter().map(|c| c as &dyn GpioInput).collect(),
            settings.grid.clone(),
        ).unwrap();

        let mut store = SharedStore { broken: broken_store, ..Default::default() };
        let mut led = Recorder::default();
        let mut sound = Recorder { effects: led.effects.clone(), ..Default::default() };
        let handles = Handles {
            sim: sim.clone(),
            effects: led.clone(),
            lookups: store.lookups.clone(),
            led_updates: led.updates.clone(),
        };

        let mut app = App::new(
            &mut keypad,
            &mut store,
            FeedbackDispatcher::new(&mut led, &mut sound),
            &settings,
        );
        f(&mut app, &handles)
    }

    #[test]
    fn key_held_through_startup_needs_a_release() {
        run(false, |app, h| {
            let start = Instant::now();
            h.sim.press(0, 0);
            assert_eq!(app.update(start), None);
            assert_eq!(app.update(start + TICK), None);

            h.sim.release(0, 0);
            assert_eq!(app.update(start + TICK * 2), None);
            h.sim.press(0, 0);
            assert_eq!(
                app.update(start + TICK * 3),
                Some(PinOutcome::KeyAccepted { index: 0, key: '1' })
            );
        });
    }

    #[test]
    fn holding_a_key_registers_it_once() {
        run(false, |app, h| {
            let mut now = Instant::now();
            app.update(now);

            h.sim.press(1, 1);
            let outcomes: Vec<_> = (0..5)
                .map(|_| {
                    now += TICK;
                    app.update(now)
                })
                .collect();
            assert_eq!(outcomes[0], Some(PinOutcome::KeyAccepted { index: 0, key: '5' }));
            assert!(outcomes[1..].iter().all(Option::is_none));
            assert_eq!(app.session().buffer().contents(), "5");
            assert_eq!(h.effects.take(), vec![Effect::LedOff, Effect::Sound(SoundKind::Normal)]);
        });
    }

    #[test]
    fn ambiguous_input_is_discarded() {
        run(false, |app, h| {
            let mut now = Instant::now();
            app.update(now);

            h.sim.press(0, 0);
            h.sim.press(1, 1);
            now += TICK;
            assert_eq!(app.update(now), None);

            // The second key is still held, so the remaining one is not a fresh press.
            h.sim.release(1, 1);
            now += TICK;
            assert_eq!(app.update(now), None);

            h.sim.release_all();
            now += TICK;
            assert_eq!(app.update(now), None);
            assert_eq!(app.session().state(), SessionState::Idle);
            assert!(h.effects.take().is_empty());
        });
    }

    #[test]
    fn full_pin_is_validated_exactly_once() {
        run(false, |app, h| {
            let mut now = Instant::now();
            app.update(now);

            let outcomes = h.type_pin(app, "123A", &mut now);
            assert_eq!(outcomes[2], Some(PinOutcome::KeyAccepted { index: 2, key: '3' }));
            assert_eq!(outcomes[3], Some(PinOutcome::Granted(UserId(1))));
            assert_eq!(*h.lookups.borrow(), vec!["123A".to_string()]);
            assert!(app.session().buffer().is_empty());
            assert_eq!(app.session().state(), SessionState::Idle);

            let effects = h.effects.take();
            assert_eq!(
                effects[effects.len() - 2..],
                [Effect::LedOn(LedColor::GREEN), Effect::Sound(SoundKind::Success)]
            );
        });
    }

    #[test]
    fn accept_then_reject() {
        run(false, |app, h| {
            let mut now = Instant::now();
            app.update(now);

            assert_eq!(h.type_pin(app, "2580", &mut now)[3], Some(PinOutcome::Granted(UserId(3))));
            assert_eq!(h.type_pin(app, "0000", &mut now)[3], Some(PinOutcome::Denied));

            let effects = h.effects.take();
            assert_eq!(
                effects[effects.len() - 2..],
                [Effect::LedOn(LedColor::RED), Effect::Sound(SoundKind::Error)]
            );
            assert_eq!(h.lookups.borrow().len(), 2);
        });
    }

    #[test]
    fn partial_pin_times_out() {
        run(false, |app, h| {
            let mut now = Instant::now();
            app.update(now);

            h.type_pin(app, "12", &mut now);
            h.effects.take();
            // The last key went down one tick before `now`.
            let last_press = now - TICK;

            assert_eq!(app.update(last_press + Duration::from_millis(9950)), None);
            assert_eq!(app.session().buffer().len(), 2);
            assert_eq!(
                app.update(last_press + Duration::from_secs(10)),
                Some(PinOutcome::TimedOut)
            );
            assert!(app.session().buffer().is_empty());
            assert!(h.lookups.borrow().is_empty());
            assert_eq!(
                h.effects.take(),
                vec![Effect::LedOn(LedColor::YELLOW), Effect::Sound(SoundKind::Error)]
            );

            // The next PIN starts from scratch.
            now = last_press + Duration::from_secs(11);
            assert_eq!(h.type_pin(app, "ABCD", &mut now)[3], Some(PinOutcome::Granted(UserId(2))));
        });
    }

    #[test]
    fn scans_are_throttled_but_feedback_is_not() {
        run(false, |app, h| {
            let start = Instant::now();
            app.update(start);
            assert_eq!(h.sim.row_activations(0), 1);

            app.update(start + Duration::from_millis(10));
            app.update(start + Duration::from_millis(49));
            assert_eq!(h.sim.row_activations(0), 1);

            app.update(start + TICK);
            assert_eq!(h.sim.row_activations(0), 2);
            assert_eq!(*h.led_updates.borrow(), 4);
        });
    }

    #[test]
    fn store_failure_denies() {
        run(true, |app, h| {
            let mut now = Instant::now();
            app.update(now);

            assert_eq!(h.type_pin(app, "123A", &mut now)[3], Some(PinOutcome::Denied));
            assert_eq!(h.lookups.borrow().len(), 1);
            assert!(app.session().buffer().is_empty());
        });
    }

    #[test]
    fn failed_scan_is_a_quiet_tick() {
        run(false, |app, h| {
            let mut now = Instant::now();
            app.update(now);

            h.sim.set_fail_reads(true);
            h.sim.press(0, 1);
            now += TICK;
            assert_eq!(app.update(now), None);

            // The failed scan did not disarm the gate.
            h.sim.set_fail_reads(false);
            now += TICK;
            assert_eq!(app.update(now), Some(PinOutcome::KeyAccepted { index: 0, key: '2' }));

            // Timeouts still fire while the keypad is failing.
            h.sim.set_fail_reads(true);
            assert_eq!(app.update(now + Duration::from_secs(10)), Some(PinOutcome::TimedOut));
        });
    }

    #[test]
    fn shutdown_leaves_outputs_inactive() {
        let settings = Config::default().keypad_settings().unwrap();
        let keys = SimMatrix::new(4, 4);
        let rows: Vec<_> = (0..4).map(|r| keys.row_output(r)).collect();
        let columns: Vec<_> = (0..4).map(|c| keys.column_input(c)).collect();
        let mut keypad = MatrixKeypad::new(
            rows.iter().map(|r| r as &dyn GpioOutput).collect(),
            columns.iter().map(|c| c as &dyn GpioInput).collect(),
            settings.grid.clone(),
        ).unwrap();

        let leds = SimMatrix::new(3, 1);
        let [r, g, b] = [leds.row_output(0), leds.row_output(1), leds.row_output(2)];
        let mut led = RgbLed::new(&r, &g, &b, Duration::from_secs(3)).unwrap();
        let mut pwm = FakePwm::default();
        let mut sound = BuzzerSounds::new(&mut pwm);
        let mut store = SharedStore::default();

        let mut app = App::new(
            &mut keypad,
            &mut store,
            FeedbackDispatcher::new(&mut led, &mut sound),
            &settings,
        );
        let handles = Handles {
            sim: keys.clone(),
            effects: Recorder::default(),
            lookups: Rc::default(),
            led_updates: Rc::default(),
        };

        let mut now = Instant::now();
        app.update(now);
        assert_eq!(handles.type_pin(&mut app, "0000", &mut now)[3], Some(PinOutcome::Denied));
        // Mid error cue, LED red.
        app.update(now + Duration::from_millis(10));
        assert!(leds.is_row_active(0));

        app.shutdown();
        drop(app);
        drop(sound);

        assert!((0..3).all(|channel| !leds.is_row_active(channel)));
        // The error cue had started before it was cut off.
        assert_eq!(pwm.period, Duration::from_micros(2500));
        assert!(!pwm.enabled);
    }

    proptest! {
        #[test]
        fn unknown_pins_are_denied(
            pin in proptest::collection::vec(
                proptest::sample::select(KeypadGrid::STANDARD_4X4.iter().flatten().copied().collect::<Vec<char>>()),
                4,
            ).prop_map(|keys| keys.into_iter().collect::<String>())
        ) {
            prop_assume!(!["123A", "ABCD", "2580"].contains(&pin.as_str()));

            let (outcomes, lookups) = run(false, |app, h| {
                let mut now = Instant::now();
                app.update(now);
                let outcomes = h.type_pin(app, &pin, &mut now);
                (outcomes, h.lookups.borrow().clone())
            });

            let first_three_accepted = outcomes[..3].iter().all(|o| matches!(o, Some(PinOutcome::KeyAccepted { .. })));
            prop_assert!(first_three_accepted);
            prop_assert_eq!(outcomes[3], Some(PinOutcome::Denied));
            prop_assert_eq!(lookups, vec![pin]);
        }
    }
}
