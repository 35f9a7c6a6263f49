//! PIN accumulation and the key-press timeout.

use std::time::{Duration, Instant};
use log::{debug, info, warn};
use crate::credentials::{CredentialValidator, UserId, Validation};

/// The keys entered so far, with room for exactly one PIN.
///
/// Slots at and after `next_index` are always empty.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PinBuffer {
    slots: Vec<Option<char>>,
    next_index: usize,
}

impl PinBuffer {
    pub fn new(capacity: usize) -> Self {
        PinBuffer {
            slots: vec![None; capacity],
            next_index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.next_index
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    pub fn is_full(&self) -> bool {
        self.next_index >= self.slots.len()
    }

    /// Appends `key`, returning the index it was stored at, or `None` if full.
    pub fn push(&mut self, key: char) -> Option<usize> {
        let index = self.next_index;
        let slot = self.slots.get_mut(index)?;
        *slot = Some(key);
        self.next_index += 1;
        Some(index)
    }

    /// The entered keys as a string.
    pub fn contents(&self) -> String {
        self.slots[..self.next_index].iter().flatten().collect()
    }

    pub fn clear(&mut self) {
        self.slots.fill(None);
        self.next_index = 0;
    }
}

/// Inactivity timer started by each key press.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimeoutTimer {
    last_press: Option<Instant>,
    timeout: Duration,
}

impl TimeoutTimer {
    pub fn new(timeout: Duration) -> Self {
        TimeoutTimer { last_press: None, timeout }
    }

    /// (Re)starts the timer from `now`.
    pub fn start(&mut self, now: Instant) {
        self.last_press = Some(now);
    }

    pub fn stop(&mut self) {
        self.last_press = None;
    }

    pub fn is_active(&self) -> bool {
        self.last_press.is_some()
    }

    /// Whether the timer is running and at least the timeout has passed since it started.
    pub fn has_expired(&self, now: Instant) -> bool {
        self.last_press
            .is_some_and(|last| now.saturating_duration_since(last) >= self.timeout)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// Nothing entered, timer stopped.
    Idle,
    /// Part of a PIN entered, timer running.
    Collecting,
}

/// What a key press or a timeout check led to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinOutcome {
    /// The key was stored and more are needed.
    KeyAccepted { index: usize, key: char },
    /// The PIN was complete and belongs to `user`.
    Granted(UserId),
    /// The PIN was complete but rejected.
    Denied,
    /// Too long passed since the last key; the partial PIN was dropped.
    TimedOut,
}

/// Collects key presses into a fixed-length PIN and hands it to the validator.
#[derive(Clone, Debug)]
pub struct PinInputSession {
    buffer: PinBuffer,
    timer: TimeoutTimer,
}

impl PinInputSession {
    pub fn new(max_pin_length: usize, keypress_timeout: Duration) -> Self {
        PinInputSession {
            buffer: PinBuffer::new(max_pin_length),
            timer: TimeoutTimer::new(keypress_timeout),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.buffer.is_empty() && !self.timer.is_active() {
            SessionState::Idle
        } else {
            SessionState::Collecting
        }
    }

    pub fn buffer(&self) -> &PinBuffer {
        &self.buffer
    }

    /// Stores a freshly pressed key.
    ///
    /// When the key completes the PIN, it is validated right away and the session
    /// goes back to idle whatever the result.
    pub fn on_edge_key_press(
        &mut self,
        key: char,
        now: Instant,
        validator: &mut CredentialValidator<'_>,
    ) -> PinOutcome {
        self.timer.start(now);

        let Some(index) = self.buffer.push(key) else {
            // Unreachable while the buffer is reset on completion, but never overflow.
            warn!("PIN buffer already full, dropping it.");
            self.reset();
            return PinOutcome::Denied;
        };
        debug!("Index {} of PIN entered. Character {}.", index, key);

        if !self.buffer.is_full() {
            return PinOutcome::KeyAccepted { index, key };
        }

        let pin = self.buffer.contents();
        self.reset();

        match validator.validate(&pin) {
            Validation::Accepted(user) => {
                info!("Correct PIN, user {} accepted.", user);
                PinOutcome::Granted(user)
            }
            Validation::Rejected => {
                warn!("PIN rejected.");
                PinOutcome::Denied
            }
        }
    }

    /// Drops a partial PIN if the last key was pressed too long ago.
    pub fn check_timeout(&mut self, now: Instant) -> Option<PinOutcome> {
        if !self.timer.has_expired(now) {
            return None;
        }

        info!("Too long since last key press, resetting PIN.");
        self.reset();
        Some(PinOutcome::TimedOut)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.timer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialError, CredentialStore};
    use proptest::prelude::*;

    #[derive(Debug, Default)]
    struct CountingStore {
        lookups: Vec<String>,
    }

    impl CredentialStore for CountingStore {
        fn lookup_user_id_by_pin(&mut self, pin: &str) -> Result<Option<UserId>, CredentialError> {
            self.lookups.push(pin.to_string());
            Ok((pin == "123A").then_some(UserId(42)))
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn buffer_tracks_the_cursor() {
        let mut buffer = PinBuffer::new(2);
        assert_eq!(buffer.push('1'), Some(0));
        assert_eq!(buffer.contents(), "1");
        assert_eq!(buffer.push('2'), Some(1));
        assert!(buffer.is_full());
        assert_eq!(buffer.push('3'), None);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer, PinBuffer::new(2));
    }

    #[test]
    fn full_pin_is_validated_once_and_cleared() {
        let mut store = CountingStore::default();
        let mut validator = CredentialValidator::new(&mut store, 4);
        let mut session = PinInputSession::new(4, TIMEOUT);
        let now = Instant::now();

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(
            session.on_edge_key_press('1', now, &mut validator),
            PinOutcome::KeyAccepted { index: 0, key: '1' }
        );
        assert_eq!(session.state(), SessionState::Collecting);
        session.on_edge_key_press('2', now, &mut validator);
        session.on_edge_key_press('3', now, &mut validator);
        assert_eq!(
            session.on_edge_key_press('A', now, &mut validator),
            PinOutcome::Granted(UserId(42))
        );

        assert!(session.buffer().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(store.lookups, vec!["123A".to_string()]);
    }

    #[test]
    fn wrong_pin_is_denied_and_cleared() {
        let mut store = CountingStore::default();
        let mut validator = CredentialValidator::new(&mut store, 4);
        let mut session = PinInputSession::new(4, TIMEOUT);
        let now = Instant::now();

        let outcomes: Vec<_> = "1234"
            .chars()
            .map(|key| session.on_edge_key_press(key, now, &mut validator))
            .collect();
        assert_eq!(outcomes[3], PinOutcome::Denied);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn timeout_drops_partial_input() {
        let mut store = CountingStore::default();
        let mut validator = CredentialValidator::new(&mut store, 4);
        let mut session = PinInputSession::new(4, TIMEOUT);
        let start = Instant::now();

        session.on_edge_key_press('1', start, &mut validator);
        assert_eq!(session.check_timeout(start + Duration::from_secs(9)), None);
        assert_eq!(session.buffer().len(), 1);

        assert_eq!(session.check_timeout(start + TIMEOUT), Some(PinOutcome::TimedOut));
        assert!(session.buffer().is_empty());
        assert_eq!(session.state(), SessionState::Idle);

        // The timer is stopped, so it does not fire twice.
        assert_eq!(session.check_timeout(start + TIMEOUT * 2), None);
        assert!(store.lookups.is_empty());
    }

    #[test]
    fn each_key_restarts_the_timer() {
        let mut store = CountingStore::default();
        let mut validator = CredentialValidator::new(&mut store, 4);
        let mut session = PinInputSession::new(4, TIMEOUT);
        let start = Instant::now();

        session.on_edge_key_press('1', start, &mut validator);
        session.on_edge_key_press('2', start + Duration::from_secs(8), &mut validator);
        assert_eq!(session.check_timeout(start + Duration::from_secs(12)), None);
        assert_eq!(
            session.check_timeout(start + Duration::from_secs(18)),
            Some(PinOutcome::TimedOut)
        );
    }

    #[test]
    fn idle_session_never_times_out() {
        let mut session = PinInputSession::new(4, TIMEOUT);
        assert_eq!(session.check_timeout(Instant::now() + TIMEOUT * 100), None);
    }

    proptest! {
        #[test]
        fn validates_every_full_pin(keys in proptest::collection::vec(proptest::char::range('0', '9'), 0..40), len in 1usize..8) {
            let mut store = CountingStore::default();
            let mut validator = CredentialValidator::new(&mut store, len);
            let mut session = PinInputSession::new(len, TIMEOUT);
            let now = Instant::now();

            for &key in &keys {
                session.on_edge_key_press(key, now, &mut validator);
                prop_assert!(session.buffer().len() < len);
            }

            prop_assert_eq!(session.buffer().len(), keys.len() % len);
            drop(validator);
            prop_assert_eq!(store.lookups.len(), keys.len() / len);
            for (pin, chunk) in store.lookups.iter().zip(keys.chunks_exact(len)) {
                prop_assert_eq!(pin, &chunk.iter().collect::<String>());
            }
        }
    }
}
