//! PIN validation against the user table.

use std::fmt::{Debug, Display, Formatter};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Identifies a user in the credential store.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential store unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed user table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("users {0} and {1} share the same PIN")]
    DuplicatePin(UserId, UserId),
    #[error("formatting the access time failed: {0}")]
    Time(#[from] time::error::Format),
}

/// Where PINs are looked up and accepted entries are recorded.
pub trait CredentialStore: Debug {
    /// Finds the user owning `pin`, if any.
    fn lookup_user_id_by_pin(&mut self, pin: &str) -> Result<Option<UserId>, CredentialError>;

    /// Records that `user` was let in.
    fn record_access(&mut self, _user: UserId) -> Result<(), CredentialError> {
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Validation {
    Accepted(UserId),
    Rejected,
}

/// Turns a finished PIN into an accept/reject decision.
///
/// Fails closed: a PIN of the wrong length, an unknown PIN, and any store error
/// are all rejections. Lookups are never retried.
#[derive(Debug)]
pub struct CredentialValidator<'a> {
    store: &'a mut dyn CredentialStore,
    pin_length: usize,
}

impl<'a> CredentialValidator<'a> {
    pub fn new(store: &'a mut dyn CredentialStore, pin_length: usize) -> Self {
        CredentialValidator { store, pin_length }
    }

    pub fn validate(&mut self, pin: &str) -> Validation {
        if pin.chars().count() != self.pin_length {
            warn!("Refusing PIN of {} characters, expected {}.", pin.chars().count(), self.pin_length);
            return Validation::Rejected;
        }

        let user = match self.store.lookup_user_id_by_pin(pin) {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("No user has PIN {:?}.", pin);
                return Validation::Rejected;
            }
            Err(e) => {
                warn!("Credential lookup failed, rejecting PIN: {}", e);
                return Validation::Rejected;
            }
        };

        if let Err(e) = self.store.record_access(user) {
            warn!("Failed to record access for user {}: {}", user, e);
        }
        Validation::Accepted(user)
    }
}

/// A user row of the JSON user table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub pin: String,
}

#[derive(Serialize, Debug)]
struct AccessLogEntry {
    user_id: UserId,
    datetime: String,
}

/// Credential store kept in a JSON file, with accesses appended to a JSON-lines log.
///
/// The user table is re-read on every lookup, so it can be edited while the
/// terminal is running.
pub struct JsonCredentialStore {
    users_file: PathBuf,
    access_log_file: PathBuf,
}

impl JsonCredentialStore {
    pub fn new(users_file: impl Into<PathBuf>, access_log_file: impl Into<PathBuf>) -> Self {
        JsonCredentialStore {
            users_file: users_file.into(),
            access_log_file: access_log_file.into(),
        }
    }

    /// Reads the whole user table.
    pub fn load_users(&self) -> Result<Vec<User>, CredentialError> {
        let file = std::fs::File::open(&self.users_file)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Debug for JsonCredentialStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "JsonCredentialStore({:?})", self.users_file)
    }
}

impl CredentialStore for JsonCredentialStore {
    fn lookup_user_id_by_pin(&mut self, pin: &str) -> Result<Option<UserId>, CredentialError> {
        let users = self.load_users()?;
        let mut matching = users.iter().filter(|user| user.pin == pin);

        match (matching.next(), matching.next()) {
            (Some(first), Some(second)) => Err(CredentialError::DuplicatePin(first.id, second.id)),
            (first, _) => Ok(first.map(|user| user.id)),
        }
    }

    fn record_access(&mut self, user: UserId) -> Result<(), CredentialError> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let entry = AccessLogEntry {
            user_id: user,
            datetime: now.format(&Rfc3339)?,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.access_log_file)?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;

        info!("Access by user {} logged.", user);
        Ok(())
    }
}
