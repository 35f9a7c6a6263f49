use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use dotenv::var;
use keyclock_gpio::keypad::KeypadGrid;
use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the keypad needs at least one row and one column")]
    EmptyKeypad,
    #[error("keypad row {row} has {found} keys, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },
    #[error("keypad key at row {row}, column {column} has no label")]
    MissingLabel { row: usize, column: usize },
    #[error("{what}: expected {expected} GPIO pins, found {found}")]
    PinCountMismatch { what: &'static str, expected: usize, found: usize },
    #[error("GPIO pin {0} is assigned more than once")]
    PinReused(usize),
    #[error("the PIN length must be at least 1")]
    ZeroPinLength,
    #[error("{field} must be a positive number of seconds, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub keypad: KeypadConfig,
    pub led: LedConfig,
    pub sound: SoundConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct KeypadConfig {
    /// Key labels, one string per row, one character per column.
    pub keys: Vec<String>,
    /// GPIO lines strobing the rows, top to bottom.
    pub row_pins: Vec<usize>,
    /// GPIO lines sensing the columns, left to right.
    pub column_pins: Vec<usize>,
    pub max_pin_length: usize,
    /// Seconds after the last key press before a partial PIN is dropped.
    pub keypress_timeout_secs: f64,
    /// Minimum seconds between two keypad scans.
    pub update_interval_secs: f64,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        KeypadConfig {
            keys: KeypadGrid::STANDARD_4X4
                .iter()
                .map(|row| row.iter().collect())
                .collect(),
            row_pins: vec![11, 9, 10, 22],
            column_pins: vec![17, 4, 3, 2],
            max_pin_length: 4,
            keypress_timeout_secs: 10.0,
            update_interval_secs: 0.05,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LedConfig {
    pub red_pin: usize,
    pub green_pin: usize,
    pub blue_pin: usize,
    /// Seconds the LED stays lit before switching itself off.
    pub stays_on_for_secs: f64,
}

impl Default for LedConfig {
    fn default() -> Self {
        LedConfig {
            red_pin: 15,
            green_pin: 14,
            blue_pin: 18,
            stays_on_for_secs: 3.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SoundConfig {
    /// The `/sys/class/pwm/pwmchipN` driving the buzzer. `None` disables sound.
    pub pwm_chip: Option<usize>,
    pub pwm_channel: usize,
}

impl Default for SoundConfig {
    fn default() -> Self {
        SoundConfig {
            pwm_chip: Some(0),
            pwm_channel: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub users_file: PathBuf,
    pub access_log_file: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig {
            users_file: PathBuf::from("users.json"),
            access_log_file: PathBuf::from("access_log.jsonl"),
        }
    }
}

/// Keypad settings checked against every invariant the scanner and the PIN
/// session rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypadSettings {
    pub grid: KeypadGrid,
    pub row_pins: Vec<usize>,
    pub column_pins: Vec<usize>,
    pub max_pin_length: usize,
    pub keypress_timeout: Duration,
    pub update_interval: Duration,
}

fn positive_secs(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(ConfigError::InvalidDuration { field, value }),
    }
}

impl Config {
    fn path() -> PathBuf {
        PathBuf::from(var("CONFIG_FILE").unwrap_or_else(|_| "config.json".to_string()))
    }

    /// Loads the config from `CONFIG_FILE` (default `config.json`).
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub fn try_load() -> Result<Option<Self>, ConfigError> {
        Self::try_load_from(&Self::path())
    }

    pub fn try_load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Checks the keypad section and turns it into [KeypadSettings].
    pub fn keypad_settings(&self) -> Result<KeypadSettings, ConfigError> {
        let keypad = &self.keypad;

        let rows: Vec<Vec<char>> = keypad.keys.iter().map(|row| row.chars().collect()).collect();
        let columns = rows.first().map(Vec::len).unwrap_or(0);
        if columns == 0 {
            return Err(ConfigError::EmptyKeypad);
        }
        for (row, keys) in rows.iter().enumerate() {
            if keys.len() != columns {
                return Err(ConfigError::RaggedRow { row, expected: columns, found: keys.len() });
            }
            if let Some(column) = keys.iter().position(|&key| key == '\0') {
                return Err(ConfigError::MissingLabel { row, column });
            }
        }

        if keypad.row_pins.len() != rows.len() {
            return Err(ConfigError::PinCountMismatch {
                what: "keypad rows",
                expected: rows.len(),
                found: keypad.row_pins.len(),
            });
        }
        if keypad.column_pins.len() != columns {
            return Err(ConfigError::PinCountMismatch {
                what: "keypad columns",
                expected: columns,
                found: keypad.column_pins.len(),
            });
        }

        let mut seen = HashSet::new();
        let led = [self.led.red_pin, self.led.green_pin, self.led.blue_pin];
        for &pin in keypad.row_pins.iter().chain(&keypad.column_pins).chain(&led) {
            if !seen.insert(pin) {
                return Err(ConfigError::PinReused(pin));
            }
        }

        if keypad.max_pin_length == 0 {
            return Err(ConfigError::ZeroPinLength);
        }

        let grid = KeypadGrid::from_rows(&rows).map_err(|_| ConfigError::EmptyKeypad)?;

        Ok(KeypadSettings {
            grid,
            row_pins: keypad.row_pins.clone(),
            column_pins: keypad.column_pins.clone(),
            max_pin_length: keypad.max_pin_length,
            keypress_timeout: positive_secs("keypad.keypress_timeout_secs", keypad.keypress_timeout_secs)?,
            update_interval: positive_secs("keypad.update_interval_secs", keypad.update_interval_secs)?,
        })
    }

    /// How long the status LED stays lit.
    pub fn led_stays_on_for(&self) -> Result<Duration, ConfigError> {
        positive_secs("led.stays_on_for_secs", self.led.stays_on_for_secs)
    }
}
