use crate::keypad::ScanResult;

/// Gate that turns a stream of scan results into single key presses.
///
/// A key is yielded only when exactly one key is pressed and nothing at all was
/// pressed on the previous scan. Holding a key, or pressing a second one while the
/// first is held, yields nothing until every key is released again.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PressEdge {
    nothing_pressed_before: bool,
}

impl PressEdge {
    /// Creates a disarmed gate: it only arms after a scan with no key pressed, so a
    /// key stuck down at startup is ignored.
    pub fn new() -> Self {
        PressEdge {
            nothing_pressed_before: false,
        }
    }

    /// Feeds one scan result, returning the key if it is a press edge.
    pub fn register<K: Clone>(&mut self, scan: &ScanResult<K>) -> Option<K> {
        let edge = match scan {
            ScanResult::Single(key) if self.nothing_pressed_before => Some(key.clone()),
            _ => None,
        };
        self.nothing_pressed_before = !scan.any_pressed();
        edge
    }
}
