use std::fmt::{Display, Formatter};
use bitvec::vec::BitVec;

/// Per-cell pressed state of the keypad as of the previous scan.
///
/// Stored row-major in a single bitmap sized once from the grid dimensions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DebounceState {
    rows: usize,
    columns: usize,
    pressed: BitVec,
}

impl DebounceState {
    /// Creates a map with every cell released.
    pub fn new(rows: usize, columns: usize) -> Self {
        DebounceState {
            rows,
            columns,
            pressed: BitVec::repeat(false, rows * columns),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Records the state of a cell found in this scan, returning the state it had before.
    ///
    /// # Panics
    /// If the cell is outside the map.
    pub fn record(&mut self, row: usize, column: usize, pressed: bool) -> bool {
        assert!(row < self.rows && column < self.columns, "cell ({row}, {column}) out of bounds");
        self.pressed.replace(row * self.columns + column, pressed)
    }

    /// Whether the cell was found pressed on the previous scan.
    pub fn was_pressed(&self, row: usize, column: usize) -> bool {
        row < self.rows && column < self.columns && self.pressed[row * self.columns + column]
    }

    /// Iterates the `(row, column)` positions found pressed on the previous scan.
    pub fn pressed_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pressed.iter_ones().map(|i| (i / self.columns, i % self.columns))
    }

    pub fn any_pressed(&self) -> bool {
        self.pressed.any()
    }
}

/// Renders the map as rows of `0`/`1`, one line per keypad row.
impl Display for DebounceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for row in 0..self.rows {
            for column in 0..self.columns {
                if column > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", self.was_pressed(row, column) as u8)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
