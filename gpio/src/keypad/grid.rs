use crate::{GpioError, GpioResult};

/// The key labels of a matrix keypad, addressed by `(row, column)`.
///
/// Immutable once built. Every cell holds a printable label.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeypadGrid {
    rows: usize,
    columns: usize,
    labels: Vec<char>,
}

impl KeypadGrid {
    /// The common 4x4 membrane keypad layout.
    pub const STANDARD_4X4: [[char; 4]; 4] = [
        ['1', '2', '3', 'A'],
        ['4', '5', '6', 'B'],
        ['7', '8', '9', 'C'],
        ['*', '0', '#', 'D'],
    ];

    /// Builds a grid from rows of labels.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if there are no rows or columns, if the rows
    ///   differ in length, or if any label is the NUL character.
    pub fn from_rows<R: AsRef<[char]>>(rows: &[R]) -> GpioResult<Self> {
        let columns = rows.first().map(|row| row.as_ref().len()).unwrap_or(0);
        if columns == 0 {
            return Err(GpioError::InvalidArgument);
        }

        let mut labels = Vec::with_capacity(rows.len() * columns);
        for row in rows {
            let row = row.as_ref();
            if row.len() != columns || row.contains(&'\0') {
                return Err(GpioError::InvalidArgument);
            }
            labels.extend_from_slice(row);
        }

        Ok(KeypadGrid {
            rows: rows.len(),
            columns,
            labels,
        })
    }

    pub fn standard() -> Self {
        KeypadGrid {
            rows: 4,
            columns: 4,
            labels: Self::STANDARD_4X4.concat(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Gets the label at `(row, column)`, if the position is on the grid.
    pub fn label(&self, row: usize, column: usize) -> Option<char> {
        if row < self.rows && column < self.columns {
            Some(self.labels[row * self.columns + column])
        } else {
            None
        }
    }
}

impl Default for KeypadGrid {
    fn default() -> Self {
        Self::standard()
    }
}
