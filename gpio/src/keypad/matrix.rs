use std::fmt::{Debug, Formatter};
use log::trace;
use crate::{GpioError, GpioInput, GpioOutput, GpioResult};
use crate::debounce::DebounceState;
use crate::keypad::{Keypad, KeypadGrid, ScanResult};

/// A row-strobed matrix keypad of any size.
///
/// Rows are outputs and columns are inputs, both in logical levels: writing `true`
/// to a row makes it active, and a column reading `true` while its row is active
/// means the key at the intersection is pressed. Configure the electrical polarity
/// (active-low, pull-ups) on the pins before handing them over.
pub struct MatrixKeypad<'a> {
    rows: Vec<&'a dyn GpioOutput>,
    columns: Vec<&'a dyn GpioInput>,
    grid: KeypadGrid,
    state: DebounceState,
}

impl Debug for MatrixKeypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatrixKeypad({}x{}, {:?}, {:?})",
            self.grid.rows(), self.grid.columns(), self.rows, self.columns)
    }
}

impl<'a> MatrixKeypad<'a> {
    /// Creates a new `MatrixKeypad` and drives every row inactive.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the number of row or column lines does not
    ///   match the grid.
    /// - Any error from writing the row lines.
    pub fn new(
        rows: Vec<&'a dyn GpioOutput>,
        columns: Vec<&'a dyn GpioInput>,
        grid: KeypadGrid,
    ) -> GpioResult<Self> {
        if rows.len() != grid.rows() || columns.len() != grid.columns() {
            return Err(GpioError::InvalidArgument);
        }

        for row in &rows {
            row.write(false)?;
        }

        let state = DebounceState::new(grid.rows(), grid.columns());
        Ok(MatrixKeypad { rows, columns, grid, state })
    }

    pub fn grid(&self) -> &KeypadGrid {
        &self.grid
    }

    /// Gets the per-cell pressed state recorded by the last scan.
    pub fn debounce_state(&self) -> &DebounceState {
        &self.state
    }

    /// Reads every column of the active `row`, recording each cell.
    ///
    /// Returns `true` as soon as a second pressed key is found anywhere on the grid.
    fn scan_row(&mut self, row: usize, found: &mut Option<(usize, usize)>) -> GpioResult<bool> {
        for (column, input) in self.columns.iter().enumerate() {
            let pressed = input.read()?;
            self.state.record(row, column, pressed);

            if pressed {
                if found.is_some() {
                    return Ok(true);
                }
                *found = Some((row, column));
            }
        }
        Ok(false)
    }
}

impl Keypad for MatrixKeypad<'_> {
    type Key = char;

    fn scan(&mut self) -> GpioResult<ScanResult<char>> {
        let mut found = None;

        for row in 0..self.rows.len() {
            self.rows[row].write(true)?;
            let ambiguous = self.scan_row(row, &mut found);
            // The row goes back to inactive even if a read failed.
            self.rows[row].write(false)?;

            if ambiguous? {
                trace!("More than one key pressed, discarding scan.");
                return Ok(ScanResult::Ambiguous);
            }
        }

        match found {
            Some((row, column)) => {
                let key = self.grid.label(row, column).ok_or(GpioError::InvalidArgument)?;
                Ok(ScanResult::Single(key))
            }
            None => Ok(ScanResult::NoKey),
        }
    }
}
