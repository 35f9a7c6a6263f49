//! An in-memory keypad matrix.
//!
//! [SimMatrix] hands out row outputs and column inputs that behave like a real
//! row-strobed keypad: a column reads active only while a row is active and the
//! key at their intersection is held down. It is used to exercise the scanner and
//! everything above it without hardware.

use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use crate::{GpioError, GpioInput, GpioOutput, GpioResult};

struct SimState {
    rows: usize,
    columns: usize,
    row_active: Vec<bool>,
    held: Vec<bool>,
    row_activations: Vec<usize>,
    fail_reads: bool,
}

/// Shared handle to a simulated keypad. Clones refer to the same matrix.
#[derive(Clone)]
pub struct SimMatrix {
    state: Rc<RefCell<SimState>>,
}

impl SimMatrix {
    pub fn new(rows: usize, columns: usize) -> Self {
        SimMatrix {
            state: Rc::new(RefCell::new(SimState {
                rows,
                columns,
                row_active: vec![false; rows],
                held: vec![false; rows * columns],
                row_activations: vec![0; rows],
                fail_reads: false,
            })),
        }
    }

    /// Gets the output line strobing `row`.
    pub fn row_output(&self, row: usize) -> SimRowLine {
        SimRowLine { matrix: self.clone(), row }
    }

    /// Gets the input line sensing `column`.
    pub fn column_input(&self, column: usize) -> SimColumnLine {
        SimColumnLine { matrix: self.clone(), column }
    }

    /// Holds down the key at `(row, column)`.
    pub fn press(&self, row: usize, column: usize) {
        let mut state = self.state.borrow_mut();
        let index = row * state.columns + column;
        state.held[index] = true;
    }

    /// Lets go of the key at `(row, column)`.
    pub fn release(&self, row: usize, column: usize) {
        let mut state = self.state.borrow_mut();
        let index = row * state.columns + column;
        state.held[index] = false;
    }

    pub fn release_all(&self) {
        self.state.borrow_mut().held.fill(false);
    }

    /// Makes every column read fail with an IO error until turned off again.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    /// Whether `row` is currently driven active.
    pub fn is_row_active(&self, row: usize) -> bool {
        self.state.borrow().row_active[row]
    }

    /// How many times `row` went from inactive to active. One full scan activates
    /// every row once, so this doubles as a scan counter.
    pub fn row_activations(&self, row: usize) -> usize {
        self.state.borrow().row_activations[row]
    }
}

impl Debug for SimMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        write!(f, "SimMatrix({}x{})", state.rows, state.columns)
    }
}

pub struct SimRowLine {
    matrix: SimMatrix,
    row: usize,
}

impl Debug for SimRowLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[row {}]", self.matrix, self.row)
    }
}

impl GpioOutput for SimRowLine {
    fn write(&self, value: bool) -> GpioResult<()> {
        let mut state = self.matrix.state.borrow_mut();
        if value && !state.row_active[self.row] {
            state.row_activations[self.row] += 1;
        }
        state.row_active[self.row] = value;
        Ok(())
    }
}

pub struct SimColumnLine {
    matrix: SimMatrix,
    column: usize,
}

impl Debug for SimColumnLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[column {}]", self.matrix, self.column)
    }
}

impl GpioInput for SimColumnLine {
    fn read(&self) -> GpioResult<bool> {
        let state = self.matrix.state.borrow();
        if state.fail_reads {
            return Err(GpioError::Io(std::io::ErrorKind::BrokenPipe));
        }
        let active = (0..state.rows)
            .any(|row| state.row_active[row] && state.held[row * state.columns + self.column]);
        Ok(active)
    }
}
