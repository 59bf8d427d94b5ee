//! Grid of committed cells, landing-row scan, commit and overlay.

use crate::shapes::{FillTag, Shape};
use std::fmt;
use thiserror::Error;

/// Single cell: empty or filled with a piece's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Filled(FillTag),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("column {column} with width {width} does not fit a {cols}-column grid")]
    OutOfBounds {
        column: usize,
        width: usize,
        cols: usize,
    },
    #[error("piece collides with committed cells at row {row}, column {column}")]
    Collision { row: isize, column: usize },
}

/// Grid of cells. Row 0 is the top; `cells[row * cols + col]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::Empty; rows * cols],
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col).copied()
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if row < self.rows && col < self.cols {
            self.cells[row * self.cols + col] = cell;
        }
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|c| **c != Cell::Empty).count()
    }

    /// Rows top to bottom.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.cols.max(1))
    }

    /// Write the shape's filled cells at (row, column). Fails without writing anything if the
    /// shape would leave the grid or overlap a committed cell.
    pub fn commit(&mut self, shape: &Shape, row: usize, column: usize) -> Result<(), PlacementError> {
        check_columns(self, shape, column)?;
        if !fits(self, shape, row as isize, column) {
            return Err(PlacementError::Collision {
                row: row as isize,
                column,
            });
        }
        for (r, c) in shape.filled() {
            self.set(row + r, column + c, Cell::Filled(shape.fill));
        }
        Ok(())
    }

    /// Copy of the grid with the shape painted at (row, column). Cells falling outside are skipped.
    pub fn overlay(&self, shape: &Shape, row: isize, column: usize) -> Self {
        let mut out = self.clone();
        for (r, c) in shape.filled() {
            let y = row + r as isize;
            let Some(x) = column.checked_add(c) else {
                continue;
            };
            if y < 0 {
                continue;
            }
            out.set(y as usize, x, Cell::Filled(shape.fill));
        }
        out
    }
}

fn check_columns(grid: &Grid, shape: &Shape, column: usize) -> Result<(), PlacementError> {
    let width = shape.width();
    if column.checked_add(width).is_none_or(|end| end > grid.cols) {
        return Err(PlacementError::OutOfBounds {
            column,
            width,
            cols: grid.cols,
        });
    }
    Ok(())
}

/// True if every filled mask cell at top-left (row, column) is inside the grid and unoccupied.
/// Mask cells above the grid (negative row) count as clear.
pub fn fits(grid: &Grid, shape: &Shape, row: isize, column: usize) -> bool {
    for (r, c) in shape.filled() {
        let y = row + r as isize;
        let Some(x) = column.checked_add(c).filter(|&x| x < grid.cols) else {
            return false;
        };
        if y >= grid.rows as isize {
            return false;
        }
        if y < 0 {
            continue;
        }
        if let Some(Cell::Filled(_)) = grid.get(y as usize, x) {
            return false;
        }
    }
    true
}

/// Bottom-most top row at which the shape rests when dropped in `column`.
/// `Ok(None)` means no row works, i.e. the board is full for this shape and column.
pub fn landing_row(grid: &Grid, shape: &Shape, column: usize) -> Result<Option<usize>, PlacementError> {
    check_columns(grid, shape, column)?;
    let Some(lowest) = grid.rows.checked_sub(shape.height()) else {
        return Ok(None);
    };
    Ok((0..=lowest)
        .rev()
        .find(|&row| fits(grid, shape, row as isize, column)))
}

impl fmt::Display for Grid {
    /// One character per cell: the tag's shape letter, `.` when empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.iter_rows() {
            for cell in row {
                let ch = match cell {
                    Cell::Empty => '.',
                    Cell::Filled(tag) => crate::shapes::SHAPES
                        .get(tag.0 as usize)
                        .map(|s| s.name)
                        .unwrap_or('#'),
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
