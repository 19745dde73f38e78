//! FILENAME: engine/src/grid.rs
//! PURPOSE: Sparse 2-D placement of cells.
//! CONTEXT: Report layouts place cells at explicit (row, col) positions
//! and flatten the result to rectangular rows afterwards, so footers and
//! annotation columns line up regardless of which positions were filled.

use rustc_hash::FxHashMap;

/// Sparse storage mapping (row, col) to cells. Row and Col are 0-based.
#[derive(Debug, Clone)]
pub struct Grid<T> {
    cells: FxHashMap<(u32, u32), T>,

    /// Number of rows touched so far (highest row index + 1).
    rows: u32,

    /// Fixed width every flattened row is padded or checked against.
    width: u32,
}

impl<T: Clone> Grid<T> {
    /// Creates an empty grid whose rows are `width` columns wide.
    pub fn new(width: u32) -> Self {
        Grid {
            cells: FxHashMap::default(),
            rows: 0,
            width,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn row_count(&self) -> u32 {
        self.rows
    }

    /// Sets a cell at the specified coordinates, replacing any previous one.
    /// Columns outside the width are dropped and reported with `false`.
    pub fn set_cell(&mut self, row: u32, col: u32, cell: T) -> bool {
        if col >= self.width {
            return false;
        }
        if row + 1 > self.rows {
            self.rows = row + 1;
        }
        self.cells.insert((row, col), cell);
        true
    }

    pub fn get_cell(&self, row: u32, col: u32) -> Option<&T> {
        self.cells.get(&(row, col))
    }

    /// Marks a row as present even if nothing is placed on it.
    pub fn touch_row(&mut self, row: u32) {
        if row + 1 > self.rows {
            self.rows = row + 1;
        }
    }

    /// Flattens to rectangular rows, filling unplaced positions with `fill`.
    pub fn into_rows(mut self, fill: impl Fn(u32, u32) -> T) -> Vec<Vec<T>> {
        let mut out = Vec::with_capacity(self.rows as usize);
        for row in 0..self.rows {
            let mut cells = Vec::with_capacity(self.width as usize);
            for col in 0..self.width {
                match self.cells.remove(&(row, col)) {
                    Some(cell) => cells.push(cell),
                    None => cells.push(fill(row, col)),
                }
            }
            out.push(cells);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_rows_fills_gaps() {
        let mut grid: Grid<&str> = Grid::new(3);
        grid.set_cell(0, 0, "a");
        grid.set_cell(1, 2, "b");
        let rows = grid.into_rows(|_, _| ".");
        assert_eq!(rows, vec![vec!["a", ".", "."], vec![".", ".", "b"]]);
    }

    #[test]
    fn test_out_of_width_is_rejected() {
        let mut grid: Grid<u8> = Grid::new(2);
        assert!(!grid.set_cell(0, 2, 1));
        assert_eq!(grid.row_count(), 0);
        assert!(grid.set_cell(0, 1, 1));
        assert!(grid.set_cell(0, 1, 2));
        assert_eq!(grid.get_cell(0, 1), Some(&2));
    }

    #[test]
    fn test_touch_row_keeps_blank_rows() {
        let mut grid: Grid<u8> = Grid::new(1);
        grid.touch_row(2);
        assert_eq!(grid.into_rows(|_, _| 0).len(), 3);
    }
}
