//! Board model and flat-position addressing
//!
//! A board is a list of columns, each listed top to bottom. Columns may have
//! different lengths, so flat positions are always derived from cumulative
//! column offsets.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;
use crate::symbols::{BLANK, SymbolId};

/// Index into the column-major concatenation of all columns
pub type Position = usize;

/// Horizontal strip sitting above a contiguous range of columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpperRow {
    /// Column under the first upper cell
    #[serde(default = "default_upper_start")]
    pub start_column: usize,
    /// Upper cells, left to right
    pub cells: Vec<SymbolId>,
}

fn default_upper_start() -> usize {
    1
}

impl UpperRow {
    pub fn new(cells: Vec<SymbolId>) -> Self {
        Self {
            start_column: default_upper_start(),
            cells,
        }
    }

    /// Column the upper cell `index` sits above
    pub fn column_of(&self, index: usize) -> Option<usize> {
        (index < self.cells.len()).then(|| self.start_column + index)
    }

    /// Upper cell index above `column`
    pub fn index_above(&self, column: usize) -> Option<usize> {
        column
            .checked_sub(self.start_column)
            .filter(|&i| i < self.cells.len())
    }
}

/// Slot board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    columns: Vec<Vec<SymbolId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upper: Option<UpperRow>,
}

impl Board {
    /// Create a board from columns listed top to bottom
    pub fn new(columns: Vec<Vec<SymbolId>>) -> Self {
        Self {
            columns,
            upper: None,
        }
    }

    /// Normalize a flat column-major list into a board
    pub fn from_flat(flat: &[SymbolId], lengths: &[usize]) -> Result<Self, InvariantViolation> {
        let total: usize = lengths.iter().sum();
        if total != flat.len() {
            return Err(InvariantViolation::ShapeMismatch(format!(
                "{} symbols for column lengths summing to {}",
                flat.len(),
                total
            )));
        }
        let mut columns = Vec::with_capacity(lengths.len());
        let mut start = 0;
        for &len in lengths {
            columns.push(flat[start..start + len].to_vec());
            start += len;
        }
        Ok(Self::new(columns))
    }

    /// Builder: attach an upper row
    pub fn with_upper(mut self, upper: UpperRow) -> Self {
        self.upper = Some(upper);
        self
    }

    pub fn columns(&self) -> &[Vec<SymbolId>] {
        &self.columns
    }

    pub fn column(&self, column: usize) -> &[SymbolId] {
        self.columns.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_lengths(&self) -> Vec<usize> {
        self.columns.iter().map(Vec::len).collect()
    }

    /// Total number of flat positions
    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn upper(&self) -> Option<&UpperRow> {
        self.upper.as_ref()
    }

    /// Flat position of the first cell of `column`
    pub fn offset(&self, column: usize) -> usize {
        self.columns.iter().take(column).map(Vec::len).sum()
    }

    /// Flat positions covered by `column`
    pub fn column_range(&self, column: usize) -> Range<Position> {
        let start = self.offset(column);
        start..start + self.column(column).len()
    }

    /// Flat position of `(column, row)`
    pub fn position(&self, column: usize, row: usize) -> Option<Position> {
        (row < self.column(column).len()).then(|| self.offset(column) + row)
    }

    /// `(column, row)` of a flat position
    pub fn locate(&self, position: Position) -> Option<(usize, usize)> {
        let mut start = 0;
        for (column, cells) in self.columns.iter().enumerate() {
            if position < start + cells.len() {
                return Some((column, position - start));
            }
            start += cells.len();
        }
        None
    }

    pub fn get(&self, position: Position) -> Option<SymbolId> {
        self.locate(position)
            .map(|(column, row)| self.columns[column][row])
    }

    pub(crate) fn set(&mut self, position: Position, symbol: SymbolId) {
        if let Some((column, row)) = self.locate(position) {
            self.columns[column][row] = symbol;
        }
    }

    pub(crate) fn set_upper(&mut self, index: usize, symbol: SymbolId) {
        if let Some(cell) = self.upper.as_mut().and_then(|u| u.cells.get_mut(index)) {
            *cell = symbol;
        }
    }

    /// Column-major flat list
    pub fn flat(&self) -> Vec<SymbolId> {
        self.columns.iter().flatten().copied().collect()
    }

    /// Ascending flat positions holding `symbol`
    pub fn positions_of(&self, symbol: SymbolId) -> Vec<Position> {
        self.columns
            .iter()
            .flatten()
            .enumerate()
            .filter(|(_, s)| **s == symbol)
            .map(|(pos, _)| pos)
            .collect()
    }

    /// True when any main-board or upper cell is still blank
    pub fn has_blanks(&self) -> bool {
        self.columns.iter().flatten().any(|&s| s == BLANK)
            || self
                .upper
                .as_ref()
                .is_some_and(|u| u.cells.contains(&BLANK))
    }

    /// Check that a position lies on this board
    pub fn check_position(&self, position: Position) -> Result<(), InvariantViolation> {
        let size = self.len();
        if position < size {
            Ok(())
        } else {
            Err(InvariantViolation::PositionOutOfBoard { position, size })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addressing_unequal_columns() {
        let board = Board::new(vec![vec![1, 2], vec![3, 4, 5, 6], vec![7, 8, 9]]);
        assert_eq!(board.len(), 9);
        assert_eq!(board.column_lengths(), vec![2, 4, 3]);
        assert_eq!(board.offset(2), 6);
        assert_eq!(board.position(1, 3), Some(5));
        assert_eq!(board.position(0, 2), None);
        assert_eq!(board.locate(5), Some((1, 3)));
        assert_eq!(board.locate(6), Some((2, 0)));
        assert_eq!(board.locate(9), None);
        assert_eq!(board.get(8), Some(9));
        assert_eq!(board.column_range(1), 2..6);
    }

    #[test]
    fn test_from_flat_round_trips_shape() {
        let board = Board::from_flat(&[1, 2, 3, 4, 5], &[2, 3]).unwrap();
        assert_eq!(board.columns(), &[vec![1, 2], vec![3, 4, 5]]);
        assert_eq!(board.flat(), vec![1, 2, 3, 4, 5]);

        assert!(Board::from_flat(&[1, 2, 3], &[2, 2]).is_err());
    }

    #[test]
    fn test_upper_row_mapping() {
        let upper = UpperRow::new(vec![3, 10, 5, 3]);
        assert_eq!(upper.column_of(0), Some(1));
        assert_eq!(upper.column_of(3), Some(4));
        assert_eq!(upper.column_of(4), None);
        assert_eq!(upper.index_above(0), None);
        assert_eq!(upper.index_above(2), Some(1));
        assert_eq!(upper.index_above(5), None);
    }

    #[test]
    fn test_positions_of() {
        let board = Board::new(vec![vec![4, 9, 4], vec![9, 4]]);
        assert_eq!(board.positions_of(4), vec![0, 2, 4]);
        assert!(board.check_position(4).is_ok());
        assert!(board.check_position(5).is_err());
    }
}
