//! Adjacency (ways) win detection

use std::collections::BTreeSet;

use super::{WinEntry, WinEvaluator, WinKey, WinMap};
use crate::board::{Board, Position};
use crate::symbols::{SymbolId, SymbolRole, SymbolRoles};

/// Connected column-by-column matching from column 0.
///
/// A column matches a seed when it holds the seed or a wild, counting the
/// upper-row cell above it. The walk stops at the first column without a
/// match. Scatters and blanks never match.
#[derive(Debug, Clone)]
pub struct AdjacencyDetector {
    roles: SymbolRoles,
    min_match: usize,
}

/// Matches found in one column
#[derive(Debug, Default)]
struct ColumnMatch {
    positions: Vec<Position>,
    wilds: Vec<Position>,
    upper: Option<usize>,
}

impl ColumnMatch {
    fn count(&self) -> usize {
        self.positions.len() + usize::from(self.upper.is_some())
    }
}

impl AdjacencyDetector {
    pub fn new(roles: SymbolRoles, min_match: usize) -> Self {
        Self { roles, min_match }
    }

    pub fn roles(&self) -> &SymbolRoles {
        &self.roles
    }

    /// Cells of `column` as `(position, symbol)` plus the upper cell above it
    fn column_cells<'a>(
        &self,
        board: &'a Board,
        column: usize,
    ) -> (impl Iterator<Item = (Position, SymbolId)> + 'a, Option<(usize, SymbolId)>) {
        let offset = board.offset(column);
        let cells = board
            .column(column)
            .iter()
            .enumerate()
            .map(move |(row, &symbol)| (offset + row, symbol));
        let upper = board.upper().and_then(|upper| {
            upper
                .index_above(column)
                .map(|index| (index, upper.cells[index]))
        });
        (cells, upper)
    }

    fn matches(&self, seed: SymbolId, symbol: SymbolId) -> bool {
        match self.roles.role(symbol) {
            SymbolRole::Wild => true,
            SymbolRole::Plain => symbol == seed,
            SymbolRole::Scatter | SymbolRole::Blank => false,
        }
    }

    fn match_column(&self, board: &Board, column: usize, seed: SymbolId) -> ColumnMatch {
        let (cells, upper) = self.column_cells(board, column);
        let mut found = ColumnMatch::default();
        for (pos, symbol) in cells {
            if self.matches(seed, symbol) {
                found.positions.push(pos);
                if self.roles.is_wild(symbol) {
                    found.wilds.push(pos);
                }
            }
        }
        if let Some((index, symbol)) = upper {
            if self.matches(seed, symbol) {
                found.upper = Some(index);
            }
        }
        found
    }

    /// Seed icons in ascending order.
    ///
    /// Plain icons of column 0 always seed. While every column so far holds a
    /// wild, plain icons of the next column seed as well, and the wild itself
    /// seeds an all-wild run.
    fn seeds(&self, board: &Board) -> BTreeSet<SymbolId> {
        let mut seeds = BTreeSet::new();
        for column in 0..board.column_count() {
            let (cells, upper) = self.column_cells(board, column);
            let mut has_wild = false;
            for symbol in cells.map(|(_, s)| s).chain(upper.map(|(_, s)| s)) {
                match self.roles.role(symbol) {
                    SymbolRole::Plain => {
                        seeds.insert(symbol);
                    }
                    SymbolRole::Wild => has_wild = true,
                    SymbolRole::Scatter | SymbolRole::Blank => {}
                }
            }
            if !has_wild {
                break;
            }
            seeds.insert(self.roles.wild);
        }
        seeds
    }

    fn walk(&self, board: &Board, seed: SymbolId) -> Option<WinEntry> {
        let mut matched = Vec::new();
        for column in 0..board.column_count() {
            let found = self.match_column(board, column, seed);
            if found.count() == 0 {
                break;
            }
            matched.push(found);
        }
        if matched.len() < self.min_match {
            return None;
        }

        let ways = matched.iter().map(|m| m.count() as u64).product();
        let mut positions: Vec<Position> = matched.iter().flat_map(|m| m.positions.clone()).collect();
        positions.sort_unstable();
        let mut wild_positions: Vec<Position> = matched.iter().flat_map(|m| m.wilds.clone()).collect();
        wild_positions.sort_unstable();
        let upper_positions = matched.iter().filter_map(|m| m.upper).collect();

        Some(WinEntry {
            key: WinKey::Icon(seed),
            icon: seed,
            positions,
            wild_positions,
            upper_positions,
            line_count: matched.len(),
            ways,
        })
    }
}

impl WinEvaluator for AdjacencyDetector {
    fn evaluate(&self, board: &Board) -> Option<WinMap> {
        WinMap::from_entries(
            self.seeds(board)
                .into_iter()
                .filter_map(|seed| self.walk(board, seed)),
        )
    }
}
