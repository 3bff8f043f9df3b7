//! Fixed-route (payline) win detection

use super::{WinEntry, WinEvaluator, WinKey, WinMap};
use crate::board::{Board, Position};
use crate::paytable::Payline;
use crate::symbols::{SymbolId, SymbolRole, SymbolRoles};

/// Evaluates explicit paylines left to right
#[derive(Debug, Clone)]
pub struct RouteDetector {
    roles: SymbolRoles,
    paylines: Vec<Payline>,
    min_match: usize,
}

impl RouteDetector {
    pub fn new(roles: SymbolRoles, paylines: Vec<Payline>, min_match: usize) -> Self {
        Self {
            roles,
            paylines,
            min_match,
        }
    }

    pub fn roles(&self) -> &SymbolRoles {
        &self.roles
    }

    pub fn paylines(&self) -> &[Payline] {
        &self.paylines
    }

    /// Evaluate a single payline
    pub fn evaluate_line(&self, board: &Board, line: &Payline) -> Option<WinEntry> {
        let mut expected: Option<SymbolId> = None;
        let mut positions: Vec<Position> = Vec::new();
        let mut wild_positions = Vec::new();

        for (column, &row) in line.rows.iter().enumerate() {
            let Some(pos) = board.position(column, row) else {
                break;
            };
            let symbol = board.column(column)[row];
            match self.roles.role(symbol) {
                SymbolRole::Scatter | SymbolRole::Blank => break,
                SymbolRole::Wild => wild_positions.push(pos),
                SymbolRole::Plain => match expected {
                    None => expected = Some(symbol),
                    Some(icon) if icon == symbol => {}
                    Some(_) => break,
                },
            }
            positions.push(pos);
        }

        if positions.len() < self.min_match {
            return None;
        }
        // Flat positions grow with the column, so the list is already ascending
        let icon = expected.unwrap_or(self.roles.wild);
        Some(WinEntry {
            key: WinKey::Line(line.id),
            icon,
            line_count: positions.len(),
            positions,
            wild_positions,
            upper_positions: Vec::new(),
            ways: 1,
        })
    }
}

impl WinEvaluator for RouteDetector {
    fn evaluate(&self, board: &Board) -> Option<WinMap> {
        WinMap::from_entries(
            self.paylines
                .iter()
                .filter_map(|line| self.evaluate_line(board, line)),
        )
    }
}
