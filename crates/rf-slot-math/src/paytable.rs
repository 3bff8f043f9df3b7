//! Paylines and pay schedule

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::money::Amount;
use crate::symbols::SymbolId;

/// A payline definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payline {
    /// External payline id
    pub id: u32,
    /// Row index for each column (e.g., [1, 0, 0, 0, 1])
    pub rows: Vec<usize>,
}

impl Payline {
    pub fn new(id: u32, rows: Vec<usize>) -> Self {
        Self { id, rows }
    }

    /// Create a straight line (same row across all columns)
    pub fn straight(id: u32, row: usize, columns: usize) -> Self {
        Self {
            id,
            rows: vec![row; columns],
        }
    }

    /// Create a V-shaped line
    pub fn v_shape(id: u32, rows: usize, columns: usize) -> Self {
        let mid = columns / 2;
        let bottom = rows.saturating_sub(1);
        let rows = (0..columns)
            .map(|c| if c <= mid { c } else { columns - 1 - c }.min(bottom))
            .collect();
        Self { id, rows }
    }

    /// Create an inverted V
    pub fn inverted_v(id: u32, rows: usize, columns: usize) -> Self {
        let mid = columns / 2;
        let bottom = rows.saturating_sub(1);
        let rows = (0..columns)
            .map(|c| {
                if c <= mid {
                    bottom - c.min(bottom)
                } else {
                    (c - mid).min(bottom)
                }
            })
            .collect();
        Self { id, rows }
    }
}

/// Payline patterns for a 5×4 grid
pub fn standard_5x4_paylines() -> Vec<Payline> {
    let mut lines: Vec<Payline> = (0..4).map(|row| Payline::straight(row as u32 + 1, row, 5)).collect();
    lines.extend([
        Payline::new(5, vec![0, 1, 2, 1, 0]),
        Payline::new(6, vec![3, 2, 1, 2, 3]),
        Payline::new(7, vec![1, 2, 3, 2, 1]),
        Payline::new(8, vec![2, 1, 0, 1, 2]),
        Payline::new(9, vec![0, 1, 2, 3, 3]),
        Payline::new(10, vec![3, 2, 1, 0, 0]),
        Payline::v_shape(11, 4, 5),
        Payline::inverted_v(12, 4, 5),
    ]);
    lines
}

/// Check that every payline fits a board shape
pub fn validate_paylines(lines: &[Payline], column_lengths: &[usize]) -> Result<(), ConfigError> {
    for line in lines {
        if line.rows.len() != column_lengths.len() {
            return Err(ConfigError::PaylineShape {
                line: line.id,
                found: line.rows.len(),
                expected: column_lengths.len(),
            });
        }
        for (column, (&row, &length)) in line.rows.iter().zip(column_lengths).enumerate() {
            if row >= length {
                return Err(ConfigError::PaylineOutOfRange {
                    line: line.id,
                    column,
                    row,
                    length,
                });
            }
        }
    }
    Ok(())
}

/// Pay schedule: icon → match count → pay factor on the line bet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayTable {
    #[serde(default)]
    pub pays: BTreeMap<SymbolId, BTreeMap<usize, Amount>>,
}

impl PayTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: pays for `icon`, as `(match count, factor)` pairs
    pub fn with_pays(mut self, icon: SymbolId, pays: &[(usize, Amount)]) -> Self {
        self.pays.entry(icon).or_default().extend(pays.iter().copied());
        self
    }

    /// Pay factor for `count` matches. Counts above the highest configured
    /// count pay the highest configured factor.
    pub fn pay(&self, icon: SymbolId, count: usize) -> Amount {
        self.pays
            .get(&icon)
            .and_then(|table| table.range(..=count).next_back())
            .map(|(_, factor)| *factor)
            .unwrap_or(Amount::ZERO)
    }

    /// Does the icon pay anything at all?
    pub fn pays_for(&self, icon: SymbolId) -> bool {
        self.pays
            .get(&icon)
            .is_some_and(|table| table.values().any(|f| f.is_positive()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payline_shapes() {
        assert_eq!(Payline::straight(1, 1, 5).rows, vec![1, 1, 1, 1, 1]);
        assert_eq!(Payline::v_shape(1, 3, 5).rows, vec![0, 1, 2, 1, 0]);
        assert_eq!(Payline::inverted_v(1, 3, 5).rows, vec![2, 1, 0, 1, 2]);
    }

    #[test]
    fn test_validate_paylines() {
        let lines = vec![
            Payline::straight(1, 1, 5),
            Payline::v_shape(2, 3, 5),
            Payline::inverted_v(3, 3, 5),
        ];
        assert!(validate_paylines(&lines, &[3, 3, 3, 3, 3]).is_ok());
        assert!(matches!(
            validate_paylines(&lines, &[3, 3, 2, 3, 3]),
            Err(ConfigError::PaylineOutOfRange { column: 2, .. })
        ));
        assert!(matches!(
            validate_paylines(&lines, &[3, 3, 3]),
            Err(ConfigError::PaylineShape { expected: 3, .. })
        ));
        assert!(validate_paylines(&standard_5x4_paylines(), &[4; 5]).is_ok());
    }

    #[test]
    fn test_pay_lookup_uses_highest_count_below() {
        let table = PayTable::new().with_pays(
            7,
            &[
                (3, Amount::from_int(1)),
                (4, Amount::from_int(5)),
                (5, Amount::from_int(20)),
            ],
        );
        assert_eq!(table.pay(7, 2), Amount::ZERO);
        assert_eq!(table.pay(7, 3), Amount::from_int(1));
        assert_eq!(table.pay(7, 6), Amount::from_int(20));
        assert_eq!(table.pay(8, 5), Amount::ZERO);
        assert!(table.pays_for(7));
        assert!(!table.pays_for(8));
    }
}
