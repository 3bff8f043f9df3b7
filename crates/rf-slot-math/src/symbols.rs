//! Symbol roles

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Symbol id as it appears on the board
pub type SymbolId = u32;

/// Sentinel for a cell that has not been filled yet. Never matches, never seeds.
pub const BLANK: SymbolId = SymbolId::MAX;

/// Symbol role classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolRole {
    /// Regular paying symbol
    Plain,
    /// Substitutes for plain symbols in line evaluation
    Wild,
    /// Breaks line evaluation, counts toward the free-game trigger
    Scatter,
    /// Unfilled cell
    Blank,
}

/// Icon role configuration.
///
/// Roles are configuration, not board state: the same id means the same
/// thing on every board drawn with this config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRoles {
    /// Wild icon
    pub wild: SymbolId,
    /// Primary scatter (free-game trigger icon)
    pub scatter: SymbolId,
    /// Further icons that behave like scatters for line evaluation only
    #[serde(default)]
    pub extra_scatters: Vec<SymbolId>,
    /// Icons allowed to merge into frames, with their maximum merge size
    #[serde(default)]
    pub merge_caps: BTreeMap<SymbolId, usize>,
    /// Icon that carries multiplier tags
    #[serde(default)]
    pub multiplier_icon: Option<SymbolId>,
}

impl SymbolRoles {
    /// Roles with a wild and a scatter, nothing combinable
    pub fn new(wild: SymbolId, scatter: SymbolId) -> Self {
        Self {
            wild,
            scatter,
            extra_scatters: Vec::new(),
            merge_caps: BTreeMap::new(),
            multiplier_icon: None,
        }
    }

    /// Builder: allow `icon` to merge up to `max_size` cells
    pub fn with_merge(mut self, icon: SymbolId, max_size: usize) -> Self {
        self.merge_caps.insert(icon, max_size);
        self
    }

    /// Builder: designate the multiplier icon
    pub fn with_multiplier_icon(mut self, icon: SymbolId) -> Self {
        self.multiplier_icon = Some(icon);
        self
    }

    /// Classify a symbol id
    pub fn role(&self, symbol: SymbolId) -> SymbolRole {
        if symbol == BLANK {
            SymbolRole::Blank
        } else if symbol == self.wild {
            SymbolRole::Wild
        } else if symbol == self.scatter || self.extra_scatters.contains(&symbol) {
            SymbolRole::Scatter
        } else {
            SymbolRole::Plain
        }
    }

    pub fn is_wild(&self, symbol: SymbolId) -> bool {
        symbol == self.wild
    }

    pub fn is_scatter(&self, symbol: SymbolId) -> bool {
        self.role(symbol) == SymbolRole::Scatter
    }

    pub fn is_plain(&self, symbol: SymbolId) -> bool {
        self.role(symbol) == SymbolRole::Plain
    }

    /// Maximum merge size for a combinable icon (`None` if it never merges)
    pub fn merge_cap(&self, symbol: SymbolId) -> Option<usize> {
        self.merge_caps.get(&symbol).copied().filter(|&cap| cap >= 2)
    }

    /// Combinable icons in ascending id order
    pub fn combinable(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.merge_caps
            .iter()
            .filter(|(_, cap)| **cap >= 2)
            .map(|(id, _)| *id)
    }
}

impl Default for SymbolRoles {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        let roles = SymbolRoles::new(0, 1).with_merge(0, 4).with_merge(1, 1);
        assert_eq!(roles.role(0), SymbolRole::Wild);
        assert_eq!(roles.role(1), SymbolRole::Scatter);
        assert_eq!(roles.role(7), SymbolRole::Plain);
        assert_eq!(roles.role(BLANK), SymbolRole::Blank);

        // A cap below 2 never merges
        assert_eq!(roles.merge_cap(0), Some(4));
        assert_eq!(roles.merge_cap(1), None);
        assert_eq!(roles.combinable().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_extra_scatters() {
        let mut roles = SymbolRoles::new(0, 1);
        roles.extra_scatters.push(2);
        assert!(roles.is_scatter(2));
        assert!(!roles.is_plain(2));
    }
}
