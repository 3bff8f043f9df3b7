//! Win detection
//!
//! Two interchangeable strategies share one output model: a [`WinMap`] keyed
//! by icon (adjacency) or payline id (fixed route). "No win" is `None`, never
//! an empty map.

mod adjacency;
mod route;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use adjacency::AdjacencyDetector;
pub use route::RouteDetector;

use crate::board::{Board, Position};
use crate::config::{EngineConfig, WinStrategy};
use crate::frames::FrameMap;
use crate::symbols::{SymbolId, SymbolRoles};

// ═══════════════════════════════════════════════════════════════════════════════
// WIN MAP
// ═══════════════════════════════════════════════════════════════════════════════

/// Key of a win entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinKey {
    /// Adjacency win for an icon
    Icon(SymbolId),
    /// Fixed-route win on a payline id
    Line(u32),
}

/// One winning icon or payline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinEntry {
    pub key: WinKey,
    /// Icon that pays
    pub icon: SymbolId,
    /// Matched flat positions, ascending and unique
    pub positions: Vec<Position>,
    /// Subset of `positions` holding a wild
    pub wild_positions: Vec<Position>,
    /// Upper-row indices that matched
    #[serde(default)]
    pub upper_positions: Vec<usize>,
    /// Consecutive matched columns
    pub line_count: usize,
    /// Product of matching cells per matched column (1 for routes)
    pub ways: u64,
}

/// Non-empty set of wins for one board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<WinEntry>", into = "Vec<WinEntry>")]
pub struct WinMap {
    entries: BTreeMap<WinKey, WinEntry>,
}

impl WinMap {
    /// `None` when there is nothing to report
    pub fn from_entries(entries: impl IntoIterator<Item = WinEntry>) -> Option<Self> {
        let entries: BTreeMap<WinKey, WinEntry> =
            entries.into_iter().map(|entry| (entry.key, entry)).collect();
        (!entries.is_empty()).then_some(Self { entries })
    }

    pub fn get(&self, key: WinKey) -> Option<&WinEntry> {
        self.entries.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WinEntry> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = WinKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; kept for API symmetry with collections
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of matched flat positions across all entries
    pub fn all_positions(&self) -> BTreeSet<Position> {
        self.iter().flat_map(|e| e.positions.iter().copied()).collect()
    }

    /// Union of matched upper-row indices across all entries
    pub fn all_upper_positions(&self) -> BTreeSet<usize> {
        self.iter()
            .flat_map(|e| e.upper_positions.iter().copied())
            .collect()
    }

    /// Positions per key
    pub fn positions_by_key(&self) -> BTreeMap<WinKey, Vec<Position>> {
        self.entries
            .iter()
            .map(|(key, e)| (*key, e.positions.clone()))
            .collect()
    }

    /// Matched column count per key
    pub fn line_counts(&self) -> BTreeMap<WinKey, usize> {
        self.entries
            .iter()
            .map(|(key, e)| (*key, e.line_count))
            .collect()
    }

    /// Largest position referenced, if any
    pub fn max_position(&self) -> Option<Position> {
        self.all_positions().last().copied()
    }
}

impl TryFrom<Vec<WinEntry>> for WinMap {
    type Error = String;

    fn try_from(entries: Vec<WinEntry>) -> Result<Self, Self::Error> {
        Self::from_entries(entries).ok_or_else(|| "win map must not be empty".to_string())
    }
}

impl From<WinMap> for Vec<WinEntry> {
    fn from(map: WinMap) -> Self {
        map.entries.into_values().collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DETECTORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Win evaluation strategy
pub trait WinEvaluator {
    /// Evaluate a board. Blank cells never match.
    fn evaluate(&self, board: &Board) -> Option<WinMap>;
}

/// Detector selected by the configured strategy
#[derive(Debug, Clone)]
pub enum WinDetector {
    Adjacency(AdjacencyDetector),
    Route(RouteDetector),
}

impl WinDetector {
    pub fn from_config(config: &EngineConfig) -> Self {
        match config.strategy {
            WinStrategy::Adjacency => {
                Self::Adjacency(AdjacencyDetector::new(config.roles.clone(), config.min_match))
            }
            WinStrategy::FixedRoute => Self::Route(RouteDetector::new(
                config.roles.clone(),
                config.paylines.clone(),
                config.min_match,
            )),
        }
    }

    pub fn roles(&self) -> &SymbolRoles {
        match self {
            Self::Adjacency(d) => d.roles(),
            Self::Route(d) => d.roles(),
        }
    }
}

impl WinEvaluator for WinDetector {
    fn evaluate(&self, board: &Board) -> Option<WinMap> {
        match self {
            Self::Adjacency(d) => d.evaluate(board),
            Self::Route(d) => d.evaluate(board),
        }
    }
}

/// Count occurrences of `icon`, collapsing each merge frame to one.
///
/// Every position maps to a canonical representative: the last position of
/// the covering frame (preferring a frame that ends exactly there, then the
/// lowest frame id), or itself when no frame covers it.
pub fn count_icon(board: &Board, frames: &FrameMap, icon: SymbolId) -> usize {
    board
        .positions_of(icon)
        .into_iter()
        .map(|pos| {
            frames
                .covering(pos, icon)
                .map(|frame| frame.last_pos)
                .unwrap_or(pos)
        })
        .collect::<BTreeSet<_>>()
        .len()
}
