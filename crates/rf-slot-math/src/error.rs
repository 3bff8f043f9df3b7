//! Error types for the slot math engine
//!
//! Two families are kept apart so callers can tell "bad input" from
//! "bad state sequencing": [`ConfigError`] for anything wrong with the
//! configuration or bet request, [`InvariantViolation`] for contract breaks
//! between engine components. No-op conditions (no win, no trigger) are never
//! errors.

use thiserror::Error;

/// Configuration and request errors. Raised before any randomness is drawn
/// whenever the problem is detectable up front.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Weight table is empty: {0}")]
    EmptyWeightTable(String),

    #[error("Weight table has zero total weight: {0}")]
    ZeroWeight(String),

    #[error("User tier is required for tier-specific weight tables")]
    TierUnset,

    #[error("No weight table configured for tier {0}")]
    TierMissing(String),

    #[error("Column {column} has no weight table ({available} tables configured)")]
    MissingColumnTable { column: usize, available: usize },

    #[error("Invalid column length {length} for column {column} (max {max})")]
    InvalidColumnLength {
        column: usize,
        length: usize,
        max: usize,
    },

    #[error("Column {column} pool holds only capped icons")]
    CapsUnsatisfiable { column: usize },

    #[error("Occurrence caps did not converge after {rounds} rounds")]
    CapsDidNotConverge { rounds: usize },

    #[error("Payline {line} references row {row} on column {column} of length {length}")]
    PaylineOutOfRange {
        line: u32,
        column: usize,
        row: usize,
        length: usize,
    },

    #[error("Payline {line} has {found} entries, board has {expected} columns")]
    PaylineShape {
        line: u32,
        found: usize,
        expected: usize,
    },

    #[error("Missing multiplier weight table for merge count {0}")]
    MissingMultiplierTable(usize),

    #[error("No icon left to draw for column {column} under forced-no-win fill")]
    NoWinPoolExhausted { column: usize },

    #[error("Cascade chain exceeded {0} steps")]
    CascadeCeiling(usize),

    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Contract failures between components. These indicate a caller fed the
/// engine an inconsistent state sequence, not a bad configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Position {position} is outside the board ({size} cells)")]
    PositionOutOfBoard { position: usize, size: usize },

    #[error("Remapped row {row} overflows column {column} of length {length}")]
    BoundaryOverflow {
        column: usize,
        row: usize,
        length: usize,
    },

    #[error("Cascade step requires the prior board")]
    MissingPriorBoard,

    #[error("Frame remap requires the prior win context")]
    MissingWinContext,

    #[error("Board shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// Engine error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl EngineError {
    /// True for configuration/request problems
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// True for state-sequencing problems
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

/// Result type alias
pub type EngineResult<T> = Result<T, EngineError>;
