//! # rf-slot-math — Cascading slot math engine
//!
//! Computes the mathematical outcome of a reel-based slot spin: the landed
//! board, its wins, the cascade that follows each win, multiplier and
//! gold-frame state carried across cascades, and the free-game counter.
//!
//! ## Features
//!
//! - **Weighted Boards**: per-column or shared weight tables, user tiers, occurrence caps
//! - **Win Detection**: adjacency (ways) or fixed paylines, wild substitution, scatter stops
//! - **Cascades**: gravity remap with random or forced-no-win refill
//! - **Frames**: merged runs of combinable icons, carried across cascades
//! - **Multipliers & Gold Frames**: position-keyed values that follow the remap
//! - **Free Games**: scatter trigger, retrigger, bonus buy
//! - **Exact Money**: fixed-point amounts, multiply-then-sum aggregation
//!
//! ## Architecture
//!
//! ```text
//! SlotMathEngine::step(prior, request, rng)
//!     │
//!     ├── BoardGenerator ──or── CascadeEngine (RemovalPlan → collapse → fill)
//!     ├── FrameMap (scan / remap)
//!     ├── FeatureTracker (MultiplierTags, GoldFrames)
//!     ├── WinDetector (Adjacency | Route) → Option<WinMap>
//!     ├── FreeGameMachine (Base ⇄ Pending)
//!     └── StepFigures (pay × line bet × ways × multiplier)
//!           │
//!           v
//!     StepOutcome → PriorSpinState for the next call
//! ```
//!
//! The engine holds no per-spin state. The caller feeds each outcome back in
//! through [`PriorSpinState`].

pub mod board;
pub mod cascade;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod frames;
pub mod free_game;
pub mod generator;
pub mod money;
pub mod paytable;
pub mod spin;
pub mod stats;
pub mod symbols;
pub mod tracker;

pub use board::*;
pub use cascade::*;
pub use config::*;
pub use detect::*;
pub use engine::*;
pub use error::*;
pub use frames::*;
pub use free_game::*;
pub use generator::*;
pub use money::*;
pub use paytable::*;
pub use spin::*;
pub use stats::*;
pub use symbols::*;
pub use tracker::*;
