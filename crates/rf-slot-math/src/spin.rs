//! Step inputs and outcomes
//!
//! The engine keeps no state between calls. Everything a step needs from the
//! previous one travels in a [`PriorSpinState`], and every step returns an
//! immutable [`StepOutcome`] the caller can turn into the next prior state.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::cascade::{FillMode, Injection};
use crate::config::UserTier;
use crate::detect::{WinKey, WinMap};
use crate::frames::FrameMap;
use crate::free_game::{FreeGameEvent, FreeGameState};
use crate::money::{Amount, Stake, StepFigures};
use crate::symbols::SymbolId;
use crate::tracker::{GoldFrames, MultiplierTags};

/// State carried from the previous step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorSpinState {
    /// Board left by the previous step
    #[serde(default)]
    pub board: Option<Board>,
    /// Wins of the previous step; present means the next step cascades
    #[serde(default)]
    pub wins: Option<WinMap>,
    #[serde(default)]
    pub tags: MultiplierTags,
    #[serde(default)]
    pub frames: FrameMap,
    #[serde(default)]
    pub gold: GoldFrames,
    #[serde(default)]
    pub free_game: FreeGameState,
    /// Win accumulated over the current cascade chain
    #[serde(default)]
    pub cumulative_win: Amount,
}

impl PriorSpinState {
    /// Nothing carried over: the next step is a fresh base-game draw
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: carry a free-game state
    pub fn with_free_game(mut self, free_game: FreeGameState) -> Self {
        self.free_game = free_game;
        self
    }

    /// The previous step won, so the next step continues its cascade chain
    pub fn is_cascading(&self) -> bool {
        self.wins.is_some()
    }

    /// Free games were pending when the previous step finished
    pub fn is_pending(&self) -> bool {
        self.free_game.is_pending()
    }
}

/// Per-call request parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinRequest {
    pub stake: Stake,
    /// Weight tier, required when the weights are tiered
    #[serde(default)]
    pub tier: Option<UserTier>,
    /// Refill strategy for cascade steps
    #[serde(default)]
    pub fill_mode: FillMode,
}

impl SpinRequest {
    pub fn new(stake: Stake) -> Self {
        Self {
            stake,
            tier: None,
            fill_mode: FillMode::Random,
        }
    }

    /// Builder: select the weight tier
    pub fn with_tier(mut self, tier: UserTier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Builder: cascades may not create new wins
    pub fn forced_no_win(mut self) -> Self {
        self.fill_mode = FillMode::ForcedNoWin;
        self
    }
}

/// How a step's board came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Fresh draw
    Fresh,
    /// Cascade from the previous board
    Cascade,
}

/// Pay of one win entry before multipliers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconWin {
    pub key: WinKey,
    pub icon: SymbolId,
    pub pay: Amount,
}

/// Outcome of one engine step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub kind: StepKind,
    pub board: Board,
    /// `None` when the step did not win
    pub wins: Option<WinMap>,
    /// Pay per win entry before multipliers
    pub icon_wins: Vec<IconWin>,
    pub tags: MultiplierTags,
    pub frames: FrameMap,
    pub gold: GoldFrames,
    /// Injected cells per column (empty on a fresh step)
    pub injected: Vec<Vec<Injection>>,
    /// Injected upper-row cells as `(index, symbol)`
    pub upper_injected: Vec<(usize, SymbolId)>,
    /// Merge-aware scatter count
    pub scatter_count: usize,
    /// Gold multiplier collected by this step's wins
    pub collected_gold: u64,
    /// Free games were pending when the step began
    pub was_pending: bool,
    pub free_game: FreeGameState,
    pub free_game_event: Option<FreeGameEvent>,
    pub figures: StepFigures,
}

impl StepOutcome {
    pub fn is_win(&self) -> bool {
        self.wins.is_some()
    }

    /// State to feed into the next step
    pub fn to_prior(&self) -> PriorSpinState {
        PriorSpinState {
            board: Some(self.board.clone()),
            wins: self.wins.clone(),
            tags: self.tags.clone(),
            frames: self.frames.clone(),
            gold: self.gold.clone(),
            free_game: self.free_game,
            cumulative_win: self.figures.cumulative_win,
        }
    }
}

/// A full cascade chain: every step until the first non-winning one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinResult {
    pub steps: Vec<StepOutcome>,
}

impl SpinResult {
    pub fn new(steps: Vec<StepOutcome>) -> Self {
        Self { steps }
    }

    /// The settling step
    pub fn last_step(&self) -> Option<&StepOutcome> {
        self.steps.last()
    }

    /// Final board
    pub fn board(&self) -> Option<&Board> {
        self.last_step().map(|s| &s.board)
    }

    /// Cascades after the opening step
    pub fn cascade_count(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// Amount charged across the chain
    pub fn bet_charged(&self) -> Amount {
        self.steps.iter().map(|s| s.figures.bet_charged).sum()
    }

    /// Win across the chain
    pub fn total_win(&self) -> Amount {
        self.steps.iter().map(|s| s.figures.step_win).sum()
    }

    pub fn profit(&self) -> Amount {
        self.total_win() - self.bet_charged()
    }

    pub fn is_win(&self) -> bool {
        self.total_win().is_positive()
    }

    /// Free-game trigger or bonus buy reported by the chain, if any
    pub fn free_game_entered(&self) -> Option<u32> {
        self.steps.iter().find_map(|s| match s.free_game_event {
            Some(FreeGameEvent::Triggered { spins }) => Some(spins),
            Some(FreeGameEvent::Bought { spins, extra_spins }) => {
                Some(spins.saturating_add(extra_spins))
            }
            _ => None,
        })
    }

    /// State to feed into the next spin
    pub fn to_prior(&self) -> PriorSpinState {
        self.last_step().map(StepOutcome::to_prior).unwrap_or_default()
    }

    /// Win over total bet charged
    pub fn win_ratio(&self) -> f64 {
        self.total_win().ratio_to(self.bet_charged())
    }
}
