//! Session statistics

use serde::{Deserialize, Serialize};

use crate::money::Amount;
use crate::spin::SpinResult;

/// Session statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_spins: u64,
    pub total_bet: Amount,
    pub total_win: Amount,
    pub wins: u64,
    pub losses: u64,
    pub free_games_triggered: u64,
    pub free_games_played: u64,
    pub max_win_ratio: f64,
    /// Spins that cascaded at least once
    pub cascade_chains: u64,
    pub longest_chain: usize,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one spin into the totals
    pub fn record(&mut self, result: &SpinResult) {
        self.total_spins += 1;
        let bet = result.bet_charged();
        let win = result.total_win();
        self.total_bet += bet;
        self.total_win += win;

        if win.is_positive() {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        if result.free_game_entered().is_some() {
            self.free_games_triggered += 1;
        }
        if result.steps.first().is_some_and(|s| s.was_pending) {
            self.free_games_played += 1;
        }
        if result.cascade_count() > 0 {
            self.cascade_chains += 1;
        }
        self.longest_chain = self.longest_chain.max(result.cascade_count());

        let ratio = result.win_ratio();
        if ratio > self.max_win_ratio {
            self.max_win_ratio = ratio;
        }
    }

    /// Calculate RTP
    pub fn rtp(&self) -> f64 {
        if self.total_bet.is_positive() {
            self.total_win.ratio_to(self.total_bet) * 100.0
        } else {
            0.0
        }
    }

    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        if self.total_spins > 0 {
            (self.wins as f64 / self.total_spins as f64) * 100.0
        } else {
            0.0
        }
    }
}
