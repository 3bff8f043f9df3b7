//! Free-game state machine
//!
//! `Base` → `Pending` on a scatter trigger or a bonus buy. While pending, a
//! winning step keeps the budget and banks its win; a non-winning step spends
//! one spin. A non-winning step at zero remaining ends the run.

use serde::{Deserialize, Serialize};

use crate::config::FreeGameConfig;
use crate::money::Amount;

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Counter carried while free games are pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FreeGameCounter {
    /// Spins left after the current one
    pub remaining: u32,
    /// Spins awarded over the whole run, retriggers included
    pub total_awarded: u32,
    /// Win banked during the run
    pub accumulated_win: Amount,
}

impl FreeGameCounter {
    pub fn new(spins: u32) -> Self {
        Self {
            remaining: spins,
            total_awarded: spins,
            accumulated_win: Amount::ZERO,
        }
    }
}

/// Free-game mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FreeGameState {
    #[default]
    Base,
    Pending(FreeGameCounter),
}

impl FreeGameState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn counter(&self) -> Option<&FreeGameCounter> {
        match self {
            Self::Pending(counter) => Some(counter),
            Self::Base => None,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.counter().map_or(0, |c| c.remaining)
    }
}

/// Transition reported by one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FreeGameEvent {
    /// Scatter trigger from the base game
    Triggered { spins: u32 },
    /// Bonus buy from the base game; `extra_spins` is a retrigger scored by
    /// the bought spin itself
    Bought { spins: u32, extra_spins: u32 },
    /// Scatter trigger during the run
    Retriggered { spins: u32 },
    /// A free spin was spent
    Consumed { remaining: u32 },
    /// The run ended
    Completed { total_win: Amount },
}

/// What one step contributes to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSignal {
    /// The step produced a win
    pub won: bool,
    /// Win of this step after multipliers
    pub step_win: Amount,
    /// Merge-aware scatter count on the step's board
    pub scatter_count: usize,
    /// Fresh base-game step paid as a bonus buy
    pub bonus_buy: bool,
}

/// Result of advancing the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeGameTransition {
    pub next: FreeGameState,
    pub event: Option<FreeGameEvent>,
}

impl FreeGameTransition {
    fn stay(next: FreeGameState) -> Self {
        Self { next, event: None }
    }

    /// Run total when this transition ends the run
    pub fn completed_total(&self) -> Option<Amount> {
        match self.event {
            Some(FreeGameEvent::Completed { total_win }) => Some(total_win),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Free-game transition rules
#[derive(Debug, Clone)]
pub struct FreeGameMachine {
    config: FreeGameConfig,
}

impl FreeGameMachine {
    pub fn new(config: FreeGameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FreeGameConfig {
        &self.config
    }

    /// Advance from the prior snapshot
    pub fn advance(&self, prior: &FreeGameState, signal: StepSignal) -> FreeGameTransition {
        match prior {
            FreeGameState::Base => self.advance_base(signal),
            FreeGameState::Pending(counter) => self.advance_pending(*counter, signal),
        }
    }

    fn advance_base(&self, signal: StepSignal) -> FreeGameTransition {
        // The bought spin is the first spin of the run
        if signal.bonus_buy {
            let spins = self.config.base_plays;
            log::info!("Free games bought: {} spins", spins);
            let mut transition = self.advance_pending(FreeGameCounter::new(spins), signal);
            let extra_spins = match transition.event {
                Some(FreeGameEvent::Retriggered { spins }) => spins,
                _ => 0,
            };
            if transition.completed_total().is_none() {
                transition.event = Some(FreeGameEvent::Bought { spins, extra_spins });
            }
            return transition;
        }
        // Scatters stay on the board for the whole chain, so the trigger is
        // read once the chain settles
        if signal.won {
            return FreeGameTransition::stay(FreeGameState::Base);
        }
        match self.config.award_for(signal.scatter_count) {
            Some(spins) => {
                log::info!(
                    "Free games triggered by {} scatters: {} spins",
                    signal.scatter_count,
                    spins
                );
                FreeGameTransition {
                    next: FreeGameState::Pending(FreeGameCounter::new(spins)),
                    event: Some(FreeGameEvent::Triggered { spins }),
                }
            }
            None => FreeGameTransition::stay(FreeGameState::Base),
        }
    }

    fn advance_pending(&self, mut counter: FreeGameCounter, signal: StepSignal) -> FreeGameTransition {
        if signal.won {
            counter.accumulated_win += signal.step_win;
            return FreeGameTransition::stay(FreeGameState::Pending(counter));
        }

        let mut event = None;
        if self.config.allow_retrigger {
            if let Some(spins) = self.config.award_for(signal.scatter_count) {
                counter.remaining += spins;
                counter.total_awarded += spins;
                log::info!("Free games retriggered: +{} spins", spins);
                event = Some(FreeGameEvent::Retriggered { spins });
            }
        }

        if counter.remaining == 0 {
            log::info!(
                "Free games completed after {} spins, total {}",
                counter.total_awarded,
                counter.accumulated_win
            );
            return FreeGameTransition {
                next: FreeGameState::Base,
                event: Some(FreeGameEvent::Completed {
                    total_win: counter.accumulated_win,
                }),
            };
        }

        counter.remaining -= 1;
        FreeGameTransition {
            next: FreeGameState::Pending(counter),
            event: event.or(Some(FreeGameEvent::Consumed {
                remaining: counter.remaining,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(won: bool, step_win: i64, scatter_count: usize) -> StepSignal {
        StepSignal {
            won,
            step_win: Amount::from_int(step_win),
            scatter_count,
            bonus_buy: false,
        }
    }

    #[test]
    fn test_trigger_from_base() {
        let machine = FreeGameMachine::new(FreeGameConfig::default());
        let t = machine.advance(&FreeGameState::Base, signal(false, 0, 3));
        assert_eq!(t.next, FreeGameState::Base);
        assert!(t.event.is_none());

        let t = machine.advance(&FreeGameState::Base, signal(false, 0, 5));
        assert_eq!(t.next, FreeGameState::Pending(FreeGameCounter::new(12)));
        assert_eq!(t.event, Some(FreeGameEvent::Triggered { spins: 12 }));

        // A winning step defers the trigger to the end of the chain
        let t = machine.advance(&FreeGameState::Base, signal(true, 4, 5));
        assert_eq!(t.next, FreeGameState::Base);
    }

    #[test]
    fn test_run_lifecycle() {
        let machine = FreeGameMachine::new(FreeGameConfig::default());
        let mut state = FreeGameState::Pending(FreeGameCounter::new(2));

        state = machine.advance(&state, signal(true, 5, 0)).next;
        assert_eq!(state.remaining(), 2);

        state = machine.advance(&state, signal(false, 0, 0)).next;
        assert_eq!(state.remaining(), 1);

        state = machine.advance(&state, signal(true, 3, 0)).next;
        state = machine.advance(&state, signal(false, 0, 0)).next;
        assert_eq!(state.remaining(), 0);
        assert!(state.is_pending());

        let t = machine.advance(&state, signal(false, 0, 0));
        assert_eq!(t.next, FreeGameState::Base);
        assert_eq!(t.completed_total(), Some(Amount::from_int(8)));
    }

    #[test]
    fn test_retrigger_adds_spins() {
        let machine = FreeGameMachine::new(FreeGameConfig::default());
        let state = FreeGameState::Pending(FreeGameCounter::new(0));
        let t = machine.advance(&state, signal(false, 0, 4));
        let counter = t.next.counter().copied().unwrap();
        assert_eq!(counter.remaining, 9);
        assert_eq!(counter.total_awarded, 10);
        assert_eq!(t.event, Some(FreeGameEvent::Retriggered { spins: 10 }));

        let machine = FreeGameMachine::new(FreeGameConfig {
            allow_retrigger: false,
            ..FreeGameConfig::default()
        });
        let t = machine.advance(&state, signal(false, 0, 4));
        assert_eq!(t.next, FreeGameState::Base);
    }

    #[test]
    fn test_bonus_buy() {
        let machine = FreeGameMachine::new(FreeGameConfig::default());
        let t = machine.advance(
            &FreeGameState::Base,
            StepSignal {
                bonus_buy: true,
                ..signal(false, 0, 0)
            },
        );
        assert_eq!(t.next.remaining(), 9);
        assert_eq!(
            t.event,
            Some(FreeGameEvent::Bought {
                spins: 10,
                extra_spins: 0
            })
        );

        // A winning bought spin banks its win and keeps the budget
        let t = machine.advance(
            &FreeGameState::Base,
            StepSignal {
                bonus_buy: true,
                ..signal(true, 6, 0)
            },
        );
        let counter = t.next.counter().copied().unwrap();
        assert_eq!(counter.remaining, 10);
        assert_eq!(counter.accumulated_win, Amount::from_int(6));
    }

    #[test]
    fn test_bought_spin_that_retriggers_reports_both() {
        let machine = FreeGameMachine::new(FreeGameConfig::default());
        let t = machine.advance(
            &FreeGameState::Base,
            StepSignal {
                bonus_buy: true,
                ..signal(false, 0, 4)
            },
        );
        let counter = t.next.counter().copied().unwrap();
        assert_eq!(counter.remaining, 19);
        assert_eq!(counter.total_awarded, 20);
        assert_eq!(
            t.event,
            Some(FreeGameEvent::Bought {
                spins: 10,
                extra_spins: 10
            })
        );
    }

    #[test]
    fn test_state_serde() {
        let state = FreeGameState::Pending(FreeGameCounter::new(3));
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"mode\":\"pending\""));
        assert_eq!(serde_json::from_str::<FreeGameState>(&json).unwrap(), state);
    }
}
