//! Slot math engine: step and chain orchestration
//!
//! One [`SlotMathEngine::step`] call is either a fresh draw (the prior state
//! carries no win) or one cascade continuation of the prior board. Randomness
//! is consumed in a fixed order: board draw or cascade fill, then multiplier
//! sampling, then gold-frame creation.

use std::collections::BTreeMap;

use rand::Rng;

use crate::board::Board;
use crate::cascade::{CascadeEngine, Injection};
use crate::config::{EngineConfig, UserTier, WeightSource};
use crate::detect::{WinDetector, WinEvaluator, count_icon};
use crate::error::{ConfigError, EngineResult, InvariantViolation};
use crate::frames::FrameMap;
use crate::free_game::{FreeGameMachine, StepSignal};
use crate::generator::BoardGenerator;
use crate::money::{Amount, StepFigures};
use crate::spin::{IconWin, PriorSpinState, SpinRequest, SpinResult, StepKind, StepOutcome};
use crate::symbols::SymbolId;
use crate::tracker::{FeatureTracker, GoldFrames, MultiplierTags};

/// Board generators per weight tier
#[derive(Debug, Clone)]
enum Generators {
    Single(BoardGenerator),
    Tiered(BTreeMap<UserTier, BoardGenerator>),
}

/// Stateless cascading slot math engine.
///
/// Holds only validated configuration and the tables derived from it, so one
/// engine can be shared by reference across threads.
#[derive(Debug, Clone)]
pub struct SlotMathEngine {
    config: EngineConfig,
    generators: Generators,
    detector: WinDetector,
    tracker: FeatureTracker,
    free_game: FreeGameMachine,
}

/// Board, frames and feature state produced before evaluation
struct Landed {
    kind: StepKind,
    board: Board,
    frames: FrameMap,
    tags: MultiplierTags,
    gold: GoldFrames,
    injected: Vec<Vec<Injection>>,
    upper_injected: Vec<(usize, SymbolId)>,
}

impl SlotMathEngine {
    /// Validate `config` and build the sampling tables
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let generators = match &config.weights {
            WeightSource::Single(_) => Generators::Single(BoardGenerator::from_config(&config, None)?),
            WeightSource::Tiered(tiers) => Generators::Tiered(
                tiers
                    .keys()
                    .map(|&tier| {
                        BoardGenerator::from_config(&config, Some(tier)).map(|g| (tier, g))
                    })
                    .collect::<Result<_, _>>()?,
            ),
        };

        log::debug!("Slot math engine ready: {}", config.name);
        Ok(Self {
            detector: WinDetector::from_config(&config),
            tracker: FeatureTracker::from_config(&config)?,
            free_game: FreeGameMachine::new(config.free_game.clone()),
            generators,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detector(&self) -> &WinDetector {
        &self.detector
    }

    /// Generator for a weight tier
    pub fn generator(&self, tier: Option<UserTier>) -> Result<&BoardGenerator, ConfigError> {
        match &self.generators {
            Generators::Single(generator) => Ok(generator),
            Generators::Tiered(tiers) => {
                let tier = tier.ok_or(ConfigError::TierUnset)?;
                tiers
                    .get(&tier)
                    .ok_or_else(|| ConfigError::TierMissing(tier.as_str().to_string()))
            }
        }
    }

    /// Compute one step from the prior state
    pub fn step<R: Rng + ?Sized>(
        &self,
        prior: &PriorSpinState,
        request: &SpinRequest,
        rng: &mut R,
    ) -> EngineResult<StepOutcome> {
        request.stake.validate()?;
        let generator = self.generator(request.tier)?;

        let was_pending = prior.is_pending();
        let cascading = prior.is_cascading();
        let landed = if cascading {
            self.cascade(prior, generator, request, rng)?
        } else {
            self.fresh(generator, rng)?
        };

        let roles = &self.config.roles;
        let wins = self.detector.evaluate(&landed.board);
        if let Some(max) = wins.as_ref().and_then(|w| w.max_position()) {
            landed.board.check_position(max)?;
        }

        let line_bet = request.stake.line_bet();
        let icon_wins: Vec<IconWin> = wins
            .iter()
            .flat_map(|w| w.iter())
            .map(|entry| {
                let pay = self
                    .config
                    .paytable
                    .pay(entry.icon, entry.line_count)
                    .checked_mul(line_bet)
                    .and_then(|pay| pay.checked_mul_int(entry.ways))
                    .ok_or_else(|| {
                        ConfigError::InvalidValue(format!(
                            "pay for {:?} overflows the amount range",
                            entry.key
                        ))
                    })?;
                Ok(IconWin {
                    key: entry.key,
                    icon: entry.icon,
                    pay,
                })
            })
            .collect::<Result<_, ConfigError>>()?;
        let pays: Vec<Amount> = icon_wins.iter().map(|w| w.pay).collect();

        let collected_gold = landed.gold.collected(wins.as_ref());
        let multiplier = landed.tags.total() + collected_gold;

        let fresh_base = !cascading && !was_pending;
        let bet_charged = if fresh_base {
            request.stake.charge()
        } else {
            Amount::ZERO
        };
        let prior_cumulative = if cascading {
            prior.cumulative_win
        } else {
            Amount::ZERO
        };
        let mut figures = StepFigures::settle(&pays, multiplier, prior_cumulative, bet_charged)?;

        let scatter_count = count_icon(&landed.board, &landed.frames, roles.scatter);
        let transition = self.free_game.advance(
            &prior.free_game,
            StepSignal {
                won: wins.is_some(),
                step_win: figures.step_win,
                scatter_count,
                bonus_buy: fresh_base && request.stake.buy_multiplier.is_some(),
            },
        );
        figures.free_game_total = transition.completed_total();

        log::debug!(
            "{:?} step: {} wins, step win {}, multiplier {}, cumulative {}",
            landed.kind,
            wins.as_ref().map_or(0, |w| w.len()),
            figures.step_win,
            figures.multiplier,
            figures.cumulative_win
        );

        Ok(StepOutcome {
            kind: landed.kind,
            board: landed.board,
            wins,
            icon_wins,
            tags: landed.tags,
            frames: landed.frames,
            gold: landed.gold,
            injected: landed.injected,
            upper_injected: landed.upper_injected,
            scatter_count,
            collected_gold,
            was_pending,
            free_game: transition.next,
            free_game_event: transition.event,
            figures,
        })
    }

    /// Run steps until the first non-winning step.
    ///
    /// A chain longer than `limits.max_cascade_steps` is a configuration
    /// error.
    pub fn spin<R: Rng + ?Sized>(
        &self,
        prior: &PriorSpinState,
        request: &SpinRequest,
        rng: &mut R,
    ) -> EngineResult<SpinResult> {
        let ceiling = self.config.limits.max_cascade_steps;
        let mut steps = Vec::new();
        let mut state = prior.clone();

        loop {
            if steps.len() >= ceiling {
                log::warn!("Cascade chain exceeded {} steps", ceiling);
                return Err(ConfigError::CascadeCeiling(ceiling).into());
            }
            let outcome = self.step(&state, request, rng)?;
            let settled = !outcome.is_win();
            state = outcome.to_prior();
            steps.push(outcome);
            if settled {
                break;
            }
        }

        Ok(SpinResult::new(steps))
    }

    fn fresh<R: Rng + ?Sized>(&self, generator: &BoardGenerator, rng: &mut R) -> EngineResult<Landed> {
        let board = generator.draw(rng)?;
        let frames = FrameMap::scan(&board, &self.config.roles);
        let tags = self.tracker.fresh_tags(&board, &frames, rng)?;
        let gold = self.tracker.fresh_gold(&board, rng);
        Ok(Landed {
            kind: StepKind::Fresh,
            board,
            frames,
            tags,
            gold,
            injected: Vec::new(),
            upper_injected: Vec::new(),
        })
    }

    fn cascade<R: Rng + ?Sized>(
        &self,
        prior: &PriorSpinState,
        generator: &BoardGenerator,
        request: &SpinRequest,
        rng: &mut R,
    ) -> EngineResult<Landed> {
        let board = prior.board.as_ref().ok_or(InvariantViolation::MissingPriorBoard)?;
        let wins = prior.wins.as_ref().ok_or(InvariantViolation::MissingWinContext)?;
        if board.column_lengths() != generator.lengths() {
            return Err(InvariantViolation::ShapeMismatch(format!(
                "prior board has columns {:?}, grid expects {:?}",
                board.column_lengths(),
                generator.lengths()
            ))
            .into());
        }

        let outcome = CascadeEngine::new(generator, &self.detector).step(
            board,
            wins,
            request.fill_mode,
            rng,
        )?;
        let frames = prior
            .frames
            .remap(Some(&outcome.plan), &outcome.board, &self.config.roles)?;
        let tags = self.tracker.cascade_tags(
            &prior.tags,
            &outcome.plan,
            &outcome.board,
            outcome.injected_positions(),
            rng,
        )?;
        let gold = self
            .tracker
            .cascade_gold(&prior.gold, &outcome.plan, &outcome.board, rng)?;

        Ok(Landed {
            kind: StepKind::Cascade,
            board: outcome.board,
            frames,
            tags,
            gold,
            injected: outcome.injected,
            upper_injected: outcome.upper_injected,
        })
    }
}
