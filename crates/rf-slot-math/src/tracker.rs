//! Multiplier tags and gold frames
//!
//! Both are sparse maps keyed by flat position. They survive cascades by
//! following the gravity remap; a removed cell takes its tag or gold value
//! with it.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::{Board, Position};
use crate::cascade::RemovalPlan;
use crate::config::EngineConfig;
use crate::detect::WinMap;
use crate::error::{ConfigError, EngineError, InvariantViolation};
use crate::frames::FrameMap;
use crate::generator::ValuePool;
use crate::symbols::{SymbolId, SymbolRoles};

/// Remap every key of a position map, dropping removed cells
fn remap_keys(
    values: &BTreeMap<Position, u32>,
    plan: &RemovalPlan,
) -> Result<BTreeMap<Position, u32>, InvariantViolation> {
    let mut remapped = BTreeMap::new();
    for (&pos, &value) in values {
        if let Some(target) = plan.remap(pos)? {
            remapped.insert(target, value);
        }
    }
    Ok(remapped)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MULTIPLIER TAGS
// ═══════════════════════════════════════════════════════════════════════════════

/// `(position, value)` multiplier tags, ascending by position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiplierTags {
    tags: BTreeMap<Position, u32>,
}

impl MultiplierTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Position, u32)>) -> Self {
        Self {
            tags: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, position: Position) -> Option<u32> {
        self.tags.get(&position).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, u32)> + '_ {
        self.tags.iter().map(|(p, v)| (*p, *v))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Sum of all tag values
    pub fn total(&self) -> u64 {
        self.tags.values().map(|&v| v as u64).sum()
    }

    /// Follow a cascade step
    pub fn remap(&self, plan: &RemovalPlan) -> Result<Self, InvariantViolation> {
        Ok(Self {
            tags: remap_keys(&self.tags, plan)?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GOLD FRAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Positions carrying a gold-frame value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoldFrames {
    values: BTreeMap<Position, u32>,
}

impl GoldFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Position, u32)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, position: Position) -> Option<u32> {
        self.values.get(&position).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, u32)> + '_ {
        self.values.iter().map(|(p, v)| (*p, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Add `value` at `position`
    pub fn add(&mut self, position: Position, value: u32) {
        *self.values.entry(position).or_insert(0) += value;
    }

    /// Sum of gold values sitting on matched positions
    pub fn collected(&self, wins: Option<&WinMap>) -> u64 {
        let Some(wins) = wins else {
            return 0;
        };
        wins.all_positions()
            .iter()
            .filter_map(|pos| self.values.get(pos))
            .map(|&v| v as u64)
            .sum()
    }

    /// Follow a cascade step
    pub fn remap(&self, plan: &RemovalPlan) -> Result<Self, InvariantViolation> {
        Ok(Self {
            values: remap_keys(&self.values, plan)?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRACKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Value tables for the multiplier icon
#[derive(Debug, Clone)]
pub struct MultiplierTables {
    single: ValuePool,
    merged: BTreeMap<usize, ValuePool>,
}

impl MultiplierTables {
    /// Sample a value for a unit of `size` cells
    pub fn sample<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<u32, ConfigError> {
        if size <= 1 {
            return Ok(self.single.draw(rng));
        }
        let merge_count = size - 1;
        self.merged
            .get(&merge_count)
            .map(|pool| pool.draw(rng))
            .ok_or(ConfigError::MissingMultiplierTable(merge_count))
    }
}

/// Samples multiplier tags and gold frames for fresh and cascading steps
#[derive(Debug, Clone)]
pub struct FeatureTracker {
    roles: SymbolRoles,
    multiplier_icon: Option<SymbolId>,
    tables: Option<MultiplierTables>,
    gold_rate: u32,
    gold_values: Option<ValuePool>,
}

impl FeatureTracker {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let tables = match (&config.roles.multiplier_icon, &config.multipliers) {
            (Some(_), Some(tables)) => Some(MultiplierTables {
                single: ValuePool::from_values("multipliers.single", &tables.single)?,
                merged: tables
                    .merged
                    .iter()
                    .map(|(&count, values)| {
                        ValuePool::from_values(&format!("multipliers.merged[{count}]"), values)
                            .map(|pool| (count, pool))
                    })
                    .collect::<Result<_, _>>()?,
            }),
            (Some(_), None) => return Err(ConfigError::EmptyWeightTable("multipliers".into())),
            (None, _) => None,
        };

        let (gold_rate, gold_values) = match &config.gold_frames {
            Some(gold) if gold.rate_per_mille > 0 => (
                gold.rate_per_mille,
                Some(ValuePool::from_values("gold_frames.values", &gold.values)?),
            ),
            _ => (0, None),
        };

        Ok(Self {
            roles: config.roles.clone(),
            multiplier_icon: config.roles.multiplier_icon,
            tables,
            gold_rate,
            gold_values,
        })
    }

    /// Tags for a freshly drawn board: one per multiplier-icon unit (a lone
    /// cell or a whole frame), placed on the unit's last position.
    pub fn fresh_tags<R: Rng + ?Sized>(
        &self,
        board: &Board,
        frames: &FrameMap,
        rng: &mut R,
    ) -> Result<MultiplierTags, ConfigError> {
        let (Some(icon), Some(tables)) = (self.multiplier_icon, &self.tables) else {
            return Ok(MultiplierTags::new());
        };

        let mut units: BTreeMap<Position, usize> = BTreeMap::new();
        for pos in board.positions_of(icon) {
            match frames.covering(pos, icon) {
                Some(frame) => units.insert(frame.last_pos, frame.size()),
                None => units.insert(pos, 1),
            };
        }

        let mut tags = MultiplierTags::new();
        for (pos, size) in units {
            tags.tags.insert(pos, tables.sample(size, rng)?);
        }
        Ok(tags)
    }

    /// Tags after a cascade step: survivors follow the remap, injected
    /// multiplier icons sample from the single-cell table.
    pub fn cascade_tags<R, I>(
        &self,
        prior: &MultiplierTags,
        plan: &RemovalPlan,
        board: &Board,
        injected: I,
        rng: &mut R,
    ) -> Result<MultiplierTags, EngineError>
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = Position>,
    {
        let mut tags = prior.remap(plan)?;
        let (Some(icon), Some(tables)) = (self.multiplier_icon, &self.tables) else {
            return Ok(tags);
        };
        for pos in injected {
            if board.get(pos) == Some(icon) {
                tags.tags.insert(pos, tables.sample(1, rng)?);
            }
        }
        Ok(tags)
    }

    /// Roll for new gold frames. Each column gets one rate check; on success a
    /// plain cell without gold among `candidates(column)` is picked uniformly.
    fn roll_gold<R, F>(&self, board: &Board, gold: &mut GoldFrames, rng: &mut R, candidates: F)
    where
        R: Rng + ?Sized,
        F: Fn(usize) -> Vec<Position>,
    {
        let Some(values) = &self.gold_values else {
            return;
        };
        for column in 0..board.column_count() {
            if rng.random_range(0..1000) >= self.gold_rate {
                continue;
            }
            let eligible: Vec<Position> = candidates(column)
                .into_iter()
                .filter(|&pos| {
                    board.get(pos).is_some_and(|s| self.roles.is_plain(s)) && gold.get(pos).is_none()
                })
                .collect();
            if eligible.is_empty() {
                continue;
            }
            let pos = eligible[rng.random_range(0..eligible.len())];
            gold.add(pos, values.draw(rng));
        }
    }

    /// Gold frames for a freshly drawn board
    pub fn fresh_gold<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> GoldFrames {
        let mut gold = GoldFrames::new();
        self.roll_gold(board, &mut gold, rng, |column| board.column_range(column).collect());
        gold
    }

    /// Gold frames after a cascade step: survivors follow the remap, new
    /// frames may land on injected cells only.
    pub fn cascade_gold<R: Rng + ?Sized>(
        &self,
        prior: &GoldFrames,
        plan: &RemovalPlan,
        board: &Board,
        rng: &mut R,
    ) -> Result<GoldFrames, InvariantViolation> {
        let mut gold = prior.remap(plan)?;
        self.roll_gold(board, &mut gold, rng, |column| {
            plan.injected_positions(column).collect()
        });
        Ok(gold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GoldFrameConfig, MultiplierConfig, WeightedValue};
    use crate::detect::{WinEntry, WinKey};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    #[test]
    fn test_tag_remap_discards_removed() {
        let board = Board::new(vec![vec![3, 4, 5], vec![6, 7, 8]]);
        let tags = MultiplierTags::from_pairs([(0, 2), (1, 5), (4, 10)]);
        let plan = RemovalPlan::new(&board, &BTreeSet::from([1, 5]), &BTreeSet::new()).unwrap();
        let remapped = tags.remap(&plan).unwrap();
        assert_eq!(remapped.iter().collect::<Vec<_>>(), vec![(1, 2), (5, 10)]);
        assert_eq!(remapped.total(), 12);
    }

    #[test]
    fn test_collected_gold() {
        let gold = GoldFrames::from_pairs([(1, 2), (4, 5), (7, 3)]);
        let wins = WinMap::from_entries(vec![WinEntry {
            key: WinKey::Icon(9),
            icon: 9,
            positions: vec![0, 4, 7],
            wild_positions: Vec::new(),
            upper_positions: Vec::new(),
            line_count: 3,
            ways: 1,
        }]);
        assert_eq!(gold.collected(wins.as_ref()), 8);
        assert_eq!(gold.collected(None), 0);
    }

    #[test]
    fn test_fresh_tags_follow_frames() {
        let config = EngineConfig::cascade_6x5();
        let tracker = FeatureTracker::from_config(&config).unwrap();
        // Wild frame of three at rows 0..=2 of column 0, single wild in column 1
        let board = Board::new(vec![
            vec![0, 0, 0, 4, 5],
            vec![6, 0, 7, 8, 9],
            vec![2, 3, 4, 5, 6],
            vec![2, 3, 4, 5, 6],
            vec![2, 3, 4, 5, 6],
            vec![2, 3, 4, 5, 6],
        ]);
        let frames = FrameMap::scan(&board, &config.roles);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let tags = tracker.fresh_tags(&board, &frames, &mut rng).unwrap();
        let positions: Vec<Position> = tags.iter().map(|(p, _)| p).collect();
        assert_eq!(positions, vec![2, 6]);
        assert!([10, 25].contains(&tags.get(2).unwrap()));
        assert!([2, 3, 5, 10].contains(&tags.get(6).unwrap()));
    }

    #[test]
    fn test_gold_only_on_plain_cells() {
        let mut config = EngineConfig::cascade_6x5();
        config.gold_frames = Some(GoldFrameConfig {
            rate_per_mille: 1000,
            values: vec![WeightedValue::new(4, 1)],
        });
        let tracker = FeatureTracker::from_config(&config).unwrap();
        let board = Board::new(vec![vec![0, 1, 7], vec![0, 0, 1]]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let gold = tracker.fresh_gold(&board, &mut rng);
        // Column 0 has a single plain cell, column 1 none
        assert_eq!(gold.iter().collect::<Vec<_>>(), vec![(2, 4)]);
    }

    #[test]
    fn test_cascade_tags_sample_injected_cells_from_single_table() {
        let mut config = EngineConfig::cascade_6x5();
        config.multipliers = Some(MultiplierConfig {
            single: vec![WeightedValue::new(7, 1)],
            merged: BTreeMap::from([
                (1, vec![WeightedValue::new(50, 1)]),
                (2, vec![WeightedValue::new(50, 1)]),
            ]),
        });
        let tracker = FeatureTracker::from_config(&config).unwrap();

        let before = Board::new(vec![vec![0, 3, 4, 5, 6], vec![0, 7, 8, 9, 2]]);
        let prior = MultiplierTags::from_pairs([(0, 25), (5, 3)]);
        let plan = RemovalPlan::new(&before, &BTreeSet::from([1, 3]), &BTreeSet::new()).unwrap();
        // Two wilds dropped in on top of the tagged survivor form a run of three
        let after = Board::new(vec![vec![0, 0, 0, 4, 6], vec![0, 7, 8, 9, 2]]);
        let injected: Vec<Position> = (0..plan.column_count())
            .flat_map(|c| plan.injected_positions(c))
            .collect();
        assert_eq!(injected, vec![0, 1]);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let tags = tracker
            .cascade_tags(&prior, &plan, &after, injected, &mut rng)
            .unwrap();
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec![(0, 7), (1, 7), (2, 25), (5, 3)]);
    }

    #[test]
    fn test_cascade_gold_lands_on_injected_cells_and_carries_survivors() {
        let mut config = EngineConfig::cascade_6x5();
        config.gold_frames = Some(GoldFrameConfig {
            rate_per_mille: 1000,
            values: vec![WeightedValue::new(4, 1)],
        });
        let tracker = FeatureTracker::from_config(&config).unwrap();

        let before = Board::new(vec![
            vec![2, 3, 4, 5, 6],
            vec![7, 8, 9, 2, 3],
            vec![2, 3, 4, 5, 6],
        ]);
        let prior = GoldFrames::from_pairs([(2, 9), (3, 1), (8, 6)]);
        let plan = RemovalPlan::new(&before, &BTreeSet::from([3, 9, 10]), &BTreeSet::new()).unwrap();
        // Column 2 refills with a wild, which never takes gold
        let after = Board::new(vec![
            vec![8, 2, 3, 4, 6],
            vec![9, 7, 8, 9, 2],
            vec![0, 3, 4, 5, 6],
        ]);

        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let gold = tracker.cascade_gold(&prior, &plan, &after, &mut rng).unwrap();
        assert_eq!(
            gold.iter().collect::<Vec<_>>(),
            vec![(0, 4), (3, 9), (5, 4), (9, 6)]
        );
    }
}
