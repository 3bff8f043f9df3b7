//! Weighted tables and board generation

use rand::Rng;

use crate::board::{Board, UpperRow};
use crate::config::{EngineConfig, OccurrenceCap, UpperRowSpec, UserTier, WeightEntry, WeightedValue};
use crate::error::ConfigError;
use crate::symbols::SymbolId;

/// Flat sampling pool: each item repeated `weight` times, drawn uniformly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedPool<T> {
    items: Vec<T>,
}

impl<T: Copy + PartialEq> WeightedPool<T> {
    /// Expand `(item, weight)` pairs. Fails when the pool ends up empty.
    pub fn from_weights<I>(name: &str, weights: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (T, u32)>,
    {
        let mut items = Vec::new();
        for (item, weight) in weights {
            items.extend(std::iter::repeat_n(item, weight as usize));
        }
        if items.is_empty() {
            return Err(ConfigError::ZeroWeight(name.to_string()));
        }
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: T) -> bool {
        self.items.contains(&item)
    }

    /// Distinct items in first-appearance order
    pub fn distinct(&self) -> Vec<T> {
        let mut seen = Vec::new();
        for &item in &self.items {
            if !seen.contains(&item) {
                seen.push(item);
            }
        }
        seen
    }

    /// Uniform draw over the expanded pool
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        self.items[rng.random_range(0..self.items.len())]
    }

    /// Uniform draw over the pool entries accepted by `keep`, preserving
    /// relative weights. `None` when nothing is accepted.
    pub fn draw_filtered<R, F>(&self, rng: &mut R, keep: F) -> Option<T>
    where
        R: Rng + ?Sized,
        F: Fn(T) -> bool,
    {
        let eligible = self.items.iter().filter(|&&item| keep(item)).count();
        if eligible == 0 {
            return None;
        }
        let pick = rng.random_range(0..eligible);
        self.items
            .iter()
            .copied()
            .filter(|&item| keep(item))
            .nth(pick)
    }
}

/// Pool of symbol ids
pub type SymbolPool = WeightedPool<SymbolId>;

/// Pool of multiplier or gold-frame values
pub type ValuePool = WeightedPool<u32>;

impl SymbolPool {
    pub fn from_entries(name: &str, entries: &[WeightEntry]) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyWeightTable(name.to_string()));
        }
        Self::from_weights(name, entries.iter().map(|e| (e.icon, e.weight)))
    }
}

impl ValuePool {
    pub fn from_values(name: &str, values: &[WeightedValue]) -> Result<Self, ConfigError> {
        if values.is_empty() {
            return Err(ConfigError::EmptyWeightTable(name.to_string()));
        }
        Self::from_weights(name, values.iter().map(|v| (v.value, v.weight)))
    }
}

/// Draws boards from per-column pools under occurrence caps
#[derive(Debug, Clone)]
pub struct BoardGenerator {
    column_pools: Vec<SymbolPool>,
    upper_pool: Option<SymbolPool>,
    lengths: Vec<usize>,
    upper: Option<UpperRowSpec>,
    caps: Vec<OccurrenceCap>,
    scatter: SymbolId,
    max_rounds: usize,
}

impl BoardGenerator {
    /// Build the pools for one user tier
    pub fn from_config(config: &EngineConfig, tier: Option<UserTier>) -> Result<Self, ConfigError> {
        let lengths = config.grid.lengths();
        if lengths.is_empty() {
            return Err(ConfigError::InvalidValue("grid has no columns".into()));
        }
        let weights = config.weights.resolve(tier)?;
        let column_pools = (0..lengths.len())
            .map(|column| {
                SymbolPool::from_entries(&format!("column {column}"), weights.column(column)?)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let upper_pool = match (&config.grid.upper_row, &config.upper_weights) {
            (Some(_), Some(entries)) => Some(SymbolPool::from_entries("upper row", entries)?),
            (Some(_), None) => return Err(ConfigError::EmptyWeightTable("upper row".into())),
            (None, _) => None,
        };

        Ok(Self {
            column_pools,
            upper_pool,
            lengths,
            upper: config.grid.upper_row,
            caps: config.caps.clone(),
            scatter: config.roles.scatter,
            max_rounds: config.limits.max_cap_rounds,
        })
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn column_pool(&self, column: usize) -> Option<&SymbolPool> {
        self.column_pools.get(column)
    }

    pub fn upper_pool(&self) -> Option<&SymbolPool> {
        self.upper_pool.as_ref()
    }

    /// Draw a full board, then enforce the first-column scatter rule and the
    /// occurrence caps.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Board, ConfigError> {
        let columns: Vec<Vec<SymbolId>> = self
            .lengths
            .iter()
            .zip(&self.column_pools)
            .map(|(&length, pool)| (0..length).map(|_| pool.draw(rng)).collect())
            .collect();
        let mut board = Board::new(columns);

        if let (Some(spec), Some(pool)) = (self.upper, &self.upper_pool) {
            let cells = (0..spec.length).map(|_| pool.draw(rng)).collect();
            board = board.with_upper(UpperRow {
                start_column: spec.start_column,
                cells,
            });
        }

        self.enforce_first_column(&mut board, rng)?;
        self.enforce_caps(&mut board, rng)?;
        Ok(board)
    }

    /// The first cell is never the scatter and column 0 holds at most one.
    fn enforce_first_column<R: Rng + ?Sized>(
        &self,
        board: &mut Board,
        rng: &mut R,
    ) -> Result<(), ConfigError> {
        let pool = self
            .column_pools
            .first()
            .ok_or(ConfigError::MissingColumnTable {
                column: 0,
                available: 0,
            })?;
        let mut seen = false;
        for row in 0..board.column(0).len() {
            if board.column(0)[row] != self.scatter {
                continue;
            }
            if row == 0 || seen {
                let scatter = self.scatter;
                let symbol = pool
                    .draw_filtered(rng, |s| s != scatter)
                    .ok_or(ConfigError::CapsUnsatisfiable { column: 0 })?;
                board.set(row, symbol);
            } else {
                seen = true;
            }
        }
        Ok(())
    }

    fn enforce_caps<R: Rng + ?Sized>(&self, board: &mut Board, rng: &mut R) -> Result<(), ConfigError> {
        if self.caps.is_empty() {
            return Ok(());
        }

        for round in 0..self.max_rounds {
            let mut excess: Vec<(usize, SymbolId)> = self
                .caps
                .iter()
                .flat_map(|cap| {
                    board
                        .positions_of(cap.icon())
                        .into_iter()
                        .skip(cap.max())
                        .map(move |pos| (pos, cap.icon()))
                })
                .collect();
            if excess.is_empty() {
                if round > 1 {
                    log::debug!("Occurrence caps settled after {} rounds", round);
                }
                return Ok(());
            }

            excess.sort_unstable();
            for (position, icon) in excess {
                if board.get(position) != Some(icon) {
                    continue;
                }
                let Some((column, _)) = board.locate(position) else {
                    continue;
                };
                let symbol = {
                    let full = self.saturated_icons(board);
                    let scatter = self.scatter;
                    self.column_pools[column]
                        .draw_filtered(rng, |s| {
                            s != icon && !full.contains(&s) && !(column == 0 && s == scatter)
                        })
                        .ok_or(ConfigError::CapsUnsatisfiable { column })?
                };
                board.set(position, symbol);
            }
        }

        log::warn!(
            "Occurrence caps did not converge within {} rounds",
            self.max_rounds
        );
        Err(ConfigError::CapsDidNotConverge {
            rounds: self.max_rounds,
        })
    }

    /// Capped icons already at or over their cap
    fn saturated_icons(&self, board: &Board) -> Vec<SymbolId> {
        self.caps
            .iter()
            .filter(|cap| board.positions_of(cap.icon()).len() >= cap.max())
            .map(OccurrenceCap::icon)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReelWeights, WeightSource};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn config_with(entries: Vec<WeightEntry>, caps: Vec<OccurrenceCap>) -> EngineConfig {
        let mut config = EngineConfig::lines_5x4();
        config.weights = WeightSource::Single(ReelWeights::Shared(entries));
        config.caps = caps;
        config
    }

    #[test]
    fn test_empty_grid_is_rejected() {
        let mut config = EngineConfig::lines_5x4();
        config.grid.columns = 0;
        config.grid.column_lengths = None;
        assert!(matches!(
            BoardGenerator::from_config(&config, None),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_pool_expansion() {
        let pool = SymbolPool::from_entries(
            "t",
            &[WeightEntry::new(4, 2), WeightEntry::new(7, 0), WeightEntry::new(9, 1)],
        )
        .unwrap();
        assert_eq!(pool.len(), 3);
        assert!(!pool.contains(7));
        assert_eq!(pool.distinct(), vec![4, 9]);

        assert!(SymbolPool::from_entries("t", &[]).is_err());
        assert!(SymbolPool::from_entries("t", &[WeightEntry::new(1, 0)]).is_err());
    }

    #[test]
    fn test_draw_filtered() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pool = SymbolPool::from_entries("t", &[WeightEntry::new(1, 5), WeightEntry::new(2, 5)])
            .unwrap();
        for _ in 0..50 {
            assert_eq!(pool.draw_filtered(&mut rng, |s| s != 1), Some(2));
        }
        assert_eq!(pool.draw_filtered(&mut rng, |_| false), None);
    }

    #[test]
    fn test_board_shape_follows_grid() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = EngineConfig::cascade_6x5();
        let generator = BoardGenerator::from_config(&config, None).unwrap();
        let board = generator.draw(&mut rng).unwrap();
        assert_eq!(board.column_lengths(), vec![5; 6]);
        assert_eq!(board.upper().map(|u| u.cells.len()), Some(4));
    }

    #[test]
    fn test_first_column_scatter_rule() {
        // Scatter-heavy pool: without the rule column 0 would be mostly scatters
        let config = config_with(
            vec![WeightEntry::new(1, 50), WeightEntry::new(2, 1), WeightEntry::new(3, 1)],
            Vec::new(),
        );
        let generator = BoardGenerator::from_config(&config, None).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..200 {
            let board = generator.draw(&mut rng).unwrap();
            assert_ne!(board.column(0)[0], 1);
            assert!(board.column(0).iter().filter(|&&s| s == 1).count() <= 1);
        }
    }

    #[test]
    fn test_caps_hold() {
        let config = config_with(
            vec![WeightEntry::new(5, 40), WeightEntry::new(6, 1), WeightEntry::new(7, 1)],
            vec![OccurrenceCap(5, 2), OccurrenceCap(6, 3)],
        );
        let generator = BoardGenerator::from_config(&config, None).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            let board = generator.draw(&mut rng).unwrap();
            assert!(board.positions_of(5).len() <= 2);
            assert!(board.positions_of(6).len() <= 3);
        }
    }

    #[test]
    fn test_unsatisfiable_caps() {
        // Twenty cells, only two capped icons allowed four cells between them
        let config = config_with(
            vec![WeightEntry::new(5, 1), WeightEntry::new(6, 1)],
            vec![OccurrenceCap(5, 2), OccurrenceCap(6, 2)],
        );
        let generator = BoardGenerator::from_config(&config, None).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(matches!(
            generator.draw(&mut rng),
            Err(ConfigError::CapsUnsatisfiable { .. })
        ));
    }

    #[test]
    fn test_tier_required() {
        let mut config = EngineConfig::lines_5x4();
        let weights = match &config.weights {
            WeightSource::Single(w) => w.clone(),
            WeightSource::Tiered(_) => unreachable!(),
        };
        config.weights = WeightSource::Tiered([(UserTier::Common, weights)].into());
        assert_eq!(
            BoardGenerator::from_config(&config, None).err(),
            Some(ConfigError::TierUnset)
        );
        assert!(BoardGenerator::from_config(&config, Some(UserTier::Common)).is_ok());
    }
}
