//! Slot math engine configuration

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::money::Amount;
use crate::paytable::{PayTable, Payline, standard_5x4_paylines, validate_paylines};
use crate::symbols::{SymbolId, SymbolRoles};

/// Grid specification (columns × rows, optionally ragged)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of columns
    pub columns: usize,
    /// Rows per column when all columns share one length
    pub rows: usize,
    /// Explicit per-column lengths (overrides `rows`)
    #[serde(default)]
    pub column_lengths: Option<Vec<usize>>,
    /// Upper row above the columns, if the game has one
    #[serde(default)]
    pub upper_row: Option<UpperRowSpec>,
}

/// Upper row placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpperRowSpec {
    /// Column under the first upper cell
    pub start_column: usize,
    /// Number of upper cells
    pub length: usize,
}

impl GridSpec {
    /// Fixed-length columns
    pub fn fixed(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            column_lengths: None,
            upper_row: None,
        }
    }

    /// Ragged columns
    pub fn ragged(lengths: Vec<usize>) -> Self {
        Self {
            columns: lengths.len(),
            rows: lengths.iter().copied().max().unwrap_or(0),
            column_lengths: Some(lengths),
            upper_row: None,
        }
    }

    /// Standard 5×3 line game
    pub fn standard_5x3() -> Self {
        Self::fixed(5, 3)
    }

    /// 6×5 cascading grid with a four-cell upper row over columns 1..=4
    pub fn cascade_6x5() -> Self {
        Self {
            upper_row: Some(UpperRowSpec {
                start_column: 1,
                length: 4,
            }),
            ..Self::fixed(6, 5)
        }
    }

    /// Length of every column
    pub fn lengths(&self) -> Vec<usize> {
        match &self.column_lengths {
            Some(lengths) => lengths.clone(),
            None => vec![self.rows; self.columns],
        }
    }

    /// Total grid positions (upper row excluded)
    pub fn total_positions(&self) -> usize {
        self.lengths().iter().sum()
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::standard_5x3()
    }
}

// ============================================================================
// WEIGHT TABLES
// ============================================================================

/// User tier selecting a weight table set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTier {
    Trial,
    New,
    Common,
}

impl UserTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::New => "new",
            Self::Common => "common",
        }
    }
}

/// `{icon, weight}` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub icon: SymbolId,
    pub weight: u32,
}

impl WeightEntry {
    pub fn new(icon: SymbolId, weight: u32) -> Self {
        Self { icon, weight }
    }
}

/// `{value, weight}` entry for multiplier and gold-frame values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedValue {
    pub value: u32,
    pub weight: u32,
}

impl WeightedValue {
    pub fn new(value: u32, weight: u32) -> Self {
        Self { value, weight }
    }
}

/// Reel weights, shared by all columns or one list per column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReelWeights {
    Shared(Vec<WeightEntry>),
    PerColumn(Vec<Vec<WeightEntry>>),
}

impl ReelWeights {
    /// Weight list for `column`
    pub fn column(&self, column: usize) -> Result<&[WeightEntry], ConfigError> {
        match self {
            Self::Shared(entries) => Ok(entries),
            Self::PerColumn(columns) => columns.get(column).map(Vec::as_slice).ok_or(
                ConfigError::MissingColumnTable {
                    column,
                    available: columns.len(),
                },
            ),
        }
    }

    fn tables(&self) -> Vec<&[WeightEntry]> {
        match self {
            Self::Shared(entries) => vec![entries.as_slice()],
            Self::PerColumn(columns) => columns.iter().map(Vec::as_slice).collect(),
        }
    }
}

/// Weight source, optionally keyed by user tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightSource {
    Single(ReelWeights),
    Tiered(BTreeMap<UserTier, ReelWeights>),
}

impl WeightSource {
    /// Pick the weights in effect for a tier
    pub fn resolve(&self, tier: Option<UserTier>) -> Result<&ReelWeights, ConfigError> {
        match self {
            Self::Single(weights) => Ok(weights),
            Self::Tiered(tiers) => {
                let tier = tier.ok_or(ConfigError::TierUnset)?;
                tiers
                    .get(&tier)
                    .ok_or_else(|| ConfigError::TierMissing(tier.as_str().to_string()))
            }
        }
    }

    fn all(&self) -> Vec<(String, &ReelWeights)> {
        match self {
            Self::Single(weights) => vec![("reels".to_string(), weights)],
            Self::Tiered(tiers) => tiers
                .iter()
                .map(|(tier, weights)| (format!("reels[{}]", tier.as_str()), weights))
                .collect(),
        }
    }
}

/// `[icon, maxCount]` occurrence cap across the whole board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceCap(pub SymbolId, pub usize);

impl OccurrenceCap {
    pub fn icon(&self) -> SymbolId {
        self.0
    }

    pub fn max(&self) -> usize {
        self.1
    }
}

// ============================================================================
// FEATURES
// ============================================================================

/// Win detection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinStrategy {
    /// Connected column-by-column matching from column 0
    #[default]
    Adjacency,
    /// Explicit payline routes
    FixedRoute,
}

/// Multiplier value tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplierConfig {
    /// Values for an unmerged multiplier icon
    pub single: Vec<WeightedValue>,
    /// Values for merged frames, keyed by merge count (`frame size - 1`)
    #[serde(default)]
    pub merged: BTreeMap<usize, Vec<WeightedValue>>,
}

/// Gold-frame creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldFrameConfig {
    /// Chance per column, in 1/1000
    pub rate_per_mille: u32,
    /// Gold-frame values
    pub values: Vec<WeightedValue>,
}

/// Free-game trigger and award parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeGameConfig {
    /// Scatter count must exceed this to trigger
    pub trigger_above: usize,
    /// Scatter count that earns exactly `base_plays`
    pub radix: usize,
    /// Extra spins per scatter above `radix`
    pub per_extra_spins: u32,
    /// Spins awarded at `radix` scatters (and on a bonus buy)
    pub base_plays: u32,
    /// Can retrigger during the feature
    pub allow_retrigger: bool,
}

impl Default for FreeGameConfig {
    fn default() -> Self {
        Self {
            trigger_above: 3,
            radix: 4,
            per_extra_spins: 2,
            base_plays: 10,
            allow_retrigger: true,
        }
    }
}

impl FreeGameConfig {
    /// Spins awarded for a trigger with `count` scatters
    pub fn award_for(&self, count: usize) -> Option<u32> {
        (count > self.trigger_above).then(|| {
            let extra = count.saturating_sub(self.radix) as u32;
            extra * self.per_extra_spins + self.base_plays
        })
    }
}

/// Safety ceilings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLimits {
    /// Longest allowed column
    pub max_column_length: usize,
    /// Longest cascade chain a single spin may run
    pub max_cascade_steps: usize,
    /// Resampling rounds allowed for occurrence caps
    pub max_cap_rounds: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_column_length: 12,
            max_cascade_steps: 256,
            max_cap_rounds: 64,
        }
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Game name
    pub name: String,
    /// Grid specification
    pub grid: GridSpec,
    /// Icon roles and merge caps
    pub roles: SymbolRoles,
    /// Main board weights
    pub weights: WeightSource,
    /// Upper row weights
    #[serde(default)]
    pub upper_weights: Option<Vec<WeightEntry>>,
    /// Board-wide occurrence caps
    #[serde(default)]
    pub caps: Vec<OccurrenceCap>,
    /// Win detection strategy
    #[serde(default)]
    pub strategy: WinStrategy,
    /// Minimum consecutive columns for a win
    #[serde(default = "default_min_match")]
    pub min_match: usize,
    /// Payline routes (fixed-route strategy)
    #[serde(default)]
    pub paylines: Vec<Payline>,
    /// Pay schedule
    pub paytable: PayTable,
    /// Multiplier tables (required when the roles name a multiplier icon)
    #[serde(default)]
    pub multipliers: Option<MultiplierConfig>,
    /// Gold-frame creation
    #[serde(default)]
    pub gold_frames: Option<GoldFrameConfig>,
    /// Free-game parameters
    #[serde(default)]
    pub free_game: FreeGameConfig,
    /// Safety ceilings
    #[serde(default)]
    pub limits: EngineLimits,
}

fn default_min_match() -> usize {
    3
}

impl EngineConfig {
    /// 6×5 adjacency game with an upper row, merging wild multipliers and gold frames
    pub fn cascade_6x5() -> Self {
        let plain: Vec<SymbolId> = (2..=11).collect();
        let mut reel = vec![WeightEntry::new(0, 4), WeightEntry::new(1, 3)];
        reel.extend(plain.iter().map(|&icon| WeightEntry::new(icon, 30 - icon)));
        let upper: Vec<WeightEntry> = plain
            .iter()
            .map(|&icon| WeightEntry::new(icon, 10))
            .chain([WeightEntry::new(0, 2)])
            .collect();

        let mut paytable = PayTable::new();
        for &icon in &plain {
            let base = Amount::from_raw(5_000_000 * (13 - icon as i64));
            paytable = paytable.with_pays(
                icon,
                &[(3, base), (4, base.mul_int(2)), (5, base.mul_int(4)), (6, base.mul_int(10))],
            );
        }

        Self {
            name: "Cascade 6x5".into(),
            grid: GridSpec::cascade_6x5(),
            roles: SymbolRoles::new(0, 1)
                .with_merge(0, 3)
                .with_merge(1, 2)
                .with_multiplier_icon(0),
            weights: WeightSource::Single(ReelWeights::Shared(reel)),
            upper_weights: Some(upper),
            caps: vec![OccurrenceCap(0, 4), OccurrenceCap(1, 6)],
            strategy: WinStrategy::Adjacency,
            min_match: 3,
            paylines: Vec::new(),
            paytable,
            multipliers: Some(MultiplierConfig {
                single: vec![
                    WeightedValue::new(2, 60),
                    WeightedValue::new(3, 25),
                    WeightedValue::new(5, 10),
                    WeightedValue::new(10, 5),
                ],
                merged: BTreeMap::from([
                    (1, vec![WeightedValue::new(5, 70), WeightedValue::new(10, 30)]),
                    (2, vec![WeightedValue::new(10, 60), WeightedValue::new(25, 40)]),
                ]),
            }),
            gold_frames: Some(GoldFrameConfig {
                rate_per_mille: 80,
                values: vec![WeightedValue::new(2, 80), WeightedValue::new(5, 20)],
            }),
            free_game: FreeGameConfig::default(),
            limits: EngineLimits::default(),
        }
    }

    /// 5×4 fixed-route game with twelve paylines
    pub fn lines_5x4() -> Self {
        let plain: Vec<SymbolId> = (2..=9).collect();
        let per_column: Vec<Vec<WeightEntry>> = (0..5)
            .map(|column| {
                let mut entries: Vec<WeightEntry> = plain
                    .iter()
                    .map(|&icon| WeightEntry::new(icon, 24 - 2 * icon))
                    .collect();
                if column > 0 {
                    entries.push(WeightEntry::new(0, 3));
                }
                entries.push(WeightEntry::new(1, 2));
                entries
            })
            .collect();

        let mut paytable = PayTable::new();
        for &icon in &plain {
            let base = Amount::from_int(10 - icon as i64);
            paytable = paytable.with_pays(icon, &[(3, base), (4, base.mul_int(3)), (5, base.mul_int(8))]);
        }
        paytable = paytable.with_pays(0, &[(3, Amount::from_int(10)), (5, Amount::from_int(100))]);

        Self {
            name: "Lines 5x4".into(),
            grid: GridSpec::fixed(5, 4),
            roles: SymbolRoles::new(0, 1),
            weights: WeightSource::Single(ReelWeights::PerColumn(per_column)),
            upper_weights: None,
            caps: vec![OccurrenceCap(1, 5)],
            strategy: WinStrategy::FixedRoute,
            min_match: 3,
            paylines: standard_5x4_paylines(),
            paytable,
            multipliers: None,
            gold_frames: None,
            free_game: FreeGameConfig {
                trigger_above: 2,
                radix: 3,
                per_extra_spins: 5,
                base_plays: 8,
                allow_retrigger: true,
            },
            limits: EngineLimits::default(),
        }
    }

    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(format!("Invalid config: {}", e)))
    }

    /// Parse a YAML configuration
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yml::from_str(yaml).map_err(|e| ConfigError::Parse(format!("Invalid config: {}", e)))
    }

    /// Export as pretty JSON
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Run every configuration check
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lengths = self.grid.lengths();
        if lengths.is_empty() {
            return Err(ConfigError::InvalidValue("grid has no columns".into()));
        }
        if self.grid.column_lengths.is_some() && lengths.len() != self.grid.columns {
            return Err(ConfigError::InvalidValue(format!(
                "grid declares {} columns but lists {} lengths",
                self.grid.columns,
                lengths.len()
            )));
        }
        for (column, &length) in lengths.iter().enumerate() {
            if length == 0 || length > self.limits.max_column_length {
                return Err(ConfigError::InvalidColumnLength {
                    column,
                    length,
                    max: self.limits.max_column_length,
                });
            }
        }
        if self.min_match < 2 {
            return Err(ConfigError::InvalidValue(format!(
                "min_match must be at least 2, got {}",
                self.min_match
            )));
        }

        self.validate_weights(lengths.len())?;
        self.validate_upper_row(lengths.len())?;
        if self.strategy == WinStrategy::FixedRoute {
            if self.paylines.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "fixed-route strategy needs at least one payline".into(),
                ));
            }
            validate_paylines(&self.paylines, &lengths)?;
        }
        self.validate_multipliers()?;
        self.validate_gold_frames()?;

        let fg = &self.free_game;
        if fg.radix > fg.trigger_above + 1 {
            return Err(ConfigError::InvalidValue(format!(
                "free-game radix {} exceeds the smallest triggering count {}",
                fg.radix,
                fg.trigger_above + 1
            )));
        }
        if self.limits.max_cascade_steps == 0 || self.limits.max_cap_rounds == 0 {
            return Err(ConfigError::InvalidValue("limits must be non-zero".into()));
        }
        Ok(())
    }

    fn validate_weights(&self, columns: usize) -> Result<(), ConfigError> {
        let capped: BTreeSet<SymbolId> = self.caps.iter().map(OccurrenceCap::icon).collect();
        for (label, weights) in self.weights.all() {
            if let ReelWeights::PerColumn(tables) = weights {
                if tables.len() < columns {
                    return Err(ConfigError::MissingColumnTable {
                        column: tables.len(),
                        available: tables.len(),
                    });
                }
            }
            for (index, table) in weights.tables().into_iter().enumerate() {
                let name = format!("{label}[{index}]");
                check_table(&name, table.iter().map(|e| e.weight))?;
                let has_free_icon = table
                    .iter()
                    .any(|e| e.weight > 0 && !capped.contains(&e.icon) && e.icon != self.roles.scatter);
                if !has_free_icon {
                    return Err(ConfigError::CapsUnsatisfiable { column: index });
                }
            }
        }
        Ok(())
    }

    fn validate_upper_row(&self, columns: usize) -> Result<(), ConfigError> {
        let Some(spec) = self.grid.upper_row else {
            return Ok(());
        };
        if spec.length == 0 || spec.start_column + spec.length > columns {
            return Err(ConfigError::InvalidValue(format!(
                "upper row of {} cells from column {} does not fit {} columns",
                spec.length, spec.start_column, columns
            )));
        }
        let table = self
            .upper_weights
            .as_ref()
            .ok_or_else(|| ConfigError::EmptyWeightTable("upper_weights".into()))?;
        check_table("upper_weights", table.iter().map(|e| e.weight))
    }

    fn validate_multipliers(&self) -> Result<(), ConfigError> {
        let Some(icon) = self.roles.multiplier_icon else {
            return Ok(());
        };
        let tables = self
            .multipliers
            .as_ref()
            .ok_or_else(|| ConfigError::EmptyWeightTable("multipliers".into()))?;
        check_table("multipliers.single", tables.single.iter().map(|v| v.weight))?;
        if let Some(cap) = self.roles.merge_cap(icon) {
            for merge_count in 1..cap {
                let table = tables
                    .merged
                    .get(&merge_count)
                    .ok_or(ConfigError::MissingMultiplierTable(merge_count))?;
                check_table(
                    &format!("multipliers.merged[{merge_count}]"),
                    table.iter().map(|v| v.weight),
                )?;
            }
        }
        Ok(())
    }

    fn validate_gold_frames(&self) -> Result<(), ConfigError> {
        let Some(gold) = &self.gold_frames else {
            return Ok(());
        };
        if gold.rate_per_mille > 1000 {
            return Err(ConfigError::InvalidValue(format!(
                "gold-frame rate {} exceeds 1000 per mille",
                gold.rate_per_mille
            )));
        }
        if gold.rate_per_mille > 0 {
            check_table("gold_frames.values", gold.values.iter().map(|v| v.weight))?;
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::cascade_6x5()
    }
}

fn check_table(name: &str, weights: impl Iterator<Item = u32>) -> Result<(), ConfigError> {
    let weights: Vec<u32> = weights.collect();
    if weights.is_empty() {
        return Err(ConfigError::EmptyWeightTable(name.to_string()));
    }
    if weights.iter().map(|&w| w as u64).sum::<u64>() == 0 {
        return Err(ConfigError::ZeroWeight(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        EngineConfig::cascade_6x5().validate().unwrap();
        EngineConfig::lines_5x4().validate().unwrap();
    }

    #[test]
    fn test_grid_lengths() {
        assert_eq!(GridSpec::fixed(3, 4).lengths(), vec![4, 4, 4]);
        let ragged = GridSpec::ragged(vec![2, 7, 3]);
        assert_eq!(ragged.lengths(), vec![2, 7, 3]);
        assert_eq!(ragged.total_positions(), 12);
    }

    #[test]
    fn test_tier_resolution() {
        let shared = ReelWeights::Shared(vec![WeightEntry::new(3, 1)]);
        let source = WeightSource::Tiered(BTreeMap::from([(UserTier::New, shared.clone())]));
        assert_eq!(source.resolve(None), Err(ConfigError::TierUnset));
        assert!(matches!(
            source.resolve(Some(UserTier::Trial)),
            Err(ConfigError::TierMissing(_))
        ));
        assert_eq!(source.resolve(Some(UserTier::New)), Ok(&shared));

        let single = WeightSource::Single(shared.clone());
        assert_eq!(single.resolve(None), Ok(&shared));
    }

    #[test]
    fn test_award_for() {
        let fg = FreeGameConfig::default();
        assert_eq!(fg.award_for(3), None);
        assert_eq!(fg.award_for(4), Some(10));
        assert_eq!(fg.award_for(6), Some(14));
    }

    #[test]
    fn test_rejects_bad_configs() {
        let mut config = EngineConfig::cascade_6x5();
        config.grid.rows = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidColumnLength { length: 0, .. })
        ));

        let mut config = EngineConfig::cascade_6x5();
        config.multipliers.as_mut().unwrap().merged.remove(&2);
        assert_eq!(config.validate(), Err(ConfigError::MissingMultiplierTable(2)));

        let mut config = EngineConfig::lines_5x4();
        config.paylines.push(Payline::straight(99, 4, 5));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PaylineOutOfRange { line: 99, .. })
        ));

        let mut config = EngineConfig::lines_5x4();
        config.weights = WeightSource::Single(ReelWeights::Shared(vec![
            WeightEntry::new(1, 5),
            WeightEntry::new(2, 0),
        ]));
        assert!(matches!(config.validate(), Err(ConfigError::CapsUnsatisfiable { .. })));

        let mut config = EngineConfig::lines_5x4();
        config.weights = WeightSource::Single(ReelWeights::PerColumn(vec![vec![
            WeightEntry::new(2, 1),
        ]]));
        assert!(matches!(config.validate(), Err(ConfigError::MissingColumnTable { .. })));
    }

    #[test]
    fn test_json_and_yaml_round_trip() {
        let config = EngineConfig::lines_5x4();
        let json = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);

        let yaml = r#"
name: Tiny
grid:
  columns: 3
  rows: 3
roles:
  wild: 0
  scatter: 1
weights:
  - { icon: 2, weight: 5 }
  - { icon: 3, weight: 5 }
  - { icon: 0, weight: 1 }
paytable:
  pays:
    2: { 3: "1.5" }
    3: { 3: 2 }
"#;
        let parsed = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(parsed.min_match, 3);
        assert_eq!(parsed.strategy, WinStrategy::Adjacency);
        assert_eq!(parsed.paytable.pay(2, 3), "1.5".parse().unwrap());
        parsed.validate().unwrap();

        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
