//! Cascade engine: removal, gravity and refill
//!
//! Columns are listed top to bottom. Removing `k` cells from a column lets the
//! survivors fall: a survivor at row `p` keeps its relative order, gets the
//! compacted index `p - (removed rows above p)` and lands at row
//! `k + compacted`. The `k` vacated rows at the top receive injected symbols
//! in draw order. Under random fill the upper row compacts sideways toward
//! index 0 and refills at its end; under forced-no-win fill its survivors stay
//! over their columns and the vacated cells refill in place.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::{Board, Position};
use crate::detect::{WinDetector, WinEvaluator, WinMap};
use crate::error::{ConfigError, EngineResult, InvariantViolation};
use crate::generator::{BoardGenerator, SymbolPool};
use crate::symbols::{BLANK, SymbolId};

/// Refill strategy for one cascade step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Draw every injected cell from its column pool
    #[default]
    Random,
    /// Injected cells may not complete or extend any win
    ForcedNoWin,
}

impl FillMode {
    /// How surviving upper-row cells settle before the refill
    pub fn upper_settle(self) -> UpperSettle {
        match self {
            Self::Random => UpperSettle::Compact,
            Self::ForcedNoWin => UpperSettle::InPlace,
        }
    }
}

/// Settling of surviving upper-row cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpperSettle {
    /// Survivors shift toward index 0, blanks collect at the end
    Compact,
    /// Survivors keep their index, blanks stay where cells were removed
    InPlace,
}

// ═══════════════════════════════════════════════════════════════════════════════
// REMOVAL PLAN
// ═══════════════════════════════════════════════════════════════════════════════

/// Cells removed by a win, and the position remap they imply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalPlan {
    lengths: Vec<usize>,
    offsets: Vec<usize>,
    /// Removed rows per column, ascending
    removed: Vec<Vec<usize>>,
    /// Removed upper-row indices, ascending
    upper_removed: Vec<usize>,
    upper_len: usize,
}

impl RemovalPlan {
    /// Plan removal of explicit positions
    pub fn new(
        board: &Board,
        positions: &BTreeSet<Position>,
        upper: &BTreeSet<usize>,
    ) -> Result<Self, InvariantViolation> {
        let lengths = board.column_lengths();
        let offsets: Vec<usize> = (0..lengths.len()).map(|c| board.offset(c)).collect();
        let mut removed = vec![Vec::new(); lengths.len()];
        for &pos in positions {
            let (column, row) = board.locate(pos).ok_or(InvariantViolation::PositionOutOfBoard {
                position: pos,
                size: board.len(),
            })?;
            removed[column].push(row);
        }

        let upper_len = board.upper().map_or(0, |u| u.cells.len());
        if let Some(&index) = upper.iter().find(|&&i| i >= upper_len) {
            return Err(InvariantViolation::ShapeMismatch(format!(
                "upper-row index {index} on a row of {upper_len} cells"
            )));
        }

        Ok(Self {
            lengths,
            offsets,
            removed,
            upper_removed: upper.iter().copied().collect(),
            upper_len,
        })
    }

    /// Plan removal of every position in a win map
    pub fn from_wins(board: &Board, wins: &WinMap) -> Result<Self, InvariantViolation> {
        Self::new(board, &wins.all_positions(), &wins.all_upper_positions())
    }

    pub fn column_count(&self) -> usize {
        self.lengths.len()
    }

    /// Number of cells removed from `column`
    pub fn removed_in(&self, column: usize) -> usize {
        self.removed.get(column).map_or(0, Vec::len)
    }

    /// Removed upper-row indices
    pub fn upper_removed(&self) -> &[usize] {
        &self.upper_removed
    }

    pub fn total_removed(&self) -> usize {
        self.removed.iter().map(Vec::len).sum::<usize>() + self.upper_removed.len()
    }

    pub fn is_removed(&self, position: Position) -> bool {
        self.locate(position)
            .is_some_and(|(column, row)| self.removed[column].binary_search(&row).is_ok())
    }

    /// Flat positions that receive injected symbols in `column`
    pub fn injected_positions(&self, column: usize) -> std::ops::Range<Position> {
        let start = self.offsets.get(column).copied().unwrap_or(0);
        start..start + self.removed_in(column)
    }

    /// New flat position of a surviving cell; `None` if it was removed
    pub fn remap(&self, position: Position) -> Result<Option<Position>, InvariantViolation> {
        let (column, row) = self.locate(position).ok_or(InvariantViolation::PositionOutOfBoard {
            position,
            size: self.lengths.iter().sum(),
        })?;
        let removed = &self.removed[column];
        if removed.binary_search(&row).is_ok() {
            return Ok(None);
        }
        let above = removed.partition_point(|&r| r < row);
        let landing = removed.len() + (row - above);
        let length = self.lengths[column];
        if landing >= length {
            return Err(InvariantViolation::BoundaryOverflow {
                column,
                row: landing,
                length,
            });
        }
        Ok(Some(self.offsets[column] + landing))
    }

    /// New index of a surviving upper-row cell; `None` if it was removed
    pub fn remap_upper(&self, index: usize) -> Option<usize> {
        if index >= self.upper_len || self.upper_removed.binary_search(&index).is_ok() {
            return None;
        }
        Some(index - self.upper_removed.partition_point(|&r| r < index))
    }

    fn locate(&self, position: Position) -> Option<(usize, usize)> {
        self.offsets
            .iter()
            .zip(&self.lengths)
            .position(|(&start, &len)| position >= start && position < start + len)
            .map(|column| (column, position - self.offsets[column]))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CASCADE STEP
// ═══════════════════════════════════════════════════════════════════════════════

/// A symbol injected into a vacated cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Injection {
    pub position: Position,
    pub symbol: SymbolId,
}

/// Result of one cascade step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Board after gravity and refill
    pub board: Board,
    /// Removal applied to the prior board
    pub plan: RemovalPlan,
    /// Injected cells per column, top to bottom
    pub injected: Vec<Vec<Injection>>,
    /// Injected upper-row cells as `(index, symbol)`
    pub upper_injected: Vec<(usize, SymbolId)>,
}

impl CascadeOutcome {
    /// Injected flat positions across all columns
    pub fn injected_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.injected.iter().flatten().map(|i| i.position)
    }
}

/// Remove `plan` from `board` and let survivors fall, leaving blanks in the
/// vacated cells. The upper row compacts toward index 0.
pub fn collapse(board: &Board, plan: &RemovalPlan) -> Result<Board, InvariantViolation> {
    collapse_with(board, plan, UpperSettle::Compact)
}

/// [`collapse`] with an explicit upper-row settling rule
pub fn collapse_with(
    board: &Board,
    plan: &RemovalPlan,
    upper_settle: UpperSettle,
) -> Result<Board, InvariantViolation> {
    let mut columns: Vec<Vec<SymbolId>> = board
        .column_lengths()
        .into_iter()
        .map(|len| vec![BLANK; len])
        .collect();
    for (pos, symbol) in board.flat().into_iter().enumerate() {
        if let Some(target) = plan.remap(pos)? {
            let (column, row) = board
                .locate(target)
                .ok_or(InvariantViolation::PositionOutOfBoard {
                    position: target,
                    size: board.len(),
                })?;
            columns[column][row] = symbol;
        }
    }

    let mut collapsed = Board::new(columns);
    if let Some(upper) = board.upper() {
        let cells: Vec<SymbolId> = match upper_settle {
            UpperSettle::Compact => {
                let mut cells: Vec<SymbolId> = upper
                    .cells
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| plan.remap_upper(*index).is_some())
                    .map(|(_, &symbol)| symbol)
                    .collect();
                cells.resize(upper.cells.len(), BLANK);
                cells
            }
            UpperSettle::InPlace => upper
                .cells
                .iter()
                .enumerate()
                .map(|(index, &symbol)| {
                    if plan.upper_removed().contains(&index) {
                        BLANK
                    } else {
                        symbol
                    }
                })
                .collect(),
        };
        let mut upper = upper.clone();
        upper.cells = cells;
        collapsed = collapsed.with_upper(upper);
    }
    Ok(collapsed)
}

/// Runs cascade steps against a generator's pools
#[derive(Debug, Clone, Copy)]
pub struct CascadeEngine<'a> {
    generator: &'a BoardGenerator,
    detector: &'a WinDetector,
}

impl<'a> CascadeEngine<'a> {
    pub fn new(generator: &'a BoardGenerator, detector: &'a WinDetector) -> Self {
        Self {
            generator,
            detector,
        }
    }

    /// Remove the winning cells of `board`, drop survivors and refill
    pub fn step<R: Rng + ?Sized>(
        &self,
        board: &Board,
        wins: &WinMap,
        mode: FillMode,
        rng: &mut R,
    ) -> EngineResult<CascadeOutcome> {
        let plan = RemovalPlan::from_wins(board, wins)?;
        let mut next = collapse_with(board, &plan, mode.upper_settle())?;

        let (injected, upper_injected) = match mode {
            FillMode::Random => self.fill_random(&mut next, &plan, rng)?,
            FillMode::ForcedNoWin => self.fill_no_win(&mut next, &plan, rng)?,
        };

        log::debug!(
            "Cascade removed {} cells ({:?})",
            plan.total_removed(),
            mode
        );
        Ok(CascadeOutcome {
            board: next,
            plan,
            injected,
            upper_injected,
        })
    }

    fn column_pool(&self, column: usize) -> Result<&SymbolPool, ConfigError> {
        self.generator
            .column_pool(column)
            .ok_or(ConfigError::MissingColumnTable {
                column,
                available: self.generator.lengths().len(),
            })
    }

    fn upper_pool(&self) -> Result<&SymbolPool, ConfigError> {
        self.generator
            .upper_pool()
            .ok_or_else(|| ConfigError::EmptyWeightTable("upper row".into()))
    }

    /// Blank upper-row indices, left to right
    fn upper_blanks(board: &Board) -> Vec<usize> {
        board.upper().map_or_else(Vec::new, |u| {
            u.cells
                .iter()
                .enumerate()
                .filter(|(_, s)| **s == BLANK)
                .map(|(i, _)| i)
                .collect()
        })
    }

    fn fill_random<R: Rng + ?Sized>(
        &self,
        board: &mut Board,
        plan: &RemovalPlan,
        rng: &mut R,
    ) -> Result<(Vec<Vec<Injection>>, Vec<(usize, SymbolId)>), ConfigError> {
        let mut injected = Vec::with_capacity(plan.column_count());
        for column in 0..plan.column_count() {
            let pool = self.column_pool(column)?;
            let cells: Vec<Injection> = plan
                .injected_positions(column)
                .map(|position| Injection {
                    position,
                    symbol: pool.draw(rng),
                })
                .collect();
            for cell in &cells {
                board.set(cell.position, cell.symbol);
            }
            injected.push(cells);
        }

        let mut upper_injected = Vec::new();
        let blanks = Self::upper_blanks(board);
        if !blanks.is_empty() {
            let pool = self.upper_pool()?;
            for index in blanks {
                let symbol = pool.draw(rng);
                board.set_upper(index, symbol);
                upper_injected.push((index, symbol));
            }
        }
        Ok((injected, upper_injected))
    }

    /// Fill vacated cells left to right, top to bottom. Every candidate is
    /// placed on the partially filled board and rejected if the wins then
    /// differ from the survivors' own wins. Blanks never match, so injected
    /// cells end up in no win.
    ///
    /// Survivors can line up on their own when gravity moves them onto a new
    /// payline route; those wins stand and the chain continues.
    fn fill_no_win<R: Rng + ?Sized>(
        &self,
        board: &mut Board,
        plan: &RemovalPlan,
        rng: &mut R,
    ) -> Result<(Vec<Vec<Injection>>, Vec<(usize, SymbolId)>), ConfigError> {
        let baseline = self.detector.evaluate(board);
        if let Some(wins) = &baseline {
            log::debug!("Cascade survivors already form {} wins", wins.len());
        }

        let upper_blanks = Self::upper_blanks(board);
        let upper_column = |index: usize| board.upper().and_then(|u| u.column_of(index));
        let upper_by_column: Vec<(usize, usize)> = upper_blanks
            .iter()
            .filter_map(|&index| upper_column(index).map(|column| (column, index)))
            .collect();

        let mut injected = Vec::with_capacity(plan.column_count());
        let mut upper_injected = Vec::new();
        for column in 0..plan.column_count() {
            let pool = self.column_pool(column)?;
            let mut cells = Vec::new();
            for position in plan.injected_positions(column) {
                let symbol = self.pick_safe(board, pool, column, baseline.as_ref(), rng, |b, s| {
                    b.set(position, s)
                })?;
                board.set(position, symbol);
                cells.push(Injection { position, symbol });
            }
            injected.push(cells);

            for &(_, index) in upper_by_column.iter().filter(|(c, _)| *c == column) {
                let pool = self.upper_pool()?;
                let symbol = self.pick_safe(board, pool, column, baseline.as_ref(), rng, |b, s| {
                    b.set_upper(index, s)
                })?;
                board.set_upper(index, symbol);
                upper_injected.push((index, symbol));
            }
        }
        Ok((injected, upper_injected))
    }

    fn pick_safe<R, F>(
        &self,
        board: &Board,
        pool: &SymbolPool,
        column: usize,
        baseline: Option<&WinMap>,
        rng: &mut R,
        place: F,
    ) -> Result<SymbolId, ConfigError>
    where
        R: Rng + ?Sized,
        F: Fn(&mut Board, SymbolId),
    {
        let allowed: Vec<SymbolId> = pool
            .distinct()
            .into_iter()
            .filter(|&symbol| {
                let mut trial = board.clone();
                place(&mut trial, symbol);
                self.detector.evaluate(&trial).as_ref() == baseline
            })
            .collect();
        pool.draw_filtered(rng, |symbol| allowed.contains(&symbol))
            .ok_or(ConfigError::NoWinPoolExhausted { column })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::UpperRow;
    use crate::config::EngineConfig;
    use crate::detect::WinKey;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_contiguous_top_removal() {
        let board = Board::new(vec![vec![1, 2, 3, 4, 5]]);
        let plan = RemovalPlan::new(&board, &BTreeSet::from([0, 1]), &BTreeSet::new()).unwrap();
        assert_eq!(plan.removed_in(0), 2);
        assert_eq!(plan.remap(0).unwrap(), None);
        assert_eq!(plan.remap(2).unwrap(), Some(2));
        assert_eq!(plan.remap(4).unwrap(), Some(4));
        assert_eq!(plan.injected_positions(0), 0..2);
    }

    #[test]
    fn test_gravity_drops_cells_above_a_hole() {
        // Remove the bottom cell of column 1: everything above falls by one
        let board = Board::new(vec![vec![1, 2], vec![3, 4, 5]]);
        let plan = RemovalPlan::new(&board, &BTreeSet::from([4]), &BTreeSet::new()).unwrap();
        assert_eq!(plan.remap(2).unwrap(), Some(3));
        assert_eq!(plan.remap(3).unwrap(), Some(4));
        assert_eq!(plan.remap(0).unwrap(), Some(0));

        let collapsed = collapse(&board, &plan).unwrap();
        assert_eq!(collapsed.columns(), &[vec![1, 2], vec![BLANK, 3, 4]]);
    }

    #[test]
    fn test_remap_rejects_positions_off_board() {
        let board = Board::new(vec![vec![1, 2]]);
        assert!(matches!(
            RemovalPlan::new(&board, &BTreeSet::from([2]), &BTreeSet::new()),
            Err(InvariantViolation::PositionOutOfBoard { position: 2, size: 2 })
        ));
        let plan = RemovalPlan::new(&board, &BTreeSet::new(), &BTreeSet::new()).unwrap();
        assert!(plan.remap(9).is_err());
    }

    #[test]
    fn test_upper_row_compacts_left() {
        let board = Board::new(vec![vec![1], vec![2], vec![3]])
            .with_upper(UpperRow::new(vec![7, 8]));
        let plan = RemovalPlan::new(&board, &BTreeSet::new(), &BTreeSet::from([0])).unwrap();
        assert_eq!(plan.remap_upper(0), None);
        assert_eq!(plan.remap_upper(1), Some(0));

        let collapsed = collapse(&board, &plan).unwrap();
        assert_eq!(collapsed.upper().unwrap().cells, vec![8, BLANK]);
    }

    #[test]
    fn test_forced_fill_keeps_upper_survivors_over_their_columns() {
        let config = EngineConfig::cascade_6x5();
        let generator = BoardGenerator::from_config(&config, None).unwrap();
        let detector = WinDetector::from_config(&config);
        let board = Board::new(vec![
            vec![3, 4, 5, 6, 8],
            vec![3, 9, 10, 11, 2],
            vec![4, 5, 6, 8, 9],
            vec![10, 11, 2, 4, 5],
            vec![2, 6, 9, 10, 11],
            vec![7, 7, 7, 7, 7],
        ])
        .with_upper(UpperRow::new(vec![2, 3, 7, 8]));
        let wins = detector.evaluate(&board).unwrap();
        assert_eq!(wins.keys().collect::<Vec<_>>(), vec![WinKey::Icon(3)]);

        // Compaction would slide the 7 over column 2
        let plan = RemovalPlan::from_wins(&board, &wins).unwrap();
        let compacted = collapse(&board, &plan).unwrap();
        assert_eq!(compacted.upper().unwrap().cells, vec![2, 7, 8, BLANK]);

        let engine = CascadeEngine::new(&generator, &detector);
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let outcome = engine
                .step(&board, &wins, FillMode::ForcedNoWin, &mut rng)
                .unwrap();
            let upper = &outcome.board.upper().unwrap().cells;
            assert_eq!((upper[0], upper[2], upper[3]), (2, 7, 8));
            let refilled: Vec<usize> = outcome.upper_injected.iter().map(|(i, _)| *i).collect();
            assert_eq!(refilled, vec![1]);
            assert!(detector.evaluate(&outcome.board).is_none());
        }
    }

    #[test]
    fn test_forced_fill_lets_route_survivors_win() {
        let config = EngineConfig::lines_5x4();
        let generator = BoardGenerator::from_config(&config, None).unwrap();
        let detector = WinDetector::from_config(&config);
        // Lines 6, 10 and 12 pay icon 2; after gravity the 5s meet on row 3
        let board = Board::new(vec![
            vec![3, 4, 5, 2],
            vec![6, 7, 2, 5],
            vec![8, 2, 9, 5],
            vec![3, 4, 6, 7],
            vec![8, 9, 3, 4],
        ]);
        let wins = detector.evaluate(&board).unwrap();
        assert!(wins.iter().all(|e| e.icon == 2));

        let engine = CascadeEngine::new(&generator, &detector);
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let outcome = engine
                .step(&board, &wins, FillMode::ForcedNoWin, &mut rng)
                .unwrap();
            let next = detector.evaluate(&outcome.board).unwrap();
            assert_eq!(next.keys().collect::<Vec<_>>(), vec![WinKey::Line(4)]);
            assert_eq!(next.get(WinKey::Line(4)).unwrap().positions, vec![3, 7, 11]);
            let won = next.all_positions();
            assert!(outcome.injected_positions().all(|p| !won.contains(&p)));
        }
    }
}
