//! Frame-merge engine
//!
//! Consecutive cells of a combinable icon within one column merge into a
//! frame, up to the icon's maximum merge size. Cells past the cap stay single.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::{Board, Position};
use crate::cascade::RemovalPlan;
use crate::error::InvariantViolation;
use crate::symbols::{SymbolId, SymbolRoles};

/// Frame identifier
pub type FrameId = u32;

/// Why a frame stopped growing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakType {
    /// Run ended on a different icon
    Open,
    /// Run reached the bottom of the column
    ColumnEdge,
    /// Run reached the icon's maximum merge size
    Capped,
}

/// Merged run of one icon in one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub icon: SymbolId,
    pub column: usize,
    pub first_pos: Position,
    pub last_pos: Position,
    pub break_type: BreakType,
}

impl Frame {
    /// Number of cells covered
    pub fn size(&self) -> usize {
        self.last_pos - self.first_pos + 1
    }

    pub fn contains(&self, position: Position) -> bool {
        (self.first_pos..=self.last_pos).contains(&position)
    }

    pub fn positions(&self) -> std::ops::RangeInclusive<Position> {
        self.first_pos..=self.last_pos
    }
}

/// Frames keyed by id, iterating in ascending id order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMap {
    frames: BTreeMap<FrameId, Frame>,
}

impl FrameMap {
    /// Full scan of every column. Ids follow ascending first position.
    pub fn scan(board: &Board, roles: &SymbolRoles) -> Self {
        let mut found = Vec::new();
        for column in 0..board.column_count() {
            let len = board.column(column).len();
            scan_rows(board, roles, column, 0..len, &mut found);
        }
        found.sort_by_key(|f| f.first_pos);
        Self {
            frames: (0..).zip(found).collect(),
        }
    }

    /// Carry frames across a cascade step.
    ///
    /// Frames that lost a cell dissolve. Survivors move with the gravity remap
    /// and keep their id, size and break type. Only the injected cells of
    /// `board` are scanned for new frames, with ids above the current maximum.
    pub fn remap(
        &self,
        plan: Option<&RemovalPlan>,
        board: &Board,
        roles: &SymbolRoles,
    ) -> Result<Self, InvariantViolation> {
        let plan = plan.ok_or(InvariantViolation::MissingWinContext)?;

        let mut frames = BTreeMap::new();
        for (&id, frame) in &self.frames {
            if frame.positions().any(|pos| plan.is_removed(pos)) {
                continue;
            }
            let (Some(first_pos), Some(last_pos)) =
                (plan.remap(frame.first_pos)?, plan.remap(frame.last_pos)?)
            else {
                continue;
            };
            frames.insert(
                id,
                Frame {
                    first_pos,
                    last_pos,
                    ..*frame
                },
            );
        }

        let mut found = Vec::new();
        for column in 0..board.column_count() {
            scan_rows(board, roles, column, 0..plan.removed_in(column), &mut found);
        }
        found.sort_by_key(|f| f.first_pos);
        let mut next_id = self.next_id();
        for frame in found {
            frames.insert(next_id, frame);
            next_id += 1;
        }
        Ok(Self { frames })
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameId, &Frame)> {
        self.frames.iter().map(|(id, f)| (*id, f))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Next free id: one above the current maximum
    pub fn next_id(&self) -> FrameId {
        self.frames.keys().next_back().map_or(0, |id| id + 1)
    }

    /// Frame of `icon` covering `position`, preferring one that ends exactly
    /// there, otherwise the lowest id
    pub fn covering(&self, position: Position, icon: SymbolId) -> Option<&Frame> {
        let mut candidates = self
            .frames
            .values()
            .filter(|f| f.icon == icon && f.contains(position));
        let first = candidates.next()?;
        if first.last_pos == position {
            return Some(first);
        }
        Some(candidates.find(|f| f.last_pos == position).unwrap_or(first))
    }

    /// Any frame covering `position`
    pub fn frame_at(&self, position: Position) -> Option<(FrameId, &Frame)> {
        self.frames
            .iter()
            .find(|(_, f)| f.contains(position))
            .map(|(id, f)| (*id, f))
    }
}

/// Scan `rows` of `column` for runs of combinable icons
fn scan_rows(
    board: &Board,
    roles: &SymbolRoles,
    column: usize,
    rows: std::ops::Range<usize>,
    out: &mut Vec<Frame>,
) {
    let cells = board.column(column);
    let offset = board.offset(column);
    let end = rows.end.min(cells.len());
    let mut row = rows.start;

    while row < end {
        let icon = cells[row];
        let Some(cap) = roles.merge_cap(icon) else {
            row += 1;
            continue;
        };
        let mut run_end = row + 1;
        while run_end < end && cells[run_end] == icon {
            run_end += 1;
        }

        let size = (run_end - row).min(cap);
        if size >= 2 {
            let last = row + size - 1;
            let break_type = if size == cap {
                BreakType::Capped
            } else if last + 1 == cells.len() {
                BreakType::ColumnEdge
            } else {
                BreakType::Open
            };
            out.push(Frame {
                icon,
                column,
                first_pos: offset + row,
                last_pos: offset + last,
                break_type,
            });
        }
        row = run_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn roles() -> SymbolRoles {
        SymbolRoles::new(0, 1).with_merge(0, 3).with_merge(1, 2)
    }

    #[test]
    fn test_scan_runs_and_break_types() {
        let board = Board::new(vec![
            vec![0, 0, 5, 1, 1],
            vec![0, 0, 0, 0, 6],
            vec![7, 1, 8, 0, 0],
        ]);
        let frames = FrameMap::scan(&board, &roles());
        let listed: Vec<(Position, Position, BreakType)> = frames
            .iter()
            .map(|(_, f)| (f.first_pos, f.last_pos, f.break_type))
            .collect();
        assert_eq!(
            listed,
            vec![
                (0, 1, BreakType::Open),
                (3, 4, BreakType::Capped),
                (5, 7, BreakType::Capped),
                (13, 14, BreakType::ColumnEdge),
            ]
        );
        // Cell 8 is past the wild cap of 3 and stays single
        assert!(frames.frame_at(8).is_none());
        assert_eq!(frames.get(2).map(Frame::size), Some(3));
    }

    #[test]
    fn test_scan_is_idempotent() {
        let board = Board::new(vec![vec![0, 0, 1, 1], vec![1, 0, 0, 0]]);
        assert_eq!(FrameMap::scan(&board, &roles()), FrameMap::scan(&board, &roles()));
    }

    #[test]
    fn test_remap_requires_plan() {
        let board = Board::new(vec![vec![0, 0]]);
        let frames = FrameMap::scan(&board, &roles());
        assert_eq!(
            frames.remap(None, &board, &roles()),
            Err(InvariantViolation::MissingWinContext)
        );
    }

    #[test]
    fn test_remap_shifts_survivors_and_scans_injected() {
        // Column: [5, 0, 0, 6] with a wild frame at rows 1..=2
        let prior = Board::new(vec![vec![5, 0, 0, 6]]);
        let frames = FrameMap::scan(&prior, &roles());
        assert_eq!(frames.len(), 1);

        // Removing the bottom cell drops the frame by one row; a scatter lands on top
        let plan = RemovalPlan::new(&prior, &BTreeSet::from([3]), &BTreeSet::new()).unwrap();
        let next = Board::new(vec![vec![1, 5, 0, 0]]);
        let remapped = frames.remap(Some(&plan), &next, &roles()).unwrap();
        let frame = remapped.get(0).unwrap();
        assert_eq!((frame.first_pos, frame.last_pos), (2, 3));
        assert_eq!(frame.break_type, BreakType::Open);
        assert_eq!(remapped.len(), 1);

        // A removed cell inside the frame dissolves it
        let plan = RemovalPlan::new(&prior, &BTreeSet::from([0, 1]), &BTreeSet::new()).unwrap();
        let next = Board::new(vec![vec![1, 1, 0, 6]]);
        let remapped = frames.remap(Some(&plan), &next, &roles()).unwrap();
        let ids: Vec<FrameId> = remapped.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(remapped.get(1).map(|f| (f.first_pos, f.last_pos)), Some((0, 1)));
    }

    #[test]
    fn test_covering_prefers_exact_last_position() {
        let mut frames = FrameMap::default();
        frames.frames.insert(
            0,
            Frame {
                icon: 1,
                column: 0,
                first_pos: 0,
                last_pos: 2,
                break_type: BreakType::Open,
            },
        );
        frames.frames.insert(
            1,
            Frame {
                icon: 1,
                column: 0,
                first_pos: 1,
                last_pos: 1,
                break_type: BreakType::Open,
            },
        );
        assert_eq!(frames.covering(1, 1).map(|f| f.last_pos), Some(1));
        assert_eq!(frames.covering(0, 1).map(|f| f.last_pos), Some(2));
        assert!(frames.covering(0, 7).is_none());
    }
}
