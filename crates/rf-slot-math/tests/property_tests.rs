use std::collections::BTreeSet;

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use rf_slot_math::{
    Board, BoardGenerator, EngineConfig, FrameMap, RemovalPlan, SymbolId, SymbolRoles,
    WinDetector, WinEvaluator, collapse,
};

// --- STRATEGIES ---

prop_compose! {
    fn arb_column()(len in 1usize..8)(
        cells in proptest::collection::vec(0u32..6, len),
        removed in proptest::collection::vec(any::<bool>(), len)
    ) -> (Vec<SymbolId>, Vec<bool>) {
        (cells, removed)
    }
}

prop_compose! {
    fn arb_board()(
        columns in proptest::collection::vec(proptest::collection::vec(0u32..6, 1..7), 1..7)
    ) -> Board {
        Board::new(columns)
    }
}

fn roles() -> SymbolRoles {
    SymbolRoles::new(0, 1).with_merge(0, 3).with_merge(1, 2).with_merge(4, 4)
}

// --- PROPERTIES ---

proptest! {
    #[test]
    fn prop_gravity_remap(column in arb_column()) {
        let (cells, removed) = column;
        let board = Board::new(vec![cells.clone()]);
        let positions: BTreeSet<usize> =
            removed.iter().enumerate().filter(|(_, r)| **r).map(|(p, _)| p).collect();
        let plan = RemovalPlan::new(&board, &positions, &BTreeSet::new()).unwrap();
        let k = positions.len();

        prop_assert_eq!(plan.removed_in(0), k);
        prop_assert_eq!(plan.injected_positions(0), 0..k);

        for p in 0..cells.len() {
            let above = positions.iter().filter(|&&r| r < p).count();
            let expected = (!positions.contains(&p)).then_some(k + p - above);
            prop_assert_eq!(plan.remap(p).unwrap(), expected);
        }

        // Survivors keep their order at the bottom of the column
        let collapsed = collapse(&board, &plan).unwrap();
        let survivors: Vec<SymbolId> = cells
            .iter()
            .enumerate()
            .filter(|(p, _)| !positions.contains(p))
            .map(|(_, &s)| s)
            .collect();
        prop_assert_eq!(&collapsed.column(0)[k..], survivors.as_slice());
    }

    #[test]
    fn prop_contiguous_top_removal_leaves_survivors_in_place(
        len in 1usize..10,
        k_seed in 0usize..10,
    ) {
        let k = k_seed % (len + 1);
        let board = Board::new(vec![(0..len as u32).collect()]);
        let positions: BTreeSet<usize> = (0..k).collect();
        let plan = RemovalPlan::new(&board, &positions, &BTreeSet::new()).unwrap();
        for p in k..len {
            prop_assert_eq!(plan.remap(p).unwrap(), Some(p));
        }
    }

    #[test]
    fn prop_frame_scan_is_idempotent(board in arb_board()) {
        let first = FrameMap::scan(&board, &roles());
        let second = FrameMap::scan(&board, &roles());
        prop_assert_eq!(&first, &second);

        for (_, frame) in first.iter() {
            let cap = roles().merge_cap(frame.icon).unwrap();
            prop_assert!(frame.size() >= 2 && frame.size() <= cap);
            prop_assert!(frame.positions().all(|p| board.get(p) == Some(frame.icon)));
        }
    }

    #[test]
    fn prop_detected_positions_stay_on_board(seed in any::<u64>()) {
        let config = EngineConfig::cascade_6x5();
        let generator = BoardGenerator::from_config(&config, None).unwrap();
        let detector = WinDetector::from_config(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let board = generator.draw(&mut rng).unwrap();
        if let Some(wins) = detector.evaluate(&board) {
            prop_assert!(!wins.is_empty());
            for entry in wins.iter() {
                prop_assert!(entry.positions.iter().all(|&p| p < board.len()));
                prop_assert!(entry.line_count >= config.min_match);
                prop_assert!(entry.ways >= 1);
            }
        }
    }
}
