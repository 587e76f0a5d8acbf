//! Algebraic properties of strategies over random straight-line programs.

mod common;

use std::sync::Arc;

use canopy::elevate::{
    GarbageCollect, IOp, IValue, OpId, Strategy, StrategyRef, backwards, bottom_to_top,
    check_snapshot, everywhere, fail, id, print_iop, repeat, seq, strategy, top_to_bottom, try_,
};
use common::*;
use proptest::prelude::*;
use rustc_hash::FxHashSet;

/// `main(%arg)` where every step is a constant or an `addi` of two earlier
/// values, returning one of them.
fn random_program(picks: &[(usize, usize, bool)], returned: usize) -> Arc<IOp> {
    module(vec![func("main", vec![i32_ty()], |args| {
        let mut values: Vec<IValue> = args.to_vec();
        let mut ops = Vec::new();
        for (i, &(a, b, is_const)) in picks.iter().enumerate() {
            let op = if is_const {
                constant(i as i64)
            } else {
                addi(values[a % values.len()].clone(), values[b % values.len()].clone())
            };
            values.push(op.result(0));
            ops.push(op);
        }
        ops.push(ret([values[returned % values.len()].clone()]));
        ops
    })])
}

fn has_add(op: &Arc<IOp>) -> bool {
    let mut found = false;
    op.walk(&mut |o| found |= o.is("arith", "addi"));
    found
}

fn pool() -> Vec<StrategyRef> {
    vec![
        backwards(strategy(CommuteAdd)),
        top_to_bottom(strategy(CommuteAdd), 1),
        bottom_to_top(strategy(FoldConstantAdd)),
        everywhere(strategy(FoldConstantAdd)),
        try_(top_to_bottom(strategy(FoldConstantAdd), 0)),
        repeat(top_to_bottom(strategy(FoldConstantAdd), 0), 4),
        strategy(GarbageCollect),
        id(),
        fail(),
    ]
}

fn outcome(s: &StrategyRef, op: &Arc<IOp>) -> Option<String> {
    let r = s.apply(op);
    r.is_success().then(|| print_iop(&r.unwrap_op()))
}

proptest! {
    #[test]
    fn commuting_is_its_own_inverse(
        picks in prop::collection::vec((0usize..8, 0usize..8, any::<bool>()), 0..12),
        returned in 0usize..16,
    ) {
        let program = random_program(&picks, returned);
        for s in [
            backwards(strategy(CommuteAdd)),
            top_to_bottom(strategy(CommuteAdd), 0),
            bottom_to_top(strategy(CommuteAdd)),
        ] {
            let r = s.apply(&program);
            prop_assert_eq!(r.is_success(), has_add(&program));
            if !r.is_success() {
                continue;
            }
            let once = r.unwrap_op();
            check_snapshot(&once).unwrap();
            prop_assert_eq!(outcome(&s, &program), Some(print_iop(&once)), "not deterministic");
            let back = s.apply(&once).unwrap_op();
            prop_assert_eq!(print_iop(&back), print_iop(&program));
        }
    }

    #[test]
    fn seq_is_associative(
        picks in prop::collection::vec((0usize..8, 0usize..8, any::<bool>()), 0..12),
        returned in 0usize..16,
        (a, b, c) in (0usize..9, 0usize..9, 0usize..9),
    ) {
        let program = random_program(&picks, returned);
        let pool = pool();
        let (a, b, c) = (pool[a].clone(), pool[b].clone(), pool[c].clone());
        let left = seq(seq(a.clone(), b.clone()), c.clone());
        let right = seq(a, seq(b, c));
        prop_assert_eq!(outcome(&left, &program), outcome(&right, &program));
    }

    #[test]
    fn garbage_collection_is_idempotent(
        picks in prop::collection::vec((0usize..8, 0usize..8, any::<bool>()), 0..16),
        returned in 0usize..24,
    ) {
        let program = random_program(&picks, returned);
        let first = GarbageCollect.apply(&program);
        let once = if first.is_success() {
            first.unwrap_op()
        } else {
            Arc::clone(&program)
        };
        check_snapshot(&once).unwrap();
        prop_assert!(!GarbageCollect.apply(&once).is_success(), "second collection changed something");

        let mut used: FxHashSet<OpId> = FxHashSet::default();
        once.walk(&mut |op| used.extend(op.operands.iter().filter_map(|v| v.defining_op().map(|d| d.id()))));
        let mut dead = Vec::new();
        once.walk(&mut |op| {
            if op.dialect == "arith" && !used.contains(&op.id()) {
                dead.push(op.full_name());
            }
        });
        prop_assert!(dead.is_empty(), "unused after collection: {:?}", dead);
    }
}
