//! Removal of unused pure operations from a snapshot.

use std::fmt;
use std::sync::Arc;

use canopy_ir::op_interface::PureOps;
use rustc_hash::FxHashMap;

use crate::imm::{IOp, OpId};
use crate::rebuild::{Rebuilder, Visit};
use crate::strategy::{Replacement, RewriteResult, Strategy, fail_with};

/// Drops every pure operation nested in the target whose results have no
/// uses, including those that only become unused once their users are gone.
///
/// Fails when there is nothing to collect, so traversals move on to the next
/// site and a second application changes nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct GarbageCollect;

impl fmt::Display for GarbageCollect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("garbage_collect")
    }
}

/// Number of operand slots referring to each operation's results.
fn use_counts(root: &Arc<IOp>) -> FxHashMap<OpId, usize> {
    let mut counts = FxHashMap::default();
    root.walk(&mut |op| {
        for v in &op.operands {
            if let Some(def) = v.defining_op() {
                *counts.entry(def.id()).or_insert(0) += 1;
            }
        }
    });
    counts
}

/// One sweep against use counts taken before it; returns the rebuilt
/// operation and how many operations were dropped.
fn sweep(op: &Arc<IOp>) -> (Arc<IOp>, usize) {
    let counts = use_counts(op);
    let mut removed = 0usize;
    let root = Rebuilder::default().transform_children(op, &mut |original, rebuilt| {
        let unused = !counts.contains_key(&original.id()) && !counts.contains_key(&rebuilt.id());
        if unused && PureOps::is_pure(rebuilt.dialect, rebuilt.name) {
            removed += 1;
            Visit::Remove
        } else {
            Visit::Keep
        }
    });
    (root, removed)
}

impl Strategy for GarbageCollect {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        let mut current = Arc::clone(op);
        let mut total = 0usize;
        let mut sweeps = 0usize;
        // Every sweep that changes something removes at least one operation.
        loop {
            let (next, removed) = sweep(&current);
            sweeps += 1;
            if removed == 0 {
                break;
            }
            total += removed;
            current = next;
        }
        tracing::debug!(removed = total, sweeps, "garbage collection");
        if total == 0 {
            return fail_with(self);
        }
        RewriteResult::success(Replacement::op(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imm::{IAttr, IRegion, IType};
    use crate::print::print_iop;

    fn i32_ty() -> IType {
        IType::simple("core", "i32")
    }

    fn constant(v: i64) -> Arc<IOp> {
        IOp::build("arith", "constant").result(i32_ty()).attr("value", v).finish()
    }

    #[test]
    fn removes_dead_chains_in_one_application() {
        let a = constant(1);
        let b = constant(2);
        let dead_sum = IOp::build("arith", "addi")
            .operands([a.result(0), a.result(0)])
            .result(i32_ty())
            .finish();
        let ret = IOp::build("func", "return").operand(b.result(0)).finish();
        let root = IOp::build("test", "holder")
            .region(IRegion::single(vec![a, b, dead_sum, ret]))
            .finish();

        let once = GarbageCollect.apply(&root).unwrap_op();
        insta::assert_snapshot!(print_iop(&once), @r"
        test.holder {
          %0 = arith.constant {value = 2} : core.i32
          func.return %0
        }
        ");
        assert!(!GarbageCollect.apply(&once).is_success());
    }

    #[test]
    fn sweeps_nested_regions() {
        let inner = constant(3);
        let nested = IOp::build("test", "holder")
            .region(IRegion::single(vec![inner]))
            .finish();
        let root = IOp::build("test", "holder")
            .region(IRegion::single(vec![nested]))
            .finish();
        let out = GarbageCollect.apply(&root).unwrap_op();
        assert!(out.regions[0].ops()[0].regions[0].ops().is_empty());
    }

    #[test]
    fn effectful_ops_survive() {
        let call = IOp::build("func", "call")
            .attr("callee", canopy_ir::Symbol::new("f"))
            .result(i32_ty())
            .finish();
        let root = IOp::build("test", "holder")
            .region(IRegion::single(vec![call]))
            .finish();
        assert!(!GarbageCollect.apply(&root).is_success());
    }

    #[test]
    fn bottom_to_top_collects_at_the_enclosing_op() {
        let one = constant(1);
        let zero = constant(0);
        let ret = IOp::build("func", "return").operand(one.result(0)).finish();
        let root = IOp::build("test", "holder")
            .region(IRegion::single(vec![one, zero, ret]))
            .finish();
        let out = crate::combinators::bottom_to_top(crate::strategy::strategy(GarbageCollect))
            .apply(&root)
            .unwrap_op();
        assert_eq!(out.regions[0].ops().len(), 2);
        assert_eq!(out.regions[0].ops()[0].attr("value").and_then(IAttr::as_i64), Some(1));
    }
}
