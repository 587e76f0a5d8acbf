//! Integrity checks for the mutable graph.
//!
//! Mutation methods keep use-sets and ownership links in sync on their own;
//! this module re-derives both from scratch so tests and pass pipelines can
//! check that nothing drifted:
//!
//! 1. **Ownership**: every region, block and operation reachable from the
//!    root points back at its actual owner, and nothing reachable is erased.
//! 2. **Use-sets**: for every value touched by the subtree, the recorded
//!    use-set equals the set of operand slots that reference it.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::context::IrContext;
use crate::error::InvariantError;
use crate::refs::{OpRef, Use, ValueDef, ValueRef};
use crate::walk::collect_preorder;

/// Check ownership links and use-sets under `root`.
pub fn check_invariants(ctx: &IrContext, root: OpRef) -> Result<(), InvariantError> {
    let ops = collect_preorder(ctx, root);
    check_ownership(ctx, &ops)?;
    check_use_sets(ctx, &ops)
}

fn ownership(detail: String) -> InvariantError {
    InvariantError::Ownership { detail }
}

fn check_ownership(ctx: &IrContext, ops: &[OpRef]) -> Result<(), InvariantError> {
    for &op in ops {
        if ctx.is_erased(op) {
            return Err(ownership(format!("{op} is erased but still reachable")));
        }
        for &region in &ctx.op(op).regions {
            if ctx.region(region).parent_op != Some(op) {
                return Err(ownership(format!("{region} is held by {op} but not linked to it")));
            }
            for &block in &ctx.region(region).blocks {
                if ctx.block(block).parent_region != Some(region) {
                    return Err(ownership(format!("{block} is held by {region} but not linked to it")));
                }
                for &child in &ctx.block(block).ops {
                    if ctx.op(child).parent_block != Some(block) {
                        return Err(ownership(format!("{child} is held by {block} but not linked to it")));
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_use_sets(ctx: &IrContext, ops: &[OpRef]) -> Result<(), InvariantError> {
    let mut expected: FxHashMap<ValueRef, FxHashSet<Use>> = FxHashMap::default();

    for &op in ops {
        for &v in ctx.op_results(op) {
            expected.entry(v).or_default();
        }
        for &region in &ctx.op(op).regions {
            for &block in &ctx.region(region).blocks {
                for &v in ctx.block_args(block) {
                    expected.entry(v).or_default();
                }
            }
        }
        for (idx, &v) in ctx.op_operands(op).iter().enumerate() {
            if let ValueDef::OpResult(def, _) = ctx.value_def(v)
                && ctx.is_erased(def)
            {
                return Err(InvariantError::UseSet {
                    value: v,
                    detail: format!("operand #{idx} of {op} refers to a result of erased {def}"),
                });
            }
            expected.entry(v).or_default().insert(Use {
                user: op,
                operand_index: idx as u32,
            });
        }
    }

    for (&value, slots) in &expected {
        let recorded = ctx.uses(value);
        let mut seen: SmallVec<[Use; 4]> = SmallVec::new();
        for u in recorded {
            if seen.contains(u) {
                return Err(InvariantError::UseSet {
                    value,
                    detail: format!("duplicate use {}#{}", u.user, u.operand_index),
                });
            }
            seen.push(*u);
            let operands = ctx.op_operands(u.user);
            let holds = operands.get(u.operand_index as usize) == Some(&value);
            if ctx.is_erased(u.user) || !holds {
                return Err(InvariantError::UseSet {
                    value,
                    detail: format!("recorded use {}#{} does not reference it", u.user, u.operand_index),
                });
            }
        }
        if let Some(missing) = slots.iter().find(|u| !recorded.contains(u)) {
            return Err(InvariantError::UseSet {
                value,
                detail: format!(
                    "operand #{} of {} is missing from the use-set",
                    missing.operand_index, missing.user
                ),
            });
        }
    }
    Ok(())
}
