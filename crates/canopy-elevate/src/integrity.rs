//! Visibility check for snapshots.
//!
//! Inside a snapshot an operand may use a result of an operation that comes
//! earlier in the same block, in an earlier block of the same region, or
//! earlier in an enclosing block; and an argument of any block in an
//! enclosing region. Rewrites that splice replacements incorrectly break
//! exactly this, so the traversals' tests run it after every step.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::IntegrityError;
use crate::imm::{BlockId, IOp, IValue, OpId};

#[derive(Default)]
struct Levels {
    ops: Vec<FxHashSet<OpId>>,
    blocks: Vec<Vec<BlockId>>,
}

impl Levels {
    fn sees_op(&self, id: OpId) -> bool {
        self.ops.iter().any(|l| l.contains(&id))
    }

    fn sees_block(&self, id: BlockId) -> bool {
        self.blocks.iter().any(|l| l.contains(&id))
    }
}

/// Check that every value used below `root` is visible at its use.
///
/// `root`'s own operands are not checked; they refer to its context.
pub fn check_snapshot(root: &Arc<IOp>) -> Result<(), IntegrityError> {
    let mut levels = Levels::default();
    check_regions(root, &mut levels)
}

fn check_regions(op: &Arc<IOp>, levels: &mut Levels) -> Result<(), IntegrityError> {
    for region in &op.regions {
        levels.blocks.push(region.blocks.iter().map(|b| b.id).collect());
        levels.ops.push(FxHashSet::default());
        for block in &region.blocks {
            for nested in &block.ops {
                check_op(nested, levels)?;
                if let Some(top) = levels.ops.last_mut() {
                    top.insert(nested.id());
                }
            }
        }
        levels.ops.pop();
        levels.blocks.pop();
    }
    Ok(())
}

fn check_op(op: &Arc<IOp>, levels: &mut Levels) -> Result<(), IntegrityError> {
    for v in &op.operands {
        match v {
            IValue::Result { op: def, .. } if !levels.sees_op(def.id()) => {
                return Err(IntegrityError::InvisibleResult {
                    user: op.full_name(),
                    def: def.id(),
                });
            }
            IValue::BlockArg { block, .. } if !levels.sees_block(*block) => {
                return Err(IntegrityError::InvisibleBlockArg {
                    user: op.full_name(),
                    block: *block,
                });
            }
            _ => {}
        }
    }
    let siblings = levels.blocks.last().map(Vec::as_slice).unwrap_or(&[]);
    if let Some(&block) = op.successors.iter().find(|b| !siblings.contains(*b)) {
        return Err(IntegrityError::InvalidSuccessor {
            user: op.full_name(),
            block,
        });
    }
    check_regions(op, levels)
}
