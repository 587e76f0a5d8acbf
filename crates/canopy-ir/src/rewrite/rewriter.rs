//! PatternRewriter: the edit a pattern requests for its matched operation.
//!
//! Patterns create new operations directly in the context (detached) and
//! describe where they go through the rewriter; the applicator commits the
//! recorded edit afterwards via [`apply_mutations`].

use crate::context::IrContext;
use crate::error::InvariantError;
use crate::refs::{BlockRef, OpRef, RegionRef, ValueRef};

/// What happens to the matched operation itself.
enum Edit {
    /// Swap in one operation whose results stand in 1:1 for the old ones.
    ReplaceWithOp(OpRef),
    /// Splice `ops` in place of the matched op; `values` stand in for its results.
    Replace { ops: Vec<OpRef>, values: Vec<ValueRef> },
    /// Erase the matched op, which must be unused by then.
    Erase,
}

pub(crate) struct Mutations {
    prefix_ops: Vec<OpRef>,
    suffix_ops: Vec<OpRef>,
    edit: Option<Edit>,
    module_ops: Vec<OpRef>,
}

/// Recorder handed to [`RewritePattern`](super::RewritePattern)s.
#[derive(Default)]
pub struct PatternRewriter {
    prefix_ops: Vec<OpRef>,
    suffix_ops: Vec<OpRef>,
    edit: Option<Edit>,
    module_ops: Vec<OpRef>,
    modified_in_place: bool,
}

impl PatternRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    // === Mutations ===

    /// Insert a detached operation before the matched one.
    ///
    /// Multiple calls keep their order.
    pub fn insert_op(&mut self, op: OpRef) {
        self.prefix_ops.push(op);
    }

    /// Insert a detached operation after the matched one.
    ///
    /// Multiple calls keep their order.
    pub fn insert_op_after(&mut self, op: OpRef) {
        self.suffix_ops.push(op);
    }

    /// Replace the matched operation with `new_op`, mapping results by index.
    pub fn replace_op(&mut self, new_op: OpRef) {
        self.set_edit(Edit::ReplaceWithOp(new_op));
    }

    /// Replace the matched operation with a sequence of operations.
    ///
    /// `values` must have one entry per result of the matched operation; each
    /// use of result `i` is redirected to `values[i]`. The values may come
    /// from `ops`, from earlier operations, or from block arguments.
    pub fn replace_op_with(&mut self, ops: Vec<OpRef>, values: Vec<ValueRef>) {
        self.set_edit(Edit::Replace { ops, values });
    }

    /// Erase the matched operation, redirecting its results to `values`.
    pub fn erase_op(&mut self, values: Vec<ValueRef>) {
        self.set_edit(Edit::Replace {
            ops: Vec::new(),
            values,
        });
    }

    /// Erase the matched operation, which must have no uses.
    ///
    /// Committing this for a used operation fails with
    /// [`InvariantError::StillInUse`].
    pub fn erase_matched_op(&mut self) {
        self.set_edit(Edit::Erase);
    }

    /// Append an operation to the enclosing module's top-level block.
    pub fn add_module_op(&mut self, op: OpRef) {
        self.module_ops.push(op);
    }

    /// Record that the pattern already changed the matched op in place.
    pub fn notify_modified(&mut self) {
        self.modified_in_place = true;
    }

    // === In-place helpers ===

    /// Rewire one operand of `op` and count it as a modification.
    pub fn set_operand(&mut self, ctx: &mut IrContext, op: OpRef, index: u32, value: ValueRef) {
        ctx.set_operand(op, index, value);
        self.modified_in_place = true;
    }

    /// Move the blocks of `from` into a fresh unowned region.
    pub fn move_region_contents(&mut self, ctx: &mut IrContext, from: RegionRef) -> RegionRef {
        self.modified_in_place = true;
        ctx.move_region_contents(from)
    }

    fn set_edit(&mut self, edit: Edit) {
        debug_assert!(
            self.edit.is_none(),
            "matched operation was already replaced or erased by this pattern"
        );
        self.edit = Some(edit);
    }

    // === Query ===

    pub(crate) fn has_mutations(&self) -> bool {
        self.modified_in_place
            || self.edit.is_some()
            || !self.prefix_ops.is_empty()
            || !self.suffix_ops.is_empty()
            || !self.module_ops.is_empty()
    }

    /// Whether the recorded edit removes the matched operation.
    pub(crate) fn removes_matched(&self) -> bool {
        self.edit.is_some()
    }

    pub(crate) fn take_mutations(self) -> Mutations {
        Mutations {
            prefix_ops: self.prefix_ops,
            suffix_ops: self.suffix_ops,
            edit: self.edit,
            module_ops: self.module_ops,
        }
    }
}

/// Commit recorded mutations around `target`.
///
/// Prefix and replacement operations go before `target`, suffix operations
/// after it; then uses are redirected and `target` is erased if the edit
/// asked for it.
///
/// # Errors
///
/// Fails with [`InvariantError::ReplacementArity`] when the stand-in values
/// do not match the result count, and with [`InvariantError::StillInUse`]
/// when the erased operation would still have uses after redirection. Both
/// are detected before anything is inserted, so the graph is unchanged on
/// every error.
pub(crate) fn apply_mutations(
    ctx: &mut IrContext,
    target: OpRef,
    mutations: Mutations,
    module_block: Option<BlockRef>,
) -> Result<(), InvariantError> {
    let stand_ins: Option<Vec<ValueRef>> = match &mutations.edit {
        Some(Edit::ReplaceWithOp(op)) => Some(ctx.op_results(*op).to_vec()),
        Some(Edit::Replace { values, .. }) => Some(values.clone()),
        Some(Edit::Erase) | None => None,
    };
    if let Some(values) = &stand_ins {
        let expected = ctx.op_results(target).len();
        if values.len() != expected {
            return Err(InvariantError::ReplacementArity {
                op: target,
                expected,
                found: values.len(),
            });
        }
    }

    if mutations.edit.is_some() {
        let results = ctx.op_results(target);
        let self_referencing = stand_ins
            .iter()
            .flatten()
            .any(|v| results.contains(v));
        let uses = ctx.result_use_count(target);
        let redirected = stand_ins.is_some() && !self_referencing;
        if uses > 0 && !redirected {
            return Err(InvariantError::StillInUse { op: target, uses });
        }
    }

    let attached = ctx.op(target).parent_block.is_some();
    if attached {
        for &op in &mutations.prefix_ops {
            ctx.insert_op_before(target, op);
        }
        match &mutations.edit {
            Some(Edit::ReplaceWithOp(op)) => ctx.insert_op_before(target, *op),
            Some(Edit::Replace { ops, .. }) => {
                for &op in ops {
                    ctx.insert_op_before(target, op);
                }
            }
            Some(Edit::Erase) | None => {}
        }
        let mut anchor = target;
        for &op in &mutations.suffix_ops {
            ctx.insert_op_after(anchor, op);
            anchor = op;
        }
    }

    if let Some(values) = stand_ins {
        let old: Vec<ValueRef> = ctx.op_results(target).to_vec();
        for (old_v, new_v) in old.into_iter().zip(values) {
            ctx.replace_all_uses(old_v, new_v);
        }
    }
    if mutations.edit.is_some() {
        ctx.erase_op(target)?;
    }

    if let Some(block) = module_block {
        for op in mutations.module_ops {
            ctx.push_op(block, op);
        }
    }
    Ok(())
}
