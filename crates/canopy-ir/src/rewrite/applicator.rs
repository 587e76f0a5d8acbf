//! PatternApplicator: drives patterns over a module.
//!
//! Each pass walks the module in pre-order over a snapshot of every block's
//! operation list. Operations detached or erased earlier in the pass are
//! skipped, and operations inserted by a rewrite are first visited by the
//! next pass, so a rewritten operation is never revisited in the same pass.

use tracing::{debug, trace};

use crate::context::IrContext;
use crate::error::InvariantError;
use crate::ops::Module;
use crate::refs::{BlockRef, OpRef, RegionRef};
use crate::validation::check_invariants;

use super::pattern::RewritePattern;
use super::rewriter::{self, PatternRewriter};

/// Outcome of running an applicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyResult {
    /// Number of passes performed.
    pub iterations: usize,
    /// Total number of committed rewrites.
    pub total_changes: usize,
    /// Whether the last pass made no change.
    pub reached_fixpoint: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RewriteMode {
    /// One pass, at most one rewrite per visited operation.
    Once,
    /// Repeat passes until one makes no change.
    #[default]
    Fixpoint,
}

pub struct PatternApplicator {
    patterns: Vec<Box<dyn RewritePattern>>,
    max_iterations: usize,
}

impl Default for PatternApplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternApplicator {
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
            max_iterations: 100,
        }
    }

    /// Register a pattern. Patterns are tried in registration order and the
    /// first match at an operation wins.
    pub fn add_pattern(mut self, pattern: impl RewritePattern + 'static) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    /// Bound the number of passes in fixpoint mode.
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn apply(
        &self,
        ctx: &mut IrContext,
        module: Module,
        mode: RewriteMode,
    ) -> Result<ApplyResult, InvariantError> {
        match mode {
            RewriteMode::Once => self.apply_once(ctx, module),
            RewriteMode::Fixpoint => self.apply_to_fixpoint(ctx, module),
        }
    }

    /// Run exactly one pass.
    #[tracing::instrument(skip_all)]
    pub fn apply_once(
        &self,
        ctx: &mut IrContext,
        module: Module,
    ) -> Result<ApplyResult, InvariantError> {
        let changes = self.run_pass(ctx, module)?;
        Ok(ApplyResult {
            iterations: 1,
            total_changes: changes,
            reached_fixpoint: changes == 0,
        })
    }

    /// Run passes until one makes no change or the iteration cap is hit.
    ///
    /// Hitting the cap is not an error; check
    /// [`ApplyResult::reached_fixpoint`].
    #[tracing::instrument(skip_all)]
    pub fn apply_to_fixpoint(
        &self,
        ctx: &mut IrContext,
        module: Module,
    ) -> Result<ApplyResult, InvariantError> {
        let mut total_changes = 0;
        for iteration in 1..=self.max_iterations {
            let changes = self.run_pass(ctx, module)?;
            total_changes += changes;
            debug!(iteration, changes, "rewrite pass finished");
            if changes == 0 {
                return Ok(ApplyResult {
                    iterations: iteration,
                    total_changes,
                    reached_fixpoint: true,
                });
            }
        }
        debug!(
            max_iterations = self.max_iterations,
            total_changes, "rewrite stopped at iteration cap"
        );
        Ok(ApplyResult {
            iterations: self.max_iterations,
            total_changes,
            reached_fixpoint: false,
        })
    }

    fn run_pass(&self, ctx: &mut IrContext, module: Module) -> Result<usize, InvariantError> {
        let module_block = module.first_block(ctx);
        let changes = self.visit_region(ctx, module.body(ctx), module_block)?;
        if cfg!(debug_assertions) {
            check_invariants(ctx, module.op())?;
        }
        Ok(changes)
    }

    fn visit_region(
        &self,
        ctx: &mut IrContext,
        region: RegionRef,
        module_block: Option<BlockRef>,
    ) -> Result<usize, InvariantError> {
        let mut changes = 0;
        let blocks: Vec<BlockRef> = ctx.region(region).blocks.to_vec();
        for block in blocks {
            changes += self.visit_block(ctx, block, module_block)?;
        }
        Ok(changes)
    }

    fn visit_block(
        &self,
        ctx: &mut IrContext,
        block: BlockRef,
        module_block: Option<BlockRef>,
    ) -> Result<usize, InvariantError> {
        let mut changes = 0;
        let ops: Vec<OpRef> = ctx.block(block).ops.to_vec();

        for op in ops {
            if ctx.is_erased(op) || ctx.op(op).parent_block != Some(block) {
                continue;
            }

            let mut removed = false;
            for pattern in &self.patterns {
                let mut rw = PatternRewriter::new();
                if !pattern.match_and_rewrite(ctx, op, &mut rw) || !rw.has_mutations() {
                    continue;
                }
                trace!(pattern = pattern.name(), %op, "pattern applied");
                removed = rw.removes_matched();
                rewriter::apply_mutations(ctx, op, rw.take_mutations(), module_block)?;
                changes += 1;
                break;
            }

            if !removed {
                let regions: Vec<RegionRef> = ctx.op(op).regions.to_vec();
                for region in regions {
                    changes += self.visit_region(ctx, region, module_block)?;
                }
            }
        }

        Ok(changes)
    }
}
