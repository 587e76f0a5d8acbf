//! Dead code elimination.
//!
//! Removes operations that are registered pure and whose results have no
//! uses. Use-sets are exact, so deadness is a local check; the sweep walks
//! each block backwards so a whole dead chain usually falls in one sweep,
//! and sweeps repeat until nothing more is removed.

use tracing::debug;

use crate::context::IrContext;
use crate::error::InvariantError;
use crate::op_interface::PureOps;
use crate::ops::Module;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Configuration for dead code elimination.
#[derive(Debug, Clone)]
pub struct DceConfig {
    /// Maximum sweeps before giving up. Default: 100.
    pub max_iterations: usize,
    /// Whether to descend into nested regions. Default: true.
    pub recursive: bool,
}

impl Default for DceConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            recursive: true,
        }
    }
}

impl DceConfig {
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DceResult {
    /// Total number of operations removed.
    pub removed_count: usize,
    /// Number of sweeps performed.
    pub iterations: usize,
    /// Whether the last sweep removed nothing.
    pub reached_fixpoint: bool,
}

pub fn eliminate_dead_code(ctx: &mut IrContext, module: Module) -> Result<DceResult, InvariantError> {
    eliminate_dead_code_with_config(ctx, module, &DceConfig::default())
}

#[tracing::instrument(skip_all)]
pub fn eliminate_dead_code_with_config(
    ctx: &mut IrContext,
    module: Module,
    config: &DceConfig,
) -> Result<DceResult, InvariantError> {
    let max_iterations = config.max_iterations.max(1);
    let mut total_removed = 0;

    for iteration in 1..=max_iterations {
        let removed = sweep_region(ctx, module.body(ctx), config)?;
        if removed == 0 {
            debug!(removed = total_removed, iterations = iteration, "dce reached fixpoint");
            return Ok(DceResult {
                removed_count: total_removed,
                iterations: iteration,
                reached_fixpoint: true,
            });
        }
        total_removed += removed;
    }

    debug!(removed = total_removed, max_iterations, "dce stopped at iteration cap");
    Ok(DceResult {
        removed_count: total_removed,
        iterations: max_iterations,
        reached_fixpoint: false,
    })
}

fn sweep_region(ctx: &mut IrContext, region: RegionRef, config: &DceConfig) -> Result<usize, InvariantError> {
    let blocks: Vec<BlockRef> = ctx.region(region).blocks.to_vec();
    let mut removed = 0;
    for block in blocks {
        removed += sweep_block(ctx, block, config)?;
    }
    Ok(removed)
}

fn sweep_block(ctx: &mut IrContext, block: BlockRef, config: &DceConfig) -> Result<usize, InvariantError> {
    let mut removed = 0;

    if config.recursive {
        let ops: Vec<OpRef> = ctx.block(block).ops.to_vec();
        for op in ops {
            let regions: Vec<RegionRef> = ctx.op(op).regions.to_vec();
            for region in regions {
                removed += sweep_region(ctx, region, config)?;
            }
        }
    }

    // Reverse order: users go before the ops they keep alive.
    let ops: Vec<OpRef> = ctx.block(block).ops.to_vec();
    for &op in ops.iter().rev() {
        if is_dead(ctx, op) {
            ctx.erase_op(op)?;
            removed += 1;
        }
    }

    Ok(removed)
}

/// Pure, and no result has a use.
pub fn is_dead(ctx: &IrContext, op: OpRef) -> bool {
    PureOps::is_pure_op(ctx, op) && ctx.op_results(op).iter().all(|&v| !ctx.has_uses(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::arith::{self, BinaryOp};
    use crate::dialect::{func, scf};
    use crate::location::{Location, Span};
    use crate::ops::DialectOp;
    use crate::printer::print_op;
    use crate::symbol::Symbol;
    use crate::validation::check_invariants;
    use proptest::prelude::*;

    fn loc(ctx: &mut IrContext) -> Location {
        Location::new(ctx.paths.intern("dce.test"), Span::default())
    }

    #[test]
    fn removes_dead_chain_and_keeps_effects() {
        let mut ctx = IrContext::new();
        let loc = loc(&mut ctx);
        let i32_ty = ctx.simple_type("core", "i32");
        let (f, entry) = func::func(&mut ctx, loc, "main", [i32_ty]);
        let arg = ctx.block_arg(entry, 0);
        let c = arith::constant(&mut ctx, loc, i32_ty, 5);
        let cv = c.result(&ctx);
        let dead_mul = arith::muli(&mut ctx, loc, arg, cv);
        let dm = dead_mul.result(&ctx);
        let dead_add = arith::addi(&mut ctx, loc, dm, cv);
        let call = func::call(&mut ctx, loc, Symbol::new("effect"), [arg], [i32_ty]);
        let ret = func::r#return(&mut ctx, loc, [arg]);
        for op in [c.op_ref(), dead_mul.op_ref(), dead_add.op_ref(), call.op_ref(), ret.op_ref()] {
            ctx.push_op(entry, op);
        }
        let module = Module::create(&mut ctx, loc, Symbol::new("m"), [f.op_ref()]);

        let result = eliminate_dead_code(&mut ctx, module).unwrap();
        assert_eq!(result.removed_count, 3);
        assert!(result.reached_fixpoint);
        check_invariants(&ctx, module.op()).unwrap();

        insta::assert_snapshot!(print_op(&ctx, module.op()), @r"
        core.module {sym_name = @m} {
          func.func {sym_name = @main} {
            ^bb0(%0: core.i32):
              %1 = func.call %0 {callee = @effect} : core.i32
              func.return %0
          }
        }
        ");
    }

    #[test]
    fn non_recursive_leaves_nested_regions() {
        let mut ctx = IrContext::new();
        let loc = loc(&mut ctx);
        let i1 = ctx.simple_type("core", "i1");
        let i32_ty = ctx.simple_type("core", "i32");
        let (f, entry) = func::func(&mut ctx, loc, "main", []);
        let cond = arith::constant(&mut ctx, loc, i1, 0);
        let cv = cond.result(&ctx);
        let unused = arith::constant(&mut ctx, loc, i32_ty, 9);
        let then = scf::yield_region(&mut ctx, loc, vec![unused.op_ref()], []);
        let if_op = scf::r#if(&mut ctx, loc, cv, [], then, None);
        let ret = func::r#return(&mut ctx, loc, []);
        for op in [cond.op_ref(), if_op.op_ref(), ret.op_ref()] {
            ctx.push_op(entry, op);
        }
        let module = Module::create(&mut ctx, loc, Symbol::new("m"), [f.op_ref()]);

        let shallow = DceConfig::default().with_recursive(false);
        let result = eliminate_dead_code_with_config(&mut ctx, module, &shallow).unwrap();
        assert_eq!(result.removed_count, 0);
        assert!(!ctx.is_erased(unused.op_ref()));

        let result = eliminate_dead_code(&mut ctx, module).unwrap();
        assert_eq!(result.removed_count, 1);
        assert!(ctx.is_erased(unused.op_ref()));
        assert!(!ctx.is_erased(if_op.op_ref()));
    }

    /// Random straight-line arithmetic where each op reads two earlier values.
    fn random_body(ctx: &mut IrContext, picks: &[(usize, usize, bool)], returned: usize) -> Module {
        let loc = loc(ctx);
        let i32_ty = ctx.simple_type("core", "i32");
        let (f, entry) = func::func(ctx, loc, "main", [i32_ty]);
        let mut values = vec![ctx.block_arg(entry, 0)];
        for (i, &(a, b, is_const)) in picks.iter().enumerate() {
            let op = if is_const {
                let c = arith::constant(ctx, loc, i32_ty, i as i64);
                c.op_ref()
            } else {
                let lhs = values[a % values.len()];
                let rhs = values[b % values.len()];
                arith::addi(ctx, loc, lhs, rhs).op_ref()
            };
            ctx.push_op(entry, op);
            values.push(ctx.op_result(op, 0));
        }
        let ret = func::r#return(ctx, loc, [values[returned % values.len()]]);
        ctx.push_op(entry, ret.op_ref());
        Module::create(ctx, loc, Symbol::new("m"), [f.op_ref()])
    }

    proptest! {
        #[test]
        fn dce_reaches_a_fixpoint_without_dead_pure_ops(
            picks in prop::collection::vec((0usize..16, 0usize..16, any::<bool>()), 0..24),
            returned in 0usize..32,
        ) {
            let mut ctx = IrContext::new();
            let module = random_body(&mut ctx, &picks, returned);
            let result = eliminate_dead_code(&mut ctx, module).unwrap();
            prop_assert!(result.reached_fixpoint);
            check_invariants(&ctx, module.op()).unwrap();

            let func_op = module.ops(&ctx)[0];
            let entry = func::Func::from_op(&ctx, func_op).unwrap().entry_block(&ctx);
            for &op in &ctx.block(entry).ops {
                prop_assert!(!is_dead(&ctx, op), "{} survived dce", ctx.op_full_name(op));
            }

            let again = eliminate_dead_code(&mut ctx, module).unwrap();
            prop_assert_eq!(again.removed_count, 0);
        }
    }

    #[test]
    fn live_chain_is_untouched() {
        let mut ctx = IrContext::new();
        let module = random_body(&mut ctx, &[(0, 0, false), (1, 0, false)], 2);
        eliminate_dead_code(&mut ctx, module).unwrap();
        let entry = func::Func::from_op(&ctx, module.ops(&ctx)[0]).unwrap().entry_block(&ctx);
        let ops = ctx.block(entry).ops.to_vec();
        assert_eq!(ops.len(), 3);
        let outer = arith::Addi::from_op(&ctx, ops[1]).unwrap();
        assert_eq!(outer.lhs(&ctx), ctx.op_result(ops[0], 0));
    }
}
