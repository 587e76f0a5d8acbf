//! Running a strategy as a module pass.

use std::sync::Arc;

use canopy_ir::pass::ModulePass;
use canopy_ir::{IrContext, Module, PassError};
use tracing::debug;

use crate::bridge::{freeze, thaw};
use crate::integrity::check_snapshot;
use crate::strategy::{RewriteResult, StrategyRef};

/// Freezes the module, applies a strategy to it and writes the result back.
///
/// A failing strategy leaves the module untouched and is not an error. The
/// strategy must rewrite the module into a single `core.module`; the module
/// operation itself keeps its identity, only its body and attributes are
/// replaced.
pub struct StrategyPass {
    name: &'static str,
    strategy: StrategyRef,
}

impl StrategyPass {
    pub fn new(name: &'static str, strategy: StrategyRef) -> Self {
        Self { name, strategy }
    }
}

impl ModulePass for StrategyPass {
    fn name(&self) -> &'static str {
        self.name
    }

    #[tracing::instrument(skip_all, fields(pass = self.name))]
    fn run(&self, ctx: &mut IrContext, module: Module) -> Result<(), PassError> {
        let frozen = freeze(ctx, module.op()).map_err(|e| PassError::failed(self.name, e))?;
        let replacement = match self.strategy.apply(&frozen) {
            RewriteResult::Success(r) => r,
            RewriteResult::Failure(failure) => {
                debug!(%failure, "strategy did not apply");
                return Ok(());
            }
        };
        let Some(new_root) = replacement.as_op().filter(|op| op.is("core", "module")) else {
            return Err(PassError::failed(
                self.name,
                "strategy must produce exactly one core.module",
            ));
        };
        if Arc::ptr_eq(new_root, &frozen) {
            debug!("strategy left the module unchanged");
            return Ok(());
        }
        if cfg!(debug_assertions) {
            check_snapshot(new_root).map_err(|e| PassError::failed(self.name, e))?;
        }

        let thawed = thaw(ctx, new_root).map_err(|e| PassError::failed(self.name, e))?;
        let Some(&new_body) = ctx.op(thawed).regions.first() else {
            return Err(PassError::failed(self.name, "rewritten module has no body"));
        };
        let old_body = module.body(ctx);
        ctx.erase_region_contents(old_body);
        ctx.take_region_blocks(new_body, old_body);
        let attributes = ctx.op(thawed).attributes.clone();
        ctx.op_mut(module.op()).attributes = attributes;
        ctx.erase_op(thawed).map_err(|e| PassError::new(self.name, e))?;
        debug!(ops = new_root.size(), "module rewritten");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use canopy_ir::dialect::{arith, func};
    use canopy_ir::pass::PassManager;
    use canopy_ir::printer::print_op;
    use canopy_ir::{DialectOp, Location, Span, Symbol};

    use super::*;
    use crate::combinators::{everywhere, fail};
    use crate::imm::IOp;
    use crate::strategy::{Replacement, Strategy, fail_with, strategy};

    /// Doubles every constant.
    #[derive(Clone)]
    struct Double;

    impl fmt::Display for Double {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("double")
        }
    }

    impl Strategy for Double {
        fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
            match op.attr("value").and_then(|a| a.as_i64()) {
                Some(v) if op.is("arith", "constant") => RewriteResult::success(Replacement::op(
                    IOp::from_op(op).attr("value", v * 2).finish(),
                )),
                _ => fail_with(self),
            }
        }
    }

    /// Replaces whatever it is given with nothing.
    #[derive(Clone)]
    struct Forward;

    impl fmt::Display for Forward {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("forward")
        }
    }

    impl Strategy for Forward {
        fn apply(&self, _op: &Arc<IOp>) -> RewriteResult {
            RewriteResult::success(Replacement::values(vec![]))
        }
    }

    fn sample(ctx: &mut IrContext) -> Module {
        let loc = Location::new(ctx.paths.intern("t"), Span::default());
        let i32_ty = ctx.simple_type("core", "i32");
        let (f, entry) = func::func(ctx, loc, "main", []);
        let c = arith::constant(ctx, loc, i32_ty, 21);
        let cv = c.result(ctx);
        let ret = func::r#return(ctx, loc, [cv]);
        ctx.push_op(entry, c.op_ref());
        ctx.push_op(entry, ret.op_ref());
        Module::create(ctx, loc, Symbol::new("m"), [f.op_ref()])
    }

    #[test]
    fn rewrites_the_module_in_place() {
        let mut ctx = IrContext::new();
        let module = sample(&mut ctx);
        PassManager::default()
            .add_pass(StrategyPass::new("double", everywhere(strategy(Double))))
            .run(&mut ctx, module)
            .unwrap();

        insta::assert_snapshot!(print_op(&ctx, module.op()), @r"
        core.module {sym_name = @m} {
          func.func {sym_name = @main} {
            %0 = arith.constant {value = 42} : core.i32
            func.return %0
          }
        }
        ");
    }

    #[test]
    fn failing_strategy_is_not_an_error() {
        let mut ctx = IrContext::new();
        let module = sample(&mut ctx);
        let before = print_op(&ctx, module.op());
        StrategyPass::new("nothing", fail()).run(&mut ctx, module).unwrap();
        assert_eq!(print_op(&ctx, module.op()), before);
    }

    #[test]
    fn non_module_results_are_rejected() {
        let mut ctx = IrContext::new();
        let module = sample(&mut ctx);
        let err = StrategyPass::new("forward", strategy(Forward))
            .run(&mut ctx, module)
            .unwrap_err();
        assert_eq!(err.pass, "forward");
        assert_eq!(
            err.kind.to_string(),
            "strategy must produce exactly one core.module"
        );
    }
}
