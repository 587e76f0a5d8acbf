//! The same cleanup done by the in-place rewriter and by a strategy pass.

mod common;

use canopy::elevate::{
    GarbageCollect, StrategyPass, freeze, print_iop, repeat, seq, strategy, top_to_bottom,
};
use canopy::ir::dialect::arith::{self, BinaryOp};
use canopy::ir::dialect::func;
use canopy::ir::pass::{DeadCodeElimination, PassManager, RewritePass};
use canopy::ir::printer::print_op;
use canopy::ir::rewrite::{OpRewritePattern, PatternApplicator, PatternRewriter, typed};
use canopy::ir::validation::check_invariants;
use canopy::ir::{DialectOp, IrContext, Location, Module, Span, Symbol};
use common::FoldConstantAdd;

/// `arith.addi(const a, const b)` => `arith.constant a + b`
struct FoldAdd;

impl OpRewritePattern for FoldAdd {
    type Op = arith::Addi;

    fn rewrite(&self, ctx: &mut IrContext, op: arith::Addi, rw: &mut PatternRewriter) -> bool {
        let (Some(a), Some(b)) = (
            arith::constant_value(ctx, op.lhs(ctx)),
            arith::constant_value(ctx, op.rhs(ctx)),
        ) else {
            return false;
        };
        let location = ctx.op(op.op_ref()).location;
        let ty = ctx.value_ty(op.result(ctx));
        let folded = arith::constant(ctx, location, ty, a.wrapping_add(b));
        rw.replace_op(folded.op_ref());
        true
    }
}

/// `main(%0) = ((1 + 2) + 4) + %0`
fn program(ctx: &mut IrContext) -> Module {
    let loc = Location::new(ctx.paths.intern("pipeline.test"), Span::default());
    let i32_ty = ctx.simple_type("core", "i32");
    let (f, entry) = func::func(ctx, loc, "main", [i32_ty]);
    let arg = ctx.block_arg(entry, 0);
    let c1 = arith::constant(ctx, loc, i32_ty, 1);
    let c2 = arith::constant(ctx, loc, i32_ty, 2);
    let (v1, v2) = (c1.result(ctx), c2.result(ctx));
    let sum = arith::addi(ctx, loc, v1, v2);
    let c4 = arith::constant(ctx, loc, i32_ty, 4);
    let (sv, v4) = (sum.result(ctx), c4.result(ctx));
    let total = arith::addi(ctx, loc, sv, v4);
    let tv = total.result(ctx);
    let last = arith::addi(ctx, loc, tv, arg);
    let lv = last.result(ctx);
    let ret = func::r#return(ctx, loc, [lv]);
    for op in [
        c1.op_ref(),
        c2.op_ref(),
        sum.op_ref(),
        c4.op_ref(),
        total.op_ref(),
        last.op_ref(),
        ret.op_ref(),
    ] {
        ctx.push_op(entry, op);
    }
    Module::create(ctx, loc, Symbol::new("m"), [f.op_ref()])
}

const FOLDED: &str = "\
core.module {sym_name = @m} {
  func.func {sym_name = @main} {
    ^bb0(%0: core.i32):
      %1 = arith.constant {value = 7} : core.i32
      %2 = arith.addi %1, %0 : core.i32
      func.return %2
  }
}
";

#[test]
fn in_place_rewriting_then_dce() {
    let mut ctx = IrContext::new();
    let module = program(&mut ctx);
    PassManager::default()
        .add_pass(RewritePass::new(
            "fold",
            PatternApplicator::new().add_pattern(typed(FoldAdd)),
        ))
        .add_pass(DeadCodeElimination::default())
        .run(&mut ctx, module)
        .unwrap();
    assert_eq!(print_op(&ctx, module.op()), FOLDED);
}

#[test]
fn strategy_pass_matches_in_place_rewriting() {
    let mut ctx = IrContext::new();
    let module = program(&mut ctx);
    let fold_then_collect = seq(
        repeat(top_to_bottom(strategy(FoldConstantAdd), 0), 10),
        strategy(GarbageCollect),
    );
    PassManager::default()
        .add_pass(StrategyPass::new("fold-strategy", fold_then_collect))
        .run(&mut ctx, module)
        .unwrap();
    assert_eq!(print_op(&ctx, module.op()), FOLDED);
    check_invariants(&ctx, module.op()).unwrap();
}

#[test]
fn strategy_pass_composes_with_dce() {
    let mut ctx = IrContext::new();
    let module = program(&mut ctx);
    PassManager::default()
        .add_pass(StrategyPass::new(
            "fold-strategy",
            repeat(top_to_bottom(strategy(FoldConstantAdd), 0), 10),
        ))
        .add_pass(DeadCodeElimination::default())
        .run(&mut ctx, module)
        .unwrap();
    assert_eq!(print_op(&ctx, module.op()), FOLDED);
}

#[test]
fn frozen_program_prints_like_the_graph() {
    let mut ctx = IrContext::new();
    let module = program(&mut ctx);
    let frozen = freeze(&ctx, module.op()).unwrap();
    assert_eq!(print_iop(&frozen), print_op(&ctx, module.op()));
}
