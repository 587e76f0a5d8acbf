//! Snapshot builders and sample strategies shared by the rewriting tests.

#![allow(dead_code)]

use std::fmt;
use std::sync::Arc;

use canopy::elevate::{
    BlockId, IBlock, IOp, IRegion, IType, IValue, Interpreter, Replacement, RewriteResult,
    Strategy, StrategyRef, fail_with, print_iop, strategy,
};
use canopy::ir::Symbol;

pub fn i32_ty() -> IType {
    IType::simple("core", "i32")
}

pub fn i1_ty() -> IType {
    IType::simple("core", "i1")
}

pub fn constant(value: i64) -> Arc<IOp> {
    constant_of(i32_ty(), value)
}

pub fn constant_of(ty: IType, value: i64) -> Arc<IOp> {
    IOp::build("arith", "constant").result(ty).attr("value", value).finish()
}

pub fn binary(name: &'static str, lhs: IValue, rhs: IValue) -> Arc<IOp> {
    let ty = lhs.ty().clone();
    IOp::build("arith", name).operands([lhs, rhs]).result(ty).finish()
}

pub fn addi(lhs: IValue, rhs: IValue) -> Arc<IOp> {
    binary("addi", lhs, rhs)
}

pub fn ret(values: impl IntoIterator<Item = IValue>) -> Arc<IOp> {
    IOp::build("func", "return").operands(values).finish()
}

pub fn module(ops: Vec<Arc<IOp>>) -> Arc<IOp> {
    IOp::build("core", "module")
        .attr("sym_name", Symbol::new("m"))
        .region(IRegion::single(ops))
        .finish()
}

/// A function whose entry block takes `params`; `body` receives the block
/// arguments and returns the operations of the block.
pub fn func(
    name: &'static str,
    params: Vec<IType>,
    body: impl FnOnce(&[IValue]) -> Vec<Arc<IOp>>,
) -> Arc<IOp> {
    let id = BlockId::fresh();
    let args: Vec<IValue> = params
        .iter()
        .enumerate()
        .map(|(i, ty)| IValue::BlockArg {
            block: id,
            index: i as u32,
            ty: ty.clone(),
        })
        .collect();
    let ops = body(&args);
    IOp::build("func", "func")
        .attr("sym_name", Symbol::new(name))
        .region(IRegion::new(vec![IBlock::with_id(id, params, ops)]))
        .finish()
}

/// `scf.if cond` whose single region ends by yielding `yielded`.
pub fn scf_if(cond: IValue, mut ops: Vec<Arc<IOp>>, yielded: IValue) -> Arc<IOp> {
    let ty = yielded.ty().clone();
    ops.push(IOp::build("scf", "yield").operand(yielded).finish());
    IOp::build("scf", "if")
        .operand(cond)
        .result(ty)
        .region(IRegion::single(ops))
        .finish()
}

pub fn int_value(op: &IOp) -> Option<i64> {
    if op.is("arith", "constant") {
        op.attr("value").and_then(|a| a.as_i64())
    } else {
        None
    }
}

fn constant_operand(v: &IValue) -> Option<i64> {
    v.defining_op().and_then(|op| int_value(op))
}

/// Asserts both snapshots print identically.
pub fn assert_same_program(actual: &Arc<IOp>, expected: &Arc<IOp>) {
    assert_eq!(print_iop(actual), print_iop(expected));
}

macro_rules! named {
    ($ty:ident, $name:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str($name)
            }
        }
    };
}

/// Swaps the operands of `arith.addi`.
#[derive(Clone, Copy)]
pub struct CommuteAdd;
named!(CommuteAdd, "commute_add");

impl Strategy for CommuteAdd {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        match op.operands.as_slice() {
            [lhs, rhs] if op.is("arith", "addi") => RewriteResult::success(Replacement::op(
                IOp::from_op(op).operands([rhs.clone(), lhs.clone()]).finish(),
            )),
            _ => fail_with(self),
        }
    }
}

/// `arith.addi` of two constants becomes one constant.
#[derive(Clone, Copy)]
pub struct FoldConstantAdd;
named!(FoldConstantAdd, "fold_constant_add");

impl Strategy for FoldConstantAdd {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        if let [lhs, rhs] = op.operands.as_slice()
            && op.is("arith", "addi")
            && let (Some(a), Some(b)) = (constant_operand(lhs), constant_operand(rhs))
        {
            return RewriteResult::success(Replacement::op(constant_of(
                op.result_types[0].clone(),
                a + b,
            )));
        }
        fail_with(self)
    }
}

/// Sets every `i32` constant other than 42 to 42.
#[derive(Clone, Copy)]
pub struct ChangeConstantTo42;
named!(ChangeConstantTo42, "change_constant_to_42");

impl Strategy for ChangeConstantTo42 {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        match int_value(op) {
            Some(v) if v != 42 && op.result_types[0] == i32_ty() => RewriteResult::success(
                Replacement::op(IOp::from_op(op).attr("value", 42i64).finish()),
            ),
            _ => fail_with(self),
        }
    }
}

/// Replaces `scf.if` on a constant true condition with the body of its
/// region, forwarding the yielded values.
#[derive(Clone, Copy)]
pub struct InlineIf;
named!(InlineIf, "inline_if");

impl Strategy for InlineIf {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        if op.is("scf", "if")
            && op.operand(0).and_then(constant_operand) == Some(1)
            && let Some(region) = op.region(0)
            && let Some((last, body)) = region.ops().split_last()
            && last.is("scf", "yield")
        {
            return RewriteResult::success(Replacement::with_values(
                body.to_vec(),
                last.operands.clone(),
            ));
        }
        fail_with(self)
    }
}

/// Wraps any single integer result in `arith.addi x, 0`.
#[derive(Clone, Copy)]
pub struct AddZero;
named!(AddZero, "add_zero");

impl Strategy for AddZero {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        match op.result_types.as_slice() {
            [ty] if ty.is("core", "i32") => {
                let zero = constant_of(ty.clone(), 0);
                RewriteResult::success(Replacement::op(addi(op.result(0), zero.result(0))))
            }
            _ => fail_with(self),
        }
    }
}

/// `arith.addi 0, x` becomes `x`.
#[derive(Clone, Copy)]
pub struct RemoveAddZero;
named!(RemoveAddZero, "remove_add_zero");

impl Strategy for RemoveAddZero {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        match op.operands.as_slice() {
            [zero, x] if op.is("arith", "addi") && constant_operand(zero) == Some(0) => {
                RewriteResult::success(Replacement::values(vec![x.clone()]))
            }
            _ => fail_with(self),
        }
    }
}

/// `arith.muli x, 2` becomes `arith.shli x, 1`.
#[derive(Clone, Copy)]
pub struct Mul2ToShift;
named!(Mul2ToShift, "mul2_to_shift");

impl Strategy for Mul2ToShift {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        match op.operands.as_slice() {
            [x, two] if op.is("arith", "muli") && constant_operand(two) == Some(2) => {
                let one = constant_of(op.result_types[0].clone(), 1);
                RewriteResult::success(Replacement::op(binary("shli", x.clone(), one.result(0))))
            }
            _ => fail_with(self),
        }
    }
}

/// An interpreter knowing every sample strategy by its display name.
pub fn interpreter() -> Interpreter {
    let mut interp = Interpreter::new();
    let natives: [StrategyRef; 7] = [
        strategy(CommuteAdd),
        strategy(FoldConstantAdd),
        strategy(ChangeConstantTo42),
        strategy(InlineIf),
        strategy(AddZero),
        strategy(RemoveAddZero),
        strategy(Mul2ToShift),
    ];
    for s in natives {
        interp.register_native_strategy(s.to_string(), s);
    }
    interp
}
