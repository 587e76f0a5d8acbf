//! Integer arithmetic on signless integers.

use crate::context::IrContext;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{OpRef, TypeRef, ValueRef};
use crate::types::AttributeKind;

use super::{Arity, Dialect, OpDef, same_operand_and_result_types};

crate::define_op! {
    /// `%r = arith.constant {value = N} : ty`
    pub Constant = arith.constant;
    pub Addi = arith.addi;
    pub Subi = arith.subi;
    pub Muli = arith.muli;
    pub Shli = arith.shli;
    pub Andi = arith.andi;
}

crate::register_pure_op!(arith.constant);
crate::register_pure_op!(arith.addi);
crate::register_pure_op!(arith.subi);
crate::register_pure_op!(arith.muli);
crate::register_pure_op!(arith.shli);
crate::register_pure_op!(arith.andi);

crate::symbols! {
    ATTR_VALUE => "value",
}

pub fn dialect() -> Dialect {
    let binary = |name| {
        OpDef::new(name)
            .operands(Arity::Exact(2))
            .results(Arity::Exact(1))
            .verifier(same_operand_and_result_types)
    };
    Dialect::new("arith")
        .op(OpDef::new("constant")
            .results(Arity::Exact(1))
            .attr("value", AttributeKind::Int))
        .op(binary("addi"))
        .op(binary("subi"))
        .op(binary("muli"))
        .op(binary("shli"))
        .op(binary("andi"))
}

pub fn constant(ctx: &mut IrContext, location: Location, ty: TypeRef, value: i64) -> Constant {
    let op = Constant::builder(location)
        .result(ty)
        .attr(ATTR_VALUE(), value)
        .create(ctx);
    Constant(op)
}

fn binary<T: DialectOp>(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> T {
    let ty = ctx.value_ty(lhs);
    let op = T::builder(location).operands([lhs, rhs]).result(ty).create(ctx);
    T::wrap_unchecked(op)
}

pub fn addi(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> Addi {
    binary(ctx, location, lhs, rhs)
}

pub fn subi(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> Subi {
    binary(ctx, location, lhs, rhs)
}

pub fn muli(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> Muli {
    binary(ctx, location, lhs, rhs)
}

pub fn shli(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> Shli {
    binary(ctx, location, lhs, rhs)
}

pub fn andi(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> Andi {
    binary(ctx, location, lhs, rhs)
}

impl Constant {
    pub fn value(self, ctx: &IrContext) -> Option<i64> {
        ctx.op_attr(self.0, ATTR_VALUE()).and_then(|a| a.as_i64())
    }

    pub fn result(self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

/// Accessors shared by the two-operand ops.
pub trait BinaryOp: DialectOp {
    fn lhs(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.op_ref())[0]
    }

    fn rhs(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.op_ref())[1]
    }

    fn result(self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.op_ref(), 0)
    }
}

impl BinaryOp for Addi {}
impl BinaryOp for Subi {}
impl BinaryOp for Muli {}
impl BinaryOp for Shli {}
impl BinaryOp for Andi {}

/// The integer an SSA value is known to hold, if it comes from a constant.
pub fn constant_value(ctx: &IrContext, value: ValueRef) -> Option<i64> {
    let op: OpRef = ctx.value_def(value).op()?;
    Constant::from_op(ctx, op).ok()?.value(ctx)
}

