//! Unstructured branches between blocks of one region.

use crate::context::IrContext;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, ValueRef};

use super::{Arity, Dialect, OpDef};

crate::define_op! {
    pub Br = cf.br;
    pub CondBr = cf.cond_br;
}

pub fn dialect() -> Dialect {
    Dialect::new("cf")
        .op(OpDef::new("br")
            .operands(Arity::ANY)
            .successors(Arity::Exact(1))
            .terminator())
        .op(OpDef::new("cond_br")
            .operands(Arity::Exact(1))
            .successors(Arity::Exact(2))
            .terminator())
}

/// `cf.br ^dest(args...)`
pub fn br(
    ctx: &mut IrContext,
    location: Location,
    dest: BlockRef,
    args: impl IntoIterator<Item = ValueRef>,
) -> Br {
    Br(Br::builder(location).operands(args).successor(dest).create(ctx))
}

pub fn cond_br(
    ctx: &mut IrContext,
    location: Location,
    cond: ValueRef,
    then_dest: BlockRef,
    else_dest: BlockRef,
) -> CondBr {
    let op = CondBr::builder(location)
        .operand(cond)
        .successor(then_dest)
        .successor(else_dest)
        .create(ctx);
    CondBr(op)
}
