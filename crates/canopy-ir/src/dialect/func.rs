//! Functions, calls and returns.

use crate::builder::{BlockBuilder, RegionBuilder};
use crate::context::IrContext;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, AttributeKind};

use super::{Arity, Dialect, OpDef};

crate::define_op! {
    pub Func = func.func;
    pub Return = func."return";
    pub Call = func.call;
}

crate::symbols! {
    ATTR_SYM_NAME => "sym_name",
    ATTR_CALLEE => "callee",
}

pub fn dialect() -> Dialect {
    Dialect::new("func")
        .op(OpDef::new("func")
            .regions(Arity::Exact(1))
            .attr("sym_name", AttributeKind::Symbol)
            .needs_terminator())
        .op(OpDef::new("return").operands(Arity::ANY).terminator())
        .op(OpDef::new("call")
            .operands(Arity::ANY)
            .results(Arity::ANY)
            .attr("callee", AttributeKind::Symbol))
}

/// Create a function with one entry block taking `params`; returns the
/// function and its entry block so the caller can fill the body.
pub fn func(
    ctx: &mut IrContext,
    location: Location,
    name: &str,
    params: impl IntoIterator<Item = TypeRef>,
) -> (Func, BlockRef) {
    let entry = BlockBuilder::new(location).args(params).build(ctx);
    let body = RegionBuilder::new(location).block(entry).build(ctx);
    let op = Func::builder(location)
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(Symbol::from_dynamic(name)))
        .region(body)
        .create(ctx);
    (Func(op), entry)
}

pub fn r#return(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Return {
    Return(Return::builder(location).operands(values).create(ctx))
}

pub fn call(
    ctx: &mut IrContext,
    location: Location,
    callee: Symbol,
    args: impl IntoIterator<Item = ValueRef>,
    results: impl IntoIterator<Item = TypeRef>,
) -> Call {
    let op = Call::builder(location)
        .operands(args)
        .results(results)
        .attr(ATTR_CALLEE(), Attribute::Symbol(callee))
        .create(ctx);
    Call(op)
}

impl Func {
    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        ctx.op_attr(self.0, ATTR_SYM_NAME()).and_then(Attribute::as_symbol)
    }

    pub fn entry_block(self, ctx: &IrContext) -> BlockRef {
        ctx.region(ctx.op(self.0).regions[0]).blocks[0]
    }
}

