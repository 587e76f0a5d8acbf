//! Structured control flow: `scf.if` and its `scf.yield` terminator.

use crate::builder::single_block_region;
use crate::context::IrContext;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{OpRef, RegionRef, TypeRef, ValueRef};

use super::{Arity, Dialect, OpDef};

crate::define_op! {
    /// Runs its first region when the `i1` condition holds, else its second
    /// (optional) region; results are the operands of the taken `scf.yield`.
    pub If = scf."if";
    pub Yield = scf."yield";
}

pub fn dialect() -> Dialect {
    Dialect::new("scf")
        .op(OpDef::new("if")
            .operands(Arity::Exact(1))
            .results(Arity::ANY)
            .regions(Arity::Range(1, 2))
            .needs_terminator()
            .verifier(yields_match_results))
        .op(OpDef::new("yield").operands(Arity::ANY).terminator())
}

fn yields_match_results(ctx: &IrContext, op: OpRef) -> Result<(), String> {
    let expected = ctx.op_result_types(op);
    for &region in &ctx.op(op).regions {
        for &block in &ctx.region(region).blocks {
            let Some(&last) = ctx.block(block).ops.last() else {
                continue;
            };
            let yielded: Vec<TypeRef> = ctx.op_operands(last).iter().map(|&v| ctx.value_ty(v)).collect();
            if yielded != expected {
                return Err(format!(
                    "yield produces {} value(s) not matching the {} result(s)",
                    yielded.len(),
                    expected.len()
                ));
            }
        }
    }
    Ok(())
}

/// Create `scf.if` over a then-region and an optional else-region.
pub fn r#if(
    ctx: &mut IrContext,
    location: Location,
    cond: ValueRef,
    results: impl IntoIterator<Item = TypeRef>,
    then_region: RegionRef,
    else_region: Option<RegionRef>,
) -> If {
    let mut builder = If::builder(location).operand(cond).results(results).region(then_region);
    if let Some(r) = else_region {
        builder = builder.region(r);
    }
    If(builder.create(ctx))
}

pub fn r#yield(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Yield {
    Yield(Yield::builder(location).operands(values).create(ctx))
}

/// Convenience for building a region that ends in `scf.yield values`.
pub fn yield_region(
    ctx: &mut IrContext,
    location: Location,
    mut ops: Vec<OpRef>,
    values: impl IntoIterator<Item = ValueRef>,
) -> RegionRef {
    let y = r#yield(ctx, location, values);
    ops.push(y.op_ref());
    single_block_region(ctx, location, ops)
}

impl If {
    pub fn condition(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn then_region(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }
}
