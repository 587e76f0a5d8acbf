//! The `core.module` container.

use crate::types::AttributeKind;

use super::{Arity, Dialect, OpDef};

pub fn dialect() -> Dialect {
    Dialect::new("core").op(OpDef::new("module")
        .regions(Arity::Exact(1))
        .optional_attr("sym_name", AttributeKind::Symbol)
        .verifier(single_block_body))
}

fn single_block_body(ctx: &crate::IrContext, op: crate::OpRef) -> Result<(), String> {
    let region = ctx.op(op).regions[0];
    match ctx.region(region).blocks.len() {
        1 => Ok(()),
        n => Err(format!("module body must have exactly one block, found {n}")),
    }
}
