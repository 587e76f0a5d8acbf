//! Pre-order traversal over nested operations.

use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Whether a walk descends into the regions of the visited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    Advance,
    Skip,
}

pub fn walk_region<B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &block in &ctx.region(region).blocks {
        walk_block(ctx, block, f)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_block<B>(
    ctx: &IrContext,
    block: BlockRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &op in &ctx.block(block).ops {
        walk_op(ctx, op, f)?;
    }
    ControlFlow::Continue(())
}

/// Visit `op`, then (unless skipped) everything nested in it, in order.
pub fn walk_op<B>(
    ctx: &IrContext,
    op: OpRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    match f(op)? {
        WalkAction::Skip => return ControlFlow::Continue(()),
        WalkAction::Advance => {}
    }
    for &region in &ctx.op(op).regions {
        walk_region(ctx, region, f)?;
    }
    ControlFlow::Continue(())
}

/// Visit only operations of kind `T` within a region.
pub fn walk_typed<T, B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(T) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()>
where
    T: DialectOp,
{
    walk_region(ctx, region, &mut |op| match T::from_op(ctx, op) {
        Ok(typed) => f(typed),
        Err(_) => ControlFlow::Continue(WalkAction::Advance),
    })
}

/// Every operation nested in `op` (including `op`) in pre-order.
pub fn collect_preorder(ctx: &IrContext, op: OpRef) -> Vec<OpRef> {
    let mut out = Vec::new();
    let _ = walk_op::<()>(ctx, op, &mut |o| {
        out.push(o);
        ControlFlow::Continue(WalkAction::Advance)
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::single_block_region;
    use crate::context::OperationDataBuilder;
    use crate::location::{Location, Span};
    use crate::symbol::Symbol;

    fn leaf(ctx: &mut IrContext, loc: Location, name: &'static str) -> OpRef {
        OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new(name)).create(ctx)
    }

    fn nested(ctx: &mut IrContext) -> (OpRef, Vec<OpRef>) {
        let loc = Location::new(ctx.paths.intern("t"), Span::default());
        let a = leaf(ctx, loc, "a");
        let b = leaf(ctx, loc, "b");
        let inner_region = single_block_region(ctx, loc, [b]);
        let inner = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("inner"))
            .region(inner_region)
            .create(ctx);
        let c = leaf(ctx, loc, "c");
        let region = single_block_region(ctx, loc, [a, inner, c]);
        let root = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("root"))
            .region(region)
            .create(ctx);
        (root, vec![root, a, inner, b, c])
    }

    #[test]
    fn preorder_visits_parents_first() {
        let mut ctx = IrContext::new();
        let (root, expected) = nested(&mut ctx);
        assert_eq!(collect_preorder(&ctx, root), expected);
    }

    #[test]
    fn skip_prunes_nested_regions() {
        let mut ctx = IrContext::new();
        let (root, order) = nested(&mut ctx);
        let inner = order[2];
        let mut seen = Vec::new();
        let _ = walk_op::<()>(&ctx, root, &mut |op| {
            seen.push(op);
            if op == inner {
                ControlFlow::Continue(WalkAction::Skip)
            } else {
                ControlFlow::Continue(WalkAction::Advance)
            }
        });
        assert_eq!(seen, vec![order[0], order[1], order[2], order[4]]);
    }

    #[test]
    fn break_stops_early() {
        let mut ctx = IrContext::new();
        let (root, order) = nested(&mut ctx);
        let found = walk_op(&ctx, root, &mut |op| {
            if ctx.op(op).name == "b" {
                ControlFlow::Break(op)
            } else {
                ControlFlow::Continue(WalkAction::Advance)
            }
        });
        assert_eq!(found, ControlFlow::Break(order[3]));
    }
}
