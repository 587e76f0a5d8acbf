//! Builders assembling blocks and regions out of existing entities.

use smallvec::SmallVec;

use crate::context::{BlockArgData, BlockData, IrContext, RegionData};
use crate::location::Location;
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef};

/// Builds a block from argument types and already-created detached ops.
pub struct BlockBuilder {
    location: Location,
    args: Vec<BlockArgData>,
    ops: SmallVec<[OpRef; 4]>,
}

impl BlockBuilder {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            args: Vec::new(),
            ops: SmallVec::new(),
        }
    }

    pub fn arg(mut self, ty: TypeRef) -> Self {
        self.args.push(BlockArgData::new(ty));
        self
    }

    pub fn args(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.args.extend(tys.into_iter().map(BlockArgData::new));
        self
    }

    pub fn op(mut self, op: OpRef) -> Self {
        self.ops.push(op);
        self
    }

    pub fn ops(mut self, ops: impl IntoIterator<Item = OpRef>) -> Self {
        self.ops.extend(ops);
        self
    }

    pub fn build(self, ctx: &mut IrContext) -> BlockRef {
        ctx.create_block(BlockData {
            location: self.location,
            args: self.args,
            ops: self.ops,
            parent_region: None,
        })
    }
}

/// Builds a region from already-created detached blocks.
pub struct RegionBuilder {
    location: Location,
    blocks: SmallVec<[BlockRef; 4]>,
}

impl RegionBuilder {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            blocks: SmallVec::new(),
        }
    }

    pub fn block(mut self, block: BlockRef) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(mut self, blocks: impl IntoIterator<Item = BlockRef>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    pub fn build(self, ctx: &mut IrContext) -> RegionRef {
        ctx.create_region(RegionData {
            location: self.location,
            blocks: self.blocks,
            parent_op: None,
        })
    }
}

/// A region with one argument-less block holding `ops`.
pub fn single_block_region(
    ctx: &mut IrContext,
    location: Location,
    ops: impl IntoIterator<Item = OpRef>,
) -> RegionRef {
    let block = BlockBuilder::new(location).ops(ops).build(ctx);
    RegionBuilder::new(location).block(block).build(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OperationDataBuilder;
    use crate::location::Span;
    use crate::symbol::Symbol;

    #[test]
    fn builders_wire_parent_links() {
        let mut ctx = IrContext::new();
        let loc = Location::new(ctx.paths.intern("t"), Span::default());
        let i1 = ctx.simple_type("core", "i1");
        let op = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("op")).create(&mut ctx);

        let block = BlockBuilder::new(loc).arg(i1).op(op).build(&mut ctx);
        let region = RegionBuilder::new(loc).block(block).build(&mut ctx);

        assert_eq!(ctx.op(op).parent_block, Some(block));
        assert_eq!(ctx.block(block).parent_region, Some(region));
        assert_eq!(ctx.block_args(block).len(), 1);
        assert_eq!(ctx.value_ty(ctx.block_arg(block, 0)), i1);
    }
}
