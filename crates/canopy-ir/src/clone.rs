//! Deep cloning of operations with value substitution.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::context::{BlockArgData, BlockData, IrContext, OperationDataBuilder, RegionData};
use crate::refs::{BlockRef, OpRef, RegionRef, ValueRef};

/// Substitution applied to operands and successors while cloning.
///
/// Values without an entry are referenced as-is, so values defined outside
/// the cloned subtree stay shared with the original.
#[derive(Default, Debug, Clone)]
pub struct ValueMapping {
    values: FxHashMap<ValueRef, ValueRef>,
    blocks: FxHashMap<BlockRef, BlockRef>,
}

impl ValueMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_value(&mut self, from: ValueRef, to: ValueRef) {
        self.values.insert(from, to);
    }

    pub fn map_block(&mut self, from: BlockRef, to: BlockRef) {
        self.blocks.insert(from, to);
    }

    pub fn lookup_value(&self, v: ValueRef) -> ValueRef {
        self.values.get(&v).copied().unwrap_or(v)
    }

    pub fn lookup_block(&self, b: BlockRef) -> BlockRef {
        self.blocks.get(&b).copied().unwrap_or(b)
    }
}

impl IrContext {
    /// Recursively clone `op` and everything it owns.
    ///
    /// Operands are looked up in `mapping`; the results of the clone (and of
    /// every nested clone) are recorded in it, so references inside the
    /// cloned subtree point at cloned values. The clone is detached.
    pub fn clone_op(&mut self, op: OpRef, mapping: &mut ValueMapping) -> OpRef {
        let regions: SmallVec<[RegionRef; 4]> = self.op(op).regions.clone();
        let cloned_regions: SmallVec<[RegionRef; 4]> = regions
            .into_iter()
            .map(|r| self.clone_region(r, mapping))
            .collect();

        let data = self.op(op);
        let operands: SmallVec<[ValueRef; 8]> = self
            .op_operands(op)
            .iter()
            .map(|&v| mapping.lookup_value(v))
            .collect();
        let successors: SmallVec<[BlockRef; 4]> = data
            .successors
            .iter()
            .map(|&b| mapping.lookup_block(b))
            .collect();
        let mut builder = OperationDataBuilder::new(data.location, data.dialect, data.name)
            .operands(operands)
            .results(self.op_result_types(op).to_vec())
            .attrs(data.attributes.clone());
        for r in cloned_regions {
            builder = builder.region(r);
        }
        for b in successors {
            builder = builder.successor(b);
        }
        let new_op = builder.create(self);

        for (i, &old) in self.op_results(op).to_vec().iter().enumerate() {
            mapping.map_value(old, self.op_result(new_op, i as u32));
        }
        new_op
    }

    fn clone_region(&mut self, region: RegionRef, mapping: &mut ValueMapping) -> RegionRef {
        let location = self.region(region).location;
        let blocks: SmallVec<[BlockRef; 4]> = self.region(region).blocks.clone();

        // Blocks first so block arguments and successor targets are mapped
        // before any operation referencing them is cloned.
        let mut new_blocks = SmallVec::<[BlockRef; 4]>::new();
        for &b in &blocks {
            let data = self.block(b);
            let (block_loc, args): (_, Vec<BlockArgData>) = (data.location, data.args.clone());
            let new_b = self.create_block(BlockData {
                location: block_loc,
                args,
                ops: SmallVec::new(),
                parent_region: None,
            });
            mapping.map_block(b, new_b);
            for (old, new) in self
                .block_args(b)
                .to_vec()
                .into_iter()
                .zip(self.block_args(new_b).to_vec())
            {
                mapping.map_value(old, new);
            }
            new_blocks.push(new_b);
        }

        for (&b, &new_b) in blocks.iter().zip(new_blocks.iter()) {
            let ops: SmallVec<[OpRef; 4]> = self.block(b).ops.clone();
            for op in ops {
                let cloned = self.clone_op(op, mapping);
                self.push_op(new_b, cloned);
            }
        }

        self.create_region(RegionData {
            location,
            blocks: new_blocks,
            parent_op: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BlockBuilder, single_block_region};
    use crate::location::{Location, Span};
    use crate::symbol::Symbol;

    #[test]
    fn clone_redirects_internal_references_only() {
        let mut ctx = IrContext::new();
        let loc = Location::new(ctx.paths.intern("t"), Span::default());
        let i32_ty = ctx.simple_type("core", "i32");

        let outer = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("src"))
            .result(i32_ty)
            .create(&mut ctx);
        let outer_v = ctx.op_result(outer, 0);

        let inner = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("use"))
            .operand(outer_v)
            .result(i32_ty)
            .create(&mut ctx);
        let inner_v = ctx.op_result(inner, 0);
        let user = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("use"))
            .operand(inner_v)
            .create(&mut ctx);
        let body = single_block_region(&mut ctx, loc, [inner, user]);
        let wrapper = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("wrap"))
            .region(body)
            .create(&mut ctx);

        let mut mapping = ValueMapping::new();
        let copy = ctx.clone_op(wrapper, &mut mapping);

        let copy_block = ctx.region(ctx.op(copy).regions[0]).blocks[0];
        let copy_ops = ctx.block(copy_block).ops.clone();
        assert_eq!(copy_ops.len(), 2);
        assert_ne!(copy_ops[0], inner);
        // External operand is shared.
        assert_eq!(ctx.op_operands(copy_ops[0]), &[outer_v]);
        // Internal operand points at the cloned producer.
        assert_eq!(ctx.op_operands(copy_ops[1]), &[ctx.op_result(copy_ops[0], 0)]);
        assert_eq!(ctx.uses(outer_v).len(), 2);
        assert_eq!(ctx.uses(inner_v).len(), 1);
    }

    #[test]
    fn clone_with_substitution() {
        let mut ctx = IrContext::new();
        let loc = Location::new(ctx.paths.intern("t"), Span::default());
        let i32_ty = ctx.simple_type("core", "i32");
        let block = BlockBuilder::new(loc).args([i32_ty, i32_ty]).build(&mut ctx);
        let (a, b) = (ctx.block_arg(block, 0), ctx.block_arg(block, 1));
        let op = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("neg"))
            .operand(a)
            .result(i32_ty)
            .create(&mut ctx);

        let mut mapping = ValueMapping::new();
        mapping.map_value(a, b);
        let copy = ctx.clone_op(op, &mut mapping);

        assert_eq!(ctx.op_operands(copy), &[b]);
        assert_eq!(mapping.lookup_value(ctx.op_result(op, 0)), ctx.op_result(copy, 0));
    }
}
