//! Conversion between the mutable graph and snapshots.
//!
//! [`freeze`] copies an operation subtree out of an `IrContext`; [`thaw`]
//! creates a detached copy of a snapshot inside a context. Both convert
//! blocks before the operations inside them so that branches to later
//! blocks and uses of block arguments resolve.

use std::collections::BTreeMap;
use std::sync::Arc;

use canopy_ir::context::{BlockArgData, BlockData, OperationDataBuilder, RegionData};
use canopy_ir::{
    Attribute, BlockRef, IrContext, Location, OpRef, PathRef, RegionRef, TypeData, TypeRef,
    ValueRef,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{FreezeError, ThawError};
use crate::imm::{BlockId, IAttr, IBlock, IOp, IRegion, IType, ITypeData, IValue, OpId, SourceLoc};

// ============================================================================
// Freeze
// ============================================================================

struct Freezer<'a> {
    ctx: &'a IrContext,
    values: FxHashMap<ValueRef, IValue>,
    blocks: FxHashMap<BlockRef, BlockId>,
    types: FxHashMap<TypeRef, IType>,
    paths: FxHashMap<PathRef, Arc<str>>,
}

/// Copy `op` and everything nested in it into a snapshot.
///
/// # Errors
///
/// Fails if the subtree uses a value defined outside of it (or after the
/// use), branches out of its enclosing region, or contains erased
/// operations.
pub fn freeze(ctx: &IrContext, op: OpRef) -> Result<Arc<IOp>, FreezeError> {
    let mut freezer = Freezer {
        ctx,
        values: FxHashMap::default(),
        blocks: FxHashMap::default(),
        types: FxHashMap::default(),
        paths: FxHashMap::default(),
    };
    freezer.op(op)
}

impl Freezer<'_> {
    fn ty(&mut self, ty: TypeRef) -> IType {
        if let Some(t) = self.types.get(&ty) {
            return t.clone();
        }
        let data = self.ctx.types.get(ty);
        let (dialect, name) = (data.dialect, data.name);
        let params: Vec<TypeRef> = data.params.to_vec();
        let attrs: Vec<(canopy_ir::Symbol, Attribute)> =
            data.attrs.iter().map(|(k, v)| (*k, v.clone())).collect();
        let frozen = IType::new(ITypeData {
            dialect,
            name,
            params: params.into_iter().map(|p| self.ty(p)).collect(),
            attrs: attrs.into_iter().map(|(k, v)| (k, self.attr(&v))).collect(),
        });
        self.types.insert(ty, frozen.clone());
        frozen
    }

    fn attr(&mut self, attr: &Attribute) -> IAttr {
        match attr {
            Attribute::Unit => IAttr::Unit,
            Attribute::Bool(b) => IAttr::Bool(*b),
            Attribute::IntBits(v) => IAttr::IntBits(*v),
            Attribute::FloatBits(v) => IAttr::FloatBits(*v),
            Attribute::String(s) => IAttr::String(s.as_str().into()),
            Attribute::Bytes(b) => IAttr::Bytes(b.as_slice().into()),
            Attribute::DenseInts(v) => IAttr::DenseInts(v.as_slice().into()),
            Attribute::Type(t) => IAttr::Type(self.ty(*t)),
            Attribute::Symbol(s) => IAttr::Symbol(*s),
            Attribute::List(items) => IAttr::List(items.iter().map(|a| self.attr(a)).collect()),
        }
    }

    fn location(&mut self, loc: Location) -> SourceLoc {
        let ctx = self.ctx;
        let path = self
            .paths
            .entry(loc.path)
            .or_insert_with(|| ctx.paths.get(loc.path).into())
            .clone();
        SourceLoc {
            path,
            span: loc.span,
        }
    }

    fn op(&mut self, op: OpRef) -> Result<Arc<IOp>, FreezeError> {
        let ctx = self.ctx;
        if ctx.is_erased(op) {
            return Err(FreezeError::Erased { op });
        }
        let data = ctx.op(op);

        let operands = ctx
            .op_operands(op)
            .iter()
            .map(|v| {
                self.values
                    .get(v)
                    .cloned()
                    .ok_or(FreezeError::UndefinedValue { value: *v })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let result_types: Vec<IType> = ctx.op_result_types(op).iter().map(|&t| self.ty(t)).collect();
        let attributes: BTreeMap<_, _> = data
            .attributes
            .iter()
            .map(|(k, v)| (*k, self.attr(v)))
            .collect();
        let successors = data
            .successors
            .iter()
            .map(|b| {
                self.blocks
                    .get(b)
                    .copied()
                    .ok_or(FreezeError::UnknownSuccessor { block: *b })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let regions = data
            .regions
            .iter()
            .map(|&r| self.region(r))
            .collect::<Result<Vec<_>, _>>()?;
        let location = self.location(data.location);

        let mut builder = IOp::build(data.dialect, data.name)
            .operands(operands)
            .results(result_types)
            .regions(regions)
            .location(location);
        for (k, v) in attributes {
            builder = builder.attr(k, v);
        }
        for b in successors {
            builder = builder.successor(b);
        }
        let frozen = builder.finish();

        for (i, &v) in ctx.op_results(op).iter().enumerate() {
            self.values.insert(v, frozen.result(i as u32));
        }
        Ok(frozen)
    }

    fn region(&mut self, region: RegionRef) -> Result<IRegion, FreezeError> {
        let ctx = self.ctx;
        let blocks = &ctx.region(region).blocks;
        let mut headers = Vec::with_capacity(blocks.len());
        for &b in blocks {
            let id = BlockId::fresh();
            self.blocks.insert(b, id);
            let mut args = Vec::new();
            for (i, &v) in ctx.block_args(b).iter().enumerate() {
                let ty = self.ty(ctx.value_ty(v));
                self.values.insert(
                    v,
                    IValue::BlockArg {
                        block: id,
                        index: i as u32,
                        ty: ty.clone(),
                    },
                );
                args.push(ty);
            }
            headers.push((b, id, args));
        }

        let mut frozen = Vec::with_capacity(headers.len());
        for (b, id, args) in headers {
            let ops = ctx
                .block(b)
                .ops
                .iter()
                .map(|&op| self.op(op))
                .collect::<Result<Vec<_>, _>>()?;
            frozen.push(IBlock::with_id(id, args, ops));
        }
        Ok(IRegion::new(frozen))
    }
}

// ============================================================================
// Thaw
// ============================================================================

struct Thawer<'a> {
    ctx: &'a mut IrContext,
    results: FxHashMap<(OpId, u32), ValueRef>,
    blocks: FxHashMap<BlockId, BlockRef>,
    types: FxHashMap<IType, TypeRef>,
    paths: FxHashMap<Arc<str>, PathRef>,
}

/// Create a detached copy of `op` in `ctx`.
///
/// # Errors
///
/// Fails if the snapshot uses a value or block that is not visible where it
/// is used; a snapshot produced by freezing and rewriting never does.
pub fn thaw(ctx: &mut IrContext, op: &Arc<IOp>) -> Result<OpRef, ThawError> {
    let mut thawer = Thawer {
        ctx,
        results: FxHashMap::default(),
        blocks: FxHashMap::default(),
        types: FxHashMap::default(),
        paths: FxHashMap::default(),
    };
    thawer.op(op)
}

impl Thawer<'_> {
    fn ty(&mut self, ty: &IType) -> TypeRef {
        if let Some(&t) = self.types.get(ty) {
            return t;
        }
        let data = ty.data();
        let params: SmallVec<[TypeRef; 4]> = data.params.iter().map(|p| self.ty(p)).collect();
        let attrs = data.attrs.iter().map(|(k, v)| (*k, self.attr(v))).collect();
        let interned = self.ctx.types.intern(TypeData {
            dialect: data.dialect,
            name: data.name,
            params,
            attrs,
        });
        self.types.insert(ty.clone(), interned);
        interned
    }

    fn attr(&mut self, attr: &IAttr) -> Attribute {
        match attr {
            IAttr::Unit => Attribute::Unit,
            IAttr::Bool(b) => Attribute::Bool(*b),
            IAttr::IntBits(v) => Attribute::IntBits(*v),
            IAttr::FloatBits(v) => Attribute::FloatBits(*v),
            IAttr::String(s) => Attribute::String(s.to_string()),
            IAttr::Bytes(b) => Attribute::Bytes(b.iter().copied().collect()),
            IAttr::DenseInts(v) => Attribute::DenseInts(v.to_vec()),
            IAttr::Type(t) => Attribute::Type(self.ty(t)),
            IAttr::Symbol(s) => Attribute::Symbol(*s),
            IAttr::List(items) => Attribute::List(items.iter().map(|a| self.attr(a)).collect()),
        }
    }

    fn location(&mut self, loc: &SourceLoc) -> Location {
        let path = match self.paths.get(&loc.path) {
            Some(&p) => p,
            None => {
                let p = self.ctx.paths.intern(loc.path.as_ref());
                self.paths.insert(loc.path.clone(), p);
                p
            }
        };
        Location::new(path, loc.span)
    }

    fn value(&self, v: &IValue) -> Result<ValueRef, ThawError> {
        match v {
            IValue::Result { op, index } => self
                .results
                .get(&(op.id(), *index))
                .copied()
                .ok_or(ThawError::UnknownOperation(op.id())),
            IValue::BlockArg { block, index, .. } => self
                .blocks
                .get(block)
                .map(|&b| self.ctx.block_arg(b, *index))
                .ok_or(ThawError::UnknownBlock(*block)),
        }
    }

    fn op(&mut self, op: &Arc<IOp>) -> Result<OpRef, ThawError> {
        let location = self.location(&op.location);
        let operands = op
            .operands
            .iter()
            .map(|v| self.value(v))
            .collect::<Result<Vec<_>, _>>()?;
        let results: Vec<TypeRef> = op.result_types.iter().map(|t| self.ty(t)).collect();
        let attrs: Vec<_> = op
            .attributes
            .iter()
            .map(|(k, v)| (*k, self.attr(v)))
            .collect();
        let regions = op
            .regions
            .iter()
            .map(|r| self.region(r, location))
            .collect::<Result<Vec<_>, _>>()?;
        let successors = op
            .successors
            .iter()
            .map(|b| self.blocks.get(b).copied().ok_or(ThawError::UnknownBlock(*b)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = OperationDataBuilder::new(location, op.dialect, op.name)
            .operands(operands)
            .results(results)
            .attrs(attrs);
        for r in regions {
            builder = builder.region(r);
        }
        for b in successors {
            builder = builder.successor(b);
        }
        let thawed = builder.create(self.ctx);

        let values: SmallVec<[ValueRef; 4]> = self.ctx.op_results(thawed).into();
        for (i, v) in values.into_iter().enumerate() {
            self.results.insert((op.id(), i as u32), v);
        }
        Ok(thawed)
    }

    fn region(&mut self, region: &IRegion, location: Location) -> Result<RegionRef, ThawError> {
        let mut blocks = SmallVec::new();
        for block in &region.blocks {
            let args = block.args.iter().map(|t| BlockArgData::new(self.ty(t))).collect();
            let b = self.ctx.create_block(BlockData {
                location,
                args,
                ops: SmallVec::new(),
                parent_region: None,
            });
            self.blocks.insert(block.id, b);
            blocks.push(b);
        }
        for (block, &b) in region.blocks.iter().zip(&blocks) {
            for op in &block.ops {
                let thawed = self.op(op)?;
                self.ctx.push_op(b, thawed);
            }
        }
        Ok(self.ctx.create_region(RegionData {
            location,
            blocks,
            parent_op: None,
        }))
    }
}
