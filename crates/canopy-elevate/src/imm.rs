//! Immutable IR snapshots.
//!
//! An [`IOp`] is never mutated after construction. Values refer to their
//! defining operation through an `Arc`, so a snapshot is a DAG with
//! structural sharing: rewriting one operation rebuilds only the path from
//! it to the root and reuses every untouched subtree.
//!
//! Every operation and block carries an identity ([`OpId`], [`BlockId`])
//! that is independent of its address. Equality is structural and ignores
//! operation identity and locations; block identity is kept because block
//! arguments refer to their block by it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use canopy_ir::{Span, Symbol};

static NEXT_OP_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_BLOCK_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one immutable operation; unique per process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(u64);

impl OpId {
    fn fresh() -> Self {
        OpId(NEXT_OP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a block, preserved when the block is rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u64);

impl BlockId {
    pub fn fresh() -> Self {
        BlockId(NEXT_BLOCK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "^{}", self.0)
    }
}

// ============================================================================
// Types and attributes
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ITypeData {
    pub dialect: Symbol,
    pub name: Symbol,
    pub params: Vec<IType>,
    pub attrs: BTreeMap<Symbol, IAttr>,
}

/// A structural type; clones share one allocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IType(Arc<ITypeData>);

impl IType {
    pub fn new(data: ITypeData) -> Self {
        IType(Arc::new(data))
    }

    /// A parameterless type such as `core.i32`.
    pub fn simple(dialect: &'static str, name: &'static str) -> Self {
        Self::new(ITypeData {
            dialect: Symbol::new(dialect),
            name: Symbol::new(name),
            params: Vec::new(),
            attrs: BTreeMap::new(),
        })
    }

    pub fn data(&self) -> &ITypeData {
        &self.0
    }

    pub fn is(&self, dialect: &str, name: &str) -> bool {
        self.0.dialect == dialect && self.0.name == name
    }
}

impl fmt::Display for IType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.dialect, self.0.name)?;
        if !self.0.params.is_empty() {
            f.write_str("(")?;
            for (i, p) in self.0.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{p}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Attribute values of immutable operations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IAttr {
    Unit,
    Bool(bool),
    IntBits(u64),
    FloatBits(u64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    DenseInts(Arc<[u64]>),
    Type(IType),
    Symbol(Symbol),
    List(Arc<[IAttr]>),
}

impl IAttr {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            IAttr::IntBits(bits) => Some(*bits as i64),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            IAttr::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            IAttr::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for IAttr {
    fn from(v: i64) -> Self {
        IAttr::IntBits(v as u64)
    }
}

impl From<bool> for IAttr {
    fn from(v: bool) -> Self {
        IAttr::Bool(v)
    }
}

impl From<Symbol> for IAttr {
    fn from(v: Symbol) -> Self {
        IAttr::Symbol(v)
    }
}

impl From<&str> for IAttr {
    fn from(v: &str) -> Self {
        IAttr::String(v.into())
    }
}

impl From<IType> for IAttr {
    fn from(v: IType) -> Self {
        IAttr::Type(v)
    }
}

// ============================================================================
// Values
// ============================================================================

/// An SSA value of a snapshot.
#[derive(Clone, Debug)]
pub enum IValue {
    /// Result `index` of `op`.
    Result { op: Arc<IOp>, index: u32 },
    /// Argument `index` of the block identified by `block`.
    BlockArg { block: BlockId, index: u32, ty: IType },
}

impl IValue {
    pub fn ty(&self) -> &IType {
        match self {
            IValue::Result { op, index } => &op.result_types[*index as usize],
            IValue::BlockArg { ty, .. } => ty,
        }
    }

    /// The defining operation, for op results.
    pub fn defining_op(&self) -> Option<&Arc<IOp>> {
        match self {
            IValue::Result { op, .. } => Some(op),
            IValue::BlockArg { .. } => None,
        }
    }

    /// Whether both values name the same definition (not just equal ones).
    pub fn same_as(&self, other: &IValue) -> bool {
        match (self, other) {
            (IValue::Result { op: a, index: i }, IValue::Result { op: b, index: j }) => {
                i == j && a.id == b.id
            }
            (
                IValue::BlockArg { block: a, index: i, .. },
                IValue::BlockArg { block: b, index: j, .. },
            ) => a == b && i == j,
            _ => false,
        }
    }
}

impl PartialEq for IValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (IValue::Result { op: a, index: i }, IValue::Result { op: b, index: j }) => {
                i == j && (Arc::ptr_eq(a, b) || a == b)
            }
            (
                IValue::BlockArg { block: a, index: i, ty: t },
                IValue::BlockArg { block: b, index: j, ty: u },
            ) => a == b && i == j && t == u,
            _ => false,
        }
    }
}

impl Eq for IValue {}

// ============================================================================
// Operations, blocks, regions
// ============================================================================

/// Source location of an immutable operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub path: Arc<str>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IRegion {
    pub blocks: Vec<Arc<IBlock>>,
}

impl IRegion {
    pub fn new(blocks: Vec<Arc<IBlock>>) -> Self {
        IRegion { blocks }
    }

    /// A region holding one argument-less block of `ops`.
    pub fn single(ops: Vec<Arc<IOp>>) -> Self {
        IRegion::new(vec![IBlock::new(Vec::new(), ops)])
    }

    /// Every operation of the first block; empty for an empty region.
    pub fn ops(&self) -> &[Arc<IOp>] {
        self.blocks.first().map(|b| b.ops.as_slice()).unwrap_or(&[])
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IBlock {
    pub id: BlockId,
    pub args: Vec<IType>,
    pub ops: Vec<Arc<IOp>>,
}

impl IBlock {
    pub fn new(args: Vec<IType>, ops: Vec<Arc<IOp>>) -> Arc<Self> {
        Self::with_id(BlockId::fresh(), args, ops)
    }

    /// Build a block under an existing identity, typically when rebuilding it.
    pub fn with_id(id: BlockId, args: Vec<IType>, ops: Vec<Arc<IOp>>) -> Arc<Self> {
        Arc::new(IBlock { id, args, ops })
    }

    pub fn arg(&self, index: u32) -> IValue {
        IValue::BlockArg {
            block: self.id,
            index,
            ty: self.args[index as usize].clone(),
        }
    }

    /// The same block with a different operation list.
    pub fn with_ops(&self, ops: Vec<Arc<IOp>>) -> Arc<Self> {
        Self::with_id(self.id, self.args.clone(), ops)
    }
}

/// An immutable operation.
#[derive(Debug)]
pub struct IOp {
    id: OpId,
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: Vec<IValue>,
    pub result_types: Vec<IType>,
    pub attributes: BTreeMap<Symbol, IAttr>,
    pub regions: Vec<IRegion>,
    pub successors: Vec<BlockId>,
    pub location: SourceLoc,
}

impl PartialEq for IOp {
    fn eq(&self, other: &Self) -> bool {
        self.dialect == other.dialect
            && self.name == other.name
            && self.operands == other.operands
            && self.result_types == other.result_types
            && self.attributes == other.attributes
            && self.regions == other.regions
            && self.successors == other.successors
    }
}

impl Eq for IOp {}

impl IOp {
    /// Start building a new operation `dialect.name`.
    pub fn build(dialect: impl Into<Symbol>, name: impl Into<Symbol>) -> IOpBuilder {
        IOpBuilder {
            dialect: dialect.into(),
            name: name.into(),
            operands: Vec::new(),
            result_types: Vec::new(),
            attributes: BTreeMap::new(),
            regions: Vec::new(),
            successors: Vec::new(),
            location: SourceLoc::default(),
        }
    }

    /// Start building a modified copy of `op`; anything not overridden is
    /// kept. The copy gets a fresh identity.
    pub fn from_op(op: &IOp) -> IOpBuilder {
        IOpBuilder {
            dialect: op.dialect,
            name: op.name,
            operands: op.operands.clone(),
            result_types: op.result_types.clone(),
            attributes: op.attributes.clone(),
            regions: op.regions.clone(),
            successors: op.successors.clone(),
            location: op.location.clone(),
        }
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn is(&self, dialect: &str, name: &str) -> bool {
        self.dialect == dialect && self.name == name
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.dialect, self.name)
    }

    pub fn attr(&self, key: &str) -> Option<&IAttr> {
        self.attributes.get(&Symbol::from_dynamic(key))
    }

    pub fn operand(&self, index: usize) -> Option<&IValue> {
        self.operands.get(index)
    }

    pub fn result(self: &Arc<Self>, index: u32) -> IValue {
        debug_assert!((index as usize) < self.result_types.len());
        IValue::Result {
            op: Arc::clone(self),
            index,
        }
    }

    pub fn results(self: &Arc<Self>) -> Vec<IValue> {
        (0..self.result_types.len() as u32).map(|i| self.result(i)).collect()
    }

    pub fn region(&self, index: usize) -> Option<&IRegion> {
        self.regions.get(index)
    }

    /// Pre-order walk over this operation and everything nested in it.
    pub fn walk(self: &Arc<Self>, f: &mut dyn FnMut(&Arc<IOp>)) {
        f(self);
        for region in &self.regions {
            for block in &region.blocks {
                for op in &block.ops {
                    op.walk(f);
                }
            }
        }
    }

    /// Number of operations in this subtree, including `self`.
    pub fn size(self: &Arc<Self>) -> usize {
        let mut n = 0;
        self.walk(&mut |_| n += 1);
        n
    }
}

#[derive(Clone, Debug)]
pub struct IOpBuilder {
    dialect: Symbol,
    name: Symbol,
    operands: Vec<IValue>,
    result_types: Vec<IType>,
    attributes: BTreeMap<Symbol, IAttr>,
    regions: Vec<IRegion>,
    successors: Vec<BlockId>,
    location: SourceLoc,
}

impl IOpBuilder {
    pub fn operand(mut self, v: IValue) -> Self {
        self.operands.push(v);
        self
    }

    /// Replace the operand list.
    pub fn operands(mut self, vs: impl IntoIterator<Item = IValue>) -> Self {
        self.operands = vs.into_iter().collect();
        self
    }

    pub fn result(mut self, ty: IType) -> Self {
        self.result_types.push(ty);
        self
    }

    /// Replace the result type list.
    pub fn results(mut self, tys: impl IntoIterator<Item = IType>) -> Self {
        self.result_types = tys.into_iter().collect();
        self
    }

    /// Set (or overwrite) one attribute.
    pub fn attr(mut self, key: impl Into<Symbol>, value: impl Into<IAttr>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn region(mut self, region: IRegion) -> Self {
        self.regions.push(region);
        self
    }

    /// Replace the region list.
    pub fn regions(mut self, regions: impl IntoIterator<Item = IRegion>) -> Self {
        self.regions = regions.into_iter().collect();
        self
    }

    pub fn successor(mut self, block: BlockId) -> Self {
        self.successors.push(block);
        self
    }

    pub fn location(mut self, location: SourceLoc) -> Self {
        self.location = location;
        self
    }

    pub fn finish(self) -> Arc<IOp> {
        Arc::new(IOp {
            id: OpId::fresh(),
            dialect: self.dialect,
            name: self.name,
            operands: self.operands,
            result_types: self.result_types,
            attributes: self.attributes,
            regions: self.regions,
            successors: self.successors,
            location: self.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i32_ty() -> IType {
        IType::simple("core", "i32")
    }

    fn constant(v: i64) -> Arc<IOp> {
        IOp::build("arith", "constant").result(i32_ty()).attr("value", v).finish()
    }

    #[test]
    fn equality_ignores_identity() {
        let a = constant(1);
        let b = constant(1);
        assert_ne!(a.id(), b.id());
        assert_eq!(*a, *b);
        assert_ne!(*a, *constant(2));
    }

    #[test]
    fn from_op_keeps_unmodified_fields() {
        let c = constant(1);
        let add = IOp::build("arith", "addi")
            .operands([c.result(0), c.result(0)])
            .result(i32_ty())
            .finish();
        let swapped = IOp::from_op(&add).attr("tag", true).finish();

        assert_ne!(swapped.id(), add.id());
        assert_eq!(swapped.operands, add.operands);
        assert_eq!(swapped.attr("tag"), Some(&IAttr::Bool(true)));
        assert!(swapped.operands[0].same_as(&c.result(0)));
    }

    #[test]
    fn block_args_carry_block_identity() {
        let block = IBlock::new(vec![i32_ty(), i32_ty()], vec![]);
        let rebuilt = block.with_ops(vec![constant(3)]);
        assert!(block.arg(1).same_as(&rebuilt.arg(1)));
        assert!(!block.arg(0).same_as(&block.arg(1)));
        assert_eq!(block.arg(0).ty().to_string(), "core.i32");
    }

    #[test]
    fn walk_is_preorder() {
        let inner = constant(7);
        let holder = IOp::build("test", "holder")
            .region(IRegion::single(vec![inner.clone()]))
            .finish();
        let mut seen = Vec::new();
        holder.walk(&mut |op| seen.push(op.full_name()));
        assert_eq!(seen, ["test.holder", "arith.constant"]);
        assert_eq!(holder.size(), 2);
    }
}
