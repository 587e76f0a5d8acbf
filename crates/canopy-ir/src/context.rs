//! IrContext: arena storage for the mutable IR graph.
//!
//! Operations, values, blocks and regions live in `PrimaryMap`s and refer to
//! each other through typed handles. Ownership links (op -> region -> block
//! -> op) are stored in both directions and kept in sync by the mutation
//! methods here; the use-set of every value is likewise updated by every
//! method that creates, rewires or erases an operand slot.

use std::collections::BTreeMap;

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::error::InvariantError;
use crate::location::Location;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::*;

// ============================================================================
// Entity data
// ============================================================================

pub struct OperationData {
    pub location: Location,
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: EntityList<ValueRef>,
    pub results: EntityList<TypeRef>,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub regions: SmallVec<[RegionRef; 4]>,
    pub successors: SmallVec<[BlockRef; 4]>,
    pub parent_block: Option<BlockRef>,
}

pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeRef,
}

#[derive(Clone, Debug)]
pub struct BlockArgData {
    pub ty: TypeRef,
    pub attrs: BTreeMap<Symbol, Attribute>,
}

impl BlockArgData {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            attrs: BTreeMap::new(),
        }
    }
}

pub struct BlockData {
    pub location: Location,
    pub args: Vec<BlockArgData>,
    pub ops: SmallVec<[OpRef; 4]>,
    pub parent_region: Option<RegionRef>,
}

pub struct RegionData {
    pub location: Location,
    pub blocks: SmallVec<[BlockRef; 4]>,
    pub parent_op: Option<OpRef>,
}

// ============================================================================
// IrContext
// ============================================================================

/// Owner of every IR entity of one compilation.
///
/// A context is exclusively owned by whichever pass is running; nothing in
/// here is synchronized.
pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    regions: PrimaryMap<RegionRef, RegionData>,

    /// For each value, the operand slots currently referencing it.
    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,
    /// Set once an operation has been erased; erased ops are never reattached.
    erased: SecondaryMap<OpRef, bool>,

    pub types: TypeInterner,
    pub paths: PathInterner,

    value_pool: ListPool<ValueRef>,
    type_pool: ListPool<TypeRef>,

    result_values: SecondaryMap<OpRef, EntityList<ValueRef>>,
    block_arg_values: SecondaryMap<BlockRef, EntityList<ValueRef>>,
}

impl IrContext {
    pub fn new() -> Self {
        Self {
            ops: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            regions: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            erased: SecondaryMap::new(),
            types: TypeInterner::new(),
            paths: PathInterner::new(),
            value_pool: ListPool::new(),
            type_pool: ListPool::new(),
            result_values: SecondaryMap::new(),
            block_arg_values: SecondaryMap::new(),
        }
    }

    /// Intern a parameterless type.
    pub fn simple_type(&mut self, dialect: &'static str, name: &'static str) -> TypeRef {
        self.types
            .intern(TypeData::simple(Symbol::new(dialect), Symbol::new(name)))
    }

    // ========================================================================
    // Operation
    // ========================================================================

    /// Create a detached operation and allocate its result values.
    ///
    /// Operand uses are registered and owned regions are back-linked.
    ///
    /// # Panics
    ///
    /// Panics if `data.parent_block` is set or if a region already has an
    /// owner.
    pub fn create_op(&mut self, data: OperationData) -> OpRef {
        assert!(
            data.parent_block.is_none(),
            "create_op: operation must be created detached; use push_op to attach it",
        );

        let operands: SmallVec<[ValueRef; 8]> = data.operands.as_slice(&self.value_pool).into();
        let result_types: SmallVec<[TypeRef; 4]> = data.results.as_slice(&self.type_pool).into();
        let regions = data.regions.clone();

        let op = self.ops.push(data);

        for &r in &regions {
            if let Some(existing) = self.regions[r].parent_op {
                panic!("create_op: {r} already belongs to {existing}; cannot reassign to {op}");
            }
            self.regions[r].parent_op = Some(op);
        }

        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].push(Use {
                user: op,
                operand_index: idx as u32,
            });
        }

        let mut results = EntityList::new();
        for (idx, &ty) in result_types.iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::OpResult(op, idx as u32),
                ty,
            });
            results.push(v, &mut self.value_pool);
        }
        self.result_values[op] = results;

        op
    }

    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    /// Mutable access to operation data.
    ///
    /// Changing `operands`, `regions` or `parent_block` through this bypasses
    /// the use-sets and ownership links; use `set_operand`, `push_op` and
    /// friends for those.
    pub fn op_mut(&mut self, op: OpRef) -> &mut OperationData {
        &mut self.ops[op]
    }

    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        self.ops[op].operands.as_slice(&self.value_pool)
    }

    pub fn op_result_types(&self, op: OpRef) -> &[TypeRef] {
        self.ops[op].results.as_slice(&self.type_pool)
    }

    pub fn op_result(&self, op: OpRef, index: u32) -> ValueRef {
        self.result_values[op].as_slice(&self.value_pool)[index as usize]
    }

    pub fn op_results(&self, op: OpRef) -> &[ValueRef] {
        self.result_values[op].as_slice(&self.value_pool)
    }

    pub fn op_attr(&self, op: OpRef, key: Symbol) -> Option<&Attribute> {
        self.ops[op].attributes.get(&key)
    }

    /// Whether `op` is `dialect.name`.
    pub fn op_is(&self, op: OpRef, dialect: Symbol, name: Symbol) -> bool {
        let data = &self.ops[op];
        data.dialect == dialect && data.name == name
    }

    /// `dialect.name` of an operation.
    pub fn op_full_name(&self, op: OpRef) -> String {
        let data = &self.ops[op];
        format!("{}.{}", data.dialect, data.name)
    }

    /// The operation owning the block that contains `op`, if any.
    pub fn parent_op(&self, op: OpRef) -> Option<OpRef> {
        let block = self.ops[op].parent_block?;
        let region = self.blocks[block].parent_region?;
        self.regions[region].parent_op
    }

    pub fn is_erased(&self, op: OpRef) -> bool {
        self.erased[op]
    }

    /// Total number of uses across all results of `op`.
    pub fn result_use_count(&self, op: OpRef) -> usize {
        self.op_results(op).iter().map(|&v| self.uses[v].len()).sum()
    }

    /// Rewire one operand slot, keeping both use-sets exact.
    pub fn set_operand(&mut self, op: OpRef, index: u32, new: ValueRef) {
        let slice = self.ops[op].operands.as_mut_slice(&mut self.value_pool);
        let old = std::mem::replace(&mut slice[index as usize], new);
        if old == new {
            return;
        }
        self.uses[old].retain(|u| !(u.user == op && u.operand_index == index));
        self.uses[new].push(Use {
            user: op,
            operand_index: index,
        });
    }

    /// Erase an operation whose results have no remaining uses.
    ///
    /// The operation is detached from its block (if any), and every operand
    /// slot in it and in its nested regions is dropped from the use-sets of
    /// the referenced values.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError::StillInUse`] if any result is still used; the
    /// graph is left unchanged in that case.
    pub fn erase_op(&mut self, op: OpRef) -> Result<(), InvariantError> {
        let uses = self.result_use_count(op);
        if uses > 0 {
            return Err(InvariantError::StillInUse { op, uses });
        }
        if let Some(block) = self.ops[op].parent_block {
            self.remove_op_from_block(block, op);
        }
        self.drop_subtree(op);
        Ok(())
    }

    fn drop_subtree(&mut self, op: OpRef) {
        let operands: SmallVec<[ValueRef; 8]> = self.op_operands(op).into();
        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].retain(|u| !(u.user == op && u.operand_index == idx as u32));
        }
        self.erased[op] = true;

        let nested: SmallVec<[OpRef; 8]> = self.ops[op]
            .regions
            .iter()
            .flat_map(|&r| self.regions[r].blocks.iter())
            .flat_map(|&b| self.blocks[b].ops.iter().copied())
            .collect();
        for child in nested {
            self.drop_subtree(child);
        }
    }

    // ========================================================================
    // Value
    // ========================================================================

    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    pub fn value_ty(&self, v: ValueRef) -> TypeRef {
        self.values[v].ty
    }

    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    /// Iterate over every value ever allocated, including those of erased ops.
    pub fn all_values(&self) -> impl Iterator<Item = ValueRef> + '_ {
        self.values.keys()
    }

    // ========================================================================
    // Block
    // ========================================================================

    /// Create a block and allocate its argument values.
    ///
    /// Operations listed in `data.ops` are back-linked to the new block.
    ///
    /// # Panics
    ///
    /// Panics if a listed operation is already attached elsewhere.
    pub fn create_block(&mut self, data: BlockData) -> BlockRef {
        let arg_types: SmallVec<[TypeRef; 4]> = data.args.iter().map(|a| a.ty).collect();
        let ops = data.ops.clone();
        let block = self.blocks.push(data);

        for op in ops {
            if let Some(existing) = self.ops[op].parent_block {
                panic!("create_block: {op} already belongs to {existing}");
            }
            self.ops[op].parent_block = Some(block);
        }

        let mut args = EntityList::new();
        for (idx, ty) in arg_types.into_iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::BlockArg(block, idx as u32),
                ty,
            });
            args.push(v, &mut self.value_pool);
        }
        self.block_arg_values[block] = args;

        block
    }

    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    pub fn block_mut(&mut self, b: BlockRef) -> &mut BlockData {
        &mut self.blocks[b]
    }

    pub fn block_arg(&self, b: BlockRef, index: u32) -> ValueRef {
        self.block_arg_values[b].as_slice(&self.value_pool)[index as usize]
    }

    pub fn block_args(&self, b: BlockRef) -> &[ValueRef] {
        self.block_arg_values[b].as_slice(&self.value_pool)
    }

    /// Append an operation to the end of a block.
    ///
    /// # Panics
    ///
    /// Panics if the operation is attached to a block or was erased.
    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        self.assert_attachable(op, "push_op");
        self.ops[op].parent_block = Some(block);
        self.blocks[block].ops.push(op);
    }

    /// Insert `op` immediately before `anchor` in `anchor`'s block.
    ///
    /// # Panics
    ///
    /// Panics if `anchor` is detached or `op` is not attachable.
    pub fn insert_op_before(&mut self, anchor: OpRef, op: OpRef) {
        self.insert_op_at(anchor, op, 0, "insert_op_before");
    }

    /// Insert `op` immediately after `anchor` in `anchor`'s block.
    ///
    /// # Panics
    ///
    /// Panics if `anchor` is detached or `op` is not attachable.
    pub fn insert_op_after(&mut self, anchor: OpRef, op: OpRef) {
        self.insert_op_at(anchor, op, 1, "insert_op_after");
    }

    fn insert_op_at(&mut self, anchor: OpRef, op: OpRef, offset: usize, what: &str) {
        self.assert_attachable(op, what);
        let Some(block) = self.ops[anchor].parent_block else {
            panic!("{what}: anchor {anchor} is not attached to a block");
        };
        let ops = &mut self.blocks[block].ops;
        let Some(pos) = ops.iter().position(|&o| o == anchor) else {
            panic!("{what}: {anchor} missing from its parent {block}");
        };
        ops.insert(pos + offset, op);
        self.ops[op].parent_block = Some(block);
    }

    fn assert_attachable(&self, op: OpRef, what: &str) {
        assert!(!self.erased[op], "{what}: {op} has been erased");
        if let Some(block) = self.ops[op].parent_block {
            panic!("{what}: {op} already belongs to {block}; detach it first");
        }
    }

    /// Detach an operation from a block without destroying it.
    pub fn remove_op_from_block(&mut self, block: BlockRef, op: OpRef) {
        self.blocks[block].ops.retain(|o| *o != op);
        if self.ops[op].parent_block == Some(block) {
            self.ops[op].parent_block = None;
        }
    }

    /// Detach an operation from whatever block holds it.
    pub fn detach_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block {
            self.remove_op_from_block(block, op);
        }
    }

    // ========================================================================
    // Region
    // ========================================================================

    /// Create a region and back-link its blocks.
    ///
    /// # Panics
    ///
    /// Panics if any block already belongs to another region.
    pub fn create_region(&mut self, data: RegionData) -> RegionRef {
        let region = self.regions.push(data);
        let blocks = self.regions[region].blocks.clone();
        for &b in &blocks {
            if let Some(existing) = self.blocks[b].parent_region {
                panic!("create_region: {b} already belongs to {existing}; cannot reassign to {region}");
            }
            self.blocks[b].parent_region = Some(region);
        }
        region
    }

    pub fn region(&self, r: RegionRef) -> &RegionData {
        &self.regions[r]
    }

    pub fn region_mut(&mut self, r: RegionRef) -> &mut RegionData {
        &mut self.regions[r]
    }

    /// Move every block of `from` into a freshly created, unowned region.
    ///
    /// `from` is left empty but stays attached to its operation. Values keep
    /// their identity, so no use-set changes.
    pub fn move_region_contents(&mut self, from: RegionRef) -> RegionRef {
        let location = self.regions[from].location;
        let blocks = std::mem::take(&mut self.regions[from].blocks);
        for &b in &blocks {
            self.blocks[b].parent_region = None;
        }
        self.create_region(RegionData {
            location,
            blocks,
            parent_op: None,
        })
    }

    /// Append every block of `from` to `into`, leaving `from` empty.
    pub fn take_region_blocks(&mut self, from: RegionRef, into: RegionRef) {
        let blocks = std::mem::take(&mut self.regions[from].blocks);
        for &b in &blocks {
            self.blocks[b].parent_region = Some(into);
        }
        self.regions[into].blocks.extend(blocks);
    }

    /// Erase every operation of a region and drop its blocks.
    ///
    /// Values defined inside the region cannot be used outside of it, so no
    /// use check is needed; operand uses of outer values are released.
    pub fn erase_region_contents(&mut self, region: RegionRef) {
        let blocks = std::mem::take(&mut self.regions[region].blocks);
        for block in blocks {
            let ops = std::mem::take(&mut self.blocks[block].ops);
            for &op in ops.iter().rev() {
                self.ops[op].parent_block = None;
                self.drop_subtree(op);
            }
            self.blocks[block].parent_region = None;
        }
    }

    // ========================================================================
    // Use-sets
    // ========================================================================

    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    /// Redirect every use of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let old_uses = std::mem::take(&mut self.uses[old]);
        for u in &old_uses {
            let slice = self.ops[u.user].operands.as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slice[u.operand_index as usize], old);
            slice[u.operand_index as usize] = new;
            self.uses[new].push(*u);
        }
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// OperationData construction
// ============================================================================

/// Builder collecting operands and results before packing them into the
/// context's list pools.
pub struct OperationDataBuilder {
    location: Location,
    dialect: Symbol,
    name: Symbol,
    operands: Vec<ValueRef>,
    results: Vec<TypeRef>,
    attributes: BTreeMap<Symbol, Attribute>,
    regions: SmallVec<[RegionRef; 4]>,
    successors: SmallVec<[BlockRef; 4]>,
}

impl OperationDataBuilder {
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            location,
            dialect,
            name,
            operands: Vec::new(),
            results: Vec::new(),
            attributes: BTreeMap::new(),
            regions: SmallVec::new(),
            successors: SmallVec::new(),
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(mut self, ty: TypeRef) -> Self {
        self.results.push(ty);
        self
    }

    pub fn results(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.results.extend(tys);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: impl Into<Attribute>) -> Self {
        self.attributes.insert(key.into(), val.into());
        self
    }

    pub fn attrs(mut self, attrs: impl IntoIterator<Item = (Symbol, Attribute)>) -> Self {
        self.attributes.extend(attrs);
        self
    }

    pub fn region(mut self, r: RegionRef) -> Self {
        self.regions.push(r);
        self
    }

    pub fn successor(mut self, b: BlockRef) -> Self {
        self.successors.push(b);
        self
    }

    pub fn build(self, ctx: &mut IrContext) -> OperationData {
        let mut operands = EntityList::new();
        for v in self.operands {
            operands.push(v, &mut ctx.value_pool);
        }
        let mut results = EntityList::new();
        for ty in self.results {
            results.push(ty, &mut ctx.type_pool);
        }
        OperationData {
            location: self.location,
            dialect: self.dialect,
            name: self.name,
            operands,
            results,
            attributes: self.attributes,
            regions: self.regions,
            successors: self.successors,
            parent_block: None,
        }
    }

    /// Build and create the operation in one step.
    pub fn create(self, ctx: &mut IrContext) -> OpRef {
        let data = self.build(ctx);
        ctx.create_op(data)
    }
}
