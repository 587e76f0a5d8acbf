//! Path copying for snapshots.
//!
//! Rewriting an immutable tree means rebuilding every ancestor of the
//! rewritten operation and every later operation that (transitively) used one
//! of the rebuilt values. [`ValueMap`] records which old result now stands for
//! which new value; [`Rebuilder::remap_op`] rebuilds an operation only when
//! one of its operands or nested operations actually changed, so untouched
//! subtrees keep their `Arc` and their identity.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::imm::{IBlock, IOp, IRegion, IValue, OpId};
use crate::strategy::Replacement;

/// Position of an operation inside its parent: region, block, op index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Site {
    pub region: usize,
    pub block: usize,
    pub op: usize,
}

/// Old op results mapped to the values that replace them.
#[derive(Default)]
pub(crate) struct ValueMap {
    map: FxHashMap<(OpId, u32), IValue>,
}

impl ValueMap {
    /// Follow replacements until reaching a value that was not replaced.
    pub fn lookup(&self, v: &IValue) -> IValue {
        let mut current = v.clone();
        // A chain can never be longer than the map itself.
        for _ in 0..=self.map.len() {
            let IValue::Result { op, index } = &current else {
                return current;
            };
            match self.map.get(&(op.id(), *index)) {
                Some(next) => current = next.clone(),
                None => return current,
            }
        }
        current
    }

    pub fn insert(&mut self, old: &IValue, new: IValue) {
        if let IValue::Result { op, index } = old
            && !old.same_as(&new)
        {
            self.map.insert((op.id(), *index), new);
        }
    }

    /// Map every result of `old` to the corresponding result of `new`.
    pub fn map_results(&mut self, old: &Arc<IOp>, new: &Arc<IOp>) {
        if Arc::ptr_eq(old, new) {
            return;
        }
        for (o, n) in old.results().iter().zip(new.results()) {
            self.insert(o, n);
        }
    }

    /// Map `old`'s results to replacement values.
    ///
    /// # Panics
    ///
    /// Panics if the number of values differs from `old`'s result count; a
    /// strategy producing such a replacement is malformed.
    pub fn map_replacement(&mut self, old: &Arc<IOp>, values: &[IValue]) {
        assert_eq!(
            old.result_types.len(),
            values.len(),
            "replacement for {} provides {} value(s) for {} result(s)",
            old.full_name(),
            values.len(),
            old.result_types.len(),
        );
        for (o, n) in old.results().iter().zip(values) {
            self.insert(o, n.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

/// Operations visible at the current point of a rebuild, one set per
/// enclosing block.
#[derive(Default)]
pub(crate) struct Scope {
    levels: Vec<FxHashSet<OpId>>,
}

impl Scope {
    pub fn push(&mut self, ids: impl IntoIterator<Item = OpId>) {
        self.levels.push(ids.into_iter().collect());
    }

    pub fn pop(&mut self) {
        self.levels.pop();
    }

    pub fn add(&mut self, id: OpId) {
        if let Some(top) = self.levels.last_mut() {
            top.insert(id);
        }
    }

    pub fn remove(&mut self, id: OpId) {
        if let Some(top) = self.levels.last_mut() {
            top.remove(&id);
        }
    }

    pub fn contains(&self, id: OpId) -> bool {
        self.levels.iter().any(|level| level.contains(&id))
    }
}

/// Operations defined anywhere inside `op`'s regions.
fn nested_defs(op: &Arc<IOp>) -> FxHashSet<OpId> {
    let mut defs = FxHashSet::default();
    for region in &op.regions {
        for block in &region.blocks {
            for nested in &block.ops {
                nested.walk(&mut |o| {
                    defs.insert(o.id());
                });
            }
        }
    }
    defs
}

/// Defining operations of values `op` and its nested operations use but do
/// not define themselves.
fn free_deps(op: &Arc<IOp>) -> Vec<Arc<IOp>> {
    let mut deps: Vec<Arc<IOp>> = op
        .operands
        .iter()
        .filter_map(|v| v.defining_op().cloned())
        .collect();
    if !op.regions.is_empty() {
        let inner = nested_defs(op);
        let mut nested_uses = Vec::new();
        for region in &op.regions {
            for block in &region.blocks {
                for nested in &block.ops {
                    nested.walk(&mut |o| {
                        nested_uses.extend(
                            o.operands
                                .iter()
                                .filter_map(|v| v.defining_op())
                                .filter(|d| !inner.contains(&d.id()))
                                .cloned(),
                        );
                    });
                }
            }
        }
        deps.extend(nested_uses);
    }
    deps
}

/// Emit `roots` and every operation they depend on that is not yet visible,
/// dependencies first.
pub(crate) fn materialize(
    roots: impl IntoIterator<Item = Arc<IOp>>,
    scope: &Scope,
    out: &mut Vec<Arc<IOp>>,
) {
    fn visit(
        op: Arc<IOp>,
        scope: &Scope,
        emitted: &mut FxHashSet<OpId>,
        out: &mut Vec<Arc<IOp>>,
    ) {
        if scope.contains(op.id()) || !emitted.insert(op.id()) {
            return;
        }
        for dep in free_deps(&op) {
            visit(dep, scope, emitted, out);
        }
        out.push(op);
    }

    let mut emitted: FxHashSet<OpId> = out.iter().map(|op| op.id()).collect();
    for op in roots {
        visit(op, scope, &mut emitted, out);
    }
}

/// Emit a replacement's operations plus whatever its values need.
pub(crate) fn materialize_replacement(r: &Replacement, scope: &Scope, out: &mut Vec<Arc<IOp>>) {
    let roots = r
        .ops
        .iter()
        .cloned()
        .chain(r.values.iter().filter_map(|v| v.defining_op().cloned()));
    materialize(roots, scope, out);
}

/// Decision of a [`Rebuilder::transform_children`] hook for one operation.
pub(crate) enum Visit {
    Keep,
    Replace(Replacement),
    /// Drop the operation. Its results must be unused.
    Remove,
}

/// Hook called with the original operation and its rebuilt form.
pub(crate) type VisitFn<'a> = dyn FnMut(&Arc<IOp>, &Arc<IOp>) -> Visit + 'a;

#[derive(Default)]
pub(crate) struct Rebuilder {
    pub map: ValueMap,
    pub scope: Scope,
}

impl Rebuilder {
    /// Rebuild `op` against the current value map without visiting anything.
    pub fn remap_op(&mut self, op: &Arc<IOp>) -> Arc<IOp> {
        self.rebuild_op(op, &mut |_, _| Visit::Keep)
    }

    /// Rebuild `op` with all nested operations transformed post-order, left
    /// to right. `op` itself is not passed to `visit`.
    pub fn transform_children(&mut self, op: &Arc<IOp>, visit: &mut VisitFn<'_>) -> Arc<IOp> {
        self.rebuild_op(op, visit)
    }

    fn rebuild_op(&mut self, op: &Arc<IOp>, visit: &mut VisitFn<'_>) -> Arc<IOp> {
        let operands: Vec<IValue> = op.operands.iter().map(|v| self.map.lookup(v)).collect();
        let regions: Vec<IRegion> = op
            .regions
            .iter()
            .map(|r| self.rebuild_region(r, visit))
            .collect();

        let operands_same = operands.iter().zip(&op.operands).all(|(a, b)| a.same_as(b));
        let regions_same = regions.iter().zip(&op.regions).all(|(a, b)| {
            a.blocks.len() == b.blocks.len()
                && a.blocks.iter().zip(&b.blocks).all(|(x, y)| Arc::ptr_eq(x, y))
        });
        if operands_same && regions_same {
            return Arc::clone(op);
        }
        let new = IOp::from_op(op).operands(operands).regions(regions).finish();
        self.map.map_results(op, &new);
        new
    }

    fn rebuild_region(&mut self, region: &IRegion, visit: &mut VisitFn<'_>) -> IRegion {
        self.scope.push(region.blocks.iter().flat_map(|b| b.ops.iter().map(|op| op.id())));
        let mut blocks: Vec<Arc<IBlock>> = region
            .blocks
            .iter()
            .map(|b| self.rebuild_block(b, visit))
            .collect();
        if blocks.len() > 1 {
            // Later blocks may have replaced values used by earlier ones.
            blocks = blocks.iter().map(|b| self.remap_block(b)).collect();
        }
        self.scope.pop();
        IRegion::new(blocks)
    }

    fn rebuild_block(&mut self, block: &Arc<IBlock>, visit: &mut VisitFn<'_>) -> Arc<IBlock> {
        let mut ops = Vec::with_capacity(block.ops.len());
        for op in &block.ops {
            let rebuilt = self.rebuild_op(op, visit);
            match visit(op, &rebuilt) {
                Visit::Keep => {
                    self.scope.add(rebuilt.id());
                    ops.push(rebuilt);
                }
                Visit::Remove => {}
                Visit::Replace(r) => {
                    if r.is_identity_of(&rebuilt) {
                        self.scope.add(rebuilt.id());
                        ops.push(rebuilt);
                        continue;
                    }
                    let start = ops.len();
                    materialize_replacement(&r, &self.scope, &mut ops);
                    for emitted in &ops[start..] {
                        self.scope.add(emitted.id());
                    }
                    self.map.map_replacement(&rebuilt, &r.values);
                }
            }
        }
        finish_block(block, ops)
    }

    fn remap_block(&mut self, block: &Arc<IBlock>) -> Arc<IBlock> {
        let ops = block.ops.iter().map(|op| self.remap_op(op)).collect();
        finish_block(block, ops)
    }

    /// Rebuild `root` with the operation at `path` replaced by `replacement`.
    ///
    /// # Panics
    ///
    /// Panics if `path` does not lead to an operation, or if the replacement
    /// provides the wrong number of values.
    pub fn splice(&mut self, root: &Arc<IOp>, path: &[Site], replacement: &Replacement) -> Arc<IOp> {
        let Some((site, rest)) = path.split_first() else {
            panic!("cannot splice a replacement into the root itself");
        };
        let region = &root.regions[site.region];
        let block = &region.blocks[site.block];
        let child = &block.ops[site.op];
        self.scope.push(region.blocks.iter().flat_map(|b| b.ops.iter().map(|op| op.id())));

        let mut ops: Vec<Arc<IOp>> = block.ops[..site.op].to_vec();
        if rest.is_empty() {
            self.scope.remove(child.id());
            materialize_replacement(replacement, &self.scope, &mut ops);
            self.map.map_replacement(child, &replacement.values);
        } else {
            let new_child = self.splice(child, rest, replacement);
            self.map.map_results(child, &new_child);
            ops.push(new_child);
        }
        for later in &block.ops[site.op + 1..] {
            ops.push(self.remap_op(later));
        }
        let new_block = finish_block(block, ops);

        let mut blocks = region.blocks.clone();
        blocks[site.block] = new_block;
        // Other blocks may use the replaced values; iterate until no new
        // replacement shows up.
        loop {
            let before = self.map.len();
            for (i, b) in region.blocks.iter().enumerate() {
                if i != site.block {
                    blocks[i] = self.remap_block(b);
                }
            }
            if self.map.len() == before {
                break;
            }
        }
        self.scope.pop();

        let mut regions = root.regions.clone();
        regions[site.region] = IRegion::new(blocks);
        IOp::from_op(root).regions(regions).finish()
    }
}

fn finish_block(block: &Arc<IBlock>, ops: Vec<Arc<IOp>>) -> Arc<IBlock> {
    let same = ops.len() == block.ops.len()
        && ops.iter().zip(&block.ops).all(|(a, b)| Arc::ptr_eq(a, b));
    if same {
        Arc::clone(block)
    } else {
        block.with_ops(ops)
    }
}

/// Paths to every operation nested in `root`, in pre-order.
pub(crate) fn preorder_paths(root: &Arc<IOp>, reverse_children: bool) -> Vec<Vec<Site>> {
    fn go(op: &Arc<IOp>, path: &mut Vec<Site>, reverse: bool, out: &mut Vec<Vec<Site>>) {
        let mut children = Vec::new();
        for (ri, region) in op.regions.iter().enumerate() {
            for (bi, block) in region.blocks.iter().enumerate() {
                for (oi, child) in block.ops.iter().enumerate() {
                    children.push((Site { region: ri, block: bi, op: oi }, child));
                }
            }
        }
        if reverse {
            children.reverse();
        }
        for (site, child) in children {
            path.push(site);
            out.push(path.clone());
            go(child, path, reverse, out);
            path.pop();
        }
    }
    let mut out = Vec::new();
    go(root, &mut Vec::new(), reverse_children, &mut out);
    out
}

/// Paths to every operation nested in `root`, in post-order.
pub(crate) fn postorder_paths(root: &Arc<IOp>, reverse_children: bool) -> Vec<Vec<Site>> {
    fn go(op: &Arc<IOp>, path: &mut Vec<Site>, reverse: bool, out: &mut Vec<Vec<Site>>) {
        let mut children = Vec::new();
        for (ri, region) in op.regions.iter().enumerate() {
            for (bi, block) in region.blocks.iter().enumerate() {
                for (oi, child) in block.ops.iter().enumerate() {
                    children.push((Site { region: ri, block: bi, op: oi }, child));
                }
            }
        }
        if reverse {
            children.reverse();
        }
        for (site, child) in children {
            path.push(site);
            go(child, path, reverse, out);
            out.push(path.clone());
            path.pop();
        }
    }
    let mut out = Vec::new();
    go(root, &mut Vec::new(), reverse_children, &mut out);
    out
}

/// The operation `path` leads to from `root`.
pub(crate) fn op_at<'a>(root: &'a Arc<IOp>, path: &[Site]) -> &'a Arc<IOp> {
    path.iter().fold(root, |op, site| {
        &op.regions[site.region].blocks[site.block].ops[site.op]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imm::{IAttr, IType};

    fn i32_ty() -> IType {
        IType::simple("core", "i32")
    }

    fn constant(v: i64) -> Arc<IOp> {
        IOp::build("arith", "constant").result(i32_ty()).attr("value", v).finish()
    }

    fn add(a: IValue, b: IValue) -> Arc<IOp> {
        IOp::build("arith", "addi").operands([a, b]).result(i32_ty()).finish()
    }

    fn holder(ops: Vec<Arc<IOp>>) -> Arc<IOp> {
        IOp::build("test", "holder").region(IRegion::single(ops)).finish()
    }

    #[test]
    fn splice_rebuilds_users_and_keeps_prefix() {
        let c1 = constant(1);
        let c2 = constant(2);
        let sum = add(c1.result(0), c1.result(0));
        let ret = IOp::build("func", "return").operand(sum.result(0)).finish();
        let root = holder(vec![c1.clone(), c2.clone(), sum, ret]);

        let site = Site { region: 0, block: 0, op: 0 };
        let new_root =
            Rebuilder::default().splice(&root, &[site], &Replacement::op(constant(5)));

        let ops = new_root.regions[0].ops();
        assert!(Arc::ptr_eq(&ops[1], &c2), "untouched prefix op is shared");
        assert_eq!(ops[0].attr("value").and_then(IAttr::as_i64), Some(5));
        assert!(ops[2].operands[0].same_as(&ops[0].result(0)));
        assert!(ops[3].operands[0].same_as(&ops[2].result(0)));
    }

    #[test]
    fn replacement_referencing_its_target_keeps_it() {
        let c = constant(1);
        let ret = IOp::build("func", "return").operand(c.result(0)).finish();
        let root = holder(vec![c.clone(), ret]);

        let zero = constant(0);
        let wrapped = add(c.result(0), zero.result(0));
        let site = Site { region: 0, block: 0, op: 0 };
        let new_root = Rebuilder::default().splice(&root, &[site], &Replacement::op(wrapped));

        let names: Vec<_> = new_root.regions[0].ops().iter().map(|o| o.full_name()).collect();
        assert_eq!(names, ["arith.constant", "arith.constant", "arith.addi", "func.return"]);
        let ops = new_root.regions[0].ops();
        assert!(Arc::ptr_eq(&ops[0], &c));
        assert!(ops[3].operands[0].same_as(&ops[2].result(0)));
    }

    #[test]
    #[should_panic(expected = "provides 0 value(s) for 1 result(s)")]
    fn value_count_mismatch_panics() {
        let c = constant(1);
        let root = holder(vec![c]);
        let site = Site { region: 0, block: 0, op: 0 };
        Rebuilder::default().splice(&root, &[site], &Replacement::values(vec![]));
    }

    #[test]
    fn remap_without_changes_shares_everything() {
        let c = constant(1);
        let root = holder(vec![c.clone(), add(c.result(0), c.result(0))]);
        let same = Rebuilder::default().remap_op(&root);
        assert!(Arc::ptr_eq(&same, &root));
    }

    #[test]
    fn traversal_paths() {
        let inner = constant(3);
        let nested = holder(vec![inner]);
        let root = holder(vec![constant(1), nested, constant(2)]);
        let name = |p: &Vec<Site>| {
            let op = op_at(&root, p);
            op.attr("value").and_then(IAttr::as_i64).unwrap_or(-1)
        };
        let pre: Vec<_> = preorder_paths(&root, false).iter().map(name).collect();
        let post_rev: Vec<_> = postorder_paths(&root, true).iter().map(name).collect();
        let pre_rev: Vec<_> = preorder_paths(&root, true).iter().map(name).collect();
        assert_eq!(pre, [1, -1, 3, 2]);
        assert_eq!(post_rev, [2, 3, -1, 1]);
        assert_eq!(pre_rev, [2, -1, 3, 1]);
    }
}
