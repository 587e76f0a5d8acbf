//! Strategy combinators.
//!
//! Combinators compose strategies without knowing what they do. The
//! traversals (`top_to_bottom`, `bottom_to_top`, `backwards`, `everywhere`)
//! apply a strategy below the operation they are given and splice the result
//! back in, returning the rebuilt operation as a plain replacement.

use std::fmt;
use std::sync::Arc;

use crate::imm::{IOp, IValue};
use crate::rebuild::{Rebuilder, Site, Visit, op_at, postorder_paths, preorder_paths};
use crate::strategy::{Replacement, RewriteResult, Strategy, StrategyRef, fail_with};

/// Iteration cap of `repeat` when none is given.
pub const DEFAULT_REPEAT_CAP: usize = 100;

// ============================================================================
// Basic combinators
// ============================================================================

/// Always succeeds without changing anything.
#[derive(Clone)]
pub struct Id;

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("id")
    }
}

impl Strategy for Id {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        RewriteResult::success(Replacement::op(Arc::clone(op)))
    }
}

/// Never succeeds.
#[derive(Clone)]
pub struct Fail;

impl fmt::Display for Fail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fail")
    }
}

impl Strategy for Fail {
    fn apply(&self, _op: &Arc<IOp>) -> RewriteResult {
        fail_with(self)
    }
}

/// `first`, then `second` on what `first` produced.
#[derive(Clone)]
pub struct Seq {
    first: StrategyRef,
    second: StrategyRef,
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq({}, {})", self.first, self.second)
    }
}

impl Strategy for Seq {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        let first = match self.first.apply(op) {
            RewriteResult::Success(r) => r,
            failure => return failure,
        };
        // `second` runs on the last operation produced; a replacement that
        // only forwards values gives it nothing to run on.
        let Some(last) = first.ops.last().cloned() else {
            return fail_with(self);
        };
        let second = match self.second.apply(&last) {
            RewriteResult::Success(r) => r,
            failure => return failure,
        };
        if first.as_op().is_some() {
            return RewriteResult::success(second);
        }

        let mut ops = first.ops;
        ops.pop();
        ops.extend(second.ops);
        let values = first
            .values
            .into_iter()
            .map(|v| match &v {
                IValue::Result { op, index } if Arc::ptr_eq(op, &last) => {
                    second.values[*index as usize].clone()
                }
                _ => v,
            })
            .collect();
        RewriteResult::success(Replacement::with_values(ops, values))
    }
}

/// `first` if it succeeds, otherwise `second`.
#[derive(Clone)]
pub struct LeftChoice {
    first: StrategyRef,
    second: StrategyRef,
}

impl fmt::Display for LeftChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "left_choice({}, {})", self.first, self.second)
    }
}

impl Strategy for LeftChoice {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        match self.first.apply(op) {
            RewriteResult::Failure(_) => self.second.apply(op),
            success => success,
        }
    }
}

/// `inner`, or the unchanged operation if `inner` fails.
#[derive(Clone)]
pub struct Try {
    inner: StrategyRef,
}

impl fmt::Display for Try {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "try({})", self.inner)
    }
}

impl Strategy for Try {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        match self.inner.apply(op) {
            RewriteResult::Failure(_) => Id.apply(op),
            success => success,
        }
    }
}

/// Apply `inner` to its own output until it fails, stops making progress,
/// produces something other than one operation, or `cap` is reached.
/// Always succeeds.
#[derive(Clone)]
pub struct Repeat {
    inner: StrategyRef,
    cap: usize,
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repeat({}, {})", self.inner, self.cap)
    }
}

impl Strategy for Repeat {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        let mut current = Arc::clone(op);
        for _ in 0..self.cap {
            let r = match self.inner.apply(&current) {
                RewriteResult::Success(r) => r,
                RewriteResult::Failure(_) => break,
            };
            if r.is_identity_of(&current) {
                break;
            }
            match r.as_op() {
                Some(next) => current = Arc::clone(next),
                None => return RewriteResult::success(r),
            }
        }
        RewriteResult::success(Replacement::op(current))
    }
}

// ============================================================================
// Traversals
// ============================================================================

/// Apply `inner` at the sites of `paths` (the root first when `root_first`,
/// otherwise last) and splice the `skip`-th success into a rebuilt root.
fn apply_at_first_success<S: Strategy + Clone + 'static>(
    strategy: &S,
    inner: &dyn Strategy,
    root: &Arc<IOp>,
    paths: Vec<Vec<Site>>,
    root_first: bool,
    mut skip: usize,
) -> RewriteResult {
    let mut sites: Vec<Vec<Site>> = paths;
    if root_first {
        sites.insert(0, Vec::new());
    } else {
        sites.push(Vec::new());
    }

    for path in sites {
        let target = op_at(root, &path);
        let RewriteResult::Success(replacement) = inner.apply(target) else {
            continue;
        };
        if skip > 0 {
            skip -= 1;
            continue;
        }
        tracing::trace!(strategy = %strategy, op = %target.full_name(), depth = path.len(), "strategy applied");
        if path.is_empty() {
            return RewriteResult::success(replacement);
        }
        let new_root = Rebuilder::default().splice(root, &path, &replacement);
        return RewriteResult::success(Replacement::op(new_root));
    }
    fail_with(strategy)
}

/// Pre-order, children left to right; succeeds at the `skip`-th matching
/// site (counting from zero).
#[derive(Clone)]
pub struct TopToBottom {
    inner: StrategyRef,
    skip: usize,
}

impl fmt::Display for TopToBottom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skip == 0 {
            write!(f, "top_to_bottom({})", self.inner)
        } else {
            write!(f, "top_to_bottom({}, {})", self.inner, self.skip)
        }
    }
}

impl Strategy for TopToBottom {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        let paths = preorder_paths(op, false);
        apply_at_first_success(self, &*self.inner, op, paths, true, self.skip)
    }
}

/// Post-order, children right to left; the deepest, last operation is
/// tried first.
#[derive(Clone)]
pub struct BottomToTop {
    inner: StrategyRef,
}

impl fmt::Display for BottomToTop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bottom_to_top({})", self.inner)
    }
}

impl Strategy for BottomToTop {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        let paths = postorder_paths(op, true);
        apply_at_first_success(self, &*self.inner, op, paths, false, 0)
    }
}

/// Pre-order, children right to left.
#[derive(Clone)]
pub struct Backwards {
    inner: StrategyRef,
}

impl fmt::Display for Backwards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backwards({})", self.inner)
    }
}

impl Strategy for Backwards {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        let paths = preorder_paths(op, true);
        apply_at_first_success(self, &*self.inner, op, paths, true, 0)
    }
}

/// Apply `inner` once at every operation, post-order and left to right,
/// keeping every success. Operations introduced by a replacement are not
/// visited. Always succeeds.
#[derive(Clone)]
pub struct Everywhere {
    inner: StrategyRef,
}

impl fmt::Display for Everywhere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "everywhere({})", self.inner)
    }
}

impl Strategy for Everywhere {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        let mut rewrites = 0usize;
        let root = Rebuilder::default().transform_children(op, &mut |_, rebuilt| {
            match self.inner.apply(rebuilt) {
                RewriteResult::Success(r) if !r.is_identity_of(rebuilt) => {
                    rewrites += 1;
                    Visit::Replace(r)
                }
                _ => Visit::Keep,
            }
        });
        tracing::trace!(strategy = %self, rewrites, "everywhere pass");
        match self.inner.apply(&root) {
            RewriteResult::Success(r) => RewriteResult::success(r),
            RewriteResult::Failure(_) => RewriteResult::success(Replacement::op(root)),
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

pub fn id() -> StrategyRef {
    Arc::new(Id)
}

pub fn fail() -> StrategyRef {
    Arc::new(Fail)
}

pub fn seq(first: StrategyRef, second: StrategyRef) -> StrategyRef {
    Arc::new(Seq { first, second })
}

pub fn left_choice(first: StrategyRef, second: StrategyRef) -> StrategyRef {
    Arc::new(LeftChoice { first, second })
}

pub fn try_(inner: StrategyRef) -> StrategyRef {
    Arc::new(Try { inner })
}

pub fn repeat(inner: StrategyRef, cap: usize) -> StrategyRef {
    Arc::new(Repeat { inner, cap })
}

pub fn top_to_bottom(inner: StrategyRef, skip: usize) -> StrategyRef {
    Arc::new(TopToBottom { inner, skip })
}

pub fn bottom_to_top(inner: StrategyRef) -> StrategyRef {
    Arc::new(BottomToTop { inner })
}

pub fn backwards(inner: StrategyRef) -> StrategyRef {
    Arc::new(Backwards { inner })
}

pub fn everywhere(inner: StrategyRef) -> StrategyRef {
    Arc::new(Everywhere { inner })
}
