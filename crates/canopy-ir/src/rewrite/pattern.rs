//! Rewrite pattern traits.

use crate::context::IrContext;
use crate::ops::DialectOp;
use crate::refs::OpRef;

use super::rewriter::PatternRewriter;

/// A local rewrite over one operation.
///
/// Return `true` after recording an edit on `rewriter`, `false` to decline.
/// A declining pattern must leave both `ctx` and `rewriter` untouched.
pub trait RewritePattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter,
    ) -> bool;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A pattern that only ever applies to one operation kind.
///
/// Wrap with [`typed`] to register it; the adapter performs the kind check.
pub trait OpRewritePattern {
    type Op: DialectOp;

    fn rewrite(&self, ctx: &mut IrContext, op: Self::Op, rewriter: &mut PatternRewriter) -> bool;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Adapter turning an [`OpRewritePattern`] into a [`RewritePattern`].
pub struct Typed<P>(pub P);

pub fn typed<P: OpRewritePattern>(pattern: P) -> Typed<P> {
    Typed(pattern)
}

impl<P: OpRewritePattern> RewritePattern for Typed<P> {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter,
    ) -> bool {
        match P::Op::from_op(ctx, op) {
            Ok(typed) => self.0.rewrite(ctx, typed, rewriter),
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        self.0.name()
    }
}

/// Ordered alternatives: tries each pattern and commits to the first match.
#[derive(Default)]
pub struct PatternSet {
    patterns: Vec<Box<dyn RewritePattern>>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, pattern: impl RewritePattern + 'static) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl RewritePattern for PatternSet {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter,
    ) -> bool {
        self.patterns.iter().any(|p| {
            let matched = p.match_and_rewrite(ctx, op, rewriter);
            if matched {
                tracing::trace!(pattern = p.name(), %op, "pattern set member matched");
            }
            matched
        })
    }

    fn name(&self) -> &'static str {
        "PatternSet"
    }
}
