//! In-place pattern rewriting.
//!
//! Patterns see one live operation at a time and record the edit they want
//! through a [`PatternRewriter`]; the [`PatternApplicator`] commits the edit
//! (inserting, redirecting uses, erasing) so use-sets stay exact no matter
//! how many users the rewritten operation had.

pub mod applicator;
pub mod pattern;
pub mod rewriter;

pub use applicator::{ApplyResult, PatternApplicator, RewriteMode};
pub use pattern::{OpRewritePattern, PatternSet, RewritePattern, Typed, typed};
pub use rewriter::PatternRewriter;
