//! Canopy: a dialect-extensible SSA IR with two rewriting engines.
//!
//! [`ir`] holds the mutable operation graph, its pattern rewriter, dead-code
//! elimination and the pass pipeline. [`elevate`] holds persistent snapshots
//! of that graph and the strategy combinators that rewrite them, including
//! strategies described as text.

pub use canopy_elevate as elevate;
pub use canopy_ir as ir;
