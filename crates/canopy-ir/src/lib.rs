//! Canopy IR: a dialect-extensible SSA graph with an in-place rewrite engine.
//!
//! Operations, values, blocks and regions live in an [`IrContext`] arena and
//! refer to each other through typed handles. Every mutation primitive keeps
//! the use-set of each value exact, which lets local patterns patch values
//! with arbitrarily many users and lets dead-code elimination decide
//! liveness by a single lookup.

// === IR infrastructure ===
pub mod builder;
pub mod clone;
pub mod context;
pub mod error;
pub mod location;
pub mod op_interface;
pub mod ops;
pub mod printer;
pub mod refs;
pub mod symbol;
pub mod types;
pub mod validation;
pub mod walk;

// === Dialects ===
pub mod dialect;

// === Rewriting ===
pub mod pass;
pub mod rewrite;
pub mod transforms;

// Re-export paste for `register_pure_op!`
#[doc(hidden)]
pub use paste;

pub use builder::{BlockBuilder, RegionBuilder, single_block_region};
pub use clone::ValueMapping;
pub use context::{
    BlockArgData, BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, ValueData,
};
pub use error::{InvariantError, PassError, PassErrorKind, VerifyError, VerifyErrorKind};
pub use location::{Location, Span};
pub use ops::{ConversionError, DialectOp, Module};
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, Use, ValueDef, ValueRef};
pub use symbol::Symbol;
pub use types::{Attribute, AttributeKind, PathInterner, TypeData, TypeDataBuilder, TypeInterner};
pub use walk::WalkAction;
