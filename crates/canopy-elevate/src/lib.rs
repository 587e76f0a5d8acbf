//! Canopy Elevate: persistent IR snapshots rewritten by composable strategies.
//!
//! A module is frozen out of an [`canopy_ir::IrContext`] into a tree of
//! shared, immutable operations. Strategies map an operation to a
//! [`Replacement`] or fail without side effects, so alternatives can be tried
//! and abandoned freely. Traversal combinators rebuild only the path from the
//! root to the rewritten site; everything else is shared with the input.
//!
//! Strategies can also be described as text, lowered into the `elevate`
//! dialect and resolved by an [`Interpreter`].

// === Snapshots ===
pub mod bridge;
pub mod imm;
pub mod integrity;
pub mod print;

// === Strategies ===
pub mod combinators;
pub mod gc;
pub mod pass;
mod rebuild;
pub mod strategy;

// === Descriptions ===
pub mod describe;
pub mod interpreter;

pub mod error;

pub use bridge::{freeze, thaw};
pub use combinators::{
    Backwards, BottomToTop, DEFAULT_REPEAT_CAP, Everywhere, Fail, Id, LeftChoice, Repeat, Seq,
    TopToBottom, Try, backwards, bottom_to_top, everywhere, fail, id, left_choice, repeat, seq,
    top_to_bottom, try_,
};
pub use describe::{DescribeError, parse_strategies};
pub use error::{FreezeError, IntegrityError, InterpretError, ThawError};
pub use gc::GarbageCollect;
pub use imm::{BlockId, IAttr, IBlock, IOp, IOpBuilder, IRegion, IType, ITypeData, IValue, OpId, SourceLoc};
pub use integrity::check_snapshot;
pub use interpreter::Interpreter;
pub use pass::StrategyPass;
pub use print::print_iop;
pub use strategy::{Failure, Replacement, RewriteResult, Strategy, StrategyRef, fail_with, strategy};
