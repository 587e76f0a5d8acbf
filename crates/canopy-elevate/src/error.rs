//! Error types for snapshot conversion, integrity checks and strategy
//! interpretation.

use canopy_ir::{BlockRef, OpRef, Symbol, ValueRef};
use derive_more::{Display, Error, From};

use crate::describe::DescribeError;
use crate::imm::{BlockId, OpId};

/// A mutable graph that cannot be frozen into a snapshot.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum FreezeError {
    /// The value is defined outside the frozen subtree or after its use.
    #[display("{value} is used before it is defined")]
    UndefinedValue { value: ValueRef },
    #[display("successor {block} is not a block of the enclosing region")]
    UnknownSuccessor { block: BlockRef },
    #[display("{op} has been erased")]
    Erased { op: OpRef },
}

/// A snapshot that cannot be written back into a context.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum ThawError {
    #[display("operand refers to operation {_0}, which is not defined before its use")]
    UnknownOperation(#[error(not(source))] OpId),
    #[display("reference to block {_0}, which is not in an enclosing region")]
    UnknownBlock(#[error(not(source))] BlockId),
}

/// A snapshot whose values do not respect visibility.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum IntegrityError {
    #[display("{user} uses a result of operation {def}, which is not visible there")]
    InvisibleResult { user: String, def: OpId },
    #[display("{user} uses an argument of block {block}, which does not enclose it")]
    InvisibleBlockArg { user: String, block: BlockId },
    #[display("{user} branches to block {block}, which is not a sibling")]
    InvalidSuccessor { user: String, block: BlockId },
}

/// A strategy description that cannot be turned into a strategy.
#[derive(Clone, Debug, Display, Error, From, PartialEq)]
pub enum InterpretError {
    #[display("{_0}")]
    Parse(DescribeError),
    #[from(ignore)]
    #[display("unknown strategy @{_0}")]
    UnknownStrategy(#[error(not(source))] Symbol),
    #[from(ignore)]
    #[display("unknown combinator `{_0}`")]
    UnknownCombinator(#[error(not(source))] String),
    #[from(ignore)]
    #[display("no native strategy named `{_0}` is registered")]
    UnknownNative(#[error(not(source))] String),
    #[from(ignore)]
    #[display("`{combinator}` expects {expected} argument(s), found {found}")]
    Arity {
        combinator: String,
        expected: usize,
        found: usize,
    },
    #[from(ignore)]
    #[display("`{combinator}` expects {expected}")]
    ArgumentKind {
        combinator: String,
        expected: &'static str,
    },
    #[from(ignore)]
    #[display("strategy @{_0} refers to itself")]
    Cycle(#[error(not(source))] Symbol),
    #[from(ignore)]
    #[display("strategy @{_0} has no return")]
    MissingReturn(#[error(not(source))] Symbol),
    #[from(ignore)]
    #[display("malformed strategy body: {_0}")]
    Malformed(#[error(not(source))] String),
}
