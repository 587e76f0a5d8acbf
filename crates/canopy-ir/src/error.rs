//! Error types for verification, graph invariants and passes.

use derive_more::{Display, Error, From};

use crate::dialect::Arity;
use crate::refs::{BlockRef, OpRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::AttributeKind;

/// The first violated contract of an operation.
#[derive(Clone, Debug, Display, Error, PartialEq)]
#[display("{name} ({op}): {kind}")]
pub struct VerifyError {
    #[error(not(source))]
    pub op: OpRef,
    /// Full `dialect.mnemonic` of the failing operation.
    #[error(not(source))]
    pub name: String,
    #[error(not(source))]
    pub kind: VerifyErrorKind,
}

#[derive(Clone, Debug, Display, PartialEq)]
pub enum VerifyErrorKind {
    #[display("expected {expected} operand(s), found {found}")]
    OperandCount { expected: Arity, found: usize },
    #[display("expected {expected} result(s), found {found}")]
    ResultCount { expected: Arity, found: usize },
    #[display("expected {expected} region(s), found {found}")]
    RegionCount { expected: Arity, found: usize },
    #[display("expected {expected} successor(s), found {found}")]
    SuccessorCount { expected: Arity, found: usize },
    #[display("missing required attribute `{name}`")]
    MissingAttribute { name: Symbol },
    #[display("attribute `{name}` must be {expected}, found {found}")]
    AttributeKind {
        name: Symbol,
        expected: AttributeKind,
        found: AttributeKind,
    },
    #[display("operation is not registered")]
    Unregistered,
    #[display("{block} does not end with a terminator")]
    MissingTerminator { block: BlockRef },
    #[display("{_0}")]
    Custom(String),
}

/// A broken structural invariant of the graph.
///
/// These signal bugs in rewrite logic rather than bad input, so passes abort
/// on them instead of trying to recover.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum InvariantError {
    #[display("cannot erase {op}: its results still have {uses} use(s)")]
    StillInUse { op: OpRef, uses: usize },
    #[display("{op} has {expected} result(s) but {found} replacement value(s) were given")]
    ReplacementArity {
        op: OpRef,
        expected: usize,
        found: usize,
    },
    #[display("use-set of {value} is inconsistent: {detail}")]
    UseSet { value: ValueRef, detail: String },
    #[display("ownership link broken: {detail}")]
    Ownership { detail: String },
}

/// Failure of a named pass.
#[derive(Debug, Display, Error)]
#[display("pass `{pass}` failed: {kind}")]
pub struct PassError {
    #[error(not(source))]
    pub pass: &'static str,
    #[error(source)]
    pub kind: PassErrorKind,
}

#[derive(Debug, Display, Error, From)]
pub enum PassErrorKind {
    #[display("{_0}")]
    Verify(VerifyError),
    #[display("{_0}")]
    Invariant(InvariantError),
    #[from(ignore)]
    #[display("{_0}")]
    Failed(#[error(not(source))] String),
}

impl PassError {
    pub fn new(pass: &'static str, kind: impl Into<PassErrorKind>) -> Self {
        Self {
            pass,
            kind: kind.into(),
        }
    }

    pub fn failed(pass: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::new(pass, PassErrorKind::Failed(msg.to_string()))
    }
}
