//! The strategy abstraction.
//!
//! A [`Strategy`] looks at one immutable operation and either produces a
//! [`Replacement`] for it or fails. Strategies never mutate: a successful
//! application describes new operations, and the traversal combinators in
//! [`crate::combinators`] splice them into a rebuilt tree.

use std::fmt;
use std::sync::Arc;

use crate::imm::{IOp, IValue};

/// What a successful strategy produces for the operation it was applied to.
///
/// `ops` are inserted in order in place of the target; `values` stand in for
/// the target's results. An empty `ops` with non-empty `values` forwards the
/// target's uses to existing values.
#[derive(Clone, Debug)]
pub struct Replacement {
    pub ops: Vec<Arc<IOp>>,
    pub values: Vec<IValue>,
}

impl Replacement {
    /// Replace with one operation whose results take over the target's.
    pub fn op(op: Arc<IOp>) -> Self {
        let values = op.results();
        Replacement { ops: vec![op], values }
    }

    /// Replace with a sequence; the last operation provides the values.
    pub fn ops(ops: Vec<Arc<IOp>>) -> Self {
        let values = ops.last().map(|op| op.results()).unwrap_or_default();
        Replacement { ops, values }
    }

    pub fn with_values(ops: Vec<Arc<IOp>>, values: Vec<IValue>) -> Self {
        Replacement { ops, values }
    }

    /// Forward the target's results to existing values.
    pub fn values(values: Vec<IValue>) -> Self {
        Replacement {
            ops: Vec::new(),
            values,
        }
    }

    /// The single operation of this replacement, if it has exactly one.
    pub fn single(&self) -> Option<&Arc<IOp>> {
        match self.ops.as_slice() {
            [op] => Some(op),
            _ => None,
        }
    }

    /// The operation of a plain one-for-one replacement: a single operation
    /// whose own results are the replacement values.
    pub fn as_op(&self) -> Option<&Arc<IOp>> {
        let op = self.single()?;
        let plain = op.result_types.len() == self.values.len()
            && self.values.iter().enumerate().all(|(i, v)| match v {
                IValue::Result { op: def, index } => Arc::ptr_eq(def, op) && *index as usize == i,
                IValue::BlockArg { .. } => false,
            });
        plain.then_some(op)
    }

    /// Whether this replacement is `op` itself, unchanged.
    pub fn is_identity_of(&self, op: &Arc<IOp>) -> bool {
        self.single().is_some_and(|r| Arc::ptr_eq(r, op))
    }
}

/// Why a strategy did not apply: the strategy that failed, kept so callers
/// can inspect or retry it.
#[derive(Clone, Debug, derive_more::Display)]
#[display("strategy {strategy} failed")]
pub struct Failure {
    strategy: StrategyRef,
}

impl Failure {
    pub fn new(strategy: StrategyRef) -> Self {
        Failure { strategy }
    }

    pub fn strategy(&self) -> &StrategyRef {
        &self.strategy
    }
}

#[derive(Clone, Debug)]
pub enum RewriteResult {
    Success(Replacement),
    Failure(Failure),
}

impl RewriteResult {
    pub fn success(replacement: Replacement) -> Self {
        RewriteResult::Success(replacement)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RewriteResult::Success(_))
    }

    pub fn replacement(&self) -> Option<&Replacement> {
        match self {
            RewriteResult::Success(r) => Some(r),
            RewriteResult::Failure(_) => None,
        }
    }

    pub fn into_replacement(self) -> Result<Replacement, Failure> {
        match self {
            RewriteResult::Success(r) => Ok(r),
            RewriteResult::Failure(f) => Err(f),
        }
    }

    /// The single operation a success produced. Panics on failure or on a
    /// multi-operation replacement; meant for tests and drivers that know
    /// the shape of their strategy.
    pub fn unwrap_op(self) -> Arc<IOp> {
        match self {
            RewriteResult::Success(r) => match <[Arc<IOp>; 1]>::try_from(r.ops) {
                Ok([op]) => op,
                Err(ops) => panic!("expected one operation, got {}", ops.len()),
            },
            RewriteResult::Failure(f) => panic!("{f}"),
        }
    }
}

/// A rewrite that may or may not apply to an operation.
///
/// `Display` renders the strategy in the description language, so a
/// composed strategy prints as the expression that would rebuild it.
pub trait Strategy: fmt::Display + Send + Sync {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult;
}

impl fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Strategy({self})")
    }
}

pub type StrategyRef = Arc<dyn Strategy>;

/// Box a concrete strategy for use in combinators.
pub fn strategy(s: impl Strategy + 'static) -> StrategyRef {
    Arc::new(s)
}

impl<S: Strategy + ?Sized> Strategy for Arc<S> {
    fn apply(&self, op: &Arc<IOp>) -> RewriteResult {
        (**self).apply(op)
    }
}

/// Fail with a copy of `s` as the failing strategy.
pub fn fail_with<S: Strategy + Clone + 'static>(s: &S) -> RewriteResult {
    RewriteResult::Failure(Failure::new(Arc::new(s.clone())))
}
