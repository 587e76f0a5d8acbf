//! Dialect registry: operation definitions and their verification.
//!
//! A registry is assembled once per compilation and is read-only afterwards.
//! It only answers "is this operation well-formed"; rewriting never consults
//! it.

pub mod arith;
pub mod cf;
pub mod core;
pub mod func;
pub mod scf;

use std::fmt;

use rustc_hash::FxHashMap;

use crate::context::IrContext;
use crate::error::{VerifyError, VerifyErrorKind};
use crate::refs::OpRef;
use crate::symbol::Symbol;
use crate::types::AttributeKind;

/// Accepted count of operands, results, regions or successors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub const ANY: Arity = Arity::AtLeast(0);

    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::Range(lo, hi) => (lo..=hi).contains(&n),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "{k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
            Arity::Range(lo, hi) => write!(f, "{lo} to {hi}"),
        }
    }
}

/// Operation-specific check run after the declarative schema passes.
pub type VerifyHook = fn(&IrContext, OpRef) -> Result<(), String>;

#[derive(Clone, Debug)]
pub struct AttrDef {
    pub name: Symbol,
    pub kind: AttributeKind,
    pub required: bool,
}

/// Definition of one operation kind.
#[derive(Clone, Debug)]
pub struct OpDef {
    pub mnemonic: Symbol,
    pub operands: Arity,
    pub results: Arity,
    pub regions: Arity,
    pub successors: Arity,
    pub attributes: Vec<AttrDef>,
    /// Ends a block.
    pub terminator: bool,
    /// Every block in this op's regions must end with a terminator.
    pub needs_terminator: bool,
    pub verifier: Option<VerifyHook>,
}

impl OpDef {
    /// An operation with no operands, results, regions or successors.
    pub fn new(mnemonic: &'static str) -> Self {
        Self {
            mnemonic: Symbol::new(mnemonic),
            operands: Arity::Exact(0),
            results: Arity::Exact(0),
            regions: Arity::Exact(0),
            successors: Arity::Exact(0),
            attributes: Vec::new(),
            terminator: false,
            needs_terminator: false,
            verifier: None,
        }
    }

    pub fn operands(mut self, arity: Arity) -> Self {
        self.operands = arity;
        self
    }

    pub fn results(mut self, arity: Arity) -> Self {
        self.results = arity;
        self
    }

    pub fn regions(mut self, arity: Arity) -> Self {
        self.regions = arity;
        self
    }

    pub fn successors(mut self, arity: Arity) -> Self {
        self.successors = arity;
        self
    }

    pub fn attr(mut self, name: &'static str, kind: AttributeKind) -> Self {
        self.attributes.push(AttrDef {
            name: Symbol::new(name),
            kind,
            required: true,
        });
        self
    }

    pub fn optional_attr(mut self, name: &'static str, kind: AttributeKind) -> Self {
        self.attributes.push(AttrDef {
            name: Symbol::new(name),
            kind,
            required: false,
        });
        self
    }

    pub fn terminator(mut self) -> Self {
        self.terminator = true;
        self
    }

    pub fn needs_terminator(mut self) -> Self {
        self.needs_terminator = true;
        self
    }

    pub fn verifier(mut self, hook: VerifyHook) -> Self {
        self.verifier = Some(hook);
        self
    }
}

/// A named set of operation definitions.
#[derive(Clone, Debug)]
pub struct Dialect {
    pub name: Symbol,
    ops: FxHashMap<Symbol, OpDef>,
}

impl Dialect {
    pub fn new(name: &'static str) -> Self {
        Self {
            name: Symbol::new(name),
            ops: FxHashMap::default(),
        }
    }

    pub fn op(mut self, def: OpDef) -> Self {
        self.ops.insert(def.mnemonic, def);
        self
    }

    pub fn get(&self, mnemonic: Symbol) -> Option<&OpDef> {
        self.ops.get(&mnemonic)
    }
}

/// Lookup table from `dialect.mnemonic` to definitions.
#[derive(Clone, Debug, Default)]
pub struct DialectRegistry {
    dialects: FxHashMap<Symbol, Dialect>,
    strict: bool,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `core`, `arith`, `func`, `scf` and `cf`.
    pub fn with_builtin() -> Self {
        Self::new()
            .with_dialect(core::dialect())
            .with_dialect(arith::dialect())
            .with_dialect(func::dialect())
            .with_dialect(scf::dialect())
            .with_dialect(cf::dialect())
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.register(dialect);
        self
    }

    pub fn register(&mut self, dialect: Dialect) {
        self.dialects.insert(dialect.name, dialect);
    }

    /// Reject operations no registered dialect defines.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn lookup(&self, dialect: Symbol, mnemonic: Symbol) -> Option<&OpDef> {
        self.dialects.get(&dialect)?.get(mnemonic)
    }

    pub fn lookup_op(&self, ctx: &IrContext, op: OpRef) -> Option<&OpDef> {
        let data = ctx.op(op);
        self.lookup(data.dialect, data.name)
    }

    /// Check one operation against its definition.
    pub fn verify_op(&self, ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
        let fail = |kind| VerifyError {
            op,
            name: ctx.op_full_name(op),
            kind,
        };
        let Some(def) = self.lookup_op(ctx, op) else {
            return if self.strict {
                Err(fail(VerifyErrorKind::Unregistered))
            } else {
                Ok(())
            };
        };
        let data = ctx.op(op);

        let operand_count = ctx.op_operands(op).len();
        if !def.operands.accepts(operand_count) {
            return Err(fail(VerifyErrorKind::OperandCount {
                expected: def.operands,
                found: operand_count,
            }));
        }
        let result_count = ctx.op_result_types(op).len();
        if !def.results.accepts(result_count) {
            return Err(fail(VerifyErrorKind::ResultCount {
                expected: def.results,
                found: result_count,
            }));
        }
        if !def.regions.accepts(data.regions.len()) {
            return Err(fail(VerifyErrorKind::RegionCount {
                expected: def.regions,
                found: data.regions.len(),
            }));
        }
        if !def.successors.accepts(data.successors.len()) {
            return Err(fail(VerifyErrorKind::SuccessorCount {
                expected: def.successors,
                found: data.successors.len(),
            }));
        }
        for attr in &def.attributes {
            match data.attributes.get(&attr.name) {
                None if attr.required => {
                    return Err(fail(VerifyErrorKind::MissingAttribute { name: attr.name }));
                }
                Some(value) if value.kind() != attr.kind => {
                    return Err(fail(VerifyErrorKind::AttributeKind {
                        name: attr.name,
                        expected: attr.kind,
                        found: value.kind(),
                    }));
                }
                _ => {}
            }
        }
        if def.needs_terminator {
            for &region in &data.regions {
                for &block in &ctx.region(region).blocks {
                    let ends_ok = ctx
                        .block(block)
                        .ops
                        .last()
                        .and_then(|&last| self.lookup_op(ctx, last))
                        .is_some_and(|d| d.terminator);
                    if !ends_ok {
                        return Err(fail(VerifyErrorKind::MissingTerminator { block }));
                    }
                }
            }
        }
        if let Some(hook) = def.verifier {
            hook(ctx, op).map_err(|msg| fail(VerifyErrorKind::Custom(msg)))?;
        }
        Ok(())
    }

    /// Verify `root` and every operation nested in it, stopping at the first
    /// violation in pre-order.
    #[tracing::instrument(skip_all)]
    pub fn verify(&self, ctx: &IrContext, root: OpRef) -> Result<(), VerifyError> {
        for op in crate::walk::collect_preorder(ctx, root) {
            self.verify_op(ctx, op)?;
        }
        Ok(())
    }
}

/// Shared hook: all operands and results have one type.
pub(crate) fn same_operand_and_result_types(ctx: &IrContext, op: OpRef) -> Result<(), String> {
    let mut types = ctx
        .op_operands(op)
        .iter()
        .map(|&v| ctx.value_ty(v))
        .chain(ctx.op_result_types(op).iter().copied());
    let Some(first) = types.next() else {
        return Ok(());
    };
    match types.find(|&ty| ty != first) {
        None => Ok(()),
        Some(other) => Err(format!(
            "element types disagree: {} vs {}",
            ctx.types.display(first),
            ctx.types.display(other)
        )),
    }
}
