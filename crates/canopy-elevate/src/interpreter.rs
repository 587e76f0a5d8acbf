//! Resolution of described strategies.

use std::collections::BTreeMap;

use canopy_ir::{Attribute, DialectOp, IrContext, Module, OpRef, Symbol, ValueRef};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::combinators::{self, DEFAULT_REPEAT_CAP};
use crate::describe::dialect::{self, ATTR_CAP, ATTR_NAME, ATTR_SKIP, ATTR_SYM_NAME, ATTR_TARGET};
use crate::describe::parse_strategies;
use crate::error::InterpretError;
use crate::gc::GarbageCollect;
use crate::strategy::{StrategyRef, strategy};

/// Turns `elevate.strategy` definitions into strategies.
///
/// Native strategies are looked up by the name given in
/// `native("...")`; `garbage_collect` is registered from the start.
pub struct Interpreter {
    natives: FxHashMap<String, StrategyRef>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let mut interp = Self {
            natives: FxHashMap::default(),
        };
        interp.register_native_strategy("garbage_collect", strategy(GarbageCollect));
        interp
    }

    /// Make `strategy` available to descriptions as `name`, replacing any
    /// earlier registration.
    pub fn register_native_strategy(&mut self, name: impl Into<String>, strategy: StrategyRef) {
        self.natives.insert(name.into(), strategy);
    }

    pub fn native(&self, name: &str) -> Option<&StrategyRef> {
        self.natives.get(name)
    }

    /// Resolve every definition in `module`.
    #[tracing::instrument(skip_all)]
    pub fn get_strategies(
        &self,
        ctx: &IrContext,
        module: Module,
    ) -> Result<BTreeMap<String, StrategyRef>, InterpretError> {
        let mut resolver = Resolver::new(self, ctx, module);
        let names: Vec<Symbol> = resolver.defs.keys().copied().collect();
        let mut strategies = BTreeMap::new();
        for name in names {
            strategies.insert(name.to_string(), resolver.resolve(name)?);
        }
        Ok(strategies)
    }

    /// Resolve the definition called `name` and whatever it refers to.
    pub fn get_strategy(
        &self,
        ctx: &IrContext,
        module: Module,
        name: &str,
    ) -> Result<StrategyRef, InterpretError> {
        Resolver::new(self, ctx, module).resolve(Symbol::from_dynamic(name))
    }

    /// Parse `text` and resolve the definition called `name`.
    pub fn load(&self, text: &str, name: &str) -> Result<StrategyRef, InterpretError> {
        let mut ctx = IrContext::new();
        let module = parse_strategies(&mut ctx, text)?;
        self.get_strategy(&ctx, module, name)
    }
}

struct Resolver<'a> {
    interp: &'a Interpreter,
    ctx: &'a IrContext,
    defs: FxHashMap<Symbol, OpRef>,
    resolved: FxHashMap<Symbol, StrategyRef>,
    in_progress: FxHashSet<Symbol>,
}

impl<'a> Resolver<'a> {
    fn new(interp: &'a Interpreter, ctx: &'a IrContext, module: Module) -> Self {
        let defs = module
            .ops(ctx)
            .into_iter()
            .filter(|&op| dialect::StrategyDef::matches(ctx, op))
            .filter_map(|op| {
                let name = ctx.op_attr(op, ATTR_SYM_NAME()).and_then(Attribute::as_symbol)?;
                Some((name, op))
            })
            .collect();
        Self {
            interp,
            ctx,
            defs,
            resolved: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        }
    }

    fn resolve(&mut self, name: Symbol) -> Result<StrategyRef, InterpretError> {
        if let Some(s) = self.resolved.get(&name) {
            return Ok(s.clone());
        }
        let Some(&def) = self.defs.get(&name) else {
            return Err(InterpretError::UnknownStrategy(name));
        };
        if !self.in_progress.insert(name) {
            return Err(InterpretError::Cycle(name));
        }
        let strategy = self.body(name, def)?;
        self.in_progress.remove(&name);
        debug!(strategy = %name, resolved = %strategy, "resolved strategy");
        self.resolved.insert(name, strategy.clone());
        Ok(strategy)
    }

    fn body(&mut self, name: Symbol, def: OpRef) -> Result<StrategyRef, InterpretError> {
        let ctx = self.ctx;
        let Some(&region) = ctx.op(def).regions.first() else {
            return Err(InterpretError::MissingReturn(name));
        };
        let Some(&block) = ctx.region(region).blocks.first() else {
            return Err(InterpretError::MissingReturn(name));
        };

        let mut values: FxHashMap<ValueRef, StrategyRef> = FxHashMap::default();
        for &op in &ctx.block(block).ops {
            if dialect::Return::matches(ctx, op) {
                let operand = ctx.op_operands(op).first().copied();
                return operand
                    .and_then(|v| values.get(&v).cloned())
                    .ok_or_else(|| InterpretError::Malformed(format!("@{name} returns no strategy")));
            }
            let strategy = self.combinator(op, &values)?;
            values.insert(ctx.op_result(op, 0), strategy);
        }
        Err(InterpretError::MissingReturn(name))
    }

    fn combinator(
        &mut self,
        op: OpRef,
        values: &FxHashMap<ValueRef, StrategyRef>,
    ) -> Result<StrategyRef, InterpretError> {
        let ctx = self.ctx;
        let data = ctx.op(op);
        let mnemonic = data.name.to_string();
        let arity = (data.dialect == "elevate")
            .then(|| dialect::combinator_arity(&mnemonic))
            .flatten()
            .ok_or_else(|| InterpretError::UnknownCombinator(ctx.op_full_name(op)))?;

        let operands = ctx.op_operands(op);
        if operands.len() != arity || ctx.op_results(op).len() != 1 {
            return Err(InterpretError::Arity {
                combinator: mnemonic,
                expected: arity,
                found: operands.len(),
            });
        }
        let args = operands
            .iter()
            .map(|v| {
                values
                    .get(v)
                    .cloned()
                    .ok_or_else(|| InterpretError::Malformed(format!("{v} is not a strategy")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        // Absent counts take their default; present ones must fit a `usize`.
        let count = |key, expected: &'static str| match ctx.op_attr(op, key) {
            None => Ok(None),
            Some(attr) => attr
                .as_i64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| InterpretError::ArgumentKind {
                    combinator: mnemonic.clone(),
                    expected,
                }),
        };
        let mut args = args.into_iter();
        let mut next = || {
            args.next()
                .ok_or_else(|| InterpretError::Malformed("missing operand".into()))
        };

        Ok(match mnemonic.as_str() {
            "id" => combinators::id(),
            "fail" => combinators::fail(),
            "seq" => combinators::seq(next()?, next()?),
            "left_choice" => combinators::left_choice(next()?, next()?),
            "try" => combinators::try_(next()?),
            "bottom_to_top" => combinators::bottom_to_top(next()?),
            "backwards" => combinators::backwards(next()?),
            "everywhere" => combinators::everywhere(next()?),
            "top_to_bottom" => {
                let skip = count(ATTR_SKIP(), "a skip count that fits in usize")?;
                combinators::top_to_bottom(next()?, skip.unwrap_or(0))
            }
            "repeat" => {
                let cap = count(ATTR_CAP(), "an iteration cap that fits in usize")?;
                combinators::repeat(next()?, cap.unwrap_or(DEFAULT_REPEAT_CAP))
            }
            "native" => {
                let Some(name) = ctx.op_attr(op, ATTR_NAME()).and_then(Attribute::as_str) else {
                    return Err(InterpretError::ArgumentKind {
                        combinator: mnemonic.clone(),
                        expected: "a string `name` attribute",
                    });
                };
                self.interp
                    .native(name)
                    .cloned()
                    .ok_or_else(|| InterpretError::UnknownNative(name.to_owned()))?
            }
            "ref" => {
                let Some(target) = ctx.op_attr(op, ATTR_TARGET()).and_then(Attribute::as_symbol)
                else {
                    return Err(InterpretError::ArgumentKind {
                        combinator: mnemonic.clone(),
                        expected: "a symbol `target` attribute",
                    });
                };
                self.resolve(target)?
            }
            _ => return Err(InterpretError::UnknownCombinator(ctx.op_full_name(op))),
        })
    }
}
