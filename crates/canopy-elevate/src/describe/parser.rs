//! Text form of strategy descriptions.
//!
//! ```text
//! // comments run to the end of the line
//! strategy @commute_twice = seq(@commute, @commute)
//! strategy @cleanup = seq(everywhere(try(fold)), garbage_collect)
//! ```
//!
//! A bare identifier that is not a combinator names a native strategy, so
//! `fold` above is the same as `native("fold")`.

use canopy_ir::{
    Attribute, BlockBuilder, BlockRef, DialectOp, IrContext, Location, Module, OpRef, PathRef,
    RegionBuilder, Span, Symbol, TypeRef, ValueRef,
};
use winnow::ascii;
use winnow::combinator::{alt, delimited, opt, preceded, separated};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_till, take_while};

use super::dialect::{self, ATTR_CAP, ATTR_NAME, ATTR_SKIP, ATTR_SYM_NAME, ATTR_TARGET};

/// Parse error with the byte offset it was detected at.
#[derive(Clone, Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("parse error at offset {offset}: {message}")]
pub struct DescribeError {
    #[error(not(source))]
    pub message: String,
    #[error(not(source))]
    pub offset: usize,
}

// ============================================================================
// Raw syntax
// ============================================================================

/// Positions are stored as the length of the input remaining at the start of
/// the construct; lowering turns them into offsets.
#[derive(Debug, Clone)]
struct RawDef<'a> {
    name: &'a str,
    body: RawExpr<'a>,
    rest: usize,
}

#[derive(Debug, Clone)]
enum RawExpr<'a> {
    Ref { name: &'a str, rest: usize },
    Call { name: &'a str, args: Vec<RawExpr<'a>>, rest: usize },
    Int { value: u64, rest: usize },
    Str { value: String, rest: usize },
}

impl RawExpr<'_> {
    fn rest(&self) -> usize {
        match self {
            RawExpr::Ref { rest, .. }
            | RawExpr::Call { rest, .. }
            | RawExpr::Int { rest, .. }
            | RawExpr::Str { rest, .. } => *rest,
        }
    }
}

// ============================================================================
// Winnow parsers
// ============================================================================

/// Skip whitespace and `//` comments.
fn ws(input: &mut &str) -> ModalResult<()> {
    loop {
        take_while(0.., |c: char| c.is_ascii_whitespace())
            .void()
            .parse_next(input)?;
        if !input.starts_with("//") {
            return Ok(());
        }
        take_till(0.., '\n').void().parse_next(input)?;
    }
}

/// Parse an identifier: [a-zA-Z_][a-zA-Z0-9_]*
fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// Parse a string literal: "content", with `\"`, `\\`, `\n` and `\t` escapes.
fn string_lit(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut result = String::new();
    loop {
        match any.parse_next(input)? {
            '"' => break,
            '\\' => match any.parse_next(input)? {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                escaped => result.push(escaped),
            },
            c => result.push(c),
        }
    }
    Ok(result)
}

fn expr<'a>(input: &mut &'a str) -> ModalResult<RawExpr<'a>> {
    let rest = input.len();
    alt((
        preceded('@', ident).map(move |name| RawExpr::Ref { name, rest }),
        string_lit.map(move |value| RawExpr::Str { value, rest }),
        ascii::dec_uint::<_, u64, _>.map(move |value| RawExpr::Int { value, rest }),
        call,
    ))
    .parse_next(input)
}

/// `name` or `name(arg, ...)`
fn call<'a>(input: &mut &'a str) -> ModalResult<RawExpr<'a>> {
    let rest = input.len();
    let name = ident.parse_next(input)?;
    let args: Option<Vec<RawExpr<'a>>> = opt(delimited(
        (ws, '(', ws),
        separated(0.., (ws, expr, ws).map(|(_, e, _)| e), ','),
        (ws, ')'),
    ))
    .parse_next(input)?;
    Ok(RawExpr::Call {
        name,
        args: args.unwrap_or_default(),
        rest,
    })
}

/// `strategy @name = expr`
fn definition<'a>(input: &mut &'a str) -> ModalResult<RawDef<'a>> {
    let rest = input.len();
    ("strategy", take_while(1.., |c: char| c.is_ascii_whitespace()), '@')
        .void()
        .parse_next(input)?;
    let name = ident.parse_next(input)?;
    (ws, '=', ws).void().parse_next(input)?;
    let body = expr.parse_next(input)?;
    Ok(RawDef { name, body, rest })
}

// ============================================================================
// Lowering
// ============================================================================

struct Lowerer<'a> {
    ctx: &'a mut IrContext,
    source: &'a str,
    path: PathRef,
    strategy_ty: TypeRef,
}

impl Lowerer<'_> {
    fn offset(&self, rest: usize) -> usize {
        self.source.len() - rest
    }

    fn location(&self, rest: usize) -> Location {
        let start = self.offset(rest);
        Location::new(self.path, Span::new(start, start))
    }

    fn error(&self, rest: usize, message: impl Into<String>) -> DescribeError {
        DescribeError {
            message: message.into(),
            offset: self.offset(rest),
        }
    }

    fn definition(&mut self, def: &RawDef<'_>) -> Result<OpRef, DescribeError> {
        let loc = self.location(def.rest);
        let block = BlockBuilder::new(loc).build(self.ctx);
        let value = self.expr(&def.body, block)?;
        let ret = dialect::Return::builder(loc).operand(value).create(self.ctx);
        self.ctx.push_op(block, ret);
        let body = RegionBuilder::new(loc).block(block).build(self.ctx);
        Ok(dialect::StrategyDef::builder(loc)
            .attr(ATTR_SYM_NAME(), Attribute::Symbol(Symbol::from_dynamic(def.name)))
            .region(body)
            .create(self.ctx))
    }

    /// Lower `e` into ops appended to `block`; returns the strategy value.
    fn expr(&mut self, e: &RawExpr<'_>, block: BlockRef) -> Result<ValueRef, DescribeError> {
        let loc = self.location(e.rest());
        let op = match e {
            RawExpr::Int { rest, .. } => {
                return Err(self.error(*rest, "expected a strategy, found an integer"));
            }
            RawExpr::Str { rest, .. } => {
                return Err(self.error(*rest, "expected a strategy, found a string"));
            }
            RawExpr::Ref { name, .. } => dialect::Ref::builder(loc)
                .attr(ATTR_TARGET(), Attribute::Symbol(Symbol::from_dynamic(name)))
                .result(self.strategy_ty)
                .create(self.ctx),
            RawExpr::Call { name, args, rest } => self.call(name, args, *rest, block)?,
        };
        self.ctx.push_op(block, op);
        Ok(self.ctx.op_result(op, 0))
    }

    fn call(
        &mut self,
        name: &str,
        args: &[RawExpr<'_>],
        rest: usize,
        block: BlockRef,
    ) -> Result<OpRef, DescribeError> {
        let loc = self.location(rest);
        let arity_error = |this: &Self, expected: &str| {
            this.error(
                rest,
                format!("`{name}` expects {expected} argument(s), found {}", args.len()),
            )
        };

        if name == "native" {
            let [RawExpr::Str { value, .. }] = args else {
                return Err(arity_error(self, "one string"));
            };
            return Ok(self.native(loc, value));
        }
        if name == "garbage_collect" {
            if !args.is_empty() {
                return Err(arity_error(self, "0"));
            }
            return Ok(self.native(loc, name));
        }
        let known = dialect::combinator_arity(name).filter(|_| name != "ref");
        let Some(arity) = known else {
            if args.is_empty() {
                return Ok(self.native(loc, name));
            }
            return Err(self.error(rest, format!("unknown combinator `{name}`")));
        };

        // `top_to_bottom` and `repeat` take an optional trailing integer.
        let (strategies, param) = match args.split_last() {
            Some((RawExpr::Int { value, .. }, init))
                if matches!(name, "top_to_bottom" | "repeat") =>
            {
                (init, Some(*value))
            }
            _ => (args, None),
        };
        if strategies.len() != arity {
            return Err(arity_error(self, &arity.to_string()));
        }
        let operands = strategies
            .iter()
            .map(|a| self.expr(a, block))
            .collect::<Result<Vec<_>, _>>()?;

        let builder = match name {
            "id" => dialect::Id::builder(loc),
            "fail" => dialect::Fail::builder(loc),
            "seq" => dialect::Seq::builder(loc),
            "left_choice" => dialect::LeftChoice::builder(loc),
            "try" => dialect::Try::builder(loc),
            "bottom_to_top" => dialect::BottomToTop::builder(loc),
            "backwards" => dialect::Backwards::builder(loc),
            "everywhere" => dialect::Everywhere::builder(loc),
            "top_to_bottom" => {
                let b = dialect::TopToBottom::builder(loc);
                match param {
                    Some(skip) => b.attr(ATTR_SKIP(), Attribute::IntBits(skip)),
                    None => b,
                }
            }
            "repeat" => {
                let b = dialect::Repeat::builder(loc);
                match param {
                    Some(cap) => b.attr(ATTR_CAP(), Attribute::IntBits(cap)),
                    None => b,
                }
            }
            _ => return Err(self.error(rest, format!("unknown combinator `{name}`"))),
        };
        Ok(builder
            .operands(operands)
            .result(self.strategy_ty)
            .create(self.ctx))
    }

    fn native(&mut self, loc: Location, name: &str) -> OpRef {
        dialect::Native::builder(loc)
            .attr(ATTR_NAME(), Attribute::String(name.to_owned()))
            .result(self.strategy_ty)
            .create(self.ctx)
    }
}

/// Parse strategy definitions into a `core.module` of `elevate.strategy`
/// operations.
///
/// # Errors
///
/// Returns a [`DescribeError`] for malformed text, unknown combinators and
/// combinators given the wrong arguments.
pub fn parse_strategies(ctx: &mut IrContext, input: &str) -> Result<Module, DescribeError> {
    let mut remaining = input;
    let mut defs = Vec::new();
    loop {
        ws.parse_next(&mut remaining).map_err(|e| DescribeError {
            message: format!("lexer error: {e}"),
            offset: input.len() - remaining.len(),
        })?;
        if remaining.is_empty() {
            break;
        }
        let def = definition.parse_next(&mut remaining).map_err(|e| DescribeError {
            message: format!("expected `strategy @name = ...`: {e}"),
            offset: input.len() - remaining.len(),
        })?;
        defs.push(def);
    }

    let path = ctx.paths.intern("<strategies>");
    let strategy_ty = dialect::strategy_type(ctx);
    let mut lowerer = Lowerer {
        ctx,
        source: input,
        path,
        strategy_ty,
    };
    let mut ops = Vec::with_capacity(defs.len());
    for def in &defs {
        ops.push(lowerer.definition(def)?);
    }
    let loc = Location::new(path, Span::new(0, input.len()));
    Ok(Module::create(ctx, loc, Symbol::new("strategies"), ops))
}

#[cfg(test)]
mod tests {
    use canopy_ir::dialect::DialectRegistry;
    use canopy_ir::printer::print_op;

    use super::*;

    fn parse(text: &str) -> (IrContext, Result<Module, DescribeError>) {
        let mut ctx = IrContext::new();
        let result = parse_strategies(&mut ctx, text);
        (ctx, result)
    }

    #[test]
    fn lowers_nested_calls_depth_first() {
        let (ctx, module) = parse(
            "// cleanup after folding\n\
             strategy @cleanup = seq(everywhere(try(fold)), garbage_collect)\n\
             strategy @twice = seq(@cleanup, top_to_bottom(@cleanup, 1))",
        );
        let module = module.unwrap();
        insta::assert_snapshot!(print_op(&ctx, module.op()), @r#"
        core.module {sym_name = @strategies} {
          elevate.strategy {sym_name = @cleanup} {
            %0 = elevate.native {name = "fold"} : elevate.strategy
            %1 = elevate.try %0 : elevate.strategy
            %2 = elevate.everywhere %1 : elevate.strategy
            %3 = elevate.native {name = "garbage_collect"} : elevate.strategy
            %4 = elevate.seq %2, %3 : elevate.strategy
            elevate.return %4
          }
          elevate.strategy {sym_name = @twice} {
            %5 = elevate.ref {target = @cleanup} : elevate.strategy
            %6 = elevate.ref {target = @cleanup} : elevate.strategy
            %7 = elevate.top_to_bottom %6 {skip = 1} : elevate.strategy
            %8 = elevate.seq %5, %7 : elevate.strategy
            elevate.return %8
          }
        }
        "#);

        let registry = DialectRegistry::with_builtin()
            .with_dialect(dialect::dialect())
            .strict();
        registry.verify(&ctx, module.op()).unwrap();
    }

    #[test]
    fn empty_input_gives_an_empty_module() {
        let (ctx, module) = parse("  // nothing here\n");
        assert!(module.unwrap().ops(&ctx).is_empty());
    }

    #[test]
    fn arity_errors_point_at_the_call() {
        let (_, err) = parse("strategy @s = seq(id)");
        assert_eq!(
            err.unwrap_err(),
            DescribeError {
                message: "`seq` expects 2 argument(s), found 1".into(),
                offset: 14,
            }
        );
    }

    #[test]
    fn unknown_combinators_with_arguments_are_rejected() {
        let (_, err) = parse("strategy @s = sequence(id, id)");
        assert_eq!(err.unwrap_err().message, "unknown combinator `sequence`");
    }

    #[test]
    fn literals_are_not_strategies() {
        let (_, err) = parse("strategy @s = try(3)");
        let err = err.unwrap_err();
        assert_eq!(err.message, "expected a strategy, found an integer");
        assert_eq!(err.offset, 18);
    }

    #[test]
    fn malformed_text_reports_an_offset() {
        let (_, err) = parse("strategy @s = seq(id, id)\nstrategy s = id");
        let err = err.unwrap_err();
        assert!(err.message.starts_with("expected `strategy @name = ...`"), "{err}");
        assert!(err.offset >= 26, "{err}");
    }
}
