//! The `elevate` dialect: strategy descriptions as an operation graph.
//!
//! ```text
//! elevate.strategy {sym_name = @fold} {
//!   %0 = elevate.native {name = "fold_constant_add"} : elevate.strategy
//!   %1 = elevate.try %0 : elevate.strategy
//!   %2 = elevate.everywhere %1 : elevate.strategy
//!   elevate.return %2
//! }
//! ```

use canopy_ir::dialect::{Arity, Dialect, OpDef};
use canopy_ir::{AttributeKind, IrContext, TypeRef};

canopy_ir::define_op! {
    /// A named strategy definition; its body ends in `elevate.return`.
    pub StrategyDef = elevate.strategy;
    pub Return = elevate."return";
    /// Reference to another definition, `@name` in the text form.
    pub Ref = elevate."ref";
    /// A strategy registered with the interpreter under `name`.
    pub Native = elevate.native;
    pub Id = elevate.id;
    pub Fail = elevate.fail;
    pub Seq = elevate.seq;
    pub LeftChoice = elevate.left_choice;
    pub Try = elevate."try";
    pub Repeat = elevate.repeat;
    pub TopToBottom = elevate.top_to_bottom;
    pub BottomToTop = elevate.bottom_to_top;
    pub Backwards = elevate.backwards;
    pub Everywhere = elevate.everywhere;
}

canopy_ir::symbols! {
    ATTR_SYM_NAME => "sym_name",
    ATTR_TARGET => "target",
    ATTR_NAME => "name",
    ATTR_SKIP => "skip",
    ATTR_CAP => "cap",
}

/// The type of every value in a strategy body.
pub fn strategy_type(ctx: &mut IrContext) -> TypeRef {
    ctx.simple_type("elevate", "strategy")
}

/// Number of strategy operands each combinator takes.
pub fn combinator_arity(mnemonic: &str) -> Option<usize> {
    Some(match mnemonic {
        "id" | "fail" | "ref" | "native" => 0,
        "try" | "repeat" | "top_to_bottom" | "bottom_to_top" | "backwards" | "everywhere" => 1,
        "seq" | "left_choice" => 2,
        _ => return None,
    })
}

pub fn dialect() -> Dialect {
    let combinator = |name, operands| {
        OpDef::new(name)
            .operands(Arity::Exact(operands))
            .results(Arity::Exact(1))
    };
    Dialect::new("elevate")
        .op(OpDef::new("strategy")
            .regions(Arity::Exact(1))
            .attr("sym_name", AttributeKind::Symbol)
            .needs_terminator())
        .op(OpDef::new("return").operands(Arity::Exact(1)).terminator())
        .op(combinator("ref", 0).attr("target", AttributeKind::Symbol))
        .op(combinator("native", 0).attr("name", AttributeKind::String))
        .op(combinator("id", 0))
        .op(combinator("fail", 0))
        .op(combinator("seq", 2))
        .op(combinator("left_choice", 2))
        .op(combinator("try", 1))
        .op(combinator("repeat", 1).optional_attr("cap", AttributeKind::Int))
        .op(combinator("top_to_bottom", 1).optional_attr("skip", AttributeKind::Int))
        .op(combinator("bottom_to_top", 1))
        .op(combinator("backwards", 1))
        .op(combinator("everywhere", 1))
}
