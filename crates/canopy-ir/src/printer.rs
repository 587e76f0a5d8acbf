//! Generic text rendering of the graph, for debugging and snapshot tests.
//!
//! Every operation uses one form:
//!
//! ```text
//! %2 = arith.addi %0, %1 : core.i32
//! func.func {sym_name = @main} {
//!   ^bb0(%0: core.i32):
//!     func.return %0
//! }
//! ```
//!
//! Values are numbered in definition order across the whole printed tree.

use std::fmt::{self, Write};

use rustc_hash::FxHashMap;

use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

struct PrintState<'a> {
    ctx: &'a IrContext,
    value_names: FxHashMap<ValueRef, usize>,
    block_labels: FxHashMap<BlockRef, usize>,
}

impl<'a> PrintState<'a> {
    fn name_value(&mut self, v: ValueRef) -> usize {
        let next = self.value_names.len();
        *self.value_names.entry(v).or_insert(next)
    }

    fn label_block(&mut self, b: BlockRef) -> usize {
        let next = self.block_labels.len();
        *self.block_labels.entry(b).or_insert(next)
    }

    fn write_value(&self, f: &mut impl Write, v: ValueRef) -> fmt::Result {
        match self.value_names.get(&v) {
            Some(n) => write!(f, "%{n}"),
            None => write!(f, "%<{v}>"),
        }
    }
}

/// Render `op` and everything nested in it.
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut state = PrintState {
        ctx,
        value_names: FxHashMap::default(),
        block_labels: FxHashMap::default(),
    };
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = print_operation(&mut state, &mut out, op, 0);
    out
}

pub fn print_type(ctx: &IrContext, ty: TypeRef) -> String {
    ctx.types.display(ty).to_string()
}

fn write_attribute(ctx: &IrContext, f: &mut impl Write, attr: &Attribute) -> fmt::Result {
    match attr {
        Attribute::Unit => f.write_str("unit"),
        Attribute::Bool(b) => write!(f, "{b}"),
        Attribute::IntBits(v) => write!(f, "{}", *v as i64),
        Attribute::FloatBits(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
        Attribute::String(s) => write!(f, "{s:?}"),
        Attribute::Bytes(bytes) => write!(f, "bytes{:?}", bytes.as_slice()),
        Attribute::DenseInts(values) => {
            f.write_str("dense<")?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", *v as i64)?;
            }
            f.write_char('>')
        }
        Attribute::Type(ty) => write!(f, "{}", ctx.types.display(*ty)),
        Attribute::Symbol(sym) => write_symbol(f, *sym),
        Attribute::List(items) => {
            f.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_attribute(ctx, f, item)?;
            }
            f.write_char(']')
        }
    }
}

fn write_symbol(f: &mut impl Write, sym: Symbol) -> fmt::Result {
    sym.with_str(|s| {
        if !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_') {
            write!(f, "@{s}")
        } else {
            write!(f, "@{s:?}")
        }
    })
}

fn print_operation(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let data = ctx.op(op);
    write!(f, "{:indent$}", "")?;

    let results = ctx.op_results(op);
    if !results.is_empty() {
        for (i, &v) in results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let n = state.name_value(v);
            write!(f, "%{n}")?;
        }
        f.write_str(" = ")?;
    }

    write!(f, "{}.{}", data.dialect, data.name)?;

    for (i, &v) in ctx.op_operands(op).iter().enumerate() {
        f.write_str(if i == 0 { " " } else { ", " })?;
        state.write_value(f, v)?;
    }

    if !data.successors.is_empty() {
        f.write_str(" [")?;
        for (i, &b) in data.successors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let label = state.label_block(b);
            write!(f, "^bb{label}")?;
        }
        f.write_char(']')?;
    }

    if !data.attributes.is_empty() {
        // Symbol order follows interning order; sort by text for stable output.
        let mut attrs: Vec<_> = data.attributes.iter().collect();
        attrs.sort_by_cached_key(|(key, _)| key.to_string());
        f.write_str(" {")?;
        for (i, (key, val)) in attrs.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key} = ")?;
            write_attribute(ctx, f, val)?;
        }
        f.write_char('}')?;
    }

    let result_types = ctx.op_result_types(op);
    if !result_types.is_empty() {
        f.write_str(" : ")?;
        for (i, &ty) in result_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", ctx.types.display(ty))?;
        }
    }

    for &region in &data.regions {
        f.write_str(" {\n")?;
        print_region(state, f, region, indent + 2)?;
        write!(f, "{:indent$}}}", "")?;
    }
    f.write_char('\n')
}

fn print_region(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    region: RegionRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let blocks = &ctx.region(region).blocks;
    let elide_label = blocks.len() == 1 && ctx.block_args(blocks[0]).is_empty();
    if !elide_label {
        for &block in blocks {
            state.label_block(block);
        }
    }

    for &block in blocks {
        let body_indent = if elide_label {
            indent
        } else {
            let label = state.label_block(block);
            write!(f, "{:indent$}^bb{label}", "")?;
            let args = ctx.block_args(block);
            if !args.is_empty() {
                f.write_char('(')?;
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    let n = state.name_value(arg);
                    write!(f, "%{n}: {}", ctx.types.display(ctx.value_ty(arg)))?;
                }
                f.write_char(')')?;
            }
            f.write_str(":\n")?;
            indent + 2
        };
        for &op in &ctx.block(block).ops {
            print_operation(state, f, op, body_indent)?;
        }
    }
    Ok(())
}
