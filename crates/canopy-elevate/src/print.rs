//! Text rendering of snapshots.
//!
//! The output uses the same form as `canopy_ir::print_op`, so a frozen and a
//! mutable graph of the same program print identically.

use std::fmt::{self, Write};
use std::sync::Arc;

use canopy_ir::Symbol;
use rustc_hash::FxHashMap;

use crate::imm::{BlockId, IAttr, IOp, IRegion, IValue, OpId};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum ValueKey {
    Result(OpId, u32),
    Arg(BlockId, u32),
}

impl ValueKey {
    fn of(v: &IValue) -> Self {
        match v {
            IValue::Result { op, index } => ValueKey::Result(op.id(), *index),
            IValue::BlockArg { block, index, .. } => ValueKey::Arg(*block, *index),
        }
    }
}

#[derive(Default)]
struct PrintState {
    value_names: FxHashMap<ValueKey, usize>,
    block_labels: FxHashMap<BlockId, usize>,
}

impl PrintState {
    fn name_value(&mut self, key: ValueKey) -> usize {
        let next = self.value_names.len();
        *self.value_names.entry(key).or_insert(next)
    }

    fn label_block(&mut self, b: BlockId) -> usize {
        let next = self.block_labels.len();
        *self.block_labels.entry(b).or_insert(next)
    }

    fn write_value(&self, f: &mut impl Write, v: &IValue) -> fmt::Result {
        match self.value_names.get(&ValueKey::of(v)) {
            Some(n) => write!(f, "%{n}"),
            None => match v {
                IValue::Result { op, index } => write!(f, "%<{}:{index}>", op.id()),
                IValue::BlockArg { block, index, .. } => write!(f, "%<{block}:{index}>"),
            },
        }
    }
}

/// Render `op` and everything nested in it.
pub fn print_iop(op: &Arc<IOp>) -> String {
    let mut state = PrintState::default();
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = print_operation(&mut state, &mut out, op, 0);
    out
}

impl fmt::Display for IOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut state = PrintState::default();
        print_operation(&mut state, f, self, 0)
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

fn write_attribute(f: &mut impl Write, attr: &IAttr) -> fmt::Result {
    match attr {
        IAttr::Unit => f.write_str("unit"),
        IAttr::Bool(b) => write!(f, "{b}"),
        IAttr::IntBits(v) => write!(f, "{}", *v as i64),
        IAttr::FloatBits(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
        IAttr::String(s) => write!(f, "{s:?}"),
        IAttr::Bytes(bytes) => write!(f, "bytes{:?}", &bytes[..]),
        IAttr::DenseInts(values) => {
            f.write_str("dense<")?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", *v as i64)?;
            }
            f.write_char('>')
        }
        IAttr::Type(ty) => write!(f, "{ty}"),
        IAttr::Symbol(sym) => write_symbol(f, *sym),
        IAttr::List(items) => {
            f.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_attribute(f, item)?;
            }
            f.write_char(']')
        }
    }
}

fn print_operation(
    state: &mut PrintState,
    f: &mut impl Write,
    op: &IOp,
    indent: usize,
) -> fmt::Result {
    write!(f, "{:indent$}", "")?;

    if !op.result_types.is_empty() {
        for i in 0..op.result_types.len() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let n = state.name_value(ValueKey::Result(op.id(), i as u32));
            write!(f, "%{n}")?;
        }
        f.write_str(" = ")?;
    }

    write!(f, "{}.{}", op.dialect, op.name)?;

    for (i, v) in op.operands.iter().enumerate() {
        f.write_str(if i == 0 { " " } else { ", " })?;
        state.write_value(f, v)?;
    }

    if !op.successors.is_empty() {
        f.write_str(" [")?;
        for (i, &b) in op.successors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let label = state.label_block(b);
            write!(f, "^bb{label}")?;
        }
        f.write_char(']')?;
    }

    if !op.attributes.is_empty() {
        let mut attrs: Vec<_> = op.attributes.iter().collect();
        attrs.sort_by_cached_key(|(key, _)| key.to_string());
        f.write_str(" {")?;
        for (i, (key, val)) in attrs.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key} = ")?;
            write_attribute(f, val)?;
        }
        f.write_char('}')?;
    }

    if !op.result_types.is_empty() {
        f.write_str(" : ")?;
        for (i, ty) in op.result_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
    }

    for region in &op.regions {
        f.write_str(" {\n")?;
        print_region(state, f, region, indent + 2)?;
        write!(f, "{:indent$}}}", "")?;
    }
    f.write_char('\n')
}

fn print_region(
    state: &mut PrintState,
    f: &mut impl Write,
    region: &IRegion,
    indent: usize,
) -> fmt::Result {
    let blocks = &region.blocks;
    let elide_label = blocks.len() == 1 && blocks[0].args.is_empty();
    if !elide_label {
        for block in blocks {
            state.label_block(block.id);
        }
    }

    for block in blocks {
        let body_indent = if elide_label {
            indent
        } else {
            let label = state.label_block(block.id);
            write!(f, "{:indent$}^bb{label}", "")?;
            if !block.args.is_empty() {
                f.write_char('(')?;
                for (i, ty) in block.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    let n = state.name_value(ValueKey::Arg(block.id, i as u32));
                    write!(f, "%{n}: {ty}")?;
                }
                f.write_char(')')?;
            }
            f.write_str(":\n")?;
            indent + 2
        };
        for op in &block.ops {
            print_operation(state, f, op, body_indent)?;
        }
    }
    Ok(())
}
