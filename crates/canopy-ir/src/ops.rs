//! Typed operation wrappers and the module container.

use derive_more::Display;

use crate::builder::single_block_region;
use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::refs::{BlockRef, OpRef, RegionRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

/// Failure to view an operation as a specific kind.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum ConversionError {
    #[display("expected `{}.{}`, found `{actual}`", expected.0, expected.1)]
    WrongOperation {
        expected: (&'static str, &'static str),
        actual: String,
    },
}

impl std::error::Error for ConversionError {}

/// A zero-cost typed view of an `OpRef` whose kind is `dialect.op`.
///
/// Patterns dispatch on the (dialect, name) tag through `from_op` rather than
/// through any kind hierarchy.
pub trait DialectOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;

    #[doc(hidden)]
    fn wrap_unchecked(op: OpRef) -> Self;

    fn op_ref(&self) -> OpRef;

    fn matches(ctx: &IrContext, op: OpRef) -> bool {
        ctx.op_is(op, Symbol::new(Self::DIALECT_NAME), Symbol::new(Self::OP_NAME))
    }

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        if Self::matches(ctx, op) {
            Ok(Self::wrap_unchecked(op))
        } else {
            Err(ConversionError::WrongOperation {
                expected: (Self::DIALECT_NAME, Self::OP_NAME),
                actual: ctx.op_full_name(op),
            })
        }
    }

    fn builder(location: Location) -> OperationDataBuilder {
        OperationDataBuilder::new(
            location,
            Symbol::new(Self::DIALECT_NAME),
            Symbol::new(Self::OP_NAME),
        )
    }
}

/// Declare typed wrappers for operations.
///
/// ```
/// canopy_ir::define_op! {
///     /// A no-op used in docs.
///     pub Nop = test.nop;
/// }
/// assert_eq!(<Nop as canopy_ir::DialectOp>::OP_NAME, "nop");
/// ```
#[macro_export]
macro_rules! define_op {
    (@one $(#[$meta:meta])* $vis:vis $ty:ident, $dialect:expr, $op:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis struct $ty($crate::OpRef);

        impl $crate::DialectOp for $ty {
            const DIALECT_NAME: &'static str = $dialect;
            const OP_NAME: &'static str = $op;

            fn wrap_unchecked(op: $crate::OpRef) -> Self {
                Self(op)
            }

            fn op_ref(&self) -> $crate::OpRef {
                self.0
            }
        }
    };
    () => {};
    ($(#[$meta:meta])* $vis:vis $ty:ident = $dialect:ident . $op:ident; $($rest:tt)*) => {
        $crate::define_op!(@one $(#[$meta])* $vis $ty, stringify!($dialect), stringify!($op));
        $crate::define_op!($($rest)*);
    };
    // Mnemonics that are Rust keywords are written as string literals.
    ($(#[$meta:meta])* $vis:vis $ty:ident = $dialect:ident . $op:literal; $($rest:tt)*) => {
        $crate::define_op!(@one $(#[$meta])* $vis $ty, stringify!($dialect), $op);
        $crate::define_op!($($rest)*);
    };
}

crate::symbols! {
    SYM_NAME => "sym_name",
}

/// Handle to a `core.module`: one region, one block of top-level operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Module(pub OpRef);

impl Module {
    /// View `op` as a module if it is a `core.module`.
    pub fn new(ctx: &IrContext, op: OpRef) -> Option<Self> {
        ctx.op_is(op, Symbol::new("core"), Symbol::new("module"))
            .then_some(Module(op))
    }

    /// Create a detached module holding `ops`.
    pub fn create(
        ctx: &mut IrContext,
        location: Location,
        name: Symbol,
        ops: impl IntoIterator<Item = OpRef>,
    ) -> Self {
        let body = single_block_region(ctx, location, ops);
        let op = OperationDataBuilder::new(location, Symbol::new("core"), Symbol::new("module"))
            .attr(SYM_NAME(), Attribute::Symbol(name))
            .region(body)
            .create(ctx);
        Module(op)
    }

    pub fn op(self) -> OpRef {
        self.0
    }

    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn first_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region(self.body(ctx)).blocks.first().copied()
    }

    /// Top-level operations in order.
    pub fn ops(self, ctx: &IrContext) -> Vec<OpRef> {
        self.first_block(ctx)
            .map(|b| ctx.block(b).ops.to_vec())
            .unwrap_or_default()
    }

    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        ctx.op_attr(self.0, SYM_NAME()).and_then(Attribute::as_symbol)
    }
}
