//! Link-time registry of side-effect-free operations.
//!
//! Purity is needed by both rewrite engines (DCE here, garbage collection on
//! snapshots), which may run without a `DialectRegistry` at hand, so it is
//! collected globally through `inventory` at the dialect definition site.

use std::sync::LazyLock;

use rustc_hash::FxHashSet;

use crate::context::IrContext;
use crate::refs::OpRef;
use crate::symbol::Symbol;

/// Marker trait for typed wrappers of pure operations.
pub trait Pure {}

/// Submitted once per pure operation via [`register_pure_op!`].
pub struct PureOpRegistration {
    pub dialect: &'static str,
    pub op_name: &'static str,
}

inventory::collect!(PureOpRegistration);

static REGISTRY: LazyLock<FxHashSet<(Symbol, Symbol)>> = LazyLock::new(|| {
    inventory::iter::<PureOpRegistration>
        .into_iter()
        .map(|reg| (Symbol::new(reg.dialect), Symbol::new(reg.op_name)))
        .collect()
});

pub struct PureOps;

impl PureOps {
    #[doc(hidden)]
    pub const fn register(dialect: &'static str, op_name: &'static str) -> PureOpRegistration {
        PureOpRegistration { dialect, op_name }
    }

    /// Whether `dialect.name` was registered as pure. Unregistered operations
    /// are conservatively treated as effectful.
    pub fn is_pure(dialect: Symbol, name: Symbol) -> bool {
        REGISTRY.contains(&(dialect, name))
    }

    pub fn is_pure_op(ctx: &IrContext, op: OpRef) -> bool {
        let data = ctx.op(op);
        Self::is_pure(data.dialect, data.name)
    }
}

/// Register an operation as pure.
///
/// Accepts either a typed wrapper (`register_pure_op!(arith::Addi)`) or a
/// `dialect.op` pair naming a wrapper in this crate's `dialect` module.
#[macro_export]
macro_rules! register_pure_op {
    ($dialect:ident . $op_name:ident) => {
        $crate::paste::paste! {
            $crate::register_pure_op!($crate::dialect::$dialect::[<$op_name:camel>]);
        }
    };
    ($op_type:ty) => {
        impl $crate::op_interface::Pure for $op_type {}

        ::inventory::submit! {
            $crate::op_interface::PureOps::register(
                <$op_type as $crate::DialectOp>::DIALECT_NAME,
                <$op_type as $crate::DialectOp>::OP_NAME,
            )
        }
    };
}
