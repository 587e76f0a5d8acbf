//! Module-level transformations built on the graph primitives.

pub mod dce;

pub use dce::{DceConfig, DceResult, eliminate_dead_code, eliminate_dead_code_with_config};
