//! Strategies described as data.
//!
//! Definitions are written in a small expression language, parsed into an
//! `elevate` operation graph, and turned into [`crate::StrategyRef`]s by the
//! [`crate::Interpreter`].

pub mod dialect;
mod parser;

pub use parser::{DescribeError, parse_strategies};
