//! ARM assembly backend for the structured-program tree.
//!
//! Unlike the high-level-language backends this one performs classical
//! compiler-backend work itself: a finite register pool is allocated to
//! source variables, compound expressions are decomposed into two/three
//! operand instructions honoring the immediate encoding rules, conditions
//! become compare-and-branch sequences, and nested constructs get uniquely
//! labeled branch targets.

pub mod classify;
pub mod conditions;
pub mod config;
pub mod dialect;
pub mod expr;
pub mod generator;
pub mod jumps;
pub mod operand;
pub mod peephole;
pub mod registers;

pub use config::ArmOptions;
pub use dialect::Dialect;
pub use generator::{ArmGenerator, GeneratedUnit};
