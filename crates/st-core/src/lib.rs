pub mod ast;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod jump;
pub mod symbols;

// Re-export commonly used items for convenience
pub use tracing;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
