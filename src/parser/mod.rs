//! Pratt parser for formulas.

mod core;
mod expressions;
mod precedence;

#[cfg(test)]
mod tests;

pub use self::core::{ParseResult, Parser};
pub use self::precedence::Precedence;

/// Maximum number of arguments in a function call.
pub const MAX_ARGUMENTS: usize = 255;
