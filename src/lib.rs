//! Formulang: a small formula language with dependency-ordered batch evaluation.
//!
//! This is the library root that exports all modules.
//!
//! # Execution Modes
//!
//! A batch of formulas can be run two ways, with identical results:
//! - **Tree-walk interpreter**: direct AST evaluation
//! - **Bytecode VM**: compile once to a [`bytecode::Chunk`], which can be
//!   saved to disk and executed many times
//!
//! Before either runs, the batch is analyzed for the variables each formula
//! reads and assigns, and sorted so every variable is assigned before it is read.

#![allow(clippy::result_large_err)]
#![allow(clippy::new_without_default)]

pub mod analysis;
pub mod ast;
pub mod bytecode;
pub mod environment;
pub mod error;
pub mod functions;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod runner;
pub mod span;
pub mod value;

pub use environment::{DefaultEnvironment, Environment, Field};
pub use error::FormulaError;
pub use runner::{ExecutionMode, Runner, RunnerOptions};
pub use value::{Instance, Value};

/// Evaluate one formula against an empty environment.
pub fn eval(source: &str) -> Result<Value, FormulaError> {
    Runner::new().execute(source, &mut DefaultEnvironment::new())
}

/// Evaluate one formula against `env`.
pub fn eval_with(source: &str, env: &mut dyn Environment) -> Result<Value, FormulaError> {
    Runner::new().execute(source, env)
}

/// Parse a formula without evaluating it.
pub fn parse(source: &str) -> Result<ast::Expr, FormulaError> {
    Ok(parser::Parser::parse_source(source)?)
}

/// Parse, sort and compile a batch of formulas.
pub fn compile<S: AsRef<str>>(sources: &[S]) -> Result<bytecode::Chunk, FormulaError> {
    Runner::new().compile_source(sources)
}

/// Disassemble a chunk to a string.
pub fn disassemble(chunk: &bytecode::Chunk) -> Result<String, FormulaError> {
    Ok(bytecode::disassemble_to_string(chunk)?)
}
