//! Batch pipeline: parse, analyze, sort, then evaluate or compile and run.

use std::collections::BTreeSet;

use tracing::{debug, info_span, warn};

use crate::analysis::{self, ExprInfo};
use crate::ast::Expr;
use crate::bytecode::{Chunk, ChunkReader, Compiler, ExResult, DEFAULT_STACK_CAPACITY, VM};
use crate::environment::{Environment, Field};
use crate::error::{AnalysisError, CompileError, FormulaError, ParserError};
use crate::functions::FunctionRegistry;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::value::Value;

/// How a batch is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Walk the syntax tree directly
    #[default]
    TreeWalk,
    /// Compile to a chunk and run it on the VM
    Bytecode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Reorder formulas so every variable is assigned before it is read
    pub need_sort: bool,
    pub mode: ExecutionMode,
    /// Operand stack slots for the VM
    pub stack_capacity: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            need_sort: true,
            mode: ExecutionMode::default(),
            stack_capacity: DEFAULT_STACK_CAPACITY,
        }
    }
}

/// Runs formula batches.
///
/// Results are always returned in input order, whatever order the formulas
/// were executed in.
pub struct Runner {
    options: RunnerOptions,
    functions: FunctionRegistry,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// A runner with default options and the built-in functions.
    pub fn new() -> Self {
        Self::with_options(RunnerOptions::default())
    }

    pub fn with_options(options: RunnerOptions) -> Self {
        Self {
            options,
            functions: FunctionRegistry::with_builtins(),
        }
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn set_need_sort(&mut self, need_sort: bool) -> &mut Self {
        self.options.need_sort = need_sort;
        self
    }

    pub fn set_execute_mode(&mut self, mode: ExecutionMode) -> &mut Self {
        self.options.mode = mode;
        self
    }

    pub fn set_stack_capacity(&mut self, capacity: usize) -> &mut Self {
        self.options.stack_capacity = capacity;
        self
    }

    /// Run a single formula and return its value.
    pub fn execute(&self, source: &str, env: &mut dyn Environment) -> Result<Value, FormulaError> {
        let mut values = self.execute_batch(&[source], env)?;
        Ok(if values.is_empty() {
            Value::Null
        } else {
            values.swap_remove(0)
        })
    }

    pub fn execute_batch<S: AsRef<str>>(
        &self,
        sources: &[S],
        env: &mut dyn Environment,
    ) -> Result<Vec<Value>, FormulaError> {
        let _span = info_span!("execute_batch", formulas = sources.len(), mode = ?self.options.mode)
            .entered();

        let exprs = self.parse(sources)?;
        let infos = self.analyze(exprs)?;
        match self.options.mode {
            ExecutionMode::Bytecode => {
                let chunk = self.compile_ir(&infos)?;
                self.run_chunk(&chunk, env)
            }
            ExecutionMode::TreeWalk => self.run_ir(&infos, env),
        }
    }

    pub fn parse<S: AsRef<str>>(&self, sources: &[S]) -> Result<Vec<Expr>, ParserError> {
        let _span = info_span!("parse", formulas = sources.len()).entered();
        sources
            .iter()
            .map(|source| Parser::parse_source(source.as_ref()))
            .collect()
    }

    /// Wrap each formula with its variables and, unless disabled, sort the batch.
    pub fn analyze(&self, exprs: Vec<Expr>) -> Result<Vec<ExprInfo>, AnalysisError> {
        let _span = info_span!("analyze", formulas = exprs.len()).entered();
        let infos: Vec<ExprInfo> = exprs
            .into_iter()
            .enumerate()
            .map(|(index, expr)| ExprInfo::new(expr, index))
            .collect();
        if self.options.need_sort {
            analysis::sort(infos)
        } else {
            Ok(infos)
        }
    }

    pub fn compile_ir(&self, infos: &[ExprInfo]) -> Result<Chunk, CompileError> {
        let _span = info_span!("compile", formulas = infos.len()).entered();
        Compiler::compile_batch(&self.functions, infos)
    }

    pub fn compile_source<S: AsRef<str>>(&self, sources: &[S]) -> Result<Chunk, FormulaError> {
        let exprs = self.parse(sources)?;
        let infos = self.analyze(exprs)?;
        Ok(self.compile_ir(&infos)?)
    }

    /// Evaluate analyzed formulas with the tree-walking interpreter.
    pub fn run_ir(
        &self,
        infos: &[ExprInfo],
        env: &mut dyn Environment,
    ) -> Result<Vec<Value>, FormulaError> {
        let _span = info_span!("run_ir", formulas = infos.len()).entered();

        let names: BTreeSet<&str> = infos
            .iter()
            .flat_map(|info| info.precursors().iter().chain(info.successors()))
            .map(String::as_str)
            .collect();
        prepare(env, names)?;

        let results = Interpreter::new(&self.functions).execute(infos, env)?;
        Ok(place(results, infos.len()))
    }

    /// Run a compiled chunk on a fresh VM.
    pub fn run_chunk(&self, chunk: &Chunk, env: &mut dyn Environment) -> Result<Vec<Value>, FormulaError> {
        let _span = info_span!("run_chunk", bytes = chunk.byte_size()).entered();

        let variables = ChunkReader::new(chunk)?.variables();
        prepare(env, variables.iter().map(String::as_str))?;

        let results = VM::with_capacity(self.options.stack_capacity).execute(
            chunk,
            env,
            &self.functions,
        )?;
        let len = results.iter().map(|r| r.index + 1).max().unwrap_or(0);
        Ok(place(results, len))
    }
}

/// Hand the referenced variables to the environment's pre-flight hook.
fn prepare<'n>(
    env: &mut dyn Environment,
    names: impl IntoIterator<Item = &'n str>,
) -> Result<(), FormulaError> {
    let fields: Vec<Field> = names.into_iter().map(Field::from_path).collect();
    debug!(fields = fields.len(), "preparing environment");
    if env.before_execute(&fields) {
        Ok(())
    } else {
        warn!("environment rejected the run");
        Err(FormulaError::Rejected)
    }
}

/// Put each result's value at the position its formula had in the input.
fn place(results: Vec<ExResult>, len: usize) -> Vec<Value> {
    let mut values = vec![Value::Null; len];
    for result in results {
        if let Some(slot) = values.get_mut(result.index) {
            *slot = result.value;
        }
    }
    values
}
