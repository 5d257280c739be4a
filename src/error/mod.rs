//! Error types for every stage of the formula pipeline.

use crate::bytecode::ExResult;
use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("[{1}] Unexpected character '{0}'")]
    UnexpectedChar(char, Span),

    #[error("[{0}] Unterminated string")]
    UnterminatedString(Span),

    #[error("[{1}] Invalid number '{0}'")]
    InvalidNumber(String, Span),
}

impl LexerError {
    pub fn unexpected_char(c: char, span: Span) -> Self {
        Self::UnexpectedChar(c, span)
    }

    pub fn unterminated_string(span: Span) -> Self {
        Self::UnterminatedString(span)
    }

    pub fn invalid_number(s: impl Into<String>, span: Span) -> Self {
        Self::InvalidNumber(s.into(), span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::InvalidNumber(_, span) => *span,
        }
    }
}

/// Parser errors. Each one names the offending lexeme and its line.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("[{span}] Parse error at '{found}': expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("[{span}] Parse error at '{found}': can't have more than 255 arguments")]
    TooManyArguments { found: String, span: Span },

    #[error("[{span}] Parse error at '{found}': {message}")]
    General {
        message: String,
        found: String,
        span: Span,
    },

    #[error(transparent)]
    Lexer(#[from] LexerError),
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn too_many_arguments(found: impl Into<String>, span: Span) -> Self {
        Self::TooManyArguments {
            found: found.into(),
            span,
        }
    }

    pub fn general(message: impl Into<String>, found: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            found: found.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::TooManyArguments { span, .. } => *span,
            Self::General { span, .. } => *span,
            Self::Lexer(err) => err.span(),
        }
    }
}

/// Dependency analysis errors.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Circular reference between variables: {}", .remaining.join(", "))]
    CircularReference { remaining: Vec<String> },
}

/// Bytecode compilation errors.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("[{1}] Unknown function '{0}'")]
    UnknownFunction(String, Span),

    #[error("[{span}] Function '{name}' expects {expected} arguments but got {got}")]
    WrongArity {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("[{0}] Invalid assignment target")]
    InvalidAssignmentTarget(Span),

    #[error("Constant of type {0} cannot be stored in the constant pool")]
    UnsupportedConstant(String),

    #[error("String constant of {0} bytes exceeds the 32767 byte limit")]
    StringTooLong(usize),
}

impl CompileError {
    pub fn wrong_arity(name: impl Into<String>, expected: usize, got: usize, span: Span) -> Self {
        Self::WrongArity {
            name: name.into(),
            expected,
            got,
            span,
        }
    }
}

/// Errors raised while evaluating formulas, by the VM or the tree-walking interpreter.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Only instances have properties: '{0}'")]
    NotAnInstance(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Function '{name}' expects {expected} arguments but got {got}")]
    WrongArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Function '{name}' failed: {message}")]
    FunctionFailed { name: String, message: String },

    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("Stack overflow: capacity of {0} slots exceeded")]
    StackOverflow(usize),

    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Operand stack holds {0} values at exit")]
    UnbalancedStack(usize),

    #[error("Opcode {0} is reserved and cannot be executed")]
    ReservedOpCode(String),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn wrong_arity(name: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::WrongArity {
            name: name.into(),
            expected,
            got,
        }
    }
}

/// Malformed chunk bytes.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Unknown opcode {0}")]
    UnknownOpCode(u8),

    #[error("Unsupported constant tag {0}")]
    UnsupportedTag(u8),

    #[error("Negative section length {0}")]
    NegativeLength(i32),

    #[error("Invalid constant index {0}")]
    InvalidConstant(i32),

    #[error("Jump offset {offset} at {position} leaves the code")]
    InvalidJump { offset: i32, position: usize },

    #[error("{0} bytes left after the vars section")]
    TrailingBytes(usize),

    #[error("Variable bit {index} is outside the constant pool of {pool} entries")]
    VariableOutOfRange { index: usize, pool: usize },

    #[error("String constant is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl FormatError {
    pub fn truncated(needed: usize, remaining: usize) -> Self {
        Self::Truncated { needed, remaining }
    }
}

/// A run that stopped on a runtime error, together with the formulas that completed before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct AbortedRun {
    pub completed: Vec<ExResult>,
    /// An `ERROR` result for the formula that raised the error. `None` when the
    /// run failed outside any formula, such as on a malformed chunk.
    pub failed: Option<ExResult>,
    #[source]
    pub error: RuntimeError,
}

impl AbortedRun {
    pub fn new(completed: Vec<ExResult>, error: RuntimeError) -> Self {
        Self {
            completed,
            failed: None,
            error,
        }
    }

    /// Record the formula at `index` as the one that failed.
    pub fn failed_at(mut self, index: usize) -> Self {
        self.failed = Some(ExResult::error(index, self.error.to_string()));
        self
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum FormulaError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Runtime error: {0}")]
    Aborted(#[from] AbortedRun),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Execution rejected by the environment")]
    Rejected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
