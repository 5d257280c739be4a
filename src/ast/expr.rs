//! Expression AST nodes.

use std::fmt;

use crate::span::Span;
use crate::value::Value;

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// True for the two node kinds that write a variable: `x = ...` and `a.b = ...`.
    pub fn is_assign(&self) -> bool {
        matches!(self.kind, ExprKind::Assign { .. } | ExprKind::Set { .. })
    }
}

/// All expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal value: 42, 2.5, "text", true, null
    Literal(Literal),

    /// Variable reference: foo
    Identifier(String),

    /// Unary operation: -a, !a
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },

    /// Binary operation: a + b
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },

    /// Short-circuit logic: a && b, a || b
    Logic {
        left: Box<Expr>,
        operator: LogicOp,
        right: Box<Expr>,
    },

    /// Assignment: x = value
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },

    /// Function call by name: abs(x)
    Call { name: String, arguments: Vec<Expr> },

    /// Conditional form: if(cond, then[, else])
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },

    /// Property access: obj.name
    Get { object: Box<Expr>, name: String },

    /// Property assignment: obj.name = value
    Set {
        object: Box<Expr>,
        name: String,
        value: Box<Expr>,
    },
}

/// Literal payloads produced by the scanner and keyword literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i32),
    Double(f64),
    String(String),
    Boolean(bool),
    Null,
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Integer(n) => Value::Integer(*n),
            Literal::Double(n) => Value::Double(*n),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Null => Value::Null,
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Subtract => write!(f, "-"),
            BinaryOp::Multiply => write!(f, "*"),
            BinaryOp::Divide => write!(f, "/"),
            BinaryOp::Modulo => write!(f, "%"),
            BinaryOp::Power => write!(f, "**"),
            BinaryOp::Equal => write!(f, "=="),
            BinaryOp::NotEqual => write!(f, "!="),
            BinaryOp::Less => write!(f, "<"),
            BinaryOp::LessEqual => write!(f, "<="),
            BinaryOp::Greater => write!(f, ">"),
            BinaryOp::GreaterEqual => write!(f, ">="),
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Negate => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

/// Short-circuit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

impl fmt::Display for LogicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicOp::And => write!(f, "&&"),
            LogicOp::Or => write!(f, "||"),
        }
    }
}

/// Fully parenthesized rendering, used in diagnostics and parser tests.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(Literal::String(s)) => write!(f, "\"{}\"", s),
            ExprKind::Literal(lit) => write!(f, "{}", lit.to_value()),
            ExprKind::Identifier(name) => write!(f, "{}", name),
            ExprKind::Unary { operator, operand } => write!(f, "({}{})", operator, operand),
            ExprKind::Binary {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            ExprKind::Logic {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            ExprKind::Assign { target, value } => write!(f, "({} = {})", target, value),
            ExprKind::Call { name, arguments } => {
                write!(f, "{}(", name)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => {
                    write!(f, "if({}, {}, {})", condition, then_branch, else_branch)
                }
                None => write!(f, "if({}, {})", condition, then_branch),
            },
            ExprKind::Get { object, name } => write!(f, "{}.{}", object, name),
            ExprKind::Set {
                object,
                name,
                value,
            } => write!(f, "({}.{} = {})", object, name, value),
        }
    }
}
