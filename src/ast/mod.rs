//! Abstract syntax tree for formulas.

pub mod expr;

pub use expr::{BinaryOp, Expr, ExprKind, Literal, LogicOp, UnaryOp};
