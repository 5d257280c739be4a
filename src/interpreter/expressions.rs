//! Expression evaluation dispatch.

use crate::ast::{Expr, ExprKind};
use crate::environment::Environment;
use crate::value::Value;

use super::{Interpreter, RuntimeResult};

impl Interpreter<'_> {
    /// Evaluate one expression against `env`.
    pub fn evaluate(&self, expr: &Expr, env: &mut dyn Environment) -> RuntimeResult<Value> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(literal.to_value()),

            ExprKind::Identifier(name) => Ok(env.get_or_default(name, Value::Null)),

            ExprKind::Unary { operator, operand } => {
                self.evaluate_unary(*operator, operand, env)
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, *operator, right, env),

            ExprKind::Logic {
                left,
                operator,
                right,
            } => self.evaluate_logic(left, *operator, right, env),

            ExprKind::Assign { target, value } => self.evaluate_assign(target, value, env),

            ExprKind::Call { name, arguments } => self.evaluate_call(name, arguments, env),

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.evaluate(then_branch, env)
                } else {
                    match else_branch {
                        Some(else_branch) => self.evaluate(else_branch, env),
                        None => Ok(Value::Null),
                    }
                }
            }

            ExprKind::Get { object, name } => self.evaluate_get(object, name, env),

            ExprKind::Set {
                object,
                name,
                value,
            } => self.evaluate_set(object, name, value, env),
        }
    }
}
