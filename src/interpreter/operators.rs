//! Binary, unary and short-circuit operator evaluation.

use crate::ast::{BinaryOp, Expr, LogicOp, UnaryOp};
use crate::environment::Environment;
use crate::value::{self, Value};

use super::{Interpreter, RuntimeResult};

impl Interpreter<'_> {
    pub(crate) fn evaluate_binary(
        &self,
        left: &Expr,
        operator: BinaryOp,
        right: &Expr,
        env: &mut dyn Environment,
    ) -> RuntimeResult<Value> {
        let left_val = self.evaluate(left, env)?;
        let right_val = self.evaluate(right, env)?;
        value::binary(operator, &left_val, &right_val)
    }

    pub(crate) fn evaluate_unary(
        &self,
        operator: UnaryOp,
        operand: &Expr,
        env: &mut dyn Environment,
    ) -> RuntimeResult<Value> {
        let operand_val = self.evaluate(operand, env)?;
        value::unary(operator, &operand_val)
    }

    /// `&&` and `||` yield the operand that decided the result, not a boolean.
    pub(crate) fn evaluate_logic(
        &self,
        left: &Expr,
        operator: LogicOp,
        right: &Expr,
        env: &mut dyn Environment,
    ) -> RuntimeResult<Value> {
        let left_val = self.evaluate(left, env)?;
        let short_circuit = match operator {
            LogicOp::And => !left_val.is_truthy(),
            LogicOp::Or => left_val.is_truthy(),
        };
        if short_circuit {
            Ok(left_val)
        } else {
            self.evaluate(right, env)
        }
    }
}
