//! Variable and property assignment, property reads.

use crate::ast::{Expr, ExprKind};
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::value::Value;

use super::{Interpreter, RuntimeResult};

impl Interpreter<'_> {
    pub(crate) fn evaluate_assign(
        &self,
        target: &Expr,
        value: &Expr,
        env: &mut dyn Environment,
    ) -> RuntimeResult<Value> {
        let ExprKind::Identifier(name) = &target.kind else {
            return Err(RuntimeError::InvalidAssignmentTarget);
        };
        let value = self.evaluate(value, env)?;
        env.put(name, value.clone());
        Ok(value)
    }

    /// Missing properties read as null.
    pub(crate) fn evaluate_get(
        &self,
        object: &Expr,
        name: &str,
        env: &mut dyn Environment,
    ) -> RuntimeResult<Value> {
        match self.evaluate(object, env)? {
            Value::Instance(instance) => {
                let field = instance.borrow().get(name);
                Ok(field.unwrap_or(Value::Null))
            }
            _ => Err(RuntimeError::NotAnInstance(name.to_string())),
        }
    }

    // The value is evaluated before the object, matching the compiled order.
    pub(crate) fn evaluate_set(
        &self,
        object: &Expr,
        name: &str,
        value: &Expr,
        env: &mut dyn Environment,
    ) -> RuntimeResult<Value> {
        let value = self.evaluate(value, env)?;
        let Value::Instance(instance) = self.evaluate(object, env)? else {
            return Err(RuntimeError::NotAnInstance(name.to_string()));
        };
        instance.borrow_mut().set(name, value.clone());
        Ok(value)
    }
}
