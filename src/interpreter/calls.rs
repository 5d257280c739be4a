//! Registered function calls.

use crate::ast::Expr;
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::value::Value;

use super::{Interpreter, RuntimeResult};

impl Interpreter<'_> {
    pub(crate) fn evaluate_call(
        &self,
        name: &str,
        arguments: &[Expr],
        env: &mut dyn Environment,
    ) -> RuntimeResult<Value> {
        let callable = self
            .functions
            .lookup(name)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_string()))?;
        if callable.arity != arguments.len() {
            return Err(RuntimeError::wrong_arity(
                name,
                callable.arity,
                arguments.len(),
            ));
        }

        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.evaluate(argument, env)?);
        }

        callable
            .call(values)
            .map_err(|message| RuntimeError::FunctionFailed {
                name: name.to_string(),
                message,
            })
    }
}
