//! Tree-walking interpreter for formula batches.
//!
//! Evaluates the AST directly against an [`Environment`]. Every operator goes
//! through the same `value::binary` / `value::unary` helpers the VM uses, so
//! both execution modes produce the same values and the same errors.

mod access;
mod calls;
mod expressions;
mod operators;

use tracing::{trace, warn};

use crate::analysis::ExprInfo;
use crate::bytecode::ExResult;
use crate::environment::Environment;
use crate::error::{AbortedRun, RuntimeError};
use crate::functions::FunctionRegistry;

pub(crate) type RuntimeResult<T> = Result<T, RuntimeError>;

/// The formula interpreter.
pub struct Interpreter<'f> {
    pub(crate) functions: &'f FunctionRegistry,
}

impl<'f> Interpreter<'f> {
    pub fn new(functions: &'f FunctionRegistry) -> Self {
        Self { functions }
    }

    /// Evaluate `infos` in order, returning one result per formula.
    ///
    /// Stops at the first failure; results of formulas that already completed
    /// are carried in the error.
    pub fn execute(
        &self,
        infos: &[ExprInfo],
        env: &mut dyn Environment,
    ) -> Result<Vec<ExResult>, AbortedRun> {
        let mut results = Vec::with_capacity(infos.len());
        for info in infos {
            trace!(index = info.index(), formula = %info.expr(), "evaluate");
            match self.evaluate(info.expr(), env) {
                Ok(value) => results.push(ExResult::ok(value, info.index())),
                Err(error) => {
                    warn!(index = info.index(), completed = results.len(), %error, "run aborted");
                    return Err(AbortedRun::new(results, error).failed_at(info.index()));
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis;
    use crate::bytecode::{Compiler, VM};
    use crate::environment::DefaultEnvironment;
    use crate::parser::Parser;
    use crate::value::{Instance, Value};
    use pretty_assertions::assert_eq;

    fn infos(sources: &[&str]) -> Vec<ExprInfo> {
        sources
            .iter()
            .enumerate()
            .map(|(i, s)| ExprInfo::new(Parser::parse_source(s).unwrap(), i))
            .collect()
    }

    fn seeded() -> DefaultEnvironment {
        let mut env = DefaultEnvironment::new();
        env.put_int("a", 3);
        env.put_double("d", 2.5);
        env.put_string("s", "abc");
        env.put_bool("t", true);
        let mut order = Instance::with_class("Order");
        order.set("qty", Value::Integer(4));
        env.put_instance("order", order);
        env
    }

    fn tree_walk(sources: &[&str]) -> (Result<Vec<ExResult>, AbortedRun>, DefaultEnvironment) {
        let registry = FunctionRegistry::with_builtins();
        let mut env = seeded();
        let result = Interpreter::new(&registry).execute(&infos(sources), &mut env);
        (result, env)
    }

    fn bytecode(sources: &[&str]) -> (Result<Vec<ExResult>, AbortedRun>, DefaultEnvironment) {
        let registry = FunctionRegistry::with_builtins();
        let mut env = seeded();
        let chunk = Compiler::compile_batch(&registry, &infos(sources)).unwrap();
        let result = VM::new().execute(&chunk, &mut env, &registry);
        (result, env)
    }

    fn tree_walk_values(sources: &[&str]) -> Vec<Value> {
        tree_walk(sources)
            .0
            .unwrap()
            .into_iter()
            .map(|r| r.value)
            .collect()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            tree_walk_values(&["1 + 2 * 3", "10 / 4", "10.0 / 4", "7 % 3", "2 ** 10", "-a"]),
            vec![
                Value::Integer(7),
                Value::Integer(2),
                Value::Double(2.5),
                Value::Integer(1),
                Value::Double(1024.0),
                Value::Integer(-3),
            ]
        );
    }

    #[test]
    fn test_strings_and_comparison() {
        assert_eq!(
            tree_walk_values(&["s + 1", "a >= 3", "s == \"abc\"", "!t"]),
            vec![
                Value::from("abc1"),
                Value::Boolean(true),
                Value::Boolean(true),
                Value::Boolean(false),
            ]
        );
    }

    #[test]
    fn test_logic_returns_deciding_operand() {
        assert_eq!(
            tree_walk_values(&["null && boom(1)", "a || boom(1)", "null || a", "t && s"]),
            vec![
                Value::Null,
                Value::Integer(3),
                Value::Integer(3),
                Value::from("abc"),
            ]
        );
    }

    #[test]
    fn test_assignment_chains() {
        let (result, env) = tree_walk(&["x = y = a * 2"]);
        assert_eq!(result.unwrap()[0].value, Value::Integer(6));
        assert_eq!(env.get("x"), Value::Integer(6));
        assert_eq!(env.get("y"), Value::Integer(6));
    }

    #[test]
    fn test_property_assignment() {
        let (result, env) = tree_walk(&["order.total = order.qty * 3"]);
        assert_eq!(result.unwrap()[0].value, Value::Integer(12));
        let order = env.get("order");
        let total = order.as_instance().unwrap().borrow().get("total");
        assert_eq!(total, Some(Value::Integer(12)));
    }

    #[test]
    fn test_wrong_arity_at_runtime() {
        let (result, _) = tree_walk(&["abs(1, 2)"]);
        assert!(matches!(
            result.unwrap_err().error,
            RuntimeError::WrongArity { expected: 1, got: 2, .. }
        ));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let (result, _) = tree_walk(&["1 = 2"]);
        assert!(matches!(
            result.unwrap_err().error,
            RuntimeError::InvalidAssignmentTarget
        ));
    }

    #[test]
    fn test_abort_keeps_completed() {
        let (result, env) = tree_walk(&["x = 1", "a.b", "y = 2"]);
        let err = result.unwrap_err();
        assert!(matches!(err.error, RuntimeError::NotAnInstance(ref name) if name == "b"));
        assert_eq!(err.completed, vec![ExResult::ok(Value::Integer(1), 0)]);
        assert_eq!(
            err.failed,
            Some(ExResult::error(1, "Only instances have properties: 'b'"))
        );
        assert_eq!(env.get("y"), Value::Null);
    }

    /// Both modes must agree on values, on environment effects and on errors.
    #[test]
    fn test_modes_agree() {
        let batches: &[&[&str]] = &[
            &["a + d * 2", "s + a + d", "a / 2", "d / 0", "a % 2"],
            &["x = y = a + 1", "z = x * y", "z > 10 && z < 20", "x == y"],
            &["if(a > 2, \"big\", \"small\")", "if(a > 5, 1)", "if(null, 1, if(t, 2, 3))"],
            &["null || 0", "\"\" || \"text\"", "!null", "-d", "t && false || a"],
            &["order.total = order.qty * d", "order.total + 1", "order.missing"],
            &["abs(-a) + abs(-d)", "abs(a - 10) ** 2"],
            &["2 ** 3 ** 2", "-2 ** 2", "10 - 2 - 3", "100 / 10 / 5"],
            &["1 + 1", "1 / 0", "2 + 2"],
            &["a < s"],
            &["a.b = 1"],
        ];

        for batch in batches {
            let (walked, walked_env) = tree_walk(batch);
            let (ran, ran_env) = bytecode(batch);
            match (walked, ran) {
                (Ok(walked), Ok(ran)) => assert_eq!(walked, ran, "batch {:?}", batch),
                (Err(walked), Err(ran)) => {
                    assert_eq!(walked.completed, ran.completed, "batch {:?}", batch);
                    assert_eq!(walked.failed, ran.failed, "batch {:?}", batch);
                    assert_eq!(
                        walked.error.to_string(),
                        ran.error.to_string(),
                        "batch {:?}",
                        batch
                    );
                }
                (walked, ran) => panic!("modes disagree on {:?}: {:?} vs {:?}", batch, walked, ran),
            }
            let mut walked_vars: Vec<_> = walked_env
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect();
            let mut ran_vars: Vec<_> = ran_env
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect();
            walked_vars.sort();
            ran_vars.sort();
            assert_eq!(walked_vars, ran_vars, "batch {:?}", batch);
        }
    }

    #[test]
    fn test_sorted_batch_matches_in_both_modes() {
        let sources = ["x = y = a + b * c", "a = m + n", "b = a * 2", "c = n + w + b"];
        let registry = FunctionRegistry::with_builtins();
        let sorted = analysis::sort(infos(&sources)).unwrap();

        let mut walked_env = DefaultEnvironment::new();
        let mut ran_env = DefaultEnvironment::new();
        for env in [&mut walked_env, &mut ran_env] {
            env.put_int("m", 2);
            env.put_int("n", 4);
            env.put_int("w", 6);
        }

        let walked = Interpreter::new(&registry)
            .execute(&sorted, &mut walked_env)
            .unwrap();
        let chunk = Compiler::compile_batch(&registry, &sorted).unwrap();
        let ran = VM::new().execute(&chunk, &mut ran_env, &registry).unwrap();

        assert_eq!(walked, ran);
        assert_eq!(walked_env.get("x"), Value::Integer(270));
        assert_eq!(ran_env.get("c"), Value::Integer(22));
    }
}
