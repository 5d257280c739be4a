//! Built-in functions registered by `FunctionRegistry::with_builtins`.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::functions::{Callable, FunctionRegistry, NUMBER_GROUP, SYSTEM_GROUP};
use crate::value::Value;

/// Register all built-in functions.
pub fn register_builtins(registry: &FunctionRegistry) {
    // abs(number) - Absolute value
    registry.register(
        Callable::new("abs", 1, |args| match &args[0] {
            Value::Integer(n) => Ok(Value::Integer(n.wrapping_abs())),
            Value::Double(n) => Ok(Value::Double(n.abs())),
            other => Err(format!("abs() expects number, got {}", other.type_name())),
        })
        .with_title("Absolute value")
        .with_group(NUMBER_GROUP),
    );

    // clock() - Milliseconds since the Unix epoch, as a string
    registry.register(
        Callable::new("clock", 0, |_args| {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|e| e.to_string())?
                .as_millis();
            Ok(Value::String(millis.to_string()))
        })
        .with_title("Current time in milliseconds")
        .with_group(SYSTEM_GROUP),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, String> {
        FunctionRegistry::with_builtins()
            .lookup(name)
            .unwrap()
            .call(args)
    }

    #[test]
    fn test_abs() {
        assert_eq!(call("abs", vec![Value::Integer(-5)]).unwrap(), Value::Integer(5));
        assert_eq!(call("abs", vec![Value::Double(-2.5)]).unwrap(), Value::Double(2.5));
        assert_eq!(call("abs", vec![Value::Integer(3)]).unwrap(), Value::Integer(3));
        assert!(call("abs", vec![Value::from("x")]).is_err());
    }

    #[test]
    fn test_clock_returns_millis_string() {
        let value = call("clock", vec![]).unwrap();
        let millis: u128 = value.as_str().unwrap().parse().unwrap();
        assert!(millis > 1_600_000_000_000);
    }
}
