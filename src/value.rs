//! Runtime values and the arithmetic rules shared by the VM and the interpreter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::RuntimeError;

/// Serialization tag of each value type. The numbering is part of the chunk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Integer = 1,
    Long = 2,
    Float = 3,
    Double = 4,
    String = 5,
    Boolean = 6,
    Instance = 7,
    Null = 8,
}

impl ValueType {
    pub fn from_tag(tag: u8) -> Option<ValueType> {
        match tag {
            1 => Some(ValueType::Integer),
            2 => Some(ValueType::Long),
            3 => Some(ValueType::Float),
            4 => Some(ValueType::Double),
            5 => Some(ValueType::String),
            6 => Some(ValueType::Boolean),
            7 => Some(ValueType::Instance),
            8 => Some(ValueType::Null),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Integer => "Integer",
            ValueType::Long => "Long",
            ValueType::Float => "Float",
            ValueType::Double => "Double",
            ValueType::String => "String",
            ValueType::Boolean => "Boolean",
            ValueType::Instance => "Instance",
            ValueType::Null => "Null",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A formula value.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i32),
    Double(f64),
    String(String),
    Boolean(bool),
    Null,
    /// Shared object with named properties, owned by the environment holding it
    Instance(Rc<RefCell<Instance>>),
}

impl Value {
    pub fn instance(instance: Instance) -> Self {
        Value::Instance(Rc::new(RefCell::new(instance)))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Null => ValueType::Null,
            Value::Instance(_) => ValueType::Instance,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Null is false, a boolean is itself, a string is true when non-empty, anything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Double(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to doubles.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Rc<RefCell<Instance>>> {
        match self {
            Value::Instance(inst) => Some(inst),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Values are equal only when their types match. Instances compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Instance(inst) => write!(f, "{}", inst.borrow()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(n) => serializer.serialize_i32(*n),
            Value::Double(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Null => serializer.serialize_unit(),
            Value::Instance(inst) => {
                let inst = inst.borrow();
                let mut map = serializer.serialize_map(Some(inst.fields.len()))?;
                for (name, value) in &inst.fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// An object with named properties and an optional class name.
#[derive(Debug, Clone, Default)]
pub struct Instance {
    class_name: Option<String>,
    fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.class_name {
            Some(name) => write!(f, "{} instance", name),
            None => write!(f, "instance"),
        }
    }
}

fn numbers_required(operator: impl fmt::Display, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "operands of '{}' must be numbers, got {} and {}",
        operator,
        left.type_name(),
        right.type_name()
    ))
}

/// Apply a binary operator.
pub fn binary(operator: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match operator {
        BinaryOp::Add => add(left, right),
        BinaryOp::Subtract => arithmetic(operator, left, right, i32::wrapping_sub, |a, b| a - b),
        BinaryOp::Multiply => arithmetic(operator, left, right, i32::wrapping_mul, |a, b| a * b),
        BinaryOp::Divide => {
            if matches!(right, Value::Integer(0)) {
                return Err(RuntimeError::DivisionByZero);
            }
            arithmetic(operator, left, right, i32::wrapping_div, |a, b| a / b)
        }
        BinaryOp::Modulo => {
            if matches!(right, Value::Integer(0)) {
                return Err(RuntimeError::DivisionByZero);
            }
            arithmetic(operator, left, right, i32::wrapping_rem, |a, b| a % b)
        }
        BinaryOp::Power => match (left.as_double(), right.as_double()) {
            (Some(a), Some(b)) => Ok(Value::Double(a.powf(b))),
            _ => Err(numbers_required(operator, left, right)),
        },
        BinaryOp::Equal => Ok(Value::Boolean(left == right)),
        BinaryOp::NotEqual => Ok(Value::Boolean(left != right)),
        BinaryOp::Less => compare(operator, left, right, |a, b| a < b),
        BinaryOp::LessEqual => compare(operator, left, right, |a, b| a <= b),
        BinaryOp::Greater => compare(operator, left, right, |a, b| a > b),
        BinaryOp::GreaterEqual => compare(operator, left, right, |a, b| a >= b),
    }
}

/// Apply a unary operator.
pub fn unary(operator: UnaryOp, operand: &Value) -> Result<Value, RuntimeError> {
    match operator {
        UnaryOp::Not => Ok(Value::Boolean(!operand.is_truthy())),
        UnaryOp::Negate => match operand {
            Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
            Value::Double(n) => Ok(Value::Double(-n)),
            other => Err(RuntimeError::type_error(format!(
                "operand of '-' must be a number, got {}",
                other.type_name()
            ))),
        },
    }
}

fn add(left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let addable = |v: &Value| v.is_number() || matches!(v, Value::String(_));
    if !addable(left) || !addable(right) {
        return Err(RuntimeError::type_error(format!(
            "operands of '+' must be numbers or strings, got {} and {}",
            left.type_name(),
            right.type_name()
        )));
    }
    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        return Ok(Value::String(format!("{}{}", left, right)));
    }
    arithmetic(BinaryOp::Add, left, right, i32::wrapping_add, |a, b| a + b)
}

fn arithmetic(
    operator: BinaryOp,
    left: &Value,
    right: &Value,
    int_op: fn(i32, i32) -> i32,
    double_op: fn(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(int_op(*a, *b))),
        _ => match (left.as_double(), right.as_double()) {
            (Some(a), Some(b)) => Ok(Value::Double(double_op(a, b))),
            _ => Err(numbers_required(operator, left, right)),
        },
    }
}

fn compare(
    operator: BinaryOp,
    left: &Value,
    right: &Value,
    op: fn(f64, f64) -> bool,
) -> Result<Value, RuntimeError> {
    match (left.as_double(), right.as_double()) {
        (Some(a), Some(b)) => Ok(Value::Boolean(op(a, b))),
        _ => Err(numbers_required(operator, left, right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(op: BinaryOp, a: impl Into<Value>, b: impl Into<Value>) -> Value {
        binary(op, &a.into(), &b.into()).unwrap()
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::instance(Instance::new()).is_truthy());
    }

    #[test]
    fn test_add_promotes_and_concatenates() {
        assert_eq!(apply(BinaryOp::Add, 1, 2), Value::Integer(3));
        assert_eq!(apply(BinaryOp::Add, 1, 2.5), Value::Double(3.5));
        assert_eq!(apply(BinaryOp::Add, "a", 1), Value::from("a1"));
        assert_eq!(apply(BinaryOp::Add, 1, "2"), Value::from("12"));
        assert_eq!(apply(BinaryOp::Add, "a", 1.5), Value::from("a1.5"));
    }

    #[test]
    fn test_add_rejects_booleans() {
        let err = binary(BinaryOp::Add, &Value::Boolean(true), &Value::Integer(1)).unwrap_err();
        assert!(matches!(err, RuntimeError::TypeError(_)));
    }

    #[test]
    fn test_integer_division() {
        assert_eq!(apply(BinaryOp::Divide, 7, 2), Value::Integer(3));
        assert_eq!(apply(BinaryOp::Modulo, 7, 2), Value::Integer(1));
        assert!(matches!(
            binary(BinaryOp::Divide, &Value::Integer(1), &Value::Integer(0)),
            Err(RuntimeError::DivisionByZero)
        ));
    }

    #[test]
    fn test_double_division_by_zero_is_not_guarded() {
        let result = apply(BinaryOp::Divide, 1, 0.0);
        assert_eq!(result.as_double(), Some(f64::INFINITY));
    }

    #[test]
    fn test_power_always_double() {
        assert_eq!(apply(BinaryOp::Power, 5, 2), Value::Double(25.0));
    }

    #[test]
    fn test_comparisons_widen_to_double() {
        assert_eq!(apply(BinaryOp::Less, 1, 1.5), Value::Boolean(true));
        assert_eq!(apply(BinaryOp::GreaterEqual, 2, 2), Value::Boolean(true));
        assert!(binary(BinaryOp::Less, &Value::from("a"), &Value::Integer(1)).is_err());
    }

    #[test]
    fn test_equality_requires_matching_types() {
        assert_eq!(apply(BinaryOp::Equal, 1, 1.0), Value::Boolean(false));
        assert_eq!(apply(BinaryOp::Equal, "a", "a"), Value::Boolean(true));
        assert_eq!(
            binary(BinaryOp::Equal, &Value::Null, &Value::Null).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOp::Negate, &Value::Integer(1)).unwrap(), Value::Integer(-1));
        assert_eq!(unary(UnaryOp::Negate, &Value::Double(2.5)).unwrap(), Value::Double(-2.5));
        assert_eq!(unary(UnaryOp::Not, &Value::from("")).unwrap(), Value::Boolean(true));
        assert!(unary(UnaryOp::Negate, &Value::Null).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Double(19.0).to_string(), "19");
        assert_eq!(Value::Double(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::instance(Instance::with_class("Order")).to_string(), "Order instance");
    }

    #[test]
    fn test_value_type_tags() {
        assert_eq!(ValueType::from_tag(5), Some(ValueType::String));
        assert_eq!(ValueType::Double.tag(), 4);
        assert_eq!(ValueType::from_tag(9), None);
    }

    #[test]
    fn test_json_serialization() {
        let mut order = Instance::new();
        order.set("total", Value::Double(9.5));
        assert_eq!(serde_json::to_string(&Value::Integer(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Value::from("x")).unwrap(), "\"x\"");
        assert_eq!(
            serde_json::to_string(&Value::instance(order)).unwrap(),
            r#"{"total":9.5}"#
        );
    }
}
