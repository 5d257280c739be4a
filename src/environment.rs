//! Variable storage consulted by the VM and the interpreter.

use std::collections::HashMap;
use std::fmt;

use crate::value::{Instance, Value};

/// Storage for the variables a formula batch reads and writes.
///
/// Implementations are supplied by the caller; nothing here is synchronized.
pub trait Environment {
    /// Value bound to `name`, or `Null`.
    fn get(&self, name: &str) -> Value {
        self.get_or_default(name, Value::Null)
    }

    fn get_or_default(&self, name: &str, default: Value) -> Value;

    fn put(&mut self, name: &str, value: Value);

    fn size(&self) -> usize;

    /// Called with every variable a run references before anything executes.
    /// Returning false aborts the run.
    fn before_execute(&mut self, _fields: &[Field]) -> bool {
        true
    }

    fn put_int(&mut self, name: &str, value: i32) {
        self.put(name, Value::Integer(value));
    }

    fn put_double(&mut self, name: &str, value: f64) {
        self.put(name, Value::Double(value));
    }

    fn put_string(&mut self, name: &str, value: &str) {
        self.put(name, Value::String(value.to_string()));
    }

    fn put_bool(&mut self, name: &str, value: bool) {
        self.put(name, Value::Boolean(value));
    }

    fn put_instance(&mut self, name: &str, instance: Instance) {
        self.put(name, Value::instance(instance));
    }
}

/// HashMap-backed environment.
#[derive(Debug, Clone, Default)]
pub struct DefaultEnvironment {
    values: HashMap<String, Value>,
}

impl DefaultEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl Environment for DefaultEnvironment {
    fn get_or_default(&self, name: &str, default: Value) -> Value {
        self.values.get(name).cloned().unwrap_or(default)
    }

    fn put(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    fn size(&self) -> usize {
        self.values.len()
    }
}

/// A variable path such as `order.customer.name`, stored as a name plus its owner chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    owner: Option<Box<Field>>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
        }
    }

    pub fn with_owner(name: impl Into<String>, owner: Field) -> Self {
        Self {
            name: name.into(),
            owner: Some(Box::new(owner)),
        }
    }

    /// Split a dotted path; the last segment is the field name.
    pub fn from_path(path: &str) -> Self {
        let mut segments = path.split('.');
        let mut field = Field::new(segments.next().unwrap_or_default());
        for segment in segments {
            field = Field::with_owner(segment, field);
        }
        field
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<&Field> {
        self.owner.as_deref()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(owner) = &self.owner {
            write!(f, "{}.", owner)?;
        }
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_variable_is_null() {
        let env = DefaultEnvironment::new();
        assert!(env.get("nope").is_null());
        assert_eq!(env.get_or_default("nope", Value::Integer(3)), Value::Integer(3));
    }

    #[test]
    fn test_typed_setters() {
        let mut env = DefaultEnvironment::new();
        env.put_int("i", 1);
        env.put_double("d", 2.5);
        env.put_string("s", "x");
        env.put_bool("b", true);
        env.put_instance("o", Instance::new());
        assert_eq!(env.size(), 5);
        assert_eq!(env.get("d"), Value::Double(2.5));
        assert!(env.get("o").as_instance().is_some());
        assert!(env.before_execute(&[]));
    }

    #[test]
    fn test_field_from_path() {
        let field = Field::from_path("table1.field1.sub");
        assert_eq!(field.name(), "sub");
        assert_eq!(field.owner().map(Field::name), Some("field1"));
        assert_eq!(
            field.owner().and_then(Field::owner).map(Field::name),
            Some("table1")
        );
        assert_eq!(field.to_string(), "table1.field1.sub");
    }

    #[test]
    fn test_single_segment_field() {
        let field = Field::from_path("price");
        assert!(field.owner().is_none());
        assert_eq!(field.to_string(), "price");
    }

    #[test]
    fn test_nested_field() {
        let field = Field::with_owner("field1", Field::new("table1"));
        assert_eq!(field.to_string(), "table1.field1");
        assert_eq!(field.owner(), Some(&Field::new("table1")));
    }
}
