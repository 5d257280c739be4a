//! Deduplicated table of literal values and names referenced by bytecode.

use std::collections::HashMap;

use ahash::RandomState;
use tracing::trace;

use crate::bytecode::chunk::ByteCursor;
use crate::error::{CompileError, FormatError};
use crate::value::{Value, ValueType};

/// Longest string the pool can hold; lengths are written as a signed 16-bit number.
pub const MAX_STRING_BYTES: usize = i16::MAX as usize;

/// Ordered constants. Equal values (same type and text form) share one index.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Value>,
    index: HashMap<(ValueType, String), usize, RandomState>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a serialized pool. Entries are kept as written, duplicates included.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut cursor = ByteCursor::new(bytes);
        let mut pool = ConstantPool::new();
        while cursor.remaining() > 0 {
            let value = read_value(&mut cursor)?;
            pool.index
                .entry(key(&value))
                .or_insert(pool.constants.len());
            pool.constants.push(value);
        }
        trace!(constants = pool.constants.len(), "decoded constant pool");
        Ok(pool)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CompileError> {
        let mut bytes = Vec::new();
        for value in &self.constants {
            write_value(value, &mut bytes)?;
        }
        Ok(bytes)
    }

    /// Add a constant and return its index, reusing the index of an equal constant.
    pub fn add(&mut self, value: Value) -> Result<usize, CompileError> {
        check_type(&value)?;
        let key = key(&value);
        if let Some(&index) = self.index.get(&key) {
            return Ok(index);
        }
        let index = self.constants.len();
        self.constants.push(value);
        self.index.insert(key, index);
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.constants.get(index)
    }

    /// Index of the string constant `name`, if present.
    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.index
            .get(&(ValueType::String, name.to_string()))
            .copied()
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

fn key(value: &Value) -> (ValueType, String) {
    (value.value_type(), value.to_string())
}

fn check_type(value: &Value) -> Result<(), CompileError> {
    match value {
        Value::Integer(_) | Value::Double(_) | Value::String(_) | Value::Boolean(_) => Ok(()),
        other => Err(CompileError::UnsupportedConstant(
            other.type_name().to_string(),
        )),
    }
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), CompileError> {
    match value {
        Value::Integer(n) => {
            out.push(ValueType::Integer.tag());
            out.extend_from_slice(&n.to_be_bytes());
        }
        Value::Double(n) => {
            out.push(ValueType::Double.tag());
            out.extend_from_slice(&n.to_be_bytes());
        }
        Value::String(s) => {
            let bytes = s.as_bytes();
            if bytes.len() > MAX_STRING_BYTES {
                return Err(CompileError::StringTooLong(bytes.len()));
            }
            out.push(ValueType::String.tag());
            out.extend_from_slice(&(bytes.len() as i16).to_be_bytes());
            out.extend_from_slice(bytes);
        }
        other => {
            return Err(CompileError::UnsupportedConstant(
                other.type_name().to_string(),
            ))
        }
    }
    Ok(())
}

fn read_value(cursor: &mut ByteCursor<'_>) -> Result<Value, FormatError> {
    let tag = cursor.read_u8()?;
    match ValueType::from_tag(tag) {
        Some(ValueType::Integer) => Ok(Value::Integer(cursor.read_i32()?)),
        Some(ValueType::Double) => Ok(Value::Double(f64::from_be_bytes(cursor.read_array()?))),
        Some(ValueType::String) => {
            let len = i16::from_be_bytes(cursor.read_array()?);
            if len < 0 {
                return Err(FormatError::NegativeLength(len as i32));
            }
            let bytes = cursor.read_bytes(len as usize)?;
            Ok(Value::String(String::from_utf8(bytes.to_vec())?))
        }
        _ => Err(FormatError::UnsupportedTag(tag)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_equal_values_share_an_index() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add(Value::from("a")).unwrap(), 0);
        assert_eq!(pool.add(Value::Integer(1)).unwrap(), 1);
        assert_eq!(pool.add(Value::from("a")).unwrap(), 0);
        assert_eq!(pool.add(Value::Integer(1)).unwrap(), 1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_same_text_different_type_is_distinct() {
        let mut pool = ConstantPool::new();
        let int = pool.add(Value::Integer(1)).unwrap();
        let string = pool.add(Value::from("1")).unwrap();
        assert_ne!(int, string);
        assert_eq!(pool.index_of_name("1"), Some(string));

        let restored = ConstantPool::from_bytes(&pool.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.get(int), Some(&Value::Integer(1)));
        assert_eq!(restored.get(string), Some(&Value::from("1")));
    }

    #[test]
    fn test_null_and_instances_are_rejected() {
        let mut pool = ConstantPool::new();
        assert!(matches!(
            pool.add(Value::Null),
            Err(CompileError::UnsupportedConstant(_))
        ));
    }

    #[test]
    fn test_byte_layout() {
        let mut pool = ConstantPool::new();
        pool.add(Value::Integer(258)).unwrap();
        pool.add(Value::from("ab")).unwrap();
        pool.add(Value::Double(1.5)).unwrap();
        let bytes = pool.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![
                1, 0, 0, 1, 2, // Integer 258
                5, 0, 2, b'a', b'b', // String "ab"
                4, 0x3F, 0xF8, 0, 0, 0, 0, 0, 0, // Double 1.5
            ]
        );

        let restored = ConstantPool::from_bytes(&bytes).unwrap();
        assert_eq!(restored.constants(), pool.constants());
        assert_eq!(restored.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_oversized_string() {
        let mut pool = ConstantPool::new();
        pool.add(Value::String("a".repeat(MAX_STRING_BYTES + 1)))
            .unwrap();
        assert!(matches!(
            pool.to_bytes(),
            Err(CompileError::StringTooLong(32768))
        ));
    }

    #[test]
    fn test_unknown_tag() {
        assert!(matches!(
            ConstantPool::from_bytes(&[99]),
            Err(FormatError::UnsupportedTag(99))
        ));
    }

    #[test]
    fn test_truncated_value() {
        assert!(matches!(
            ConstantPool::from_bytes(&[1, 0, 0]),
            Err(FormatError::Truncated { .. })
        ));
    }
}
