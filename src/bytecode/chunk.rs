//! Bytecode chunk: instruction bytes, constant pool bytes and variable bitset bytes.

use std::io::{Read, Write};

use tracing::debug;

use crate::bytecode::bitset::BitSet;
use crate::bytecode::constant_pool::ConstantPool;
use crate::bytecode::instruction::{OpCode, OPERAND_SIZE};
use crate::error::{CompileError, FormatError, FormulaError};
use crate::value::Value;

/// A compiled formula batch.
///
/// The serialized form is three `(i32 big-endian length, bytes)` sections in
/// the order codes, constants, vars.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    /// The bytecode instructions.
    pub codes: Vec<u8>,
    /// The serialized constant pool.
    pub constants: Vec<u8>,
    /// Bitset over pool indexes marking which constants are variable names.
    pub vars: Vec<u8>,
}

impl Chunk {
    pub fn new(codes: Vec<u8>, constants: Vec<u8>, vars: Vec<u8>) -> Self {
        Self {
            codes,
            constants,
            vars,
        }
    }

    /// Total size of the three sections, without length prefixes.
    pub fn byte_size(&self) -> usize {
        self.codes.len() + self.constants.len() + self.vars.len()
    }

    pub fn codes_size(&self) -> usize {
        self.codes.len()
    }

    pub fn consts_size(&self) -> usize {
        self.constants.len()
    }

    pub fn vars_size(&self) -> usize {
        self.vars.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_size() + 3 * 4);
        for section in [&self.codes, &self.constants, &self.vars] {
            bytes.extend_from_slice(&(section.len() as i32).to_be_bytes());
            bytes.extend_from_slice(section);
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut cursor = ByteCursor::new(bytes);
        let mut read_section = || -> Result<Vec<u8>, FormatError> {
            let len = cursor.read_i32()?;
            if len < 0 {
                return Err(FormatError::NegativeLength(len));
            }
            Ok(cursor.read_bytes(len as usize)?.to_vec())
        };
        let codes = read_section()?;
        let constants = read_section()?;
        let vars = read_section()?;
        if cursor.remaining() > 0 {
            return Err(FormatError::TrailingBytes(cursor.remaining()));
        }
        Ok(Self::new(codes, constants, vars))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, FormulaError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::from_bytes(&bytes)?)
    }
}

/// Big-endian reader over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), FormatError> {
        if position > self.bytes.len() {
            return Err(FormatError::truncated(position, self.bytes.len()));
        }
        self.position = position;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        if len > self.remaining() {
            return Err(FormatError::truncated(len, self.remaining()));
        }
        let bytes = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32, FormatError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }
}

/// Builds a chunk: the code buffer, the constant pool and the variable bitset.
#[derive(Debug, Clone, Default)]
pub struct ChunkWriter {
    codes: Vec<u8>,
    pool: ConstantPool,
    vars: BitSet,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            codes: Vec::with_capacity(capacity.max(128)),
            ..Self::default()
        }
    }

    pub fn write_op(&mut self, op: OpCode) {
        self.codes.push(op.into());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.codes.extend_from_slice(&value.to_be_bytes());
    }

    /// Overwrite the operand starting at `position`.
    pub fn patch_i32(&mut self, position: usize, value: i32) {
        self.codes[position..position + OPERAND_SIZE].copy_from_slice(&value.to_be_bytes());
    }

    pub fn position(&self) -> usize {
        self.codes.len()
    }

    pub fn add_constant(&mut self, value: Value) -> Result<usize, CompileError> {
        self.pool.add(value)
    }

    /// Mark `names` as variables, adding any name the pool does not hold yet.
    pub fn set_variables<'n>(
        &mut self,
        names: impl IntoIterator<Item = &'n str>,
    ) -> Result<(), CompileError> {
        self.vars = BitSet::new();
        for name in names {
            let index = match self.pool.index_of_name(name) {
                Some(index) => index,
                None => self.pool.add(Value::from(name))?,
            };
            self.vars.set(index);
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<Chunk, CompileError> {
        let chunk = Chunk::new(self.codes.clone(), self.pool.to_bytes()?, self.vars.to_bytes());
        debug!(
            codes = chunk.codes_size(),
            consts = chunk.consts_size(),
            vars = chunk.vars_size(),
            "flushed chunk"
        );
        Ok(chunk)
    }
}

/// Decoded view of a chunk: a cursor over the code plus the constant pool and variable bitset.
#[derive(Debug, Clone)]
pub struct ChunkReader<'a> {
    code: ByteCursor<'a>,
    pool: ConstantPool,
    vars: BitSet,
}

impl<'a> ChunkReader<'a> {
    /// Every bit of the vars section must name a pool entry.
    pub fn new(chunk: &'a Chunk) -> Result<Self, FormatError> {
        let pool = ConstantPool::from_bytes(&chunk.constants)?;
        let vars = BitSet::from_bytes(&chunk.vars);
        if vars.len() > pool.len() {
            return Err(FormatError::VariableOutOfRange {
                index: vars.len() - 1,
                pool: pool.len(),
            });
        }
        Ok(Self {
            code: ByteCursor::new(&chunk.codes),
            pool,
            vars,
        })
    }

    pub fn position(&self) -> usize {
        self.code.position()
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), FormatError> {
        self.code.set_position(position)
    }

    pub fn read_op(&mut self) -> Result<OpCode, FormatError> {
        let byte = self.code.read_u8()?;
        OpCode::from_u8(byte).ok_or(FormatError::UnknownOpCode(byte))
    }

    pub fn read_i32(&mut self) -> Result<i32, FormatError> {
        self.code.read_i32()
    }

    pub fn constant(&self, index: usize) -> Option<&Value> {
        self.pool.get(index)
    }

    /// Names of all variables the chunk references.
    pub fn variables(&self) -> Vec<String> {
        self.pool
            .constants()
            .iter()
            .enumerate()
            .filter(|(index, _)| self.vars.get(*index))
            .map(|(_, value)| value.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialized_layout() {
        let chunk = Chunk::new(vec![1, 2, 3], vec![4], vec![]);
        assert_eq!(
            chunk.to_bytes(),
            vec![0, 0, 0, 3, 1, 2, 3, 0, 0, 0, 1, 4, 0, 0, 0, 0]
        );
        assert_eq!(chunk.byte_size(), 4);
    }

    #[test]
    fn test_round_trip() {
        let chunk = Chunk::new(vec![29, 0, 0, 0, 0, 30, 32], vec![5, 0, 1, b'x'], vec![1]);
        let restored = Chunk::from_bytes(&chunk.to_bytes()).unwrap();
        assert_eq!(restored, chunk);
    }

    #[test]
    fn test_truncated_section() {
        let err = Chunk::from_bytes(&[0, 0, 0, 9, 1, 2]).unwrap_err();
        assert!(matches!(err, FormatError::Truncated { needed: 9, remaining: 2 }));
        assert!(Chunk::from_bytes(&[0, 0]).is_err());
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = Chunk::new(vec![32], vec![], vec![]).to_bytes();
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(
            Chunk::from_bytes(&bytes),
            Err(FormatError::TrailingBytes(4))
        ));
    }

    #[test]
    fn test_reader_rejects_vars_beyond_pool() {
        // One string constant, but bit 2 is set.
        let chunk = Chunk::new(vec![32], vec![5, 0, 1, b'x'], vec![0b101]);
        assert!(matches!(
            ChunkReader::new(&chunk),
            Err(FormatError::VariableOutOfRange { index: 2, pool: 1 })
        ));
    }

    #[test]
    fn test_negative_length() {
        let err = Chunk::from_bytes(&[0xff, 0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, FormatError::NegativeLength(-1)));
    }

    #[test]
    fn test_writer_patches_operands() {
        let mut writer = ChunkWriter::new();
        writer.write_op(OpCode::Jump);
        writer.write_i32(-1);
        writer.patch_i32(1, 7);
        assert_eq!(writer.flush().unwrap().codes, vec![26, 0, 0, 0, 7]);
    }

    #[test]
    fn test_reader_lists_variables() {
        let mut writer = ChunkWriter::new();
        writer.add_constant(Value::from("price")).unwrap();
        writer.add_constant(Value::Integer(2)).unwrap();
        writer.set_variables(["price", "qty"]).unwrap();
        let chunk = writer.flush().unwrap();
        assert_eq!(chunk.vars, vec![0b101]);

        let reader = ChunkReader::new(&chunk).unwrap();
        assert_eq!(reader.variables(), vec!["price", "qty"]);
        assert_eq!(reader.constant(1), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_reader_rejects_unknown_opcode() {
        let chunk = Chunk::new(vec![200], vec![], vec![]);
        let mut reader = ChunkReader::new(&chunk).unwrap();
        assert!(matches!(
            reader.read_op(),
            Err(FormatError::UnknownOpCode(200))
        ));
    }
}
