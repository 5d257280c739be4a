//! Bytecode instruction definitions for the formula VM.

use std::fmt;

/// Size in bytes of every instruction operand (a big-endian i32).
pub const OPERAND_SIZE: usize = 4;

/// Opcodes for the bytecode virtual machine. The numbering is part of the chunk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // ============ Constants & Stack ============
    /// Load a constant from the constant pool: CONSTANT <index>
    Constant = 0,
    /// Push null onto the stack
    Null,
    /// Push true onto the stack
    True,
    /// Push false onto the stack
    False,
    /// Pop the top value from the stack
    Pop,

    // ============ Variables ============
    /// Reserved: GET_LOCAL <slot>
    GetLocal,
    /// Reserved: SET_LOCAL <slot>
    SetLocal,
    /// Read a variable from the environment: GET_GLOBAL <name_index>
    GetGlobal,
    /// Reserved: DEFINE_GLOBAL <name_index>
    DefineGlobal,
    /// Store the top of the stack into a variable, leaving it there: SET_GLOBAL <name_index>
    SetGlobal,
    /// Pop an instance and push one of its properties: GET_PROPERTY <name_index>
    GetProperty,
    /// Pop an instance and store the value beneath it: SET_PROPERTY <name_index>
    SetProperty,

    // ============ Comparison ============
    /// Equal: a == b
    EqualEqual,
    /// Not equal: a != b
    BangEqual,
    /// Greater than: a > b
    Greater,
    /// Greater or equal: a >= b
    GreaterEqual,
    /// Less than: a < b
    Less,
    /// Less or equal: a <= b
    LessEqual,

    // ============ Arithmetic ============
    /// Add or concatenate: a + b
    Add,
    /// Subtract: a - b
    Subtract,
    /// Multiply: a * b
    Multiply,
    /// Divide: a / b
    Divide,
    /// Modulo: a % b
    Mode,
    /// Power: a ** b
    Power,
    /// Logical not: !a
    Not,
    /// Negate: -a
    Negate,

    // ============ Control Flow ============
    /// Unconditional forward jump: JUMP <offset>
    Jump,
    /// Jump if the top of the stack is falsy, without popping: JUMP_IF_FALSE <offset>
    JumpIfFalse,
    /// Call a registered function: CALL <name_index>
    Call,

    // ============ Formula framing ============
    /// Start of a formula: BEGIN <order>
    Begin,
    /// Pop the formula's value and record it as a result
    End,
    /// Reserved
    Return,
    /// End of the chunk; the stack must be empty
    Exit,
}

const ALL: [OpCode; 33] = [
    OpCode::Constant,
    OpCode::Null,
    OpCode::True,
    OpCode::False,
    OpCode::Pop,
    OpCode::GetLocal,
    OpCode::SetLocal,
    OpCode::GetGlobal,
    OpCode::DefineGlobal,
    OpCode::SetGlobal,
    OpCode::GetProperty,
    OpCode::SetProperty,
    OpCode::EqualEqual,
    OpCode::BangEqual,
    OpCode::Greater,
    OpCode::GreaterEqual,
    OpCode::Less,
    OpCode::LessEqual,
    OpCode::Add,
    OpCode::Subtract,
    OpCode::Multiply,
    OpCode::Divide,
    OpCode::Mode,
    OpCode::Power,
    OpCode::Not,
    OpCode::Negate,
    OpCode::Jump,
    OpCode::JumpIfFalse,
    OpCode::Call,
    OpCode::Begin,
    OpCode::End,
    OpCode::Return,
    OpCode::Exit,
];

impl OpCode {
    /// Number of operand bytes following this opcode.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::DefineGlobal
            | OpCode::SetGlobal
            | OpCode::GetProperty
            | OpCode::SetProperty
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::Call
            | OpCode::Begin => OPERAND_SIZE,
            _ => 0,
        }
    }

    /// Mnemonic used by the disassembler.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "OP_CONSTANT",
            OpCode::Null => "OP_NULL",
            OpCode::True => "OP_TRUE",
            OpCode::False => "OP_FALSE",
            OpCode::Pop => "OP_POP",
            OpCode::GetLocal => "OP_GET_LOCAL",
            OpCode::SetLocal => "OP_SET_LOCAL",
            OpCode::GetGlobal => "OP_GET_GLOBAL",
            OpCode::DefineGlobal => "OP_DEFINE_GLOBAL",
            OpCode::SetGlobal => "OP_SET_GLOBAL",
            OpCode::GetProperty => "OP_GET_PROPERTY",
            OpCode::SetProperty => "OP_SET_PROPERTY",
            OpCode::EqualEqual => "OP_EQUAL_EQUAL",
            OpCode::BangEqual => "OP_BANG_EQUAL",
            OpCode::Greater => "OP_GREATER",
            OpCode::GreaterEqual => "OP_GREATER_EQUAL",
            OpCode::Less => "OP_LESS",
            OpCode::LessEqual => "OP_LESS_EQUAL",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
            OpCode::Mode => "OP_MODE",
            OpCode::Power => "OP_POWER",
            OpCode::Not => "OP_NOT",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Jump => "OP_JUMP",
            OpCode::JumpIfFalse => "OP_JUMP_IF_FALSE",
            OpCode::Call => "OP_CALL",
            OpCode::Begin => "OP_BEGIN",
            OpCode::End => "OP_END",
            OpCode::Return => "OP_RETURN",
            OpCode::Exit => "OP_EXIT",
        }
    }

    /// Opcodes the compiler never emits and the VM refuses to run.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            OpCode::GetLocal | OpCode::SetLocal | OpCode::DefineGlobal | OpCode::Return
        )
    }

    /// Convert from u8 to OpCode.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        ALL.get(byte as usize).copied()
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for i in 0..=OpCode::Exit as u8 {
            let op = OpCode::from_u8(i).expect("valid opcode");
            assert_eq!(i, op as u8);
        }
    }

    #[test]
    fn test_numbering_is_stable() {
        assert_eq!(OpCode::GetGlobal as u8, 7);
        assert_eq!(OpCode::SetGlobal as u8, 9);
        assert_eq!(OpCode::Mode as u8, 22);
        assert_eq!(OpCode::JumpIfFalse as u8, 27);
        assert_eq!(OpCode::Begin as u8, 29);
        assert_eq!(OpCode::Exit as u8, 32);
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(OpCode::from_u8(33).is_none());
        assert!(OpCode::from_u8(255).is_none());
    }

    #[test]
    fn test_names_and_operands() {
        assert_eq!(OpCode::JumpIfFalse.name(), "OP_JUMP_IF_FALSE");
        assert_eq!(OpCode::Begin.operand_size(), 4);
        assert_eq!(OpCode::Add.operand_size(), 0);
        assert!(OpCode::Return.is_reserved());
        assert!(!OpCode::Call.is_reserved());
    }
}
