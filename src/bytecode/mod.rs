//! Bytecode compilation and execution for formula batches.
//!
//! # Architecture
//!
//! - `instruction`: OpCode definitions for the instruction set
//! - `constant_pool`: deduplicated literals and names
//! - `bitset`: marks which pool entries are variable names
//! - `chunk`: the serialized chunk plus its writer and reader
//! - `compiler`: transforms analyzed formulas into a chunk
//! - `vm`: stack-based virtual machine
//! - `disassembler`: human-readable listings
//! - `result`: per-formula execution results

pub mod bitset;
pub mod chunk;
pub mod compiler;
pub mod constant_pool;
pub mod disassembler;
pub mod instruction;
pub mod result;
pub mod vm;

pub use bitset::BitSet;
pub use chunk::{ByteCursor, Chunk, ChunkReader, ChunkWriter};
pub use compiler::{CompileResult, Compiler};
pub use constant_pool::ConstantPool;
pub use disassembler::{disassemble, disassemble_to_string, print_disassembly};
pub use instruction::{OpCode, OPERAND_SIZE};
pub use result::{ExResult, ExState};
pub use vm::{DEFAULT_STACK_CAPACITY, VM};
