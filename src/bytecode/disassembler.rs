//! Bytecode disassembler for debugging.

use crate::bytecode::chunk::{Chunk, ChunkReader};
use crate::bytecode::instruction::OpCode;
use crate::error::FormatError;

/// Render `chunk` as a listing: a header line, then one line per instruction
/// with its position, opcode, parameter and the formula order in effect.
pub fn disassemble(chunk: &Chunk) -> Result<Vec<String>, FormatError> {
    let mut reader = ChunkReader::new(chunk)?;
    let mut lines = vec![format_line("POSITION", "CODE", "PARAMETER", "ORDER")];
    let mut order = 0;

    loop {
        let position = reader.position().to_string();
        let op = reader.read_op()?;

        let parameter = match op {
            OpCode::Begin => {
                order = reader.read_i32()?;
                order.to_string()
            }
            OpCode::Constant
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::GetProperty
            | OpCode::SetProperty
            | OpCode::Call => {
                let index = reader.read_i32()?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| reader.constant(i))
                    .ok_or(FormatError::InvalidConstant(index))?
                    .to_string()
            }
            OpCode::Jump | OpCode::JumpIfFalse => {
                let offset = reader.read_i32()?;
                format!(":{}->to:{}", offset, reader.position() as i64 + offset as i64)
            }
            // Reserved opcodes still carry an operand.
            other if other.operand_size() > 0 => reader.read_i32()?.to_string(),
            _ => String::new(),
        };

        lines.push(format_line(&position, op.name(), &parameter, &order.to_string()));
        if op == OpCode::Exit {
            return Ok(lines);
        }
    }
}

/// The listing as one string, one instruction per line.
pub fn disassemble_to_string(chunk: &Chunk) -> Result<String, FormatError> {
    let mut output = disassemble(chunk)?.join("\n");
    output.push('\n');
    Ok(output)
}

pub fn print_disassembly(chunk: &Chunk) -> Result<(), FormatError> {
    for line in disassemble(chunk)? {
        println!("{}", line);
    }
    Ok(())
}

fn format_line(position: &str, code: &str, parameter: &str, order: &str) -> String {
    format!(
        "{:<10} {:<20} {:<20} {}",
        truncate(position, 10),
        truncate(code, 18),
        truncate(parameter, 18),
        order
    )
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
