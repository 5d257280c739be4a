//! Bytecode compiler: transforms formula ASTs into a chunk.

use std::collections::BTreeSet;

use crate::analysis::ExprInfo;
use crate::ast::{BinaryOp, Expr, ExprKind, Literal, LogicOp, UnaryOp};
use crate::bytecode::chunk::{Chunk, ChunkWriter};
use crate::bytecode::instruction::{OpCode, OPERAND_SIZE};
use crate::error::CompileError;
use crate::functions::FunctionRegistry;
use crate::value::Value;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Placeholder written where a jump offset will be patched in.
const JUMP_PLACEHOLDER: i32 = -1;

/// The bytecode compiler.
///
/// Formulas are compiled one after another into the same chunk, each framed
/// by `BEGIN <order>` and `END`. `end_compile` appends `EXIT` and records
/// which pool entries are variable names.
pub struct Compiler<'r> {
    writer: ChunkWriter,
    /// Every variable read or written by the compiled formulas
    variables: BTreeSet<String>,
    functions: &'r FunctionRegistry,
}

impl<'r> Compiler<'r> {
    pub fn new(functions: &'r FunctionRegistry) -> Self {
        Self {
            writer: ChunkWriter::new(),
            variables: BTreeSet::new(),
            functions,
        }
    }

    pub fn with_capacity(functions: &'r FunctionRegistry, capacity: usize) -> Self {
        Self {
            writer: ChunkWriter::with_capacity(capacity),
            variables: BTreeSet::new(),
            functions,
        }
    }

    /// Compile a whole batch, in the order given.
    pub fn compile_batch(functions: &'r FunctionRegistry, infos: &[ExprInfo]) -> CompileResult<Chunk> {
        let mut compiler = Compiler::with_capacity(functions, infos.len() * 32);
        for info in infos {
            compiler.compile(info)?;
        }
        compiler.end_compile()
    }

    /// Compile one analyzed formula, tagged with its batch index.
    pub fn compile(&mut self, info: &ExprInfo) -> CompileResult<()> {
        self.compile_expr(info.expr(), info.index())?;
        self.variables.extend(info.precursors().iter().cloned());
        self.variables.extend(info.successors().iter().cloned());
        Ok(())
    }

    pub fn compile_expr(&mut self, expr: &Expr, order: usize) -> CompileResult<()> {
        self.emit_op_with(OpCode::Begin, order as i32);
        self.compile_expression(expr)?;
        self.emit_op(OpCode::End);
        Ok(())
    }

    pub fn end_compile(&mut self) -> CompileResult<Chunk> {
        self.emit_op(OpCode::Exit);
        self.writer
            .set_variables(self.variables.iter().map(String::as_str))?;
        self.writer.flush()
    }

    // ===== Expressions =====

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::Literal(literal) => match literal {
                Literal::Boolean(true) => self.emit_op(OpCode::True),
                Literal::Boolean(false) => self.emit_op(OpCode::False),
                Literal::Null => self.emit_op(OpCode::Null),
                other => {
                    let index = self.make_constant(other.to_value())?;
                    self.emit_op_with(OpCode::Constant, index);
                }
            },

            ExprKind::Identifier(name) => {
                let index = self.make_constant(Value::from(name.as_str()))?;
                self.emit_op_with(OpCode::GetGlobal, index);
            }

            ExprKind::Unary { operator, operand } => {
                self.compile_expression(operand)?;
                match operator {
                    UnaryOp::Negate => self.emit_op(OpCode::Negate),
                    UnaryOp::Not => self.emit_op(OpCode::Not),
                }
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                self.emit_op(binary_opcode(*operator));
            }

            ExprKind::Logic {
                left,
                operator,
                right,
            } => {
                self.compile_expression(left)?;
                match operator {
                    LogicOp::And => {
                        let end = self.emit_jump(OpCode::JumpIfFalse);
                        self.emit_op(OpCode::Pop);
                        self.compile_expression(right)?;
                        self.patch_jump(end);
                    }
                    LogicOp::Or => {
                        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
                        let end = self.emit_jump(OpCode::Jump);
                        self.patch_jump(else_jump);
                        self.emit_op(OpCode::Pop);
                        self.compile_expression(right)?;
                        self.patch_jump(end);
                    }
                }
            }

            ExprKind::Assign { target, value } => {
                let ExprKind::Identifier(name) = &target.kind else {
                    return Err(CompileError::InvalidAssignmentTarget(target.span));
                };
                self.compile_expression(value)?;
                let index = self.make_constant(Value::from(name.as_str()))?;
                self.emit_op_with(OpCode::SetGlobal, index);
            }

            ExprKind::Call { name, arguments } => {
                let callable = self
                    .functions
                    .lookup(name)
                    .ok_or_else(|| CompileError::UnknownFunction(name.clone(), expr.span))?;
                if callable.arity != arguments.len() {
                    return Err(CompileError::wrong_arity(
                        name,
                        callable.arity,
                        arguments.len(),
                        expr.span,
                    ));
                }
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                let index = self.make_constant(Value::from(name.as_str()))?;
                self.emit_op_with(OpCode::Call, index);
            }

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.compile_expression(condition)?;
                let else_jump = self.emit_jump(OpCode::JumpIfFalse);
                self.emit_op(OpCode::Pop);
                self.compile_expression(then_branch)?;
                let end = self.emit_jump(OpCode::Jump);
                self.patch_jump(else_jump);
                self.emit_op(OpCode::Pop);
                match else_branch {
                    Some(else_branch) => self.compile_expression(else_branch)?,
                    None => self.emit_op(OpCode::Null),
                }
                self.patch_jump(end);
            }

            ExprKind::Get { object, name } => {
                self.compile_expression(object)?;
                let index = self.make_constant(Value::from(name.as_str()))?;
                self.emit_op_with(OpCode::GetProperty, index);
            }

            // Value first, so the object sits on top when SET_PROPERTY runs.
            ExprKind::Set {
                object,
                name,
                value,
            } => {
                self.compile_expression(value)?;
                self.compile_expression(object)?;
                let index = self.make_constant(Value::from(name.as_str()))?;
                self.emit_op_with(OpCode::SetProperty, index);
            }
        }

        Ok(())
    }

    // ===== Emit helpers =====

    fn emit_op(&mut self, op: OpCode) {
        self.writer.write_op(op);
    }

    fn emit_op_with(&mut self, op: OpCode, operand: i32) {
        self.writer.write_op(op);
        self.writer.write_i32(operand);
    }

    /// Emit a jump with a placeholder offset and return the operand position.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op_with(op, JUMP_PLACEHOLDER);
        self.writer.position() - OPERAND_SIZE
    }

    /// Point the jump at `operand` to the current position, relative to the end of the operand.
    fn patch_jump(&mut self, operand: usize) {
        let offset = self.writer.position() - operand - OPERAND_SIZE;
        self.writer.patch_i32(operand, offset as i32);
    }

    fn make_constant(&mut self, value: Value) -> CompileResult<i32> {
        Ok(self.writer.add_constant(value)? as i32)
    }
}

fn binary_opcode(operator: BinaryOp) -> OpCode {
    match operator {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Subtract => OpCode::Subtract,
        BinaryOp::Multiply => OpCode::Multiply,
        BinaryOp::Divide => OpCode::Divide,
        BinaryOp::Modulo => OpCode::Mode,
        BinaryOp::Power => OpCode::Power,
        BinaryOp::Equal => OpCode::EqualEqual,
        BinaryOp::NotEqual => OpCode::BangEqual,
        BinaryOp::Less => OpCode::Less,
        BinaryOp::LessEqual => OpCode::LessEqual,
        BinaryOp::Greater => OpCode::Greater,
        BinaryOp::GreaterEqual => OpCode::GreaterEqual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::chunk::ChunkReader;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn compile(sources: &[&str]) -> CompileResult<Chunk> {
        let registry = FunctionRegistry::with_builtins();
        let infos: Vec<ExprInfo> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| ExprInfo::new(Parser::parse_source(s).unwrap(), i))
            .collect();
        Compiler::compile_batch(&registry, &infos)
    }

    #[test]
    fn test_formula_framing() {
        let chunk = compile(&["1 + 2"]).unwrap();
        assert_eq!(
            chunk.codes,
            vec![
                29, 0, 0, 0, 0, // BEGIN 0
                0, 0, 0, 0, 0, // CONSTANT 0
                0, 0, 0, 0, 1, // CONSTANT 1
                18, // ADD
                30, // END
                32, // EXIT
            ]
        );
        assert!(chunk.vars.is_empty());
    }

    #[test]
    fn test_keyword_literals_use_opcodes() {
        let chunk = compile(&["true", "false", "null"]).unwrap();
        assert!(chunk.constants.is_empty());
        assert_eq!(chunk.codes[5], OpCode::True as u8);
    }

    #[test]
    fn test_and_jump_is_patched() {
        let chunk = compile(&["a && b"]).unwrap();
        // BEGIN(5) GET a(5) JIF(5) POP(1) GET b(5) END EXIT
        assert_eq!(chunk.codes[10], OpCode::JumpIfFalse as u8);
        assert_eq!(&chunk.codes[11..15], &6i32.to_be_bytes());
        assert_eq!(chunk.codes[21], OpCode::End as u8);
    }

    #[test]
    fn test_if_without_else_pushes_null() {
        let chunk = compile(&["if(a, 1)"]).unwrap();
        let null_at = chunk.codes.len() - 3;
        assert_eq!(chunk.codes[null_at], OpCode::Null as u8);
    }

    #[test]
    fn test_variables_are_marked() {
        let chunk = compile(&["x = a + 1", "A.b = 2"]).unwrap();
        let reader = ChunkReader::new(&chunk).unwrap();
        let mut variables = reader.variables();
        variables.sort();
        assert_eq!(variables, vec!["A.b", "a", "x"]);
    }

    #[test]
    fn test_unknown_function() {
        let err = compile(&["nope(1)"]).unwrap_err();
        assert!(matches!(err, CompileError::UnknownFunction(name, _) if name == "nope"));
    }

    #[test]
    fn test_wrong_arity() {
        let err = compile(&["abs(1, 2)"]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::WrongArity {
                expected: 1,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_assignment_to_non_identifier() {
        let err = compile(&["1 = 2"]).unwrap_err();
        assert!(matches!(err, CompileError::InvalidAssignmentTarget(_)));
    }
}
