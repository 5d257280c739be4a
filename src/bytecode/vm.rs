//! Stack-based virtual machine for executing formula chunks.

use tracing::{trace, warn};

use crate::ast::{BinaryOp, UnaryOp};
use crate::bytecode::chunk::{Chunk, ChunkReader};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::result::ExResult;
use crate::environment::Environment;
use crate::error::{AbortedRun, FormatError, RuntimeError};
use crate::functions::FunctionRegistry;
use crate::value::{self, Value};

/// Operand stack slots available to a run unless configured otherwise.
pub const DEFAULT_STACK_CAPACITY: usize = 256;

/// Result type for VM operations.
pub type VMResult<T> = Result<T, RuntimeError>;

/// The virtual machine.
///
/// One VM can execute any number of chunks; the stack and the result list
/// are reset at the start of every run.
#[derive(Debug)]
pub struct VM {
    stack: Vec<Value>,
    capacity: usize,
    results: Vec<ExResult>,
    /// Batch index of the formula being executed, from the last BEGIN
    order: usize,
    /// Between a BEGIN and its END
    in_formula: bool,
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl VM {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STACK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stack: Vec::with_capacity(capacity),
            capacity,
            results: Vec::new(),
            order: 0,
            in_formula: false,
        }
    }

    pub fn stack_capacity(&self) -> usize {
        self.capacity
    }

    /// Run `chunk` against `env`, returning one result per formula in execution order.
    ///
    /// On failure the results of the formulas that completed are carried in the error.
    pub fn execute(
        &mut self,
        chunk: &Chunk,
        env: &mut dyn Environment,
        functions: &FunctionRegistry,
    ) -> Result<Vec<ExResult>, AbortedRun> {
        self.stack.clear();
        self.results.clear();
        self.order = 0;
        self.in_formula = false;

        let outcome = ChunkReader::new(chunk)
            .map_err(RuntimeError::from)
            .and_then(|mut reader| self.run(&mut reader, env, functions));

        let results = std::mem::take(&mut self.results);
        match outcome {
            Ok(()) => Ok(results),
            Err(error) => {
                warn!(order = self.order, completed = results.len(), %error, "run aborted");
                let run = AbortedRun::new(results, error);
                Err(if self.in_formula {
                    run.failed_at(self.order)
                } else {
                    run
                })
            }
        }
    }

    /// Main execution loop.
    fn run(
        &mut self,
        reader: &mut ChunkReader<'_>,
        env: &mut dyn Environment,
        functions: &FunctionRegistry,
    ) -> VMResult<()> {
        loop {
            let position = reader.position();
            let op = reader.read_op()?;
            trace!(position, op = op.name(), depth = self.stack.len(), "execute");

            match op {
                OpCode::Begin => {
                    self.order = reader.read_i32()?.max(0) as usize;
                    self.in_formula = true;
                }

                OpCode::End => {
                    let value = self.pop()?;
                    self.results.push(ExResult::ok(value, self.order));
                    self.in_formula = false;
                }

                OpCode::Constant => {
                    let index = reader.read_i32()?;
                    let value = Self::constant(reader, index)?.clone();
                    self.push(value)?;
                }

                OpCode::Null => self.push(Value::Null)?,
                OpCode::True => self.push(Value::Boolean(true))?,
                OpCode::False => self.push(Value::Boolean(false))?,

                OpCode::Pop => {
                    self.pop()?;
                }

                OpCode::GetGlobal => {
                    let name = Self::name(reader)?;
                    self.push(env.get_or_default(&name, Value::Null))?;
                }

                OpCode::SetGlobal => {
                    let name = Self::name(reader)?;
                    let value = self.peek()?.clone();
                    env.put(&name, value);
                }

                OpCode::GetProperty => {
                    let name = Self::name(reader)?;
                    let value = match self.pop()? {
                        Value::Instance(instance) => {
                            let field = instance.borrow().get(&name);
                            field.unwrap_or(Value::Null)
                        }
                        _ => return Err(RuntimeError::NotAnInstance(name)),
                    };
                    self.push(value)?;
                }

                OpCode::SetProperty => {
                    let name = Self::name(reader)?;
                    let Value::Instance(instance) = self.pop()? else {
                        return Err(RuntimeError::NotAnInstance(name));
                    };
                    let value = self.peek()?.clone();
                    instance.borrow_mut().set(name, value);
                }

                OpCode::EqualEqual => self.binary_op(BinaryOp::Equal)?,
                OpCode::BangEqual => self.binary_op(BinaryOp::NotEqual)?,
                OpCode::Greater => self.binary_op(BinaryOp::Greater)?,
                OpCode::GreaterEqual => self.binary_op(BinaryOp::GreaterEqual)?,
                OpCode::Less => self.binary_op(BinaryOp::Less)?,
                OpCode::LessEqual => self.binary_op(BinaryOp::LessEqual)?,
                OpCode::Add => self.binary_op(BinaryOp::Add)?,
                OpCode::Subtract => self.binary_op(BinaryOp::Subtract)?,
                OpCode::Multiply => self.binary_op(BinaryOp::Multiply)?,
                OpCode::Divide => self.binary_op(BinaryOp::Divide)?,
                OpCode::Mode => self.binary_op(BinaryOp::Modulo)?,
                OpCode::Power => self.binary_op(BinaryOp::Power)?,

                OpCode::Not => self.unary_op(UnaryOp::Not)?,
                OpCode::Negate => self.unary_op(UnaryOp::Negate)?,

                OpCode::Jump => {
                    let offset = reader.read_i32()?;
                    Self::jump(reader, offset)?;
                }

                // The condition stays on the stack; both paths pop it.
                OpCode::JumpIfFalse => {
                    let offset = reader.read_i32()?;
                    if !self.peek()?.is_truthy() {
                        Self::jump(reader, offset)?;
                    }
                }

                OpCode::Call => {
                    let name = Self::name(reader)?;
                    let callable = functions
                        .lookup(&name)
                        .ok_or_else(|| RuntimeError::UnknownFunction(name.clone()))?;
                    let mut arguments = Vec::with_capacity(callable.arity);
                    for _ in 0..callable.arity {
                        arguments.push(self.pop()?);
                    }
                    arguments.reverse();
                    let value = callable
                        .call(arguments)
                        .map_err(|message| RuntimeError::FunctionFailed { name, message })?;
                    self.push(value)?;
                }

                OpCode::GetLocal | OpCode::SetLocal | OpCode::DefineGlobal | OpCode::Return => {
                    return Err(RuntimeError::ReservedOpCode(op.name().to_string()));
                }

                OpCode::Exit => {
                    if !self.stack.is_empty() {
                        return Err(RuntimeError::UnbalancedStack(self.stack.len()));
                    }
                    return Ok(());
                }
            }
        }
    }

    fn constant<'r>(reader: &'r ChunkReader<'_>, index: i32) -> VMResult<&'r Value> {
        usize::try_from(index)
            .ok()
            .and_then(|i| reader.constant(i))
            .ok_or(RuntimeError::Format(FormatError::InvalidConstant(index)))
    }

    /// Read a name operand: the text of the referenced constant.
    fn name(reader: &mut ChunkReader<'_>) -> VMResult<String> {
        let index = reader.read_i32()?;
        Ok(Self::constant(reader, index)?.to_string())
    }

    /// Move the code position by `offset`, relative to the end of the operand just read.
    fn jump(reader: &mut ChunkReader<'_>, offset: i32) -> VMResult<()> {
        let position = reader.position();
        let target = position
            .checked_add_signed(offset as isize)
            .ok_or(FormatError::InvalidJump { offset, position })?;
        reader.set_position(target)?;
        Ok(())
    }

    fn push(&mut self, value: Value) -> VMResult<()> {
        if self.stack.len() >= self.capacity {
            return Err(RuntimeError::StackOverflow(self.capacity));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> VMResult<Value> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn peek(&self) -> VMResult<&Value> {
        self.stack.last().ok_or(RuntimeError::StackUnderflow)
    }

    fn binary_op(&mut self, operator: BinaryOp) -> VMResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = value::binary(operator, &a, &b)?;
        self.push(result)
    }

    fn unary_op(&mut self, operator: UnaryOp) -> VMResult<()> {
        let operand = self.pop()?;
        let result = value::unary(operator, &operand)?;
        self.push(result)
    }
}
