//! Bytecode format and the single-pass code generator.
//!
//! A program is a flat byte sequence: each instruction is a one-byte opcode
//! followed by its operand bytes.
//!
//! | opcode        | operand                                               |
//! |---------------|-------------------------------------------------------|
//! | `fetch`/`store` | variable index, 1 byte                              |
//! | `push`        | number: `f64`, 8 bytes big-endian                     |
//! |               | string: [`STRING_TAG`], `u32` length LE, UTF-8 bytes  |
//! | `jz`/`jnz`/`jmp` | absolute address, `u32` little-endian              |
//! | others        | none                                                  |
//!
//! Numbers are stored big-endian so their first bytes hold the sign and
//! exponent. A literal is always finite, so its leading bytes can never equal
//! the all-ones exponent pattern of [`STRING_TAG`].

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::ast::{BinaryOperator, Expression, Program, Statement};
use crate::token::Variable;

pub type Address = u32;

/// Marks a `push` operand as a string payload.
pub const STRING_TAG: [u8; 4] = [0x7F, 0xF0, 0x00, 0x00];

const ADDRESS_WIDTH: usize = 4;
const NUMBER_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Fetch = 0,
    Store = 1,
    Push = 2,
    Pop = 3,
    Add = 4,
    Sub = 5,
    LessThan = 6,
    JumpIfZero = 7,
    JumpIfNonZero = 8,
    Jump = 9,
    Halt = 10,
    Concat = 11,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Fetch => "fetch",
            Opcode::Store => "store",
            Opcode::Push => "push",
            Opcode::Pop => "pop",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::LessThan => "lt",
            Opcode::JumpIfZero => "jz",
            Opcode::JumpIfNonZero => "jnz",
            Opcode::Jump => "jmp",
            Opcode::Halt => "halt",
            Opcode::Concat => "concat",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let opcode = match byte {
            0 => Opcode::Fetch,
            1 => Opcode::Store,
            2 => Opcode::Push,
            3 => Opcode::Pop,
            4 => Opcode::Add,
            5 => Opcode::Sub,
            6 => Opcode::LessThan,
            7 => Opcode::JumpIfZero,
            8 => Opcode::JumpIfNonZero,
            9 => Opcode::Jump,
            10 => Opcode::Halt,
            11 => Opcode::Concat,
            other => return Err(other),
        };
        Ok(opcode)
    }
}

/// Operand of a `push`, decoded from its tagged wire form.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Fetch(Variable),
    Store(Variable),
    Push(Literal),
    Pop,
    Add,
    Sub,
    LessThan,
    JumpIfZero(Address),
    JumpIfNonZero(Address),
    Jump(Address),
    Halt,
    Concat,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Fetch(_) => Opcode::Fetch,
            Instruction::Store(_) => Opcode::Store,
            Instruction::Push(_) => Opcode::Push,
            Instruction::Pop => Opcode::Pop,
            Instruction::Add => Opcode::Add,
            Instruction::Sub => Opcode::Sub,
            Instruction::LessThan => Opcode::LessThan,
            Instruction::JumpIfZero(_) => Opcode::JumpIfZero,
            Instruction::JumpIfNonZero(_) => Opcode::JumpIfNonZero,
            Instruction::Jump(_) => Opcode::Jump,
            Instruction::Halt => Opcode::Halt,
            Instruction::Concat => Opcode::Concat,
        }
    }

    /// Target address for jumps, `None` for everything else.
    pub fn jump_target(&self) -> Option<Address> {
        match self {
            Instruction::JumpIfZero(target)
            | Instruction::JumpIfNonZero(target)
            | Instruction::Jump(target) => Some(*target),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.opcode().mnemonic();
        match self {
            Instruction::Fetch(variable) | Instruction::Store(variable) => {
                write!(f, "{mnemonic} {variable}")
            }
            Instruction::Push(Literal::Number(value)) => write!(f, "{mnemonic} {value}"),
            Instruction::Push(Literal::String(text)) => write!(f, "{mnemonic} {text:?}"),
            Instruction::JumpIfZero(target)
            | Instruction::JumpIfNonZero(target)
            | Instruction::Jump(target) => write!(f, "{mnemonic} {target}"),
            _ => f.write_str(mnemonic),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown opcode {opcode} at address {address}")]
    UnknownOpcode { opcode: u8, address: usize },
    #[error("Truncated instruction at address {address}")]
    Truncated { address: usize },
    #[error("Invalid variable index {index} at address {address}")]
    InvalidVariable { index: u8, address: usize },
    #[error("String literal at address {address} is not valid UTF-8")]
    InvalidString { address: usize },
}

/// A finished, immutable bytecode program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bytecode {
    code: Vec<u8>,
}

impl Bytecode {
    pub fn from_bytes(code: Vec<u8>) -> Self {
        Self { code }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Decodes the instruction starting at `address`, returning it together
    /// with the address of the following instruction.
    pub fn decode_at(&self, address: usize) -> Result<(Instruction, usize), DecodeError> {
        let mut reader = Reader {
            code: &self.code,
            start: address,
            position: address,
        };
        let byte = reader.byte()?;
        let opcode = Opcode::try_from(byte)
            .map_err(|opcode| DecodeError::UnknownOpcode { opcode, address })?;
        let instruction = match opcode {
            Opcode::Fetch => Instruction::Fetch(reader.variable()?),
            Opcode::Store => Instruction::Store(reader.variable()?),
            Opcode::Push => Instruction::Push(reader.literal()?),
            Opcode::Pop => Instruction::Pop,
            Opcode::Add => Instruction::Add,
            Opcode::Sub => Instruction::Sub,
            Opcode::LessThan => Instruction::LessThan,
            Opcode::JumpIfZero => Instruction::JumpIfZero(reader.address()?),
            Opcode::JumpIfNonZero => Instruction::JumpIfNonZero(reader.address()?),
            Opcode::Jump => Instruction::Jump(reader.address()?),
            Opcode::Halt => Instruction::Halt,
            Opcode::Concat => Instruction::Concat,
        };
        Ok((instruction, reader.position))
    }

    /// Decodes the whole program into `(address, instruction)` pairs.
    pub fn instructions(&self) -> Result<Vec<(usize, Instruction)>, DecodeError> {
        let mut instructions = Vec::new();
        let mut address = 0;
        while address < self.code.len() {
            let (instruction, next) = self.decode_at(address)?;
            instructions.push((address, instruction));
            address = next;
        }
        Ok(instructions)
    }

    pub fn disassemble(&self) -> Result<String, DecodeError> {
        let listing = self
            .instructions()?
            .into_iter()
            .map(|(address, instruction)| format!("{address:>5}  {instruction}"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(listing)
    }
}

struct Reader<'a> {
    code: &'a [u8],
    start: usize,
    position: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, width: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.position + width;
        let bytes = self
            .code
            .get(self.position..end)
            .ok_or(DecodeError::Truncated {
                address: self.start,
            })?;
        self.position = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut bytes = [0; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn variable(&mut self) -> Result<Variable, DecodeError> {
        let index = self.byte()?;
        Variable::new(index).ok_or(DecodeError::InvalidVariable {
            index,
            address: self.start,
        })
    }

    fn address(&mut self) -> Result<Address, DecodeError> {
        Ok(Address::from_le_bytes(self.array::<ADDRESS_WIDTH>()?))
    }

    fn literal(&mut self) -> Result<Literal, DecodeError> {
        let head = self.array::<4>()?;
        if head == STRING_TAG {
            let len = u32::from_le_bytes(self.array::<4>()?) as usize;
            let text = std::str::from_utf8(self.take(len)?).map_err(|_| {
                DecodeError::InvalidString {
                    address: self.start,
                }
            })?;
            return Ok(Literal::String(text.to_string()));
        }
        let mut bytes = [0; NUMBER_WIDTH];
        bytes[..4].copy_from_slice(&head);
        bytes[4..].copy_from_slice(&self.array::<4>()?);
        Ok(Literal::Number(f64::from_be_bytes(bytes)))
    }
}

/// Placeholder jump operand waiting for its target. Consumed by
/// [`Emitter::patch`], so each slot is written exactly once.
#[must_use = "a forward jump must be patched"]
#[derive(Debug)]
pub struct Patch {
    slot: usize,
}

/// Append-only byte buffer the code generator writes into.
#[derive(Debug, Default)]
pub struct Emitter {
    code: Vec<u8>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the next emitted byte will occupy.
    pub fn position(&self) -> Address {
        self.code.len() as Address
    }

    pub fn emit(&mut self, opcode: Opcode) {
        self.code.push(opcode as u8);
    }

    pub fn emit_variable(&mut self, opcode: Opcode, variable: Variable) {
        self.emit(opcode);
        self.code.push(variable.index());
    }

    pub fn emit_number(&mut self, value: f64) {
        self.emit(Opcode::Push);
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    pub fn emit_string(&mut self, text: &str) {
        self.emit(Opcode::Push);
        self.code.extend_from_slice(&STRING_TAG);
        self.code
            .extend_from_slice(&(text.len() as u32).to_le_bytes());
        self.code.extend_from_slice(text.as_bytes());
    }

    /// Emits a jump to an already known address.
    pub fn emit_jump(&mut self, opcode: Opcode, target: Address) {
        self.emit(opcode);
        self.code.extend_from_slice(&target.to_le_bytes());
    }

    /// Emits a jump whose target is filled in later by [`Emitter::patch`].
    pub fn emit_forward_jump(&mut self, opcode: Opcode) -> Patch {
        self.emit(opcode);
        let slot = self.code.len();
        self.code.extend_from_slice(&[0; ADDRESS_WIDTH]);
        Patch { slot }
    }

    /// Points a forward jump at the current position.
    pub fn patch(&mut self, patch: Patch) {
        let target = self.position().to_le_bytes();
        self.code[patch.slot..patch.slot + ADDRESS_WIDTH].copy_from_slice(&target);
    }

    pub fn finish(self) -> Bytecode {
        Bytecode { code: self.code }
    }
}

pub fn compile(program: &Program) -> Bytecode {
    let mut emitter = Emitter::new();
    compile_statement(&program.statement, &mut emitter);
    emitter.emit(Opcode::Halt);
    let bytecode = emitter.finish();
    debug!(bytes = bytecode.len(), "compiled program");
    bytecode
}

fn compile_statement(statement: &Statement, code: &mut Emitter) {
    match statement {
        Statement::If {
            condition,
            then_branch,
        } => {
            compile_expression(condition, code);
            let skip_then = code.emit_forward_jump(Opcode::JumpIfZero);
            compile_statement(then_branch, code);
            code.patch(skip_then);
        }
        Statement::IfElse {
            condition,
            then_branch,
            else_branch,
        } => {
            compile_expression(condition, code);
            let to_else = code.emit_forward_jump(Opcode::JumpIfZero);
            compile_statement(then_branch, code);
            let to_end = code.emit_forward_jump(Opcode::Jump);
            code.patch(to_else);
            compile_statement(else_branch, code);
            code.patch(to_end);
        }
        Statement::While { condition, body } => {
            let loop_start = code.position();
            compile_expression(condition, code);
            let exit = code.emit_forward_jump(Opcode::JumpIfZero);
            compile_statement(body, code);
            code.emit_jump(Opcode::Jump, loop_start);
            code.patch(exit);
        }
        Statement::DoWhile { body, condition } => {
            let loop_start = code.position();
            compile_statement(body, code);
            compile_expression(condition, code);
            code.emit_jump(Opcode::JumpIfNonZero, loop_start);
        }
        Statement::Empty => {}
        Statement::Sequence { .. } => {
            for item in statement.sequence_items() {
                compile_statement(item, code);
            }
        }
        Statement::Expr(expr) => {
            compile_expression(expr, code);
            code.emit(Opcode::Pop);
        }
    }
}

fn compile_expression(expr: &Expression, code: &mut Emitter) {
    match expr {
        Expression::Variable(variable) => code.emit_variable(Opcode::Fetch, *variable),
        Expression::Number(value) => code.emit_number(*value as f64),
        Expression::String(text) => code.emit_string(text),
        Expression::BinaryOp { .. } => {
            let (first, rest) = expr.operator_chain();
            compile_expression(first, code);
            for (op, operand) in rest {
                compile_expression(operand, code);
                code.emit(match op {
                    BinaryOperator::Add => Opcode::Add,
                    BinaryOperator::Sub => Opcode::Sub,
                    BinaryOperator::Concat => Opcode::Concat,
                    BinaryOperator::LessThan => Opcode::LessThan,
                });
            }
        }
        Expression::Assign { target, value } => {
            compile_expression(value, code);
            code.emit_variable(Opcode::Store, *target);
        }
    }
}
