use anyhow::Result;
use thiserror::Error;
use tracing::debug;

use crate::ast::Program;
use crate::backend::{Backend, PreparedBackend};
use crate::bytecode::{Bytecode, DecodeError, Instruction, Literal, compile};
use crate::runtime::{RuntimeError, Value, Variables};

pub type VmResult<T> = std::result::Result<T, VmError>;

/// Failures the VM reports instead of misbehaving. Bytecode produced by
/// [`compile`] from a parsed program only ever hits `Runtime`, and only when
/// arithmetic is applied to a string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("Stack underflow at address {address}")]
    StackUnderflow { address: usize },
    #[error("Program ran past its end without halting")]
    MissingHalt,
}

/// Stack machine executing compiled bytecode against a 26-slot store.
pub struct VM {
    variables: Variables,
    stack: Vec<Value>,
}

pub struct PreparedVM {
    compiled: Bytecode,
}

impl VM {
    pub fn new() -> Self {
        Self {
            variables: Variables::new(),
            stack: Vec::new(),
        }
    }

    /// Runs `program` from address 0 with a zeroed store and returns the store
    /// as it is when `halt` executes.
    pub fn run_compiled(&mut self, program: &Bytecode) -> VmResult<Variables> {
        self.variables = Variables::new();
        self.stack.clear();

        let mut ip = 0;
        let mut steps = 0usize;
        loop {
            if ip >= program.len() {
                return Err(VmError::MissingHalt);
            }
            let address = ip;
            let (instruction, next) = program.decode_at(address)?;
            ip = next;
            steps += 1;
            match instruction {
                Instruction::Fetch(variable) => {
                    self.stack.push(self.variables.get(variable).clone());
                }
                Instruction::Store(variable) => {
                    let value = self
                        .stack
                        .last()
                        .cloned()
                        .ok_or(VmError::StackUnderflow { address })?;
                    self.variables.set(variable, value);
                }
                Instruction::Push(Literal::Number(value)) => self.stack.push(Value::Number(value)),
                Instruction::Push(Literal::String(text)) => self.stack.push(Value::String(text)),
                Instruction::Pop => {
                    self.pop(address)?;
                }
                Instruction::Add => {
                    let (left, right) = self.pop_pair(address)?;
                    self.stack.push(left.add(&right)?);
                }
                Instruction::Sub => {
                    let (left, right) = self.pop_pair(address)?;
                    self.stack.push(left.sub(&right)?);
                }
                Instruction::LessThan => {
                    let (left, right) = self.pop_pair(address)?;
                    self.stack.push(left.less_than(&right)?);
                }
                Instruction::Concat => {
                    let (left, right) = self.pop_pair(address)?;
                    self.stack.push(left.concat(&right));
                }
                Instruction::JumpIfZero(target) => {
                    if self.pop(address)?.is_zero() {
                        ip = target as usize;
                    }
                }
                Instruction::JumpIfNonZero(target) => {
                    if !self.pop(address)?.is_zero() {
                        ip = target as usize;
                    }
                }
                Instruction::Jump(target) => ip = target as usize,
                Instruction::Halt => break,
            }
        }

        debug!(steps, "execution finished");
        Ok(self.variables.clone())
    }

    fn pop(&mut self, address: usize) -> VmResult<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow { address })
    }

    fn pop_pair(&mut self, address: usize) -> VmResult<(Value, Value)> {
        let right = self.pop(address)?;
        let left = self.pop(address)?;
        Ok((left, right))
    }
}

impl Backend for VM {
    fn name(&self) -> &'static str {
        "vm"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>> {
        Ok(Box::new(PreparedVM {
            compiled: compile(program),
        }))
    }
}

impl PreparedBackend for PreparedVM {
    fn run(&self) -> Result<Variables> {
        let mut vm = VM::new();
        Ok(vm.run_compiled(&self.compiled)?)
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Emitter, Opcode};
    use crate::parser::parse;
    use crate::token::Variable;

    fn var(letter: char) -> Variable {
        Variable::from_letter(letter).expect("valid letter")
    }

    fn run(source: &str) -> Variables {
        let program = parse(source).expect("parse should succeed");
        VM::new()
            .run_compiled(&compile(&program))
            .expect("run should succeed")
    }

    #[test]
    fn runs_straight_line_assignments() {
        let variables = run("{ a = 1; b = 2; c = a + b; }");
        assert_eq!(variables.to_string(), "a = 1\nb = 2\nc = 3\n");
    }

    #[test]
    fn runs_while_loop() {
        let variables = run("{ a = 1; b = 2; c = 0; while (a < b) { c = c + 1; a = a + 1; }; }");
        assert_eq!(variables.get(var('a')), &Value::Number(2.0));
        assert_eq!(variables.get(var('c')), &Value::Number(1.0));
    }

    #[test]
    fn concatenates_strings() {
        let variables = run(r#"{ a = "hello"; b = " world"; c = a ' b; }"#);
        assert_eq!(
            variables.get(var('c')),
            &Value::String("hello world".to_string())
        );
    }

    #[test]
    fn takes_the_matching_if_branch() {
        assert_eq!(run("{ if (1 < 2) a = 5; else a = 6; }").to_string(), "a = 5\n");
        assert_eq!(run("{ if (2 < 1) a = 5; else a = 6; }").to_string(), "a = 6\n");
        assert_eq!(run("if (0) a = 5;").to_string(), "");
    }

    #[test]
    fn do_while_runs_body_at_least_once() {
        let variables = run("{ a = 10; do a = a + 1; while (a < 5); }");
        assert_eq!(variables.get(var('a')), &Value::Number(11.0));
    }

    #[test]
    fn chained_assignment_stores_both_targets() {
        let variables = run("a = b = 7;");
        assert_eq!(variables.get(var('a')), &Value::Number(7.0));
        assert_eq!(variables.get(var('b')), &Value::Number(7.0));
    }

    #[test]
    fn subtraction_can_go_negative() {
        let variables = run("{ a = 3 - 5; b = a - a; }");
        assert_eq!(variables.to_string(), "a = -2\n");
    }

    #[test]
    fn each_run_starts_from_a_fresh_store() {
        let program = compile(&parse("a = a + 1;").expect("parse should succeed"));
        let mut vm = VM::new();
        for _ in 0..2 {
            let variables = vm.run_compiled(&program).expect("run should succeed");
            assert_eq!(variables.get(var('a')), &Value::Number(1.0));
        }
    }

    #[test]
    fn reports_type_errors() {
        let program = compile(&parse(r#"a = "x" - 1;"#).expect("parse should succeed"));
        let err = VM::new()
            .run_compiled(&program)
            .expect_err("expected runtime error");
        assert!(matches!(err, VmError::Runtime(_)));
    }

    #[test]
    fn reports_stack_underflow() {
        let mut code = Emitter::new();
        code.emit(Opcode::Add);
        let err = VM::new()
            .run_compiled(&code.finish())
            .expect_err("expected underflow");
        assert_eq!(err, VmError::StackUnderflow { address: 0 });
    }

    #[test]
    fn reports_missing_halt() {
        let mut code = Emitter::new();
        code.emit_number(1.0);
        code.emit(Opcode::Pop);
        let err = VM::new()
            .run_compiled(&code.finish())
            .expect_err("expected missing halt");
        assert_eq!(err, VmError::MissingHalt);
    }
}
