use anyhow::Result;
use tracing::debug;

use crate::ast::{BinaryOperator, Expression, Program, Statement};
use crate::backend::{Backend, PreparedBackend};
use crate::runtime::{RuntimeError, Value, Variables};

/// AST-walking backend that evaluates programs directly without compilation.
///
/// It shares the value model with the VM, so both must agree on the final
/// variables of every program.
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepared executable program for the tree-walking interpreter.
pub struct PreparedInterpreter {
    program: Program,
}

impl PreparedInterpreter {
    fn run_once(&self) -> std::result::Result<Variables, RuntimeError> {
        let mut variables = Variables::new();
        exec_statement(&self.program.statement, &mut variables)?;
        debug!("evaluation finished");
        Ok(variables)
    }
}

impl PreparedBackend for PreparedInterpreter {
    fn run(&self) -> Result<Variables> {
        Ok(self.run_once()?)
    }
}

impl Backend for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>> {
        Ok(Box::new(PreparedInterpreter {
            program: program.clone(),
        }))
    }
}

fn exec_statement(
    statement: &Statement,
    variables: &mut Variables,
) -> std::result::Result<(), RuntimeError> {
    match statement {
        Statement::If {
            condition,
            then_branch,
        } => {
            if !eval_expression(condition, variables)?.is_zero() {
                exec_statement(then_branch, variables)?;
            }
        }
        Statement::IfElse {
            condition,
            then_branch,
            else_branch,
        } => {
            if eval_expression(condition, variables)?.is_zero() {
                exec_statement(else_branch, variables)?;
            } else {
                exec_statement(then_branch, variables)?;
            }
        }
        Statement::While { condition, body } => {
            while !eval_expression(condition, variables)?.is_zero() {
                exec_statement(body, variables)?;
            }
        }
        Statement::DoWhile { body, condition } => loop {
            exec_statement(body, variables)?;
            if eval_expression(condition, variables)?.is_zero() {
                break;
            }
        },
        Statement::Empty => {}
        Statement::Sequence { .. } => {
            for item in statement.sequence_items() {
                exec_statement(item, variables)?;
            }
        }
        Statement::Expr(expr) => {
            eval_expression(expr, variables)?;
        }
    }
    Ok(())
}

fn eval_expression(
    expr: &Expression,
    variables: &mut Variables,
) -> std::result::Result<Value, RuntimeError> {
    match expr {
        Expression::Variable(variable) => Ok(variables.get(*variable).clone()),
        Expression::Number(value) => Ok(Value::Number(*value as f64)),
        Expression::String(text) => Ok(Value::String(text.clone())),
        Expression::BinaryOp { .. } => {
            let (first, rest) = expr.operator_chain();
            let mut left = eval_expression(first, variables)?;
            for (op, operand) in rest {
                let right = eval_expression(operand, variables)?;
                left = match op {
                    BinaryOperator::Add => left.add(&right)?,
                    BinaryOperator::Sub => left.sub(&right)?,
                    BinaryOperator::LessThan => left.less_than(&right)?,
                    BinaryOperator::Concat => left.concat(&right),
                };
            }
            Ok(left)
        }
        Expression::Assign { target, value } => {
            let value = eval_expression(value, variables)?;
            variables.set(*target, value.clone());
            Ok(value)
        }
    }
}
