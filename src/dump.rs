//! Human-readable renderings of the pipeline's intermediate products.

use std::io::{self, Write};

use crate::ast::{BinaryOperator, Expression, Program, Statement};
use crate::bytecode::Bytecode;
use crate::token::{Token, TokenKind};

/// One line per token: its kind, followed by its value when it carries one.
pub fn format_token(token: &Token<'_>) -> String {
    match token.kind {
        TokenKind::Number(value) => format!("number {value}"),
        TokenKind::Identifier(variable) => format!("identifier {variable}"),
        TokenKind::String(text) => format!("string {text:?}"),
        TokenKind::Concat => "'".to_string(),
        TokenKind::EOF => "eof".to_string(),
        other => other.describe().trim_matches('\'').to_string(),
    }
}

/// Indented tree, one node per line, two spaces per level of depth.
pub fn format_tree(program: &Program) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_tree(&mut out, program);
    String::from_utf8_lossy(&out).into_owned()
}

/// Streams the indented tree to `out` as it is walked.
pub fn write_tree<W: Write>(out: &mut W, program: &Program) -> io::Result<()> {
    write_node(out, 0, "program", None)?;
    write_statement(out, 1, &program.statement)
}

/// The program's bytes as a flat list, e.g. `[2, 63, 240, ...]`.
pub fn format_bytecode(bytecode: &Bytecode) -> String {
    format!("{:?}", bytecode.as_bytes())
}

fn write_node<W: Write>(
    out: &mut W,
    depth: usize,
    kind: &str,
    value: Option<&str>,
) -> io::Result<()> {
    let indent = depth * 2;
    match value {
        Some(value) => writeln!(out, "{:indent$}{kind} {value}", ""),
        None => writeln!(out, "{:indent$}{kind}", ""),
    }
}

fn write_statement<W: Write>(out: &mut W, depth: usize, statement: &Statement) -> io::Result<()> {
    match statement {
        Statement::If {
            condition,
            then_branch,
        } => {
            write_node(out, depth, "if", None)?;
            write_expression(out, depth + 1, condition)?;
            write_statement(out, depth + 1, then_branch)
        }
        Statement::IfElse {
            condition,
            then_branch,
            else_branch,
        } => {
            write_node(out, depth, "if-else", None)?;
            write_expression(out, depth + 1, condition)?;
            write_statement(out, depth + 1, then_branch)?;
            write_statement(out, depth + 1, else_branch)
        }
        Statement::While { condition, body } => {
            write_node(out, depth, "while", None)?;
            write_expression(out, depth + 1, condition)?;
            write_statement(out, depth + 1, body)
        }
        Statement::DoWhile { body, condition } => {
            write_node(out, depth, "do-while", None)?;
            write_statement(out, depth + 1, body)?;
            write_expression(out, depth + 1, condition)
        }
        Statement::Empty => write_node(out, depth, "empty", None),
        Statement::Sequence { .. } => {
            // Links print outermost first; the items then unwind from the
            // innermost link back out to `depth + 1`.
            let items = statement.sequence_items();
            let links = items.len() - 1;
            for level in 0..links {
                write_node(out, depth + level, "sequence", None)?;
            }
            for (offset, item) in items.iter().enumerate() {
                write_statement(out, depth + links - offset.saturating_sub(1), item)?;
            }
            Ok(())
        }
        Statement::Expr(expr) => {
            write_node(out, depth, "expression", None)?;
            write_expression(out, depth + 1, expr)
        }
    }
}

fn write_expression<W: Write>(out: &mut W, depth: usize, expr: &Expression) -> io::Result<()> {
    match expr {
        Expression::Variable(variable) => {
            write_node(out, depth, "variable", Some(&variable.to_string()))
        }
        Expression::Number(value) => write_node(out, depth, "constant", Some(&value.to_string())),
        Expression::String(text) => write_node(out, depth, "string", Some(&format!("{text:?}"))),
        Expression::BinaryOp { .. } => {
            let (first, rest) = expr.operator_chain();
            let links = rest.len();
            for (level, (op, _)) in rest.iter().rev().enumerate() {
                write_node(out, depth + level, operator_name(*op), None)?;
            }
            write_expression(out, depth + links, first)?;
            for (offset, (_, operand)) in rest.iter().enumerate() {
                write_expression(out, depth + links - offset, operand)?;
            }
            Ok(())
        }
        Expression::Assign { target, value } => {
            write_node(out, depth, "assign", None)?;
            write_node(out, depth + 1, "variable", Some(&target.to_string()))?;
            write_expression(out, depth + 1, value)
        }
    }
}

fn operator_name(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "add",
        BinaryOperator::Sub => "subtract",
        BinaryOperator::Concat => "concat",
        BinaryOperator::LessThan => "less-than",
    }
}
