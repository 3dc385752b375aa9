//! Syntax tree shared by the compiler and the reference evaluator.
//!
//! The parser builds these nodes bottom-up; every child is owned by exactly one
//! parent, so the tree has no sharing and no cycles.
//!
//! Two shapes grow as long as the source: a block folds into a left-leaning
//! chain of `Sequence` nodes, and `a + b - c ...` folds into a left-leaning
//! chain of `BinaryOp` nodes. Passes over the tree walk those chains with
//! [`Statement::sequence_items`] and [`Expression::operator_chain`] instead of
//! recursing down them, and `Clone`/`Drop` below do the same.

use std::mem;

pub use crate::token::Variable;

#[derive(Debug, PartialEq)]
pub enum Expression {
    Variable(Variable),
    Number(i64),
    String(String),
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// Assignment is an expression: it yields the stored value.
    Assign {
        target: Variable,
        value: Box<Expression>,
    },
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Concat,
    LessThan,
}

#[derive(Debug, PartialEq)]
pub enum Statement {
    If {
        condition: Expression,
        then_branch: Box<Statement>,
    },
    IfElse {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Box<Statement>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        condition: Expression,
    },
    Empty,
    Sequence {
        first: Box<Statement>,
        second: Box<Statement>,
    },
    Expr(Expression),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub statement: Statement,
}

impl Expression {
    /// Splits a left-leaning chain of binary operators into its leftmost
    /// operand and the `(operator, right operand)` pairs applied to it, in
    /// evaluation order. Any other expression is its own leftmost operand.
    pub fn operator_chain(&self) -> (&Expression, Vec<(BinaryOperator, &Expression)>) {
        let mut rest = Vec::new();
        let mut current = self;
        while let Expression::BinaryOp { left, op, right } = current {
            rest.push((*op, right.as_ref()));
            current = left;
        }
        rest.reverse();
        (current, rest)
    }

    fn take_children(&mut self, pending: &mut Vec<Expression>) {
        match self {
            Expression::BinaryOp { left, right, .. } => {
                pending.push(mem::replace(&mut **left, Expression::Number(0)));
                pending.push(mem::replace(&mut **right, Expression::Number(0)));
            }
            Expression::Assign { value, .. } => {
                pending.push(mem::replace(&mut **value, Expression::Number(0)));
            }
            Expression::Variable(_) | Expression::Number(_) | Expression::String(_) => {}
        }
    }
}

impl Clone for Expression {
    fn clone(&self) -> Self {
        match self {
            Expression::Variable(variable) => Expression::Variable(*variable),
            Expression::Number(value) => Expression::Number(*value),
            Expression::String(text) => Expression::String(text.clone()),
            Expression::BinaryOp { .. } => {
                let (first, rest) = self.operator_chain();
                rest.into_iter()
                    .fold(first.clone(), |left, (op, right)| Expression::BinaryOp {
                        left: Box::new(left),
                        op,
                        right: Box::new(right.clone()),
                    })
            }
            Expression::Assign { target, value } => Expression::Assign {
                target: *target,
                value: value.clone(),
            },
        }
    }
}

impl Drop for Expression {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut expr) = pending.pop() {
            expr.take_children(&mut pending);
        }
    }
}

impl Statement {
    /// The statements of a chain of sequences in execution order. Blocks fold
    /// to the left, so the first item is the chain's innermost `first` (the
    /// empty placeholder for a parsed block). Any other statement yields
    /// itself.
    pub fn sequence_items(&self) -> Vec<&Statement> {
        let mut items = Vec::new();
        let mut current = self;
        while let Statement::Sequence { first, second } = current {
            items.push(second.as_ref());
            current = first;
        }
        items.push(current);
        items.reverse();
        items
    }

    fn take_children(&mut self, pending: &mut Vec<Statement>) {
        match self {
            Statement::If { then_branch, .. } => {
                pending.push(mem::replace(&mut **then_branch, Statement::Empty));
            }
            Statement::IfElse {
                then_branch,
                else_branch,
                ..
            } => {
                pending.push(mem::replace(&mut **then_branch, Statement::Empty));
                pending.push(mem::replace(&mut **else_branch, Statement::Empty));
            }
            Statement::While { body, .. } | Statement::DoWhile { body, .. } => {
                pending.push(mem::replace(&mut **body, Statement::Empty));
            }
            Statement::Sequence { first, second } => {
                pending.push(mem::replace(&mut **first, Statement::Empty));
                pending.push(mem::replace(&mut **second, Statement::Empty));
            }
            Statement::Empty | Statement::Expr(_) => {}
        }
    }
}

impl Clone for Statement {
    fn clone(&self) -> Self {
        match self {
            Statement::If {
                condition,
                then_branch,
            } => Statement::If {
                condition: condition.clone(),
                then_branch: then_branch.clone(),
            },
            Statement::IfElse {
                condition,
                then_branch,
                else_branch,
            } => Statement::IfElse {
                condition: condition.clone(),
                then_branch: then_branch.clone(),
                else_branch: else_branch.clone(),
            },
            Statement::While { condition, body } => Statement::While {
                condition: condition.clone(),
                body: body.clone(),
            },
            Statement::DoWhile { body, condition } => Statement::DoWhile {
                body: body.clone(),
                condition: condition.clone(),
            },
            Statement::Empty => Statement::Empty,
            Statement::Sequence { .. } => {
                let mut items = self.sequence_items().into_iter();
                let head = items.next().map_or(Statement::Empty, Statement::clone);
                items.fold(head, |first, second| Statement::Sequence {
                    first: Box::new(first),
                    second: Box::new(second.clone()),
                })
            }
            Statement::Expr(expr) => Statement::Expr(expr.clone()),
        }
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut statement) = pending.pop() {
            statement.take_children(&mut pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn sequence_items_follow_source_order() {
        let program = parse("{ a = 1; b = 2; c = 3; }").expect("parse should succeed");
        let items = program.statement.sequence_items();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0], &Statement::Empty);
        let targets: Vec<_> = items[1..]
            .iter()
            .map(|item| match item {
                Statement::Expr(Expression::Assign { target, .. }) => target.letter(),
                other => panic!("unexpected statement {other:?}"),
            })
            .collect();
        assert_eq!(targets, ['a', 'b', 'c']);
    }

    #[test]
    fn operator_chain_keeps_evaluation_order() {
        let program = parse("a - 1 + b ' c;").expect("parse should succeed");
        let Statement::Expr(expr) = &program.statement else {
            panic!("expected expression statement");
        };
        let (first, rest) = expr.operator_chain();
        assert!(matches!(first, Expression::Variable(_)));
        let ops: Vec<_> = rest.iter().map(|(op, _)| *op).collect();
        assert_eq!(
            ops,
            [
                BinaryOperator::Sub,
                BinaryOperator::Add,
                BinaryOperator::Concat
            ]
        );
    }

    #[test]
    fn clone_rebuilds_the_same_tree() {
        let program = parse("{ if (a < 1) { b = 1 + 2 + 3; } else c = \"x\" ' d; while (e) ; }")
            .expect("parse should succeed");
        assert_eq!(program.clone(), program);
    }
}
