use thiserror::Error;
use tracing::debug;

use crate::ast::{BinaryOperator, Expression, Program, Statement};
use crate::lexer::{LexError, LexResult, Lexer};
use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Expected {expected}, found {found} at line {line}, column {column}")]
    Expected {
        expected: &'static str,
        found: &'static str,
        line: usize,
        column: usize,
    },
    #[error("Unexpected {found} after program at line {line}, column {column}")]
    TrailingInput {
        found: &'static str,
        line: usize,
        column: usize,
    },
    #[error("Nesting deeper than {limit} levels at line {line}, column {column}")]
    TooDeep {
        limit: usize,
        line: usize,
        column: usize,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Limit on statements and expressions nested inside one another. Sibling
/// statements in a block and operands of one `+`/`-`/`'` chain do not nest.
pub const MAX_NESTING: usize = 128;

/// Recursive-descent parser pulling tokens one at a time from `tokens`.
///
/// Only the current token is buffered; every rule consumes exactly the tokens
/// it commits to, so the parser never backtracks.
pub struct Parser<'a, I> {
    tokens: I,
    current: Token<'a>,
    depth: usize,
}

impl<'a, I> Parser<'a, I>
where
    I: Iterator<Item = LexResult<Token<'a>>>,
{
    pub fn new(mut tokens: I) -> ParseResult<Self> {
        let current = Self::pull(&mut tokens, Span::default())?;
        Ok(Self {
            tokens,
            current,
            depth: 0,
        })
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let statement = self.parse_statement()?;
        if !matches!(self.current.kind, TokenKind::EOF) {
            return Err(ParseError::TrailingInput {
                found: self.current.kind.describe(),
                line: self.current.span.line,
                column: self.current.span.column,
            });
        }
        debug!("parsed program");
        Ok(Program { statement })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.nested(Self::parse_statement_body)
    }

    fn parse_statement_body(&mut self) -> ParseResult<Statement> {
        match self.current.kind {
            TokenKind::If => {
                self.advance()?;
                let condition = self.parse_paren_expression()?;
                let then_branch = Box::new(self.parse_statement()?);
                if matches!(self.current.kind, TokenKind::Else) {
                    self.advance()?;
                    let else_branch = Box::new(self.parse_statement()?);
                    Ok(Statement::IfElse {
                        condition,
                        then_branch,
                        else_branch,
                    })
                } else {
                    Ok(Statement::If {
                        condition,
                        then_branch,
                    })
                }
            }
            TokenKind::While => {
                self.advance()?;
                let condition = self.parse_paren_expression()?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::While { condition, body })
            }
            TokenKind::Do => {
                self.advance()?;
                let body = Box::new(self.parse_statement()?);
                self.expect(TokenKind::While, "'while'")?;
                let condition = self.parse_paren_expression()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Statement::DoWhile { body, condition })
            }
            TokenKind::Semicolon => {
                self.advance()?;
                Ok(Statement::Empty)
            }
            TokenKind::LBrace => {
                self.advance()?;
                let mut block = Statement::Empty;
                loop {
                    match self.current.kind {
                        TokenKind::RBrace => break,
                        TokenKind::EOF => return Err(self.error("'}'")),
                        _ => {
                            let statement = self.parse_statement()?;
                            block = Statement::Sequence {
                                first: Box::new(block),
                                second: Box::new(statement),
                            };
                        }
                    }
                }
                self.advance()?;
                Ok(block)
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Statement::Expr(expr))
            }
        }
    }

    fn parse_paren_expression(&mut self) -> ParseResult<Expression> {
        self.expect(TokenKind::LParen, "'('")?;
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(expr)
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.nested(Self::parse_expression_body)
    }

    fn parse_expression_body(&mut self) -> ParseResult<Expression> {
        let expr = self.parse_test()?;
        match expr {
            Expression::Variable(target) if matches!(self.current.kind, TokenKind::Equal) => {
                self.advance()?;
                let value = self.parse_expression()?;
                Ok(Expression::Assign {
                    target,
                    value: Box::new(value),
                })
            }
            expr => Ok(expr),
        }
    }

    fn parse_test(&mut self) -> ParseResult<Expression> {
        let left = self.parse_summa()?;
        if matches!(self.current.kind, TokenKind::Less) {
            self.advance()?;
            let right = self.parse_summa()?;
            return Ok(Expression::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::LessThan,
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_summa(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                TokenKind::Concat => BinaryOperator::Concat,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_term()?;
            expr = Expression::BinaryOp {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> ParseResult<Expression> {
        let expr = match self.current.kind {
            TokenKind::Identifier(variable) => Expression::Variable(variable),
            TokenKind::Number(value) => Expression::Number(value),
            TokenKind::String(text) => Expression::String(text.to_string()),
            _ => return self.parse_paren_expression(),
        };
        self.advance()?;
        Ok(expr)
    }

    fn nested<T>(&mut self, rule: fn(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth == MAX_NESTING {
            return Err(ParseError::TooDeep {
                limit: MAX_NESTING,
                line: self.current.span.line,
                column: self.current.span.column,
            });
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn expect(&mut self, kind: TokenKind<'a>, expected: &'static str) -> ParseResult<()> {
        if self.current.kind == kind {
            self.advance()?;
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn advance(&mut self) -> ParseResult<()> {
        self.current = Self::pull(&mut self.tokens, self.current.span)?;
        Ok(())
    }

    fn pull(tokens: &mut I, last: Span) -> ParseResult<Token<'a>> {
        match tokens.next() {
            Some(token) => Ok(token?),
            None => Ok(Token::new(TokenKind::EOF, last)),
        }
    }

    fn error(&self, expected: &'static str) -> ParseError {
        ParseError::Expected {
            expected,
            found: self.current.kind.describe(),
            line: self.current.span.line,
            column: self.current.span.column,
        }
    }
}

pub fn parse(input: &str) -> ParseResult<Program> {
    Parser::new(Lexer::new(input))?.parse_program()
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> ParseResult<Program> {
    Parser::new(tokens.into_iter().map(Ok))?.parse_program()
}
