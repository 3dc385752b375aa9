use std::{iter::Peekable, str::CharIndices};

use tracing::trace;

use crate::token::{Span, Token, TokenKind, Variable};

pub mod error;

pub use error::{LexError, LexResult};

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 0,
        }
    }

    /// Produces the next token. Once the input is exhausted every further call
    /// yields `EOF` again.
    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        let token = self.scan_token()?;
        trace!(kind = ?token.kind, line = token.span.line, "token");
        Ok(token)
    }

    fn scan_token(&mut self) -> LexResult<Token<'a>> {
        self.skip_whitespace();

        let (start_idx, ch) = match self.chars.peek() {
            Some(&(idx, c)) => (idx, c),
            None => {
                let index = self.current_index();
                return Ok(Token::new(
                    TokenKind::EOF,
                    Span {
                        start: index,
                        end: index,
                        line: self.line,
                        column: self.column,
                    },
                ));
            }
        };

        let start_line = self.line;
        let start_column = self.column;
        if let Some(kind) = punctuation(ch) {
            self.advance_char();
            return Ok(Token::new(
                kind,
                Span {
                    start: start_idx,
                    end: start_idx + 1,
                    line: start_line,
                    column: start_column,
                },
            ));
        }

        match ch {
            '"' => self.read_string(start_idx, start_line, start_column),
            c if c.is_ascii_alphabetic() => self.read_word(start_idx, start_line, start_column),
            c if c.is_ascii_digit() => self.read_number(start_idx, start_line, start_column),
            _ => Err(LexError::UnexpectedCharacter {
                character: ch,
                line: start_line,
                column: start_column,
            }),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphabetic() {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let word = self.input[start..end_idx].to_ascii_lowercase();
        let kind = match keyword(&word) {
            Some(kind) => kind,
            None => {
                let mut letters = word.chars();
                let variable = letters.next().and_then(Variable::from_letter);
                match (variable, letters.next()) {
                    (Some(variable), None) => TokenKind::Identifier(variable),
                    _ => return Err(LexError::UnknownIdentifier { word, line, column }),
                }
            }
        };
        Ok(Token::new(
            kind,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        ))
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let literal = &self.input[start..end_idx];
        let value = literal
            .parse::<i64>()
            .map_err(|_| LexError::InvalidIntegerLiteral {
                literal: literal.to_string(),
                line,
                column,
            })?;
        Ok(Token::new(
            TokenKind::Number(value),
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        ))
    }

    fn read_string(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.advance_char(); // opening quote
        let content_start = start + 1;
        while let Some((idx, c)) = self.advance_char() {
            if c == '"' {
                return Ok(Token::new(
                    TokenKind::String(&self.input[content_start..idx]),
                    Span {
                        start,
                        end: idx + 1,
                        line,
                        column,
                    },
                ));
            }
        }
        Err(LexError::UnterminatedString { line, column })
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

fn keyword(word: &str) -> Option<TokenKind<'static>> {
    match word {
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "while" => Some(TokenKind::While),
        "do" => Some(TokenKind::Do),
        _ => None,
    }
}

fn punctuation(ch: char) -> Option<TokenKind<'static>> {
    let kind = match ch {
        '{' => TokenKind::LBrace,
        '}' => TokenKind::RBrace,
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '<' => TokenKind::Less,
        '=' => TokenKind::Equal,
        ';' => TokenKind::Semicolon,
        '\'' => TokenKind::Concat,
        _ => return None,
    };
    Some(kind)
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_token())
    }
}

/// Decodes raw program bytes, reporting the position of the first invalid
/// UTF-8 sequence the way other lexical errors are reported.
pub fn decode_source(bytes: Vec<u8>) -> LexResult<String> {
    String::from_utf8(bytes).map_err(|err| {
        let valid = &err.as_bytes()[..err.utf8_error().valid_up_to()];
        // The prefix is valid by construction.
        let prefix = std::str::from_utf8(valid).unwrap_or_default();
        let line_start = prefix.rfind('\n').map_or(0, |idx| idx + 1);
        LexError::InvalidEncoding {
            line: prefix.matches('\n').count() + 1,
            column: prefix[line_start..].chars().count(),
        }
    })
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
