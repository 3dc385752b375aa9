use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unknown identifier '{word}' at line {line}, column {column}")]
    UnknownIdentifier {
        word: String,
        line: usize,
        column: usize,
    },
    #[error("Invalid integer literal '{literal}' at line {line}, column {column}")]
    InvalidIntegerLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Source is not valid UTF-8 at line {line}, column {column}")]
    InvalidEncoding { line: usize, column: usize },
}

pub type LexResult<T> = Result<T, LexError>;
