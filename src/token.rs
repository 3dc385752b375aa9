use std::fmt;

/// Number of single-letter variables the language can name.
pub const VARIABLE_COUNT: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

/// A single-letter variable, stored as its position in the alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(u8);

impl Variable {
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < VARIABLE_COUNT).then_some(Self(index))
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        if letter.is_ascii_lowercase() {
            Some(Self(letter as u8 - b'a'))
        } else {
            None
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn letter(self) -> char {
        char::from(b'a' + self.0)
    }

    pub fn all() -> impl Iterator<Item = Variable> {
        (0..VARIABLE_COUNT as u8).map(Self)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind<'a> {
    Number(i64),
    Identifier(Variable),
    String(&'a str),

    // Keywords
    If,
    Else,
    While,
    Do,

    // Operators
    Plus,   // +
    Minus,  // -
    Less,   // <
    Equal,  // =
    Concat, // '

    // Delimiters
    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    Semicolon, // ;

    EOF,
}

impl TokenKind<'_> {
    /// Short human-readable name used in diagnostics and error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Number(_) => "number",
            TokenKind::Identifier(_) => "identifier",
            TokenKind::String(_) => "string",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::Do => "'do'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Less => "'<'",
            TokenKind::Equal => "'='",
            TokenKind::Concat => "'''",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Semicolon => "';'",
            TokenKind::EOF => "end of input",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, span: Span) -> Self {
        Self { kind, span }
    }
}
