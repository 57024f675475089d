// ABOUTME: Error types for the lex/parse/eval pipeline, each carrying a source position

use std::fmt;

use thiserror::Error;

/// A 1-based source position, attached to every diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Pos { line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<line:{},col:{}>", self.line, self.column)
    }
}

#[derive(Error, Debug, Clone)]
#[error("{message}, {pos}")]
pub struct LexError {
    pub message: String,
    pub pos: Pos,
}

impl LexError {
    pub fn new(message: impl Into<String>, pos: Pos) -> Self {
        LexError {
            message: message.into(),
            pos,
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("{message}, {pos}")]
pub struct ParseError {
    pub message: String,
    pub pos: Pos,
}

impl ParseError {
    pub fn new(message: impl Into<String>, pos: Pos) -> Self {
        ParseError {
            message: message.into(),
            pos,
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("{message}, {pos}")]
pub struct ScopeError {
    pub message: String,
    pub pos: Pos,
}

impl ScopeError {
    pub fn new(message: impl Into<String>, pos: Pos) -> Self {
        ScopeError {
            message: message.into(),
            pos,
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("{message}, {pos}")]
pub struct TypeError {
    pub message: String,
    pub pos: Pos,
}

impl TypeError {
    pub fn new(message: impl Into<String>, pos: Pos) -> Self {
        TypeError {
            message: message.into(),
            pos,
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("{message}, {pos}")]
pub struct RuntimeError {
    pub message: String,
    pub pos: Pos,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, pos: Pos) -> Self {
        RuntimeError {
            message: message.into(),
            pos,
        }
    }
}

/// Unifies the five-level error taxonomy so the pipeline stages can each
/// return their own error type and `?`-propagate into one `main` result.
#[derive(Error, Debug, Clone)]
pub enum CouError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl CouError {
    pub fn pos(&self) -> Pos {
        match self {
            CouError::Lex(e) => e.pos,
            CouError::Parse(e) => e.pos,
            CouError::Scope(e) => e.pos,
            CouError::Type(e) => e.pos,
            CouError::Runtime(e) => e.pos,
        }
    }
}
