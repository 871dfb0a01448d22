//! Error types for all phases of execution.

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("Invalid escape sequence '\\{0}' at {1}")]
    InvalidEscape(char, Span),

    #[error("Integer literal '{0}' out of range at {1}")]
    IntegerOutOfRange(String, Span),
}

impl LexerError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::InvalidEscape(_, span) => *span,
            Self::IntegerOutOfRange(_, span) => *span,
        }
    }
}

/// Parser errors. The parser records these in order and keeps going; see
/// `Parser::errors`.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Unexpected token '{found}', expected {expected} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("No prefix parser for '{found}' at {span}")]
    NoPrefixParser { found: String, span: Span },

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn no_prefix_parser(found: impl Into<String>, span: Span) -> Self {
        Self::NoPrefixParser {
            found: found.into(),
            span,
        }
    }

    pub fn general(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::NoPrefixParser { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }
}

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        Self::General {
            message: err.to_string(),
            span: err.span(),
        }
    }
}

/// Bytecode compilation errors. Fatal: compilation aborts on the first one.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Undefined variable '{0}' at {1}")]
    UndefinedVariable(String, Span),

    #[error("Variable '{name}' is already defined in this scope at {span}")]
    Redefinition { name: String, span: Span },

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl CompileError {
    pub fn undefined_variable(name: impl Into<String>, span: Span) -> Self {
        Self::UndefinedVariable(name.into(), span)
    }

    pub fn redefinition(name: impl Into<String>, span: Span) -> Self {
        Self::Redefinition {
            name: name.into(),
            span,
        }
    }

    pub fn general(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UndefinedVariable(_, span) => *span,
            Self::Redefinition { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }
}

/// Runtime errors raised by the VM or the tree-walking interpreter.
///
/// Bytecode retains no source positions, so these carry no span.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Stack overflow")]
    StackOverflow,

    #[error("Call frame overflow")]
    FrameOverflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Cannot call value of type {0}")]
    NotCallable(&'static str),

    #[error("Wrong number of arguments: expected {expected}, got {got}")]
    WrongArity { expected: usize, got: usize },

    #[error("Index {index} out of bounds for array of length {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("Unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("{0}")]
    General(String),
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum RunaError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parser error: {0}")]
    Parse(#[from] ParserError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
