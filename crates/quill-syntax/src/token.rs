//! Token definitions for the Quill lexer.

use std::fmt;

pub use quill_common::Span;

/// A token with its kind and source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Token kinds for Quill.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Ident(String),
    Int(i64),
    /// Single-quoted string, escapes already processed.
    String(String),

    // Declaration keywords
    Module,
    Param,
    Var,
    Output,
    Resource,

    // Delimiters
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }
    Assign,   // =
    Colon,    // :
    Comma,    // ,
    Dot,      // .
    /// Any other operator character; Quill's expression syntax is not
    /// interpreted at this level.
    Punct(char),

    // Special
    Newline,
    Eof,
    Invalid(char),
    UnterminatedString,
}

impl TokenKind {
    /// Get a human-readable name for this token kind.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Ident(_) => "identifier",
            TokenKind::Int(_) => "integer",
            TokenKind::String(_) => "string",
            TokenKind::Module => "module",
            TokenKind::Param => "param",
            TokenKind::Var => "var",
            TokenKind::Output => "output",
            TokenKind::Resource => "resource",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Assign => "=",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Punct(_) => "operator",
            TokenKind::Newline => "newline",
            TokenKind::Eof => "end of file",
            TokenKind::Invalid(_) => "invalid character",
            TokenKind::UnterminatedString => "unterminated string",
        }
    }

    /// Whether this token starts a top-level declaration.
    pub fn is_decl_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Module
                | TokenKind::Param
                | TokenKind::Var
                | TokenKind::Output
                | TokenKind::Resource
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
