//! Parser for Quill source code.
//!
//! The parser recognizes top-level declarations and skips their bodies by
//! bracket matching. A declaration ends at the first newline outside of any
//! bracket.

mod decl;

use crate::ast::*;
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};

/// Result type for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse error with message and location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Parser for Quill source code.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    peek: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        let peek = lexer.next_token();
        Self {
            lexer,
            current,
            peek,
        }
    }

    /// Parse a complete source file, recovering at statement boundaries.
    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();

        while !self.at_eof() {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            match self.parse_item() {
                Ok(item) => program.items.push(item),
                Err(err) => {
                    program.errors.push(err);
                    self.recover();
                }
            }
        }

        program
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Token Management
    // ═══════════════════════════════════════════════════════════════════════

    fn next_token(&mut self) {
        self.current = std::mem::replace(&mut self.peek, self.lexer.next_token());
    }

    fn cur_is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn at_eof(&self) -> bool {
        self.cur_is(&TokenKind::Eof)
    }

    fn at_statement_end(&self) -> bool {
        self.cur_is(&TokenKind::Newline) || self.at_eof()
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.cur_is(kind) {
            self.next_token();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Span> {
        if self.cur_is(kind) {
            let span = self.current.span;
            self.next_token();
            Ok(span)
        } else {
            Err(self.error(&format!(
                "expected {}, found {}",
                kind.name(),
                self.current.kind.name()
            )))
        }
    }

    /// Skip to the start of the next statement.
    fn recover(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.current.kind {
                TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen => depth += 1,
                TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::Newline if depth == 0 => {
                    self.next_token();
                    return;
                }
                _ => {}
            }
            self.next_token();
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::new(message, self.current.span)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Common Parsers
    // ═══════════════════════════════════════════════════════════════════════

    fn parse_ident(&mut self) -> ParseResult<Ident> {
        match &self.current.kind {
            TokenKind::Ident(name) => {
                let ident = Ident {
                    name: name.clone(),
                    span: self.current.span,
                };
                self.next_token();
                Ok(ident)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn parse_string(&mut self) -> ParseResult<StringLit> {
        match &self.current.kind {
            TokenKind::String(value) => {
                let lit = StringLit {
                    value: value.clone(),
                    span: self.current.span,
                };
                self.next_token();
                Ok(lit)
            }
            TokenKind::UnterminatedString => Err(self.error("unterminated string")),
            _ => Err(self.error("expected string literal")),
        }
    }
}

/// Parse a Quill source file.
pub fn parse(source: &str) -> Program {
    Parser::new(source).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_modules_in_order() {
        let program = parse(
            "param location string\n\
             module net './net.ql' = {\n  name: 'n'\n}\n\
             module store 'oci:registry.io/infra/store:v1'\n\
             output id string = net.outputs.id\n",
        );

        assert!(program.errors.is_empty(), "{:?}", program.errors);
        assert_eq!(program.items.len(), 4);
        let refs: Vec<_> = program
            .module_decls()
            .map(|m| (m.name.name.as_str(), m.reference.value.as_str()))
            .collect();
        assert_eq!(
            refs,
            vec![("net", "./net.ql"), ("store", "oci:registry.io/infra/store:v1")]
        );
    }

    #[test]
    fn test_module_span_covers_body() {
        let source = "module a './a.ql' = {\n  x: 1\n}\nvar b = 2";
        let program = parse(source);
        let decl = program.module_decls().next().unwrap();
        assert_eq!(&source[decl.span.range()], "module a './a.ql' = {\n  x: 1\n}");
        assert_eq!(&source[decl.reference.span.range()], "'./a.ql'");

        let spans: Vec<&str> = program.items.iter().map(|item| &source[item.span().range()]).collect();
        assert_eq!(spans, vec!["module a './a.ql' = {\n  x: 1\n}", "var b = 2"]);
    }

    #[test]
    fn test_recovers_after_error() {
        let program = parse("module 'missing-name.ql'\nmodule ok './ok.ql'\n$$$\nvar x = 1");

        assert_eq!(program.errors.len(), 2);
        assert_eq!(program.errors[0].message, "expected identifier");
        let names: Vec<_> = program.module_decls().map(|m| m.name.name.clone()).collect();
        assert_eq!(names, vec!["ok".to_string()]);
        assert_eq!(program.items.len(), 2);
    }

    #[test]
    fn test_empty_reference_is_still_a_declaration() {
        let program = parse("module empty ''");
        assert!(program.errors.is_empty());
        assert_eq!(program.module_decls().next().unwrap().reference.value, "");
    }
}
