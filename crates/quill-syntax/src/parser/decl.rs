//! Top-level declaration parsing.

use super::{ParseResult, Parser};
use crate::ast::{Item, ModuleDecl, OtherDecl};
use crate::token::{Span, TokenKind};

impl<'a> Parser<'a> {
    pub(super) fn parse_item(&mut self) -> ParseResult<Item> {
        match &self.current.kind {
            TokenKind::Module => Ok(Item::Module(self.parse_module_decl()?)),
            TokenKind::Param => Ok(Item::Other(self.parse_other_decl("param")?)),
            TokenKind::Var => Ok(Item::Other(self.parse_other_decl("var")?)),
            TokenKind::Output => Ok(Item::Other(self.parse_other_decl("output")?)),
            TokenKind::Resource => Ok(Item::Other(self.parse_other_decl("resource")?)),
            _ => Err(self.error("expected declaration")),
        }
    }

    fn parse_module_decl(&mut self) -> ParseResult<ModuleDecl> {
        let start = self.expect(&TokenKind::Module)?;
        let name = self.parse_ident()?;
        let reference = self.parse_string()?;

        let end = if self.cur_is(&TokenKind::Assign) {
            let assign = self.current.span;
            self.next_token();
            self.skip_to_statement_end(assign)?
        } else if self.at_statement_end() {
            reference.span
        } else {
            return Err(self.error("expected '=' or end of line after module reference"));
        };

        Ok(ModuleDecl {
            name,
            reference,
            span: start.to(&end),
        })
    }

    fn parse_other_decl(&mut self, keyword: &'static str) -> ParseResult<OtherDecl> {
        let start = self.current.span;
        self.next_token();
        let name = if matches!(self.current.kind, TokenKind::Ident(_)) {
            Some(self.parse_ident()?)
        } else {
            None
        };
        let last = name.as_ref().map(|n| n.span).unwrap_or(start);
        let end = self.skip_to_statement_end(last)?;

        Ok(OtherDecl {
            keyword,
            name,
            span: start.to(&end),
        })
    }

    /// Consume tokens up to the next newline at bracket depth zero and
    /// return the span of the last consumed token (or `last` if none).
    fn skip_to_statement_end(&mut self, mut last: Span) -> ParseResult<Span> {
        let mut depth = 0usize;
        loop {
            match self.current.kind {
                TokenKind::Eof if depth > 0 => return Err(self.error("unclosed bracket")),
                TokenKind::Eof => return Ok(last),
                TokenKind::Newline if depth == 0 => return Ok(last),
                TokenKind::Newline => {}
                TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen => {
                    depth += 1;
                    last = self.current.span;
                }
                TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen => {
                    if depth == 0 {
                        return Err(self.error(&format!(
                            "unexpected {}",
                            self.current.kind.name()
                        )));
                    }
                    depth -= 1;
                    last = self.current.span;
                }
                _ => last = self.current.span,
            }
            self.next_token();
        }
    }
}
