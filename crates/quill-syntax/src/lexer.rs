//! Lexer for Quill source code.

use crate::token::{Span, Token, TokenKind};

/// Lexer for Quill source code.
///
/// Runs of line breaks (including those inside block comments) collapse
/// into a single [`TokenKind::Newline`], which terminates declarations.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    ch: Option<char>,
    at_newline: bool,
    emitted_any: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Self {
            input,
            pos: 0,
            ch: None,
            at_newline: false,
            emitted_any: false,
        };
        lexer.read_char();
        lexer
    }

    fn read_char(&mut self) {
        self.ch = self.input[self.pos..].chars().next();
        if let Some(c) = self.ch {
            self.pos += c.len_utf8();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Byte offset of the current character.
    fn offset(&self) -> usize {
        match self.ch {
            Some(c) => self.pos - c.len_utf8(),
            None => self.pos,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.ch {
            if c == '\n' {
                self.at_newline = true;
                self.read_char();
            } else if c.is_whitespace() {
                self.read_char();
            } else if c == '/' && self.peek_char() == Some('/') {
                while self.ch.is_some() && self.ch != Some('\n') {
                    self.read_char();
                }
            } else if c == '/' && self.peek_char() == Some('*') {
                self.read_char();
                self.read_char();
                while self.ch.is_some() {
                    if self.ch == Some('*') && self.peek_char() == Some('/') {
                        self.read_char();
                        self.read_char();
                        break;
                    }
                    if self.ch == Some('\n') {
                        self.at_newline = true;
                    }
                    self.read_char();
                }
            } else {
                break;
            }
        }
    }

    fn read_ident(&mut self) -> TokenKind {
        let start = self.offset();
        while let Some(c) = self.ch {
            if c.is_alphanumeric() || c == '_' {
                self.read_char();
            } else {
                break;
            }
        }
        Self::lookup_ident(&self.input[start..self.offset()])
    }

    fn read_number(&mut self) -> TokenKind {
        let start = self.offset();
        while self.ch.is_some_and(|c| c.is_ascii_digit()) {
            self.read_char();
        }
        TokenKind::Int(self.input[start..self.offset()].parse().unwrap_or(0))
    }

    /// Read a single-quoted string literal.
    fn read_string(&mut self) -> TokenKind {
        self.read_char(); // opening '
        let mut result = String::new();

        loop {
            match self.ch {
                None | Some('\n') => return TokenKind::UnterminatedString,
                Some('\'') => {
                    self.read_char();
                    return TokenKind::String(result);
                }
                Some('\\') => {
                    self.read_char();
                    match self.ch {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some(c) => result.push(c),
                        None => return TokenKind::UnterminatedString,
                    }
                    self.read_char();
                }
                Some(c) => {
                    result.push(c);
                    self.read_char();
                }
            }
        }
    }

    fn lookup_ident(ident: &str) -> TokenKind {
        match ident {
            "module" => TokenKind::Module,
            "param" => TokenKind::Param,
            "var" => TokenKind::Var,
            "output" => TokenKind::Output,
            "resource" => TokenKind::Resource,
            _ => TokenKind::Ident(ident.to_string()),
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        if self.at_newline {
            self.at_newline = false;
            // Leading blank lines carry no meaning.
            if self.emitted_any {
                return Token::new(TokenKind::Newline, Span::point(self.offset()));
            }
        }

        let start = self.offset();
        let kind = match self.ch {
            None => TokenKind::Eof,
            Some(c) => match c {
                'a'..='z' | 'A'..='Z' | '_' => self.read_ident(),
                '0'..='9' => self.read_number(),
                '\'' => self.read_string(),
                _ => {
                    self.read_char();
                    match c {
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        '[' => TokenKind::LBracket,
                        ']' => TokenKind::RBracket,
                        '{' => TokenKind::LBrace,
                        '}' => TokenKind::RBrace,
                        '=' => TokenKind::Assign,
                        ':' => TokenKind::Colon,
                        ',' => TokenKind::Comma,
                        '.' => TokenKind::Dot,
                        '+' | '-' | '*' | '/' | '%' | '!' | '<' | '>' | '&' | '|' | '?' | '@' => {
                            TokenKind::Punct(c)
                        }
                        _ => TokenKind::Invalid(c),
                    }
                }
            },
        };

        self.emitted_any = true;
        Token::new(kind, Span::new(start, self.offset()))
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        tokens
    }
}
