//! Lexer, declaration-level AST, and parser for Quill.
//!
//! The module system only needs to know where each `module` declaration
//! is and what reference string it carries; this crate provides exactly
//! that view of a file.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Ident, Item, ModuleDecl, OtherDecl, Program, StringLit, SyntaxTree};
pub use parser::{parse, ParseError, ParseResult, Parser};
