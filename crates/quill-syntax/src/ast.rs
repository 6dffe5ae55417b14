//! Declaration-level AST for Quill.
//!
//! Only top-level declarations are modelled. The bodies of declarations are
//! kept as spans; the module system needs nothing more. Module declarations
//! cannot nest, so walking [`Program::items`] visits every one of them.

use std::path::Path;
use std::sync::Arc;

use quill_common::{SourceFile, Span};

use crate::parser::ParseError;

/// An identifier with its span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// A string literal with its processed value and the span of the literal,
/// quotes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLit {
    pub value: String,
    pub span: Span,
}

/// `module <name> '<reference>' [= <body>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    pub name: Ident,
    /// The module reference exactly as written.
    pub reference: StringLit,
    pub span: Span,
}

/// Any other top-level declaration (`param`, `var`, `output`, `resource`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherDecl {
    pub keyword: &'static str,
    pub name: Option<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Module(ModuleDecl),
    Other(OtherDecl),
}

impl Item {
    pub fn span(&self) -> Span {
        match self {
            Item::Module(decl) => decl.span,
            Item::Other(decl) => decl.span,
        }
    }
}

/// A parsed Quill file. Parsing always succeeds; problems are collected in
/// `errors` and the offending statement is skipped.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Item>,
    pub errors: Vec<ParseError>,
}

impl Program {
    /// Module declarations in source order.
    pub fn module_decls(&self) -> impl Iterator<Item = &ModuleDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Module(decl) => Some(decl),
            Item::Other(_) => None,
        })
    }
}

/// A source file together with its parsed program.
///
/// Created once per distinct path and shared behind an `Arc` by every module
/// declaration that resolves to it.
#[derive(Debug)]
pub struct SyntaxTree {
    pub file: SourceFile,
    pub program: Program,
}

impl SyntaxTree {
    pub fn parse(path: impl Into<std::path::PathBuf>, source: impl Into<Arc<str>>) -> Self {
        let file = SourceFile::new(path, source);
        let program = crate::parser::parse(file.source());
        Self { file, program }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn module_decls(&self) -> impl Iterator<Item = &ModuleDecl> {
        self.program.module_decls()
    }
}
