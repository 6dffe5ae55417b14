//! Shared infrastructure for the Quill toolchain.
//!
//! - [`span`]: byte positions and ranges within a source file
//! - [`source`]: source files, line indexing, and the [`SourceMap`] used for rendering
//! - [`vfs`]: the file system abstraction every loader reads through
//! - [`diagnostics`]: diagnostic aliases and terminal rendering

pub mod diagnostics;
pub mod source;
pub mod span;
pub mod vfs;

pub use diagnostics::{Diagnostic, Label};
pub use source::{FileId, LineCol, SourceFile, SourceMap};
pub use span::{BytePos, Span};
pub use vfs::{FileSystem, MemoryFs, RealFs};
