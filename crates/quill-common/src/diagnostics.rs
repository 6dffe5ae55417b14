//! Diagnostics.
//!
//! Producers build `codespan_reporting` diagnostics against [`FileId`]s of a
//! [`SourceMap`]; only the CLI decides how and where they are printed.

use codespan_reporting::term::{self, Config};
use termcolor::{ColorChoice, StandardStream};

use crate::source::{FileId, SourceMap};

pub type Diagnostic = codespan_reporting::diagnostic::Diagnostic<FileId>;
pub type Label = codespan_reporting::diagnostic::Label<FileId>;

/// Render diagnostics to stderr.
pub fn emit(map: &SourceMap, diagnostics: &[Diagnostic], color: ColorChoice) -> Result<(), codespan_reporting::files::Error> {
    let writer = StandardStream::stderr(color);
    let config = Config::default();
    let mut lock = writer.lock();
    for diagnostic in diagnostics {
        term::emit(&mut lock, &config, map, diagnostic)?;
    }
    Ok(())
}

/// Render diagnostics to a plain string, for tests and logs.
pub fn render_plain(map: &SourceMap, diagnostics: &[Diagnostic]) -> Result<String, codespan_reporting::files::Error> {
    let mut buffer = termcolor::NoColor::new(Vec::new());
    let config = Config::default();
    for diagnostic in diagnostics {
        term::emit(&mut buffer, &config, map, diagnostic)?;
    }
    Ok(String::from_utf8_lossy(&buffer.into_inner()).into_owned())
}
