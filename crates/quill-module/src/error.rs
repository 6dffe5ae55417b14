//! Error types for module resolution.
//!
//! Two layers:
//! - [`Failure`]: a problem with one module declaration. Recorded in the
//!   graph against that declaration; the build carries on.
//! - [`ModuleError`]: a problem that aborts the whole operation.
//!
//! Restore problems are [`FetchError`]s, reported to whoever asked for the
//! restore rather than to any one declaration.

use std::fmt;
use std::io;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use quill_common::Span;

use crate::reference::ReferenceKind;

/// The files forming a reference cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cycle {
    /// A file that references itself.
    SelfReference,
    /// Two or more files, in discovery order; the last references the first.
    Files(Vec<PathBuf>),
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cycle::SelfReference => write!(f, "the file references itself"),
            Cycle::Files(files) => {
                for file in files {
                    write!(f, "\"{}\" -> ", file.display())?;
                }
                match files.first() {
                    Some(first) => write!(f, "\"{}\"", first.display()),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Why a module declaration could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    #[error("the module reference has not been specified")]
    EmptyReference,

    #[error(
        "the module reference scheme \"{scheme}\" is not recognized; specify a relative path or use one of these schemes: {}",
        .available.join(", ")
    )]
    UnknownScheme {
        scheme: String,
        /// Registered schemes, sorted. The empty local scheme is omitted.
        available: Vec<String>,
    },

    #[error("invalid {scheme} module reference \"{reference}\": {reason}")]
    MalformedReference {
        /// `"local"` for relative paths, otherwise the scheme.
        scheme: String,
        reference: String,
        reason: String,
    },

    #[error("the module \"{reference}\" has not been restored; restore it before building")]
    FetchRequired {
        /// Fully qualified reference.
        reference: String,
    },

    #[error("unable to resolve \"{path}\" relative to \"{}\"", .parent.display())]
    PathUnresolvable { path: String, parent: PathBuf },

    #[error("unable to load \"{}\": {message}", .path.display())]
    FileUnreadable { path: PathBuf, message: String },

    #[error("{}", cycle_message(.0))]
    CyclicReference(Cycle),
}

fn cycle_message(cycle: &Cycle) -> String {
    match cycle {
        Cycle::SelfReference => "this module references its own file".to_string(),
        Cycle::Files(_) => format!("this module is part of a reference cycle: {}", cycle),
    }
}

impl Failure {
    pub(crate) fn malformed(scheme: &str, reference: &str, reason: impl Into<String>) -> Self {
        Failure::MalformedReference {
            scheme: scheme.to_string(),
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            Failure::EmptyReference => "QM001",
            Failure::UnknownScheme { .. } => "QM002",
            Failure::MalformedReference { .. } => "QM003",
            Failure::FetchRequired { .. } => "QM004",
            Failure::PathUnresolvable { .. } => "QM005",
            Failure::FileUnreadable { .. } => "QM006",
            Failure::CyclicReference(Cycle::SelfReference) => "QM007",
            Failure::CyclicReference(Cycle::Files(_)) => "QM008",
        }
    }

    /// Build the diagnostic for this failure at a position.
    ///
    /// The file ID type is whatever the caller's file database uses.
    pub fn to_diagnostic<F>(&self, file: F, span: Span) -> Diagnostic<F> {
        Diagnostic::error()
            .with_code(self.code())
            .with_message(self.to_string())
            .with_labels(vec![Label::primary(file, span.range())])
    }
}

/// A restore step that did not populate the cache.
#[derive(Debug, thiserror::Error)]
#[error("unable to restore module \"{reference}\": {kind}")]
pub struct FetchError {
    /// Fully qualified reference.
    pub reference: String,
    pub kind: FetchErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchErrorKind {
    #[error("I/O error at \"{}\": {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("pull failed\n{output}")]
    PullFailed { output: String },

    #[error("the artifact does not contain \"{file_name}\"")]
    MissingEntryPoint { file_name: String },
}

/// Errors that abort a module graph operation.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("unable to load entry file \"{}\": {source}", .path.display())]
    EntryFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A reference kind has no registry wired into the dispatcher.
    #[error("no registry is registered for {0} module references")]
    UnhandledReferenceKind(ReferenceKind),
}

pub type ModuleResult<T> = Result<T, ModuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_scheme_message() {
        let failure = Failure::UnknownScheme {
            scheme: "foo".into(),
            available: vec!["oci".into()],
        };
        assert_eq!(
            failure.to_string(),
            "the module reference scheme \"foo\" is not recognized; specify a relative path or use one of these schemes: oci"
        );
        assert_eq!(failure.code(), "QM002");
    }

    #[test]
    fn test_cycle_message() {
        let cycle = Cycle::Files(vec!["/a.ql".into(), "/b.ql".into()]);
        assert_eq!(
            Failure::CyclicReference(cycle).to_string(),
            "this module is part of a reference cycle: \"/a.ql\" -> \"/b.ql\" -> \"/a.ql\""
        );
        assert_eq!(
            Failure::CyclicReference(Cycle::SelfReference).code(),
            "QM007"
        );
    }

    #[test]
    fn test_to_diagnostic_labels_span() {
        let diagnostic = Failure::EmptyReference.to_diagnostic(7usize, Span::new(3, 5));
        assert_eq!(diagnostic.code.as_deref(), Some("QM001"));
        assert_eq!(diagnostic.labels[0].file_id, 7);
        assert_eq!(diagnostic.labels[0].range, 3..5);
    }
}
