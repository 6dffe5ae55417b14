//! Source files and the map diagnostics are rendered against.
//!
//! A [`SourceFile`] is identified by its path: two loads of the same path
//! denote the same file. The [`SourceMap`] hands out [`FileId`]s and
//! implements [`codespan_reporting::files::Files`].

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codespan_reporting::files::{Error as FilesError, Files};
use rustc_hash::FxHashMap;

use crate::span::BytePos;

/// Index of a file in a [`SourceMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(u32);

/// 1-based line and byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

impl LineCol {
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The text of one file with a line index. Cheap to clone.
#[derive(Clone)]
pub struct SourceFile {
    path: Arc<Path>,
    source: Arc<str>,
    /// Offset of the first byte of every line; always starts with 0.
    lines: Arc<[u32]>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<Arc<str>>) -> Self {
        let source: Arc<str> = source.into();
        let lines = std::iter::once(0)
            .chain(
                source
                    .match_indices('\n')
                    .map(|(offset, _)| offset as u32 + 1),
            )
            .collect();

        Self {
            path: Arc::from(path.into()),
            source,
            lines,
        }
    }

    /// The path the file was read from; also its identity.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 0-based line holding `offset`. Offsets past the end map to the last line.
    pub fn line_index(&self, offset: usize) -> usize {
        self.lines
            .partition_point(|&start| start as usize <= offset)
            .saturating_sub(1)
    }

    /// Byte range of a 0-based line, including its newline.
    pub fn line_range(&self, line: usize) -> Option<Range<usize>> {
        let start = *self.lines.get(line)? as usize;
        let end = self
            .lines
            .get(line + 1)
            .map_or(self.source.len(), |&next| next as usize);
        Some(start..end)
    }

    pub fn line_col(&self, pos: BytePos) -> LineCol {
        let line = self.line_index(pos.to_usize());
        LineCol {
            line: line as u32 + 1,
            column: pos.to_u32() - self.lines[line] + 1,
        }
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("bytes", &self.source.len())
            .finish()
    }
}

/// The files a set of diagnostics may point into.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
    ids: FxHashMap<PathBuf, FileId>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. A path already present keeps its original ID and text.
    pub fn add(&mut self, file: SourceFile) -> FileId {
        if let Some(&id) = self.ids.get(file.path()) {
            return id;
        }
        let id = FileId(self.files.len() as u32);
        self.ids.insert(file.path().to_path_buf(), id);
        self.files.push(file);
        id
    }

    pub fn id_of(&self, path: &Path) -> Option<FileId> {
        self.ids.get(path).copied()
    }

    pub fn get(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0 as usize)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn lookup(&self, id: FileId) -> Result<&SourceFile, FilesError> {
        self.get(id).ok_or(FilesError::FileMissing)
    }
}

impl<'a> Files<'a> for SourceMap {
    type FileId = FileId;
    type Name = String;
    type Source = &'a str;

    fn name(&'a self, id: FileId) -> Result<String, FilesError> {
        Ok(self.lookup(id)?.path().display().to_string())
    }

    fn source(&'a self, id: FileId) -> Result<&'a str, FilesError> {
        Ok(self.lookup(id)?.source())
    }

    fn line_index(&'a self, id: FileId, byte_index: usize) -> Result<usize, FilesError> {
        Ok(self.lookup(id)?.line_index(byte_index))
    }

    fn line_range(&'a self, id: FileId, line_index: usize) -> Result<Range<usize>, FilesError> {
        let file = self.lookup(id)?;
        file.line_range(line_index)
            .ok_or(FilesError::LineTooLarge {
                given: line_index,
                max: file.lines.len() - 1,
            })
    }
}
