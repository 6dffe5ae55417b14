//! File system abstraction.
//!
//! Loaders never touch `std::fs` directly for source text; they read
//! through a [`FileSystem`] so tests and editors can supply files from
//! memory.

use std::io;
use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashMap;

/// Read access to source files.
pub trait FileSystem: Send + Sync {
    /// Read a file as UTF-8 text.
    fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Whether `path` names an existing regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Whether `path` names an existing directory.
    fn is_dir(&self, path: &Path) -> bool;
}

impl<F: FileSystem + ?Sized> FileSystem for &F {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        (**self).read_file(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }
}

/// The host file system. Relative paths are taken relative to `root`.
#[derive(Debug, Clone)]
pub struct RealFs {
    root: PathBuf,
}

impl RealFs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for RealFs {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FileSystem for RealFs {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(self.full_path(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.full_path(path).is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.full_path(path).is_dir()
    }
}

/// An in-memory file system keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: FxHashMap<PathBuf, String>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files
            .insert(normalize_path(path.as_ref()), content.into());
    }

    pub fn remove(&mut self, path: impl AsRef<Path>) -> Option<String> {
        self.files.remove(&normalize_path(path.as_ref()))
    }
}

impl FileSystem for MemoryFs {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("file not found: {}", path.display()),
                )
            })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = normalize_path(path);
        self.files
            .keys()
            .any(|file| file != &dir && file.starts_with(&dir))
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. Does not consult the file system, so symlinks are
/// not resolved. A `..` that would climb above the root is dropped.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    result.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    result.pop();
                } else if !result.has_root() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d.ql")), PathBuf::from("/a/c/d.ql"));
        assert_eq!(normalize_path(Path::new("/../x.ql")), PathBuf::from("/x.ql"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_memory_fs() {
        let fs = MemoryFs::new().with_file("/proj/lib/./util.ql", "module x './y.ql'");

        assert!(fs.is_file(Path::new("/proj/lib/util.ql")));
        assert!(fs.is_dir(Path::new("/proj/lib")));
        assert!(!fs.is_file(Path::new("/proj/lib")));
        assert_eq!(
            fs.read_file(Path::new("/proj/x/../lib/util.ql")).unwrap(),
            "module x './y.ql'"
        );
        let err = fs.read_file(Path::new("/proj/missing.ql")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let mut fs = fs;
        assert_eq!(fs.remove("/proj/x/../lib/util.ql").as_deref(), Some("module x './y.ql'"));
        assert!(!fs.is_file(Path::new("/proj/lib/util.ql")));
        assert!(!fs.is_dir(Path::new("/proj/lib")));
        assert_eq!(fs.remove("/proj/lib/util.ql"), None);
    }

    #[test]
    fn test_real_fs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.ql"), "// empty").unwrap();

        let fs = RealFs::new(dir.path());
        assert!(fs.is_file(Path::new("main.ql")));
        assert!(fs.is_dir(dir.path()));
        assert_eq!(fs.read_file(&dir.path().join("main.ql")).unwrap(), "// empty");
    }
}
