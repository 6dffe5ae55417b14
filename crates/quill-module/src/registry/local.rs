use std::path::{Path, PathBuf};
use std::sync::Arc;

use quill_common::vfs::normalize_path;
use quill_common::FileSystem;

use super::ModuleRegistry;
use crate::error::{FetchError, Failure};
use crate::reference::LocalReference;

/// Modules referenced by a path relative to the declaring file.
pub struct LocalModuleRegistry {
    fs: Arc<dyn FileSystem>,
}

impl LocalModuleRegistry {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl ModuleRegistry for LocalModuleRegistry {
    type Reference = LocalReference;

    fn parse_reference(&self, raw: &str) -> Result<LocalReference, Failure> {
        LocalReference::parse(raw)
    }

    fn needs_fetch(&self, _reference: &LocalReference) -> bool {
        false
    }

    fn resolve_entry_point(
        &self,
        parent: &Path,
        reference: &LocalReference,
    ) -> Result<PathBuf, Failure> {
        let dir = parent.parent().unwrap_or_else(|| Path::new(""));
        let resolved = normalize_path(&dir.join(reference.path()));
        if self.fs.is_file(&resolved) {
            Ok(resolved)
        } else {
            Err(Failure::PathUnresolvable {
                path: reference.path().to_string(),
                parent: parent.to_path_buf(),
            })
        }
    }

    fn fetch(&self, _references: &[&LocalReference]) -> Vec<FetchError> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_common::MemoryFs;

    fn registry() -> LocalModuleRegistry {
        let fs = MemoryFs::new()
            .with_file("/proj/main.ql", "")
            .with_file("/proj/net/vnet.ql", "")
            .with_file("/shared.ql", "");
        LocalModuleRegistry::new(Arc::new(fs))
    }

    #[test]
    fn test_resolve_relative_to_parent_dir() {
        let registry = registry();
        let parent = Path::new("/proj/main.ql");

        let r = LocalReference::parse("./net/vnet.ql").unwrap();
        assert_eq!(
            registry.resolve_entry_point(parent, &r).unwrap(),
            PathBuf::from("/proj/net/vnet.ql")
        );

        let r = LocalReference::parse("../shared.ql").unwrap();
        assert_eq!(
            registry.resolve_entry_point(parent, &r).unwrap(),
            PathBuf::from("/shared.ql")
        );

        let r = LocalReference::parse("../main.ql").unwrap();
        assert_eq!(
            registry
                .resolve_entry_point(Path::new("/proj/net/vnet.ql"), &r)
                .unwrap(),
            PathBuf::from("/proj/main.ql")
        );
    }

    #[test]
    fn test_missing_file_is_unresolvable() {
        let registry = registry();
        let r = LocalReference::parse("missing.ql").unwrap();
        assert_eq!(
            registry.resolve_entry_point(Path::new("/proj/main.ql"), &r),
            Err(Failure::PathUnresolvable {
                path: "missing.ql".into(),
                parent: "/proj/main.ql".into(),
            })
        );
        assert!(!registry.needs_fetch(&r));
    }
}
