use std::path::{Path, PathBuf};
use std::sync::Arc;

use quill_common::FileSystem;

use super::ModuleRegistry;
use crate::cache::ArtifactCache;
use crate::error::{FetchError, Failure};
use crate::reference::OciArtifactReference;

/// Modules published as OCI artifacts and restored into an [`ArtifactCache`].
pub struct OciModuleRegistry {
    fs: Arc<dyn FileSystem>,
    cache: Arc<ArtifactCache>,
}

impl OciModuleRegistry {
    pub fn new(fs: Arc<dyn FileSystem>, cache: Arc<ArtifactCache>) -> Self {
        Self { fs, cache }
    }

    #[inline]
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }
}

impl ModuleRegistry for OciModuleRegistry {
    type Reference = OciArtifactReference;

    fn parse_reference(&self, raw: &str) -> Result<OciArtifactReference, Failure> {
        OciArtifactReference::parse(raw)
    }

    fn needs_fetch(&self, reference: &OciArtifactReference) -> bool {
        !self.fs.is_file(&self.cache.entry_point_path(reference))
    }

    fn resolve_entry_point(
        &self,
        _parent: &Path,
        reference: &OciArtifactReference,
    ) -> Result<PathBuf, Failure> {
        Ok(self.cache.entry_point_path(reference))
    }

    fn fetch(&self, references: &[&OciArtifactReference]) -> Vec<FetchError> {
        self.cache.pull_all(references.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ArtifactPuller, PullFailure, ENTRY_POINT_FILE_NAME};
    use quill_common::RealFs;

    struct WritePuller;

    impl ArtifactPuller for WritePuller {
        fn pull(&self, _artifact: &str, target_dir: &Path) -> Result<(), PullFailure> {
            std::fs::write(target_dir.join(ENTRY_POINT_FILE_NAME), "").unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_needs_fetch_until_restored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ArtifactCache::new(dir.path(), Arc::new(WritePuller)));
        let registry = OciModuleRegistry::new(Arc::new(RealFs::default()), cache);
        let r = registry.parse_reference("registry.io/infra/net:v1").unwrap();

        assert!(registry.needs_fetch(&r));
        assert!(registry.fetch(&[&r]).is_empty());
        assert!(!registry.needs_fetch(&r));
        assert_eq!(
            registry.resolve_entry_point(Path::new("/any.ql"), &r).unwrap(),
            dir.path().join("registry.io/infra/net/@v1/main.ql")
        );
    }
}
