//! Build a module graph, restoring remote modules on the way.

use std::path::Path;
use std::sync::Arc;

use quill_common::{FileSystem, RealFs};
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::cache::ArtifactCache;
use crate::collect::collect_external_references;
use crate::config::ModuleConfig;
use crate::dispatcher::RegistryDispatcher;
use crate::error::{FetchError, ModuleResult};
use crate::graph::{GraphBuilder, ResolutionGraph};
use crate::reference::ModuleReference;

/// Result of [`ModuleLoader::load`].
#[derive(Debug)]
pub struct LoadOutcome {
    pub graph: ResolutionGraph,
    /// Modules that could not be restored.
    pub fetch_errors: Vec<FetchError>,
    /// How many distinct references were pulled or attempted.
    pub restored: usize,
}

/// Ties a file system and a dispatcher together.
pub struct ModuleLoader {
    fs: Arc<dyn FileSystem>,
    dispatcher: RegistryDispatcher,
}

impl ModuleLoader {
    pub fn new(fs: Arc<dyn FileSystem>, dispatcher: RegistryDispatcher) -> Self {
        Self { fs, dispatcher }
    }

    /// The host file system with the standard registries.
    pub fn from_config(config: &ModuleConfig) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFs::default());
        let cache = Arc::new(ArtifactCache::from_config(config));
        let dispatcher = RegistryDispatcher::standard(fs.clone(), cache);
        Self::new(fs, dispatcher)
    }

    #[inline]
    pub fn dispatcher(&self) -> &RegistryDispatcher {
        &self.dispatcher
    }

    /// Build once, without restoring anything.
    pub fn build(&self, entry: &Path) -> ModuleResult<ResolutionGraph> {
        GraphBuilder::new(&*self.fs, &self.dispatcher).build(entry)
    }

    /// Restore every external module `graph` references that is not yet in
    /// the cache.
    pub fn restore(&self, graph: &ResolutionGraph) -> ModuleResult<Vec<FetchError>> {
        let pending = self.unrestored(graph, &FxHashSet::default())?;
        self.dispatcher.fetch_all(&pending)
    }

    /// Build the graph rooted at `entry`. With `restore`, missing remote
    /// modules are pulled and the graph rebuilt, until no new module needs
    /// pulling. Restored modules may declare further remote modules, so this
    /// can take several rounds.
    pub fn load(&self, entry: &Path, restore: bool) -> ModuleResult<LoadOutcome> {
        let mut graph = self.build(entry)?;
        let mut fetch_errors = Vec::new();
        let mut attempted: FxHashSet<ModuleReference> = FxHashSet::default();

        while restore && graph.requires_fetch() {
            let pending = self.unrestored(&graph, &attempted)?;
            if pending.is_empty() {
                break;
            }

            info!(count = pending.len(), "restoring modules");
            fetch_errors.extend(self.dispatcher.fetch_all(&pending)?);
            attempted.extend(pending);

            graph = GraphBuilder::new(&*self.fs, &self.dispatcher)
                .with_seed(&graph)
                .build(entry)?;
        }

        debug!(
            files = graph.file_count(),
            restored = attempted.len(),
            failed = fetch_errors.len(),
            "load finished"
        );
        Ok(LoadOutcome {
            graph,
            fetch_errors,
            restored: attempted.len(),
        })
    }

    fn unrestored(
        &self,
        graph: &ResolutionGraph,
        skip: &FxHashSet<ModuleReference>,
    ) -> ModuleResult<Vec<ModuleReference>> {
        let mut pending = Vec::new();
        for reference in collect_external_references(graph, &self.dispatcher) {
            if !skip.contains(&reference) && self.dispatcher.needs_fetch(&reference)? {
                pending.push(reference);
            }
        }
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ArtifactPuller, PullFailure, ENTRY_POINT_FILE_NAME};
    use crate::error::Failure;
    use parking_lot::Mutex;
    use quill_common::MemoryFs;

    /// Artifacts named in `sources` succeed; everything else fails.
    struct MemoryPuller {
        sources: Vec<(&'static str, &'static str)>,
        pulls: Mutex<Vec<String>>,
    }

    impl ArtifactPuller for MemoryPuller {
        fn pull(&self, artifact: &str, target_dir: &Path) -> Result<(), PullFailure> {
            self.pulls.lock().push(artifact.to_string());
            let source = self
                .sources
                .iter()
                .find(|(name, _)| *name == artifact)
                .map(|(_, text)| *text)
                .ok_or_else(|| PullFailure {
                    output: format!("{}: not found", artifact),
                })?;
            std::fs::write(target_dir.join(ENTRY_POINT_FILE_NAME), source).unwrap();
            Ok(())
        }
    }

    /// Sources from memory, restored artifacts from the real cache dir.
    struct LayeredFs {
        memory: MemoryFs,
    }

    impl FileSystem for LayeredFs {
        fn read_file(&self, path: &Path) -> std::io::Result<String> {
            match self.memory.read_file(path) {
                Ok(text) => Ok(text),
                Err(_) => std::fs::read_to_string(path),
            }
        }

        fn is_file(&self, path: &Path) -> bool {
            self.memory.is_file(path) || path.is_file()
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.memory.is_dir(path) || path.is_dir()
        }
    }

    #[test]
    fn test_load_restores_transitively() {
        let cache_dir = tempfile::tempdir().unwrap();
        let memory = MemoryFs::new().with_file(
            "/main.ql",
            "module net 'oci:r.io/net:v1'\nmodule gone 'oci:r.io/gone:v1'",
        );
        let puller = Arc::new(MemoryPuller {
            sources: vec![
                ("r.io/net:v1", "module base 'oci:r.io/base:v1'"),
                ("r.io/base:v1", "param p int"),
            ],
            pulls: Mutex::new(Vec::new()),
        });
        let fs: Arc<dyn FileSystem> = Arc::new(LayeredFs { memory });
        let cache = Arc::new(ArtifactCache::new(cache_dir.path(), puller.clone()));
        let loader = ModuleLoader::new(fs.clone(), RegistryDispatcher::standard(fs, cache));

        let unrestored = loader.load(Path::new("/main.ql"), false).unwrap();
        assert!(unrestored.graph.requires_fetch());
        assert_eq!(unrestored.restored, 0);

        let outcome = loader.load(Path::new("/main.ql"), true).unwrap();
        assert_eq!(outcome.graph.file_count(), 3);
        assert_eq!(outcome.restored, 3);
        assert_eq!(outcome.fetch_errors.len(), 1);
        assert_eq!(outcome.fetch_errors[0].reference, "oci:r.io/gone:v1");

        // Only the module that could not be restored is still pending.
        let pending: Vec<_> = outcome
            .graph
            .failures()
            .map(|(_, failure)| failure.clone())
            .collect();
        assert_eq!(
            pending,
            vec![Failure::FetchRequired {
                reference: "oci:r.io/gone:v1".into()
            }]
        );

        let mut pulls = puller.pulls.lock().clone();
        pulls.sort();
        assert_eq!(pulls, vec!["r.io/base:v1", "r.io/gone:v1", "r.io/net:v1"]);
    }
}
