//! Module graph construction.
//!
//! [`GraphBuilder::build`] starts at an entry file, resolves every module
//! declaration it finds, and recurses into each newly reached file. The
//! result is a [`ResolutionGraph`]: every discovered file plus, for every
//! module declaration in those files, either the file it resolved to or the
//! reason it did not.
//!
//! Building never restores remote modules. A declaration whose module has
//! not been restored fails with [`Failure::FetchRequired`] and is listed in
//! [`ResolutionGraph::pending_fetch`]; see [`crate::loader`] for the
//! restore-then-rebuild loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use quill_common::vfs::normalize_path;
use quill_common::FileSystem;
use quill_syntax::{ModuleDecl, SyntaxTree};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::cycle::find_cycles;
use crate::dispatcher::RegistryDispatcher;
use crate::error::{Cycle, Failure, ModuleError, ModuleResult};

/// Identifies a module declaration: the file it is written in and its
/// position among that file's module declarations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleDeclId {
    pub file: PathBuf,
    pub index: usize,
}

impl ModuleDeclId {
    pub fn new(file: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            file: file.into(),
            index,
        }
    }
}

/// Turns file text into a syntax tree.
pub trait SourceParser: Send + Sync {
    fn parse(&self, path: &Path, text: String) -> SyntaxTree;
}

/// The Quill declaration parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuillParser;

impl SourceParser for QuillParser {
    fn parse(&self, path: &Path, text: String) -> SyntaxTree {
        SyntaxTree::parse(path, text)
    }
}

/// The outcome of one build.
///
/// Every module declaration of every file in the graph is either resolved
/// (it has a target file) or failed (it has a [`Failure`]), never both.
#[derive(Debug)]
pub struct ResolutionGraph {
    entry_point: PathBuf,
    entry: Arc<SyntaxTree>,
    /// In discovery order; the entry file is first.
    files: IndexMap<PathBuf, Arc<SyntaxTree>>,
    module_to_file: FxHashMap<ModuleDeclId, PathBuf>,
    module_failures: FxHashMap<ModuleDeclId, Failure>,
    pending_fetch: FxHashSet<ModuleDeclId>,
}

impl ResolutionGraph {
    #[inline]
    pub fn entry_point(&self) -> &Path {
        &self.entry_point
    }

    #[inline]
    pub fn entry_file(&self) -> &Arc<SyntaxTree> {
        &self.entry
    }

    /// Files in discovery order.
    pub fn files(&self) -> impl Iterator<Item = &Arc<SyntaxTree>> {
        self.files.values()
    }

    pub fn file(&self, path: &Path) -> Option<&Arc<SyntaxTree>> {
        self.files.get(path)
    }

    #[inline]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Every module declaration, file by file in discovery order.
    pub fn declarations(&self) -> impl Iterator<Item = (ModuleDeclId, &ModuleDecl)> {
        self.files.iter().flat_map(|(path, tree)| {
            tree.module_decls()
                .enumerate()
                .map(move |(index, decl)| (ModuleDeclId::new(path.clone(), index), decl))
        })
    }

    pub fn declaration(&self, id: &ModuleDeclId) -> Option<&ModuleDecl> {
        self.files.get(&id.file)?.module_decls().nth(id.index)
    }

    pub fn resolved_path(&self, id: &ModuleDeclId) -> Option<&Path> {
        self.module_to_file.get(id).map(PathBuf::as_path)
    }

    pub fn resolved_file(&self, id: &ModuleDeclId) -> Option<&Arc<SyntaxTree>> {
        self.files.get(self.module_to_file.get(id)?)
    }

    pub fn failure(&self, id: &ModuleDeclId) -> Option<&Failure> {
        self.module_failures.get(id)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ModuleDeclId, &Failure)> {
        self.module_failures.iter()
    }

    #[inline]
    pub fn has_failures(&self) -> bool {
        !self.module_failures.is_empty()
    }

    /// Declarations whose module must be restored before they can resolve.
    pub fn pending_fetch(&self) -> &FxHashSet<ModuleDeclId> {
        &self.pending_fetch
    }

    #[inline]
    pub fn requires_fetch(&self) -> bool {
        !self.pending_fetch.is_empty()
    }
}

/// Builds [`ResolutionGraph`]s.
///
/// A builder may be seeded with an earlier graph; files it contains are
/// reused instead of being read and parsed again. Resolution is always
/// redone, so a seeded build sees modules restored since the seed was built.
pub struct GraphBuilder<'a> {
    fs: &'a dyn FileSystem,
    dispatcher: &'a RegistryDispatcher,
    parser: &'a dyn SourceParser,
    seed: FxHashMap<PathBuf, Arc<SyntaxTree>>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(fs: &'a dyn FileSystem, dispatcher: &'a RegistryDispatcher) -> Self {
        Self {
            fs,
            dispatcher,
            parser: &QuillParser,
            seed: FxHashMap::default(),
        }
    }

    pub fn with_parser(mut self, parser: &'a dyn SourceParser) -> Self {
        self.parser = parser;
        self
    }

    /// Reuse the files of `prior`. Its failures are not carried over.
    pub fn with_seed(mut self, prior: &ResolutionGraph) -> Self {
        self.seed.extend(
            prior
                .files
                .iter()
                .map(|(path, tree)| (path.clone(), tree.clone())),
        );
        self
    }

    /// Forget seeded files that have changed so they are read again.
    pub fn invalidate<P: AsRef<Path>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        for path in paths {
            self.seed.remove(&normalize_path(path.as_ref()));
        }
        self
    }

    /// Build the graph rooted at `entry`.
    ///
    /// Fails only when the entry file cannot be read, or when a reference
    /// kind has no registry. Every other problem is recorded against the
    /// declaration it concerns.
    pub fn build(&self, entry: &Path) -> ModuleResult<ResolutionGraph> {
        let entry_point = normalize_path(entry);
        let tree = match self.seed.get(&entry_point) {
            Some(tree) => tree.clone(),
            None => {
                let text = self.fs.read_file(&entry_point).map_err(|source| {
                    ModuleError::EntryFileUnreadable {
                        path: entry_point.clone(),
                        source,
                    }
                })?;
                debug!(path = %entry_point.display(), "parsing entry file");
                Arc::new(self.parser.parse(&entry_point, text))
            }
        };

        let mut state = BuildState::default();
        state.files.insert(entry_point.clone(), tree.clone());
        self.visit(&mut state, &entry_point, &tree)?;
        state.report_cycles();

        debug!(
            entry = %entry_point.display(),
            files = state.files.len(),
            resolved = state.module_to_file.len(),
            failed = state.module_failures.len(),
            "module graph built"
        );

        Ok(ResolutionGraph {
            entry_point,
            entry: tree,
            files: state.files,
            module_to_file: state.module_to_file,
            module_failures: state.module_failures,
            pending_fetch: state.pending_fetch,
        })
    }

    fn visit(&self, state: &mut BuildState, path: &Path, tree: &SyntaxTree) -> ModuleResult<()> {
        for (index, decl) in tree.module_decls().enumerate() {
            let id = ModuleDeclId::new(path, index);
            match self.resolve(state, path, decl)? {
                Ok(target) => state.succeed(id, target),
                Err(failure) => {
                    debug!(file = %path.display(), module = %decl.name.name, %failure, "module unresolved");
                    if matches!(failure, Failure::FetchRequired { .. }) {
                        state.pending_fetch.insert(id.clone());
                    }
                    state.fail(id, failure);
                }
            }
        }
        Ok(())
    }

    fn resolve(
        &self,
        state: &mut BuildState,
        parent: &Path,
        decl: &ModuleDecl,
    ) -> ModuleResult<Result<PathBuf, Failure>> {
        let reference = match self.dispatcher.parse_reference(&decl.reference.value) {
            Ok(reference) => reference,
            Err(failure) => return Ok(Err(failure)),
        };

        if self.dispatcher.needs_fetch(&reference)? {
            return Ok(Err(Failure::FetchRequired {
                reference: self.dispatcher.fully_qualify(&reference),
            }));
        }

        let target = match self.dispatcher.resolve_entry_point(parent, &reference)? {
            Ok(target) => target,
            Err(failure) => return Ok(Err(failure)),
        };

        if !state.files.contains_key(&target) {
            let tree = match self.load(state, &target) {
                Ok(tree) => tree,
                Err(failure) => return Ok(Err(failure)),
            };
            // Marked before its declarations are visited so cycles terminate.
            state.files.insert(target.clone(), tree.clone());
            self.visit(state, &target, &tree)?;
        }

        Ok(Ok(target))
    }

    fn load(&self, state: &mut BuildState, path: &Path) -> Result<Arc<SyntaxTree>, Failure> {
        if let Some(tree) = self.seed.get(path) {
            return Ok(tree.clone());
        }
        if let Some(failure) = state.load_failures.get(path) {
            return Err(failure.clone());
        }

        match self.fs.read_file(path) {
            Ok(text) => {
                debug!(path = %path.display(), "parsing module file");
                Ok(Arc::new(self.parser.parse(path, text)))
            }
            Err(e) => {
                let failure = Failure::FileUnreadable {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                };
                state.load_failures.insert(path.to_path_buf(), failure.clone());
                Err(failure)
            }
        }
    }
}

#[derive(Default)]
struct BuildState {
    files: IndexMap<PathBuf, Arc<SyntaxTree>>,
    /// Files that could not be read in this build.
    load_failures: FxHashMap<PathBuf, Failure>,
    module_to_file: FxHashMap<ModuleDeclId, PathBuf>,
    module_failures: FxHashMap<ModuleDeclId, Failure>,
    pending_fetch: FxHashSet<ModuleDeclId>,
}

impl BuildState {
    fn succeed(&mut self, id: ModuleDeclId, target: PathBuf) {
        self.module_failures.remove(&id);
        self.module_to_file.insert(id, target);
    }

    fn fail(&mut self, id: ModuleDeclId, failure: Failure) {
        self.module_to_file.remove(&id);
        self.module_failures.insert(id, failure);
    }

    /// Targets of `file`'s resolved declarations, in declaration order.
    fn successors(&self, file: &PathBuf) -> Vec<PathBuf> {
        let count = self
            .files
            .get(file)
            .map_or(0, |tree| tree.module_decls().count());
        (0..count)
            .filter_map(|index| {
                self.module_to_file
                    .get(&ModuleDeclId::new(file.clone(), index))
                    .cloned()
            })
            .collect()
    }

    /// Turn every resolved declaration whose target lies on a cycle into a
    /// failure.
    fn report_cycles(&mut self) {
        let cycles = find_cycles(self.files.keys().cloned(), |file| self.successors(file));
        if cycles.is_empty() {
            return;
        }

        let cyclic: Vec<(ModuleDeclId, Failure)> = self
            .module_to_file
            .iter()
            .filter_map(|(id, target)| {
                let cycle = cycles.get(target)?;
                let cycle = match cycle.len() {
                    1 => Cycle::SelfReference,
                    _ => Cycle::Files(cycle.clone()),
                };
                Some((id.clone(), Failure::CyclicReference(cycle)))
            })
            .collect();

        for (id, failure) in cyclic {
            self.fail(id, failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ArtifactCache, ArtifactPuller, PullFailure, ENTRY_POINT_FILE_NAME};
    use pretty_assertions::assert_eq;
    use quill_common::MemoryFs;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoPull;

    impl ArtifactPuller for NoPull {
        fn pull(&self, _: &str, _: &Path) -> Result<(), PullFailure> {
            Err(PullFailure {
                output: "offline".into(),
            })
        }
    }

    fn dispatcher(fs: &Arc<MemoryFs>) -> RegistryDispatcher {
        let cache = Arc::new(ArtifactCache::new("/cache", Arc::new(NoPull)));
        RegistryDispatcher::standard(fs.clone(), cache)
    }

    fn build(fs: MemoryFs, entry: &str) -> ModuleResult<ResolutionGraph> {
        let fs = Arc::new(fs);
        let dispatcher = dispatcher(&fs);
        GraphBuilder::new(&*fs, &dispatcher).build(Path::new(entry))
    }

    fn id(file: &str, index: usize) -> ModuleDeclId {
        ModuleDeclId::new(file, index)
    }

    /// Every declaration is in exactly one of the two maps.
    fn assert_total_coverage(graph: &ResolutionGraph) {
        let mut count = 0;
        for (id, _) in graph.declarations() {
            let resolved = graph.resolved_path(&id).is_some();
            let failed = graph.failure(&id).is_some();
            assert!(resolved != failed, "{:?}: resolved={} failed={}", id, resolved, failed);
            count += 1;
        }
        assert_eq!(count, graph.module_to_file.len() + graph.module_failures.len());
    }

    #[test]
    fn test_total_coverage() {
        let fs = MemoryFs::new()
            .with_file(
                "/p/main.ql",
                "module a './a.ql'\n\
                 module b ''\n\
                 module c 'foo:bar'\n\
                 module d './missing.ql'\n\
                 module e 'oci:r.io/x:v1'\n\
                 param p string",
            )
            .with_file("/p/a.ql", "module b './b.ql'\nmodule c '../nope.ql'")
            .with_file("/p/b.ql", "var x = 1");
        let graph = build(fs, "/p/main.ql").unwrap();

        assert_eq!(graph.file_count(), 3);
        assert_eq!(graph.declarations().count(), 7);
        assert_total_coverage(&graph);

        assert_eq!(graph.resolved_path(&id("/p/main.ql", 0)), Some(Path::new("/p/a.ql")));
        assert_eq!(graph.failure(&id("/p/main.ql", 1)), Some(&Failure::EmptyReference));
        assert!(matches!(
            graph.failure(&id("/p/main.ql", 3)),
            Some(Failure::PathUnresolvable { .. })
        ));
        assert!(matches!(
            graph.failure(&id("/p/main.ql", 4)),
            Some(Failure::FetchRequired { reference }) if reference == "oci:r.io/x:v1"
        ));
        assert_eq!(graph.resolved_path(&id("/p/a.ql", 0)), Some(Path::new("/p/b.ql")));
        assert_eq!(
            graph.pending_fetch().iter().collect::<Vec<_>>(),
            vec![&id("/p/main.ql", 4)]
        );
    }

    #[test]
    fn test_unknown_scheme_lists_oci() {
        let fs = MemoryFs::new().with_file("/main.ql", "module m 'foo:bar'");
        let graph = build(fs, "/main.ql").unwrap();
        assert_eq!(
            graph.failure(&id("/main.ql", 0)),
            Some(&Failure::UnknownScheme {
                scheme: "foo".into(),
                available: vec!["oci".into()],
            })
        );
    }

    #[test]
    fn test_self_cycle() {
        let fs = MemoryFs::new().with_file("/a.ql", "module me './a.ql'");
        let graph = build(fs, "/a.ql").unwrap();
        assert_eq!(graph.resolved_path(&id("/a.ql", 0)), None);
        assert_eq!(
            graph.failure(&id("/a.ql", 0)),
            Some(&Failure::CyclicReference(Cycle::SelfReference))
        );
    }

    #[test]
    fn test_multi_file_cycle() {
        let fs = MemoryFs::new()
            .with_file("/a.ql", "module b './b.ql'")
            .with_file("/b.ql", "module c './c.ql'")
            .with_file("/c.ql", "module a './a.ql'");
        let graph = build(fs, "/a.ql").unwrap();

        let expected = Failure::CyclicReference(Cycle::Files(vec![
            "/a.ql".into(),
            "/b.ql".into(),
            "/c.ql".into(),
        ]));
        for file in ["/a.ql", "/b.ql", "/c.ql"] {
            assert_eq!(graph.failure(&id(file, 0)), Some(&expected));
        }
        assert_total_coverage(&graph);
    }

    #[test]
    fn test_shared_target_is_not_a_cycle() {
        let fs = MemoryFs::new()
            .with_file("/a.ql", "module b './b.ql'\nmodule c './c.ql'")
            .with_file("/b.ql", "")
            .with_file("/c.ql", "module b './b.ql'");
        let graph = build(fs, "/a.ql").unwrap();
        assert!(!graph.has_failures());
        assert_eq!(graph.file_count(), 3);
    }

    #[test]
    fn test_diamond_shares_one_tree() {
        let fs = MemoryFs::new()
            .with_file("/main.ql", "module b './b.ql'\nmodule c './c.ql'")
            .with_file("/b.ql", "module d './d.ql'")
            .with_file("/c.ql", "module d './d.ql'")
            .with_file("/d.ql", "output o int = 1");
        let graph = build(fs, "/main.ql").unwrap();

        assert!(!graph.has_failures());
        assert_eq!(graph.file_count(), 4);
        let from_b = graph.resolved_file(&id("/b.ql", 0)).unwrap();
        let from_c = graph.resolved_file(&id("/c.ql", 0)).unwrap();
        assert!(Arc::ptr_eq(from_b, from_c));
        assert!(Arc::ptr_eq(from_b, graph.file(Path::new("/d.ql")).unwrap()));
    }

    #[test]
    fn test_unreadable_entry_is_fatal() {
        let err = build(MemoryFs::new(), "/main.ql").unwrap_err();
        assert!(matches!(err, ModuleError::EntryFileUnreadable { ref path, .. } if path == Path::new("/main.ql")));
    }

    /// Lists one file that exists but cannot be read, and counts reads.
    struct BrokenFs {
        inner: MemoryFs,
        broken: PathBuf,
        reads: AtomicUsize,
    }

    impl FileSystem for BrokenFs {
        fn read_file(&self, path: &Path) -> io::Result<String> {
            if path == self.broken {
                self.reads.fetch_add(1, Ordering::SeqCst);
                return Err(io::Error::new(io::ErrorKind::InvalidData, "not UTF-8"));
            }
            self.inner.read_file(path)
        }

        fn is_file(&self, path: &Path) -> bool {
            path == self.broken || self.inner.is_file(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.inner.is_dir(path)
        }
    }

    #[test]
    fn test_unreadable_module_fails_each_referencing_declaration_once() {
        let fs = Arc::new(BrokenFs {
            inner: MemoryFs::new()
                .with_file("/main.ql", "module x './bad.ql'\nmodule y './ok.ql'")
                .with_file("/ok.ql", "module x './bad.ql'"),
            broken: PathBuf::from("/bad.ql"),
            reads: AtomicUsize::new(0),
        });
        let cache = Arc::new(ArtifactCache::new("/cache", Arc::new(NoPull)));
        let dispatcher = RegistryDispatcher::standard(fs.clone(), cache);
        let graph = GraphBuilder::new(&*fs, &dispatcher)
            .build(Path::new("/main.ql"))
            .unwrap();

        let expected = Failure::FileUnreadable {
            path: "/bad.ql".into(),
            message: "not UTF-8".into(),
        };
        assert_eq!(graph.failure(&id("/main.ql", 0)), Some(&expected));
        assert_eq!(graph.failure(&id("/ok.ql", 0)), Some(&expected));
        assert_eq!(graph.resolved_path(&id("/main.ql", 1)), Some(Path::new("/ok.ql")));
        assert_eq!(fs.reads.load(Ordering::SeqCst), 1);
        assert_total_coverage(&graph);
    }

    #[test]
    fn test_seeded_build_reuses_trees_and_reresolves() {
        let mut fs = MemoryFs::new()
            .with_file("/main.ql", "module a './a.ql'\nmodule r 'oci:r.io/x:v1'")
            .with_file("/a.ql", "param p int");
        let first = build(fs.clone(), "/main.ql").unwrap();
        assert!(first.requires_fetch());

        // Simulate a restore and an edit of a.ql on disk.
        fs.insert(
            format!("/cache/r.io/x/@v1/{}", ENTRY_POINT_FILE_NAME),
            "param q string",
        );
        fs.insert("/a.ql", "module main './main.ql'");
        let fs = Arc::new(fs);
        let dispatcher = dispatcher(&fs);

        let seeded = GraphBuilder::new(&*fs, &dispatcher)
            .with_seed(&first)
            .build(Path::new("/main.ql"))
            .unwrap();
        assert!(!seeded.requires_fetch());
        assert!(!seeded.has_failures());
        assert!(Arc::ptr_eq(
            seeded.file(Path::new("/a.ql")).unwrap(),
            first.file(Path::new("/a.ql")).unwrap()
        ));
        assert_eq!(seeded.file_count(), 3);

        let invalidated = GraphBuilder::new(&*fs, &dispatcher)
            .with_seed(&first)
            .invalidate(["/a.ql"])
            .build(Path::new("/main.ql"))
            .unwrap();
        assert!(matches!(
            invalidated.failure(&id("/a.ql", 0)),
            Some(Failure::CyclicReference(Cycle::Files(_)))
        ));
        assert!(matches!(
            invalidated.failure(&id("/main.ql", 0)),
            Some(Failure::CyclicReference(Cycle::Files(_)))
        ));
        assert_total_coverage(&invalidated);
    }

    #[test]
    fn test_relative_cache_root_keeps_one_identity_per_file() {
        let fs = Arc::new(
            MemoryFs::new()
                .with_file("/p/main.ql", "module m 'oci:r.io/x:v1'")
                .with_file("cache/r.io/x/@v1/main.ql", "module s './shared.ql'")
                .with_file("cache/r.io/x/@v1/shared.ql", "module back './main.ql'"),
        );
        let cache = Arc::new(ArtifactCache::new("./cache", Arc::new(NoPull)));
        let dispatcher = RegistryDispatcher::standard(fs.clone(), cache);
        let graph = GraphBuilder::new(&*fs, &dispatcher)
            .build(Path::new("/p/main.ql"))
            .unwrap();

        let paths: Vec<&Path> = graph.files().map(|tree| tree.path()).collect();
        assert_eq!(
            paths,
            vec![
                Path::new("/p/main.ql"),
                Path::new("cache/r.io/x/@v1/main.ql"),
                Path::new("cache/r.io/x/@v1/shared.ql"),
            ]
        );
        assert_eq!(graph.resolved_path(&id("/p/main.ql", 0)), None);
        assert!(matches!(
            graph.failure(&id("/p/main.ql", 0)),
            Some(Failure::CyclicReference(Cycle::Files(files))) if files.len() == 2
        ));
        assert_total_coverage(&graph);
    }

    /// Records every file it parses.
    #[derive(Default)]
    struct RecordingParser {
        parsed: parking_lot::Mutex<Vec<PathBuf>>,
    }

    impl SourceParser for RecordingParser {
        fn parse(&self, path: &Path, text: String) -> SyntaxTree {
            self.parsed.lock().push(path.to_path_buf());
            SyntaxTree::parse(path, text)
        }
    }

    #[test]
    fn test_seeded_build_parses_only_invalidated_files() {
        let fs = Arc::new(
            MemoryFs::new()
                .with_file("/main.ql", "module a './a.ql'\nmodule b './b.ql'")
                .with_file("/a.ql", "param p int")
                .with_file("/b.ql", "var v = 1"),
        );
        let dispatcher = dispatcher(&fs);
        let parser = RecordingParser::default();

        let first = GraphBuilder::new(&*fs, &dispatcher)
            .with_parser(&parser)
            .build(Path::new("/main.ql"))
            .unwrap();
        assert_eq!(
            std::mem::take(&mut *parser.parsed.lock()),
            vec![PathBuf::from("/main.ql"), "/a.ql".into(), "/b.ql".into()]
        );
        assert_eq!(
            first.declaration(&id("/main.ql", 1)).map(|decl| decl.name.name.as_str()),
            Some("b")
        );
        assert_eq!(first.declaration(&id("/main.ql", 2)), None);

        let second = GraphBuilder::new(&*fs, &dispatcher)
            .with_parser(&parser)
            .with_seed(&first)
            .invalidate(["/b.ql"])
            .build(Path::new("/main.ql"))
            .unwrap();
        assert_eq!(*parser.parsed.lock(), vec![PathBuf::from("/b.ql")]);
        assert!(!second.has_failures());
    }
}
