//! The on-disk artifact cache.
//!
//! Layout:
//!
//! ```text
//! <root>/<registry>/<segment>/.../<segment>/@<tag>/main.ql
//! ```
//!
//! Every component is percent-encoded so that only `[A-Za-z0-9._-]` and `%` remain,
//! which keeps `@` unique to the tag directory and makes the layout
//! injective: distinct references never share a directory, and no
//! reference's directory is nested inside another's.
//!
//! A pull writes into a staging directory next to the target and is renamed
//! into place, so the entry point file is present only once a pull has
//! completed. The root is normalized lexically so every entry point has a
//! single spelling.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use quill_common::vfs::normalize_path;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use crate::config::ModuleConfig;
use crate::dispatcher::OCI_SCHEME;
use crate::error::{FetchError, FetchErrorKind};
use crate::reference::OciArtifactReference;

/// File name of a restored module's entry point.
pub const ENTRY_POINT_FILE_NAME: &str = "main.ql";

/// Bytes left unescaped in a path component.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

/// Outcome of a failed pull: whatever the tool printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullFailure {
    pub output: String,
}

/// Pulls one artifact into a directory.
pub trait ArtifactPuller: Send + Sync {
    /// Populate `target_dir` with the contents of `artifact`.
    fn pull(&self, artifact: &str, target_dir: &Path) -> Result<(), PullFailure>;
}

/// Pulls with the `oras` command line tool.
#[derive(Debug, Clone)]
pub struct OrasPuller {
    program: PathBuf,
}

impl OrasPuller {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ArtifactPuller for OrasPuller {
    fn pull(&self, artifact: &str, target_dir: &Path) -> Result<(), PullFailure> {
        // oras writes the artifact's files into its working directory.
        let output = Command::new(&self.program)
            .arg("pull")
            .arg(artifact)
            .arg("-a")
            .current_dir(target_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| PullFailure {
                output: format!("failed to run {}: {}", self.program.display(), e),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut text = String::new();
        let _ = writeln!(text, "{} exited with {}", self.program.display(), output.status);
        let _ = writeln!(text, "stdout: {}", String::from_utf8_lossy(&output.stdout).trim_end());
        let _ = write!(text, "stderr: {}", String::from_utf8_lossy(&output.stderr).trim_end());
        Err(PullFailure { output: text })
    }
}

/// Maps OCI references to cache directories and populates them.
pub struct ArtifactCache {
    root: PathBuf,
    puller: Arc<dyn ArtifactPuller>,
    /// One lock per reference being pulled; dropped once nobody waits on it.
    locks: Mutex<FxHashMap<OciArtifactReference, Arc<Mutex<()>>>>,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>, puller: Arc<dyn ArtifactPuller>) -> Self {
        let root: PathBuf = root.into();
        Self {
            root: normalize_path(&root),
            puller,
            locks: Mutex::new(FxHashMap::default()),
        }
    }

    /// A cache at the configured root that pulls with `oras`.
    pub fn from_config(config: &ModuleConfig) -> Self {
        Self::new(
            config.cache_root.clone(),
            Arc::new(OrasPuller::new(config.oras_program.clone())),
        )
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory a reference is restored into.
    pub fn package_dir(&self, reference: &OciArtifactReference) -> PathBuf {
        let mut dir = self.root.join(escape_component(reference.registry()));
        for segment in reference.repository_segments() {
            dir.push(escape_component(segment));
        }
        dir.push(format!("@{}", escape_component(reference.tag())));
        dir
    }

    /// The entry point file of a restored reference.
    pub fn entry_point_path(&self, reference: &OciArtifactReference) -> PathBuf {
        self.package_dir(reference).join(ENTRY_POINT_FILE_NAME)
    }

    /// Pull each distinct reference, in parallel, skipping those already
    /// restored. Returns one error per reference that could not be restored.
    pub fn pull_all<'r>(
        &self,
        references: impl IntoIterator<Item = &'r OciArtifactReference>,
    ) -> Vec<FetchError> {
        let distinct: Vec<&OciArtifactReference> = references
            .into_iter()
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();

        distinct
            .par_iter()
            .filter_map(|reference| self.pull(reference).err())
            .collect()
    }

    /// Restore one reference unless its entry point is already present.
    ///
    /// Concurrent calls for the same reference are serialized; the second
    /// caller finds the artifact restored and returns immediately.
    pub fn pull(&self, reference: &OciArtifactReference) -> Result<(), FetchError> {
        let lock = self.lock_for(reference);
        let result = {
            let _guard = lock.lock();
            self.pull_locked(reference)
        };
        self.release(reference, lock);
        result
    }

    fn pull_locked(&self, reference: &OciArtifactReference) -> Result<(), FetchError> {
        let target = self.package_dir(reference);
        if target.join(ENTRY_POINT_FILE_NAME).is_file() {
            debug!(artifact = %reference, "artifact already restored");
            return Ok(());
        }

        let fail = |kind| FetchError {
            reference: format!("{}:{}", OCI_SCHEME, reference),
            kind,
        };
        let io_fail = |path: &Path, source: io::Error| {
            fail(FetchErrorKind::Io {
                path: path.to_path_buf(),
                source,
            })
        };

        // `package_dir` always has at least the registry and tag components.
        let parent = target.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent).map_err(|e| io_fail(parent, e))?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)
            .map_err(|e| io_fail(parent, e))?;

        info!(artifact = %reference, target = %target.display(), "pulling module artifact");
        if let Err(failure) = self.puller.pull(&reference.artifact_id(), staging.path()) {
            warn!(artifact = %reference, "pull failed");
            return Err(fail(FetchErrorKind::PullFailed {
                output: failure.output,
            }));
        }

        if !staging.path().join(ENTRY_POINT_FILE_NAME).is_file() {
            return Err(fail(FetchErrorKind::MissingEntryPoint {
                file_name: ENTRY_POINT_FILE_NAME.to_string(),
            }));
        }

        if target.exists() {
            if target.join(ENTRY_POINT_FILE_NAME).is_file() {
                // Another process finished first.
                debug!(artifact = %reference, "artifact restored concurrently");
                return Ok(());
            }
            // Left behind by an interrupted restore.
            fs::remove_dir_all(&target).map_err(|e| io_fail(&target, e))?;
        }

        let staged = staging.keep();
        if let Err(e) = fs::rename(&staged, &target) {
            let _ = fs::remove_dir_all(&staged);
            if target.join(ENTRY_POINT_FILE_NAME).is_file() {
                return Ok(());
            }
            return Err(io_fail(&target, e));
        }

        debug!(artifact = %reference, "artifact restored");
        Ok(())
    }

    fn lock_for(&self, reference: &OciArtifactReference) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(reference.clone())
            .or_default()
            .clone()
    }

    fn release(&self, reference: &OciArtifactReference, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        // The map and `lock` are the only owners: no pull is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(reference);
        }
    }
}

/// Percent-escape every byte outside `[A-Za-z0-9._-]`, and the dots of the
/// special names `.` and `..`.
fn escape_component(component: &str) -> String {
    if component == "." || component == ".." {
        return "%2E".repeat(component.len());
    }
    utf8_percent_encode(component, COMPONENT).to_string()
}
