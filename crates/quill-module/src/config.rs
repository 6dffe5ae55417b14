//! Module system configuration.

use std::path::PathBuf;

/// Where restored artifacts live and how they are pulled.
///
/// Built once at process start and threaded into the registries; nothing
/// in this crate reads the environment after that.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Root of the artifact cache.
    pub cache_root: PathBuf,
    /// Program used to pull OCI artifacts.
    pub oras_program: PathBuf,
}

impl ModuleConfig {
    /// Create a config with the given cache root and the default pull program.
    pub fn new(cache_root: PathBuf) -> Self {
        Self {
            cache_root,
            oras_program: PathBuf::from("oras"),
        }
    }

    /// Create a config using environment variables and common defaults.
    ///
    /// - `QUILL_ARTIFACTS` overrides the cache root, which otherwise is
    ///   `~/.quill/artifacts` (or `.quill/artifacts` when there is no home).
    /// - `QUILL_ORAS` overrides the pull program.
    pub fn from_env() -> Self {
        let cache_root = std::env::var_os("QUILL_ARTIFACTS")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".quill/artifacts"))
                    .unwrap_or_else(|| PathBuf::from(".quill/artifacts"))
            });

        let oras_program = std::env::var_os("QUILL_ORAS")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("oras"));

        Self {
            cache_root,
            oras_program,
        }
    }

    pub fn with_oras_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.oras_program = program.into();
        self
    }
}
