//! Module system for Quill.
//!
//! A Quill file pulls in other files with module declarations:
//!
//! ```text
//! module vnet './network/vnet.ql'
//! module storage 'oci:registry.example.io/infra/storage:v2'
//! ```
//!
//! This crate turns an entry file into a [`ResolutionGraph`]:
//!
//! - **References**: parse reference strings into [`ModuleReference`]s
//! - **Registries**: map references to local files, one registry per scheme
//! - **Artifact cache**: restore OCI artifacts into a deterministic directory layout
//! - **Graph building**: discover every reachable file and detect reference cycles
//!
//! # Example
//!
//! ```ignore
//! use quill_module::{ModuleConfig, ModuleLoader};
//!
//! let loader = ModuleLoader::from_config(&ModuleConfig::from_env());
//!
//! // Build, pulling any remote modules that are not cached yet.
//! let outcome = loader.load(Path::new("main.ql"), true)?;
//! for (id, failure) in outcome.graph.failures() {
//!     eprintln!("{}: {}", id.file.display(), failure);
//! }
//! ```

pub mod cache;
pub mod collect;
pub mod config;
pub mod cycle;
pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod loader;
pub mod reference;
pub mod registry;

pub use cache::{ArtifactCache, ArtifactPuller, OrasPuller, PullFailure, ENTRY_POINT_FILE_NAME};
pub use collect::collect_external_references;
pub use config::ModuleConfig;
pub use dispatcher::{DispatcherBuilder, RegistryDispatcher};
pub use error::{Cycle, FetchError, FetchErrorKind, Failure, ModuleError, ModuleResult};
pub use graph::{GraphBuilder, ModuleDeclId, QuillParser, ResolutionGraph, SourceParser};
pub use loader::{LoadOutcome, ModuleLoader};
pub use reference::{LocalReference, ModuleReference, OciArtifactReference, ReferenceKind};
pub use registry::{LocalModuleRegistry, ModuleRegistry, OciModuleRegistry};
