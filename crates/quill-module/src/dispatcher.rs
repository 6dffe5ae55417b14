//! Routing of module references to their registries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quill_common::FileSystem;
use rustc_hash::FxHashMap;

use crate::cache::ArtifactCache;
use crate::error::{FetchError, Failure, ModuleError, ModuleResult};
use crate::reference::{ModuleReference, ReferenceKind};
use crate::registry::{DynRegistry, LocalModuleRegistry, ModuleRegistry, OciModuleRegistry};

/// Scheme of local path references.
pub const LOCAL_SCHEME: &str = "";
pub const OCI_SCHEME: &str = "oci";

/// Collects `(scheme, registry)` pairs for a [`RegistryDispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    entries: Vec<(String, Arc<dyn DynRegistry>)>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `registry` under `scheme`. It also becomes the owner of its
    /// reference kind.
    pub fn register<R: ModuleRegistry + 'static>(mut self, scheme: &str, registry: R) -> Self {
        let registry: Arc<dyn DynRegistry> = Arc::new(registry);
        self.entries.push((scheme.to_string(), registry));
        self
    }

    /// Build the lookup tables. A later registration for the same scheme or
    /// kind replaces an earlier one.
    pub fn build(self) -> RegistryDispatcher {
        let mut by_scheme = BTreeMap::new();
        let mut by_kind = FxHashMap::default();
        for (scheme, registry) in self.entries {
            by_kind.insert(registry.kind(), scheme.clone());
            by_scheme.insert(scheme, registry);
        }
        RegistryDispatcher { by_scheme, by_kind }
    }
}

/// Owns the registries and forwards each request to the right one.
///
/// The tables are fixed at construction.
pub struct RegistryDispatcher {
    by_scheme: BTreeMap<String, Arc<dyn DynRegistry>>,
    /// Kind to the scheme of its owning registry.
    by_kind: FxHashMap<ReferenceKind, String>,
}

impl RegistryDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// The local registry under the empty scheme and the OCI registry under
    /// `oci`.
    pub fn standard(fs: Arc<dyn FileSystem>, cache: Arc<ArtifactCache>) -> Self {
        Self::builder()
            .register(LOCAL_SCHEME, LocalModuleRegistry::new(fs.clone()))
            .register(OCI_SCHEME, OciModuleRegistry::new(fs, cache))
            .build()
    }

    /// Registered schemes in sorted order, without the local scheme.
    pub fn available_schemes(&self) -> Vec<String> {
        self.by_scheme
            .keys()
            .filter(|scheme| scheme.as_str() != LOCAL_SCHEME)
            .cloned()
            .collect()
    }

    /// Parse a raw reference string.
    ///
    /// The text before the first `:` selects the registry; without a `:`
    /// the reference is a local path.
    pub fn parse_reference(&self, raw: &str) -> Result<ModuleReference, Failure> {
        if raw.is_empty() {
            return Err(Failure::EmptyReference);
        }
        let (scheme, body) = raw.split_once(':').unwrap_or((LOCAL_SCHEME, raw));
        match self.by_scheme.get(scheme) {
            Some(registry) => registry.parse_reference(body),
            None => Err(Failure::UnknownScheme {
                scheme: scheme.to_string(),
                available: self.available_schemes(),
            }),
        }
    }

    pub fn needs_fetch(&self, reference: &ModuleReference) -> ModuleResult<bool> {
        self.owner(reference.kind())?.needs_fetch(reference)
    }

    /// Map a reference to its local entry file. The outer result fails only
    /// when no registry owns the reference's kind.
    pub fn resolve_entry_point(
        &self,
        parent: &Path,
        reference: &ModuleReference,
    ) -> ModuleResult<Result<PathBuf, Failure>> {
        self.owner(reference.kind())?
            .resolve_entry_point(parent, reference)
    }

    /// Restore references, grouped by kind. Only kinds that occur are
    /// forwarded. Returns every fetch error.
    pub fn fetch_all<'r>(
        &self,
        references: impl IntoIterator<Item = &'r ModuleReference>,
    ) -> ModuleResult<Vec<FetchError>> {
        let mut groups: BTreeMap<ReferenceKind, Vec<&ModuleReference>> = BTreeMap::new();
        for reference in references {
            groups.entry(reference.kind()).or_default().push(reference);
        }

        let mut errors = Vec::new();
        for (kind, group) in groups {
            errors.extend(self.owner(kind)?.fetch(&group)?);
        }
        Ok(errors)
    }

    /// `scheme:body`, or just the body for local references.
    pub fn fully_qualify(&self, reference: &ModuleReference) -> String {
        match self.by_kind.get(&reference.kind()) {
            Some(scheme) if !scheme.is_empty() => format!("{}:{}", scheme, reference),
            _ => reference.to_string(),
        }
    }

    fn owner(&self, kind: ReferenceKind) -> ModuleResult<&dyn DynRegistry> {
        self.by_kind
            .get(&kind)
            .and_then(|scheme| self.by_scheme.get(scheme))
            .map(|registry| registry.as_ref())
            .ok_or(ModuleError::UnhandledReferenceKind(kind))
    }
}
