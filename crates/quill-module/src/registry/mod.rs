//! Module registries.
//!
//! A registry owns one kind of module reference: it parses the reference
//! body, says whether the module must be restored first, maps the reference
//! to a local entry file, and restores batches of references.

mod local;
mod oci;

pub use local::LocalModuleRegistry;
pub use oci::OciModuleRegistry;

use std::path::{Path, PathBuf};

use crate::error::{FetchError, Failure, ModuleError, ModuleResult};
use crate::reference::{ModuleReference, ReferenceKind, ReferenceVariant};

/// Capability interface implemented by each registry.
pub trait ModuleRegistry: Send + Sync {
    /// The reference variant this registry owns.
    type Reference: ReferenceVariant;

    /// Parse a reference body (the part after `scheme:`).
    fn parse_reference(&self, raw: &str) -> Result<Self::Reference, Failure>;

    /// Whether the reference must be restored before it can be resolved.
    fn needs_fetch(&self, reference: &Self::Reference) -> bool;

    /// Map a reference to the local file holding the module's source.
    ///
    /// `parent` is the path of the file containing the declaration.
    fn resolve_entry_point(
        &self,
        parent: &Path,
        reference: &Self::Reference,
    ) -> Result<PathBuf, Failure>;

    /// Restore a batch of references, returning one error per failure.
    fn fetch(&self, references: &[&Self::Reference]) -> Vec<FetchError>;
}

/// Object-safe view of a [`ModuleRegistry`] over [`ModuleReference`].
pub(crate) trait DynRegistry: Send + Sync {
    fn kind(&self) -> ReferenceKind;

    fn parse_reference(&self, raw: &str) -> Result<ModuleReference, Failure>;

    fn needs_fetch(&self, reference: &ModuleReference) -> ModuleResult<bool>;

    fn resolve_entry_point(
        &self,
        parent: &Path,
        reference: &ModuleReference,
    ) -> ModuleResult<Result<PathBuf, Failure>>;

    fn fetch(&self, references: &[&ModuleReference]) -> ModuleResult<Vec<FetchError>>;
}

fn downcast<R: ReferenceVariant>(reference: &ModuleReference) -> ModuleResult<&R> {
    R::from_module_reference(reference)
        .ok_or(ModuleError::UnhandledReferenceKind(reference.kind()))
}

impl<T: ModuleRegistry> DynRegistry for T {
    fn kind(&self) -> ReferenceKind {
        T::Reference::KIND
    }

    fn parse_reference(&self, raw: &str) -> Result<ModuleReference, Failure> {
        ModuleRegistry::parse_reference(self, raw).map(Into::into)
    }

    fn needs_fetch(&self, reference: &ModuleReference) -> ModuleResult<bool> {
        let reference = downcast::<T::Reference>(reference)?;
        Ok(ModuleRegistry::needs_fetch(self, reference))
    }

    fn resolve_entry_point(
        &self,
        parent: &Path,
        reference: &ModuleReference,
    ) -> ModuleResult<Result<PathBuf, Failure>> {
        let reference = downcast::<T::Reference>(reference)?;
        Ok(ModuleRegistry::resolve_entry_point(self, parent, reference))
    }

    fn fetch(&self, references: &[&ModuleReference]) -> ModuleResult<Vec<FetchError>> {
        let typed = references
            .iter()
            .map(|r| downcast::<T::Reference>(r))
            .collect::<ModuleResult<Vec<_>>>()?;
        Ok(ModuleRegistry::fetch(self, &typed))
    }
}
