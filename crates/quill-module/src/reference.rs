//! Module references.
//!
//! A module declaration names its target with a reference string. Without a
//! scheme it is a [`LocalReference`], a path relative to the declaring file.
//! With the `oci` scheme it is an [`OciArtifactReference`] into a remote
//! registry:
//!
//! ```text
//! ./network/vnet.ql
//! oci:registry.example.io/infra/network:v1.2
//! ```

use std::fmt;
use std::hash::Hash;

use crate::error::Failure;

/// The closed set of reference variants. Each has exactly one owning
/// registry in a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceKind {
    Local,
    Oci,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Local => write!(f, "local"),
            ReferenceKind::Oci => write!(f, "oci"),
        }
    }
}

/// A parsed module reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleReference {
    Local(LocalReference),
    Oci(OciArtifactReference),
}

impl ModuleReference {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            ModuleReference::Local(_) => ReferenceKind::Local,
            ModuleReference::Oci(_) => ReferenceKind::Oci,
        }
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self, ModuleReference::Local(_))
    }
}

/// Renders the reference body without its scheme.
impl fmt::Display for ModuleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleReference::Local(r) => write!(f, "{}", r),
            ModuleReference::Oci(r) => write!(f, "{}", r),
        }
    }
}

/// A concrete reference type owned by one registry.
pub trait ReferenceVariant:
    Clone + Eq + Hash + fmt::Display + Into<ModuleReference> + Send + Sync + 'static
{
    const KIND: ReferenceKind;

    /// Borrow the typed reference out of a [`ModuleReference`] of this kind.
    fn from_module_reference(reference: &ModuleReference) -> Option<&Self>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Local references
// ═══════════════════════════════════════════════════════════════════════════

/// A path relative to the declaring file, always `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalReference {
    path: String,
}

impl LocalReference {
    /// Parses a local path reference.
    ///
    /// A valid path:
    /// - Is not empty
    /// - Is relative (does not start with `/`)
    /// - Uses `/` as separator (no `\`)
    /// - Has no empty segments and does not end with `/`
    /// - Contains no control characters
    pub fn parse(raw: &str) -> Result<Self, Failure> {
        if raw.is_empty() {
            return Err(Failure::EmptyReference);
        }
        let malformed = |reason: &str| Failure::malformed("local", raw, reason);

        if raw.chars().any(char::is_control) {
            return Err(malformed("the path contains a control character"));
        }
        if raw.contains('\\') {
            return Err(malformed("use '/' as the path separator"));
        }
        if raw.starts_with('/') {
            return Err(malformed("the path must be relative to the declaring file"));
        }
        if raw.ends_with('/') {
            return Err(malformed("the path must refer to a file, not a directory"));
        }
        if raw.contains("//") {
            return Err(malformed("the path contains an empty segment"));
        }

        Ok(Self {
            path: raw.to_string(),
        })
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for LocalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl From<LocalReference> for ModuleReference {
    fn from(reference: LocalReference) -> Self {
        ModuleReference::Local(reference)
    }
}

impl ReferenceVariant for LocalReference {
    const KIND: ReferenceKind = ReferenceKind::Local;

    fn from_module_reference(reference: &ModuleReference) -> Option<&Self> {
        match reference {
            ModuleReference::Local(r) => Some(r),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// OCI artifact references
// ═══════════════════════════════════════════════════════════════════════════

const MAX_TAG_LEN: usize = 128;

/// `<registry>/<repository>:<tag>`, e.g. `registry.example.io/infra/network:v1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OciArtifactReference {
    pub(crate) registry: String,
    pub(crate) repository: String,
    pub(crate) tag: String,
}

impl OciArtifactReference {
    /// Parses the body of an `oci:` reference (without the scheme).
    pub fn parse(raw: &str) -> Result<Self, Failure> {
        let malformed = |reason: String| Failure::malformed("oci", raw, reason);

        let (registry, rest) = raw.split_once('/').ok_or_else(|| {
            malformed("expected <registry>/<repository>:<tag>".to_string())
        })?;
        let (repository, tag) = rest
            .rsplit_once(':')
            .ok_or_else(|| malformed("the tag is missing".to_string()))?;

        validate_registry(registry).map_err(malformed)?;
        validate_repository(repository).map_err(malformed)?;
        validate_tag(tag).map_err(malformed)?;

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Registry host, including any `:port`.
    #[inline]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    #[inline]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn repository_segments(&self) -> impl Iterator<Item = &str> {
        self.repository.split('/')
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The artifact ID handed to the pull tool.
    pub fn artifact_id(&self) -> String {
        format!("{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

impl fmt::Display for OciArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

impl From<OciArtifactReference> for ModuleReference {
    fn from(reference: OciArtifactReference) -> Self {
        ModuleReference::Oci(reference)
    }
}

impl ReferenceVariant for OciArtifactReference {
    const KIND: ReferenceKind = ReferenceKind::Oci;

    fn from_module_reference(reference: &ModuleReference) -> Option<&Self> {
        match reference {
            ModuleReference::Oci(r) => Some(r),
            _ => None,
        }
    }
}

/// Host name of letters, digits, `.` and `-`, with an optional numeric port.
fn validate_registry(registry: &str) -> Result<(), String> {
    let (host, port) = match registry.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (registry, None),
    };
    if host.is_empty() {
        return Err("the registry is missing".to_string());
    }
    if host == "." || host == ".." {
        return Err(format!("\"{}\" is not a valid registry", host));
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(format!(
            "the registry \"{}\" may only contain letters, digits, '.' and '-'",
            host
        ));
    }
    if let Some(port) = port {
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("the registry port \"{}\" is not a number", port));
        }
    }
    Ok(())
}

/// `/`-separated segments of lowercase letters, digits, `.`, `_` and `-`.
fn validate_repository(repository: &str) -> Result<(), String> {
    if repository.is_empty() {
        return Err("the repository is missing".to_string());
    }
    for segment in repository.split('/') {
        if segment.is_empty() {
            return Err("the repository contains an empty segment".to_string());
        }
        if segment == "." || segment == ".." {
            return Err(format!("the repository segment \"{}\" is not allowed", segment));
        }
        let valid = segment.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')
        });
        if !valid {
            return Err(format!(
                "the repository segment \"{}\" may only contain lowercase letters, digits, '.', '_' and '-'",
                segment
            ));
        }
    }
    Ok(())
}

/// `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
fn validate_tag(tag: &str) -> Result<(), String> {
    if tag.is_empty() {
        return Err("the tag is missing".to_string());
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(format!("the tag exceeds {} characters", MAX_TAG_LEN));
    }
    let mut chars = tag.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err(format!(
            "the tag \"{}\" may only contain letters, digits, '_', '.' and '-', and must not start with '.' or '-'",
            tag
        ));
    }
    Ok(())
}
