//! Version selection for a project against the server's runtime target

use crate::error::ResolveError;
use crate::registry::types::{RuntimeTarget, Version, VersionFile};

/// Extension every installable artifact must carry
pub const ARTIFACT_EXTENSION: &str = ".jar";

/// How a version was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    /// The caller asked for this version id
    Requested,
    /// First version matching the runtime's loader and game version
    Compatible,
    /// No compatible version; newest version as published by the registry
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    pub version: &'a Version,
    pub file: &'a VersionFile,
    pub kind: ResolutionKind,
    /// A requested id was missing and a compatible version was used instead
    pub requested_missing: bool,
}

/// Pick exactly one version to install.
///
/// Order, first match wins:
/// 1. the version whose id equals `requested`
/// 2. the first version (registry order) supporting `runtime`
/// 3. the first version in the list, unless a requested id was missing
pub fn resolve<'a>(
    versions: &'a [Version],
    requested: Option<&str>,
    runtime: &RuntimeTarget,
) -> Result<Resolution<'a>, ResolveError> {
    if versions.is_empty() {
        return Err(ResolveError::NoVersionsAvailable);
    }

    if let Some(id) = requested
        && let Some(version) = versions.iter().find(|v| v.id == id)
    {
        return with_file(version, ResolutionKind::Requested, false);
    }

    let requested_missing = requested.is_some();

    if let Some(version) = versions.iter().find(|v| v.supports(runtime)) {
        return with_file(version, ResolutionKind::Compatible, requested_missing);
    }

    // A missing explicit id must surface instead of silently installing something else
    if let Some(id) = requested {
        return Err(ResolveError::NoCompatibleVersion {
            requested: id.to_string(),
        });
    }

    with_file(&versions[0], ResolutionKind::Default, false)
}

/// Prefer the first `.jar` file; otherwise the first file of the version.
pub fn select_file(version: &Version) -> Result<&VersionFile, ResolveError> {
    version
        .files
        .iter()
        .find(|f| f.filename.to_ascii_lowercase().ends_with(ARTIFACT_EXTENSION))
        .or_else(|| version.files.first())
        .ok_or_else(|| ResolveError::NoInstallableFile {
            version_id: version.id.clone(),
        })
}

fn with_file(
    version: &Version,
    kind: ResolutionKind,
    requested_missing: bool,
) -> Result<Resolution<'_>, ResolveError> {
    Ok(Resolution {
        version,
        file: select_file(version)?,
        kind,
        requested_missing,
    })
}
