//! Structural sanity check for downloaded artifacts
//!
//! A pass means the file looks like a complete plugin jar. It says nothing about archive
//! integrity, signatures or whether the code is safe to run; none of that is checked here.

use std::path::Path;

use tracing::{debug, warn};

use crate::config::DEFAULT_MIN_ARTIFACT_SIZE;
use crate::install::resolver::ARTIFACT_EXTENSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactValidator {
    min_size: u64,
}

impl Default for ArtifactValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ARTIFACT_SIZE)
    }
}

impl ArtifactValidator {
    /// Files must be strictly larger than `min_size` bytes
    pub fn new(min_size: u64) -> Self {
        Self { min_size }
    }

    /// Returns true for an existing regular `.jar` file above the minimum size
    pub async fn validate(&self, path: &Path) -> bool {
        let has_extension = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.to_ascii_lowercase().ends_with(ARTIFACT_EXTENSION));

        if !has_extension {
            warn!("Artifact {:?} does not have a {} extension", path, ARTIFACT_EXTENSION);
            return false;
        }

        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(m) => m,
            Err(e) => {
                warn!("Artifact {:?} cannot be inspected: {}", path, e);
                return false;
            }
        };

        if !metadata.is_file() {
            warn!("Artifact {:?} is not a regular file", path);
            return false;
        }

        if metadata.len() <= self.min_size {
            warn!(
                "Artifact {:?} is {} bytes, expected more than {}",
                path,
                metadata.len(),
                self.min_size
            );
            return false;
        }

        debug!("Artifact {:?} passed validation ({} bytes)", path, metadata.len());
        true
    }
}
