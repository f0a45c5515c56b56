//! Registry trait for fetching projects, versions and artifacts from a marketplace

use std::path::Path;

#[cfg(test)]
use mockall::automock;

use crate::error::RegistryError;
use crate::registry::types::{Project, SearchQuery, SearchResults, Version};

/// Trait for talking to a plugin marketplace
///
/// Implementations hold no mutable state between calls.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Searches plugin projects
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, RegistryError>;

    /// Fetches display metadata for one project
    async fn get_project(&self, project_id: &str) -> Result<Project, RegistryError>;

    /// Fetches all published versions of a project
    ///
    /// # Returns
    /// * `Ok(Vec<Version>)` - Versions in registry order, newest first
    /// * `Err(RegistryError::NotFound)` - If the project does not exist
    async fn list_versions(&self, project_id: &str) -> Result<Vec<Version>, RegistryError>;

    /// Streams the artifact at `url` into `dest`
    ///
    /// Any non-success transport result is an error; `dest` may hold partial
    /// content afterwards and the caller owns its cleanup.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), RegistryError>;
}
