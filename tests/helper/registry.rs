//! Registry test utilities

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use panel_relay::error::RegistryError;
use panel_relay::registry::Registry;
use panel_relay::registry::types::{
    Project, SearchQuery, SearchResults, Version, VersionFile,
};

pub const ARTIFACT_SIZE: usize = 4096;

/// In-memory registry that writes `artifact_size` bytes on download
pub struct FakeRegistry {
    versions: HashMap<String, Vec<Version>>,
    artifact_size: usize,
    hold: Option<DownloadHold>,
    hang: bool,
    stalled_listings: AtomicUsize,
    downloads: AtomicUsize,
}

/// Parks downloads until released, signalling when one has started
#[derive(Clone, Default)]
pub struct DownloadHold {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            versions: HashMap::new(),
            artifact_size: ARTIFACT_SIZE,
            hold: None,
            hang: false,
            stalled_listings: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn with_versions(mut self, project_id: &str, versions: Vec<Version>) -> Self {
        self.versions.insert(project_id.to_string(), versions);
        self
    }

    pub fn with_artifact_size(mut self, size: usize) -> Self {
        self.artifact_size = size;
        self
    }

    pub fn with_hold(mut self, hold: DownloadHold) -> Self {
        self.hold = Some(hold);
        self
    }

    /// Downloads never complete
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// The next `count` version listings never complete
    pub fn with_stalled_listings(self, count: usize) -> Self {
        self.stalled_listings.store(count, Ordering::SeqCst);
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, RegistryError> {
        Ok(SearchResults {
            hits: vec![],
            offset: query.offset,
            limit: query.effective_limit(),
            total: 0,
        })
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, RegistryError> {
        if !self.versions.contains_key(project_id) {
            return Err(RegistryError::NotFound(project_id.to_string()));
        }
        Ok(Project {
            id: project_id.to_string(),
            slug: project_id.to_string(),
            title: project_id.to_string(),
            description: String::new(),
            downloads: 0,
            follows: 0,
            categories: vec![],
            icon_url: None,
            project_type: "plugin".to_string(),
        })
    }

    async fn list_versions(&self, project_id: &str) -> Result<Vec<Version>, RegistryError> {
        let stall = self
            .stalled_listings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stall {
            std::future::pending::<()>().await;
        }

        self.versions
            .get(project_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(project_id.to_string()))
    }

    async fn download(&self, _url: &str, dest: &Path) -> Result<(), RegistryError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);

        if self.hang {
            std::future::pending::<()>().await;
        }

        if let Some(hold) = &self.hold {
            hold.started.notify_one();
            hold.release.notified().await;
        }

        tokio::fs::write(dest, vec![0x50; self.artifact_size]).await?;
        Ok(())
    }
}

/// A version with a single jar file for the given loaders
pub fn jar_version(id: &str, loaders: &[&str], filename: &str) -> Version {
    Version {
        id: id.to_string(),
        version_number: format!("{}.0.0", id.trim_start_matches('v')),
        loaders: loaders.iter().map(|s| s.to_string()).collect(),
        game_versions: vec!["1.20.4".to_string()],
        files: vec![VersionFile {
            url: format!("https://cdn.example/{}/{}", id, filename),
            filename: filename.to_string(),
            size: 0,
        }],
    }
}
