//! Modrinth v2 API implementation

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::DEFAULT_REGISTRY_TIMEOUT_MS;
use crate::error::RegistryError;
use crate::registry::client::Registry;
use crate::registry::types::{
    Project, SearchHit, SearchQuery, SearchResults, Version, VersionFile,
};

#[derive(Debug, Deserialize)]
struct ModrinthSearchResponse {
    hits: Vec<ModrinthHit>,
    offset: u32,
    limit: u32,
    total_hits: u64,
}

#[derive(Debug, Deserialize)]
struct ModrinthHit {
    project_id: String,
    slug: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    follows: u64,
    #[serde(default)]
    categories: Vec<String>,
    icon_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModrinthProject {
    id: String,
    slug: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    followers: u64,
    #[serde(default)]
    categories: Vec<String>,
    icon_url: Option<String>,
    project_type: String,
}

#[derive(Debug, Deserialize)]
struct ModrinthVersion {
    id: String,
    version_number: String,
    #[serde(default)]
    loaders: Vec<String>,
    #[serde(default)]
    game_versions: Vec<String>,
    #[serde(default)]
    files: Vec<ModrinthFile>,
}

#[derive(Debug, Deserialize)]
struct ModrinthFile {
    url: String,
    filename: String,
    #[serde(default)]
    size: u64,
}

impl From<ModrinthVersion> for Version {
    fn from(v: ModrinthVersion) -> Self {
        Self {
            id: v.id,
            version_number: v.version_number,
            loaders: v.loaders,
            game_versions: v.game_versions,
            files: v
                .files
                .into_iter()
                .map(|f| VersionFile {
                    url: f.url,
                    filename: f.filename,
                    size: f.size,
                })
                .collect(),
        }
    }
}

/// Registry implementation for the Modrinth API
#[derive(Clone)]
pub struct ModrinthRegistry {
    client: Client,
    base_url: String,
}

impl ModrinthRegistry {
    /// Creates a new ModrinthRegistry with a custom base URL
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        Self::with_timeout(base_url, Duration::from_millis(DEFAULT_REGISTRY_TIMEOUT_MS))
    }

    /// `timeout` bounds connecting and each read, not a whole streamed download
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .user_agent(concat!("panel-relay/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Builds the `facets` parameter: plugins only, loaders OR'd, game versions OR'd
    fn build_facets(query: &SearchQuery) -> String {
        let mut facets = vec![vec!["project_type:plugin".to_string()]];

        if !query.loaders.is_empty() {
            facets.push(
                query
                    .loaders
                    .iter()
                    .map(|l| format!("categories:{}", l.to_lowercase()))
                    .collect(),
            );
        }

        if !query.game_versions.is_empty() {
            facets.push(
                query
                    .game_versions
                    .iter()
                    .map(|v| format!("versions:{}", v))
                    .collect(),
            );
        }

        json!(facets).to_string()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        not_found: &str,
    ) -> Result<T, RegistryError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(not_found.to_string()));
        }

        if !status.is_success() {
            warn!("Modrinth returned status {}: {}", status, url);
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        response.json().await.map_err(|e| {
            warn!("Failed to parse Modrinth response from {}: {}", url, e);
            RegistryError::InvalidResponse(e.to_string())
        })
    }

    /// Base URL extended with `segments`, each percent-encoded as a single path segment
    fn url(&self, segments: &[&str]) -> Result<Url, RegistryError> {
        let invalid =
            |reason: String| RegistryError::InvalidResponse(format!("Invalid URL: {}", reason));

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Registry for ModrinthRegistry {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, RegistryError> {
        let limit = query.effective_limit().to_string();
        let offset = query.offset.to_string();
        let facets = Self::build_facets(query);

        let url = Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[
                ("query", query.query.as_str()),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
                ("facets", facets.as_str()),
            ],
        )
        .map_err(|e| RegistryError::InvalidResponse(format!("Invalid URL: {}", e)))?;

        debug!("Searching Modrinth: {}", url);
        let response: ModrinthSearchResponse = self.get_json(url, &query.query).await?;

        Ok(SearchResults {
            hits: response
                .hits
                .into_iter()
                .map(|hit| SearchHit {
                    project_id: hit.project_id,
                    slug: hit.slug,
                    title: hit.title,
                    description: hit.description,
                    downloads: hit.downloads,
                    follows: hit.follows,
                    categories: hit.categories,
                    icon_url: hit.icon_url,
                })
                .collect(),
            offset: response.offset,
            limit: response.limit,
            total: response.total_hits,
        })
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, RegistryError> {
        let url = self.url(&["project", project_id])?;
        let project: ModrinthProject = self.get_json(url, project_id).await?;

        Ok(Project {
            id: project.id,
            slug: project.slug,
            title: project.title,
            description: project.description,
            downloads: project.downloads,
            follows: project.followers,
            categories: project.categories,
            icon_url: project.icon_url,
            project_type: project.project_type,
        })
    }

    async fn list_versions(&self, project_id: &str) -> Result<Vec<Version>, RegistryError> {
        let url = self.url(&["project", project_id, "version"])?;
        let versions: Vec<ModrinthVersion> = self.get_json(url, project_id).await?;

        debug!(
            "Found {} versions for project {}",
            versions.len(),
            project_id
        );

        Ok(versions.into_iter().map(Version::from).collect())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), RegistryError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(url.to_string()));
        }

        if !status.is_success() {
            warn!("Download returned status {}: {}", status, url);
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        debug!("Downloaded {} bytes from {} to {:?}", written, url, dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use tempfile::TempDir;

    #[tokio::test]
    async fn list_versions_preserves_registry_order() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/project/worldedit/version")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {
                        "id": "v3",
                        "version_number": "7.3.0",
                        "loaders": ["paper", "spigot"],
                        "game_versions": ["1.20.4"],
                        "files": [
                            {"url": "https://cdn.example/we-7.3.0.jar", "filename": "we-7.3.0.jar", "size": 4096, "primary": true}
                        ]
                    },
                    {
                        "id": "v1",
                        "version_number": "7.1.0",
                        "loaders": ["fabric"],
                        "game_versions": ["1.19.4"],
                        "files": []
                    }
                ]"#,
            )
            .create_async()
            .await;

        let registry = ModrinthRegistry::new(&server.url()).unwrap();
        let result = registry.list_versions("worldedit").await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            result.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(),
            vec!["v3", "v1"]
        );
        assert_eq!(
            result[0].files,
            vec![VersionFile {
                url: "https://cdn.example/we-7.3.0.jar".to_string(),
                filename: "we-7.3.0.jar".to_string(),
                size: 4096,
            }]
        );
        assert_eq!(result[0].loaders, vec!["paper", "spigot"]);
    }

    #[tokio::test]
    async fn list_versions_returns_not_found_for_nonexistent_project() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/project/missing/version")
            .with_status(404)
            .with_body(r#"{"error": "not_found"}"#)
            .create_async()
            .await;

        let registry = ModrinthRegistry::new(&server.url()).unwrap();
        let result = registry.list_versions("missing").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_versions_rejects_malformed_payload() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/project/broken/version")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"not": "a list"}"#)
            .create_async()
            .await;

        let registry = ModrinthRegistry::new(&server.url()).unwrap();
        let result = registry.list_versions("broken").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn search_sends_plugin_facets_and_maps_hits() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "essentials".into()),
                Matcher::UrlEncoded("limit".into(), "5".into()),
                Matcher::UrlEncoded("offset".into(), "10".into()),
                Matcher::UrlEncoded(
                    "facets".into(),
                    r#"[["project_type:plugin"],["categories:paper"],["versions:1.20.4"]]"#.into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "hits": [
                        {
                            "project_id": "abc123",
                            "slug": "essentialsx",
                            "title": "EssentialsX",
                            "description": "The essential plugin suite",
                            "downloads": 1000,
                            "follows": 50,
                            "categories": ["utility"],
                            "project_type": "plugin",
                            "date_modified": "2024-01-01T00:00:00Z"
                        }
                    ],
                    "offset": 10,
                    "limit": 5,
                    "total_hits": 11
                }"#,
            )
            .create_async()
            .await;

        let registry = ModrinthRegistry::new(&server.url()).unwrap();
        let query = SearchQuery {
            query: "essentials".to_string(),
            limit: 5,
            offset: 10,
            loaders: vec!["Paper".to_string()],
            game_versions: vec!["1.20.4".to_string()],
        };
        let result = registry.search(&query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.total, 11);
        assert_eq!(result.offset, 10);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].project_id, "abc123");
        assert_eq!(result.hits[0].icon_url, None);
    }

    #[tokio::test]
    async fn get_project_maps_followers() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/project/abc123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "id": "abc123",
                    "slug": "essentialsx",
                    "title": "EssentialsX",
                    "description": "The essential plugin suite",
                    "downloads": 1000,
                    "followers": 77,
                    "categories": ["utility"],
                    "icon_url": "https://cdn.example/icon.png",
                    "project_type": "plugin"
                }"#,
            )
            .create_async()
            .await;

        let registry = ModrinthRegistry::new(&server.url()).unwrap();
        let project = registry.get_project("abc123").await.unwrap();

        mock.assert_async().await;
        assert_eq!(project.follows, 77);
        assert_eq!(project.icon_url.as_deref(), Some("https://cdn.example/icon.png"));
    }

    #[tokio::test]
    async fn download_writes_body_to_destination() {
        let mut server = Server::new_async().await;
        let body = vec![7u8; 4096];

        let mock = server
            .mock("GET", "/files/plugin.jar")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("plugin.jar");
        let registry = ModrinthRegistry::new(&server.url()).unwrap();

        registry
            .download(&format!("{}/files/plugin.jar", server.url()), &dest)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn download_fails_on_server_error() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/files/plugin.jar")
            .with_status(500)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("plugin.jar");
        let registry = ModrinthRegistry::new(&server.url()).unwrap();

        let result = registry
            .download(&format!("{}/files/plugin.jar", server.url()), &dest)
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn list_versions_handles_network_error() {
        // Use an invalid URL to trigger a network error
        let registry = ModrinthRegistry::new("http://invalid.localhost.test:99999").unwrap();
        let result = registry.list_versions("worldedit").await;

        assert!(matches!(
            result,
            Err(RegistryError::Network(_)) | Err(RegistryError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn project_id_is_encoded_as_single_path_segment() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/v2/project/a%2Fb%3Fc%23d/version")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let registry = ModrinthRegistry::new(&format!("{}/v2/", server.url())).unwrap();
        let result = registry.list_versions("a/b?c#d").await.unwrap();

        mock.assert_async().await;
        assert!(result.is_empty());
    }

    #[test]
    fn build_facets_without_runtime_only_filters_plugins() {
        let facets = ModrinthRegistry::build_facets(&SearchQuery::new("x"));
        assert_eq!(facets, r#"[["project_type:plugin"]]"#);
    }
}
