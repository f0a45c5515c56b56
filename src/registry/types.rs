//! Marketplace data model shared by the registry client and the installer

use serde::{Deserialize, Serialize};

/// Default number of search hits per page
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Largest page size the marketplace accepts
pub const MAX_SEARCH_LIMIT: u32 = 100;

/// Display metadata for a marketplace project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub downloads: u64,
    pub follows: u64,
    pub categories: Vec<String>,
    pub icon_url: Option<String>,
    pub project_type: String,
}

/// One row of a search result page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub project_id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub downloads: u64,
    pub follows: u64,
    pub categories: Vec<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub offset: u32,
    pub limit: u32,
    pub total: u64,
}

/// Search parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub limit: u32,
    pub offset: u32,
    pub loaders: Vec<String>,
    pub game_versions: Vec<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
            loaders: Vec::new(),
            game_versions: Vec::new(),
        }
    }

    pub fn with_page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn with_runtime(mut self, runtime: &RuntimeTarget) -> Self {
        self.loaders = vec![runtime.loader.clone()];
        self.game_versions = runtime.game_version.iter().cloned().collect();
        self
    }

    /// Page size clamped to what the marketplace accepts
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_SEARCH_LIMIT)
    }
}

/// A published version of a project
///
/// Versions arrive in registry order (newest first); nothing downstream re-sorts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub version_number: String,
    pub loaders: Vec<String>,
    pub game_versions: Vec<String>,
    pub files: Vec<VersionFile>,
}

impl Version {
    /// Whether this version declares support for the given runtime
    pub fn supports(&self, runtime: &RuntimeTarget) -> bool {
        let loader_ok = self
            .loaders
            .iter()
            .any(|l| l.eq_ignore_ascii_case(&runtime.loader));

        let game_version_ok = match &runtime.game_version {
            Some(gv) => self.game_versions.iter().any(|v| v.eq_ignore_ascii_case(gv)),
            None => true,
        };

        loader_ok && game_version_ok
    }
}

/// A downloadable file belonging to a version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionFile {
    pub url: String,
    pub filename: String,
    pub size: u64,
}

/// Loader and game version the server declares, used only for matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeTarget {
    pub loader: String,
    pub game_version: Option<String>,
}

impl Default for RuntimeTarget {
    fn default() -> Self {
        Self {
            loader: "paper".to_string(),
            game_version: None,
        }
    }
}

impl RuntimeTarget {
    pub fn new(loader: &str, game_version: Option<&str>) -> Self {
        Self {
            loader: loader.to_string(),
            game_version: game_version.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn version(loaders: &[&str], game_versions: &[&str]) -> Version {
        Version {
            id: "v".to_string(),
            version_number: "1.0.0".to_string(),
            loaders: loaders.iter().map(|s| s.to_string()).collect(),
            game_versions: game_versions.iter().map(|s| s.to_string()).collect(),
            files: vec![],
        }
    }

    #[rstest]
    #[case(&["paper"], &["1.20.4"], RuntimeTarget::new("paper", None), true)]
    #[case(&["Paper"], &["1.20.4"], RuntimeTarget::new("paper", Some("1.20.4")), true)]
    #[case(&["paper"], &["1.20.1"], RuntimeTarget::new("paper", Some("1.20.4")), false)]
    #[case(&["fabric"], &["1.20.4"], RuntimeTarget::new("paper", Some("1.20.4")), false)]
    #[case(&[], &[], RuntimeTarget::new("paper", None), false)]
    fn supports_matches_loader_and_optional_game_version(
        #[case] loaders: &[&str],
        #[case] game_versions: &[&str],
        #[case] runtime: RuntimeTarget,
        #[case] expected: bool,
    ) {
        assert_eq!(version(loaders, game_versions).supports(&runtime), expected);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(25, 25)]
    #[case(500, MAX_SEARCH_LIMIT)]
    fn effective_limit_is_clamped(#[case] limit: u32, #[case] expected: u32) {
        let query = SearchQuery::new("worldedit").with_page(limit, 0);
        assert_eq!(query.effective_limit(), expected);
    }

    #[test]
    fn with_runtime_copies_loader_and_game_version() {
        let query = SearchQuery::new("essentials")
            .with_runtime(&RuntimeTarget::new("paper", Some("1.21")));

        assert_eq!(query.loaders, vec!["paper".to_string()]);
        assert_eq!(query.game_versions, vec!["1.21".to_string()]);
    }
}
