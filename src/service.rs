//! Facade over the registry, installer and panel
//!
//! HTTP routes, bot commands and the CLI all go through [`ControlPanel`] so they share one
//! installer and therefore one set of in-flight locks.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::{AppConfig, ConfigError};
use crate::error::{ControlError, InstallError, StatusError};
use crate::install::{InstallationRecord, InstalledPlugin, Installer, RemovalRecord};
use crate::panel::{
    ActionAck, CanonicalStatus, CraftyPanel, Panel, ScheduledAction, ServerControl,
    StatusReporter,
};
use crate::registry::types::{Project, SearchQuery, SearchResults};
use crate::registry::{ModrinthRegistry, Registry};

pub struct ControlPanel {
    registry: Arc<dyn Registry>,
    installer: Installer,
    status: StatusReporter,
    control: ServerControl,
}

impl ControlPanel {
    pub fn new(registry: Arc<dyn Registry>, panel: Arc<dyn Panel>, config: &AppConfig) -> Self {
        let server_id = config.panel.server_id.clone();
        Self {
            installer: Installer::from_config(Arc::clone(&registry), config),
            registry,
            status: StatusReporter::new(Arc::clone(&panel), server_id.clone()),
            control: ServerControl::new(panel, server_id),
        }
    }

    /// Builds the Modrinth and Crafty clients described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = ModrinthRegistry::with_timeout(
            &config.registry.base_url,
            Duration::from_millis(config.registry.timeout_ms),
        )
            .map_err(|e| ConfigError::Invalid(format!("registry client: {}", e)))?;
        let panel = CraftyPanel::new(&config.panel)
            .map_err(|e| ConfigError::Invalid(format!("panel client: {}", e)))?;

        Ok(Self::new(Arc::new(registry), Arc::new(panel), config))
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    pub async fn install_plugin(
        &self,
        project_id: &str,
        version_id: Option<&str>,
    ) -> Result<InstallationRecord, InstallError> {
        self.installer.install(project_id, version_id).await
    }

    pub async fn update_plugin(
        &self,
        project_id: &str,
        version_id: Option<&str>,
    ) -> Result<InstallationRecord, InstallError> {
        self.installer.update(project_id, version_id).await
    }

    /// Installs a jar already on local disk, e.g. one uploaded by a user
    pub async fn install_local(&self, source: &Path) -> Result<InstallationRecord, InstallError> {
        self.installer.install_local(source).await
    }

    pub async fn get_canonical_status(&self) -> Result<CanonicalStatus, StatusError> {
        self.status.current().await
    }

    /// Searches plugins compatible with the configured runtime
    pub async fn search(
        &self,
        query: &str,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<SearchResults, InstallError> {
        let mut search = SearchQuery::new(query).with_runtime(self.installer.runtime());
        if let Some(limit) = limit {
            search = search.with_page(limit, offset);
        } else {
            search.offset = offset;
        }
        debug!("Searching registry: {:?}", search);

        self.registry
            .search(&search)
            .await
            .map_err(InstallError::Transport)
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Project, InstallError> {
        self.registry
            .get_project(project_id)
            .await
            .map_err(|e| InstallError::from_registry(project_id, e))
    }

    pub async fn list_plugins(&self) -> Result<Vec<InstalledPlugin>, InstallError> {
        self.installer.list_plugins().await
    }

    pub async fn remove_plugin(&self, name: &str) -> Result<RemovalRecord, InstallError> {
        self.installer.remove_plugin(name).await
    }

    pub async fn start(&self) -> Result<ActionAck, ControlError> {
        self.control.start().await
    }

    pub async fn stop(&self) -> Result<ActionAck, ControlError> {
        self.control.stop().await
    }

    pub async fn restart(&self, delay_secs: u64) -> Result<ScheduledAction, ControlError> {
        self.control.restart(delay_secs).await
    }

    pub async fn logs(&self) -> Result<Vec<String>, ControlError> {
        self.control.logs().await
    }

    pub async fn send_command(&self, command: &str) -> Result<(), ControlError> {
        self.control.send_command(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::panel::client::MockPanel;
    use crate::registry::client::MockRegistry;
    use crate::registry::types::RuntimeTarget;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.runtime = RuntimeTarget::new("paper", Some("1.20.4"));
        config.panel.server_id = Some("1".to_string());
        config
    }

    #[tokio::test]
    async fn search_is_restricted_to_configured_runtime() {
        let mut registry = MockRegistry::new();
        registry
            .expect_search()
            .withf(|q| {
                q.query == "worldedit"
                    && q.loaders == vec!["paper".to_string()]
                    && q.game_versions == vec!["1.20.4".to_string()]
                    && q.limit == 5
                    && q.offset == 10
            })
            .times(1)
            .returning(|_| {
                Ok(SearchResults {
                    hits: vec![],
                    offset: 10,
                    limit: 5,
                    total: 0,
                })
            });

        let service = ControlPanel::new(Arc::new(registry), Arc::new(MockPanel::new()), &config());

        let results = service.search("worldedit", Some(5), 10).await.unwrap();

        assert_eq!(results.limit, 5);
    }

    #[tokio::test]
    async fn get_project_maps_not_found() {
        let mut registry = MockRegistry::new();
        registry
            .expect_get_project()
            .returning(|id| Err(RegistryError::NotFound(id.to_string())));

        let service = ControlPanel::new(Arc::new(registry), Arc::new(MockPanel::new()), &config());

        let result = service.get_project("missing").await;

        assert!(matches!(result, Err(InstallError::ProjectNotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn status_without_panel_is_not_configured() {
        let mut panel = MockPanel::new();
        panel.expect_is_configured().return_const(false);

        let service = ControlPanel::new(Arc::new(MockRegistry::new()), Arc::new(panel), &config());

        assert!(matches!(
            service.get_canonical_status().await,
            Err(StatusError::PanelNotConfigured)
        ));
    }

    #[test]
    fn from_config_rejects_half_configured_panel() {
        let mut config = config();
        config.panel.url = Some("https://panel.local:8443".to_string());

        assert!(matches!(
            ControlPanel::from_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }
}
