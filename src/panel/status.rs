//! Canonical status retrieval

use std::sync::Arc;

use futures::future::join;
use tracing::{debug, warn};

use crate::error::StatusError;
use crate::panel::client::Panel;
use crate::panel::normalizer::{CanonicalStatus, normalize};

pub struct StatusReporter {
    panel: Arc<dyn Panel>,
    server_id: Option<String>,
}

impl StatusReporter {
    pub fn new(panel: Arc<dyn Panel>, server_id: Option<String>) -> Self {
        Self { panel, server_id }
    }

    /// Fetches stats and public info concurrently and normalizes them
    ///
    /// The normalizer only runs on data the panel actually returned: an unconfigured
    /// panel or a failed stats call is an error, never a default-filled record.
    pub async fn current(&self) -> Result<CanonicalStatus, StatusError> {
        let server_id = match (&self.server_id, self.panel.is_configured()) {
            (Some(id), true) => id.as_str(),
            _ => return Err(StatusError::PanelNotConfigured),
        };

        let (stats, public) = join(
            self.panel.get_stats(server_id),
            self.panel.get_public_info(server_id),
        )
        .await;

        let stats = stats.map_err(StatusError::from)?;
        let raw = match public {
            Ok(public) => stats.merged_with(public),
            Err(e) => {
                warn!("Public info unavailable for server {}: {}", server_id, e);
                stats
            }
        };

        let status = normalize(&raw)?;
        debug!("Normalized status for server {}: {:?}", server_id, status);
        Ok(status)
    }
}
