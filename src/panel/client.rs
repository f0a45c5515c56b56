//! Panel trait for querying and controlling a managed game server

#[cfg(test)]
use mockall::automock;
use serde::Serialize;

use crate::error::PanelError;
use crate::panel::payload::RawPayload;

/// Power actions the panel can run against a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerAction {
    Start,
    Stop,
    Restart,
}

impl ServerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

/// Trait for talking to the server-management panel
///
/// Every call may fail with a transport error; callers translate it into their own
/// error type.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Panel: Send + Sync {
    /// Whether URL and credentials are present
    fn is_configured(&self) -> bool;

    /// Live resource and player statistics
    async fn get_stats(&self, server_id: &str) -> Result<RawPayload, PanelError>;

    /// Publicly visible server information
    async fn get_public_info(&self, server_id: &str) -> Result<RawPayload, PanelError>;

    async fn run_action(&self, server_id: &str, action: ServerAction) -> Result<(), PanelError>;

    /// Recent console lines, oldest first
    async fn get_logs(&self, server_id: &str) -> Result<Vec<String>, PanelError>;

    /// Writes one line to the server console
    async fn send_command(&self, server_id: &str, command: &str) -> Result<(), PanelError>;
}
