//! Power actions, console access and delayed restarts

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::MAX_RESTART_DELAY_SECS;
use crate::error::ControlError;
use crate::panel::client::{Panel, ServerAction};

/// Immediate acknowledgment of an accepted action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionAck {
    pub action: ServerAction,
    pub delay_secs: u64,
    /// RFC 3339 time the request was accepted
    pub scheduled_at: String,
}

/// A delayed action: the ack is returned right away, the task runs on its own
#[derive(Debug)]
pub struct ScheduledAction {
    pub ack: ActionAck,
    /// Present only for delayed actions; failures inside it are logged, not returned
    pub handle: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct ServerControl {
    panel: Arc<dyn Panel>,
    server_id: Option<String>,
}

impl ServerControl {
    pub fn new(panel: Arc<dyn Panel>, server_id: Option<String>) -> Self {
        Self { panel, server_id }
    }

    fn server_id(&self) -> Result<&str, ControlError> {
        match (&self.server_id, self.panel.is_configured()) {
            (Some(id), true) => Ok(id),
            _ => Err(ControlError::PanelNotConfigured),
        }
    }

    pub async fn start(&self) -> Result<ActionAck, ControlError> {
        self.run_now(ServerAction::Start).await
    }

    pub async fn stop(&self) -> Result<ActionAck, ControlError> {
        self.run_now(ServerAction::Stop).await
    }

    /// Restarts now, or after `delay_secs` without blocking the caller
    pub async fn restart(&self, delay_secs: u64) -> Result<ScheduledAction, ControlError> {
        if delay_secs > MAX_RESTART_DELAY_SECS {
            return Err(ControlError::InvalidDelay(delay_secs));
        }

        if delay_secs == 0 {
            let ack = self.run_now(ServerAction::Restart).await?;
            return Ok(ScheduledAction { ack, handle: None });
        }

        let server_id = self.server_id()?.to_string();
        let panel = Arc::clone(&self.panel);

        info!("Restart of server {} scheduled in {}s", server_id, delay_secs);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            match panel.run_action(&server_id, ServerAction::Restart).await {
                Ok(()) => info!("Scheduled restart of server {} completed", server_id),
                Err(e) => error!("Scheduled restart of server {} failed: {}", server_id, e),
            }
        });

        Ok(ScheduledAction {
            ack: ack(ServerAction::Restart, delay_secs),
            handle: Some(handle),
        })
    }

    pub async fn logs(&self) -> Result<Vec<String>, ControlError> {
        let server_id = self.server_id()?;
        Ok(self.panel.get_logs(server_id).await?)
    }

    pub async fn send_command(&self, command: &str) -> Result<(), ControlError> {
        let command = command.trim();
        if command.is_empty() || command.contains('\n') {
            return Err(ControlError::InvalidCommand(command.to_string()));
        }

        let server_id = self.server_id()?;
        info!("Sending console command to server {}: {}", server_id, command);
        Ok(self.panel.send_command(server_id, command).await?)
    }

    async fn run_now(&self, action: ServerAction) -> Result<ActionAck, ControlError> {
        let server_id = self.server_id()?;
        info!("Running {} on server {}", action.as_str(), server_id);
        self.panel.run_action(server_id, action).await?;
        Ok(ack(action, 0))
    }
}

fn ack(action: ServerAction, delay_secs: u64) -> ActionAck {
    ActionAck {
        action,
        delay_secs,
        scheduled_at: Utc::now().to_rfc3339(),
    }
}
