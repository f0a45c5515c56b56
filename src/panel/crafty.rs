//! Crafty Controller v2 API implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::PanelConfig;
use crate::error::PanelError;
use crate::panel::client::{Panel, ServerAction};
use crate::panel::payload::RawPayload;

/// Crafty Controller client
pub struct CraftyPanel {
    client: Client,
    base_url: Option<String>,
    token: Option<String>,
}

impl CraftyPanel {
    pub fn new(config: &PanelConfig) -> Result<Self, PanelError> {
        let client = Client::builder()
            .user_agent(concat!("panel-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(config.allow_insecure)
            .build()?;

        if config.allow_insecure {
            warn!("Panel TLS certificate verification is disabled");
        }

        Ok(Self {
            client,
            base_url: config
                .url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            token: config.token.clone(),
        })
    }

    fn action_path(action: ServerAction) -> &'static str {
        match action {
            ServerAction::Start => "start_server",
            ServerAction::Stop => "stop_server",
            ServerAction::Restart => "restart_server",
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        server_id: &str,
        suffix: &str,
    ) -> Result<RequestBuilder, PanelError> {
        let (Some(base_url), Some(token)) = (&self.base_url, &self.token) else {
            return Err(PanelError::NotConfigured);
        };

        let url = format!("{}/api/v2/servers/{}{}", base_url, server_id, suffix);
        debug!("Panel request {} {}", method, url);

        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, PanelError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!("Panel returned status {}", status);
            let message = if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                format!("Panel rejected credentials: {}", status)
            } else {
                format!("Unexpected status: {}", status)
            };
            return Err(PanelError::InvalidResponse(message));
        }

        Ok(response)
    }

    async fn get_payload(&self, server_id: &str, suffix: &str) -> Result<RawPayload, PanelError> {
        let request = self.request(reqwest::Method::GET, server_id, suffix)?;
        self.send(request)
            .await?
            .json::<RawPayload>()
            .await
            .map_err(|e| PanelError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Panel for CraftyPanel {
    fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.token.is_some()
    }

    async fn get_stats(&self, server_id: &str) -> Result<RawPayload, PanelError> {
        self.get_payload(server_id, "/stats").await
    }

    async fn get_public_info(&self, server_id: &str) -> Result<RawPayload, PanelError> {
        self.get_payload(server_id, "/public").await
    }

    async fn run_action(&self, server_id: &str, action: ServerAction) -> Result<(), PanelError> {
        let suffix = format!("/action/{}", Self::action_path(action));
        let request = self.request(reqwest::Method::POST, server_id, &suffix)?;
        self.send(request).await?;
        Ok(())
    }

    async fn get_logs(&self, server_id: &str) -> Result<Vec<String>, PanelError> {
        let payload = self.get_payload(server_id, "/logs").await?;

        let lines = match payload.as_value().get("data") {
            Some(serde_json::Value::Array(lines)) => lines,
            _ => {
                return Err(PanelError::InvalidResponse(
                    "logs response has no data array".to_string(),
                ));
            }
        };

        Ok(lines
            .iter()
            .filter_map(|line| line.as_str().map(str::to_string))
            .collect())
    }

    async fn send_command(&self, server_id: &str, command: &str) -> Result<(), PanelError> {
        let request = self
            .request(reqwest::Method::POST, server_id, "/stdin")?
            .json(&json!({ "stdin": command }));
        self.send(request).await?;
        Ok(())
    }
}
