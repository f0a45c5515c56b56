//! Panel test utilities

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use panel_relay::error::PanelError;
use panel_relay::panel::{Panel, RawPayload, ServerAction};

/// Panel returning canned payloads and recording actions
pub struct FakePanel {
    configured: bool,
    stats: Result<Value, String>,
    public: Result<Value, String>,
    fail_actions: bool,
    actions: Mutex<Vec<ServerAction>>,
    commands: Mutex<Vec<String>>,
    fetches: AtomicUsize,
}

impl FakePanel {
    pub fn new(stats: Value) -> Self {
        Self {
            configured: true,
            stats: Ok(stats),
            public: Ok(Value::Object(Default::default())),
            fail_actions: false,
            actions: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(Value::Null)
        }
    }

    pub fn with_public(mut self, public: Value) -> Self {
        self.public = Ok(public);
        self
    }

    pub fn with_failing_stats(mut self, message: &str) -> Self {
        self.stats = Err(message.to_string());
        self
    }

    pub fn with_failing_public(mut self, message: &str) -> Self {
        self.public = Err(message.to_string());
        self
    }

    pub fn with_failing_actions(mut self) -> Self {
        self.fail_actions = true;
        self
    }

    pub fn actions(&self) -> Vec<ServerAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn canned(&self, payload: &Result<Value, String>) -> Result<RawPayload, PanelError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.configured {
            return Err(PanelError::NotConfigured);
        }
        payload
            .clone()
            .map(RawPayload::new)
            .map_err(PanelError::InvalidResponse)
    }
}

#[async_trait]
impl Panel for FakePanel {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn get_stats(&self, _server_id: &str) -> Result<RawPayload, PanelError> {
        self.canned(&self.stats)
    }

    async fn get_public_info(&self, _server_id: &str) -> Result<RawPayload, PanelError> {
        self.canned(&self.public)
    }

    async fn run_action(&self, _server_id: &str, action: ServerAction) -> Result<(), PanelError> {
        self.actions.lock().unwrap().push(action);
        if self.fail_actions {
            return Err(PanelError::InvalidResponse("Unexpected status: 500".to_string()));
        }
        Ok(())
    }

    async fn get_logs(&self, _server_id: &str) -> Result<Vec<String>, PanelError> {
        Ok(vec!["[INFO] Done (3.2s)!".to_string()])
    }

    async fn send_command(&self, _server_id: &str, command: &str) -> Result<(), PanelError> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(())
    }
}
