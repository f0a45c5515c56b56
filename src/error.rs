use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Stable machine-readable classification for errors that reach callers
pub trait ErrorCode {
    /// SCREAMING_SNAKE_CASE code that never changes between releases
    fn code(&self) -> &'static str;

    /// HTTP-equivalent status: 4xx for caller errors, 5xx for system errors
    fn status_code(&self) -> u16;

    fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error while writing download: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),
}

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Panel not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("No versions available")]
    NoVersionsAvailable,

    #[error("requested version not found: {requested}")]
    NoCompatibleVersion { requested: String },

    #[error("Version {version_id} has no installable file")]
    NoInstallableFile { version_id: String },
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("No versions available for project {0}")]
    NoVersionsAvailable(String),

    #[error("requested version not found: {requested}")]
    NoCompatibleVersion { requested: String },

    #[error("Version {version_id} has no installable file")]
    NoInstallableFile { version_id: String },

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Installation already in progress for {0}")]
    AlreadyInProgress(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Installation failed: {message}")]
    InstallationFailed {
        message: String,
        /// Backup left behind when the displaced artifact could not be restored
        backup_path: Option<PathBuf>,
    },

    #[error("Registry transport error: {0}")]
    Transport(RegistryError),
}

impl InstallError {
    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self::InstallationFailed {
            message: message.into(),
            backup_path: None,
        }
    }

    pub(crate) fn from_resolve(project_id: &str, err: ResolveError) -> Self {
        match err {
            ResolveError::NoVersionsAvailable => Self::NoVersionsAvailable(project_id.to_string()),
            ResolveError::NoCompatibleVersion { requested } => {
                Self::NoCompatibleVersion { requested }
            }
            ResolveError::NoInstallableFile { version_id } => {
                Self::NoInstallableFile { version_id }
            }
        }
    }

    pub(crate) fn from_registry(project_id: &str, err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => Self::ProjectNotFound(project_id.to_string()),
            other => Self::Transport(other),
        }
    }
}

impl ErrorCode for InstallError {
    fn code(&self) -> &'static str {
        match self {
            Self::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            Self::NoVersionsAvailable(_) => "NO_VERSIONS_AVAILABLE",
            Self::NoCompatibleVersion { .. } => "NO_COMPATIBLE_VERSION",
            Self::NoInstallableFile { .. } => "NO_INSTALLABLE_FILE",
            Self::InvalidArtifact(_) => "INVALID_ARTIFACT",
            Self::AlreadyInProgress(_) => "ALREADY_IN_PROGRESS",
            Self::PluginNotFound(_) => "PLUGIN_NOT_FOUND",
            Self::DownloadFailed(_) => "DOWNLOAD_FAILED",
            Self::InstallationFailed { .. } => "INSTALLATION_FAILED",
            Self::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    fn status_code(&self) -> u16 {
        match self {
            Self::ProjectNotFound(_) | Self::NoVersionsAvailable(_) | Self::PluginNotFound(_) => {
                404
            }
            Self::NoCompatibleVersion { .. }
            | Self::NoInstallableFile { .. }
            | Self::InvalidArtifact(_) => 422,
            Self::AlreadyInProgress(_) => 409,
            Self::DownloadFailed(_) | Self::Transport(_) => 502,
            Self::InstallationFailed { .. } => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Panel not configured or unreachable")]
    PanelNotConfigured,

    #[error("Status unavailable: {0}")]
    StatusUnavailable(String),

    #[error("Panel transport error: {0}")]
    Transport(PanelError),
}

impl From<PanelError> for StatusError {
    fn from(err: PanelError) -> Self {
        match err {
            PanelError::NotConfigured => Self::PanelNotConfigured,
            other => Self::Transport(other),
        }
    }
}

impl ErrorCode for StatusError {
    fn code(&self) -> &'static str {
        match self {
            Self::PanelNotConfigured => "PANEL_NOT_CONFIGURED",
            Self::StatusUnavailable(_) => "STATUS_UNAVAILABLE",
            Self::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    fn status_code(&self) -> u16 {
        match self {
            Self::PanelNotConfigured | Self::StatusUnavailable(_) => 503,
            Self::Transport(_) => 502,
        }
    }
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Panel not configured")]
    PanelNotConfigured,

    #[error("Invalid delay: {0}s (maximum is {max}s)", max = crate::config::MAX_RESTART_DELAY_SECS)]
    InvalidDelay(u64),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Panel transport error: {0}")]
    Transport(PanelError),
}

impl From<PanelError> for ControlError {
    fn from(err: PanelError) -> Self {
        match err {
            PanelError::NotConfigured => Self::PanelNotConfigured,
            other => Self::Transport(other),
        }
    }
}

impl ErrorCode for ControlError {
    fn code(&self) -> &'static str {
        match self {
            Self::PanelNotConfigured => "PANEL_NOT_CONFIGURED",
            Self::InvalidDelay(_) => "INVALID_DELAY",
            Self::InvalidCommand(_) => "INVALID_COMMAND",
            Self::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    fn status_code(&self) -> u16 {
        match self {
            Self::PanelNotConfigured => 503,
            Self::InvalidDelay(_) | Self::InvalidCommand(_) => 400,
            Self::Transport(_) => 502,
        }
    }
}

/// Error envelope sent to HTTP and bot callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub status_code: u16,
}

impl ErrorBody {
    pub fn from_error<E: ErrorCode + std::fmt::Display>(err: &E) -> Self {
        Self {
            error: ErrorDetail {
                code: err.code().to_string(),
                message: err.to_string(),
                status_code: err.status_code(),
            },
        }
    }
}
