//! Installation pipeline: resolve, download, validate, back up and replace
//!
//! The installer owns the staging file and the target artifact for the whole duration of a
//! call. Every call holds two single-flight keys: `project:<id>` for its whole lifetime and
//! `file:<filename>` from the moment the target filename is known.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{
    AppConfig, BACKUP_DIR_NAME, DEFAULT_DOWNLOAD_TIMEOUT_MS, DEFAULT_REGISTRY_TIMEOUT_MS,
    staging_overlaps,
};
use crate::error::{InstallError, RegistryError};
use crate::install::lock::{InFlight, InFlightGuard};
use crate::install::resolver::{ARTIFACT_EXTENSION, resolve};
use crate::install::validator::ArtifactValidator;
use crate::registry::client::Registry;
use crate::registry::types::{RuntimeTarget, VersionFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    Install,
    Update,
    /// A jar supplied by the caller instead of the registry
    Local,
}

/// Distinguishes staged files of concurrent calls and processes
static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Outcome of one successful install or update; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationRecord {
    /// Empty for local installs
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    pub mode: InstallMode,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version_number: String,
    pub filename: String,
    pub path: PathBuf,
    /// Where the displaced artifact was moved, if one existed
    pub backup_path: Option<PathBuf>,
    /// The caller asked for a version id the registry no longer lists
    pub requested_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPlugin {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalRecord {
    pub name: String,
    pub backup_path: PathBuf,
}

pub struct Installer {
    registry: Arc<dyn Registry>,
    runtime: RuntimeTarget,
    plugin_dir: PathBuf,
    staging_dir: PathBuf,
    validator: ArtifactValidator,
    download_timeout: Duration,
    metadata_timeout: Duration,
    in_flight: InFlight,
}

impl Installer {
    pub fn new(
        registry: Arc<dyn Registry>,
        runtime: RuntimeTarget,
        plugin_dir: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            runtime,
            plugin_dir: plugin_dir.into(),
            staging_dir: staging_dir.into(),
            validator: ArtifactValidator::default(),
            download_timeout: Duration::from_millis(DEFAULT_DOWNLOAD_TIMEOUT_MS),
            metadata_timeout: Duration::from_millis(DEFAULT_REGISTRY_TIMEOUT_MS),
            in_flight: InFlight::new(),
        }
    }

    pub fn from_config(registry: Arc<dyn Registry>, config: &AppConfig) -> Self {
        Self::new(
            registry,
            config.runtime.clone(),
            config.plugins.dir.clone(),
            config.plugins.staging_dir(),
        )
        .with_validator(ArtifactValidator::new(config.plugins.min_artifact_size))
        .with_download_timeout(Duration::from_millis(config.plugins.download_timeout_ms))
        .with_metadata_timeout(Duration::from_millis(config.registry.timeout_ms))
    }

    pub fn with_validator(mut self, validator: ArtifactValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Deadline for fetching the version list while the project lock is held
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn runtime(&self) -> &RuntimeTarget {
        &self.runtime
    }

    pub fn backup_root(&self) -> PathBuf {
        self.plugin_dir.join(BACKUP_DIR_NAME)
    }

    pub async fn install(
        &self,
        project_id: &str,
        version_id: Option<&str>,
    ) -> Result<InstallationRecord, InstallError> {
        self.run(project_id, version_id, InstallMode::Install).await
    }

    /// Same pipeline as [`Installer::install`]; expected to displace an existing artifact
    pub async fn update(
        &self,
        project_id: &str,
        version_id: Option<&str>,
    ) -> Result<InstallationRecord, InstallError> {
        self.run(project_id, version_id, InstallMode::Update).await
    }

    async fn run(
        &self,
        project_id: &str,
        version_id: Option<&str>,
        mode: InstallMode,
    ) -> Result<InstallationRecord, InstallError> {
        let _project_guard = self.acquire(&format!("project:{}", project_id), project_id)?;

        info!(
            "Starting {:?} of {} (requested version: {:?})",
            mode, project_id, version_id
        );

        let versions = tokio::time::timeout(
            self.metadata_timeout,
            self.registry.list_versions(project_id),
        )
        .await
        .map_err(|_| {
            error!(
                "Listing versions of {} timed out after {}ms",
                project_id,
                self.metadata_timeout.as_millis()
            );
            InstallError::Transport(RegistryError::Timeout(format!(
                "version list for {} after {}ms",
                project_id,
                self.metadata_timeout.as_millis()
            )))
        })?
        .map_err(|e| InstallError::from_registry(project_id, e))?;

        let resolution = resolve(&versions, version_id, &self.runtime)
            .map_err(|e| InstallError::from_resolve(project_id, e))?;

        if resolution.requested_missing {
            warn!(
                "Requested version {:?} of {} not found, using compatible version {}",
                version_id, project_id, resolution.version.id
            );
        }
        debug!(
            "Resolved {} to version {} ({:?}), file {}",
            project_id, resolution.version.id, resolution.kind, resolution.file.filename
        );

        let filename = safe_filename(&resolution.file.filename)
            .ok_or_else(|| {
                InstallError::InvalidArtifact(format!(
                    "unsafe filename from registry: {:?}",
                    resolution.file.filename
                ))
            })?
            .to_string();

        let _file_guard = self.acquire(&format!("file:{}", filename), &filename)?;

        let staged = self.download(resolution.file, &filename).await?;

        let (path, backup_path) = match self.replace(&staged, &filename).await {
            Ok(placed) => placed,
            Err(e) => {
                discard_staged(&staged).await;
                return Err(e);
            }
        };

        info!(
            "Installed {} version {} as {:?}",
            project_id, resolution.version.id, path
        );

        Ok(InstallationRecord {
            project_id: project_id.to_string(),
            mode,
            version_id: resolution.version.id.clone(),
            version_number: resolution.version.version_number.clone(),
            filename,
            path,
            backup_path,
            requested_missing: resolution.requested_missing,
        })
    }

    /// Installs a jar from the local filesystem through the same validate, backup and
    /// replace steps as a registry install; `source` itself is only read
    pub async fn install_local(&self, source: &Path) -> Result<InstallationRecord, InstallError> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(safe_filename)
            .ok_or_else(|| {
                InstallError::InvalidArtifact(format!("unsafe file name: {:?}", source))
            })?
            .to_string();

        let _file_guard = self.acquire(&format!("file:{}", filename), &filename)?;
        info!("Starting local install of {:?}", source);

        let staged = self.staging_path(&filename).await?;
        if let Err(e) = tokio::fs::copy(source, &staged).await {
            discard_staged(&staged).await;
            return Err(InstallError::InvalidArtifact(format!(
                "cannot read {:?}: {}",
                source, e
            )));
        }
        self.check_staged(&staged, &filename, 0).await?;

        let (path, backup_path) = match self.replace(&staged, &filename).await {
            Ok(placed) => placed,
            Err(e) => {
                discard_staged(&staged).await;
                return Err(e);
            }
        };

        info!("Installed local artifact {:?} as {:?}", source, path);

        Ok(InstallationRecord {
            project_id: String::new(),
            mode: InstallMode::Local,
            version_id: String::new(),
            version_number: String::new(),
            filename,
            path,
            backup_path,
            requested_missing: false,
        })
    }

    /// Lists jar files directly inside the plugin directory, sorted by name
    pub async fn list_plugins(&self) -> Result<Vec<InstalledPlugin>, InstallError> {
        let mut entries = match tokio::fs::read_dir(&self.plugin_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(InstallError::failed(format!(
                    "Failed to read plugin directory {:?}: {}",
                    self.plugin_dir, e
                )));
            }
        };

        let mut plugins = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(InstallError::failed(format!(
                        "Failed to read plugin directory {:?}: {}",
                        self.plugin_dir, e
                    )));
                }
            };

            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !name.to_ascii_lowercase().ends_with(ARTIFACT_EXTENSION)
            {
                continue;
            }

            match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => plugins.push(InstalledPlugin {
                    name,
                    path: entry.path(),
                    size: metadata.len(),
                }),
                Ok(_) => {}
                Err(e) => warn!("Skipping {:?}: {}", entry.path(), e),
            }
        }

        plugins.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(plugins)
    }

    /// Moves an installed jar into a fresh backup directory
    pub async fn remove_plugin(&self, name: &str) -> Result<RemovalRecord, InstallError> {
        let name = safe_filename(name).ok_or_else(|| InstallError::PluginNotFound(name.to_string()))?;
        let _file_guard = self.acquire(&format!("file:{}", name), name)?;

        let target = self.plugin_dir.join(name);
        if !is_regular_file(&target).await {
            return Err(InstallError::PluginNotFound(name.to_string()));
        }

        let backup_path = self.back_up(&target, name).await?;
        info!("Removed plugin {} (backup at {:?})", name, backup_path);

        Ok(RemovalRecord {
            name: name.to_string(),
            backup_path,
        })
    }

    fn acquire(&self, key: &str, subject: &str) -> Result<InFlightGuard, InstallError> {
        self.in_flight.try_acquire(key).ok_or_else(|| {
            info!("Rejecting concurrent operation on {}", key);
            InstallError::AlreadyInProgress(subject.to_string())
        })
    }

    /// Unique staging path for `filename`, never inside the plugin directory
    async fn staging_path(&self, filename: &str) -> Result<PathBuf, InstallError> {
        if staging_overlaps(&self.plugin_dir, &self.staging_dir) {
            return Err(InstallError::failed(format!(
                "Staging directory {:?} must be outside plugin directory {:?}",
                self.staging_dir, self.plugin_dir
            )));
        }

        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| {
                InstallError::failed(format!(
                    "Failed to create staging directory {:?}: {}",
                    self.staging_dir, e
                ))
            })?;

        let seq = STAGE_SEQ.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .staging_dir
            .join(format!(".{}-{}-{}", std::process::id(), seq, filename)))
    }

    /// Downloads and validates into the staging directory; the live directory is untouched
    async fn download(&self, file: &VersionFile, filename: &str) -> Result<PathBuf, InstallError> {
        let staged = self.staging_path(filename).await?;
        debug!("Downloading {} to {:?}", file.url, staged);

        let downloaded = tokio::time::timeout(
            self.download_timeout,
            self.registry.download(&file.url, &staged),
        )
        .await;

        let failure = match downloaded {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(InstallError::DownloadFailed(e.to_string())),
            Err(_) => Some(InstallError::DownloadFailed(format!(
                "timed out after {}ms",
                self.download_timeout.as_millis()
            ))),
        };
        if let Some(err) = failure {
            error!("Download of {} failed: {}", file.url, err);
            discard_staged(&staged).await;
            return Err(err);
        }

        self.check_staged(&staged, filename, file.size).await?;
        Ok(staged)
    }

    /// Validates a staged file, deleting it on failure; `declared_size` 0 means unknown
    async fn check_staged(
        &self,
        staged: &Path,
        filename: &str,
        declared_size: u64,
    ) -> Result<(), InstallError> {
        if !self.validator.validate(staged).await {
            discard_staged(staged).await;
            return Err(InstallError::InvalidArtifact(format!(
                "{} failed structural validation",
                filename
            )));
        }

        if declared_size > 0 {
            let actual = tokio::fs::metadata(staged).await.map(|m| m.len()).unwrap_or(0);
            if actual != declared_size {
                discard_staged(staged).await;
                return Err(InstallError::InvalidArtifact(format!(
                    "{} is {} bytes, registry declared {}",
                    filename, actual, declared_size
                )));
            }
        }

        Ok(())
    }

    /// Backs up any existing target, then renames the staged file into place
    async fn replace(
        &self,
        staged: &Path,
        filename: &str,
    ) -> Result<(PathBuf, Option<PathBuf>), InstallError> {
        tokio::fs::create_dir_all(&self.plugin_dir)
            .await
            .map_err(|e| {
                InstallError::failed(format!(
                    "Failed to create plugin directory {:?}: {}",
                    self.plugin_dir, e
                ))
            })?;

        let target = self.plugin_dir.join(filename);
        let backup_path = if is_regular_file(&target).await {
            Some(self.back_up(&target, filename).await?)
        } else {
            None
        };

        if let Err(e) = move_into_place(staged, &target).await {
            error!("Failed to move {:?} into {:?}: {}", staged, target, e);
            return Err(restore_after_failure(&target, backup_path, e).await);
        }

        Ok((target, backup_path))
    }

    /// Moves `target` into a new `.backup/<timestamp>/` directory
    async fn back_up(&self, target: &Path, filename: &str) -> Result<PathBuf, InstallError> {
        let backup_dir = create_backup_dir(&self.backup_root(), Utc::now())
            .await
            .map_err(|e| InstallError::failed(format!("Failed to create backup directory: {}", e)))?;

        let backup_path = backup_dir.join(filename);
        tokio::fs::rename(target, &backup_path).await.map_err(|e| {
            InstallError::failed(format!(
                "Failed to back up {:?} to {:?}: {}",
                target, backup_path, e
            ))
        })?;

        info!("Backed up {:?} to {:?}", target, backup_path);
        Ok(backup_path)
    }
}

/// Accepts a bare file name only: no separators, no `..`, not hidden
fn safe_filename(name: &str) -> Option<&str> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.contains("..");

    if invalid { None } else { Some(name) }
}

/// Filesystem-safe ISO-8601 timestamp used to name backup directories
fn backup_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string()
}

/// Creates a backup directory unique to this event, suffixing `-N` on collision
async fn create_backup_dir(root: &Path, now: DateTime<Utc>) -> io::Result<PathBuf> {
    tokio::fs::create_dir_all(root).await?;

    let stamp = backup_timestamp(now);
    for attempt in 0..1000u32 {
        let dir = if attempt == 0 {
            root.join(&stamp)
        } else {
            root.join(format!("{}-{}", stamp, attempt))
        };

        match tokio::fs::create_dir(&dir).await {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free backup directory name for {}", stamp),
    ))
}

/// Rename into place; across filesystems, copy next to the target and rename from there
async fn move_into_place(staged: &Path, target: &Path) -> io::Result<()> {
    match tokio::fs::rename(staged, target).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let temp = target.with_file_name(format!(".{}.tmp", name));

            let copied = async {
                tokio::fs::copy(staged, &temp).await?;
                tokio::fs::File::open(&temp).await?.sync_all().await?;
                tokio::fs::rename(&temp, target).await
            }
            .await;

            if let Err(e) = copied {
                discard_staged(&temp).await;
                return Err(e);
            }

            discard_staged(staged).await;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Puts the displaced artifact back after a failed replace, if there was one
async fn restore_after_failure(
    target: &Path,
    backup_path: Option<PathBuf>,
    cause: io::Error,
) -> InstallError {
    let message = format!("Failed to move artifact into place: {}", cause);

    let Some(backup) = backup_path else {
        return InstallError::failed(message);
    };

    match tokio::fs::rename(&backup, target).await {
        Ok(()) => {
            info!("Restored {:?} from backup after failed install", target);
            InstallError::failed(message)
        }
        Err(e) => {
            error!("Failed to restore {:?} from {:?}: {}", target, backup, e);
            InstallError::InstallationFailed {
                message,
                backup_path: Some(backup),
            }
        }
    }
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .is_ok_and(|m| m.is_file())
}

/// Deletes a staged file; failure is logged only
async fn discard_staged(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed staged file {:?}", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove staged file {:?}: {}", path, e),
    }
}
