//! Plugin acquisition and installation
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────────────┐
//! │ Registry │──▶│ Resolver │──▶│ Validator │──▶│ backup + rename  │
//! │(versions)│   │ (choose) │   │ (staged)  │   │ (plugin dir)     │
//! └──────────┘   └──────────┘   └───────────┘   └──────────────────┘
//!        ▲                                               │
//!        └────────────── Installer (single-flight) ──────┘
//! ```
//!
//! - [`coordinator`]: `Installer`, the only writer of the plugin directory
//! - [`resolver`]: Picks the version and file to install
//! - [`validator`]: Structural check of a staged download
//! - [`lock`]: Per-key single-flight guard

pub mod coordinator;
pub mod lock;
pub mod resolver;
pub mod validator;

pub use coordinator::{InstallMode, InstallationRecord, InstalledPlugin, Installer, RemovalRecord};
pub use resolver::{Resolution, ResolutionKind, resolve, select_file};
pub use validator::ArtifactValidator;
