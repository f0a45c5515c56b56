//! Plugin marketplace layer
//!
//! - [`client`]: `Registry` trait consumed by the installer and the service facade
//! - [`modrinth`]: Modrinth v2 API implementation
//! - [`types`]: Projects, versions, files and the server's runtime target

pub mod client;
pub mod modrinth;
pub mod types;

pub use client::Registry;
pub use modrinth::ModrinthRegistry;
