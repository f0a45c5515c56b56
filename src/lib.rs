//! Remote game-server control panel relay
//!
//! Resolves, downloads, validates and installs Modrinth plugins into a server's plugin
//! directory, and normalizes the loosely-typed status payloads returned by the panel.
//!
//! # Modules
//!
//! - [`registry`]: Plugin marketplace client (Modrinth)
//! - [`install`]: Version resolution, artifact validation and the installation pipeline
//! - [`panel`]: Panel client (Crafty Controller), status normalization and server control
//! - [`service`]: Facade consumed by the CLI, HTTP routes and bot commands
//! - [`error`]: Error taxonomy shared by all layers
//! - [`config`]: Configuration loading
//! - [`logging`]: Tracing subscriber setup

pub mod config;
pub mod error;
pub mod install;
pub mod logging;
pub mod panel;
pub mod registry;
pub mod service;
