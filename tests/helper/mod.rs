#![allow(dead_code, unused_imports)]

pub mod panel;
pub mod registry;

pub use panel::FakePanel;
pub use registry::{FakeRegistry, jar_version};
