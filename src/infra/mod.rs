//! Infrastructure adapters and runtime bootstrap.

pub mod bootstrap;
pub mod dirs;
pub mod error;
pub mod store;
pub mod telemetry;
