//! # Infrastructure Layer
//!
//! Configuration loading, dependency-injection context assembly, and tracing
//! initialization. Providers are resolved by name from the `tl-domain`
//! registries; linking `tl-providers` populates them.

/// Configuration types and loader
pub mod config;
/// Dependency-injection context
pub mod di;
/// Tracing initialization
pub mod logging;

pub use config::{AppConfig, ConfigLoader};
pub use di::AppContext;
