//! Configuration: serde types, Figment loader, validation.

mod data;
mod loader;
mod validation;

pub use data::{
    AppConfig, CacheSection, CryptoSection, DatabaseSection, EmbeddingSection, RateLimiterSection,
    RetentionSection, RuntimeSection, SandboxSection, ServerSection, VectorStoreSection,
};
pub use loader::ConfigLoader;
