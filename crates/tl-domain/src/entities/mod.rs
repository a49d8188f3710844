//! Core business entities with identity.
//!
//! Entities are serde-friendly value carriers; ownership of persisted state
//! is always the repository layer.

mod item;
mod pipeline;
mod plugin;
mod topic;
mod trend;

pub use item::{Category, EngagementMetrics, ProcessedItem, RawItem};
pub use pipeline::{PipelineRun, RunStatus};
pub use plugin::{
    AuthEnvelope, CollectorMetadata, CollectorSource, CollectorStatus, EncryptedData, PluginHealth,
    SourceType,
};
pub use topic::Topic;
pub use trend::{Trend, TrendState};
