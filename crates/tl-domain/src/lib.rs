//! # Domain Layer
//!
//! Core business logic and domain types for trend detection.
//! Contains only pure domain entities, value objects, and business rules.
//!
//! ## Architecture
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`entities`] | Core business entities with identity |
//! | [`value_objects`] | Immutable value objects |
//! | [`ports`] | External provider and repository port interfaces |
//! | [`registry`] | Provider auto-registration registries |
//! | [`constants`] | Domain constants |
//! | [`error`] | Domain error types |
//!
//! ## Clean Architecture Principles
//!
//! - **Entities** are at the center with business rules
//! - **Value Objects** are immutable and compared by value
//! - **No infrastructure dependencies** - only core traits and serde
//!
//! ## Example
//!
//! ```
//! use tl_domain::entities::RawItem;
//! use tl_domain::value_objects::Embedding;
//!
//! let item = RawItem::new("hackernews", "41002345", "https://example.com", "Apple unveils M5");
//! assert_eq!(item.identity(), ("hackernews", "41002345"));
//!
//! let embedding = Embedding { vector: vec![0.1, 0.2], model: "test".into(), dimensions: 2 };
//! assert_eq!(embedding.dimensions, 2);
//! ```

/// Common macros
#[macro_use]
pub mod macros;

/// Domain-level constants
pub mod constants;
/// Core business entities with identity
pub mod entities;
/// Domain error types
pub mod error;
/// External provider and repository port interfaces
pub mod ports;
/// Provider auto-registration registry
pub mod registry;
/// Common utilities
pub mod utils;
/// Immutable value objects
pub mod value_objects;

// Re-export commonly used types for convenience
pub use entities::*;
pub use error::{Error, Result};
pub use utils::compute_fingerprint;
pub use value_objects::*;
