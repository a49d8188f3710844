//! Provider auto-registration registries.
//!
//! Provider crates register factories into `linkme` distributed slices; the
//! infrastructure layer resolves them by name from configuration. Collectors
//! use the same mechanism so built-in collectors become an explicit set union
//! at startup rather than a directory scan.

/// Cache provider registry
pub mod cache;
/// Collector registry
pub mod collector;
/// Embedding provider registry
pub mod embedding;
/// Vector store provider registry
pub mod vector_store;
