//! # Provider Layer
//!
//! Concrete adapters behind the domain ports: embedding providers, vector
//! stores, caches, the SQLite metadata store, built-in collectors, the Rhai
//! sandbox, and AES-GCM crypto.
//!
//! Every provider registers itself into the matching `tl-domain` registry via
//! a `linkme` distributed slice; the infrastructure layer resolves providers
//! by name from configuration. Linking this crate is what populates the
//! registries — binaries and tests pull it in with `use tl_providers as _;`
//! when they only need the registration side effect.

/// Cache providers (Moka, Redis)
pub mod cache;
/// Built-in collectors (RSS, Hacker News, Reddit) and the custom script collector
#[cfg(feature = "collectors-builtin")]
pub mod collectors;
/// AES-GCM crypto provider
pub mod crypto;
/// SQLite metadata store
#[cfg(feature = "database-sqlite")]
pub mod database;
/// Embedding providers (Ollama, OpenAI, null)
pub mod embedding;
/// Rhai sandbox for user-supplied collector scripts
#[cfg(feature = "sandbox-rhai")]
pub mod sandbox;
/// Vector store providers (in-memory, Qdrant)
pub mod vector_store;
