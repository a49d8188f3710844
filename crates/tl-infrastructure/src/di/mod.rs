//! Dependency-injection context.

mod context;

pub use context::AppContext;
