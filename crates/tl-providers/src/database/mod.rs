//! Metadata store providers.

#[cfg(feature = "database-sqlite")]
pub mod sqlite;

#[cfg(feature = "database-sqlite")]
pub use sqlite::SqliteDatabase;
