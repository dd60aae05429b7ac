//! Store errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory holding the store file could not be created.
    #[error("Cannot create store directory '{path}': {source}")]
    StoreDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration v{version} ({description}) failed: {reason}")]
    Migration {
        version: u32,
        description: &'static str,
        reason: String,
    },

    /// Audit context that does not serialize to JSON.
    #[error("Cannot encode audit context: {0}")]
    Context(#[from] serde_json::Error),

    /// A thread panicked while holding the connection.
    #[error("Store connection lock poisoned")]
    LockPoisoned,
}
