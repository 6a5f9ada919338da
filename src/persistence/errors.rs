use std::io;

/// Failure of the durable store or of the replication pipeline feeding it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    #[error("store '{store}' is inconsistent: {message}")]
    Inconsistent { store: String, message: String },

    #[error("store '{store}' received a malformed change-list {id}: {message}")]
    Malformed { store: String, id: u64, message: String },

    // The apply loop of the store has stopped, the store must be reloaded from a snapshot.
    #[error("store '{0}' is no longer applying change-lists")]
    StoreHalted(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to load initial state: {0}")]
    Load(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot is inconsistent: {0}")]
    Inconsistent(String),
}

impl From<SnapshotError> for PersistenceError {
    fn from(e: SnapshotError) -> Self {
        PersistenceError::Load(e.to_string())
    }
}
