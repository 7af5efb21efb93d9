//! Error types for saga_core operations.

use thiserror::Error;

/// Core error type for saga_core operations.
#[derive(Error, Debug)]
pub enum SagaError {
    /// No branch with the given name exists.
    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    /// A branch with the given name already exists.
    #[error("branch already exists: {0}")]
    BranchExists(String),

    /// No event with the given id exists in the store.
    #[error("no such event: {0}")]
    NoSuchEvent(u64),

    /// The payload does not match the schema required by the event kind.
    /// Rejected before anything is written.
    #[error("invalid payload for {kind}: {reason}")]
    InvalidPayload {
        /// Event kind the payload was submitted for.
        kind: String,
        /// Description of the mismatch.
        reason: String,
    },

    /// An event's parent pointer does not resolve to a stored event.
    /// This is store corruption, not a user error.
    #[error("dangling parent: event {event} points at missing event {parent}")]
    DanglingParent {
        /// Event holding the broken pointer.
        event: u64,
        /// The missing parent id.
        parent: u64,
    },

    /// A parent walk revisited an event id. The event set must form a
    /// forest, so this is store corruption.
    #[error("parent cycle detected at event {0}")]
    ParentCycle(u64),

    /// The container has no history on the given branch.
    #[error("container {container} has no history on branch {branch}")]
    UnknownContainer {
        /// Container id.
        container: String,
        /// Branch that was searched.
        branch: String,
    },

    /// The branch is no longer accepting appends (merged or discarded).
    #[error("branch {name} is {status}, not active")]
    BranchNotActive {
        /// Branch name.
        name: String,
        /// Current lifecycle status.
        status: String,
    },

    /// Source and target of a merge name the same branch.
    #[error("cannot merge branch {0} into itself")]
    SelfMerge(String),

    /// A compare-and-swap on a branch head failed too many times.
    /// Appends retry internally; this only surfaces when the retry
    /// budget is exhausted.
    #[error("branch {0} head moved {1} times during append, giving up")]
    HeadContention(String, u32),

    /// Underlying database error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Store schema version does not match this build.
    #[error("store schema version mismatch: found {found}, expected {expected}")]
    SchemaVersionMismatch {
        /// Version recorded in the store.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },

    /// Serialization error while encoding a record.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error while decoding a record.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SagaError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::DanglingParent { .. } | Self::ParentCycle(_) => {
                Some("The store is corrupted. Run 'saga verify' to list all broken events and restore from a backup.")
            }
            Self::NoSuchEvent(_) => {
                Some("Check the event id with 'saga log', or run 'saga verify' if you believe the store is damaged.")
            }
            Self::UnknownBranch(_) => Some("List available branches with 'saga branch list'."),
            Self::BranchExists(_) => Some("Pick a different branch name, or discard the existing branch first."),
            Self::BranchNotActive { .. } => {
                Some("Merged and discarded branches are frozen. Fork a new branch to continue from their history.")
            }
            Self::SelfMerge(_) => Some("Merge needs two distinct branches; fork one first if you want a checkpoint."),
            Self::SchemaVersionMismatch { .. } => {
                Some("This store was written by a different saga version. Upgrade the tool or the store.")
            }
            _ => None,
        }
    }
}

impl From<redb::DatabaseError> for SagaError {
    fn from(e: redb::DatabaseError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<redb::TransactionError> for SagaError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<redb::TableError> for SagaError {
    fn from(e: redb::TableError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<redb::StorageError> for SagaError {
    fn from(e: redb::StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<redb::CommitError> for SagaError {
    fn from(e: redb::CommitError) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Convenience Result type for saga_core operations.
pub type Result<T> = std::result::Result<T, SagaError>;
