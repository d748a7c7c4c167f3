use thiserror::Error;

/// A failure that is fatal to the current reconnect attempt. Callers
/// retry later, governed by [`crate::controller::ReconnectController`]'s
/// consecutive-failure and min-interval bounds.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream codec failure: {0}")]
    Stream(#[from] byte_stream::StreamError),

    #[error("tree operation failed: {0}")]
    Tree(#[from] merkle_tree::TreeError),

    #[error("route operation failed: {0}")]
    Route(#[from] merkle_route::RouteError),

    #[error("anticipated-message ordering violated: expected slot {expected}, writer produced {produced}")]
    OutOfOrder { expected: u64, produced: u64 },

    #[error("hash mismatch for class {class_id} at path depth {depth}: expected {expected:?}, found {found:?}")]
    HashMismatch {
        class_id: i64,
        depth: usize,
        expected: byte_stream::Digest384,
        found: byte_stream::Digest384,
    },

    #[error("child count mismatch for class {class_id}: expected {expected}, found {found}")]
    ChildCountMismatch {
        class_id: i64,
        expected: usize,
        found: usize,
    },

    #[error("peer closed the anticipated-message stream before completion")]
    StreamClosed,

    #[error("reconnect worker task panicked or was cancelled: {0}")]
    WorkerFailed(String),

    #[error("reconnect attempt refused: {reason}")]
    Refused { reason: &'static str },
}

pub type SyncResult<T> = Result<T, SyncError>;
