use merkle_tree::{NodeId, TreeError};
use thiserror::Error;

/// Errors surfaced while hashing a merkle subtree.
#[derive(Debug, Error)]
pub enum HashingError {
    /// A child hash was required (the internal node is not self-hashing
    /// and was not already cached) but the child slot names a node that
    /// could not be reached. The backtrace is captured at the point of
    /// failure so logs point at the caller, not the worker thread.
    #[error("node {node:?} needs a hash for its child at index {index}, but the child is unreachable\n{backtrace}")]
    IllegalChildHash {
        node: NodeId,
        index: usize,
        backtrace: String,
    },

    #[error("self-hashing node {0:?} has no hash set")]
    SelfHashMissing(NodeId),

    #[error("failed to build the hasher's worker pool: {0}")]
    PoolBuild(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl Clone for HashingError {
    fn clone(&self) -> Self {
        match self {
            HashingError::IllegalChildHash {
                node,
                index,
                backtrace,
            } => HashingError::IllegalChildHash {
                node: *node,
                index: *index,
                backtrace: backtrace.clone(),
            },
            HashingError::SelfHashMissing(id) => HashingError::SelfHashMissing(*id),
            HashingError::PoolBuild(msg) => HashingError::PoolBuild(msg.clone()),
            HashingError::Tree(err) => HashingError::PoolBuild(err.to_string()),
        }
    }
}

pub fn illegal_child_hash(node: NodeId, index: usize) -> HashingError {
    HashingError::IllegalChildHash {
        node,
        index,
        backtrace: format!("{:?}", backtrace::Backtrace::new()),
    }
}
