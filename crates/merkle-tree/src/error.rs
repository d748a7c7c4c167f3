use merkle_route::RouteError;
use thiserror::Error;

use crate::store::NodeId;

/// Errors raised while mutating or navigating a merkle tree arena.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0:?} not found in this store")]
    NodeNotFound(NodeId),

    #[error("node {0:?} is not an internal node")]
    NotInternal(NodeId),

    #[error("node {0:?} is not a leaf node")]
    NotLeaf(NodeId),

    #[error("cannot mutate node {0:?}: it has been marked immutable")]
    Immutable(NodeId),

    #[error("child index {index} exceeds the maximum of {max} children per internal node")]
    TooManyChildren { index: usize, max: usize },

    #[error("attempted to reserve node {0:?} after it was destroyed")]
    ReserveAfterDestroy(NodeId),

    #[error("attempted to release node {0:?} after it was already destroyed")]
    DoubleRelease(NodeId),

    #[error(transparent)]
    Route(#[from] RouteError),
}

pub type TreeResult<T> = Result<T, TreeError>;
