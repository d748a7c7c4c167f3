use thiserror::Error;

/// Errors raised while building or navigating a [`crate::MerkleRoute`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route step must be non-negative, got {0}")]
    NegativeStep(i64),

    #[error("route step {step} is out of bounds for a node with {num_children} children")]
    ChildIndexOutOfBounds { step: u64, num_children: usize },

    #[error("walked into a null node at depth {depth}")]
    NullNodeEncountered { depth: usize },

    #[error("walked into a leaf node at depth {depth} with {remaining} steps still to take")]
    LeafEncounteredMidWalk { depth: usize, remaining: usize },

    #[error("route word {0} is illegal: a word may never be zero")]
    IllegalZeroWord(i64),
}
