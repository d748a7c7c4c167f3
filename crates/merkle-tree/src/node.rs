use byte_stream::Digest384;
use merkle_route::AnyRoute;

use crate::reservation::Reservation;

/// Shared surface of every merkle node variant: route, hash, reservation.
///
/// This trait is implemented directly by [`crate::store::InternalNode`]
/// and [`crate::store::LeafNode`]; most callers go through
/// [`crate::tree::Tree`] instead, which mediates cross-node effects
/// (reservation, re-routing) that a single node cannot perform on itself.
pub trait MerkleNode {
    fn route(&self) -> &AnyRoute;
    fn reservation(&self) -> &Reservation;
    fn is_self_hashing(&self) -> bool;
}

/// An internal node: owns children addressed by index.
pub trait MerkleInternal: MerkleNode {
    fn num_children(&self) -> usize;
    fn is_immutable(&self) -> bool;
}

/// A leaf node: carries application data and a hash.
pub trait MerkleLeaf: MerkleNode {
    fn leaf_hash(&self) -> Option<Digest384>;
}

/// Marker for leaves that compute and invalidate their own hash rather
/// than deferring to the framework's digest-of-payload default.
pub trait SelfHashingLeaf: MerkleLeaf {}

impl MerkleNode for crate::store::InternalNode {
    fn route(&self) -> &AnyRoute {
        crate::store::InternalNode::route(self)
    }
    fn reservation(&self) -> &Reservation {
        crate::store::InternalNode::reservation(self)
    }
    fn is_self_hashing(&self) -> bool {
        crate::store::InternalNode::is_self_hashing(self)
    }
}

impl MerkleInternal for crate::store::InternalNode {
    fn num_children(&self) -> usize {
        crate::store::InternalNode::num_children(self)
    }
    fn is_immutable(&self) -> bool {
        crate::store::InternalNode::is_immutable(self)
    }
}

impl MerkleNode for crate::store::LeafNode {
    fn route(&self) -> &AnyRoute {
        crate::store::LeafNode::route(self)
    }
    fn reservation(&self) -> &Reservation {
        crate::store::LeafNode::reservation(self)
    }
    fn is_self_hashing(&self) -> bool {
        crate::store::LeafNode::is_self_hashing(self)
    }
}

impl MerkleLeaf for crate::store::LeafNode {
    fn leaf_hash(&self) -> Option<Digest384> {
        crate::store::LeafNode::cached_hash(self)
    }
}

// `LeafNode` carries self-hashing as a runtime flag (`is_self_hashing`)
// rather than as a distinct type, so it deliberately does not implement
// the `SelfHashingLeaf` marker: that trait is for node implementations
// where the distinction is made at the type level instead.
