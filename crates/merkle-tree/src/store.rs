use byte_stream::Digest384;
use merkle_route::AnyRoute;

use crate::reservation::Reservation;

/// The maximum number of children an internal node may hold (spec §3: "N ≤ 64").
pub const MAX_CHILDREN: usize = 64;

/// An opaque handle to a node inside a [`crate::tree::Tree`]'s arena.
///
/// Nodes are addressed by index rather than by pointer: the workspace has
/// no owning runtime to hand out long-lived references, so identity is a
/// plain `u32` into the arena's backing `Vec`, the same shape the
/// teacher's tree-store traits use to address nodes by key instead of by
/// pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// An internal node: owns up to [`MAX_CHILDREN`] children addressed by
/// index, and (unless self-hashing) has its hash recomputed as a digest
/// of its children by the hasher crate.
#[derive(Debug)]
pub struct InternalNode {
    route: AnyRoute,
    children: Vec<Option<NodeId>>,
    hash: Option<Digest384>,
    reservation: Reservation,
    immutable: bool,
    self_hashing: bool,
    class_id: i64,
    version: i32,
}

impl InternalNode {
    pub fn new(route: AnyRoute) -> Self {
        Self::with_class(route, 0, 1)
    }

    /// `class_id`/`version` are folded into this node's hash alongside its
    /// children's hashes, matching §4.4's "digest of `(class_id,
    /// serialization_version, child_hash_0, ...)`".
    pub fn with_class(route: AnyRoute, class_id: i64, version: i32) -> Self {
        Self {
            route,
            children: Vec::new(),
            hash: None,
            reservation: Reservation::new(),
            immutable: false,
            self_hashing: false,
            class_id,
            version,
        }
    }

    pub fn new_self_hashing(route: AnyRoute) -> Self {
        Self {
            self_hashing: true,
            ..Self::new(route)
        }
    }

    pub fn route(&self) -> &AnyRoute {
        &self.route
    }

    pub fn set_route(&mut self, route: AnyRoute) {
        self.route = route;
    }

    pub fn class_id(&self) -> i64 {
        self.class_id
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn hash(&self) -> Option<Digest384> {
        self.hash
    }

    pub fn set_hash(&mut self, hash: Digest384) {
        self.hash = Some(hash);
    }

    pub fn invalidate_hash(&mut self) {
        self.hash = None;
    }

    pub fn reservation(&self) -> &Reservation {
        &self.reservation
    }

    pub fn is_self_hashing(&self) -> bool {
        self.self_hashing
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn mark_immutable(&mut self) {
        self.immutable = true;
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn child_id(&self, index: usize) -> Option<NodeId> {
        self.children.get(index).copied().flatten()
    }

    pub(crate) fn children_slice(&self) -> &[Option<NodeId>] {
        &self.children
    }

    pub(crate) fn ensure_capacity(&mut self, index: usize) {
        if index >= self.children.len() {
            self.children.resize(index + 1, None);
        }
    }

    pub(crate) fn set_child_id(&mut self, index: usize, child: Option<NodeId>) {
        self.children[index] = child;
    }
}

/// A leaf node: carries an opaque application payload plus either a
/// framework-computed digest of that payload, or (if `self_hashing`) a
/// hash the leaf owner is responsible for supplying and invalidating.
#[derive(Debug)]
pub struct LeafNode {
    route: AnyRoute,
    hash: Option<Digest384>,
    reservation: Reservation,
    self_hashing: bool,
    data: Vec<u8>,
}

impl LeafNode {
    pub fn new(route: AnyRoute, data: Vec<u8>) -> Self {
        Self {
            route,
            hash: None,
            reservation: Reservation::new(),
            self_hashing: false,
            data,
        }
    }

    pub fn new_self_hashing(route: AnyRoute, data: Vec<u8>, hash: Digest384) -> Self {
        Self {
            route,
            hash: Some(hash),
            reservation: Reservation::new(),
            self_hashing: true,
            data,
        }
    }

    pub fn route(&self) -> &AnyRoute {
        &self.route
    }

    pub fn set_route(&mut self, route: AnyRoute) {
        self.route = route;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn reservation(&self) -> &Reservation {
        &self.reservation
    }

    pub fn is_self_hashing(&self) -> bool {
        self.self_hashing
    }

    /// The currently cached hash, without computing it if absent.
    pub fn cached_hash(&self) -> Option<Digest384> {
        self.hash
    }

    /// The leaf's hash: computed on first access from its payload unless
    /// this is a self-hashing leaf, in which case the stored hash is
    /// authoritative and only the leaf owner may change it via
    /// [`LeafNode::set_self_hash`].
    pub fn leaf_hash(&mut self) -> Digest384 {
        if let Some(hash) = self.hash {
            return hash;
        }
        let computed = Digest384::of_parts([self.data.as_slice()]);
        self.hash = Some(computed);
        computed
    }

    /// Overwrites the hash of a self-hashing leaf. Calling this on a
    /// framework-hashed leaf would silently defeat digest-of-payload
    /// integrity, so it is only exposed for `self_hashing` leaves.
    pub fn set_self_hash(&mut self, hash: Digest384) {
        debug_assert!(self.self_hashing, "set_self_hash called on a framework-hashed leaf");
        self.hash = Some(hash);
    }
}

/// One arena slot: either variant of merkle node.
#[derive(Debug)]
pub enum NodeSlot {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl NodeSlot {
    pub fn route(&self) -> &AnyRoute {
        match self {
            NodeSlot::Internal(n) => n.route(),
            NodeSlot::Leaf(n) => n.route(),
        }
    }

    pub fn set_route(&mut self, route: AnyRoute) {
        match self {
            NodeSlot::Internal(n) => n.set_route(route),
            NodeSlot::Leaf(n) => n.set_route(route),
        }
    }

    pub fn reservation(&self) -> &Reservation {
        match self {
            NodeSlot::Internal(n) => n.reservation(),
            NodeSlot::Leaf(n) => n.reservation(),
        }
    }

    pub fn as_internal(&self) -> Option<&InternalNode> {
        match self {
            NodeSlot::Internal(n) => Some(n),
            NodeSlot::Leaf(_) => None,
        }
    }

    pub fn as_internal_mut(&mut self) -> Option<&mut InternalNode> {
        match self {
            NodeSlot::Internal(n) => Some(n),
            NodeSlot::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            NodeSlot::Leaf(n) => Some(n),
            NodeSlot::Internal(_) => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafNode> {
        match self {
            NodeSlot::Leaf(n) => Some(n),
            NodeSlot::Internal(_) => None,
        }
    }
}

/// Maps [`NodeId`] to [`NodeSlot`], matching the teacher's `TreeReader`/
/// `TreeWriter` pattern of addressing nodes indirectly through a store
/// rather than by embedded pointers. [`crate::tree::Tree`] is generic
/// over any implementation of this trait.
pub trait TreeStore {
    fn slot(&self, id: NodeId) -> Option<&NodeSlot>;
    fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot>;
    fn alloc(&mut self, slot: NodeSlot) -> NodeId;
    /// Drops a slot entirely once its reservation has reached `DESTROYED`.
    fn dealloc(&mut self, id: NodeId);
}

/// An in-memory `Vec`-backed [`TreeStore`]. Freed slots are tombstoned
/// rather than compacted, so existing [`NodeId`]s never dangle into an
/// unrelated node.
#[derive(Debug, Default)]
pub struct ArenaStore {
    slots: Vec<Option<NodeSlot>>,
}

impl ArenaStore {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }
}

impl TreeStore for ArenaStore {
    fn slot(&self, id: NodeId) -> Option<&NodeSlot> {
        self.slots.get(id.index() as usize).and_then(|s| s.as_ref())
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        self.slots
            .get_mut(id.index() as usize)
            .and_then(|s| s.as_mut())
    }

    fn alloc(&mut self, slot: NodeSlot) -> NodeId {
        let index = self.slots.len() as u32;
        self.slots.push(Some(slot));
        NodeId::from_index(index)
    }

    fn dealloc(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index() as usize) {
            *slot = None;
        }
    }
}
