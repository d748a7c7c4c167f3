use byte_stream::Digest384;
use merkle_route::{AnyRoute, MerkleRoute};
use rand::seq::SliceRandom;
use rand::RngCore;

use crate::error::{TreeError, TreeResult};
use crate::store::{ArenaStore, InternalNode, LeafNode, NodeId, NodeSlot, TreeStore, MAX_CHILDREN};

/// A merkle tree backed by an arena of [`NodeId`]-addressed nodes.
///
/// `Tree` owns no notion of "the" root beyond what callers track
/// themselves; every operation names the node it acts on explicitly,
/// mirroring the teacher's store-oriented `TreeReader`/`TreeWriter` split
/// rather than an object-graph-with-parent-pointers model.
pub struct Tree<S: TreeStore = ArenaStore> {
    store: S,
}

impl Tree<ArenaStore> {
    pub fn new() -> Self {
        Self {
            store: ArenaStore::new(),
        }
    }
}

impl Default for Tree<ArenaStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TreeStore> Tree<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn alloc_internal(&mut self, route: AnyRoute) -> NodeId {
        self.store.alloc(NodeSlot::Internal(InternalNode::new(route)))
    }

    pub fn alloc_internal_self_hashing(&mut self, route: AnyRoute) -> NodeId {
        self.store
            .alloc(NodeSlot::Internal(InternalNode::new_self_hashing(route)))
    }

    /// Like [`Tree::alloc_internal`] but with an explicit `class_id` and
    /// `version`, for callers (reconnect's learner side) that must
    /// reproduce a node exactly as its peer described it rather than
    /// default to `(0, 1)`.
    pub fn alloc_internal_with_class(&mut self, route: AnyRoute, class_id: i64, version: i32) -> NodeId {
        self.store
            .alloc(NodeSlot::Internal(InternalNode::with_class(route, class_id, version)))
    }

    pub fn alloc_leaf(&mut self, route: AnyRoute, data: Vec<u8>) -> NodeId {
        self.store.alloc(NodeSlot::Leaf(LeafNode::new(route, data)))
    }

    pub fn alloc_self_hashing_leaf(&mut self, route: AnyRoute, data: Vec<u8>, hash: Digest384) -> NodeId {
        self.store
            .alloc(NodeSlot::Leaf(LeafNode::new_self_hashing(route, data, hash)))
    }

    fn slot(&self, id: NodeId) -> TreeResult<&NodeSlot> {
        self.store.slot(id).ok_or(TreeError::NodeNotFound(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> TreeResult<&mut NodeSlot> {
        self.store.slot_mut(id).ok_or(TreeError::NodeNotFound(id))
    }

    pub fn route(&self, id: NodeId) -> TreeResult<&AnyRoute> {
        Ok(self.slot(id)?.route())
    }

    pub fn hash(&self, id: NodeId) -> TreeResult<Option<Digest384>> {
        let slot = self.slot(id)?;
        Ok(match slot {
            NodeSlot::Internal(n) => n.hash(),
            NodeSlot::Leaf(n) => n.cached_hash(),
        })
    }

    pub fn set_internal_hash(&mut self, id: NodeId, hash: Digest384) -> TreeResult<()> {
        let internal = self
            .slot_mut(id)?
            .as_internal_mut()
            .ok_or(TreeError::NotInternal(id))?;
        internal.set_hash(hash);
        Ok(())
    }

    pub fn leaf_hash(&mut self, id: NodeId) -> TreeResult<Digest384> {
        let leaf = self.slot_mut(id)?.as_leaf_mut().ok_or(TreeError::NotLeaf(id))?;
        Ok(leaf.leaf_hash())
    }

    pub fn set_self_hashing_leaf_hash(&mut self, id: NodeId, hash: Digest384) -> TreeResult<()> {
        let leaf = self.slot_mut(id)?.as_leaf_mut().ok_or(TreeError::NotLeaf(id))?;
        leaf.set_self_hash(hash);
        Ok(())
    }

    pub fn num_children(&self, id: NodeId) -> TreeResult<usize> {
        Ok(self
            .slot(id)?
            .as_internal()
            .ok_or(TreeError::NotInternal(id))?
            .num_children())
    }

    pub fn child(&self, id: NodeId, index: usize) -> TreeResult<Option<NodeId>> {
        Ok(self
            .slot(id)?
            .as_internal()
            .ok_or(TreeError::NotInternal(id))?
            .child_id(index))
    }

    pub fn is_immutable(&self, id: NodeId) -> TreeResult<bool> {
        Ok(self
            .slot(id)?
            .as_internal()
            .ok_or(TreeError::NotInternal(id))?
            .is_immutable())
    }

    /// One-way transition: an immutable internal node can never again
    /// accept `set_child`.
    pub fn set_immutable(&mut self, id: NodeId) -> TreeResult<()> {
        self.slot_mut(id)?
            .as_internal_mut()
            .ok_or(TreeError::NotInternal(id))?
            .mark_immutable();
        Ok(())
    }

    pub fn reserve(&self, id: NodeId) -> TreeResult<()> {
        self.slot(id)?.reservation().reserve(id)
    }

    /// Releases one holder of `id`. If this was the last holder, the node
    /// is destroyed: its non-null children (in index order) are released
    /// in turn and the slot is freed.
    pub fn release(&mut self, id: NodeId) -> TreeResult<bool> {
        let destroyed = self.slot(id)?.reservation().release(id)?;
        if destroyed {
            let children: Vec<NodeId> = match self.slot(id)?.as_internal() {
                Some(internal) => internal.children_slice().iter().filter_map(|c| *c).collect(),
                None => Vec::new(),
            };
            for child_id in children {
                self.release(child_id)?;
            }
            self.store.dealloc(id);
        }
        Ok(destroyed)
    }

    /// Assigns `child` to `index` of `parent`: releases the previous
    /// occupant (if any), reserves and re-routes the new occupant (if
    /// any), and invalidates `parent`'s hash unless `parent` is
    /// self-hashing.
    ///
    /// # Errors
    /// - [`TreeError::Immutable`] if `parent` has been marked immutable.
    /// - [`TreeError::TooManyChildren`] if `index >= MAX_CHILDREN`.
    /// - error variants from [`Tree::reserve`] / [`Tree::release`] if the
    ///   child's own reservation state is invalid.
    pub fn set_child(&mut self, parent: NodeId, index: usize, child: Option<NodeId>) -> TreeResult<()> {
        if index >= MAX_CHILDREN {
            return Err(TreeError::TooManyChildren {
                index,
                max: MAX_CHILDREN,
            });
        }

        let (parent_route, self_hashing) = {
            let internal = self
                .slot(parent)?
                .as_internal()
                .ok_or(TreeError::NotInternal(parent))?;
            if internal.is_immutable() {
                return Err(TreeError::Immutable(parent));
            }
            (internal.route().clone(), internal.is_self_hashing())
        };

        let old_child = {
            let internal = self
                .slot_mut(parent)?
                .as_internal_mut()
                .ok_or(TreeError::NotInternal(parent))?;
            internal.ensure_capacity(index);
            internal.child_id(index)
        };

        if let Some(old_id) = old_child {
            self.release(old_id)?;
        }

        if let Some(new_id) = child {
            self.reserve(new_id)?;
            let new_route = parent_route.extend(index as u64)?;
            self.reroute_subtree(new_id, new_route)?;
        }

        let internal = self
            .slot_mut(parent)?
            .as_internal_mut()
            .ok_or(TreeError::NotInternal(parent))?;
        internal.set_child_id(index, child);
        if !self_hashing {
            internal.invalidate_hash();
        }
        Ok(())
    }

    /// Re-routes `id` to `route`, and if `id` is internal, re-routes its
    /// whole subtree. Spec §4.3 documents this as `O(subtree)`.
    fn reroute_subtree(&mut self, id: NodeId, route: AnyRoute) -> TreeResult<()> {
        let children: Vec<(usize, NodeId)> = {
            let slot = self.slot_mut(id)?;
            slot.set_route(route.clone());
            match slot.as_internal() {
                Some(internal) => internal
                    .children_slice()
                    .iter()
                    .enumerate()
                    .filter_map(|(i, c)| c.map(|cid| (i, cid)))
                    .collect(),
                None => Vec::new(),
            }
        };
        for (index, child_id) in children {
            let child_route = route.extend(index as u64)?;
            self.reroute_subtree(child_id, child_route)?;
        }
        Ok(())
    }

    /// Post-order depth-first traversal from `root`, children visited in
    /// index order.
    pub fn post_order(&self, root: NodeId) -> TreeResult<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut rng: Option<&mut dyn RngCore> = None;
        self.post_order_into(root, &mut out, &mut rng)?;
        Ok(out)
    }

    /// Post-order depth-first traversal from `root` with sibling order
    /// randomized at every internal node, matching the per-worker-thread
    /// visitation order the parallel hasher uses to spread load.
    pub fn post_order_randomized(&self, root: NodeId, rng: &mut dyn RngCore) -> TreeResult<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut rng_slot: Option<&mut dyn RngCore> = Some(rng);
        self.post_order_into(root, &mut out, &mut rng_slot)?;
        Ok(out)
    }

    fn post_order_into(
        &self,
        id: NodeId,
        out: &mut Vec<NodeId>,
        rng: &mut Option<&mut dyn RngCore>,
    ) -> TreeResult<()> {
        let slot = self.slot(id)?;
        if let Some(internal) = slot.as_internal() {
            let mut order: Vec<usize> = (0..internal.num_children()).collect();
            if let Some(r) = rng.as_deref_mut() {
                order.shuffle(r);
            }
            let child_ids: Vec<Option<NodeId>> = order.iter().map(|&i| internal.child_id(i)).collect();
            for child in child_ids.into_iter().flatten() {
                self.post_order_into(child, out, rng)?;
            }
        }
        out.push(id);
        Ok(())
    }
}
