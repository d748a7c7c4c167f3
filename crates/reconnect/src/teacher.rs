use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use byte_stream::NULL_HASH;
use dashmap::DashMap;
use merkle_tree::{ArenaStore, NodeId, Tree};
use parking_lot::Mutex as PlMutex;
use tokio::sync::{mpsc, Notify};

use crate::anticipated::{AnticipatedReceiver, AnticipatedWriter};
use crate::error::{SyncError, SyncResult};
use crate::message::{AckMessage, NodeQuery, NodeSend, TeacherMessage};

/// A leaf's class id on the wire: leaves carry no `class_id` field of
/// their own in [`merkle_tree::LeafNode`], so reconnect assigns them this
/// fixed sentinel, distinct from any internal node's `class_id` (which
/// defaults to `0`, per [`merkle_tree::InternalNode::new`]).
pub const LEAF_CLASS_ID: i64 = -1;

/// Per-node state table from §4.8: `Pending` is `UNKNOWN`, `Missed` is
/// `READY_TO_SEND`, `Acked` is `MARKED_ACKED`, `Sent` is `SENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeSyncState {
    Pending,
    Missed,
    Acked,
    Sent,
}

struct NodeRecord {
    state: PlMutex<NodeSyncState>,
    notify: Notify,
}

impl NodeRecord {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: PlMutex::new(NodeSyncState::Pending),
            notify: Notify::new(),
        })
    }
}

fn describe_node(tree: &Tree<ArenaStore>, id: NodeId) -> SyncResult<NodeQuery> {
    let hash = tree.hash(id)?.unwrap_or(NULL_HASH);
    let slot = tree
        .store()
        .slot(id)
        .ok_or(merkle_tree::TreeError::NodeNotFound(id))?;
    let (class_id, version) = match slot.as_internal() {
        Some(internal) => (internal.class_id(), internal.version()),
        None => (LEAF_CLASS_ID, 1),
    };
    Ok(NodeQuery {
        class_id,
        version,
        hash,
    })
}

fn build_send(tree: &Tree<ArenaStore>, id: NodeId, query: NodeQuery) -> SyncResult<NodeSend> {
    let slot = tree
        .store()
        .slot(id)
        .ok_or(merkle_tree::TreeError::NodeNotFound(id))?;
    let (num_children, payload) = match slot.as_internal() {
        Some(internal) => (internal.num_children() as u32, Vec::new()),
        None => {
            let leaf = slot.as_leaf().expect("non-internal slot is a leaf");
            (0, leaf.data().to_vec())
        }
    };
    Ok(NodeSend {
        class_id: query.class_id,
        version: query.version,
        hash: query.hash,
        num_children,
        payload,
    })
}

/// Drives the teacher side of one reconnect session against `tree`,
/// starting from `root`.
pub struct TeacherSync {
    tree: Arc<PlMutex<Tree<ArenaStore>>>,
    root: NodeId,
    records: DashMap<NodeId, Arc<NodeRecord>>,
    max_ack_delay: Duration,
}

impl TeacherSync {
    pub fn new(tree: Arc<PlMutex<Tree<ArenaStore>>>, root: NodeId, max_ack_delay: Duration) -> Self {
        Self {
            tree,
            root,
            records: DashMap::new(),
            max_ack_delay,
        }
    }

    fn record_for(&self, id: NodeId) -> Arc<NodeRecord> {
        Arc::clone(&*self.records.entry(id).or_insert_with(NodeRecord::new))
    }

    /// Runs the sending and receiving tasks to completion, returning once
    /// every queued node has reached a terminal state.
    pub async fn run(
        self: Arc<Self>,
        node_writer: AnticipatedWriter<TeacherMessage>,
        ack_reader: AnticipatedReceiver<AckMessage>,
    ) -> SyncResult<()> {
        let (awaiting_tx, awaiting_rx) = mpsc::unbounded_channel::<Arc<NodeRecord>>();

        let sender = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.run_sender(node_writer, awaiting_tx).await })
        };
        let receiver = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.run_receiver(ack_reader, awaiting_rx).await })
        };

        let (send_result, recv_result) = tokio::join!(sender, receiver);
        send_result.map_err(|e| SyncError::WorkerFailed(e.to_string()))??;
        recv_result.map_err(|e| SyncError::WorkerFailed(e.to_string()))??;
        Ok(())
    }

    async fn run_sender(
        &self,
        mut node_writer: AnticipatedWriter<TeacherMessage>,
        awaiting_tx: mpsc::UnboundedSender<Arc<NodeRecord>>,
    ) -> SyncResult<()> {
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(self.root);

        while let Some(id) = queue.pop_front() {
            let record = self.record_for(id);

            let query = describe_node(&self.tree.lock(), id)?;
            node_writer
                .write_next(TeacherMessage::Query(query))
                .await?;
            let _ = awaiting_tx.send(Arc::clone(&record));

            self.wait_for_ack(&record).await;

            let state = *record.state.lock();
            match state {
                NodeSyncState::Acked => continue,
                NodeSyncState::Pending | NodeSyncState::Missed => {
                    *record.state.lock() = NodeSyncState::Missed;
                    let send = build_send(&self.tree.lock(), id, query)?;
                    let num_children = send.num_children;
                    node_writer.write_next(TeacherMessage::Send(send)).await?;
                    *record.state.lock() = NodeSyncState::Sent;

                    let tree = self.tree.lock();
                    for index in 0..num_children as usize {
                        if let Some(child_id) = tree.child(id, index)? {
                            queue.push_back(child_id);
                        }
                    }
                }
                NodeSyncState::Sent => unreachable!("a node is only queued once"),
            }
        }
        Ok(())
    }

    /// Waits until the receiving thread resolves `record`'s ack (positive
    /// or negative) or `max_ack_delay` elapses, whichever comes first.
    /// Either way the node leaves `Pending` before this returns, unless
    /// the receiver already marked it `Acked` via BFS propagation.
    async fn wait_for_ack(&self, record: &NodeRecord) {
        if *record.state.lock() != NodeSyncState::Pending {
            return;
        }
        tokio::select! {
            _ = record.notify.notified() => {}
            _ = tokio::time::sleep(self.max_ack_delay) => {}
        }
        let mut state = record.state.lock();
        if *state == NodeSyncState::Pending {
            *state = NodeSyncState::Missed;
        }
    }

    async fn run_receiver(
        &self,
        ack_reader: AnticipatedReceiver<AckMessage>,
        mut awaiting_rx: mpsc::UnboundedReceiver<Arc<NodeRecord>>,
    ) -> SyncResult<()> {
        while let Some(record) = awaiting_rx.recv().await {
            let ack = ack_reader.recv_anticipated().await?;
            let mut state = record.state.lock();
            if *state != NodeSyncState::Pending {
                continue;
            }
            if ack.have {
                *state = NodeSyncState::Acked;
                drop(state);
                record.notify.notify_waiters();
                self.propagate_acked(record_node_id(&record, self));
            } else {
                *state = NodeSyncState::Missed;
                drop(state);
                record.notify.notify_waiters();
            }
        }
        Ok(())
    }

    /// BFS walk marking every descendant of an acked node as `Acked` too,
    /// stopping at nodes already marked (§4.8 subtree cancellation).
    /// `root` itself was already marked `Acked` by the caller before this
    /// runs, so the walk is seeded with its *children*: starting from
    /// `root` itself would immediately hit the already-marked
    /// short-circuit below and mark nothing.
    fn propagate_acked(&self, root: Option<NodeId>) {
        let Some(root) = root else { return };
        let tree = self.tree.lock();
        let mut queue = VecDeque::new();
        if let Some(internal) = tree.store().slot(root).and_then(|s| s.as_internal()) {
            for index in 0..internal.num_children() {
                if let Some(child_id) = internal.child_id(index) {
                    queue.push_back(child_id);
                }
            }
        }
        while let Some(id) = queue.pop_front() {
            let record = self.record_for(id);
            let mut state = record.state.lock();
            if *state == NodeSyncState::Acked {
                continue;
            }
            *state = NodeSyncState::Acked;
            drop(state);
            record.notify.notify_waiters();

            if let Some(internal) = tree.store().slot(id).and_then(|s| s.as_internal()) {
                for index in 0..internal.num_children() {
                    if let Some(child_id) = internal.child_id(index) {
                        queue.push_back(child_id);
                    }
                }
            }
        }
    }
}

/// Looks up which [`NodeId`] owns `record`. `DashMap` is keyed by
/// `NodeId`, so this is a reverse scan; reconnect trees are small enough
/// relative to one session that this is cheap, and it is only called
/// once per positive ack.
fn record_node_id(record: &Arc<NodeRecord>, teacher: &TeacherSync) -> Option<NodeId> {
    teacher
        .records
        .iter()
        .find(|entry| Arc::ptr_eq(entry.value(), record))
        .map(|entry| *entry.key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use merkle_route::{AnyRoute, RouteEncoding};

    fn root_route() -> AnyRoute {
        AnyRoute::empty_in(RouteEncoding::BinaryCompressed)
    }

    /// `root -> child -> grandchild`, so acking `child` has a descendant
    /// one level further down than `child` itself to propagate to.
    fn build_two_level_tree() -> (Tree<ArenaStore>, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.alloc_internal(root_route());
        let child = tree.alloc_internal(root_route());
        let grandchild = tree.alloc_leaf(root_route(), b"leaf".to_vec());
        tree.set_child(child, 0, Some(grandchild)).unwrap();
        tree.set_child(root, 0, Some(child)).unwrap();
        (tree, child, grandchild)
    }

    #[test]
    fn propagate_acked_marks_every_descendant_of_the_acked_node() {
        let (tree, child, grandchild) = build_two_level_tree();
        let sync = TeacherSync::new(Arc::new(PlMutex::new(tree)), child, Duration::from_millis(50));

        // Simulate `run_receiver` having already marked `child` itself
        // Acked just before calling `propagate_acked`.
        *sync.record_for(child).state.lock() = NodeSyncState::Acked;
        sync.propagate_acked(Some(child));

        assert_eq!(*sync.record_for(grandchild).state.lock(), NodeSyncState::Acked);
    }

    #[test]
    fn propagate_acked_on_a_leaf_is_a_no_op_beyond_the_leaf_itself() {
        let (tree, _child, grandchild) = build_two_level_tree();
        let sync = TeacherSync::new(Arc::new(PlMutex::new(tree)), grandchild, Duration::from_millis(50));

        *sync.record_for(grandchild).state.lock() = NodeSyncState::Acked;
        sync.propagate_acked(Some(grandchild));

        assert_eq!(*sync.record_for(grandchild).state.lock(), NodeSyncState::Acked);
    }
}
