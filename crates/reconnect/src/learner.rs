use std::collections::VecDeque;
use std::sync::Arc;

use merkle_route::{AnyRoute, MerkleRoute};
use merkle_tree::{ArenaStore, NodeId, Tree};
use parking_lot::Mutex as PlMutex;

use crate::anticipated::{AnticipatedReceiver, AnticipatedWriter};
use crate::error::{SyncError, SyncResult};
use crate::message::{AckMessage, NodeSend, TeacherMessage};
use crate::teacher::LEAF_CLASS_ID;

struct PendingSlot {
    parent: Option<(NodeId, usize)>,
    route: AnyRoute,
    /// The corresponding node in the learner's pre-reconnect tree, if any;
    /// `None` once the walk has stepped past where the old tree ended.
    existing: Option<NodeId>,
}

/// Drives the learner side of one reconnect session, rebuilding a fresh
/// tree in lockstep with the teacher's BFS send order (§4.8). `existing`
/// is the learner's last signed state tree, consulted so that subtrees
/// it already holds are reused instead of re-transferred.
pub struct LearnerSync {
    existing: Option<Arc<PlMutex<Tree<ArenaStore>>>>,
    existing_root: Option<NodeId>,
}

impl LearnerSync {
    pub fn new(existing: Option<(Arc<PlMutex<Tree<ArenaStore>>>, NodeId)>) -> Self {
        let (existing, existing_root) = match existing {
            Some((tree, root)) => (Some(tree), Some(root)),
            None => (None, None),
        };
        Self {
            existing,
            existing_root,
        }
    }

    /// Runs the full session and returns the freshly built tree along
    /// with its root node id.
    pub async fn run(
        &self,
        node_reader: AnticipatedReceiver<TeacherMessage>,
        mut ack_writer: AnticipatedWriter<AckMessage>,
        root_route: AnyRoute,
    ) -> SyncResult<(Tree<ArenaStore>, NodeId)> {
        let mut tree = Tree::new();
        let mut queue: VecDeque<PendingSlot> = VecDeque::new();
        queue.push_back(PendingSlot {
            parent: None,
            route: root_route,
            existing: self.existing_root,
        });

        let mut root_id = None;

        while let Some(slot) = queue.pop_front() {
            let query = match node_reader.recv_anticipated().await? {
                TeacherMessage::Query(q) => q,
                TeacherMessage::Send(_) => {
                    return Err(SyncError::OutOfOrder {
                        expected: 0,
                        produced: 1,
                    })
                }
            };

            let reused = slot
                .existing
                .and_then(|id| self.hash_matches(id, query.hash).then_some(id));

            if let Some(existing_id) = reused {
                ack_writer.write_next(AckMessage { have: true }).await?;
                let existing_tree = self
                    .existing
                    .as_ref()
                    .expect("existing id implies an existing tree");
                let new_id = copy_subtree(&existing_tree.lock(), existing_id, &mut tree, slot.route.clone())?;
                attach(&mut tree, &slot, new_id)?;
                if slot.parent.is_none() {
                    root_id = Some(new_id);
                }
                continue;
            }

            ack_writer.write_next(AckMessage { have: false }).await?;
            let send = match node_reader.recv_anticipated().await? {
                TeacherMessage::Send(s) => s,
                TeacherMessage::Query(_) => {
                    return Err(SyncError::OutOfOrder {
                        expected: 1,
                        produced: 0,
                    })
                }
            };

            let new_id = self.build_from_send(&mut tree, &send, slot.route.clone())?;
            attach(&mut tree, &slot, new_id)?;
            if slot.parent.is_none() {
                root_id = Some(new_id);
            }

            for index in 0..send.num_children as usize {
                let child_route = slot.route.extend(index as u64)?;
                let child_existing = slot.existing.and_then(|existing_id| {
                    self.existing
                        .as_ref()
                        .and_then(|t| t.lock().child(existing_id, index).ok().flatten())
                });
                queue.push_back(PendingSlot {
                    parent: Some((new_id, index)),
                    route: child_route,
                    existing: child_existing,
                });
            }
        }

        let root_id = root_id.ok_or(SyncError::Refused {
            reason: "reconnect session produced no nodes",
        })?;
        Ok((tree, root_id))
    }

    fn hash_matches(&self, existing_id: NodeId, hash: byte_stream::Digest384) -> bool {
        self.existing
            .as_ref()
            .and_then(|t| t.lock().hash(existing_id).ok().flatten())
            .map(|existing_hash| existing_hash == hash)
            .unwrap_or(false)
    }

    fn build_from_send(
        &self,
        tree: &mut Tree<ArenaStore>,
        send: &NodeSend,
        route: AnyRoute,
    ) -> SyncResult<NodeId> {
        if send.class_id == LEAF_CLASS_ID {
            Ok(tree.alloc_leaf(route, send.payload.clone()))
        } else {
            Ok(tree.alloc_internal_with_class(route, send.class_id, send.version))
        }
    }
}

fn attach(tree: &mut Tree<ArenaStore>, slot: &PendingSlot, new_id: NodeId) -> SyncResult<()> {
    if let Some((parent, index)) = slot.parent {
        tree.set_child(parent, index, Some(new_id))?;
    }
    Ok(())
}

/// Deep-copies `existing_id`'s whole subtree from `existing` into `tree`,
/// rooted at `route`, reusing cached leaf data and hashes verbatim.
fn copy_subtree(
    existing: &Tree<ArenaStore>,
    existing_id: NodeId,
    tree: &mut Tree<ArenaStore>,
    route: AnyRoute,
) -> SyncResult<NodeId> {
    let slot = existing
        .store()
        .slot(existing_id)
        .ok_or(merkle_tree::TreeError::NodeNotFound(existing_id))?;

    if let Some(leaf) = slot.as_leaf() {
        // Same data, so the framework hash recomputed from it (lazily, on
        // first `leaf_hash()` call) is identical; no need to copy it.
        let new_id = tree.alloc_leaf(route, leaf.data().to_vec());
        return Ok(new_id);
    }

    let internal = slot.as_internal().expect("non-leaf slot is internal");
    let new_id = tree.alloc_internal_with_class(route.clone(), internal.class_id(), internal.version());
    if let Some(hash) = internal.hash() {
        tree.set_internal_hash(new_id, hash)?;
    }
    for index in 0..internal.num_children() {
        if let Some(child_id) = internal.child_id(index) {
            let child_route = route.extend(index as u64)?;
            let new_child = copy_subtree(existing, child_id, tree, child_route)?;
            tree.set_child(new_id, index, Some(new_child))?;
        }
    }
    Ok(new_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anticipated::anticipated_channel;
    use crate::message::NodeQuery;
    use byte_stream::Digest384;
    use merkle_route::RouteEncoding;

    fn root_route() -> AnyRoute {
        AnyRoute::empty_in(RouteEncoding::BinaryCompressed)
    }

    #[tokio::test]
    async fn learner_builds_a_single_leaf_from_a_miss() {
        let learner = LearnerSync::new(None);
        let (node_reader, mut node_writer) = anticipated_channel::<TeacherMessage>(4);
        let (ack_reader, ack_writer) = anticipated_channel::<AckMessage>(4);

        let hash = Digest384::from_bytes([3u8; 48]);
        let driver = tokio::spawn(async move {
            node_writer
                .write_next(TeacherMessage::Query(NodeQuery {
                    class_id: LEAF_CLASS_ID,
                    version: 1,
                    hash,
                }))
                .await
                .unwrap();
            let ack = ack_reader.recv_anticipated().await.unwrap();
            assert!(!ack.have);
            node_writer
                .write_next(TeacherMessage::Send(NodeSend {
                    class_id: LEAF_CLASS_ID,
                    version: 1,
                    hash,
                    num_children: 0,
                    payload: b"leaf-data".to_vec(),
                }))
                .await
                .unwrap();
        });

        let (tree, root) = learner
            .run(node_reader, ack_writer, root_route())
            .await
            .unwrap();
        driver.await.unwrap();

        assert_eq!(
            tree.store().slot(root).unwrap().as_leaf().unwrap().data(),
            b"leaf-data"
        );
    }

    #[tokio::test]
    async fn learner_reuses_an_identical_existing_subtree() {
        let mut existing_tree = Tree::new();
        let existing_root = existing_tree.alloc_leaf(root_route(), b"unchanged".to_vec());
        let hash = existing_tree.leaf_hash(existing_root).unwrap();
        let existing = Arc::new(PlMutex::new(existing_tree));

        let learner = LearnerSync::new(Some((Arc::clone(&existing), existing_root)));
        let (node_reader, mut node_writer) = anticipated_channel::<TeacherMessage>(4);
        let (ack_reader, ack_writer) = anticipated_channel::<AckMessage>(4);

        let driver = tokio::spawn(async move {
            node_writer
                .write_next(TeacherMessage::Query(NodeQuery {
                    class_id: LEAF_CLASS_ID,
                    version: 1,
                    hash,
                }))
                .await
                .unwrap();
            let ack = ack_reader.recv_anticipated().await.unwrap();
            assert!(ack.have);
        });

        let (tree, root) = learner
            .run(node_reader, ack_writer, root_route())
            .await
            .unwrap();
        driver.await.unwrap();

        assert_eq!(
            tree.store().slot(root).unwrap().as_leaf().unwrap().data(),
            b"unchanged"
        );
    }
}
