use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use byte_stream::{Digest384, NULL_HASH};
use merkle_tree::{NodeId, NodeSlot, Tree, TreeStore};
use parking_lot::Mutex as PlMutex;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::sync::oneshot;

use crate::error::{illegal_child_hash, HashingError};
use crate::once_logger::OnceLogger;

/// Computes the hash of a single node, assuming all of its children (if
/// any) are already hashed or null. Internal nodes that are not
/// self-hashing combine their class id, serialization version, and child
/// hashes (null-hash for missing children) into one digest; self-hashing
/// nodes and leaves simply report their already-established hash.
fn hash_node<S: TreeStore>(tree: &mut Tree<S>, id: NodeId) -> Result<Digest384, HashingError> {
    let is_internal = tree.store().slot(id).map(|s| s.as_internal().is_some());
    match is_internal {
        Some(true) => {
            if tree
                .store()
                .slot(id)
                .and_then(NodeSlot::as_internal)
                .map(|n| n.is_self_hashing())
                .unwrap_or(false)
            {
                return tree
                    .hash(id)?
                    .ok_or(HashingError::SelfHashMissing(id));
            }
            if let Some(cached) = tree.hash(id)? {
                return Ok(cached);
            }
            let (class_id, version, num_children) = {
                let internal = tree
                    .store()
                    .slot(id)
                    .and_then(NodeSlot::as_internal)
                    .ok_or(HashingError::SelfHashMissing(id))?;
                (internal.class_id(), internal.version(), internal.num_children())
            };
            let mut buf = Vec::with_capacity(12 + num_children * 48);
            buf.extend_from_slice(&class_id.to_be_bytes());
            buf.extend_from_slice(&version.to_be_bytes());
            for index in 0..num_children {
                let child_hash = match tree.child(id, index)? {
                    Some(child_id) => {
                        if tree.store().slot(child_id).is_none() {
                            return Err(illegal_child_hash(id, index));
                        }
                        hash_node(tree, child_id)?
                    }
                    None => NULL_HASH,
                };
                buf.extend_from_slice(child_hash.as_bytes());
            }
            let digest = Digest384::of_parts([buf.as_slice()]);
            tree.set_internal_hash(id, digest)?;
            Ok(digest)
        }
        Some(false) => {
            let self_hashing = tree
                .store()
                .slot(id)
                .and_then(NodeSlot::as_leaf)
                .map(|n| n.is_self_hashing())
                .unwrap_or(false);
            if self_hashing {
                tree.hash(id)?.ok_or(HashingError::SelfHashMissing(id))
            } else {
                tree.leaf_hash(id).map_err(HashingError::from)
            }
        }
        None => Err(illegal_child_hash(id, 0)),
    }
}

/// Owns a fixed-size worker pool used to hash merkle subtrees, matching
/// spec §4.4's "hasher owns a fixed-size worker pool of `P` threads".
pub struct MerkleHasher {
    pool: rayon::ThreadPool,
    workers: usize,
    failure_logger: Arc<OnceLogger>,
}

impl MerkleHasher {
    pub fn new(workers: usize) -> Result<Self, HashingError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("merkle-hasher-{i}"))
            .build()
            .map_err(|e| HashingError::PoolBuild(e.to_string()))?;
        Ok(Self {
            pool,
            workers,
            failure_logger: Arc::new(OnceLogger::new()),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Hashes `root` on the caller's thread; `None` yields the canonical
    /// null hash.
    pub fn digest_sync<S: TreeStore>(
        &self,
        tree: &mut Tree<S>,
        root: Option<NodeId>,
    ) -> Result<Digest384, HashingError> {
        match root {
            None => Ok(NULL_HASH),
            Some(id) => hash_node(tree, id),
        }
    }

    /// Hashes `root` across `self.workers` rayon tasks sharing one locked
    /// tree. Worker 0 walks a deterministic post-order traversal; the
    /// rest walk independently randomized post-order traversals so
    /// concurrent workers tend to reach different nodes first. A node
    /// already holding a cached hash is skipped by whichever worker
    /// reaches it, so duplicate work is merely wasted, never incorrect.
    /// Once fewer than `self.workers` tasks remain active, a task treats
    /// that as a signal the rest of the subtree is likely already hashed
    /// and stops early; the task that brings the active count to zero
    /// resolves the returned receiver with `root`'s final hash (or the
    /// first error observed by any task).
    pub fn digest_async<S>(
        &self,
        tree: Arc<PlMutex<Tree<S>>>,
        root: Option<NodeId>,
    ) -> oneshot::Receiver<Result<Digest384, HashingError>>
    where
        S: TreeStore + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let Some(root_id) = root else {
            let _ = tx.send(Ok(NULL_HASH));
            return rx;
        };

        let sender = Arc::new(PlMutex::new(Some(tx)));
        let active = Arc::new(AtomicUsize::new(self.workers));
        let cancelled = Arc::new(AtomicBool::new(false));
        let total_workers = self.workers;
        let failure_logger = Arc::clone(&self.failure_logger);

        for worker in 0..total_workers {
            let tree = Arc::clone(&tree);
            let sender = Arc::clone(&sender);
            let active = Arc::clone(&active);
            let cancelled = Arc::clone(&cancelled);
            let failure_logger = Arc::clone(&failure_logger);

            self.pool.spawn(move || {
                let traversal = {
                    let guard = tree.lock();
                    if worker == 0 {
                        guard.post_order(root_id)
                    } else {
                        let mut rng = SmallRng::seed_from_u64(worker as u64 ^ 0x9E37_79B9_7F4A_7C15);
                        guard.post_order_randomized(root_id, &mut rng)
                    }
                };

                let traversal = match traversal {
                    Ok(order) => order,
                    Err(err) => {
                        cancelled.store(true, Ordering::Release);
                        failure_logger.log_once("post_order_traversal", &err);
                        if let Some(tx) = sender.lock().take() {
                            let _ = tx.send(Err(HashingError::from(err)));
                        }
                        Vec::new()
                    }
                };

                let mut failure: Option<HashingError> = None;
                for id in traversal {
                    if cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    if active.load(Ordering::Acquire) < total_workers {
                        break;
                    }
                    let mut guard = tree.lock();
                    if matches!(guard.hash(id), Ok(Some(_))) {
                        continue;
                    }
                    if let Err(err) = hash_node(&mut guard, id) {
                        failure = Some(err);
                        break;
                    }
                }

                if let Some(err) = failure {
                    cancelled.store(true, Ordering::Release);
                    failure_logger.log_once("hash_node", &err);
                    if let Some(tx) = sender.lock().take() {
                        let _ = tx.send(Err(err));
                    }
                }

                let remaining = active.fetch_sub(1, Ordering::AcqRel) - 1;
                if remaining == 0 {
                    if let Some(tx) = sender.lock().take() {
                        // The last worker to finish is responsible for
                        // the final result. Other workers may have
                        // bailed out early (per the active-worker-count
                        // heuristic) before finishing their own pass
                        // over `root_id`'s subtree, so recompute here
                        // rather than trust whatever is cached: every
                        // already-hashed node resolves instantly, so
                        // this only does real work on whatever was left
                        // unfinished.
                        let result = hash_node(&mut tree.lock(), root_id);
                        let _ = tx.send(result);
                    }
                }
            });
        }

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merkle_route::{AnyRoute, RouteEncoding};
    use merkle_tree::ArenaStore;

    fn root_route() -> AnyRoute {
        AnyRoute::empty_in(RouteEncoding::BinaryCompressed)
    }

    fn sample_tree() -> (Tree<ArenaStore>, NodeId) {
        let mut tree = Tree::new();
        let root = tree.alloc_internal(root_route());
        let a = tree.alloc_leaf(root_route(), b"a".to_vec());
        let b = tree.alloc_leaf(root_route(), b"b".to_vec());
        tree.set_child(root, 0, Some(a)).unwrap();
        tree.set_child(root, 1, Some(b)).unwrap();
        (tree, root)
    }

    #[test]
    fn digest_sync_of_null_root_is_null_hash() {
        let hasher = MerkleHasher::new(2).unwrap();
        let mut tree = Tree::new();
        assert_eq!(hasher.digest_sync(&mut tree, None).unwrap(), NULL_HASH);
    }

    #[test]
    fn digest_sync_is_deterministic_and_caches_into_the_tree() {
        let hasher = MerkleHasher::new(2).unwrap();
        let (mut tree, root) = sample_tree();
        let first = hasher.digest_sync(&mut tree, Some(root)).unwrap();
        assert!(!first.is_null());
        assert_eq!(tree.hash(root).unwrap(), Some(first));

        let (mut tree2, root2) = sample_tree();
        let second = hasher.digest_sync(&mut tree2, Some(root2)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn digest_sync_skips_already_cached_subtree() {
        let hasher = MerkleHasher::new(1).unwrap();
        let (mut tree, root) = sample_tree();
        let first = hasher.digest_sync(&mut tree, Some(root)).unwrap();

        // A second run must find the root's hash already cached and
        // return it unchanged rather than recomputing from the children.
        let second = hasher.digest_sync(&mut tree, Some(root)).unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.hash(root).unwrap(), Some(first));
    }

    #[tokio::test]
    async fn digest_async_matches_digest_sync() {
        let hasher = MerkleHasher::new(3).unwrap();
        let (mut sync_tree, sync_root) = sample_tree();
        let expected = hasher.digest_sync(&mut sync_tree, Some(sync_root)).unwrap();

        let (tree, root) = sample_tree();
        let shared = Arc::new(PlMutex::new(tree));
        let actual = hasher
            .digest_async(Arc::clone(&shared), Some(root))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn illegal_child_hash_is_reported_for_a_dangling_child() {
        let mut tree = Tree::new();
        let root = tree.alloc_internal(root_route());
        let leaf = tree.alloc_leaf(root_route(), b"x".to_vec());
        tree.set_child(root, 0, Some(leaf)).unwrap();
        tree.release(leaf).unwrap();
        // `leaf` was released out-of-band (without going through
        // `Tree::set_child`'s replace/clear path), so the parent's child
        // slot now dangles.

        let hasher = MerkleHasher::new(1).unwrap();
        let err = hasher.digest_sync(&mut tree, Some(root)).unwrap_err();
        assert!(matches!(err, HashingError::IllegalChildHash { index: 0, .. }));
    }
}
