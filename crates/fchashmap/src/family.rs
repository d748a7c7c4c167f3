use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex as PlMutex, ReentrantMutex, RwLock};

use crate::mutation::{find_for_version, Mutation};

pub(crate) type Chain<V> = Arc<RwLock<Option<Arc<Mutation<V>>>>>;

/// A `(key, version)` pair meaning: once every copy at or below `version`
/// has been released, the chain at `key` may be truncated of everything
/// older than the mutation recorded at `version`.
pub(crate) struct GcEvent<K> {
    pub key: K,
    pub version: u64,
}

/// The copies FIFO's view of one family member: just enough to decide
/// when it is safe to drain the events it unblocked.
pub(crate) struct CopyRecord {
    pub version: u64,
    pub released: Arc<AtomicBool>,
}

/// State shared by every [`crate::Copy`] in one fast-copyable family: the
/// key→chain index, the pending-GC-events FIFO, the live-copies FIFO, and
/// the reentrant lock serializing pruning attempts.
pub(crate) struct Family<K, V> {
    pub index: DashMap<K, Chain<V>>,
    pub gc_events: PlMutex<VecDeque<GcEvent<K>>>,
    pub copies: PlMutex<VecDeque<CopyRecord>>,
    pub gc_lock: ReentrantMutex<()>,
    pub size: AtomicUsize,
    pub next_version: AtomicU64,
    pub max_gc_queue_size: usize,
}

impl<K, V> Family<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(max_gc_queue_size: usize) -> Arc<Self> {
        Arc::new(Self {
            index: DashMap::new(),
            gc_events: PlMutex::new(VecDeque::new()),
            copies: PlMutex::new(VecDeque::new()),
            gc_lock: ReentrantMutex::new(()),
            size: AtomicUsize::new(0),
            next_version: AtomicU64::new(0),
            max_gc_queue_size,
        })
    }

    pub fn allocate_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::AcqRel)
    }

    pub fn register_copy(&self, version: u64) -> Arc<AtomicBool> {
        let released = Arc::new(AtomicBool::new(false));
        self.copies.lock().push_back(CopyRecord {
            version,
            released: Arc::clone(&released),
        });
        released
    }

    pub fn chain_for(&self, key: &K) -> Chain<V> {
        self.index
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(None)))
            .clone()
    }

    pub fn lookup(&self, key: &K) -> Option<Chain<V>> {
        self.index.get(key).map(|r| r.value().clone())
    }

    /// Records that the mutation just written at `version` for `key`
    /// superseded an older one, so it becomes a future truncation anchor.
    pub fn record_supersession(&self, key: K, version: u64) {
        let mut events = self.gc_events.lock();
        events.push_back(GcEvent { key, version });
        if events.len() > self.max_gc_queue_size {
            tracing::warn!(
                queue_len = events.len(),
                threshold = self.max_gc_queue_size,
                "fchashmap GC event queue exceeds configured warning threshold"
            );
        }
    }

    /// Best-effort pruning pass: never blocks a concurrent writer. Called
    /// opportunistically from `release()`, and from the background GC
    /// worker on its own schedule.
    pub fn try_prune(&self) {
        let Some(_guard) = self.gc_lock.try_lock() else {
            return;
        };
        loop {
            let ready_version = {
                let copies = self.copies.lock();
                match copies.front() {
                    Some(record) if record.released.load(Ordering::Acquire) => Some(record.version),
                    _ => None,
                }
            };
            let Some(version) = ready_version else {
                break;
            };
            loop {
                let event = {
                    let mut events = self.gc_events.lock();
                    match events.front() {
                        Some(e) if e.version <= version => events.pop_front(),
                        _ => None,
                    }
                };
                let Some(event) = event else {
                    break;
                };
                self.truncate(&event.key, event.version);
            }
            self.copies.lock().pop_front();
        }
    }

    fn truncate(&self, key: &K, version: u64) {
        let Some(chain) = self.lookup(key) else {
            return;
        };
        let mut head_guard = chain.write();
        let old_head = head_guard.clone();
        let Some(anchor) = find_for_version(&old_head, version) else {
            return;
        };

        let mut newer = Vec::new();
        let mut node = old_head;
        while let Some(m) = node {
            if Arc::ptr_eq(&m, &anchor) {
                break;
            }
            newer.push((m.version, m.value.clone()));
            node = m.previous.clone();
        }

        let truncated_anchor = Arc::new(Mutation {
            version: anchor.version,
            value: anchor.value.clone(),
            previous: None,
        });
        let mut rebuilt = Arc::clone(&truncated_anchor);
        for (v, value) in newer.into_iter().rev() {
            rebuilt = Arc::new(Mutation {
                version: v,
                value,
                previous: Some(rebuilt),
            });
        }

        let collapsed_to_single_deletion =
            truncated_anchor.is_deletion() && Arc::ptr_eq(&rebuilt, &truncated_anchor);
        *head_guard = Some(rebuilt);
        drop(head_guard);

        if collapsed_to_single_deletion {
            self.index.remove(key);
        }
    }
}
