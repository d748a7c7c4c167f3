use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FcHashMapError, FcResult};
use crate::family::Family;
use crate::gc::GcWorker;
use crate::mutation::{find_for_version, Mutation};

/// One version-scoped, copy-on-write view of a fast-copyable hash map.
///
/// A fresh [`FCHashMap::new`] root copy is mutable. Calling [`Copy::copy`]
/// freezes `self` (it becomes an immutable, forever-readable snapshot at
/// its version) and returns a new mutable copy one version ahead, sharing
/// the same underlying [`Family`]. Mutations on one copy are invisible to
/// older copies: every read walks the target key's mutation chain for the
/// newest entry at or before the copy's own version.
pub struct Copy<K, V> {
    family: Arc<Family<K, V>>,
    version: u64,
    mutable: AtomicBool,
    released: Arc<AtomicBool>,
    size: AtomicI64,
}

/// A fast-copyable, version-scoped, copy-on-write hash map. Constructing
/// one returns the mutable root [`Copy`]; every further generation comes
/// from calling [`Copy::copy`] on the current one.
pub struct FCHashMap;

/// The result of [`Copy::get_for_modify`].
pub struct ForModify<V> {
    /// The value now recorded at this copy's own version, ready to be
    /// handed back to [`Copy::put`] once the caller has mutated it.
    pub value: Option<Arc<V>>,
    /// The value visible just before this copy's first mutation of the
    /// key this version.
    pub original: Option<Arc<V>>,
}

impl FCHashMap {
    /// Starts a new family and returns its mutable root copy at version 0.
    pub fn new<K, V>(max_gc_queue_size: usize) -> Copy<K, V>
    where
        K: Eq + Hash + Clone,
    {
        let family = Family::new(max_gc_queue_size);
        let version = family.allocate_version();
        let released = family.register_copy(version);
        Copy {
            family,
            version,
            mutable: AtomicBool::new(true),
            released,
            size: AtomicI64::new(0),
        }
    }
}

impl<K, V> Copy<K, V>
where
    K: Eq + Hash + Clone,
{
    fn is_mutable(&self) -> bool {
        self.mutable.load(Ordering::Acquire)
    }

    fn check_mutable(&self) -> FcResult<()> {
        if self.is_mutable() {
            Ok(())
        } else {
            Err(FcHashMapError::Immutable {
                version: self.version,
            })
        }
    }

    fn check_not_released(&self) -> FcResult<()> {
        if self.released.load(Ordering::Acquire) {
            Err(FcHashMapError::Released)
        } else {
            Ok(())
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire).max(0) as usize
    }

    fn head_at(&self, key: &K) -> Option<Arc<Mutation<V>>> {
        let chain = self.family.lookup(key)?;
        let head = chain.read().clone();
        find_for_version(&head, self.version)
    }

    pub fn get(&self, key: &K) -> FcResult<Option<Arc<V>>> {
        self.check_not_released()?;
        Ok(self.head_at(key).and_then(|m| m.value.clone()))
    }

    pub fn contains(&self, key: &K) -> FcResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Copy-on-write entry point for a read-modify-write: if this copy's
    /// version already has its own mutation for `key` (e.g. an earlier
    /// `get_for_modify`/`put` at this same version), returns it
    /// unchanged; otherwise clones the newest visible value into a fresh
    /// mutation recorded at this copy's version, so later reads of this
    /// copy already see the clone even before the caller calls
    /// [`Copy::put`]. `value` is the (possibly freshly cloned) value now
    /// owned by this version; `original` is the value as it stood just
    /// before this copy first touched `key`.
    pub fn get_for_modify(&self, key: &K) -> FcResult<ForModify<V>>
    where
        V: Clone,
    {
        self.check_mutable()?;
        self.check_not_released()?;

        let chain = self.family.chain_for(key);
        let mut head_guard = chain.write();

        if let Some(head) = head_guard.clone() {
            if head.version == self.version {
                return Ok(ForModify {
                    value: head.value.clone(),
                    original: head.previous.as_ref().and_then(|p| p.value.clone()),
                });
            }
        }

        let baseline = find_for_version(&head_guard, self.version);
        let Some(baseline_value) = baseline.as_ref().and_then(|m| m.value.clone()) else {
            return Ok(ForModify {
                value: None,
                original: None,
            });
        };

        let cloned = Arc::new((*baseline_value).clone());
        let new_node = Arc::new(Mutation {
            version: self.version,
            value: Some(Arc::clone(&cloned)),
            previous: head_guard.clone(),
        });
        *head_guard = Some(new_node);
        drop(head_guard);

        if let Some(old) = baseline {
            self.family.record_supersession(key.clone(), old.version);
        }

        Ok(ForModify {
            value: Some(cloned),
            original: Some(baseline_value),
        })
    }

    /// Appends a new mutation recording `value` at `key`. Returns the
    /// previous value, if any existed at this copy's version.
    pub fn put(&self, key: K, value: V) -> FcResult<Option<Arc<V>>> {
        self.check_mutable()?;
        self.check_not_released()?;
        let previous = self.push(key, Some(value));
        if previous.is_none() {
            self.size.fetch_add(1, Ordering::AcqRel);
        }
        Ok(previous)
    }

    /// Appends a deletion mutation at `key`. Returns the value that was
    /// removed, if any existed at this copy's version.
    pub fn remove(&self, key: &K) -> FcResult<Option<Arc<V>>> {
        self.check_mutable()?;
        self.check_not_released()?;
        if self.get(key)?.is_none() {
            return Ok(None);
        }
        let previous = self.push(key.clone(), None);
        if previous.is_some() {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
        Ok(previous)
    }

    /// Records a mutation for `key`, returning the value that was visible
    /// at this copy's version just before this call. At most one
    /// mutation ever exists per `(key, version)` (spec §4.5): if the
    /// chain head already belongs to this copy's version (an earlier
    /// `put`/`remove`/`get_for_modify` on the same copy), it is replaced
    /// in place rather than prepended over; only a genuinely older
    /// mutation being superseded prepends a new node and records a GC
    /// event (the very first write to a fresh key has nothing to
    /// collect).
    fn push(&self, key: K, value: Option<V>) -> Option<Arc<V>> {
        let chain = self.family.chain_for(&key);
        let mut head_guard = chain.write();

        if let Some(head) = head_guard.clone() {
            if head.version == self.version {
                let updated = Arc::new(Mutation {
                    version: self.version,
                    value: value.map(Arc::new),
                    previous: head.previous.clone(),
                });
                *head_guard = Some(updated);
                return head.value.clone();
            }
        }

        let superseded = find_for_version(&head_guard, self.version);
        let new_node = Arc::new(Mutation {
            version: self.version,
            value: value.map(Arc::new),
            previous: head_guard.clone(),
        });
        *head_guard = Some(Arc::clone(&new_node));
        drop(head_guard);

        if let Some(ref old) = superseded {
            self.family.record_supersession(key, old.version);
        }
        superseded.and_then(|m| m.value.clone())
    }

    /// Freezes `self` as an immutable snapshot and returns a new mutable
    /// copy one version ahead, sharing the same family and current size.
    pub fn copy(&self) -> FcResult<Copy<K, V>> {
        self.check_not_released()?;
        self.mutable.store(false, Ordering::Release);
        let version = self.family.allocate_version();
        let released = self.family.register_copy(version);
        Ok(Copy {
            family: Arc::clone(&self.family),
            version,
            mutable: AtomicBool::new(true),
            released,
            size: AtomicI64::new(self.size.load(Ordering::Acquire)),
        })
    }

    /// Marks this copy as released, allowing the background GC (or the
    /// next opportunistic [`Copy::put`]/[`Copy::remove`] elsewhere in the
    /// family) to prune mutation history this copy was the last to need.
    pub fn release(&self) -> FcResult<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Err(FcHashMapError::Released);
        }
        self.family.try_prune();
        Ok(())
    }

    /// Spawns a background thread that periodically drives GC for this
    /// copy's family. The worker holds only a weak reference, so it exits
    /// on its own once every copy in the family is dropped; dropping the
    /// returned handle also stops it immediately.
    pub fn spawn_gc_worker(&self, interval: Duration) -> GcWorker
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        GcWorker::spawn(&self.family, interval)
    }

    /// Snapshot of every `(key, value)` visible at this copy's version.
    /// Deleted or not-yet-created keys are skipped. There is no
    /// iterator-driven removal: callers wanting to delete while iterating
    /// collect keys first and call [`Copy::remove`] on each.
    pub fn entries(&self) -> FcResult<Vec<(K, Arc<V>)>>
    where
        K: Clone,
    {
        self.check_not_released()?;
        let mut out = Vec::new();
        for entry in self.family.index.iter() {
            let key = entry.key().clone();
            if let Some(value) = self.get(&key)? {
                out.push((key, value));
            }
        }
        Ok(out)
    }
}

impl<K, V> Drop for Copy<K, V> {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.family.try_prune();
        }
    }
}
