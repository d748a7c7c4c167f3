use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex as PlMutex;

use crate::family::Family;

/// Background worker that periodically runs best-effort pruning on a
/// family, so garbage collection makes progress even if no foreground
/// thread happens to call `Copy::release` or `Copy::put`/`remove`.
pub struct GcWorker {
    handle: Option<JoinHandle<()>>,
    stop: Arc<PlMutex<bool>>,
}

impl GcWorker {
    /// Spawns a thread that wakes every `interval` and calls
    /// [`Family::try_prune`] as long as the family is still reachable.
    /// Holds only a [`Weak`] reference so the family (and its worker) can
    /// be dropped together once every copy goes out of scope.
    pub fn spawn<K, V>(family: &Arc<Family<K, V>>, interval: Duration) -> Self
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let weak: Weak<Family<K, V>> = Arc::downgrade(family);
        let stop = Arc::new(PlMutex::new(false));
        let stop_thread = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("fchashmap-gc".to_string())
            .spawn(move || loop {
                std::thread::sleep(interval);
                if *stop_thread.lock() {
                    break;
                }
                match weak.upgrade() {
                    Some(family) => family.try_prune(),
                    None => break,
                }
            })
            .expect("failed to spawn fchashmap GC thread");

        Self {
            handle: Some(handle),
            stop,
        }
    }
}

impl Drop for GcWorker {
    fn drop(&mut self) {
        *self.stop.lock() = true;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
