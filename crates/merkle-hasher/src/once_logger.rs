use std::collections::HashSet;

use parking_lot::Mutex as PlMutex;

/// Logs each distinct kind of worker-pool failure only once, rate-
/// limiting repeated occurrences of the same error to a single
/// `tracing::error!` line (spec §7's error propagation policy: "logged
/// once at the first occurrence, rate-limited by a threshold handler").
/// Later occurrences of an already-seen `kind` are dropped silently;
/// callers still propagate the error itself through their own return
/// value, this only governs what reaches the log.
pub struct OnceLogger {
    seen: PlMutex<HashSet<&'static str>>,
}

impl OnceLogger {
    pub fn new() -> Self {
        Self {
            seen: PlMutex::new(HashSet::new()),
        }
    }

    pub fn log_once(&self, kind: &'static str, err: &dyn std::fmt::Display) {
        let mut seen = self.seen.lock();
        if seen.insert(kind) {
            tracing::error!(kind, %err, "worker pool failure");
        }
    }
}

impl Default for OnceLogger {
    fn default() -> Self {
        Self::new()
    }
}
