use std::sync::Arc;

/// One entry in a per-key mutation chain, newest-first. `value = None`
/// denotes a deletion recorded at `version`.
pub(crate) struct Mutation<V> {
    pub version: u64,
    pub value: Option<Arc<V>>,
    pub previous: Option<Arc<Mutation<V>>>,
}

impl<V> Mutation<V> {
    pub fn is_deletion(&self) -> bool {
        self.value.is_none()
    }
}

/// Walks `head` toward the tail, returning the newest mutation whose
/// `version <= version`. Traversal only ever follows `Arc` clones, so a
/// concurrent prepend (a new `put`/`remove`) never invalidates a reader
/// partway through a walk it already started.
pub(crate) fn find_for_version<V>(
    head: &Option<Arc<Mutation<V>>>,
    version: u64,
) -> Option<Arc<Mutation<V>>> {
    let mut node = head.clone();
    while let Some(m) = node {
        if m.version <= version {
            return Some(m);
        }
        node = m.previous.clone();
    }
    None
}
