use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use byte_stream::Digest384;
use parking_lot::Mutex as PlMutex;

use crate::address_book::{AddressBook, NodeId};
use crate::reservation::ReservationCounts;
use crate::signature::Signature;

/// A single round's signed state: its hash, the address book its quorum
/// is computed against, and whatever signatures have been attached so
/// far. `complete` flips once the attached stake exceeds the address
/// book's quorum threshold.
pub struct SignedState {
    round: i64,
    hash: Digest384,
    address_book: Arc<AddressBook>,
    signatures: PlMutex<HashMap<NodeId, Signature>>,
    complete: AtomicBool,
    reservations: ReservationCounts,
}

impl SignedState {
    pub fn new(round: i64, hash: Digest384, address_book: Arc<AddressBook>) -> Self {
        Self {
            round,
            hash,
            address_book,
            signatures: PlMutex::new(HashMap::new()),
            complete: AtomicBool::new(false),
            reservations: ReservationCounts::default(),
        }
    }

    pub fn round(&self) -> i64 {
        self.round
    }

    pub fn hash(&self) -> Digest384 {
        self.hash
    }

    pub fn address_book(&self) -> &Arc<AddressBook> {
        &self.address_book
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    /// Current strong/weak reference counts, mainly useful for tests and
    /// diagnostics: production code should prefer acquiring a [`Reserved`]
    /// guard over reading counts directly.
    pub fn reservations(&self) -> &ReservationCounts {
        &self.reservations
    }

    /// Verifies and attaches `signature` from `node_id`. Returns `true`
    /// if it was newly recorded (an invalid or duplicate signature is
    /// silently discarded and returns `false`).
    pub fn attach_signature(&self, node_id: NodeId, signature: Signature) -> bool {
        if !self.address_book.verify_signature(node_id, &self.hash, &signature) {
            return false;
        }
        let mut signatures = self.signatures.lock();
        if signatures.contains_key(&node_id) {
            return false;
        }
        signatures.insert(node_id, signature);
        true
    }

    pub fn signed_stake(&self) -> u64 {
        let signatures = self.signatures.lock();
        signatures
            .keys()
            .filter_map(|node_id| self.address_book.stake_of(*node_id))
            .sum()
    }

    pub fn signer_count(&self) -> usize {
        self.signatures.lock().len()
    }

    /// Snapshot of every signature currently attached, for persistence
    /// (see [`crate::persistence::StateWriter`]).
    pub fn signatures(&self) -> Vec<(NodeId, Signature)> {
        self.signatures
            .lock()
            .iter()
            .map(|(node_id, signature)| (*node_id, signature.clone()))
            .collect()
    }

    pub fn has_quorum(&self) -> bool {
        self.signed_stake() >= self.address_book.quorum_threshold()
    }
}
