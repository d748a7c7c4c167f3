use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use byte_stream::Digest384;
use parking_lot::Mutex as PlMutex;

use crate::address_book::NodeId;
use crate::map::SignedStateMap;
use crate::notification::{NotificationChannels, StateSource};
use crate::reservation::Reserved;
use crate::signature::{HashSigner, Signature};
use crate::state::SignedState;

/// No tracked round has ever been retired.
const NEVER_RETIRED: i64 = i64::MIN;

/// Owns the tracked window of in-flight signed states plus a weak handle
/// to the last one that reached quorum, and publishes the four lifecycle
/// notifications as states move through self-signing, tracking, and
/// completion.
pub struct SignedStateManager {
    tracked: SignedStateMap<true>,
    last_complete: PlMutex<Option<Weak<SignedState>>>,
    self_signer: Arc<dyn HashSigner>,
    window: i64,
    highest_round_seen: AtomicI64,
    lowest_retired_round: AtomicI64,
    channels: NotificationChannels,
}

impl SignedStateManager {
    pub fn new(window: i64, self_signer: Arc<dyn HashSigner>) -> Self {
        Self {
            tracked: SignedStateMap::new(),
            last_complete: PlMutex::new(None),
            self_signer,
            window,
            highest_round_seen: AtomicI64::new(NEVER_RETIRED),
            lowest_retired_round: AtomicI64::new(NEVER_RETIRED),
            channels: NotificationChannels::new(),
        }
    }

    pub fn channels(&self) -> &NotificationChannels {
        &self.channels
    }

    pub fn window(&self) -> i64 {
        self.window
    }

    fn observe_round(&self, round: i64) {
        self.highest_round_seen.fetch_max(round, Ordering::AcqRel);
    }

    /// Self-signs `state`, tracks it, and retires the oldest tracked
    /// round if the window grew beyond `W`.
    pub fn add_unsigned_state(&self, state: Arc<SignedState>) {
        let round = state.round();
        self.observe_round(round);

        let signature = self.self_signer.sign(&state.hash());
        state.attach_signature(self.self_signer.node_id(), signature);
        self.channels.emit_self_signed(round);

        self.tracked.put(Arc::clone(&state));
        self.channels
            .emit_new_state_tracked(round, StateSource::Transactions);

        if self.tracked.len() as i64 > self.window {
            if let Some(retired) = self.tracked.pop_oldest() {
                self.lowest_retired_round
                    .fetch_max(retired.round(), Ordering::AcqRel);
                if !retired.is_complete() {
                    self.channels.emit_state_lacks_signatures(retired.round());
                }
            }
        }
    }

    /// Bypasses self-signing and publishes `state` directly as the last
    /// complete state, as when restoring from disk.
    pub fn add_complete_state(&self, state: Arc<SignedState>) {
        let round = state.round();
        self.observe_round(round);
        state.mark_complete();
        *self.last_complete.lock() = Some(Arc::downgrade(&state));
        self.channels
            .emit_new_state_tracked(round, StateSource::Disk);
    }

    /// Applies an observed signature from `node_id` over `hash` at
    /// `round`. Out-of-window, already-retired, hash-mismatched, or
    /// cryptographically invalid signatures are silently dropped.
    pub fn signature_observed(&self, round: i64, node_id: NodeId, hash: Digest384, signature: Signature) {
        if round > self.highest_round_seen.load(Ordering::Acquire) + self.window {
            return;
        }
        if round <= self.lowest_retired_round.load(Ordering::Acquire) {
            return;
        }

        let Ok(Some(reserved)) = self.tracked.get(round, false) else {
            return;
        };
        if reserved.hash() != hash {
            return;
        }

        let newly_attached = reserved.attach_signature(node_id, signature);
        if newly_attached && !reserved.is_complete() && reserved.has_quorum() {
            reserved.mark_complete();
            self.channels.emit_state_has_enough_signatures(round);
            *self.last_complete.lock() = Some(Arc::downgrade(reserved.state()));
        }
    }

    /// Returns a strong reservation on the tracked state at `round` if
    /// its hash matches, else on the last complete state if `round` is
    /// at or before it, else `None`.
    pub fn find(&self, round: i64, hash: Digest384) -> Option<Reserved> {
        if let Ok(Some(reserved)) = self.tracked.get(round, true) {
            if reserved.hash() == hash {
                return Some(reserved);
            }
        }
        let last_complete = self.last_complete.lock().as_ref()?.upgrade()?;
        if round <= last_complete.round() {
            Some(Reserved::acquire(last_complete, true))
        } else {
            None
        }
    }

    pub fn last_complete(&self) -> Option<Arc<SignedState>> {
        self.last_complete.lock().as_ref()?.upgrade()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_book::{AddressBook, AddressBookMember};
    use crate::signature::KeyEchoSigner;

    fn book() -> Arc<AddressBook> {
        Arc::new(AddressBook::new(vec![
            AddressBookMember {
                node_id: NodeId(1),
                stake: 10,
                public_key: vec![1],
            },
            AddressBookMember {
                node_id: NodeId(2),
                stake: 10,
                public_key: vec![2],
            },
            AddressBookMember {
                node_id: NodeId(3),
                stake: 10,
                public_key: vec![3],
            },
        ]))
    }

    fn state(round: i64, book: &Arc<AddressBook>) -> Arc<SignedState> {
        Arc::new(SignedState::new(
            round,
            Digest384::from_bytes([round as u8; 48]),
            Arc::clone(book),
        ))
    }

    fn signer(node_id: NodeId) -> Arc<dyn HashSigner> {
        Arc::new(KeyEchoSigner::new(node_id, vec![node_id.0 as u8]))
    }

    #[test]
    fn add_unsigned_state_self_signs_and_tracks() {
        let manager = SignedStateManager::new(5, signer(NodeId(1)));
        let book = book();
        let s = state(1, &book);
        manager.add_unsigned_state(Arc::clone(&s));
        assert_eq!(s.signer_count(), 1);
        assert_eq!(manager.tracked.len(), 1);
    }

    #[test]
    fn window_overflow_retires_the_oldest_round() {
        let manager = SignedStateManager::new(2, signer(NodeId(1)));
        let book = book();
        for round in 1..=4 {
            manager.add_unsigned_state(state(round, &book));
        }
        // window = 2 means at most 3 tracked rounds before retirement kicks in.
        assert!(manager.tracked.len() <= 3);
        assert!(!manager.tracked.rounds().contains(&1));
    }

    #[test]
    fn signature_observed_reaching_quorum_marks_state_complete() {
        let manager = SignedStateManager::new(5, signer(NodeId(1)));
        let book = book();
        let s = state(1, &book);
        let hash = s.hash();
        manager.add_unsigned_state(Arc::clone(&s));

        manager.signature_observed(
            1,
            NodeId(2),
            hash,
            Signature {
                signer_key: vec![2],
                bytes: hash.as_bytes().to_vec(),
            },
        );
        assert!(!s.is_complete());

        manager.signature_observed(
            1,
            NodeId(3),
            hash,
            Signature {
                signer_key: vec![3],
                bytes: hash.as_bytes().to_vec(),
            },
        );
        assert!(s.is_complete());
        assert!(manager.last_complete().is_some());
    }

    #[test]
    fn signature_observed_drops_out_of_window_and_mismatched_hash() {
        let manager = SignedStateManager::new(1, signer(NodeId(1)));
        let book = book();
        let s = state(1, &book);
        manager.add_unsigned_state(Arc::clone(&s));

        // Far beyond the window: silently dropped, no panic, no effect.
        manager.signature_observed(
            100,
            NodeId(2),
            Digest384::from_bytes([9u8; 48]),
            Signature {
                signer_key: vec![2],
                bytes: vec![9u8; 48],
            },
        );
        assert_eq!(s.signer_count(), 1);

        // Wrong hash for round 1: dropped.
        manager.signature_observed(
            1,
            NodeId(2),
            Digest384::from_bytes([0xffu8; 48]),
            Signature {
                signer_key: vec![2],
                bytes: vec![0xffu8; 48],
            },
        );
        assert_eq!(s.signer_count(), 1);
    }

    #[test]
    fn find_falls_back_to_last_complete_state() {
        let manager = SignedStateManager::new(5, signer(NodeId(1)));
        let book = book();
        let complete = state(1, &book);
        manager.add_complete_state(Arc::clone(&complete));

        let found = manager.find(1, complete.hash()).unwrap();
        assert_eq!(found.round(), 1);

        // A later, never-tracked round falls through to None.
        assert!(manager.find(2, complete.hash()).is_none());
        // An earlier, never-tracked round still falls back to the last
        // complete state, since `round <= last_complete.round` holds.
        let found_again = manager.find(0, complete.hash()).unwrap();
        assert_eq!(found_again.round(), 1);
    }
}
