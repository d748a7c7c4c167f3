use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex as PlMutex;

use crate::error::{SignedStateError, SignedStateResult};
use crate::reservation::Reserved;
use crate::state::SignedState;

/// A round-keyed map of signed states. `STRONG` selects the kind of
/// reservation the map itself holds on every entry it contains: a
/// strong map (`STRONG = true`) keeps its entries alive; a weak map
/// (`STRONG = false`) only observes them, and additionally refuses
/// callers' requests for strong reservations (§4.6).
///
/// Entries are stored as the map's own [`Reserved`] guard, so removing
/// or replacing one releases the map's hold as a side effect of the
/// guard's drop. Entries live behind one `parking_lot::Mutex<BTreeMap<_>>`
/// rather than a lock-free structure so `atomic_iterate` is genuinely
/// atomic with respect to concurrent `put`/`remove`/`clear`.
pub struct SignedStateMap<const STRONG: bool> {
    entries: PlMutex<BTreeMap<i64, Reserved>>,
}

impl<const STRONG: bool> Default for SignedStateMap<STRONG> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const STRONG: bool> SignedStateMap<STRONG> {
    pub fn new() -> Self {
        Self {
            entries: PlMutex::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_requested_kind(&self, strong: bool) -> SignedStateResult<()> {
        if strong && !STRONG {
            Err(SignedStateError::StrongReservationOnWeakMap)
        } else {
            Ok(())
        }
    }

    /// Returns a reservation-holding guard for the state at `round`, of
    /// the requested kind. Fails if `strong` is requested on a weak map.
    pub fn get(&self, round: i64, strong: bool) -> SignedStateResult<Option<Reserved>> {
        self.check_requested_kind(strong)?;
        let entries = self.entries.lock();
        Ok(entries
            .get(&round)
            .map(|held| Reserved::acquire(Arc::clone(held.state()), strong)))
    }

    /// Inserts `state`, replacing and releasing any prior entry at the
    /// same round. The map's own reservation on the new entry is of
    /// `STRONG`'s kind. Returns the replaced state, if any.
    pub fn put(&self, state: Arc<SignedState>) -> Option<Arc<SignedState>> {
        let round = state.round();
        let held = Reserved::acquire(state, STRONG);
        let mut entries = self.entries.lock();
        let previous = entries.insert(round, held);
        previous.map(|old| Arc::clone(old.state()))
    }

    /// Removes the entry at `round`, releasing the map's reservation.
    pub fn remove(&self, round: i64) -> Option<Arc<SignedState>> {
        self.entries
            .lock()
            .remove(&round)
            .map(|held| Arc::clone(held.state()))
    }

    /// Releases every entry's reservation and empties the map.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Runs `f` over every `(round, state)` pair while holding the map's
    /// internal lock, so no concurrent `put`/`remove`/`clear` can be
    /// observed mid-iteration.
    pub fn atomic_iterate<F: FnMut(i64, &Arc<SignedState>)>(&self, mut f: F) {
        let entries = self.entries.lock();
        for (round, held) in entries.iter() {
            f(*round, held.state());
        }
    }

    /// Returns the first entry (by round) matching `predicate`, holding
    /// a fresh reservation of the requested kind.
    pub fn find<P: Fn(&SignedState) -> bool>(
        &self,
        predicate: P,
        strong: bool,
    ) -> SignedStateResult<Option<Reserved>> {
        self.check_requested_kind(strong)?;
        let entries = self.entries.lock();
        Ok(entries
            .values()
            .find(|held| predicate(held))
            .map(|held| Reserved::acquire(Arc::clone(held.state()), strong)))
    }

    /// Removes and returns the lowest-round entry, if any, releasing the
    /// map's reservation on it.
    pub fn pop_oldest(&self) -> Option<Arc<SignedState>> {
        let mut entries = self.entries.lock();
        let oldest_round = *entries.keys().next()?;
        entries.remove(&oldest_round).map(|held| Arc::clone(held.state()))
    }

    pub fn rounds(&self) -> Vec<i64> {
        self.entries.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_book::{AddressBook, AddressBookMember, NodeId};
    use byte_stream::Digest384;

    fn book() -> Arc<AddressBook> {
        Arc::new(AddressBook::new(vec![AddressBookMember {
            node_id: NodeId(1),
            stake: 1,
            public_key: vec![1],
        }]))
    }

    fn state(round: i64) -> Arc<SignedState> {
        Arc::new(SignedState::new(
            round,
            Digest384::from_bytes([round as u8; 48]),
            book(),
        ))
    }

    #[test]
    fn put_then_get_round_trips_and_holds_a_reservation() {
        let map: SignedStateMap<true> = SignedStateMap::new();
        map.put(state(1));
        let reserved = map.get(1, true).unwrap().unwrap();
        assert_eq!(reserved.round(), 1);
        assert_eq!(reserved.reservations().strong_count(), 2); // map + caller
    }

    #[test]
    fn weak_map_rejects_strong_reservation_requests() {
        let map: SignedStateMap<false> = SignedStateMap::new();
        map.put(state(1));
        let err = map.get(1, true).unwrap_err();
        assert_eq!(err, SignedStateError::StrongReservationOnWeakMap);
        assert!(map.get(1, false).unwrap().is_some());
    }

    #[test]
    fn put_replacing_an_entry_releases_the_old_ones_reservation() {
        let map: SignedStateMap<true> = SignedStateMap::new();
        let first = state(1);
        map.put(Arc::clone(&first));
        assert_eq!(first.reservations().strong_count(), 1);
        map.put(state(1));
        assert_eq!(first.reservations().strong_count(), 0);
    }

    #[test]
    fn remove_and_clear_release_reservations() {
        let map: SignedStateMap<true> = SignedStateMap::new();
        let s = state(1);
        map.put(Arc::clone(&s));
        assert_eq!(s.reservations().strong_count(), 1);
        map.remove(1);
        assert_eq!(s.reservations().strong_count(), 0);

        let t = state(2);
        map.put(Arc::clone(&t));
        map.clear();
        assert_eq!(t.reservations().strong_count(), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn pop_oldest_removes_the_lowest_round() {
        let map: SignedStateMap<true> = SignedStateMap::new();
        map.put(state(3));
        map.put(state(1));
        map.put(state(2));
        let oldest = map.pop_oldest().unwrap();
        assert_eq!(oldest.round(), 1);
        assert_eq!(map.rounds(), vec![2, 3]);
    }
}
