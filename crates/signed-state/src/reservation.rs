use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::state::SignedState;

/// Independent strong/weak reference counts on one [`SignedState`]. A
/// strong reservation keeps the state from being considered unreferenced;
/// a weak reservation only observes it. Both map kinds (§4.6) and every
/// caller-held [`Reserved`] guard acquire one of these.
#[derive(Debug, Default)]
pub struct ReservationCounts {
    strong: AtomicI64,
    weak: AtomicI64,
}

impl ReservationCounts {
    pub fn strong_count(&self) -> i64 {
        self.strong.load(Ordering::Acquire)
    }

    pub fn weak_count(&self) -> i64 {
        self.weak.load(Ordering::Acquire)
    }

    pub fn is_unreferenced(&self) -> bool {
        self.strong_count() == 0 && self.weak_count() == 0
    }

    fn acquire(&self, strong: bool) {
        let counter = if strong { &self.strong } else { &self.weak };
        counter.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self, strong: bool) {
        let counter = if strong { &self.strong } else { &self.weak };
        let previous = counter.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "released a reservation that was never held");
    }
}

/// A scoped hold on a [`SignedState`]: dropping it releases the
/// reservation it acquired. Matches §4.6's "closing the wrapper releases
/// it" contract.
pub struct Reserved {
    state: Arc<SignedState>,
    strong: bool,
}

impl Reserved {
    pub(crate) fn acquire(state: Arc<SignedState>, strong: bool) -> Self {
        state.reservations().acquire(strong);
        Self { state, strong }
    }

    pub fn is_strong(&self) -> bool {
        self.strong
    }

    pub fn state(&self) -> &Arc<SignedState> {
        &self.state
    }
}

impl std::ops::Deref for Reserved {
    type Target = SignedState;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl Clone for Reserved {
    fn clone(&self) -> Self {
        Reserved::acquire(Arc::clone(&self.state), self.strong)
    }
}

impl Drop for Reserved {
    fn drop(&mut self) {
        self.state.reservations().release(self.strong);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_book::{AddressBook, AddressBookMember, NodeId};
    use byte_stream::Digest384;

    fn sample_state() -> Arc<SignedState> {
        let book = Arc::new(AddressBook::new(vec![AddressBookMember {
            node_id: NodeId(1),
            stake: 1,
            public_key: vec![1],
        }]));
        Arc::new(SignedState::new(1, Digest384::from_bytes([1u8; 48]), book))
    }

    #[test]
    fn acquiring_and_dropping_balances_the_counter() {
        let state = sample_state();
        {
            let _strong = Reserved::acquire(Arc::clone(&state), true);
            assert_eq!(state.reservations().strong_count(), 1);
            let _weak = Reserved::acquire(Arc::clone(&state), false);
            assert_eq!(state.reservations().weak_count(), 1);
        }
        assert!(state.reservations().is_unreferenced());
    }

    #[test]
    fn cloning_a_reserved_guard_acquires_its_own_hold() {
        let state = sample_state();
        let a = Reserved::acquire(Arc::clone(&state), true);
        let b = a.clone();
        assert_eq!(state.reservations().strong_count(), 2);
        drop(a);
        assert_eq!(state.reservations().strong_count(), 1);
        drop(b);
        assert_eq!(state.reservations().strong_count(), 0);
    }
}
