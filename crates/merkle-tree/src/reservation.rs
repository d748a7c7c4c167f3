use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::TreeError;
use crate::store::NodeId;

/// Sentinel meaning "no explicit holder yet; the one implicit reference
/// from whoever created the node is still outstanding."
pub const IMPLICIT: i64 = 0;

/// Sentinel meaning the node has been released by its last holder and
/// `on_destroy` has fired.
pub const DESTROYED: i64 = -1;

/// The reservation count of a single merkle node: an `AtomicI64` started at
/// [`IMPLICIT`], moved to explicit counting by the first [`Reservation::reserve`],
/// and moved to [`DESTROYED`] by whichever [`Reservation::release`] drops the
/// count to zero. All transitions are compare-and-swap loops; there is no
/// lock.
#[derive(Debug)]
pub struct Reservation(AtomicI64);

impl Reservation {
    pub fn new() -> Self {
        Self(AtomicI64::new(IMPLICIT))
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.load(Ordering::Acquire) == DESTROYED
    }

    pub fn count(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Adds one explicit holder.
    ///
    /// # Errors
    /// [`TreeError::ReserveAfterDestroy`] if the node was already destroyed.
    pub fn reserve(&self, id: NodeId) -> Result<(), TreeError> {
        loop {
            let current = self.0.load(Ordering::Acquire);
            if current == DESTROYED {
                return Err(TreeError::ReserveAfterDestroy(id));
            }
            let next = if current == IMPLICIT { 1 } else { current + 1 };
            if self
                .0
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    /// Removes one explicit holder (or the implicit one, if none has
    /// reserved yet). Returns `true` exactly when this call drove the
    /// count to destruction.
    ///
    /// # Errors
    /// [`TreeError::DoubleRelease`] if the node was already destroyed.
    pub fn release(&self, id: NodeId) -> Result<bool, TreeError> {
        loop {
            let current = self.0.load(Ordering::Acquire);
            if current == DESTROYED {
                return Err(TreeError::DoubleRelease(id));
            }
            let (next, destroyed) = if current <= IMPLICIT + 1 {
                (DESTROYED, true)
            } else {
                (current - 1, false)
            };
            if self
                .0
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(destroyed);
            }
        }
    }
}

impl Default for Reservation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> NodeId {
        NodeId::from_index(0)
    }

    #[test]
    fn implicit_release_destroys_immediately() {
        let r = Reservation::new();
        assert_eq!(r.release(id()).unwrap(), true);
        assert!(r.is_destroyed());
    }

    #[test]
    fn explicit_reserve_then_matching_releases() {
        let r = Reservation::new();
        r.reserve(id()).unwrap();
        r.reserve(id()).unwrap();
        assert_eq!(r.release(id()).unwrap(), false);
        assert_eq!(r.release(id()).unwrap(), true);
        assert!(r.is_destroyed());
    }

    #[test]
    fn reserve_after_destroy_fails() {
        let r = Reservation::new();
        r.release(id()).unwrap();
        assert_eq!(r.reserve(id()).unwrap_err(), TreeError::ReserveAfterDestroy(id()));
    }

    #[test]
    fn double_release_fails() {
        let r = Reservation::new();
        r.release(id()).unwrap();
        assert_eq!(r.release(id()).unwrap_err(), TreeError::DoubleRelease(id()));
    }
}
