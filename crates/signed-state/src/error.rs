use thiserror::Error;

/// Errors raised by the signed-state registry and manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignedStateError {
    #[error("strong reservations are not permitted on a weak-mode map")]
    StrongReservationOnWeakMap,
}

pub type SignedStateResult<T> = Result<T, SignedStateError>;
