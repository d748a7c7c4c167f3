use thiserror::Error;

/// Errors raised by operations on an [`crate::Copy`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FcHashMapError {
    #[error("mutating operation attempted on an immutable copy at version {version}")]
    Immutable { version: u64 },

    #[error("operation attempted on a copy that has already been released")]
    Released,
}

pub type FcResult<T> = Result<T, FcHashMapError>;
