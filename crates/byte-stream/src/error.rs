use thiserror::Error;

/// Errors surfaced by the byte-stream framework: I/O failures, invalid
/// positions, and structural violations of the self-describing encoding.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid stream position: expected marker {expected:?}, found {found:?}")]
    InvalidPosition { expected: String, found: String },

    #[error("length sentinel {length} without accompanying data at {context}")]
    DanglingLength { length: i32, context: &'static str },

    #[error("class-id mismatch decoding {context}: expected {expected}, found {found}")]
    ClassIdMismatch {
        context: &'static str,
        expected: i64,
        found: i64,
    },

    #[error("string {context} is not valid UTF-8")]
    InvalidUtf8 { context: &'static str },

    #[error("debug-mode trailing flag mismatch at {context}: expected {expected}, found {found}")]
    DebugFlagMismatch {
        context: &'static str,
        expected: i64,
        found: i64,
    },
}

pub type StreamResult<T> = Result<T, StreamError>;
