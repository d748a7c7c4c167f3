//! Extendable byte-stream framework: counting/hashing decorators over any
//! [`std::io::Read`]/[`std::io::Write`], plus a deterministic, self-describing
//! typed encoding (nullable collections, NFD-normalized strings, instants,
//! class-id+version headers) used by every other crate in this workspace as
//! the on-wire and on-disk byte format.

pub mod codec;
pub mod digest;
pub mod error;
pub mod external;
pub mod extensions;

pub use codec::{ExtendedReader, ExtendedWriter, SelfDescribe};
pub use digest::{Digest384, NULL_HASH};
pub use error::StreamError;
pub use external::{ExternalBlob, ExternalLocator, ExternalSelfSerializable};
pub use extensions::{CountingStream, HashingStream};
