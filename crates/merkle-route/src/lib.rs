//! Compact, immutable encodings of a path from a merkle root to any
//! descendant node, plus the comparison and navigation operations that
//! work identically across encodings.
//!
//! Two physical encodings are provided. [`binary::BinaryCompressedRoute`]
//! packs runs of small steps into shared 64-bit words and is the encoding
//! routes are normally extended and serialized with. [`uncompressed::UncompressedRoute`]
//! stores one step per word and exists for the cases spec §4.2 calls out
//! where route length, not route storage, dominates (very deep, very wide
//! trees under active reshaping).

mod any_route;
mod binary;
mod error;
mod route;
mod uncompressed;

pub use any_route::{AnyRoute, RouteEncoding};
pub use binary::BinaryCompressedRoute;
pub use error::RouteError;
pub use route::{compare, get_node_at, MerkleRoute, RouteNavigable};
pub use uncompressed::UncompressedRoute;
