//! Parallel, post-order merkle hashing over a [`merkle_tree::Tree`].
//!
//! A hasher owns a fixed-size worker pool of `P` threads (spec §4.4).
//! [`MerkleHasher::digest_sync`] computes a hash on the caller's thread;
//! [`MerkleHasher::digest_async`] spreads the same computation across the
//! pool, with a per-node cache check standing in for the "per-node mutex"
//! the spec describes (a node already hashed by one worker is simply
//! skipped by every other worker that later reaches it).

mod error;
mod hasher;
mod once_logger;

pub use error::HashingError;
pub use hasher::MerkleHasher;
pub use once_logger::OnceLogger;
