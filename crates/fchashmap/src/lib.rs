//! A fast-copyable, version-scoped, copy-on-write hash map.
//!
//! Each [`Copy`] is a cheap, point-in-time view produced by [`Copy::copy`].
//! Mutating a copy appends a new entry to the affected key's mutation
//! chain rather than overwriting anything another copy might still be
//! reading; once no live copy can observe a superseded mutation, the
//! background [`GcWorker`] (or any foreground `put`/`remove`/`release`
//! call) prunes it from the chain.

mod copy;
mod error;
mod family;
mod gc;
mod mutation;

pub use copy::{Copy, FCHashMap, ForModify};
pub use error::{FcHashMapError, FcResult};
pub use gc::GcWorker;
