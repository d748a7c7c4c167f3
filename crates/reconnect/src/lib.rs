//! Teacher/learner merkle tree reconnect synchronization protocol.
//!
//! A teacher walks its tree breadth-first, probing the learner with a
//! header-only [`message::NodeQuery`] before ever committing to a full
//! [`message::NodeSend`]; the learner acks have/miss per node and the
//! teacher cancels an entire acked subtree rather than walking into it.
//! [`teacher::TeacherSync`] and [`learner::LearnerSync`] drive the two
//! sides; [`controller::ReconnectController`] wraps repeated attempts
//! with the retry policy from the runtime settings.
//!
//! [`anticipated::AnticipatedReceiver`]/[`anticipated::AnticipatedWriter`]
//! give the two sides their ordering and backpressure guarantees
//! in-process; [`wire::WireReader`]/[`wire::WireWriter`] and the
//! `pump_*`/`forward_*` bridges in [`wire`] carry the same traffic
//! across an actual socket when the teacher and learner are not
//! sharing memory.

mod anticipated;
mod controller;
mod error;
mod learner;
mod message;
mod teacher;
mod wire;

pub use anticipated::{anticipated_channel, AnticipatedReceiver, AnticipatedWriter};
pub use controller::{cancellation_token, ReconnectController, ReconnectExecutor};
pub use error::{SyncError, SyncResult};
pub use learner::LearnerSync;
pub use message::{AckMessage, NodeQuery, NodeSend, TeacherMessage};
pub use teacher::{TeacherSync, LEAF_CLASS_ID};
pub use wire::{forward_acks, forward_teacher_messages, pump_acks, pump_teacher_messages, WireReader, WireWriter};
