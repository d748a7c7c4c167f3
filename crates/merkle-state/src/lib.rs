//! Re-exports the whole merkle-state workspace behind one crate, the way
//! a platform's top-level crate normally gathers its building blocks for
//! downstream consumers. This crate carries no logic of its own beyond
//! the re-exports; its `tests/` directory holds the cross-crate
//! integration scenarios spec §8's "Concrete scenarios" describe, which
//! no single one of the underlying crates is positioned to exercise
//! alone.

pub use byte_stream::{
    self, Digest384, ExternalBlob, ExternalLocator, ExternalSelfSerializable, NULL_HASH,
};
pub use fchashmap::{self, Copy, FCHashMap, FcHashMapError, FcResult, ForModify, GcWorker};
pub use merkle_hasher::{self, HashingError, MerkleHasher, OnceLogger};
pub use merkle_route::{
    self, compare, get_node_at, AnyRoute, BinaryCompressedRoute, MerkleRoute, RouteEncoding,
    RouteError, RouteNavigable, UncompressedRoute,
};
pub use merkle_settings::{self, ReconnectSettings, RouteEncodingSetting, RuntimeSettings, SettingsError};
pub use merkle_tree::{
    self, ArenaStore, InternalNode, LeafNode, MerkleInternal, MerkleLeaf, MerkleNode, NodeId,
    NodeSlot, Reservation, SelfHashingLeaf, Tree, TreeError, TreeStore, DESTROYED, IMPLICIT,
    MAX_CHILDREN,
};
pub use reconnect::{
    self, anticipated_channel, forward_acks, forward_teacher_messages, pump_acks,
    pump_teacher_messages, AckMessage, AnticipatedReceiver, AnticipatedWriter, LearnerSync,
    NodeQuery, NodeSend, ReconnectController, ReconnectExecutor, SyncError, TeacherMessage,
    TeacherSync, WireReader, WireWriter,
};
pub use signed_state::{
    self, AddressBook, AddressBookMember, HashSigner, KeyEchoSigner, NodeId as SignedStateNodeId,
    NotificationChannels, ReservationCounts, Reserved, Signature, SignedState, SignedStateError,
    SignedStateManager, SignedStateMap, SignedStateResult, StateReader, StateSource, StateWriter,
};
