//! Reservation-scoped signed-state registry and the manager that tracks
//! in-flight rounds through self-signing, signature collection, and
//! quorum completion.

mod address_book;
mod error;
mod manager;
mod map;
mod notification;
mod persistence;
mod reservation;
mod signature;
mod state;

pub use address_book::{AddressBook, AddressBookMember, NodeId};
pub use error::{SignedStateError, SignedStateResult};
pub use manager::SignedStateManager;
pub use map::SignedStateMap;
pub use notification::{NotificationChannels, StateSource};
pub use persistence::{StateReader, StateWriter};
pub use reservation::{Reserved, ReservationCounts};
pub use signature::{HashSigner, KeyEchoSigner, Signature};
pub use state::SignedState;
