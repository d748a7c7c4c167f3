use crate::signature::Signature;
use byte_stream::Digest384;

/// Identifies a member node. A thin `u64` newtype; the membership it
/// resolves against is always an explicit [`AddressBook`], never global
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// One member of the network: its weight and the public key its
/// signatures are checked against.
#[derive(Debug, Clone)]
pub struct AddressBookMember {
    pub node_id: NodeId,
    pub stake: u64,
    pub public_key: Vec<u8>,
}

/// The roster of known nodes and their relative stake. `quorum_threshold`
/// is strictly greater than two-thirds of total stake, matching the
/// worked quorum scenario.
#[derive(Debug, Clone)]
pub struct AddressBook {
    members: Vec<AddressBookMember>,
}

impl AddressBook {
    pub fn new(members: Vec<AddressBookMember>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[AddressBookMember] {
        &self.members
    }

    pub fn member(&self, node_id: NodeId) -> Option<&AddressBookMember> {
        self.members.iter().find(|m| m.node_id == node_id)
    }

    pub fn stake_of(&self, node_id: NodeId) -> Option<u64> {
        self.member(node_id).map(|m| m.stake)
    }

    pub fn total_stake(&self) -> u64 {
        self.members.iter().map(|m| m.stake).sum()
    }

    /// Strictly greater than 2/3 of total stake.
    pub fn quorum_threshold(&self) -> u64 {
        (2 * self.total_stake()) / 3 + 1
    }

    /// A signature verifies iff its bytes equal the state's hash bytes
    /// and its embedded key matches the node's known public key.
    pub fn verify_signature(&self, node_id: NodeId, hash: &Digest384, signature: &Signature) -> bool {
        match self.member(node_id) {
            Some(member) => {
                signature.bytes == hash.as_bytes()[..] && signature.signer_key == member.public_key
            }
            None => false,
        }
    }
}
