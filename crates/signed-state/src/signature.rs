use byte_stream::Digest384;

use crate::address_book::NodeId;

/// A signature over a state's hash: the signer's public key plus the
/// signed bytes. Real signature schemes are outside this workspace's
/// scope; verification here is the contract spec names ("bytes equal
/// the hash, key matches"), not a cryptographic primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub signer_key: Vec<u8>,
    pub bytes: Vec<u8>,
}

/// Produces this node's own signature over a state hash, used for the
/// self-signing step of [`crate::manager::SignedStateManager::add_unsigned_state`].
pub trait HashSigner: Send + Sync {
    fn node_id(&self) -> NodeId;
    fn sign(&self, hash: &Digest384) -> Signature;
}

/// A trivial signer whose "signature" is just the node's public key
/// paired with the hash bytes, matching [`crate::address_book::AddressBook::verify_signature`]'s
/// contract exactly. Useful for tests and as the manager's default when
/// no external signer is wired in.
pub struct KeyEchoSigner {
    node_id: NodeId,
    public_key: Vec<u8>,
}

impl KeyEchoSigner {
    pub fn new(node_id: NodeId, public_key: Vec<u8>) -> Self {
        Self {
            node_id,
            public_key,
        }
    }
}

impl HashSigner for KeyEchoSigner {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn sign(&self, hash: &Digest384) -> Signature {
        Signature {
            signer_key: self.public_key.clone(),
            bytes: hash.as_bytes().to_vec(),
        }
    }
}
