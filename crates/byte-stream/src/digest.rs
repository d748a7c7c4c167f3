use sha2::{Digest, Sha384};
use std::fmt;

/// A SHA-384 digest value, the hash type assumed throughout this workspace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest384(pub [u8; 48]);

/// Canonical sentinel standing in for the hash of a null/absent node.
pub const NULL_HASH: Digest384 = Digest384([0u8; 48]);

impl Digest384 {
    pub fn from_bytes(bytes: [u8; 48]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 48] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        *self == NULL_HASH
    }

    /// Hashes a sequence of byte slices as a single SHA-384 digest, matching
    /// the framework's convention of hashing `(class_id, version, children...)`
    /// tuples as one concatenated buffer.
    pub fn of_parts<'a, I: IntoIterator<Item = &'a [u8]>>(parts: I) -> Self {
        let mut hasher = Sha384::new();
        for part in parts {
            hasher.update(part);
        }
        let out = hasher.finalize();
        let mut bytes = [0u8; 48];
        bytes.copy_from_slice(&out);
        Digest384(bytes)
    }
}

impl fmt::Debug for Digest384 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "Digest384(null)");
        }
        write!(f, "Digest384(")?;
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

impl Default for Digest384 {
    fn default() -> Self {
        NULL_HASH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_parts_is_deterministic() {
        let a = Digest384::of_parts([b"hello".as_slice(), b"world".as_slice()]);
        let b = Digest384::of_parts([b"hello".as_slice(), b"world".as_slice()]);
        assert_eq!(a, b);
    }

    #[test]
    fn null_hash_is_zero() {
        assert!(NULL_HASH.is_null());
    }
}
