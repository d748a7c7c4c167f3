use crate::binary::BinaryCompressedRoute;
use crate::error::RouteError;
use crate::route::MerkleRoute;
use crate::uncompressed::UncompressedRoute;

/// Which physical route encoding a process has selected.
///
/// Spec §6 treats `route_encoding` as a single process-wide runtime
/// setting: a whole tree, not an individual node, picks an encoding once
/// at startup. [`AnyRoute`] lets tree construction stay non-generic over
/// the choice instead of forcing every downstream crate to carry a route
/// type parameter through its APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteEncoding {
    #[default]
    BinaryCompressed,
    Uncompressed,
}

/// A route value holding either physical encoding, dispatched at runtime
/// according to the process's configured [`RouteEncoding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyRoute {
    Binary(BinaryCompressedRoute),
    Uncompressed(UncompressedRoute),
}

impl AnyRoute {
    /// The root route (no steps) in the given encoding.
    pub fn empty_in(encoding: RouteEncoding) -> Self {
        match encoding {
            RouteEncoding::BinaryCompressed => AnyRoute::Binary(BinaryCompressedRoute::empty()),
            RouteEncoding::Uncompressed => AnyRoute::Uncompressed(UncompressedRoute::empty()),
        }
    }

    pub fn encoding(&self) -> RouteEncoding {
        match self {
            AnyRoute::Binary(_) => RouteEncoding::BinaryCompressed,
            AnyRoute::Uncompressed(_) => RouteEncoding::Uncompressed,
        }
    }
}

impl MerkleRoute for AnyRoute {
    fn empty() -> Self {
        AnyRoute::Binary(BinaryCompressedRoute::empty())
    }

    fn extend(&self, step: u64) -> Result<Self, RouteError> {
        Ok(match self {
            AnyRoute::Binary(r) => AnyRoute::Binary(r.extend(step)?),
            AnyRoute::Uncompressed(r) => AnyRoute::Uncompressed(r.extend(step)?),
        })
    }

    fn len(&self) -> usize {
        match self {
            AnyRoute::Binary(r) => r.len(),
            AnyRoute::Uncompressed(r) => r.len(),
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        match self {
            AnyRoute::Binary(r) => r.iter(),
            AnyRoute::Uncompressed(r) => r.iter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::compare;

    #[test]
    fn empty_in_respects_requested_encoding() {
        let a = AnyRoute::empty_in(RouteEncoding::BinaryCompressed);
        let b = AnyRoute::empty_in(RouteEncoding::Uncompressed);
        assert_eq!(a.encoding(), RouteEncoding::BinaryCompressed);
        assert_eq!(b.encoding(), RouteEncoding::Uncompressed);
    }

    #[test]
    fn extension_preserves_encoding() {
        let r = AnyRoute::empty_in(RouteEncoding::Uncompressed)
            .extend(3)
            .unwrap()
            .extend(0)
            .unwrap();
        assert_eq!(r.encoding(), RouteEncoding::Uncompressed);
        assert_eq!(r.to_vec(), vec![3, 0]);
    }

    #[test]
    fn compare_works_across_the_two_encodings() {
        let a = AnyRoute::empty_in(RouteEncoding::BinaryCompressed)
            .extend(3)
            .unwrap();
        let b = AnyRoute::empty_in(RouteEncoding::Uncompressed)
            .extend(3)
            .unwrap();
        assert_eq!(compare(&a, &b), 0);
    }
}
