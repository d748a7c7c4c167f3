use crate::error::RouteError;
use crate::route::MerkleRoute;

/// A route encoded as one 64-bit word per step, with no packing.
///
/// Trades the compactness of [`crate::BinaryCompressedRoute`] for O(1)
/// random access to any step and a trivially inspectable representation;
/// spec §4.2 reserves this encoding for trees deep or wide enough that
/// route *length* dominates route *storage*.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncompressedRoute(Vec<u64>);

impl UncompressedRoute {
    /// Borrows the steps backing this route, root-first.
    pub fn steps(&self) -> &[u64] {
        &self.0
    }

    /// Rebuilds a route from steps previously returned by
    /// [`UncompressedRoute::steps`].
    pub fn from_steps(steps: Vec<u64>) -> Self {
        Self(steps)
    }

    /// Borrows the step at `index`, without walking the whole route.
    pub fn step_at(&self, index: usize) -> Option<u64> {
        self.0.get(index).copied()
    }
}

impl MerkleRoute for UncompressedRoute {
    fn empty() -> Self {
        Self(Vec::new())
    }

    fn extend(&self, step: u64) -> Result<Self, RouteError> {
        let mut steps = self.0.clone();
        steps.push(step);
        Ok(Self(steps))
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        Box::new(self.0.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_preserves_step_sequence() {
        let mut r = UncompressedRoute::empty();
        for step in [3, 0, 1, 0, 5] {
            r = r.extend(step).unwrap();
        }
        assert_eq!(r.to_vec(), vec![3, 0, 1, 0, 5]);
    }

    #[test]
    fn random_access_matches_iteration_order() {
        let mut r = UncompressedRoute::empty();
        for step in [7, 2, 9] {
            r = r.extend(step).unwrap();
        }
        assert_eq!(r.step_at(1), Some(2));
        assert_eq!(r.step_at(3), None);
    }

    #[test]
    fn round_trips_through_steps() {
        let mut r = UncompressedRoute::empty();
        for step in [1, 1, 0, 4] {
            r = r.extend(step).unwrap();
        }
        let rebuilt = UncompressedRoute::from_steps(r.steps().to_vec());
        assert_eq!(rebuilt, r);
    }
}
