use crate::error::RouteError;

/// A compact, immutable path from a merkle root to a descendant node.
///
/// A route is a sequence of zero-based child indices ("steps"). `empty()`
/// is the root's own route. `extend(step)` returns a new route one level
/// deeper; the receiver is left untouched, matching the copy-on-extend
/// semantics every merkle node relies on when it hands a child its route.
pub trait MerkleRoute: Sized + Clone {
    /// The route of the root node: zero steps.
    fn empty() -> Self;

    /// Returns a new route identical to `self` with `step` appended.
    ///
    /// # Errors
    /// Returns [`RouteError::NegativeStep`] if `step` cannot be represented
    /// (the caller passed a negative child index before the cast).
    fn extend(&self, step: u64) -> Result<Self, RouteError>;

    /// The number of steps in this route (its depth below the root).
    fn len(&self) -> usize;

    /// True for the root's own (empty) route.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the steps from root to leaf, in descent order.
    fn iter(&self) -> Box<dyn Iterator<Item = u64> + '_>;

    /// Materializes the steps as a plain vector, root-first.
    fn to_vec(&self) -> Vec<u64> {
        self.iter().collect()
    }
}

/// Compares two routes without materializing either one, collapsing the
/// ancestor/descendant/equal relationship spec §4.2 describes into a single
/// signed value:
///
/// - `0` if the routes are equal, or one is an ancestor of the other
///   (every step of the shorter route matches the corresponding step of
///   the longer one, prefix-wise) — ancestor and descendant routes never
///   need to be told apart by the hasher or the reconnect walker, both of
///   which only ask "could these be the same subtree or nested".
/// - a negative value if `a`'s first diverging step is less than `b`'s
/// - a positive value if `a`'s first diverging step is greater than `b`'s
pub fn compare<A: MerkleRoute, B: MerkleRoute>(a: &A, b: &B) -> i8 {
    let mut ai = a.iter();
    let mut bi = b.iter();
    loop {
        match (ai.next(), bi.next()) {
            (Some(x), Some(y)) => {
                if x < y {
                    return -1;
                }
                if x > y {
                    return 1;
                }
            }
            _ => return 0,
        }
    }
}

/// A node reachable by walking child indices from some root.
///
/// Implemented by `merkle-tree`'s node type; kept here, dependency-free,
/// so route comparison and navigation can be tested and reused without
/// pulling in a tree implementation.
pub trait RouteNavigable: Sized {
    /// The number of children of this node, `0` for a leaf.
    fn num_children(&self) -> usize;

    /// Borrows the child at `index`, or `None` if absent (a null child).
    fn child(&self, index: u64) -> Option<&Self>;
}

/// Walks `route` from `root`, one step per call to [`RouteNavigable::child`].
///
/// # Errors
/// - [`RouteError::LeafEncounteredMidWalk`] if a leaf (zero children) is
///   reached before the route is exhausted.
/// - [`RouteError::NullNodeEncountered`] if a step names an absent child.
/// - [`RouteError::ChildIndexOutOfBounds`] if a step names an index beyond
///   the node's child count.
pub fn get_node_at<'a, N, R>(root: &'a N, route: &R) -> Result<&'a N, RouteError>
where
    N: RouteNavigable,
    R: MerkleRoute,
{
    let mut node = root;
    let steps: Vec<u64> = route.to_vec();
    for (depth, step) in steps.iter().enumerate() {
        let num_children = node.num_children();
        if num_children == 0 {
            return Err(RouteError::LeafEncounteredMidWalk {
                depth,
                remaining: steps.len() - depth,
            });
        }
        if *step as usize >= num_children {
            return Err(RouteError::ChildIndexOutOfBounds {
                step: *step,
                num_children,
            });
        }
        node = node
            .child(*step)
            .ok_or(RouteError::NullNodeEncountered { depth })?;
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::BinaryCompressedRoute;
    use crate::uncompressed::UncompressedRoute;

    struct Leaf;

    impl RouteNavigable for Leaf {
        fn num_children(&self) -> usize {
            0
        }
        fn child(&self, _index: u64) -> Option<&Self> {
            None
        }
    }

    struct Branch {
        children: Vec<Option<Branch>>,
    }

    impl RouteNavigable for Branch {
        fn num_children(&self) -> usize {
            self.children.len()
        }
        fn child(&self, index: u64) -> Option<&Self> {
            self.children.get(index as usize).and_then(|c| c.as_ref())
        }
    }

    fn route_of<R: MerkleRoute>(steps: &[u64]) -> R {
        let mut r = R::empty();
        for &s in steps {
            r = r.extend(s).unwrap();
        }
        r
    }

    #[test]
    fn compare_equal_routes_is_zero() {
        let a: BinaryCompressedRoute = route_of(&[3, 0, 1]);
        let b: BinaryCompressedRoute = route_of(&[3, 0, 1]);
        assert_eq!(compare(&a, &b), 0);
    }

    #[test]
    fn compare_ancestor_descendant_is_zero() {
        let a: BinaryCompressedRoute = route_of(&[3, 0]);
        let b: BinaryCompressedRoute = route_of(&[3, 0, 1, 0, 5]);
        assert_eq!(compare(&a, &b), 0);
        assert_eq!(compare(&b, &a), 0);
    }

    #[test]
    fn compare_diverging_routes_orders_by_first_difference() {
        let a: BinaryCompressedRoute = route_of(&[3, 0, 1]);
        let b: BinaryCompressedRoute = route_of(&[3, 2]);
        assert_eq!(compare(&a, &b), -1);
        assert_eq!(compare(&b, &a), 1);
    }

    #[test]
    fn compare_across_encodings() {
        let a: BinaryCompressedRoute = route_of(&[3, 0, 1, 0, 5]);
        let b: UncompressedRoute = route_of(&[3, 0, 1, 0, 5]);
        assert_eq!(compare(&a, &b), 0);
    }

    #[test]
    fn get_node_at_walks_steps_in_order() {
        let leaf = Branch { children: vec![] };
        let mid = Branch {
            children: vec![None, Some(leaf)],
        };
        let root = Branch {
            children: vec![None, None, None, Some(mid)],
        };
        let route: BinaryCompressedRoute = route_of(&[3, 1]);
        let found = get_node_at(&root, &route).unwrap();
        assert_eq!(found.num_children(), 0);
    }

    #[test]
    fn get_node_at_reports_null_child() {
        let root = Branch {
            children: vec![None],
        };
        let route: BinaryCompressedRoute = route_of(&[0]);
        let err = get_node_at(&root, &route).unwrap_err();
        assert_eq!(err, RouteError::NullNodeEncountered { depth: 0 });
    }

    #[test]
    fn get_node_at_reports_out_of_bounds() {
        let root = Branch {
            children: vec![None],
        };
        let route: BinaryCompressedRoute = route_of(&[5]);
        let err = get_node_at(&root, &route).unwrap_err();
        assert_eq!(
            err,
            RouteError::ChildIndexOutOfBounds {
                step: 5,
                num_children: 1
            }
        );
    }

    #[test]
    fn get_node_at_reports_leaf_mid_walk() {
        let leaf = Leaf;
        let route: BinaryCompressedRoute = route_of(&[0]);
        let err = get_node_at(&leaf, &route).unwrap_err();
        assert_eq!(
            err,
            RouteError::LeafEncounteredMidWalk {
                depth: 0,
                remaining: 1
            }
        );
    }
}
