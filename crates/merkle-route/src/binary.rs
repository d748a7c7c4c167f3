use crate::error::RouteError;
use crate::route::MerkleRoute;

/// Maximum number of 0/1 steps a single run word can carry. Chosen so the
/// terminator bit plus `RUN_CAPACITY` data bits always fit comfortably
/// inside an `i64` magnitude, independent of sign.
const RUN_CAPACITY: usize = 61;

/// A route encoded as a sequence of 64-bit words, packing consecutive
/// binary (0/1) steps into a single word and giving every step of value 2
/// or greater a word of its own.
///
/// Per spec §4.2: a word is either a positive integer encoding one step
/// `>= 2`, or a negative integer whose magnitude is a terminator bit above
/// a run of packed step bits. A word is never `0`. This crate does not
/// reproduce the Java two's-complement bit layout literally; it preserves
/// only the documented contract (word sign distinguishes run vs. single,
/// a word is never zero) while choosing a layout that is simple to pack
/// and unpack with plain shifts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCompressedRoute {
    words: Vec<i64>,
    len: usize,
}

impl BinaryCompressedRoute {
    /// Borrows the physical words backing this route, for serialization.
    pub fn words(&self) -> &[i64] {
        &self.words
    }

    /// Rebuilds a route from physical words previously returned by
    /// [`BinaryCompressedRoute::words`].
    ///
    /// # Errors
    /// Returns [`RouteError::IllegalZeroWord`] if any word is `0`.
    pub fn from_words(words: Vec<i64>) -> Result<Self, RouteError> {
        let mut len = 0usize;
        for &word in &words {
            if word == 0 {
                return Err(RouteError::IllegalZeroWord(word));
            }
            len += steps_in_word(word);
        }
        Ok(Self { words, len })
    }

    fn last_run_capacity(&self) -> Option<usize> {
        match self.words.last() {
            Some(&word) if word < 0 => {
                let magnitude = (-word) as u64;
                let n = 63 - magnitude.leading_zeros() as usize;
                if n < RUN_CAPACITY {
                    Some(n)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

fn steps_in_word(word: i64) -> usize {
    if word > 0 {
        1
    } else {
        let magnitude = (-word) as u64;
        63 - magnitude.leading_zeros() as usize
    }
}

fn run_bits(word: i64) -> Vec<u64> {
    debug_assert!(word < 0);
    let magnitude = (-word) as u64;
    let n = 63 - magnitude.leading_zeros() as usize;
    (0..n)
        .map(|i| if magnitude & (1 << i) != 0 { 1 } else { 0 })
        .collect()
}

impl MerkleRoute for BinaryCompressedRoute {
    fn empty() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
        }
    }

    fn extend(&self, step: u64) -> Result<Self, RouteError> {
        let mut words = self.words.clone();
        if step <= 1 {
            if let Some(n) = self.last_run_capacity() {
                let last = words.pop().unwrap();
                let mut magnitude = (-last) as u64;
                magnitude &= !(1 << n);
                if step == 1 {
                    magnitude |= 1 << n;
                }
                magnitude |= 1 << (n + 1);
                words.push(-(magnitude as i64));
            } else {
                let magnitude: u64 = if step == 1 { 0b11 } else { 0b10 };
                words.push(-(magnitude as i64));
            }
        } else {
            words.push(step as i64);
        }
        Ok(Self {
            words,
            len: self.len + 1,
        })
    }

    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        Box::new(self.words.iter().flat_map(|&word| {
            if word > 0 {
                vec![word as u64]
            } else {
                run_bits(word)
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_from(steps: &[u64]) -> BinaryCompressedRoute {
        let mut r = BinaryCompressedRoute::empty();
        for &s in steps {
            r = r.extend(s).unwrap();
        }
        r
    }

    #[test]
    fn extension_preserves_step_sequence() {
        let r = route_from(&[3, 0, 1, 0, 5]);
        assert_eq!(r.to_vec(), vec![3, 0, 1, 0, 5]);
        assert_eq!(r.len(), 5);
    }

    #[test]
    fn extension_is_more_compact_than_one_word_per_step() {
        let r = route_from(&[3, 0, 1, 0, 5]);
        assert!(r.words().len() < 5);
        assert_eq!(r.words().len(), 3);
    }

    #[test]
    fn no_word_is_ever_zero() {
        let r = route_from(&[0, 0, 0, 1, 1, 0]);
        assert!(r.words().iter().all(|&w| w != 0));
    }

    #[test]
    fn run_capacity_boundary_starts_new_word_without_data_loss() {
        let steps: Vec<u64> = std::iter::repeat(1).take(RUN_CAPACITY + 3).collect();
        let r = route_from(&steps);
        assert_eq!(r.to_vec(), steps);
        assert!(r.words().len() >= 2);
    }

    #[test]
    fn empty_route_has_no_words() {
        let r = BinaryCompressedRoute::empty();
        assert!(r.is_empty());
        assert_eq!(r.words().len(), 0);
        assert_eq!(r.to_vec(), Vec::<u64>::new());
    }

    #[test]
    fn from_words_rejects_zero_word() {
        let err = BinaryCompressedRoute::from_words(vec![3, 0]).unwrap_err();
        assert_eq!(err, RouteError::IllegalZeroWord(0));
    }

    #[test]
    fn round_trips_through_physical_words() {
        let r = route_from(&[3, 0, 1, 0, 5, 7, 1, 1, 0]);
        let words = r.words().to_vec();
        let rebuilt = BinaryCompressedRoute::from_words(words).unwrap();
        assert_eq!(rebuilt.to_vec(), r.to_vec());
        assert_eq!(rebuilt.len(), r.len());
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_step_sequences_round_trip(steps in proptest::collection::vec(0u64..20, 0..200)) {
            let r = route_from(&steps);
            proptest::prop_assert_eq!(r.to_vec(), steps.clone());
            let rebuilt = BinaryCompressedRoute::from_words(r.words().to_vec()).unwrap();
            proptest::prop_assert_eq!(rebuilt.to_vec(), steps);
        }
    }
}
