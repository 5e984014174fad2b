//! FILENAME: core/engine/src/key.rs
//! PURPOSE: The cell-store key: an unordered set of column ids.
//! CONTEXT: Ids are kept sorted and deduplicated so that two keys built from
//! the same ids in any order compare equal. The hash does not depend on
//! order either: each id is passed through a 64-bit mixer and the results
//! are summed with wrapping addition. Column ids are small sequential
//! integers, so without the mixer the sums of large cubes would pile into a
//! narrow band of hash values.

use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::column::ColumnId;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct CellKey {
    ids: SmallVec<[ColumnId; 8]>,
}

impl CellKey {
    pub fn new<I: IntoIterator<Item = ColumnId>>(ids: I) -> Self {
        let mut ids: SmallVec<[ColumnId; 8]> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        CellKey { ids }
    }

    pub fn ids(&self) -> &[ColumnId] {
        &self.ids
    }

    pub fn contains(&self, id: ColumnId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// A new key with `id` added.
    pub fn with(&self, id: ColumnId) -> CellKey {
        let mut ids = self.ids.clone();
        if let Err(pos) = ids.binary_search(&id) {
            ids.insert(pos, id);
        }
        CellKey { ids }
    }

    /// Order-independent dispersion hash of the id set.
    pub fn dispersed_hash(&self) -> u64 {
        self.ids
            .iter()
            .fold(0u64, |acc, &id| acc.wrapping_add(mix(id)))
    }
}

/// 64-bit finalizer: xor-shift, multiply, xor-shift.
#[inline]
fn mix(mut x: u64) -> u64 {
    x ^= x >> 23;
    x = x.wrapping_mul(0x2127_599b_f432_5c37);
    x ^= x >> 47;
    x
}

impl Hash for CellKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.dispersed_hash());
    }
}

impl FromIterator<ColumnId> for CellKey {
    fn from_iter<T: IntoIterator<Item = ColumnId>>(iter: T) -> Self {
        CellKey::new(iter)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, id) in self.ids.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", id)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_order_and_duplicates_do_not_matter() {
        let a = CellKey::new([3, 1, 2]);
        let b = CellKey::new([2, 3, 1, 3]);
        assert_eq!(a, b);
        assert_eq!(a.dispersed_hash(), b.dispersed_hash());
        assert_eq!(a.ids(), &[1, 2, 3]);
        assert!(a.contains(2));
        assert_eq!(a.with(0).ids(), &[0, 1, 2, 3]);
        assert_eq!(a.with(2), a);
    }

    /// Three axes of 50 columns each, ids drawn sequentially from one
    /// counter as a cube would assign them.
    #[test]
    fn test_hash_dispersion_for_large_cube() {
        const PER_AXIS: u64 = 50;
        const BUCKETS: usize = 256;

        let mut buckets = vec![0usize; BUCKETS];
        let mut hashes = FxHashSet::default();
        let mut total = 0usize;
        for a in 1..=PER_AXIS {
            for b in PER_AXIS + 1..=2 * PER_AXIS {
                for c in 2 * PER_AXIS + 1..=3 * PER_AXIS {
                    let h = CellKey::new([a, b, c]).dispersed_hash();
                    buckets[(h % BUCKETS as u64) as usize] += 1;
                    hashes.insert(h);
                    total += 1;
                }
            }
        }

        assert_eq!(total, 125_000);
        let mean = total / BUCKETS;
        let max = *buckets.iter().max().unwrap();
        let min = *buckets.iter().min().unwrap();
        assert!(max < mean * 2, "max bucket {} vs mean {}", max, mean);
        assert!(min > mean / 2, "min bucket {} vs mean {}", min, mean);
        assert!(total - hashes.len() < 10, "{} full-hash collisions", total - hashes.len());
    }

    #[test]
    fn test_plain_sum_would_cluster() {
        // The same keys summed without mixing land in a few hundred values.
        let mut sums = FxHashSet::default();
        for a in 1..=50u64 {
            for b in 51..=100u64 {
                for c in 101..=150u64 {
                    sums.insert(a + b + c);
                }
            }
        }
        assert!(sums.len() <= 298);
    }
}
