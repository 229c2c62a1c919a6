//! Sparse work vector for FTRAN/BTRAN.
//!
//! Values live in a dense array of length `size`; `index` lists the
//! positions that may be nonzero. Solves keep `index` exact for their
//! output, eta applications may leave explicit zeros in it until
//! [`ScatterVector::tight`] is called.

use crate::settings::TINY;

/// Placeholder for a value that cancelled to exactly zero but is still
/// listed in `index`, so that later additions do not list it twice.
pub(crate) const ZERO_MARKER: f64 = 1e-50;

/// Sparse value container mutated in place by the triangular solves.
#[derive(Debug, Clone)]
pub struct ScatterVector {
    size: usize,
    index: Vec<usize>,
    array: Vec<f64>,

    /// When set, FTRAN stores the partial result before the U solve and
    /// BTRAN the partial result after the U solve. The Forrest–Tomlin
    /// update reads them back.
    pub pack_flag: bool,
    packed: Vec<(usize, f64)>,

    /// Entries touched by the last solves (accumulates until cleared).
    pub synthetic_tick: f64,

    // Workspace for the hyper-sparse depth-first search
    mark: Vec<bool>,
    stack: Vec<(usize, usize)>,
    list: Vec<usize>,
}

impl ScatterVector {
    /// Zero vector of the given size.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            index: Vec::with_capacity(size),
            array: vec![0.0; size],
            pack_flag: false,
            packed: Vec::new(),
            synthetic_tick: 0.0,
            mark: vec![false; size],
            stack: Vec::new(),
            list: Vec::new(),
        }
    }

    /// Unit vector e_i.
    pub fn unit(size: usize, i: usize) -> Self {
        let mut v = Self::new(size);
        v.set(i, 1.0);
        v
    }

    /// Vector holding the nonzeros of a dense slice.
    pub fn from_dense(values: &[f64]) -> Self {
        let mut v = Self::new(values.len());
        for (i, &x) in values.iter().enumerate() {
            if x != 0.0 {
                v.index.push(i);
                v.array[i] = x;
            }
        }
        v
    }

    /// Vector from (index, value) pairs; repeated indices are summed.
    pub fn from_sparse(size: usize, entries: &[(usize, f64)]) -> Self {
        let mut v = Self::new(size);
        for &(i, x) in entries {
            v.add(i, x);
        }
        v.tight();
        v
    }

    /// Length of the vector.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of listed (possibly nonzero) entries.
    pub fn count(&self) -> usize {
        self.index.len()
    }

    /// Listed positions.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Dense values.
    pub fn array(&self) -> &[f64] {
        &self.array
    }

    /// Value at position `i`.
    #[inline]
    pub fn value(&self, i: usize) -> f64 {
        self.array[i]
    }

    /// Fraction of listed entries.
    pub fn density(&self) -> f64 {
        if self.size == 0 {
            0.0
        } else {
            self.index.len() as f64 / self.size as f64
        }
    }

    /// Reset to the zero vector, keeping the allocation.
    pub fn clear(&mut self) {
        if self.index.len() * 3 < self.size {
            for &i in &self.index {
                self.array[i] = 0.0;
            }
        } else {
            self.array.fill(0.0);
        }
        self.index.clear();
        self.packed.clear();
        self.synthetic_tick = 0.0;
    }

    /// Resize, clearing all contents.
    pub fn resize(&mut self, size: usize) {
        self.size = size;
        self.index.clear();
        self.array.clear();
        self.array.resize(size, 0.0);
        self.mark.clear();
        self.mark.resize(size, false);
        self.packed.clear();
    }

    /// Overwrite position `i`.
    pub fn set(&mut self, i: usize, value: f64) {
        if self.array[i] == 0.0 {
            if value == 0.0 {
                return;
            }
            self.index.push(i);
        }
        self.array[i] = if value == 0.0 { ZERO_MARKER } else { value };
    }

    /// Add `delta` to position `i`.
    #[inline]
    pub fn add(&mut self, i: usize, delta: f64) {
        let old = self.array[i];
        if old == 0.0 {
            if delta == 0.0 {
                return;
            }
            self.index.push(i);
        }
        let new = old + delta;
        self.array[i] = if new == 0.0 { ZERO_MARKER } else { new };
    }

    /// Dot product with sparse (index, value) entries.
    #[inline]
    pub(crate) fn dot(&self, index: &[usize], value: &[f64]) -> f64 {
        index
            .iter()
            .zip(value.iter())
            .map(|(&i, &v)| self.array[i] * v)
            .sum()
    }

    /// Drop entries below [`TINY`] from the index and the array.
    pub fn tight(&mut self) {
        let array = &mut self.array;
        self.index.retain(|&i| {
            if array[i].abs() < TINY {
                array[i] = 0.0;
                false
            } else {
                true
            }
        });
    }

    /// Rebuild the index from a full scan of the array.
    pub fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, x) in self.array.iter_mut().enumerate() {
            if x.abs() < TINY {
                *x = 0.0;
            } else {
                self.index.push(i);
            }
        }
    }

    /// Dense copy of the values.
    pub fn to_dense(&self) -> Vec<f64> {
        self.array.clone()
    }

    /// Listed (index, value) pairs with nonzero values.
    pub fn nonzeros(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.index
            .iter()
            .map(move |&i| (i, self.array[i]))
            .filter(|&(_, x)| x.abs() >= TINY)
    }

    /// Partial result stored by the last solve with `pack_flag` set.
    pub fn packed(&self) -> &[(usize, f64)] {
        &self.packed
    }

    pub(crate) fn pack(&mut self) {
        self.packed.clear();
        for &i in &self.index {
            let x = self.array[i];
            if x.abs() >= TINY {
                self.packed.push((i, x));
            }
        }
    }

    /// Split borrow of the storage and the search workspace.
    pub(crate) fn parts(&mut self) -> VectorParts<'_> {
        VectorParts {
            index: &mut self.index,
            array: &mut self.array,
            mark: &mut self.mark,
            stack: &mut self.stack,
            list: &mut self.list,
        }
    }

    #[cfg(test)]
    pub(crate) fn array_mut(&mut self) -> &mut [f64] {
        &mut self.array
    }
}

pub(crate) struct VectorParts<'a> {
    pub index: &'a mut Vec<usize>,
    pub array: &'a mut [f64],
    pub mark: &'a mut [bool],
    pub stack: &'a mut Vec<(usize, usize)>,
    pub list: &'a mut Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_add_keep_index_unique() {
        let mut v = ScatterVector::new(5);
        v.set(2, 1.0);
        v.add(2, -1.0);
        // Cancelled to zero, but still listed once
        assert_eq!(v.count(), 1);
        v.add(2, 3.0);
        assert_eq!(v.count(), 1);
        assert!((v.value(2) - 3.0).abs() < 1e-12);

        v.add(4, 0.0);
        assert_eq!(v.count(), 1);
    }

    #[test]
    fn test_tight_removes_cancelled() {
        let mut v = ScatterVector::from_sparse(4, &[(0, 1.0), (3, 2.0)]);
        v.add(0, -1.0);
        v.tight();
        assert_eq!(v.index(), &[3]);
        assert_eq!(v.value(0), 0.0);
    }

    #[test]
    fn test_clear_and_dense_round() {
        let mut v = ScatterVector::from_dense(&[0.0, 1.5, 0.0, -2.0]);
        assert_eq!(v.count(), 2);
        assert!((v.density() - 0.5).abs() < 1e-12);

        v.clear();
        assert_eq!(v.count(), 0);
        assert!(v.array().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_rebuild_index() {
        let mut v = ScatterVector::new(3);
        v.array_mut()[1] = 4.0;
        v.array_mut()[2] = 1e-20;
        v.rebuild_index();
        assert_eq!(v.index(), &[1]);
        assert_eq!(v.value(2), 0.0);
    }
}
