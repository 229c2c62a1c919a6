//! Working kernel store: the active submatrix during elimination.
//!
//! Columns are indexed by basis position, rows by matrix row. Each column
//! owns a contiguous slot `[start, start + space)` in the column arrays:
//! active entries sit at the front, entries already moved to U (the
//! "N region") at the back. Rows keep the column indices only. A column
//! or row that runs out of space is relocated to the end of the arrays.

use crate::link::{CountLinkList, NONE};
use crate::settings::TINY;

/// Extra room given to a column or row when it is (re)allocated.
const SLACK: usize = 4;

#[derive(Debug, Clone, Default)]
pub(crate) struct KernelStore {
    num: usize,
    pivot_threshold: f64,

    // Column-wise copy
    col_start: Vec<usize>,
    col_count_a: Vec<usize>,
    col_count_n: Vec<usize>,
    col_space: Vec<usize>,
    col_min_pivot: Vec<f64>,
    col_index: Vec<usize>,
    col_value: Vec<f64>,
    col_active: Vec<bool>,

    // Row-wise copy (indices only)
    row_start: Vec<usize>,
    row_count: Vec<usize>,
    row_space: Vec<usize>,
    row_index: Vec<usize>,
    row_active: Vec<bool>,

    pub col_link: CountLinkList,
    pub row_link: CountLinkList,

    /// Row -> position + 1 in the column being updated (0 = absent)
    row_mark: Vec<usize>,
}

impl KernelStore {
    pub fn new(num: usize) -> Self {
        let mut kernel = Self::default();
        kernel.reset(num, 0.1);
        kernel
    }

    /// Clear and resize for a square kernel of order `num`.
    pub fn reset(&mut self, num: usize, pivot_threshold: f64) {
        self.num = num;
        self.pivot_threshold = pivot_threshold;

        for v in [
            &mut self.col_start,
            &mut self.col_count_a,
            &mut self.col_count_n,
            &mut self.col_space,
            &mut self.row_start,
            &mut self.row_count,
            &mut self.row_space,
            &mut self.row_mark,
        ] {
            v.clear();
            v.resize(num, 0);
        }
        self.col_min_pivot.clear();
        self.col_min_pivot.resize(num, 0.0);
        self.col_active.clear();
        self.col_active.resize(num, false);
        self.row_active.clear();
        self.row_active.resize(num, false);
        self.col_index.clear();
        self.col_value.clear();
        self.row_index.clear();

        self.col_link.reset(num, num);
        self.row_link.reset(num, num);
    }

    /// Load the columns of the basis. `columns[c]` lists the entries of
    /// basis position `c`; values below [`TINY`] are dropped.
    pub fn load<F>(&mut self, mut column: F)
    where
        F: FnMut(usize, &mut dyn FnMut(usize, f64)),
    {
        let mut row_nnz = vec![0usize; self.num];
        for c in 0..self.num {
            let start = self.col_index.len();
            self.col_start[c] = start;
            let (index, value) = (&mut self.col_index, &mut self.col_value);
            column(c, &mut |row, val| {
                if val.abs() >= TINY {
                    index.push(row);
                    value.push(val);
                    row_nnz[row] += 1;
                }
            });
            let count = self.col_index.len() - start;
            self.col_count_a[c] = count;
            self.col_count_n[c] = 0;
            // Room for the U entries the column will collect
            let space = count + SLACK;
            self.col_space[c] = space;
            self.col_index.resize(start + space, NONE);
            self.col_value.resize(start + space, 0.0);
            self.col_active[c] = true;
        }

        for r in 0..self.num {
            self.row_start[r] = self.row_index.len();
            self.row_count[r] = 0;
            self.row_space[r] = row_nnz[r] + SLACK;
            self.row_index.resize(self.row_index.len() + self.row_space[r], NONE);
            self.row_active[r] = true;
        }
        for c in 0..self.num {
            let start = self.col_start[c];
            for k in start..start + self.col_count_a[c] {
                let r = self.col_index[k];
                let slot = self.row_start[r] + self.row_count[r];
                self.row_index[slot] = c;
                self.row_count[r] += 1;
            }
        }

        for c in 0..self.num {
            self.col_fix_max(c);
            self.col_link.add(c, self.col_count_a[c]);
        }
        for r in 0..self.num {
            self.row_link.add(r, self.row_count[r]);
        }
    }

    pub fn num(&self) -> usize {
        self.num
    }

    pub fn active_nnz(&self) -> usize {
        (0..self.num)
            .filter(|&c| self.col_active[c])
            .map(|c| self.col_count_a[c])
            .sum()
    }

    #[inline]
    pub fn col_count(&self, c: usize) -> usize {
        self.col_count_a[c]
    }

    #[inline]
    pub fn row_count(&self, r: usize) -> usize {
        self.row_count[r]
    }

    #[inline]
    pub fn col_is_active(&self, c: usize) -> bool {
        self.col_active[c]
    }

    #[inline]
    pub fn row_is_active(&self, r: usize) -> bool {
        self.row_active[r]
    }

    #[inline]
    pub fn min_pivot(&self, c: usize) -> f64 {
        self.col_min_pivot[c]
    }

    /// Active (row, value) entries of column `c`.
    pub fn col_entries(&self, c: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = self.col_start[c];
        let end = start + self.col_count_a[c];
        self.col_index[start..end]
            .iter()
            .copied()
            .zip(self.col_value[start..end].iter().copied())
    }

    /// Entries already moved to U, as (pivot row, value).
    pub fn col_u_entries(&self, c: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let end = self.col_start[c] + self.col_space[c];
        let start = end - self.col_count_n[c];
        self.col_index[start..end]
            .iter()
            .copied()
            .zip(self.col_value[start..end].iter().copied())
    }

    /// Active column indices of row `r`.
    pub fn row_cols(&self, r: usize) -> &[usize] {
        let start = self.row_start[r];
        &self.row_index[start..start + self.row_count[r]]
    }

    /// Value of active entry (r, c), if present.
    pub fn value(&self, r: usize, c: usize) -> Option<f64> {
        self.col_entries(c).find(|&(i, _)| i == r).map(|(_, v)| v)
    }

    /// Active rows and columns, ascending.
    pub fn remaining(&self) -> (Vec<usize>, Vec<usize>) {
        let rows = (0..self.num).filter(|&r| self.row_active[r]).collect();
        let cols = (0..self.num).filter(|&c| self.col_active[c]).collect();
        (rows, cols)
    }

    fn col_relocate(&mut self, c: usize, space: usize) {
        let old_start = self.col_start[c];
        let old_space = self.col_space[c];
        let count_a = self.col_count_a[c];
        let count_n = self.col_count_n[c];

        let start = self.col_index.len();
        self.col_index.resize(start + space, NONE);
        self.col_value.resize(start + space, 0.0);
        self.col_index.copy_within(old_start..old_start + count_a, start);
        self.col_value.copy_within(old_start..old_start + count_a, start);
        let old_n = old_start + old_space - count_n;
        let new_n = start + space - count_n;
        self.col_index.copy_within(old_n..old_n + count_n, new_n);
        self.col_value.copy_within(old_n..old_n + count_n, new_n);

        self.col_start[c] = start;
        self.col_space[c] = space;
    }

    fn col_reserve(&mut self, c: usize) {
        if self.col_count_a[c] + self.col_count_n[c] >= self.col_space[c] {
            let space = 2 * self.col_space[c] + SLACK;
            self.col_relocate(c, space);
        }
    }

    /// Append an active entry to column `c`.
    pub fn col_insert(&mut self, c: usize, row: usize, value: f64) {
        debug_assert!(value.abs() >= TINY, "inserting near-zero {} at ({}, {})", value, row, c);
        self.col_reserve(c);
        let k = self.col_start[c] + self.col_count_a[c];
        self.col_index[k] = row;
        self.col_value[k] = value;
        self.col_count_a[c] += 1;
    }

    /// Store a U entry (pivot row, value) at the back of column `c`.
    pub fn col_store_n(&mut self, c: usize, row: usize, value: f64) {
        self.col_reserve(c);
        self.col_count_n[c] += 1;
        let k = self.col_start[c] + self.col_space[c] - self.col_count_n[c];
        self.col_index[k] = row;
        self.col_value[k] = value;
    }

    /// Remove the active entry in `row` from column `c`, returning its value.
    pub fn col_delete(&mut self, c: usize, row: usize) -> Option<f64> {
        let start = self.col_start[c];
        let end = start + self.col_count_a[c];
        let k = (start..end).find(|&k| self.col_index[k] == row)?;
        let value = self.col_value[k];
        self.col_index[k] = self.col_index[end - 1];
        self.col_value[k] = self.col_value[end - 1];
        self.col_count_a[c] -= 1;
        Some(value)
    }

    /// Recompute the minimum acceptable pivot of column `c`.
    pub fn col_fix_max(&mut self, c: usize) {
        let max = self.col_entries(c).fold(0.0_f64, |m, (_, v)| m.max(v.abs()));
        self.col_min_pivot[c] = self.pivot_threshold * max;
    }

    pub fn row_insert(&mut self, r: usize, c: usize) {
        if self.row_count[r] >= self.row_space[r] {
            let old_start = self.row_start[r];
            let count = self.row_count[r];
            let space = 2 * self.row_space[r] + SLACK;
            let start = self.row_index.len();
            self.row_index.resize(start + space, NONE);
            self.row_index.copy_within(old_start..old_start + count, start);
            self.row_start[r] = start;
            self.row_space[r] = space;
        }
        let k = self.row_start[r] + self.row_count[r];
        self.row_index[k] = c;
        self.row_count[r] += 1;
    }

    pub fn row_delete(&mut self, r: usize, c: usize) {
        let start = self.row_start[r];
        let end = start + self.row_count[r];
        if let Some(k) = (start..end).find(|&k| self.row_index[k] == c) {
            self.row_index[k] = self.row_index[end - 1];
            self.row_count[r] -= 1;
        }
    }

    /// Eliminate on the pivot (r, c).
    ///
    /// Returns the L multipliers (row, a_rc'/pivot) for the other rows of
    /// column `c` and the U column of `c` as (pivot row, value) pairs.
    /// Active entries of row `r` in other columns move to those columns'
    /// N region; the remaining kernel receives the rank-one update.
    pub fn eliminate(&mut self, r: usize, c: usize, pivot: f64) -> Elimination {
        self.col_link.remove(c);
        self.row_link.remove(r);

        let mut l_entries = Vec::with_capacity(self.col_count_a[c].saturating_sub(1));
        for (i, v) in self.col_entries(c) {
            if i != r {
                l_entries.push((i, v / pivot));
            }
        }
        let u_entries: Vec<(usize, f64)> = self.col_u_entries(c).collect();
        for &(i, _) in &l_entries {
            self.row_delete(i, c);
        }
        self.col_count_a[c] = 0;
        self.col_active[c] = false;

        let mut touched = l_entries.len();
        let row_cols: Vec<usize> = self.row_cols(r).iter().copied().filter(|&j| j != c).collect();
        let mut fill = Vec::new();
        for &j in &row_cols {
            let u = match self.col_delete(j, r) {
                Some(u) => u,
                None => continue,
            };
            self.col_store_n(j, r, u);

            if !l_entries.is_empty() {
                let start = self.col_start[j];
                for k in start..start + self.col_count_a[j] {
                    self.row_mark[self.col_index[k]] = k - start + 1;
                }
                fill.clear();
                for &(i, l) in &l_entries {
                    let mark = self.row_mark[i];
                    if mark > 0 {
                        self.col_value[start + mark - 1] -= l * u;
                    } else {
                        fill.push((i, -l * u));
                    }
                }
                for k in start..start + self.col_count_a[j] {
                    self.row_mark[self.col_index[k]] = 0;
                }

                for &(i, v) in &fill {
                    if v.abs() >= TINY {
                        self.col_insert(j, i, v);
                        self.row_insert(i, j);
                    }
                }

                let cancelled: Vec<usize> = self
                    .col_entries(j)
                    .filter(|&(_, v)| v.abs() < TINY)
                    .map(|(i, _)| i)
                    .collect();
                for i in cancelled {
                    self.col_delete(j, i);
                    self.row_delete(i, j);
                }
                touched += l_entries.len();
            }

            self.col_fix_max(j);
            self.col_link.relink(j, self.col_count_a[j]);
        }

        self.row_count[r] = 0;
        self.row_active[r] = false;
        for &(i, _) in &l_entries {
            self.row_link.relink(i, self.row_count[i]);
        }

        Elimination { l_entries, u_entries, touched }
    }

    /// Retire a row/column pair without elimination (unit pivot).
    pub fn retire(&mut self, r: usize, c: usize) {
        self.col_link.remove(c);
        self.row_link.remove(r);
        let rows: Vec<usize> = self.col_entries(c).map(|(i, _)| i).collect();
        for i in rows {
            self.row_delete(i, c);
            if self.row_active[i] && i != r {
                self.row_link.relink(i, self.row_count[i]);
            }
        }
        self.col_count_a[c] = 0;
        self.col_active[c] = false;

        let cols: Vec<usize> = self.row_cols(r).to_vec();
        for j in cols {
            self.col_delete(j, r);
            if self.col_active[j] && j != c {
                self.col_fix_max(j);
                self.col_link.relink(j, self.col_count_a[j]);
            }
        }
        self.row_count[r] = 0;
        self.row_active[r] = false;
    }
}

/// Result of one elimination step.
#[derive(Debug, Clone)]
pub(crate) struct Elimination {
    pub l_entries: Vec<(usize, f64)>,
    pub u_entries: Vec<(usize, f64)>,
    /// Kernel entries read or written
    pub touched: usize,
}
