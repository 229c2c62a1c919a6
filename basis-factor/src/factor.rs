//! Factor store for L and U.
//!
//! Rows and basis positions share one index space after build: the pivot
//! of step `k` sits at row `pivot_index[k]`, which is also the basis
//! position of the variable it eliminated. L is unit lower and U upper
//! triangular in pivot order.
//!
//! L is stored column-wise (FTRAN) and row-wise by pivot (BTRAN). U is
//! stored column-wise with appendable columns and row-wise by row, with
//! relocatable row slots, so that a Forrest–Tomlin update can drop row
//! `p` and append a replacement column at the end of the pivot order.

use crate::link::NONE;
use crate::settings::TINY;
use crate::solve::Triangle;

/// Room left in each row-wise U slot for entries added by updates.
const UR_SLACK: usize = 5;

#[derive(Debug, Clone, Default)]
pub(crate) struct LuFactor {
    pub num_row: usize,

    pub l_pivot_index: Vec<usize>,
    pub l_pivot_lookup: Vec<usize>,
    pub l_start: Vec<usize>,
    pub l_index: Vec<usize>,
    pub l_value: Vec<f64>,

    // Row-wise L, slot k holds row l_pivot_index[k]
    pub lr_start: Vec<usize>,
    pub lr_index: Vec<usize>,
    pub lr_value: Vec<f64>,

    /// Pivot row of each U column, NONE once replaced by an update
    pub u_pivot_index: Vec<usize>,
    pub u_pivot_value: Vec<f64>,
    pub u_pivot_lookup: Vec<usize>,
    pub u_start: Vec<usize>,
    pub u_end: Vec<usize>,
    pub u_index: Vec<usize>,
    pub u_value: Vec<f64>,

    // Row-wise U, indexed by row; entries hold the pivot row of their column
    pub ur_start: Vec<usize>,
    pub ur_end: Vec<usize>,
    pub ur_space: Vec<usize>,
    pub ur_index: Vec<usize>,
    pub ur_value: Vec<f64>,
}

impl LuFactor {
    pub fn clear(&mut self, num_row: usize) {
        self.num_row = num_row;
        self.l_pivot_index.clear();
        self.l_start.clear();
        self.l_start.push(0);
        self.l_index.clear();
        self.l_value.clear();
        self.lr_start.clear();
        self.lr_index.clear();
        self.lr_value.clear();

        self.u_pivot_index.clear();
        self.u_pivot_value.clear();
        self.u_start.clear();
        self.u_end.clear();
        self.u_index.clear();
        self.u_value.clear();
        self.ur_start.clear();
        self.ur_end.clear();
        self.ur_space.clear();
        self.ur_index.clear();
        self.ur_value.clear();

        self.l_pivot_lookup.clear();
        self.l_pivot_lookup.resize(num_row, NONE);
        self.u_pivot_lookup.clear();
        self.u_pivot_lookup.resize(num_row, NONE);
    }

    /// Append the L column of a pivot on `row`.
    pub fn push_lower(&mut self, row: usize, entries: &[(usize, f64)]) {
        self.l_pivot_lookup[row] = self.l_pivot_index.len();
        self.l_pivot_index.push(row);
        for &(i, v) in entries {
            if v.abs() >= TINY {
                self.l_index.push(i);
                self.l_value.push(v);
            }
        }
        self.l_start.push(self.l_index.len());
    }

    /// Append the U column of a pivot on `row`.
    pub fn push_upper(&mut self, row: usize, diagonal: f64, entries: &[(usize, f64)]) {
        self.u_pivot_lookup[row] = self.u_pivot_index.len();
        self.u_pivot_index.push(row);
        self.u_pivot_value.push(diagonal);
        self.u_start.push(self.u_index.len());
        for &(i, v) in entries {
            if v.abs() >= TINY {
                self.u_index.push(i);
                self.u_value.push(v);
            }
        }
        self.u_end.push(self.u_index.len());
    }

    /// Build the row-wise copies once all pivots are pushed.
    pub fn finish(&mut self) {
        self.build_lower_rows();
        self.build_upper_rows();
    }

    fn build_lower_rows(&mut self) {
        let num_pivot = self.l_pivot_index.len();
        let mut count = vec![0usize; num_pivot];
        for &i in &self.l_index {
            count[self.l_pivot_lookup[i]] += 1;
        }
        self.lr_start.clear();
        self.lr_start.reserve(num_pivot + 1);
        self.lr_start.push(0);
        for k in 0..num_pivot {
            let next = self.lr_start[k] + count[k];
            self.lr_start.push(next);
        }
        self.lr_index.clear();
        self.lr_index.resize(self.l_index.len(), 0);
        self.lr_value.clear();
        self.lr_value.resize(self.l_index.len(), 0.0);

        let mut fill: Vec<usize> = self.lr_start[..num_pivot].to_vec();
        for k in 0..num_pivot {
            let row = self.l_pivot_index[k];
            for e in self.l_start[k]..self.l_start[k + 1] {
                let slot = self.l_pivot_lookup[self.l_index[e]];
                self.lr_index[fill[slot]] = row;
                self.lr_value[fill[slot]] = self.l_value[e];
                fill[slot] += 1;
            }
        }
    }

    fn build_upper_rows(&mut self) {
        let num_row = self.num_row;
        let mut count = vec![0usize; num_row];
        for k in 0..self.u_pivot_index.len() {
            if self.u_pivot_index[k] == NONE {
                continue;
            }
            for e in self.u_start[k]..self.u_end[k] {
                count[self.u_index[e]] += 1;
            }
        }
        self.ur_start.clear();
        self.ur_end.clear();
        self.ur_space.clear();
        let mut total = 0;
        for &c in &count {
            self.ur_start.push(total);
            self.ur_end.push(total);
            self.ur_space.push(c + UR_SLACK);
            total += c + UR_SLACK;
        }
        self.ur_index.clear();
        self.ur_index.resize(total, NONE);
        self.ur_value.clear();
        self.ur_value.resize(total, 0.0);

        for k in 0..self.u_pivot_index.len() {
            let row = self.u_pivot_index[k];
            if row == NONE {
                continue;
            }
            for e in self.u_start[k]..self.u_end[k] {
                let i = self.u_index[e];
                let slot = self.ur_end[i];
                self.ur_index[slot] = row;
                self.ur_value[slot] = self.u_value[e];
                self.ur_end[i] += 1;
            }
        }
    }

    pub fn num_pivot(&self) -> usize {
        self.l_pivot_index.len()
    }

    pub fn l_nnz(&self) -> usize {
        self.l_index.len()
    }

    /// Off-diagonal U entries of live columns plus their diagonals.
    pub fn u_nnz(&self) -> usize {
        (0..self.u_pivot_index.len())
            .filter(|&k| self.u_pivot_index[k] != NONE)
            .map(|k| self.u_end[k] - self.u_start[k] + 1)
            .sum()
    }

    pub fn lower_columns(&self) -> LowerColumns<'_> {
        LowerColumns(self)
    }

    pub fn lower_rows(&self) -> LowerRows<'_> {
        LowerRows(self)
    }

    pub fn upper_columns(&self) -> UpperColumns<'_> {
        UpperColumns(self)
    }

    pub fn upper_rows(&self) -> UpperRows<'_> {
        UpperRows(self)
    }

    /// Product U x, with `x` indexed by pivot row.
    pub fn upper_times(&self, x: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; self.num_row];
        for k in 0..self.u_pivot_index.len() {
            let row = self.u_pivot_index[k];
            if row == NONE {
                continue;
            }
            let xk = x[row];
            if xk == 0.0 {
                continue;
            }
            y[row] += self.u_pivot_value[k] * xk;
            for e in self.u_start[k]..self.u_end[k] {
                y[self.u_index[e]] += self.u_value[e] * xk;
            }
        }
        y
    }

    /// Diagonal of the U column pivoted on `row`.
    #[cfg(test)]
    pub fn upper_diagonal(&self, row: usize) -> Option<f64> {
        let k = *self.u_pivot_lookup.get(row)?;
        (k != NONE).then(|| self.u_pivot_value[k])
    }

    fn ur_remove(&mut self, row: usize, column_row: usize) {
        let (start, end) = (self.ur_start[row], self.ur_end[row]);
        if let Some(e) = (start..end).find(|&e| self.ur_index[e] == column_row) {
            self.ur_index[e] = self.ur_index[end - 1];
            self.ur_value[e] = self.ur_value[end - 1];
            self.ur_end[row] -= 1;
        }
    }

    fn ur_insert(&mut self, row: usize, column_row: usize, value: f64) {
        let count = self.ur_end[row] - self.ur_start[row];
        if count >= self.ur_space[row] {
            let old_start = self.ur_start[row];
            let space = 2 * self.ur_space[row] + UR_SLACK;
            let start = self.ur_index.len();
            self.ur_index.resize(start + space, NONE);
            self.ur_value.resize(start + space, 0.0);
            self.ur_index.copy_within(old_start..old_start + count, start);
            self.ur_value.copy_within(old_start..old_start + count, start);
            self.ur_start[row] = start;
            self.ur_end[row] = start + count;
            self.ur_space[row] = space;
        }
        let slot = self.ur_end[row];
        self.ur_index[slot] = column_row;
        self.ur_value[slot] = value;
        self.ur_end[row] += 1;
    }

    /// Forrest–Tomlin rewrite of U for a basis change in position `p`.
    ///
    /// `spike` is the entering column after L and the existing row etas,
    /// `w` is `U^{-T} e_p`, `alpha` the pivotal entry of the fully
    /// transformed entering column. Row `p` is eliminated from the other
    /// columns, the old column of `p` is retired and the spike is
    /// appended as the last pivot. Returns the row eta entries.
    pub fn replace_column(
        &mut self,
        p: usize,
        alpha: f64,
        spike: &[(usize, f64)],
        w: &[(usize, f64)],
    ) -> Vec<(usize, f64)> {
        let kp = self.u_pivot_lookup[p];
        let upp = self.u_pivot_value[kp];

        let eta: Vec<(usize, f64)> = w
            .iter()
            .filter(|&&(j, wj)| j != p && wj.abs() >= TINY)
            .map(|&(j, wj)| (j, -upp * wj))
            .collect();

        // Drop row p from the columns after it
        for e in self.ur_start[p]..self.ur_end[p] {
            let kj = self.u_pivot_lookup[self.ur_index[e]];
            let (start, end) = (self.u_start[kj], self.u_end[kj]);
            if let Some(f) = (start..end).find(|&f| self.u_index[f] == p) {
                self.u_index[f] = self.u_index[end - 1];
                self.u_value[f] = self.u_value[end - 1];
                self.u_end[kj] -= 1;
            }
        }
        self.ur_end[p] = self.ur_start[p];

        // Retire the old column
        for e in self.u_start[kp]..self.u_end[kp] {
            let i = self.u_index[e];
            self.ur_remove(i, p);
        }
        self.u_pivot_index[kp] = NONE;
        self.u_end[kp] = self.u_start[kp];

        let new_column: Vec<(usize, f64)> = spike
            .iter()
            .copied()
            .filter(|&(i, s)| i != p && s.abs() >= TINY)
            .collect();
        self.push_upper(p, upp * alpha, &new_column);
        for &(i, s) in &new_column {
            self.ur_insert(i, p, s);
        }

        eta
    }

    /// Extend L and U for `extra.len()` rows appended below the factor.
    ///
    /// `extra[i]` holds the entries (pivot row, value) of the new L row
    /// `num_row + i`. Each new row gets a unit pivot in both factors.
    pub fn append_rows(&mut self, extra: &[Vec<(usize, f64)>]) {
        let old = self.num_row;
        let num_new = extra.len();
        let num_pivot = self.l_pivot_index.len();

        let mut added: Vec<Vec<(usize, f64)>> = vec![Vec::new(); num_pivot];
        for (i, row) in extra.iter().enumerate() {
            for &(r, v) in row {
                if v.abs() >= TINY {
                    added[self.l_pivot_lookup[r]].push((old + i, v));
                }
            }
        }

        let mut l_start = Vec::with_capacity(num_pivot + num_new + 1);
        let mut l_index = Vec::with_capacity(self.l_index.len());
        let mut l_value = Vec::with_capacity(self.l_value.len());
        l_start.push(0);
        for k in 0..num_pivot {
            for e in self.l_start[k]..self.l_start[k + 1] {
                l_index.push(self.l_index[e]);
                l_value.push(self.l_value[e]);
            }
            for &(i, v) in &added[k] {
                l_index.push(i);
                l_value.push(v);
            }
            l_start.push(l_index.len());
        }
        self.l_start = l_start;
        self.l_index = l_index;
        self.l_value = l_value;

        self.num_row = old + num_new;
        self.l_pivot_lookup.resize(self.num_row, NONE);
        self.u_pivot_lookup.resize(self.num_row, NONE);
        for i in 0..num_new {
            self.push_lower(old + i, &[]);
            self.push_upper(old + i, 1.0, &[]);
        }
        self.finish();
    }
}

pub(crate) struct LowerColumns<'a>(&'a LuFactor);
pub(crate) struct LowerRows<'a>(&'a LuFactor);
pub(crate) struct UpperColumns<'a>(&'a LuFactor);
pub(crate) struct UpperRows<'a>(&'a LuFactor);

impl Triangle for LowerColumns<'_> {
    fn num_pivot(&self) -> usize {
        self.0.l_pivot_index.len()
    }
    fn forward(&self) -> bool {
        true
    }
    fn pivot_row(&self, k: usize) -> usize {
        self.0.l_pivot_index[k]
    }
    fn diagonal(&self, _k: usize) -> Option<f64> {
        None
    }
    fn entries(&self, k: usize) -> (&[usize], &[f64]) {
        let range = self.0.l_start[k]..self.0.l_start[k + 1];
        (&self.0.l_index[range.clone()], &self.0.l_value[range])
    }
    fn lookup(&self, row: usize) -> usize {
        self.0.l_pivot_lookup[row]
    }
}

impl Triangle for LowerRows<'_> {
    fn num_pivot(&self) -> usize {
        self.0.l_pivot_index.len()
    }
    fn forward(&self) -> bool {
        false
    }
    fn pivot_row(&self, k: usize) -> usize {
        self.0.l_pivot_index[k]
    }
    fn diagonal(&self, _k: usize) -> Option<f64> {
        None
    }
    fn entries(&self, k: usize) -> (&[usize], &[f64]) {
        let range = self.0.lr_start[k]..self.0.lr_start[k + 1];
        (&self.0.lr_index[range.clone()], &self.0.lr_value[range])
    }
    fn lookup(&self, row: usize) -> usize {
        self.0.l_pivot_lookup[row]
    }
}

impl Triangle for UpperColumns<'_> {
    fn num_pivot(&self) -> usize {
        self.0.u_pivot_index.len()
    }
    fn forward(&self) -> bool {
        false
    }
    fn pivot_row(&self, k: usize) -> usize {
        self.0.u_pivot_index[k]
    }
    fn diagonal(&self, k: usize) -> Option<f64> {
        Some(self.0.u_pivot_value[k])
    }
    fn entries(&self, k: usize) -> (&[usize], &[f64]) {
        let range = self.0.u_start[k]..self.0.u_end[k];
        (&self.0.u_index[range.clone()], &self.0.u_value[range])
    }
    fn lookup(&self, row: usize) -> usize {
        self.0.u_pivot_lookup[row]
    }
}

impl Triangle for UpperRows<'_> {
    fn num_pivot(&self) -> usize {
        self.0.u_pivot_index.len()
    }
    fn forward(&self) -> bool {
        true
    }
    fn pivot_row(&self, k: usize) -> usize {
        self.0.u_pivot_index[k]
    }
    fn diagonal(&self, k: usize) -> Option<f64> {
        Some(self.0.u_pivot_value[k])
    }
    fn entries(&self, k: usize) -> (&[usize], &[f64]) {
        let row = self.0.u_pivot_index[k];
        if row == NONE {
            return (&[], &[]);
        }
        let range = self.0.ur_start[row]..self.0.ur_end[row];
        (&self.0.ur_index[range.clone()], &self.0.ur_value[range])
    }
    fn lookup(&self, row: usize) -> usize {
        self.0.u_pivot_lookup[row]
    }
}
