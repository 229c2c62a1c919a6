//! Triangular solves.
//!
//! All four solves (L and U, forward and transposed) run through one
//! kernel over a [`Triangle`]: pivots are visited in order, the value at
//! the pivot row is finalised (divided by the diagonal for U) and pushed
//! into the rows listed for that pivot. When the right-hand side is
//! sparse the pivots reached are found first by a depth-first search
//! and only those are visited, in topological order.

use crate::link::NONE;
use crate::settings::TINY;
use crate::vector::ScatterVector;

/// Above this density the hyper-sparse search is never attempted.
pub const HYPER_CANCEL: f64 = 0.05;
pub const HYPER_FTRAN_L: f64 = 0.15;
pub const HYPER_FTRAN_U: f64 = 0.10;
pub const HYPER_BTRAN_L: f64 = 0.10;
pub const HYPER_BTRAN_U: f64 = 0.15;

/// A triangular factor in push form.
pub(crate) trait Triangle {
    fn num_pivot(&self) -> usize;
    /// Pivots are visited in increasing order when true.
    fn forward(&self) -> bool;
    /// Row of pivot `k`, NONE for a retired pivot.
    fn pivot_row(&self, k: usize) -> usize;
    /// None for a unit diagonal.
    fn diagonal(&self, k: usize) -> Option<f64>;
    /// Rows updated by pivot `k` and the multipliers.
    fn entries(&self, k: usize) -> (&[usize], &[f64]);
    /// Pivot owning `row`, NONE if none.
    fn lookup(&self, row: usize) -> usize;
}

/// Decide between the full and the hyper-sparse traversal.
#[inline]
pub(crate) fn use_hyper(rhs: &ScatterVector, expected_density: f64, threshold: f64) -> bool {
    rhs.density() <= HYPER_CANCEL && expected_density <= threshold
}

/// Solve in place with the given triangle.
pub(crate) fn solve<T: Triangle>(tri: &T, rhs: &mut ScatterVector, hyper: bool) {
    let tick = if hyper {
        solve_hyper(tri, rhs)
    } else {
        solve_full(tri, rhs)
    };
    rhs.synthetic_tick += tick as f64;
}

fn solve_full<T: Triangle>(tri: &T, rhs: &mut ScatterVector) -> usize {
    let parts = rhs.parts();
    let array = parts.array;
    let index = parts.index;
    index.clear();

    let n = tri.num_pivot();
    let mut tick = n;
    for step in 0..n {
        let k = if tri.forward() { step } else { n - 1 - step };
        let row = tri.pivot_row(k);
        if row == NONE {
            continue;
        }
        tick += pivot_step(tri, k, row, array, index);
    }
    tick
}

fn solve_hyper<T: Triangle>(tri: &T, rhs: &mut ScatterVector) -> usize {
    let parts = rhs.parts();
    let (array, index, mark, stack, list) =
        (parts.array, parts.index, parts.mark, parts.stack, parts.list);

    // Depth-first search from every listed row; `list` receives pivots in
    // post-order.
    list.clear();
    let mut tick = 0;
    for &start in index.iter() {
        if mark[start] {
            continue;
        }
        let k0 = tri.lookup(start);
        if k0 == NONE {
            continue;
        }
        mark[start] = true;
        stack.push((k0, 0));
        while let Some(top) = stack.last_mut() {
            let (k, pos) = *top;
            let (rows, _) = tri.entries(k);
            if pos < rows.len() {
                top.1 += 1;
                let i = rows[pos];
                tick += 1;
                if !mark[i] {
                    let ki = tri.lookup(i);
                    if ki != NONE {
                        mark[i] = true;
                        stack.push((ki, 0));
                    }
                }
            } else {
                stack.pop();
                list.push(k);
            }
        }
    }

    index.clear();
    for &k in list.iter().rev() {
        let row = tri.pivot_row(k);
        mark[row] = false;
        tick += pivot_step(tri, k, row, array, index);
    }
    tick
}

#[inline]
fn pivot_step<T: Triangle>(
    tri: &T,
    k: usize,
    row: usize,
    array: &mut [f64],
    index: &mut Vec<usize>,
) -> usize {
    let mut x = array[row];
    if x.abs() < TINY {
        array[row] = 0.0;
        return 0;
    }
    if let Some(d) = tri.diagonal(k) {
        x /= d;
        array[row] = x;
    }
    index.push(row);
    let (rows, values) = tri.entries(k);
    for (&i, &v) in rows.iter().zip(values.iter()) {
        array[i] -= v * x;
    }
    rows.len()
}
