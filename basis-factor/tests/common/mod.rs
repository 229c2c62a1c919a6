//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use basis_factor::sparse::{
    basic_column_nnz, basis_times, basis_transpose_times, for_each_basic_entry, from_triplets,
};
use basis_factor::{BasisChange, BasisFactor, ScatterVector, SparseCsc, UpdateHint};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Random sparse matrix whose first `min(num_row, num_col)` columns are
/// column diagonally dominant, so any basis that takes column `i` or the
/// logical of row `i` for each row `i` is nonsingular.
pub fn random_lp(rng: &mut ChaCha8Rng, num_row: usize, num_col: usize, density: f64) -> SparseCsc {
    let mut triplets = Vec::new();
    for j in 0..num_col {
        let mut off_diagonal = 0.0;
        for i in 0..num_row {
            if i == j || !rng.gen_bool(density) {
                continue;
            }
            let value: f64 = rng.gen_range(-1.0..1.0);
            off_diagonal += value.abs();
            triplets.push((i, j, value));
        }
        if j < num_row {
            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            triplets.push((j, j, sign * (off_diagonal + 1.0 + rng.gen::<f64>())));
        }
    }
    from_triplets(num_row, num_col, triplets)
}

/// Basis taking column `i` with probability `structural` and the logical
/// of row `i` otherwise.
pub fn random_basis(rng: &mut ChaCha8Rng, a: &SparseCsc, structural: f64) -> Vec<usize> {
    let (num_row, num_col) = (a.rows(), a.cols());
    (0..num_row)
        .map(|i| {
            if i < num_col && rng.gen_bool(structural) {
                i
            } else {
                num_col + i
            }
        })
        .collect()
}

pub fn random_rhs(rng: &mut ChaCha8Rng, n: usize) -> Vec<f64> {
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Max-norm of `B x - b` relative to `1 + |b|`.
pub fn ftran_residual(a: &SparseCsc, basic_index: &[usize], x: &[f64], b: &[f64]) -> f64 {
    relative_error(&basis_times(a, basic_index, x), b)
}

/// Max-norm of `B^T y - b` relative to `1 + |b|`.
pub fn btran_residual(a: &SparseCsc, basic_index: &[usize], y: &[f64], b: &[f64]) -> f64 {
    relative_error(&basis_transpose_times(a, basic_index, y), b)
}

fn relative_error(computed: &[f64], expected: &[f64]) -> f64 {
    let scale = 1.0 + expected.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    computed
        .iter()
        .zip(expected)
        .fold(0.0_f64, |m, (c, e)| m.max((c - e).abs()))
        / scale
}

pub fn ftran_dense(factor: &BasisFactor, b: &[f64]) -> Vec<f64> {
    let mut x = ScatterVector::from_dense(b);
    factor.ftran(&mut x, 1.0, None).unwrap();
    x.to_dense()
}

pub fn btran_dense(factor: &BasisFactor, b: &[f64]) -> Vec<f64> {
    let mut y = ScatterVector::from_dense(b);
    factor.btran(&mut y, 1.0, None).unwrap();
    y.to_dense()
}

/// Solution of `B x = b` keyed by basic variable, independent of the
/// row order a build chose.
pub fn solution_by_variable(basic_index: &[usize], x: &[f64]) -> HashMap<usize, f64> {
    basic_index.iter().copied().zip(x.iter().copied()).collect()
}

/// A nonbasic variable with a nonempty column, picked uniformly. An
/// empty column has `aq = 0` and could never enter.
pub fn random_nonbasic(rng: &mut ChaCha8Rng, a: &SparseCsc, basic_index: &[usize]) -> usize {
    let num_var = a.cols() + a.rows();
    loop {
        let var = rng.gen_range(0..num_var);
        if !basic_index.contains(&var) && basic_column_nnz(a, var) > 0 {
            return var;
        }
    }
}

/// Bring `variable_in` into the basis in the row of largest `|aq|`, the
/// way a simplex iteration would.
pub fn swap_in(
    factor: &mut BasisFactor,
    a: &SparseCsc,
    variable_in: usize,
    basic_index: &mut [usize],
    pack: bool,
) -> UpdateHint {
    let n = factor.num_row();
    let mut aq = ScatterVector::new(n);
    for_each_basic_entry(a, variable_in, |row, value| aq.add(row, value));
    aq.pack_flag = pack;
    factor.ftran(&mut aq, 1.0, None).unwrap();

    let row_out = (0..n)
        .max_by(|&i, &j| aq.value(i).abs().total_cmp(&aq.value(j).abs()))
        .unwrap();
    let mut ep = ScatterVector::unit(n, row_out);
    ep.pack_flag = pack;
    factor.btran(&mut ep, 1.0 / n as f64, None).unwrap();

    factor
        .update(&aq, &ep, BasisChange { row_out, variable_in }, basic_index)
        .unwrap()
}
