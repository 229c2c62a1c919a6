//! Sparse matrix types and basis-matrix products.
//!
//! The constraint matrix is held in CSC (Compressed Sparse Column) format.
//! A basis is a list of variable indices: `j < num_col` names column `j`
//! of the matrix, `num_col + i` names the logical (slack) of row `i`,
//! whose column is the unit vector `e_i`.

use sprs::{CsMatI, TriMat};

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMatI<f64, usize>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// # Arguments
///
/// * `nrows` - Number of rows
/// * `ncols` - Number of columns
/// * `triplets` - Iterator of (row, col, value) tuples
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Create an identity matrix in CSC format.
pub fn identity(n: usize) -> SparseCsc {
    from_triplets(n, n, (0..n).map(|i| (i, i, 1.0)))
}

/// Call `f(row, value)` for every nonzero in the column of variable `var`.
///
/// Explicitly stored zeros are skipped.
#[inline]
pub fn for_each_basic_entry<F>(a: &SparseCsc, var: usize, mut f: F)
where
    F: FnMut(usize, f64),
{
    let num_col = a.cols();
    if var < num_col {
        if let Some(col) = a.outer_view(var) {
            for (row, &val) in col.iter() {
                if val != 0.0 {
                    f(row, val);
                }
            }
        }
    } else {
        f(var - num_col, 1.0);
    }
}

/// Number of nonzeros in the column of variable `var`.
pub fn basic_column_nnz(a: &SparseCsc, var: usize) -> usize {
    let mut count = 0;
    for_each_basic_entry(a, var, |_, _| count += 1);
    count
}

/// Basis product: y = B x, where column `j` of B is the column of `basic_index[j]`.
pub fn basis_times(a: &SparseCsc, basic_index: &[usize], x: &[f64]) -> Vec<f64> {
    assert_eq!(basic_index.len(), x.len());

    let mut y = vec![0.0; a.rows()];
    for (&var, &xj) in basic_index.iter().zip(x.iter()) {
        if xj == 0.0 {
            continue;
        }
        for_each_basic_entry(a, var, |row, val| y[row] += val * xj);
    }
    y
}

/// Transposed basis product: x = B^T y.
pub fn basis_transpose_times(a: &SparseCsc, basic_index: &[usize], y: &[f64]) -> Vec<f64> {
    assert_eq!(a.rows(), y.len());

    basic_index
        .iter()
        .map(|&var| {
            let mut dot = 0.0;
            for_each_basic_entry(a, var, |row, val| dot += val * y[row]);
            dot
        })
        .collect()
}

/// Stack two sparse matrices vertically: [A; B]
pub fn vstack(a: &SparseCsc, b: &SparseCsc) -> SparseCsc {
    assert_eq!(a.cols(), b.cols(), "Matrices must have same number of columns");

    let nrows = a.rows() + b.rows();
    let ncols = a.cols();

    let mut tri = TriMat::new((nrows, ncols));

    for (val, (row, col)) in a.iter() {
        tri.add_triplet(row, col, *val);
    }

    // Offset rows of B by a.rows()
    for (val, (row, col)) in b.iter() {
        tri.add_triplet(row + a.rows(), col, *val);
    }

    tri.to_csc()
}

/// Stack two sparse matrices horizontally: [A, B]
pub fn hstack(a: &SparseCsc, b: &SparseCsc) -> SparseCsc {
    assert_eq!(a.rows(), b.rows(), "Matrices must have same number of rows");

    let nrows = a.rows();
    let ncols = a.cols() + b.cols();

    let mut tri = TriMat::new((nrows, ncols));

    for (val, (row, col)) in a.iter() {
        tri.add_triplet(row, col, *val);
    }

    // Offset cols of B by a.cols()
    for (val, (row, col)) in b.iter() {
        tri.add_triplet(row, col + a.cols(), *val);
    }

    tri.to_csc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_triplets() {
        let triplets = vec![
            (0, 0, 1.0),
            (1, 1, 2.0),
            (0, 1, 3.0),
        ];
        let mat = from_triplets(2, 2, triplets);

        assert_eq!(mat.rows(), 2);
        assert_eq!(mat.cols(), 2);
        assert_eq!(mat.nnz(), 3);
        assert!(mat.is_csc());
    }

    #[test]
    fn test_basic_entries_include_logicals() {
        // A = [[1, 2], [0, 3]]
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 1, 3.0)]);

        let mut entries = Vec::new();
        for_each_basic_entry(&a, 1, |row, val| entries.push((row, val)));
        assert_eq!(entries, vec![(0, 2.0), (1, 3.0)]);

        // Variable 3 is the logical of row 1
        entries.clear();
        for_each_basic_entry(&a, 3, |row, val| entries.push((row, val)));
        assert_eq!(entries, vec![(1, 1.0)]);
        assert_eq!(basic_column_nnz(&a, 2), 1);
    }

    #[test]
    fn test_basis_products() {
        // A = [[1, 2], [0, 3]], basis = [col 1, logical of row 0]
        // B = [[2, 1], [3, 0]]
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 1, 3.0)]);
        let basic_index = vec![1, 2];

        let y = basis_times(&a, &basic_index, &[1.0, 2.0]);
        assert!((y[0] - 4.0).abs() < 1e-12);
        assert!((y[1] - 3.0).abs() < 1e-12);

        // B^T [1, 1] = [5, 1]
        let x = basis_transpose_times(&a, &basic_index, &[1.0, 1.0]);
        assert!((x[0] - 5.0).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_vstack() {
        // A = [[1, 2]]  (1x2)
        // B = [[3, 4]]  (1x2)
        // [A; B] = [[1, 2], [3, 4]]  (2x2)
        let a = from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 2.0)]);
        let b = from_triplets(1, 2, vec![(0, 0, 3.0), (0, 1, 4.0)]);

        let stacked = vstack(&a, &b);

        assert_eq!(stacked.rows(), 2);
        assert_eq!(stacked.cols(), 2);
        assert_eq!(stacked.nnz(), 4);
    }

    #[test]
    fn test_hstack() {
        let a = identity(2);
        let b = from_triplets(2, 1, vec![(1, 0, 5.0)]);

        let stacked = hstack(&a, &b);

        assert_eq!(stacked.rows(), 2);
        assert_eq!(stacked.cols(), 3);
        assert_eq!(stacked.nnz(), 3);
    }
}
