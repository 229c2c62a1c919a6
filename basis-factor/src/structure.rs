//! Structural maintenance: adding and deleting columns, appending rows.

use std::sync::Arc;

use log::debug;

use crate::engine::BasisFactor;
use crate::error::{FactorError, FactorResult};
use crate::pivot::PivotKind;
use crate::solve::{self, use_hyper, HYPER_BTRAN_U};
use crate::sparse::{vstack, SparseCsc};
use crate::vector::ScatterVector;

impl BasisFactor {
    /// Account for `num_new` nonbasic columns appended to the matrix.
    ///
    /// Logical variables in `basic_index` are shifted by `num_new`. The
    /// factorization is untouched; the matrix binding stays invalid until
    /// the widened matrix is bound with [`BasisFactor::setup_matrix`].
    pub fn add_cols(&mut self, num_new: usize, basic_index: &mut [usize]) {
        if num_new == 0 {
            return;
        }
        let num_col = self.num_col;
        let shift = |var: usize| (var >= num_col).then_some(var + num_new);
        for var in basic_index.iter_mut() {
            if let Some(new) = shift(*var) {
                *var = new;
            }
        }
        self.refactor_info.renumber(shift);
        for var in self.deficiency.var_with_no_pivot.iter_mut() {
            if let Some(new) = shift(*var) {
                *var = new;
            }
        }
        self.num_col += num_new;
        self.matrix_valid = false;
        self.matrix_resizable = false;
        debug!("added {} columns, num_col = {}", num_new, self.num_col);
    }

    /// Account for the removal of nonbasic columns.
    ///
    /// `cols` must be strictly increasing structural indices. Remaining
    /// variables in `basic_index` are renumbered; the matrix binding stays
    /// invalid until the narrowed matrix is bound.
    pub fn delete_nonbasic_cols(
        &mut self,
        cols: &[usize],
        basic_index: &mut [usize],
    ) -> FactorResult<()> {
        if cols.is_empty() {
            return Ok(());
        }
        if let Some(&col) = cols.iter().find(|&&c| c >= self.num_col) {
            return Err(FactorError::InvalidColumnSet(format!(
                "column {} out of range (num_col = {})",
                col, self.num_col
            )));
        }
        if cols.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FactorError::InvalidColumnSet(
                "columns must be strictly increasing".to_string(),
            ));
        }
        if let Some(&col) = basic_index.iter().find(|&&var| cols.binary_search(&var).is_ok()) {
            return Err(FactorError::BasicColumnDeleted { col });
        }

        let num_col = self.num_col;
        let num_deleted = cols.len();
        let renumber = |var: usize| {
            if var >= num_col {
                Some(var - num_deleted)
            } else {
                // Number of deleted columns before var
                let before = cols.partition_point(|&c| c < var);
                Some(var - before)
            }
        };
        for var in basic_index.iter_mut() {
            if let Some(new) = renumber(*var) {
                *var = new;
            }
        }
        self.refactor_info.renumber(renumber);
        self.num_col -= num_deleted;
        self.matrix_valid = false;
        self.matrix_resizable = false;
        debug!("deleted {} nonbasic columns, num_col = {}", num_deleted, self.num_col);
        Ok(())
    }

    /// Append rows to the matrix, with their logicals made basic.
    ///
    /// `new_rows` holds the new rows restricted to the structural columns
    /// (`k x num_col`). The extended basis `[B 0; R I]` is factored
    /// without a rebuild: L gains the rows `R U^{-1}` and U gains unit
    /// pivots. The bound matrix is replaced by the stacked matrix.
    pub fn add_rows(
        &mut self,
        new_rows: &SparseCsc,
        basic_index: &mut Vec<usize>,
    ) -> FactorResult<()> {
        if !self.built {
            return Err(FactorError::NotBuilt);
        }
        if !self.updates.is_empty() {
            return Err(FactorError::UpdatesPending {
                count: self.updates.len(),
            });
        }
        if !self.matrix_valid {
            return Err(FactorError::InvalidMatrix);
        }
        if !new_rows.is_csc() {
            return Err(FactorError::NotColumnMajor);
        }
        if new_rows.cols() != self.num_col {
            return Err(FactorError::DimensionMismatch {
                what: "new rows",
                expected: self.num_col,
                actual: new_rows.cols(),
            });
        }
        if basic_index.len() != self.num_row {
            return Err(FactorError::DimensionMismatch {
                what: "basic index",
                expected: self.num_row,
                actual: basic_index.len(),
            });
        }
        let num_new = new_rows.rows();
        if num_new == 0 {
            return Ok(());
        }
        let old = self.num_row;

        // New rows restricted to the basic columns, by basis position
        let mut restricted: Vec<Vec<(usize, f64)>> = vec![Vec::new(); num_new];
        for (position, &var) in basic_index.iter().enumerate() {
            if var >= self.num_col {
                continue;
            }
            if let Some(col) = new_rows.outer_view(var) {
                for (i, &value) in col.iter() {
                    if value != 0.0 {
                        restricted[i].push((position, value));
                    }
                }
            }
        }

        let mut extra = Vec::with_capacity(num_new);
        for row in &restricted {
            let mut x = ScatterVector::from_sparse(old, row);
            let hyper = use_hyper(&x, x.density(), HYPER_BTRAN_U);
            solve::solve(&self.factor.upper_rows(), &mut x, hyper);
            extra.push(x.nonzeros().collect::<Vec<_>>());
        }
        self.factor.append_rows(&extra);

        for i in 0..num_new {
            let logical = self.num_col + old + i;
            basic_index.push(logical);
            if self.refactor_info.use_info {
                self.refactor_info.push(logical, old + i, PivotKind::Logical);
            }
        }

        self.matrix = Arc::new(vstack(&self.matrix, new_rows));
        self.num_row = old + num_new;
        self.build_nnz = self.factor.l_nnz() + self.factor.u_nnz();
        debug!("added {} rows, num_row = {}", num_new, self.num_row);
        Ok(())
    }
}
