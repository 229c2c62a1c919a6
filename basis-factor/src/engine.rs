//! The basis factorization engine.

use std::sync::Arc;

use log::{debug, warn};

use crate::analysis::AnalyseBuild;
use crate::error::{FactorError, FactorResult};
use crate::factor::LuFactor;
use crate::kernel::KernelStore;
use crate::perf::{FactorGuard, FactorSection, FactorTimers};
use crate::refactor::RefactorInfo;
use crate::settings::{
    FactorSettings, UpdateMethod, MAX_PIVOT_THRESHOLD, MAX_PIVOT_TOLERANCE, MIN_PIVOT_THRESHOLD,
    MIN_PIVOT_TOLERANCE,
};
use crate::solve::{self, use_hyper, HYPER_BTRAN_L, HYPER_BTRAN_U, HYPER_FTRAN_L, HYPER_FTRAN_U};
use crate::sparse::{for_each_basic_entry, SparseCsc};
use crate::update::{ColumnEta, Packed, ProductPair, RowEta, UpdateBuffer};
use crate::vector::ScatterVector;

/// Outcome of [`BasisFactor::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateHint {
    /// Update applied.
    Ok,
    /// Update applied, but the representation has grown enough that a
    /// fresh build is advisable.
    RefactorSuggested,
    /// The pivotal entry is too small. Nothing was modified.
    RejectPivot,
}

/// A single basis change: the variable in position `row_out` leaves and
/// `variable_in` takes its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasisChange {
    pub row_out: usize,
    pub variable_in: usize,
}

/// Rows, columns and variables left without a pivot by the last build.
///
/// Columns are basis positions before the build permuted the basic
/// index. Each deficient row `r` received the logical `num_col + r`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankDeficiency {
    pub row_with_no_pivot: Vec<usize>,
    pub col_with_no_pivot: Vec<usize>,
    pub var_with_no_pivot: Vec<usize>,
}

impl RankDeficiency {
    /// Degree of deficiency.
    pub fn degree(&self) -> usize {
        self.row_with_no_pivot.len()
    }

    pub(crate) fn clear(&mut self) {
        self.row_with_no_pivot.clear();
        self.col_with_no_pivot.clear();
        self.var_with_no_pivot.clear();
    }
}

/// Sparse LU factorization of a simplex basis matrix.
///
/// The engine binds a shared constraint matrix and factors the basis
/// named by a caller-owned basic index. After [`BasisFactor::build`] the
/// basic index is permuted so that position `r` holds the variable
/// pivoted on row `r`; solution vectors of [`BasisFactor::ftran`] are
/// indexed by those positions.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use basis_factor::{sparse, BasisFactor, FactorSettings, ScatterVector};
///
/// let a = Arc::new(sparse::from_triplets(2, 2, vec![(0, 0, 2.0), (1, 0, 1.0), (1, 1, 4.0)]));
/// let mut basic_index = vec![0, 1];
/// let mut factor = BasisFactor::setup(a, &basic_index, FactorSettings::default()).unwrap();
/// assert_eq!(factor.build(&mut basic_index).unwrap(), 0);
///
/// let mut rhs = ScatterVector::from_dense(&[2.0, 5.0]);
/// factor.ftran(&mut rhs, 1.0, None).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct BasisFactor {
    pub(crate) settings: FactorSettings,
    pub(crate) matrix: Arc<SparseCsc>,
    pub(crate) matrix_valid: bool,
    /// The bound matrix came from `setup_matrix` with other dimensions;
    /// the next build may resize to it
    pub(crate) matrix_resizable: bool,
    pub(crate) num_row: usize,
    pub(crate) num_col: usize,

    pub(crate) kernel: KernelStore,
    pub(crate) factor: LuFactor,
    pub(crate) updates: UpdateBuffer,
    pub(crate) built: bool,
    /// L and U nonzeros after the last build
    pub(crate) build_nnz: usize,

    pub(crate) deficiency: RankDeficiency,
    pub(crate) refactor_info: RefactorInfo,
    pub(crate) analysis: Option<AnalyseBuild>,

    pub(crate) build_real_tick: f64,
    pub(crate) build_synthetic_tick: f64,
    pub(crate) timers: FactorTimers,
}

impl BasisFactor {
    /// Bind the engine to a matrix and allocate for its dimensions.
    ///
    /// `basic_index` must hold one variable per row. No factorization is
    /// computed until [`BasisFactor::build`].
    pub fn setup(
        matrix: Arc<SparseCsc>,
        basic_index: &[usize],
        settings: FactorSettings,
    ) -> FactorResult<Self> {
        settings.validate().map_err(FactorError::InvalidSettings)?;
        if !matrix.is_csc() {
            return Err(FactorError::NotColumnMajor);
        }
        let num_row = matrix.rows();
        let num_col = matrix.cols();
        if basic_index.len() != num_row {
            return Err(FactorError::DimensionMismatch {
                what: "basic index",
                expected: num_row,
                actual: basic_index.len(),
            });
        }
        check_variables(basic_index, num_col + num_row)?;

        debug!(
            "basis factor setup: {} rows, {} cols, {} nonzeros, {} updates",
            num_row,
            num_col,
            matrix.nnz(),
            settings.update_method
        );

        let mut factor = LuFactor::default();
        factor.clear(num_row);
        Ok(Self {
            updates: UpdateBuffer::new(settings.update_method),
            settings,
            matrix,
            matrix_valid: true,
            matrix_resizable: false,
            num_row,
            num_col,
            kernel: KernelStore::new(num_row),
            factor,
            built: false,
            build_nnz: 0,
            deficiency: RankDeficiency::default(),
            refactor_info: RefactorInfo::default(),
            analysis: None,
            build_real_tick: 0.0,
            build_synthetic_tick: 0.0,
            timers: FactorTimers::default(),
        })
    }

    /// Rebind to a new matrix of the same dimensions.
    ///
    /// A matrix with other dimensions, or not in CSC storage, leaves the
    /// binding invalid; the next build re-derives the dimensions from it
    /// if it can.
    pub fn setup_matrix(&mut self, matrix: Arc<SparseCsc>) {
        let consistent =
            matrix.is_csc() && matrix.rows() == self.num_row && matrix.cols() == self.num_col;
        if !consistent {
            warn!(
                "setup_matrix: {}x{} matrix does not match factor dimensions {}x{}",
                matrix.rows(),
                matrix.cols(),
                self.num_row,
                self.num_col
            );
        }
        self.matrix = matrix;
        self.matrix_valid = consistent;
        self.matrix_resizable = !consistent;
    }

    /// Restore a valid binding before a build.
    ///
    /// Only a matrix bound by [`BasisFactor::setup_matrix`] may change the
    /// dimensions. After `add_cols` or `delete_nonbasic_cols` the bound
    /// matrix must already have the new width.
    pub(crate) fn ensure_matrix(&mut self, num_basic: usize) -> FactorResult<()> {
        if self.matrix_valid {
            return Ok(());
        }
        if !self.matrix.is_csc() || self.matrix.rows() != num_basic {
            return Err(FactorError::InvalidMatrix);
        }
        let stale = self.matrix.rows() != self.num_row || self.matrix.cols() != self.num_col;
        if !self.matrix_resizable && stale {
            warn!(
                "bound {}x{} matrix is stale for {} columns; rebind before building",
                self.matrix.rows(),
                self.matrix.cols(),
                self.num_col
            );
            return Err(FactorError::InvalidMatrix);
        }
        let num_row = self.matrix.rows();
        let num_col = self.matrix.cols();
        debug!(
            "resizing factor from {}x{} to {}x{}",
            self.num_row, self.num_col, num_row, num_col
        );
        if num_row != self.num_row {
            self.kernel = KernelStore::new(num_row);
            self.factor.clear(num_row);
            self.built = false;
        }
        self.num_row = num_row;
        self.num_col = num_col;
        self.matrix_valid = true;
        self.matrix_resizable = false;
        Ok(())
    }

    pub fn num_row(&self) -> usize {
        self.num_row
    }

    pub fn num_col(&self) -> usize {
        self.num_col
    }

    pub fn settings(&self) -> &FactorSettings {
        &self.settings
    }

    pub fn update_method(&self) -> UpdateMethod {
        self.updates.method()
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn matrix_is_valid(&self) -> bool {
        self.matrix_valid
    }

    /// Number of updates applied since the last build.
    pub fn update_count(&self) -> usize {
        self.updates.len()
    }

    /// Rank deficiency record of the last build.
    pub fn rank_deficiency(&self) -> &RankDeficiency {
        &self.deficiency
    }

    /// Wall-clock seconds spent in the last build.
    pub fn build_real_tick(&self) -> f64 {
        self.build_real_tick
    }

    /// Kernel entries touched by the last build.
    pub fn build_synthetic_tick(&self) -> f64 {
        self.build_synthetic_tick
    }

    /// Accumulated build and update timings.
    pub fn timers(&self) -> &FactorTimers {
        &self.timers
    }

    /// Nonzeros in L, U and the update buffer.
    pub fn invert_num_nz(&self) -> usize {
        self.factor.l_nnz() + self.factor.u_nnz() + self.updates.nnz()
    }

    /// Set the relative pivot threshold; out-of-range values are refused.
    pub fn set_pivot_threshold(&mut self, value: f64) -> bool {
        if !(MIN_PIVOT_THRESHOLD..=MAX_PIVOT_THRESHOLD).contains(&value) {
            return false;
        }
        self.settings.pivot_threshold = value;
        true
    }

    /// Set the absolute pivot tolerance; out-of-range values are refused.
    pub fn set_pivot_tolerance(&mut self, value: f64) -> bool {
        if !(MIN_PIVOT_TOLERANCE..=MAX_PIVOT_TOLERANCE).contains(&value) {
            return false;
        }
        self.settings.pivot_tolerance = value;
        true
    }

    fn check_solve(&self, rhs: &ScatterVector) -> FactorResult<()> {
        if !self.built {
            return Err(FactorError::NotBuilt);
        }
        if rhs.size() != self.num_row {
            return Err(FactorError::DimensionMismatch {
                what: "solve vector",
                expected: self.num_row,
                actual: rhs.size(),
            });
        }
        Ok(())
    }

    /// Solve `B x = b` in place.
    ///
    /// `expected_density` is the caller's estimate of the result density
    /// and selects the hyper-sparse traversal when small. With
    /// `rhs.pack_flag` set, the partial result before the U solve is kept
    /// in `rhs.packed()` for a Forrest–Tomlin update.
    pub fn ftran(
        &self,
        rhs: &mut ScatterVector,
        expected_density: f64,
        mut timers: Option<&mut FactorTimers>,
    ) -> FactorResult<()> {
        self.check_solve(rhs)?;
        let has_updates = !self.updates.is_empty();

        let coefficients = {
            let _guard = section(&mut timers, FactorSection::FtranUpdate);
            let coefficients = self.updates.ftran_prepare(rhs);
            self.updates.ftran_before_lower(rhs);
            coefficients
        };
        {
            let _guard = section(&mut timers, FactorSection::FtranLower);
            let hyper = use_hyper(rhs, expected_density, HYPER_FTRAN_L);
            solve::solve(&self.factor.lower_columns(), rhs, hyper);
        }
        {
            let _guard = section(&mut timers, FactorSection::FtranUpdate);
            self.updates.ftran_after_lower(rhs);
            if rhs.pack_flag {
                rhs.pack();
            }
        }
        {
            let _guard = section(&mut timers, FactorSection::FtranUpper);
            let hyper = use_hyper(rhs, expected_density, HYPER_FTRAN_U);
            solve::solve(&self.factor.upper_columns(), rhs, hyper);
        }
        if has_updates {
            let _guard = section(&mut timers, FactorSection::FtranUpdate);
            self.updates.ftran_after_upper(rhs, &coefficients);
            rhs.tight();
        }
        Ok(())
    }

    /// Solve `B^T y = b` in place.
    ///
    /// With `rhs.pack_flag` set, the partial result after the U solve is
    /// kept in `rhs.packed()` for a Forrest–Tomlin update.
    pub fn btran(
        &self,
        rhs: &mut ScatterVector,
        expected_density: f64,
        mut timers: Option<&mut FactorTimers>,
    ) -> FactorResult<()> {
        self.check_solve(rhs)?;
        let has_updates = !self.updates.is_empty();

        let coefficients = {
            let _guard = section(&mut timers, FactorSection::BtranUpdate);
            let coefficients = self.updates.btran_prepare(rhs);
            self.updates.btran_before_upper(rhs);
            coefficients
        };
        {
            let _guard = section(&mut timers, FactorSection::BtranUpper);
            let hyper = use_hyper(rhs, expected_density, HYPER_BTRAN_U);
            solve::solve(&self.factor.upper_rows(), rhs, hyper);
        }
        {
            let _guard = section(&mut timers, FactorSection::BtranUpdate);
            if rhs.pack_flag {
                rhs.pack();
            }
            self.updates.btran_after_upper(rhs);
        }
        {
            let _guard = section(&mut timers, FactorSection::BtranLower);
            let hyper = use_hyper(rhs, expected_density, HYPER_BTRAN_L);
            solve::solve(&self.factor.lower_rows(), rhs, hyper);
        }
        if has_updates {
            let _guard = section(&mut timers, FactorSection::BtranUpdate);
            self.updates.btran_after_lower(rhs, &coefficients);
            rhs.tight();
        }
        Ok(())
    }

    /// Update the factorization for one basis change.
    ///
    /// `aq` is `B^{-1} a_q` for the entering column and `ep` is
    /// `B^{-T} e_p` for `p = change.row_out`, both computed with the
    /// current representation. On success `basic_index[p]` is set to
    /// the entering variable. On [`UpdateHint::RejectPivot`] nothing is
    /// modified and the caller should rebuild.
    pub fn update(
        &mut self,
        aq: &ScatterVector,
        ep: &ScatterVector,
        change: BasisChange,
        basic_index: &mut [usize],
    ) -> FactorResult<UpdateHint> {
        if !self.built {
            return Err(FactorError::NotBuilt);
        }
        let p = change.row_out;
        if p >= self.num_row {
            return Err(FactorError::RowOutOfRange { row: p, num_row: self.num_row });
        }
        let sizes = [("aq", aq.size()), ("ep", ep.size()), ("basic index", basic_index.len())];
        for (what, size) in sizes {
            if size != self.num_row {
                return Err(FactorError::DimensionMismatch {
                    what,
                    expected: self.num_row,
                    actual: size,
                });
            }
        }
        let limit = self.num_col + self.num_row;
        if change.variable_in >= limit {
            return Err(FactorError::InvalidBasicVariable { var: change.variable_in, limit });
        }

        let alpha = aq.value(p);
        if alpha == 0.0 || alpha.abs() < self.settings.pivot_tolerance {
            debug!("update rejected: |alpha| = {:.3e} in row {}", alpha.abs(), p);
            return Ok(UpdateHint::RejectPivot);
        }

        let start = std::time::Instant::now();
        match self.updates.method() {
            UpdateMethod::ForrestTomlin => {
                let spike: Vec<(usize, f64)> = if aq.pack_flag && !aq.packed().is_empty() {
                    aq.packed().to_vec()
                } else {
                    let s = self.factor.upper_times(aq.array());
                    s.into_iter().enumerate().filter(|&(_, v)| v != 0.0).collect()
                };
                let w: Vec<(usize, f64)> = if ep.pack_flag && !ep.packed().is_empty() {
                    ep.packed().to_vec()
                } else {
                    let mut unit = ScatterVector::unit(self.num_row, p);
                    solve::solve(&self.factor.upper_rows(), &mut unit, true);
                    unit.nonzeros().collect()
                };
                let eta = self.factor.replace_column(p, alpha, &spike, &w);
                self.updates.push_row_eta(RowEta {
                    row: p,
                    eta: Packed::from_entries(eta),
                });
            }
            UpdateMethod::ProductForm => {
                self.updates.push_column_eta(ColumnEta {
                    row: p,
                    alpha,
                    column: Packed::from_entries(aq.nonzeros().filter(|&(i, _)| i != p)),
                });
            }
            UpdateMethod::MultipleProductForm => {
                let column = aq
                    .nonzeros()
                    .map(|(i, v)| if i == p { (i, v - 1.0) } else { (i, v) });
                self.updates.push_pair(ProductPair {
                    alpha,
                    column: Packed::from_entries(column),
                    row: Packed::from_entries(ep.nonzeros()),
                });
            }
            UpdateMethod::AlternateProductForm => {
                if !self.matrix_valid {
                    return Err(FactorError::InvalidMatrix);
                }
                let variable_out = basic_index[p];
                let mut difference = ScatterVector::new(self.num_row);
                for_each_basic_entry(&self.matrix, change.variable_in, |row, value| {
                    difference.add(row, value)
                });
                for_each_basic_entry(&self.matrix, variable_out, |row, value| {
                    difference.add(row, -value)
                });
                self.updates.push_pair(ProductPair {
                    alpha,
                    column: Packed::from_entries(difference.nonzeros()),
                    row: Packed::from_entries(ep.nonzeros()),
                });
            }
        }
        self.timers.add(FactorSection::Update, start.elapsed());

        basic_index[p] = change.variable_in;
        self.refactor_info.clear();

        let fill_limit = self.settings.fill_factor * self.build_nnz as f64 + self.num_row as f64;
        if self.updates.len() >= self.settings.update_limit
            || self.invert_num_nz() as f64 > fill_limit
        {
            debug!(
                "refactor suggested after {} updates ({} nonzeros, build had {})",
                self.updates.len(),
                self.invert_num_nz(),
                self.build_nnz
            );
            return Ok(UpdateHint::RefactorSuggested);
        }
        Ok(UpdateHint::Ok)
    }

    /// Read-only view of the factor arrays.
    pub fn view(&self) -> FactorView<'_> {
        FactorView { engine: self }
    }
}

pub(crate) fn check_variables(basic_index: &[usize], limit: usize) -> FactorResult<()> {
    match basic_index.iter().find(|&&var| var >= limit) {
        Some(&var) => Err(FactorError::InvalidBasicVariable { var, limit }),
        None => Ok(()),
    }
}

fn section<'a>(
    timers: &'a mut Option<&mut FactorTimers>,
    which: FactorSection,
) -> Option<FactorGuard<'a>> {
    timers.as_deref_mut().map(|t| t.scoped(which))
}

/// Read-only access to the engine's internal arrays, for components
/// that exchange data with the factorization (e.g. a simplex driver
/// copying the pivot order).
#[derive(Clone, Copy)]
pub struct FactorView<'a> {
    engine: &'a BasisFactor,
}

impl<'a> FactorView<'a> {
    pub fn matrix(&self) -> &'a SparseCsc {
        &self.engine.matrix
    }

    pub fn num_row(&self) -> usize {
        self.engine.num_row
    }

    pub fn num_col(&self) -> usize {
        self.engine.num_col
    }

    /// Pivot row of each L column, in pivot order.
    pub fn l_pivot_index(&self) -> &'a [usize] {
        &self.engine.factor.l_pivot_index
    }

    pub fn l_start(&self) -> &'a [usize] {
        &self.engine.factor.l_start
    }

    pub fn l_index(&self) -> &'a [usize] {
        &self.engine.factor.l_index
    }

    pub fn l_value(&self) -> &'a [f64] {
        &self.engine.factor.l_value
    }

    /// Pivot row of each U column; `usize::MAX` marks a column replaced
    /// by a Forrest–Tomlin update.
    pub fn u_pivot_index(&self) -> &'a [usize] {
        &self.engine.factor.u_pivot_index
    }

    pub fn u_pivot_value(&self) -> &'a [f64] {
        &self.engine.factor.u_pivot_value
    }

    pub fn u_start(&self) -> &'a [usize] {
        &self.engine.factor.u_start
    }

    pub fn u_end(&self) -> &'a [usize] {
        &self.engine.factor.u_end
    }

    pub fn u_index(&self) -> &'a [usize] {
        &self.engine.factor.u_index
    }

    pub fn u_value(&self) -> &'a [f64] {
        &self.engine.factor.u_value
    }

    pub fn update_count(&self) -> usize {
        self.engine.updates.len()
    }

    pub fn refactor_info(&self) -> &'a RefactorInfo {
        &self.engine.refactor_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::{basis_times, basis_transpose_times, from_triplets, identity};

    #[test]
    fn test_setup_rejects_bad_input() {
        let a = Arc::new(identity(3));
        let err = BasisFactor::setup(a.clone(), &[0, 1], FactorSettings::default()).unwrap_err();
        assert!(matches!(err, FactorError::DimensionMismatch { .. }));

        let err = BasisFactor::setup(a.clone(), &[0, 1, 6], FactorSettings::default()).unwrap_err();
        assert_eq!(err, FactorError::InvalidBasicVariable { var: 6, limit: 6 });

        let csr = Arc::new(identity(3).to_csr());
        let err = BasisFactor::setup(csr, &[0, 1, 2], FactorSettings::default()).unwrap_err();
        assert_eq!(err, FactorError::NotColumnMajor);

        let settings = FactorSettings {
            pivot_threshold: 2.0,
            ..Default::default()
        };
        let err = BasisFactor::setup(a, &[0, 1, 2], settings).unwrap_err();
        assert!(matches!(err, FactorError::InvalidSettings(_)));
    }

    #[test]
    fn test_solve_before_build() {
        let a = Arc::new(identity(2));
        let factor = BasisFactor::setup(a, &[0, 1], FactorSettings::default()).unwrap();
        let mut rhs = ScatterVector::unit(2, 0);
        assert_eq!(factor.ftran(&mut rhs, 0.5, None), Err(FactorError::NotBuilt));
    }

    #[test]
    fn test_pivot_setters() {
        let a = Arc::new(identity(2));
        let mut factor = BasisFactor::setup(a, &[0, 1], FactorSettings::default()).unwrap();
        assert!(factor.set_pivot_threshold(0.25));
        assert!(!factor.set_pivot_threshold(0.9));
        assert!(!factor.set_pivot_threshold(1e-6));
        assert_eq!(factor.settings().pivot_threshold, 0.25);

        assert!(factor.set_pivot_tolerance(1e-8));
        assert!(!factor.set_pivot_tolerance(-1.0));
        assert_eq!(factor.settings().pivot_tolerance, 1e-8);
    }

    #[test]
    fn test_setup_matrix_marks_invalid() {
        let a = Arc::new(identity(2));
        let mut factor = BasisFactor::setup(a, &[0, 1], FactorSettings::default()).unwrap();
        factor.setup_matrix(Arc::new(identity(3)));
        assert!(!factor.matrix_is_valid());
        factor.setup_matrix(Arc::new(from_triplets(2, 2, vec![(0, 0, 3.0), (1, 1, 1.0)])));
        assert!(factor.matrix_is_valid());
    }

    #[test]
    fn test_solves_with_timers() {
        let a = Arc::new(from_triplets(2, 2, vec![(0, 0, 2.0), (1, 0, 1.0), (1, 1, 4.0)]));
        let mut basic_index = vec![0, 1];
        let mut factor =
            BasisFactor::setup(a.clone(), &basic_index, FactorSettings::default()).unwrap();
        factor.build(&mut basic_index).unwrap();

        let mut timers = FactorTimers::default();
        let mut x = ScatterVector::from_dense(&[2.0, 5.0]);
        factor.ftran(&mut x, 1.0, Some(&mut timers)).unwrap();
        let bx = basis_times(&a, &basic_index, x.array());
        assert!((bx[0] - 2.0).abs() < 1e-12);
        assert!((bx[1] - 5.0).abs() < 1e-12);

        let mut y = ScatterVector::from_dense(&[1.0, 0.0]);
        factor.btran(&mut y, 1.0, Some(&mut timers)).unwrap();
        let bty = basis_transpose_times(&a, &basic_index, y.array());
        assert!((bty[0] - 1.0).abs() < 1e-12);
        assert!(bty[1].abs() < 1e-12);
    }
}
