//! Build diagnostics: the build analysis record, L/U reports and the
//! debug invert check.

use std::io::{self, Write};

use log::{debug, warn};

use crate::engine::BasisFactor;
use crate::link::NONE;
use crate::sparse::{basis_times, for_each_basic_entry};
use crate::vector::ScatterVector;

/// Error above which the debug invert check warns.
const INVERT_CHECK_TOLERANCE: f64 = 1e-6;

/// Statistics of the last build, captured when `analyse_build` is set.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalyseBuild {
    pub num_row: usize,
    pub num_col: usize,
    pub num_basic: usize,
    /// Nonzeros in the basis matrix
    pub basic_num_nz: usize,
    pub num_simple_pivot: usize,
    pub num_kernel_pivot: usize,
    pub kernel_initial_num_nz: usize,
    pub kernel_final_num_nz: usize,
    /// Nonzeros in L and U, counting U diagonals
    pub invert_num_nz: usize,
    pub sum_merit: f64,
    pub rank_deficiency: usize,
}

/// Which factors [`BasisFactor::report_lu`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuReport {
    L,
    U,
    Both,
}

impl BasisFactor {
    /// Analysis of the last build, if `analyse_build` was set.
    pub fn analyse_build(&self) -> Option<&AnalyseBuild> {
        self.analysis.as_ref()
    }

    /// Write a human-readable dump of the factors.
    ///
    /// With `full` unset only the pivot sequence and per-column counts
    /// are written.
    pub fn report_lu<W: Write>(&self, sink: &mut W, which: LuReport, full: bool) -> io::Result<()> {
        let factor = &self.factor;
        if matches!(which, LuReport::L | LuReport::Both) {
            writeln!(sink, "L: {} pivots, {} nonzeros", factor.num_pivot(), factor.l_nnz())?;
            for (k, &row) in factor.l_pivot_index.iter().enumerate() {
                let (start, end) = (factor.l_start[k], factor.l_start[k + 1]);
                write!(sink, "  {:>6} row {:>6} count {:>4}", k, row, end - start)?;
                if full {
                    for e in start..end {
                        write!(sink, " ({}, {:+.6e})", factor.l_index[e], factor.l_value[e])?;
                    }
                }
                writeln!(sink)?;
            }
        }
        if matches!(which, LuReport::U | LuReport::Both) {
            writeln!(
                sink,
                "U: {} pivots, {} nonzeros",
                factor.u_pivot_index.len(),
                factor.u_nnz()
            )?;
            for (k, &row) in factor.u_pivot_index.iter().enumerate() {
                if row == NONE {
                    writeln!(sink, "  {:>6} replaced", k)?;
                    continue;
                }
                let (start, end) = (factor.u_start[k], factor.u_end[k]);
                write!(
                    sink,
                    "  {:>6} row {:>6} pivot {:+.6e} count {:>4}",
                    k, row, factor.u_pivot_value[k], end - start
                )?;
                if full {
                    for e in start..end {
                        write!(sink, " ({}, {:+.6e})", factor.u_index[e], factor.u_value[e])?;
                    }
                }
                writeln!(sink)?;
            }
        }
        Ok(())
    }

    /// Check the fresh factorization against the basis matrix.
    ///
    /// Level 1 solves `B x = B 1`; level 2 also solves for every basic
    /// column. Returns the largest error seen.
    pub(crate) fn debug_check_invert(&self, basic_index: &[usize]) -> f64 {
        if !self.built || !self.matrix_valid {
            return 0.0;
        }
        let n = self.num_row;
        let ones = vec![1.0; n];
        let mut rhs = ScatterVector::from_dense(&basis_times(&self.matrix, basic_index, &ones));
        if self.ftran(&mut rhs, 1.0, None).is_err() {
            return f64::INFINITY;
        }
        let mut error = rhs.array().iter().fold(0.0_f64, |m, &x| m.max((x - 1.0).abs()));

        if self.settings.debug_level >= 2 {
            for (j, &var) in basic_index.iter().enumerate() {
                let mut column = ScatterVector::new(n);
                for_each_basic_entry(&self.matrix, var, |row, value| column.add(row, value));
                if self.ftran(&mut column, 1.0 / n as f64, None).is_err() {
                    return f64::INFINITY;
                }
                for i in 0..n {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    error = error.max((column.value(i) - expected).abs());
                }
            }
        }

        if error > INVERT_CHECK_TOLERANCE {
            warn!("invert check: error {:.3e} exceeds {:.1e}", error, INVERT_CHECK_TOLERANCE);
        } else {
            debug!("invert check: error {:.3e}", error);
        }
        error
    }
}
