//! Build: simple phase, Markowitz kernel phase, rank deficiency, finish.

use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::analysis::AnalyseBuild;
use crate::engine::{check_variables, BasisFactor};
use crate::error::{FactorError, FactorResult};
use crate::perf::FactorSection;
use crate::pivot::{column_singleton, markowitz, row_singleton, Pivot, PivotKind, SearchRules};
use crate::sparse::{basic_column_nnz, for_each_basic_entry};

/// One elimination step: the pivot row and the basis position
/// (before permutation) of the eliminated column.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PivotRecord {
    pub row: usize,
    pub col: usize,
    pub kind: PivotKind,
}

/// Counters collected while eliminating, whether searched or replayed.
#[derive(Debug, Default)]
pub(crate) struct BuildStats {
    pub num_simple_pivot: usize,
    pub num_kernel_pivot: usize,
    pub kernel_initial_num_nz: usize,
    pub kernel_final_num_nz: usize,
    pub sum_merit: f64,
}

impl BasisFactor {
    /// Factor the basis named by `basic_index`.
    ///
    /// Returns the rank deficiency (0 = full rank). On return the basic
    /// index is permuted so that position `r` holds the variable pivoted
    /// on row `r`; variables that could not be pivoted are replaced by
    /// the logicals of their rows and listed in
    /// [`BasisFactor::rank_deficiency`]. A timeout leaves no valid
    /// factorization and the basic index untouched.
    pub fn build(&mut self, basic_index: &mut [usize]) -> FactorResult<usize> {
        let start = Instant::now();
        self.ensure_matrix(basic_index.len())?;
        if basic_index.len() != self.num_row {
            return Err(FactorError::DimensionMismatch {
                what: "basic index",
                expected: self.num_row,
                actual: basic_index.len(),
            });
        }
        check_variables(basic_index, self.num_col + self.num_row)?;

        self.built = false;
        self.updates.clear();
        self.deficiency.clear();
        self.build_synthetic_tick = 0.0;

        let mut stats = BuildStats::default();
        let records = match self.try_replay(basic_index, start, &mut stats)? {
            Some(records) => {
                debug!("build replayed {} recorded pivots", records.len());
                records
            }
            None => self.eliminate_all(basic_index, start, &mut stats)?,
        };

        let finish = Instant::now();
        self.finish(basic_index, &records, &mut stats);
        self.timers.add(FactorSection::BuildFinish, finish.elapsed());
        self.build_real_tick = start.elapsed().as_secs_f64();

        let rank_deficiency = self.deficiency.degree();
        debug!(
            "build: {} rows, L {} + U {} nonzeros, deficiency {}, {:.3} ms",
            self.num_row,
            self.factor.l_nnz(),
            self.factor.u_nnz(),
            rank_deficiency,
            self.build_real_tick * 1e3
        );

        if self.settings.debug_level > 0 {
            self.debug_check_invert(basic_index);
        }
        Ok(rank_deficiency)
    }

    pub(crate) fn check_time(&self, start: Instant) -> FactorResult<()> {
        if let Some(limit_ms) = self.settings.build_time_limit_ms {
            if start.elapsed() >= Duration::from_millis(limit_ms) {
                warn!("build time limit of {} ms reached", limit_ms);
                return Err(FactorError::TimeLimit { limit_ms });
            }
        }
        Ok(())
    }

    /// Populate the kernel with the basic columns and reset the factor.
    pub(crate) fn load_kernel(&mut self, basic_index: &[usize]) {
        let matrix = &self.matrix;
        self.kernel.reset(self.num_row, self.settings.pivot_threshold);
        self.kernel.load(|c, push| {
            for_each_basic_entry(matrix, basic_index[c], |row, value| push(row, value))
        });
        self.factor.clear(self.num_row);
    }

    /// Eliminate on `pivot` and record the step.
    pub(crate) fn pivot(&mut self, pivot: Pivot, kind: PivotKind, records: &mut Vec<PivotRecord>) {
        let step = self.kernel.eliminate(pivot.row, pivot.col, pivot.value);
        self.factor.push_lower(pivot.row, &step.l_entries);
        self.factor.push_upper(pivot.row, pivot.value, &step.u_entries);
        self.build_synthetic_tick += step.touched as f64;
        records.push(PivotRecord {
            row: pivot.row,
            col: pivot.col,
            kind,
        });
    }

    fn eliminate_all(
        &mut self,
        basic_index: &[usize],
        start: Instant,
        stats: &mut BuildStats,
    ) -> FactorResult<Vec<PivotRecord>> {
        let n = self.num_row;
        let tolerance = self.settings.pivot_tolerance;
        self.load_kernel(basic_index);
        let mut records = Vec::with_capacity(n);

        // Simple phase
        self.check_time(start)?;
        let phase = Instant::now();
        loop {
            if let Some(p) = column_singleton(&self.kernel, tolerance) {
                let kind = if basic_index[p.col] >= self.num_col {
                    PivotKind::Logical
                } else {
                    PivotKind::ColumnSingleton
                };
                self.pivot(p, kind, &mut records);
            } else if let Some(p) = row_singleton(&self.kernel, tolerance) {
                self.pivot(p, PivotKind::RowSingleton, &mut records);
            } else {
                break;
            }
        }
        self.timers.add(FactorSection::BuildSimple, phase.elapsed());

        // Kernel phase
        let phase = Instant::now();
        stats.kernel_initial_num_nz = self.kernel.active_nnz();
        let rules = SearchRules {
            pivot_tolerance: tolerance,
            search_limit: self.settings.search_limit,
            use_original_logic: self.settings.use_original_logic,
        };
        while records.len() < n {
            self.check_time(start)?;
            match markowitz(&self.kernel, &rules) {
                Some((p, outcome)) => {
                    stats.sum_merit += outcome.merit as f64;
                    self.pivot(p, PivotKind::Markowitz, &mut records);
                }
                None => break,
            }
        }
        stats.kernel_final_num_nz = self.kernel.active_nnz();
        self.timers.add(FactorSection::BuildKernel, phase.elapsed());

        if records.len() < n {
            self.substitute_deficient(basic_index, &mut records);
        }
        Ok(records)
    }

    /// Pair the rows and columns left in the kernel and give each pair a
    /// unit pivot; the row's logical replaces the column's variable.
    fn substitute_deficient(&mut self, basic_index: &[usize], records: &mut Vec<PivotRecord>) {
        let (rows, cols) = self.kernel.remaining();
        debug_assert_eq!(rows.len(), cols.len());
        for (&row, &col) in rows.iter().zip(cols.iter()) {
            self.kernel.retire(row, col);
            self.factor.push_lower(row, &[]);
            self.factor.push_upper(row, 1.0, &[]);
            records.push(PivotRecord {
                row,
                col,
                kind: PivotKind::Deficient,
            });
            self.deficiency.row_with_no_pivot.push(row);
            self.deficiency.col_with_no_pivot.push(col);
            self.deficiency.var_with_no_pivot.push(basic_index[col]);
        }
        warn!(
            "rank deficiency {}: no pivot for variables {:?}, substituted logicals of rows {:?}",
            rows.len(),
            self.deficiency.var_with_no_pivot,
            self.deficiency.row_with_no_pivot
        );
    }

    /// Permute the basic index, complete the factor and record the
    /// refactor info.
    fn finish(
        &mut self,
        basic_index: &mut [usize],
        records: &[PivotRecord],
        stats: &mut BuildStats,
    ) {
        let original = basic_index.to_vec();
        for record in records {
            basic_index[record.row] = match record.kind {
                PivotKind::Deficient => self.num_col + record.row,
                _ => original[record.col],
            };
        }
        self.factor.finish();
        self.build_nnz = self.factor.l_nnz() + self.factor.u_nnz();

        self.refactor_info.clear();
        for record in records {
            self.refactor_info.push(basic_index[record.row], record.row, record.kind);
        }
        self.refactor_info.use_info = true;

        if self.settings.analyse_build {
            stats.num_simple_pivot = records
                .iter()
                .filter(|r| !r.kind.is_searched())
                .count();
            stats.num_kernel_pivot =
                records.iter().filter(|r| r.kind == PivotKind::Markowitz).count();
            let basic_num_nz = original
                .iter()
                .map(|&var| basic_column_nnz(&self.matrix, var))
                .sum();
            self.analysis = Some(AnalyseBuild {
                num_row: self.num_row,
                num_col: self.num_col,
                num_basic: self.num_row,
                basic_num_nz,
                num_simple_pivot: stats.num_simple_pivot,
                num_kernel_pivot: stats.num_kernel_pivot,
                kernel_initial_num_nz: stats.kernel_initial_num_nz,
                kernel_final_num_nz: stats.kernel_final_num_nz,
                invert_num_nz: self.build_nnz,
                sum_merit: stats.sum_merit,
                rank_deficiency: self.deficiency.degree(),
            });
        }
        self.built = true;
    }
}
