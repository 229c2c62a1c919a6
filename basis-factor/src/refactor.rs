//! Cached pivot sequence for fast rebuilds.

use std::time::Instant;

use log::info;

use crate::build::{BuildStats, PivotRecord};
use crate::engine::BasisFactor;
use crate::error::FactorResult;
use crate::perf::FactorSection;
use crate::link::NONE;
use crate::pivot::{Pivot, PivotKind};

/// Pivot sequence recorded by the last successful build.
///
/// With `use_info` set, [`BasisFactor::build`] replays the sequence
/// instead of searching for pivots. Any update clears it.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefactorInfo {
    pub use_info: bool,
    pub pivot_var: Vec<usize>,
    pub pivot_row: Vec<usize>,
    pub pivot_kind: Vec<PivotKind>,
}

impl RefactorInfo {
    pub fn clear(&mut self) {
        self.use_info = false;
        self.pivot_var.clear();
        self.pivot_row.clear();
        self.pivot_kind.clear();
    }

    pub fn len(&self) -> usize {
        self.pivot_var.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivot_var.is_empty()
    }

    pub(crate) fn push(&mut self, var: usize, row: usize, kind: PivotKind) {
        self.pivot_var.push(var);
        self.pivot_row.push(row);
        self.pivot_kind.push(kind);
    }

    /// Renumber variables with `f`; variables mapped to None are kept.
    pub(crate) fn renumber<F>(&mut self, f: F)
    where
        F: Fn(usize) -> Option<usize>,
    {
        for var in &mut self.pivot_var {
            if let Some(new) = f(*var) {
                *var = new;
            }
        }
    }
}

/// Why a replay was abandoned.
#[derive(Debug)]
pub(crate) enum ReplayMismatch {
    Length { expected: usize, actual: usize },
    NotBasic { var: usize },
    Inactive { var: usize, row: usize },
    Pivot { var: usize, row: usize, value: f64 },
}

impl std::fmt::Display for ReplayMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayMismatch::Length { expected, actual } => {
                write!(f, "{} recorded pivots for {} rows", actual, expected)
            }
            ReplayMismatch::NotBasic { var } => write!(f, "variable {} is not basic", var),
            ReplayMismatch::Inactive { var, row } => {
                write!(f, "variable {} row {} already eliminated", var, row)
            }
            ReplayMismatch::Pivot { var, row, value } => {
                write!(f, "pivot {:.3e} of variable {} in row {} is unacceptable", value, var, row)
            }
        }
    }
}

impl BasisFactor {
    /// Take the refactor info recorded by the last build.
    pub fn refactor_info(&self) -> &RefactorInfo {
        &self.refactor_info
    }

    /// Install refactor info, typically taken from another engine
    /// factoring the same basis pattern.
    pub fn set_refactor_info(&mut self, info: RefactorInfo) {
        self.refactor_info = info;
    }

    pub fn clear_refactor_info(&mut self) {
        self.refactor_info.clear();
    }

    /// Eliminate along the recorded pivot sequence.
    ///
    /// The kernel must be loaded. Each pivot must pass the same absolute
    /// and relative tests as a searched one. Kernel statistics and phase
    /// timings are collected as in a full build. Returns the records on
    /// success; on a mismatch the kernel and factor are left partially
    /// eliminated and must be reloaded.
    pub(crate) fn replay(
        &mut self,
        basic_index: &[usize],
        start: Instant,
        stats: &mut BuildStats,
    ) -> FactorResult<Result<Vec<PivotRecord>, ReplayMismatch>> {
        let n = self.num_row;
        if self.refactor_info.len() != n {
            return Ok(Err(ReplayMismatch::Length {
                expected: n,
                actual: self.refactor_info.len(),
            }));
        }

        let mut position = vec![NONE; self.num_col + self.num_row];
        for (c, &var) in basic_index.iter().enumerate() {
            position[var] = c;
        }

        let mut records = Vec::with_capacity(n);
        let mut phase = Instant::now();
        let mut in_kernel = false;
        let mut kernel_done = false;
        for t in 0..n {
            self.check_time(start)?;
            let var = self.refactor_info.pivot_var[t];
            let row = self.refactor_info.pivot_row[t];
            let kind = self.refactor_info.pivot_kind[t];

            let col = match position.get(var) {
                Some(&c) if c != NONE => c,
                _ => return Ok(Err(ReplayMismatch::NotBasic { var })),
            };
            if row >= n || !self.kernel.row_is_active(row) || !self.kernel.col_is_active(col) {
                return Ok(Err(ReplayMismatch::Inactive { var, row }));
            }
            let value = self.kernel.value(row, col).unwrap_or(0.0);
            let acceptable = value != 0.0
                && value.abs() >= self.settings.pivot_tolerance
                && value.abs() >= self.kernel.min_pivot(col);
            if !acceptable {
                return Ok(Err(ReplayMismatch::Pivot { var, row, value }));
            }

            // Simple pivots come first, then Markowitz, then deficient
            if kind.is_searched() && !in_kernel {
                in_kernel = true;
                self.timers.add(FactorSection::BuildSimple, phase.elapsed());
                phase = Instant::now();
                stats.kernel_initial_num_nz = self.kernel.active_nnz();
            }
            if kind == PivotKind::Deficient && !kernel_done {
                kernel_done = true;
                stats.kernel_final_num_nz = self.kernel.active_nnz();
            }
            if kind == PivotKind::Markowitz {
                let merit = self.kernel.col_count(col).saturating_sub(1)
                    * self.kernel.row_count(row).saturating_sub(1);
                stats.sum_merit += merit as f64;
            }
            self.pivot(Pivot { row, col, value }, kind, &mut records);
        }

        if in_kernel {
            self.timers.add(FactorSection::BuildKernel, phase.elapsed());
        } else {
            self.timers.add(FactorSection::BuildSimple, phase.elapsed());
        }
        Ok(Ok(records))
    }

    /// Replay if refactor info is installed; on mismatch log, clear the
    /// info and report that a full build is needed.
    pub(crate) fn try_replay(
        &mut self,
        basic_index: &[usize],
        start: Instant,
        stats: &mut BuildStats,
    ) -> FactorResult<Option<Vec<PivotRecord>>> {
        if !self.refactor_info.use_info {
            return Ok(None);
        }
        self.load_kernel(basic_index);
        match self.replay(basic_index, start, stats)? {
            Ok(records) => Ok(Some(records)),
            Err(mismatch) => {
                info!("refactor info rejected ({}); falling back to full build", mismatch);
                self.refactor_info.clear();
                *stats = BuildStats::default();
                Ok(None)
            }
        }
    }
}
