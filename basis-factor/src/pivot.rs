//! Pivot selection on the working kernel.

use crate::kernel::KernelStore;

/// How a pivot was chosen during build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PivotKind {
    /// Basic logical (slack) column
    Logical,
    /// Column with a single active entry
    ColumnSingleton,
    /// Row with a single active entry
    RowSingleton,
    /// Chosen by the Markowitz search
    Markowitz,
    /// Unit pivot substituted for a deficient row/column pair
    Deficient,
}

impl PivotKind {
    /// Pivots taken after the simple phase.
    pub fn is_searched(self) -> bool {
        matches!(self, PivotKind::Markowitz | PivotKind::Deficient)
    }
}

/// Candidate pivot (row, column position, value).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Pivot {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

/// Parameters of the Markowitz search.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchRules {
    pub pivot_tolerance: f64,
    pub search_limit: usize,
    pub use_original_logic: bool,
}

/// Merit of the chosen pivot.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SearchOutcome {
    pub merit: usize,
}

/// Find a column singleton passing the absolute tolerance.
pub(crate) fn column_singleton(kernel: &KernelStore, pivot_tolerance: f64) -> Option<Pivot> {
    let mut cursor = kernel.col_link.first(1);
    while let Some(c) = cursor {
        if let Some((row, value)) = kernel.col_entries(c).next() {
            if value.abs() >= pivot_tolerance {
                return Some(Pivot { row, col: c, value });
            }
        }
        cursor = kernel.col_link.next(c);
    }
    None
}

/// Find a row singleton passing both the relative threshold of its
/// column and the absolute tolerance.
pub(crate) fn row_singleton(kernel: &KernelStore, pivot_tolerance: f64) -> Option<Pivot> {
    let mut cursor = kernel.row_link.first(1);
    while let Some(r) = cursor {
        if let Some(&c) = kernel.row_cols(r).first() {
            if let Some(value) = kernel.value(r, c) {
                if value.abs() >= kernel.min_pivot(c) && value.abs() >= pivot_tolerance {
                    return Some(Pivot { row: r, col: c, value });
                }
            }
        }
        cursor = kernel.row_link.next(r);
    }
    None
}

/// Markowitz search over the count buckets.
///
/// Buckets are scanned in increasing count, columns before rows. An entry
/// is acceptable when it passes the column's relative threshold and the
/// absolute tolerance; among acceptable entries the smallest merit
/// `(count - 1) * (other_count - 1)` wins. The search stops once a pivot
/// is held and either `search_limit` candidates were examined or the
/// merit cannot improve for the current count.
pub(crate) fn markowitz(
    kernel: &KernelStore,
    rules: &SearchRules,
) -> Option<(Pivot, SearchOutcome)> {
    let mut best: Option<Pivot> = None;
    let mut best_merit = usize::MAX;
    let mut search_count = 0;

    let done = |best: &Option<Pivot>, best_merit: usize, search_count: usize, count: usize| {
        best.is_some()
            && (search_count >= rules.search_limit || best_merit <= (count - 1) * (count - 1))
    };

    for count in 1..=kernel.num() {
        // Columns
        let mut cursor = kernel.col_link.first(count);
        while let Some(c) = cursor {
            let min_pivot = kernel.min_pivot(c);
            let mut found = false;
            for (r, value) in kernel.col_entries(c) {
                if value.abs() < min_pivot || value.abs() < rules.pivot_tolerance {
                    continue;
                }
                found = true;
                let merit = (count - 1) * kernel.row_count(r).saturating_sub(1);
                if merit < best_merit {
                    best_merit = merit;
                    best = Some(Pivot { row: r, col: c, value });
                }
            }
            if rules.use_original_logic || found {
                search_count += 1;
            }
            if done(&best, best_merit, search_count, count) {
                return best.map(|p| (p, SearchOutcome { merit: best_merit }));
            }
            cursor = kernel.col_link.next(c);
        }

        // Rows
        let mut cursor = kernel.row_link.first(count);
        while let Some(r) = cursor {
            let mut found = false;
            for &c in kernel.row_cols(r) {
                let value = match kernel.value(r, c) {
                    Some(v) => v,
                    None => continue,
                };
                if value.abs() < kernel.min_pivot(c) || value.abs() < rules.pivot_tolerance {
                    continue;
                }
                found = true;
                let merit = (count - 1) * kernel.col_count(c).saturating_sub(1);
                if merit < best_merit {
                    best_merit = merit;
                    best = Some(Pivot { row: r, col: c, value });
                }
            }
            if rules.use_original_logic || found {
                search_count += 1;
            }
            if done(&best, best_merit, search_count, count) {
                return best.map(|p| (p, SearchOutcome { merit: best_merit }));
            }
            cursor = kernel.row_link.next(r);
        }
    }

    best.map(|p| (p, SearchOutcome { merit: best_merit }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel_from(columns: &[Vec<(usize, f64)>]) -> KernelStore {
        let mut kernel = KernelStore::new(columns.len());
        kernel.reset(columns.len(), 0.1);
        kernel.load(|c, push| {
            for &(r, v) in &columns[c] {
                push(r, v);
            }
        });
        kernel
    }

    fn rules(use_original_logic: bool) -> SearchRules {
        SearchRules {
            pivot_tolerance: 1e-10,
            search_limit: 8,
            use_original_logic,
        }
    }

    #[test]
    fn test_singletons() {
        // [[3, 1], [0, 2]]: column 0 is a singleton, row 1 is a singleton
        let kernel = kernel_from(&[vec![(0, 3.0)], vec![(0, 1.0), (1, 2.0)]]);
        let col = column_singleton(&kernel, 1e-10).unwrap();
        assert_eq!((col.row, col.col, col.value), (0, 0, 3.0));

        let row = row_singleton(&kernel, 1e-10).unwrap();
        assert_eq!((row.row, row.col, row.value), (1, 1, 2.0));
    }

    #[test]
    fn test_row_singleton_respects_threshold() {
        // Row 1 holds only a tiny entry relative to its column
        let kernel = kernel_from(&[
            vec![(0, 100.0), (1, 1e-3), (2, 1.0)],
            vec![(0, 1.0), (2, 1.0)],
            vec![(0, 1.0), (2, 2.0)],
        ]);
        assert!(row_singleton(&kernel, 1e-10).is_none());
    }

    #[test]
    fn test_markowitz_prefers_low_merit() {
        // Dense 3x3 except (2, 2); the two-entry column 2 gives merit
        // (2-1)*(3-1) = 2 and nothing in the three-count buckets beats it
        let kernel = kernel_from(&[
            vec![(0, 4.0), (1, 1.0), (2, 2.0)],
            vec![(0, 1.0), (1, 5.0), (2, 1.0)],
            vec![(0, 1.0), (1, 1.0)],
        ]);
        let (pivot, outcome) = markowitz(&kernel, &rules(true)).unwrap();
        assert_eq!(pivot.col, 2);
        assert_eq!(outcome.merit, 2);
        assert!(pivot.value.abs() >= kernel.min_pivot(pivot.col));
    }

    #[test]
    fn test_markowitz_rejects_unstable_entries() {
        // Column 0 = [1e-6, 1]: the small entry fails the threshold
        let kernel = kernel_from(&[vec![(0, 1e-6), (1, 1.0)], vec![(0, 1.0), (1, 1.0)]]);
        for original in [true, false] {
            let (pivot, _) = markowitz(&kernel, &rules(original)).unwrap();
            assert!(!(pivot.row == 0 && pivot.col == 0));
        }
    }

    #[test]
    fn test_markowitz_singular_kernel() {
        let kernel = kernel_from(&[vec![], vec![]]);
        assert!(markowitz(&kernel, &rules(true)).is_none());
    }
}
