//! Factorization settings and tuning constants.
//!
//! Defaults can be overridden through environment variables so that a
//! driver can experiment without recompiling:
//!
//! - `BASIS_FACTOR_UPDATE_METHOD`: `ft`, `pf`, `mpf` or `apf`
//! - `BASIS_FACTOR_PIVOT_THRESHOLD`: relative pivot threshold
//! - `BASIS_FACTOR_DEBUG`: debug level (0, 1 or 2)

use std::fmt;
use std::str::FromStr;

/// Default relative stability bound for kernel pivots.
pub const DEFAULT_PIVOT_THRESHOLD: f64 = 0.1;
/// Smallest accepted relative pivot threshold.
pub const MIN_PIVOT_THRESHOLD: f64 = 8e-4;
/// Largest accepted relative pivot threshold.
pub const MAX_PIVOT_THRESHOLD: f64 = 0.5;

/// Default absolute pivot magnitude floor.
pub const DEFAULT_PIVOT_TOLERANCE: f64 = 1e-10;
/// Smallest accepted pivot tolerance.
pub const MIN_PIVOT_TOLERANCE: f64 = 0.0;
/// Largest accepted pivot tolerance.
pub const MAX_PIVOT_TOLERANCE: f64 = 1.0;

/// Number of candidate columns/rows examined by the Markowitz search
/// before settling for the best pivot found so far.
pub const MAX_KERNEL_SEARCH: usize = 8;

/// Values below this magnitude are dropped from the factors.
pub const TINY: f64 = 1e-14;

/// Update formula used to keep the factorization valid after a basis change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UpdateMethod {
    /// Forrest–Tomlin: rewrites one column of U and appends a row eta.
    #[default]
    ForrestTomlin,

    /// Product form: appends the transformed entering column as an eta.
    ProductForm,

    /// Multiple product form: rank-one corrections built from the
    /// transformed entering column and the pivotal row.
    MultipleProductForm,

    /// Alternate product form: rank-one corrections applied on the
    /// untransformed side, built from original matrix columns.
    AlternateProductForm,
}

impl UpdateMethod {
    /// All methods, in a fixed order.
    pub const ALL: [UpdateMethod; 4] = [
        UpdateMethod::ForrestTomlin,
        UpdateMethod::ProductForm,
        UpdateMethod::MultipleProductForm,
        UpdateMethod::AlternateProductForm,
    ];

    /// Short lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            UpdateMethod::ForrestTomlin => "ft",
            UpdateMethod::ProductForm => "pf",
            UpdateMethod::MultipleProductForm => "mpf",
            UpdateMethod::AlternateProductForm => "apf",
        }
    }
}

impl fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMethod::ForrestTomlin => write!(f, "Forrest-Tomlin"),
            UpdateMethod::ProductForm => write!(f, "Product Form"),
            UpdateMethod::MultipleProductForm => write!(f, "Multiple Product Form"),
            UpdateMethod::AlternateProductForm => write!(f, "Alternate Product Form"),
        }
    }
}

impl FromStr for UpdateMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ft" | "forrest-tomlin" => Ok(UpdateMethod::ForrestTomlin),
            "pf" | "product-form" => Ok(UpdateMethod::ProductForm),
            "mpf" | "multiple-product-form" => Ok(UpdateMethod::MultipleProductForm),
            "apf" | "alternate-product-form" => Ok(UpdateMethod::AlternateProductForm),
            other => Err(format!("unknown update method '{}'", other)),
        }
    }
}

/// Settings for a [`crate::BasisFactor`] instance.
#[derive(Debug, Clone)]
pub struct FactorSettings {
    /// Relative stability bound: a kernel pivot must be at least this
    /// fraction of the largest active magnitude in its column.
    pub pivot_threshold: f64,

    /// Absolute floor on pivot magnitudes, in build and in update.
    pub pivot_tolerance: f64,

    /// Update formula, fixed for the lifetime of the instance.
    pub update_method: UpdateMethod,

    /// Original Markowitz search: every examined candidate counts
    /// towards `search_limit`. When false, candidates without a
    /// numerically acceptable entry are not counted.
    pub use_original_logic: bool,

    /// Number of candidates examined before accepting the best pivot.
    pub search_limit: usize,

    /// Build time limit in milliseconds (None = no limit)
    pub build_time_limit_ms: Option<u64>,

    /// Number of updates after which a refactorization is suggested.
    pub update_limit: usize,

    /// A refactorization is suggested once the representation holds more
    /// than `fill_factor` times the nonzeros of the last build.
    pub fill_factor: f64,

    /// 0 = no checks, 1 = cheap invert check, 2 = full invert check
    pub debug_level: u8,

    /// Capture an [`crate::AnalyseBuild`] record on every build.
    pub analyse_build: bool,
}

impl Default for FactorSettings {
    fn default() -> Self {
        let update_method = std::env::var("BASIS_FACTOR_UPDATE_METHOD")
            .ok()
            .and_then(|s| s.parse::<UpdateMethod>().ok())
            .unwrap_or_default();

        let pivot_threshold = std::env::var("BASIS_FACTOR_PIVOT_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| (MIN_PIVOT_THRESHOLD..=MAX_PIVOT_THRESHOLD).contains(v))
            .unwrap_or(DEFAULT_PIVOT_THRESHOLD);

        let debug_level = std::env::var("BASIS_FACTOR_DEBUG")
            .ok()
            .and_then(|s| s.parse::<u8>().ok())
            .unwrap_or(0);

        Self {
            pivot_threshold,
            pivot_tolerance: DEFAULT_PIVOT_TOLERANCE,
            update_method,
            use_original_logic: true,
            search_limit: MAX_KERNEL_SEARCH,
            build_time_limit_ms: None,
            update_limit: 100,
            fill_factor: 3.0,
            debug_level,
            analyse_build: false,
        }
    }
}

impl FactorSettings {
    /// Settings with the given update method and defaults elsewhere.
    pub fn with_method(update_method: UpdateMethod) -> Self {
        Self {
            update_method,
            ..Default::default()
        }
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_PIVOT_THRESHOLD..=MAX_PIVOT_THRESHOLD).contains(&self.pivot_threshold) {
            return Err(format!(
                "pivot_threshold {} outside [{}, {}]",
                self.pivot_threshold, MIN_PIVOT_THRESHOLD, MAX_PIVOT_THRESHOLD
            ));
        }
        if !(MIN_PIVOT_TOLERANCE..=MAX_PIVOT_TOLERANCE).contains(&self.pivot_tolerance) {
            return Err(format!(
                "pivot_tolerance {} outside [{}, {}]",
                self.pivot_tolerance, MIN_PIVOT_TOLERANCE, MAX_PIVOT_TOLERANCE
            ));
        }
        if self.search_limit == 0 {
            return Err("search_limit must be positive".to_string());
        }
        if self.update_limit == 0 {
            return Err("update_limit must be positive".to_string());
        }
        if !(self.fill_factor >= 1.0) {
            return Err(format!("fill_factor must be >= 1, got {}", self.fill_factor));
        }
        if self.debug_level > 2 {
            return Err(format!("debug_level must be 0, 1 or 2, got {}", self.debug_level));
        }
        Ok(())
    }
}
