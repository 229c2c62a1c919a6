//! Sparse LU factorization of simplex basis matrices.
//!
//! [`BasisFactor`] factors the basis `B` of a constraint matrix as
//! `PBQ = LU`, answers `B x = b` ([`BasisFactor::ftran`]) and
//! `B^T y = b` ([`BasisFactor::btran`]), and keeps the factorization
//! valid across single-column basis changes ([`BasisFactor::update`])
//! with one of four update formulas:
//!
//! - Forrest–Tomlin: rewrites a column of U and appends a row eta
//! - Product form: appends the transformed entering column as an eta
//! - Multiple product form: additive rank-one corrections
//! - Alternate product form: rank-one factors in the untransformed space
//!
//! The build eliminates singletons first, then chooses kernel pivots by
//! a Markowitz search with threshold pivoting. A singular basis is
//! completed with logicals and the rank deficiency is reported.
//!
//! # Variables
//!
//! For a matrix with `num_col` columns and `num_row` rows, variable
//! `j < num_col` is column `j` and variable `num_col + i` is the
//! logical of row `i`, whose column is `e_i`.

pub mod analysis;
mod build;
pub mod engine;
pub mod error;
mod factor;
mod kernel;
mod link;
pub mod perf;
mod pivot;
pub mod refactor;
pub mod settings;
mod solve;
pub mod sparse;
mod structure;
mod update;
pub mod vector;

pub use analysis::{AnalyseBuild, LuReport};
pub use engine::{BasisChange, BasisFactor, FactorView, RankDeficiency, UpdateHint};
pub use error::{FactorError, FactorResult};
pub use perf::{FactorSection, FactorTimers};
pub use pivot::PivotKind;
pub use refactor::RefactorInfo;
pub use settings::{FactorSettings, UpdateMethod};
pub use solve::{HYPER_BTRAN_L, HYPER_BTRAN_U, HYPER_CANCEL, HYPER_FTRAN_L, HYPER_FTRAN_U};
pub use sparse::SparseCsc;
pub use vector::ScatterVector;
