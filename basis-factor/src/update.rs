//! Update buffer and the four update formulas.
//!
//! The buffer holds one patch per accepted basis change since the last
//! build. Which patches exist and where they are applied during a solve
//! depends on the method:
//!
//! | method | FTRAN                              | BTRAN                             |
//! |--------|------------------------------------|-----------------------------------|
//! | FT     | row etas after L, in order         | row etas after U, in reverse      |
//! | PF     | column etas after U, in order      | column etas before U, in reverse  |
//! | MPF    | rank-one corrections after U       | rank-one corrections after L      |
//! | APF    | row-space factors before L, reverse| row-space factors after L, in order|

use crate::settings::{UpdateMethod, TINY};
use crate::vector::ScatterVector;

/// Sparse vector stored as parallel index/value arrays.
#[derive(Debug, Clone, Default)]
pub(crate) struct Packed {
    pub index: Vec<usize>,
    pub value: Vec<f64>,
}

impl Packed {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut packed = Packed::default();
        for (i, v) in entries {
            if v.abs() >= TINY {
                packed.index.push(i);
                packed.value.push(v);
            }
        }
        packed
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn dot(&self, x: &ScatterVector) -> f64 {
        x.dot(&self.index, &self.value)
    }

    /// x -= scale * self
    #[inline]
    pub fn subtract_from(&self, x: &mut ScatterVector, scale: f64) {
        for (&i, &v) in self.index.iter().zip(self.value.iter()) {
            x.add(i, -scale * v);
        }
    }
}

/// Forrest–Tomlin row eta: `x_p -= sum_j r_j x_j`.
#[derive(Debug, Clone)]
pub(crate) struct RowEta {
    pub row: usize,
    pub eta: Packed,
}

/// Product-form column eta.
#[derive(Debug, Clone)]
pub(crate) struct ColumnEta {
    pub row: usize,
    pub alpha: f64,
    /// Transformed entering column without its pivotal entry
    pub column: Packed,
}

/// Rank-one correction used by the MPF and APF methods.
#[derive(Debug, Clone)]
pub(crate) struct ProductPair {
    pub alpha: f64,
    /// MPF: `aq - e_p`; APF: `a_q - a_p`
    pub column: Packed,
    /// `ep = B^{-T} e_p` at the time of the update
    pub row: Packed,
}

/// Patches applied on top of L and U since the last build.
#[derive(Debug, Clone)]
pub(crate) enum UpdateBuffer {
    ForrestTomlin(Vec<RowEta>),
    ProductForm(Vec<ColumnEta>),
    MultipleProductForm(Vec<ProductPair>),
    AlternateProductForm(Vec<ProductPair>),
}

impl UpdateBuffer {
    pub fn new(method: UpdateMethod) -> Self {
        match method {
            UpdateMethod::ForrestTomlin => UpdateBuffer::ForrestTomlin(Vec::new()),
            UpdateMethod::ProductForm => UpdateBuffer::ProductForm(Vec::new()),
            UpdateMethod::MultipleProductForm => UpdateBuffer::MultipleProductForm(Vec::new()),
            UpdateMethod::AlternateProductForm => UpdateBuffer::AlternateProductForm(Vec::new()),
        }
    }

    pub fn method(&self) -> UpdateMethod {
        match self {
            UpdateBuffer::ForrestTomlin(_) => UpdateMethod::ForrestTomlin,
            UpdateBuffer::ProductForm(_) => UpdateMethod::ProductForm,
            UpdateBuffer::MultipleProductForm(_) => UpdateMethod::MultipleProductForm,
            UpdateBuffer::AlternateProductForm(_) => UpdateMethod::AlternateProductForm,
        }
    }

    pub fn clear(&mut self) {
        match self {
            UpdateBuffer::ForrestTomlin(etas) => etas.clear(),
            UpdateBuffer::ProductForm(etas) => etas.clear(),
            UpdateBuffer::MultipleProductForm(pairs)
            | UpdateBuffer::AlternateProductForm(pairs) => pairs.clear(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            UpdateBuffer::ForrestTomlin(etas) => etas.len(),
            UpdateBuffer::ProductForm(etas) => etas.len(),
            UpdateBuffer::MultipleProductForm(pairs)
            | UpdateBuffer::AlternateProductForm(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nonzeros held by the patches.
    pub fn nnz(&self) -> usize {
        match self {
            UpdateBuffer::ForrestTomlin(etas) => etas.iter().map(|e| e.eta.len()).sum(),
            UpdateBuffer::ProductForm(etas) => etas.iter().map(|e| e.column.len() + 1).sum(),
            UpdateBuffer::MultipleProductForm(pairs)
            | UpdateBuffer::AlternateProductForm(pairs) => {
                pairs.iter().map(|p| p.column.len() + p.row.len()).sum()
            }
        }
    }

    pub fn push_row_eta(&mut self, eta: RowEta) {
        if let UpdateBuffer::ForrestTomlin(etas) = self {
            etas.push(eta);
        }
    }

    pub fn push_column_eta(&mut self, eta: ColumnEta) {
        if let UpdateBuffer::ProductForm(etas) = self {
            etas.push(eta);
        }
    }

    pub fn push_pair(&mut self, pair: ProductPair) {
        match self {
            UpdateBuffer::MultipleProductForm(pairs)
            | UpdateBuffer::AlternateProductForm(pairs) => pairs.push(pair),
            _ => {}
        }
    }

    /// Coefficients of the MPF corrections, taken from the untransformed
    /// right-hand side.
    pub fn ftran_prepare(&self, rhs: &ScatterVector) -> Vec<f64> {
        match self {
            UpdateBuffer::MultipleProductForm(pairs) => {
                pairs.iter().map(|p| p.row.dot(rhs) / p.alpha).collect()
            }
            _ => Vec::new(),
        }
    }

    /// APF: b <- T_k^{-1} ... T_1^{-1} b, latest factor first.
    pub fn ftran_before_lower(&self, rhs: &mut ScatterVector) {
        if let UpdateBuffer::AlternateProductForm(pairs) = self {
            for pair in pairs.iter().rev() {
                let coefficient = pair.row.dot(rhs);
                if coefficient.abs() > TINY {
                    pair.column.subtract_from(rhs, coefficient / pair.alpha);
                }
            }
        }
    }

    /// FT: row etas in creation order.
    pub fn ftran_after_lower(&self, rhs: &mut ScatterVector) {
        if let UpdateBuffer::ForrestTomlin(etas) = self {
            for eta in etas {
                let dot = eta.eta.dot(rhs);
                if dot != 0.0 {
                    rhs.add(eta.row, -dot);
                }
            }
        }
    }

    /// PF column etas in order, or the MPF corrections.
    pub fn ftran_after_upper(&self, rhs: &mut ScatterVector, coefficients: &[f64]) {
        match self {
            UpdateBuffer::ProductForm(etas) => {
                for eta in etas {
                    let x = rhs.value(eta.row);
                    if x == 0.0 {
                        continue;
                    }
                    let x = x / eta.alpha;
                    rhs.set(eta.row, x);
                    eta.column.subtract_from(rhs, x);
                }
            }
            UpdateBuffer::MultipleProductForm(pairs) => {
                for (pair, &c) in pairs.iter().zip(coefficients.iter()) {
                    if c.abs() > TINY {
                        pair.column.subtract_from(rhs, c);
                    }
                }
            }
            _ => {}
        }
    }

    /// Coefficients of the MPF corrections for BTRAN.
    pub fn btran_prepare(&self, rhs: &ScatterVector) -> Vec<f64> {
        match self {
            UpdateBuffer::MultipleProductForm(pairs) => {
                pairs.iter().map(|p| p.column.dot(rhs) / p.alpha).collect()
            }
            _ => Vec::new(),
        }
    }

    /// PF: transposed column etas, latest first.
    pub fn btran_before_upper(&self, rhs: &mut ScatterVector) {
        if let UpdateBuffer::ProductForm(etas) = self {
            for eta in etas.iter().rev() {
                let x = rhs.value(eta.row) - eta.column.dot(rhs);
                rhs.set(eta.row, x / eta.alpha);
            }
        }
    }

    /// FT: transposed row etas, latest first.
    pub fn btran_after_upper(&self, rhs: &mut ScatterVector) {
        if let UpdateBuffer::ForrestTomlin(etas) = self {
            for eta in etas.iter().rev() {
                let x = rhs.value(eta.row);
                if x.abs() > TINY {
                    eta.eta.subtract_from(rhs, x);
                }
            }
        }
    }

    /// MPF corrections, or APF transposed factors in order.
    pub fn btran_after_lower(&self, rhs: &mut ScatterVector, coefficients: &[f64]) {
        match self {
            UpdateBuffer::MultipleProductForm(pairs) => {
                for (pair, &d) in pairs.iter().zip(coefficients.iter()) {
                    if d.abs() > TINY {
                        pair.row.subtract_from(rhs, d);
                    }
                }
            }
            UpdateBuffer::AlternateProductForm(pairs) => {
                for pair in pairs {
                    let coefficient = pair.column.dot(rhs);
                    if coefficient.abs() > TINY {
                        pair.row.subtract_from(rhs, coefficient / pair.alpha);
                    }
                }
            }
            _ => {}
        }
    }
}
