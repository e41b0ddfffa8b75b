//! Reweighted sample dictionaries.
//!
//! A [`Dictionary`] is the value passed along the merge tree. Each entry is a
//! point together with its current inclusion probability and multiplicity
//! ("copies"). Leaves hold exact dictionaries (every point, probability one,
//! `target_copies` copies); merges thin them out.
//!
//! ## Invariants (must never change)
//!
//! - `points.nrows() == probs.len() == copies.len()`.
//! - Every entry has `copies > 0`; entries that reach zero are removed by the
//!   merge that thinned them.
//! - Every probability lies in `(0, 1]`.
//! - A dictionary is never mutated after the merge that produced it returns.

use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};

use crate::error::{Error, Result};

/// A weighted subset of samples approximating the kernel of a larger set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dictionary {
    points: Array2<f64>,
    probs: Array1<f64>,
    copies: Vec<u64>,
    target_copies: u64,
    regularization: f64,
    precision: f64,
}

impl Dictionary {
    /// Build a dictionary from its parts, checking every invariant.
    pub fn new(
        points: Array2<f64>,
        probs: Array1<f64>,
        copies: Vec<u64>,
        target_copies: u64,
        regularization: f64,
        precision: f64,
    ) -> Result<Self> {
        let q = points.nrows();
        if probs.len() != q {
            return Err(Error::DimensionMismatch {
                expected: q,
                found: probs.len(),
            });
        }
        if copies.len() != q {
            return Err(Error::DimensionMismatch {
                expected: q,
                found: copies.len(),
            });
        }
        if target_copies == 0 {
            return Err(Error::InvalidParameter {
                name: "target_copies",
                message: "must be > 0",
            });
        }
        if copies.iter().any(|&c| c == 0) {
            return Err(Error::InvalidParameter {
                name: "copies",
                message: "entries with zero copies must be removed",
            });
        }
        if probs.iter().any(|&p| !(p > 0.0 && p <= 1.0)) {
            return Err(Error::InvalidParameter {
                name: "probs",
                message: "must lie in (0, 1]",
            });
        }
        Ok(Self {
            points,
            probs,
            copies,
            target_copies,
            regularization,
            precision,
        })
    }

    /// An exact dictionary holding every row of `points` with probability one
    /// and `target_copies` copies each.
    ///
    /// This is how leaves of the merge tree are initialized.
    pub fn exact(
        points: Array2<f64>,
        target_copies: u64,
        regularization: f64,
        precision: f64,
    ) -> Self {
        let q = points.nrows();
        Self {
            points,
            probs: Array1::ones(q),
            copies: vec![target_copies; q],
            target_copies,
            regularization,
            precision,
        }
    }

    /// Concatenate two dictionaries, left entries first.
    ///
    /// Run-level parameters are taken from `left`; both sides of a merge come
    /// from the same run so they agree.
    pub fn concat(left: &Dictionary, right: &Dictionary) -> Result<Self> {
        if left.dim() != right.dim() {
            return Err(Error::DimensionMismatch {
                expected: left.dim(),
                found: right.dim(),
            });
        }
        let points = concatenate(Axis(0), &[left.points.view(), right.points.view()])
            .map_err(|e| Error::Other(e.to_string()))?;
        let probs = concatenate(Axis(0), &[left.probs.view(), right.probs.view()])
            .map_err(|e| Error::Other(e.to_string()))?;
        let mut copies = Vec::with_capacity(left.len() + right.len());
        copies.extend_from_slice(&left.copies);
        copies.extend_from_slice(&right.copies);
        Ok(Self {
            points,
            probs,
            copies,
            target_copies: left.target_copies,
            regularization: left.regularization,
            precision: left.precision,
        })
    }

    /// Replace probabilities and copies with new per-entry values and drop
    /// every entry whose new copy count is zero, preserving order.
    pub(crate) fn resampled(&self, probs: &[f64], copies: &[u64]) -> Self {
        let keep: Vec<usize> = copies
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(i, _)| i)
            .collect();
        Self {
            points: self.points.select(Axis(0), &keep),
            probs: keep.iter().map(|&i| probs[i]).collect(),
            copies: keep.iter().map(|&i| copies[i]).collect(),
            target_copies: self.target_copies,
            regularization: self.regularization,
            precision: self.precision,
        }
    }

    /// Dictionary size q.
    pub fn len(&self) -> usize {
        self.copies.len()
    }

    /// Returns true if the dictionary holds no points.
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    /// Feature dimension of the stored points.
    pub fn dim(&self) -> usize {
        self.points.ncols()
    }

    /// Stored points, one per row.
    pub fn points(&self) -> ArrayView2<'_, f64> {
        self.points.view()
    }

    /// Inclusion probability of each entry.
    pub fn probs(&self) -> &Array1<f64> {
        &self.probs
    }

    /// Multiplicity of each entry.
    pub fn copies(&self) -> &[u64] {
        &self.copies
    }

    /// Initial multiplicity (q̄) and reweighting constant.
    pub fn target_copies(&self) -> u64 {
        self.target_copies
    }

    /// Ridge regularization γ used by the leverage score estimator.
    pub fn regularization(&self) -> f64 {
        self.regularization
    }

    /// Accuracy parameter ε of the leverage score estimator.
    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// Sum of multiplicities over all entries.
    pub fn total_copies(&self) -> u64 {
        self.copies.iter().sum()
    }

    /// Per-entry reweighting `s[i] = sqrt(copies[i] / (probs[i] * target_copies))`.
    pub fn weights(&self) -> Array1<f64> {
        let qbar = self.target_copies as f64;
        self.copies
            .iter()
            .zip(self.probs.iter())
            .map(|(&c, &p)| (c as f64 / (p * qbar)).sqrt())
            .collect()
    }
}
