//! Ridge leverage score estimation for points inside a dictionary.
//!
//! For a dictionary with points D, reweighting `S = diag(s)` and ridge γ, the
//! γ-ridge leverage score of a dictionary point i is
//!
//! ```text
//! τ_i = (1 / s_i²) · [S K S (S K S + γ I)⁻¹]_ii
//!     = (1 - γ · [(S K S + γ I)⁻¹]_ii) / s_i²
//! ```
//!
//! scaled by `(1 - 2ε)` so that estimates stay below the true score with the
//! configured accuracy ε. The second form only holds for points that are in
//! the dictionary, which is the only case the merge needs.
//!
//! The q × q system is inverted densely; q is bounded by twice the configured
//! dictionary cap.

use faer::prelude::*;
use faer::Mat;
use ndarray::Array1;

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::kernel::Kernel;

/// Estimate the ridge leverage score of every entry of `dict`.
///
/// # Errors
///
/// - [`Error::EmptyInput`] if the dictionary is empty.
/// - [`Error::NumericalInstability`] if a reweighting coefficient is not above
///   machine epsilon.
/// - Whatever the kernel returns when it cannot evaluate the points.
pub fn estimate_rls(dict: &Dictionary, kernel: &dyn Kernel) -> Result<Array1<f64>> {
    let q = dict.len();
    if q == 0 {
        return Err(Error::EmptyInput);
    }

    let k = kernel.gram(dict.points(), dict.points())?;
    if k.dim() != (q, q) {
        return Err(Error::DimensionMismatch {
            expected: q,
            found: k.nrows(),
        });
    }

    let s = dict.weights();
    if let Some((index, &value)) = s.iter().enumerate().find(|(_, &v)| !(v > f64::EPSILON)) {
        return Err(Error::NumericalInstability {
            stage: "weights",
            index,
            value,
        });
    }

    let gamma = dict.regularization();
    let m = Mat::<f64>::from_fn(q, q, |i, j| {
        let v = s[i] * k[[i, j]] * s[j];
        if i == j {
            v + gamma
        } else {
            v
        }
    });
    let m_inv = m.full_piv_lu().solve(&Mat::<f64>::identity(q, q));

    let scale = 1.0 - 2.0 * dict.precision();
    Ok((0..q)
        .map(|i| scale * (1.0 - gamma * m_inv[(i, i)]) / (s[i] * s[i]))
        .collect())
}
