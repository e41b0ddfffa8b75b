//! Kernel functions used as the similarity between samples.
//!
//! A kernel only has to produce a matrix of pairwise similarities between two
//! batches of points. When called on one batch against itself the result must
//! be symmetric positive semi-definite; this is a property of the function and
//! is not re-checked by the leverage score estimator.
//!
//! Parameter names follow the usual `pairwise_kernels` conventions:
//!
//! | Kernel | k(x, y) |
//! |--------|---------|
//! | Linear | ⟨x, y⟩ |
//! | Rbf | exp(-γ ‖x - y‖²) |
//! | Laplacian | exp(-γ ‖x - y‖₁) |
//! | Polynomial | (γ ⟨x, y⟩ + c₀)^d |

use core::fmt;

use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use crate::error::{Error, Result};

/// A symmetric positive semi-definite similarity over feature vectors.
pub trait Kernel: Send + Sync + fmt::Debug {
    /// Pairwise similarities between the rows of `x` and the rows of `y`.
    ///
    /// Returns an `x.nrows() × y.nrows()` matrix.
    fn gram(&self, x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    /// The built-in kernel this is, if any. Only built-in kernels can be
    /// described by value, e.g. to ship a merge to another process.
    fn builtin(&self) -> Option<KernelFn> {
        None
    }
}

/// Built-in kernels with their named parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum KernelFn {
    /// Plain inner product.
    #[default]
    Linear,
    /// Gaussian kernel with inverse squared bandwidth `gamma`.
    Rbf {
        /// Inverse squared bandwidth.
        gamma: f64,
    },
    /// Exponential of the negative L1 distance.
    Laplacian {
        /// Inverse bandwidth.
        gamma: f64,
    },
    /// Inhomogeneous polynomial kernel.
    Polynomial {
        /// Degree of the polynomial.
        degree: i32,
        /// Scale applied to the inner product.
        gamma: f64,
        /// Additive constant.
        coef0: f64,
    },
}

impl KernelFn {
    /// Gaussian kernel parameterized by its bandwidth σ, i.e. `γ = 1 / (2σ²)`.
    pub fn rbf_with_sigma(sigma: f64) -> Self {
        KernelFn::Rbf {
            gamma: 1.0 / (2.0 * sigma * sigma),
        }
    }

    /// Check the named parameters.
    pub fn validate(&self) -> Result<()> {
        match *self {
            KernelFn::Linear => Ok(()),
            KernelFn::Rbf { gamma } | KernelFn::Laplacian { gamma } => {
                if gamma.is_finite() && gamma > 0.0 {
                    Ok(())
                } else {
                    Err(Error::InvalidParameter {
                        name: "gamma",
                        message: "must be finite and > 0",
                    })
                }
            }
            KernelFn::Polynomial {
                degree,
                gamma,
                coef0,
            } => {
                if degree < 1 {
                    return Err(Error::InvalidParameter {
                        name: "degree",
                        message: "must be >= 1",
                    });
                }
                if !(gamma.is_finite() && gamma > 0.0) {
                    return Err(Error::InvalidParameter {
                        name: "gamma",
                        message: "must be finite and > 0",
                    });
                }
                if !(coef0.is_finite() && coef0 >= 0.0) {
                    return Err(Error::InvalidParameter {
                        name: "coef0",
                        message: "must be finite and >= 0",
                    });
                }
                Ok(())
            }
        }
    }

    #[inline]
    fn eval(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match *self {
            KernelFn::Linear => a.dot(&b),
            KernelFn::Rbf { gamma } => {
                let d2: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * d2).exp()
            }
            KernelFn::Laplacian { gamma } => {
                let d1: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
                (-gamma * d1).exp()
            }
            KernelFn::Polynomial {
                degree,
                gamma,
                coef0,
            } => (gamma * a.dot(&b) + coef0).powi(degree),
        }
    }
}

impl Kernel for KernelFn {
    fn gram(&self, x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if x.ncols() != y.ncols() {
            return Err(Error::DimensionMismatch {
                expected: x.ncols(),
                found: y.ncols(),
            });
        }
        if let KernelFn::Linear = self {
            return Ok(x.dot(&y.t()));
        }
        // Rows in parallel; each entry is evaluated exactly as in a serial
        // loop, so the result does not depend on the thread count.
        let values: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .flat_map_iter(|i| {
                let xi = x.row(i);
                y.outer_iter().map(move |yj| self.eval(xi, yj))
            })
            .collect();
        Array2::from_shape_vec((x.nrows(), y.nrows()), values)
            .map_err(|e| Error::Other(e.to_string()))
    }

    fn builtin(&self) -> Option<KernelFn> {
        Some(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn linear_gram_is_inner_products() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let k = KernelFn::Linear.gram(x.view(), x.view()).unwrap();
        assert_eq!(k, array![[5.0, 11.0], [11.0, 25.0]]);
    }

    #[test]
    fn rbf_gram_is_symmetric_with_unit_diagonal() {
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0]];
        let k = KernelFn::Rbf { gamma: 0.5 }
            .gram(x.view(), x.view())
            .unwrap();
        for i in 0..3 {
            assert!((k[[i, i]] - 1.0).abs() < 1e-12);
            for j in 0..3 {
                assert!((k[[i, j]] - k[[j, i]]).abs() < 1e-12);
            }
        }
        assert!((k[[0, 1]] - (-0.5f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn rbf_with_sigma_matches_gamma() {
        assert_eq!(KernelFn::rbf_with_sigma(1.0), KernelFn::Rbf { gamma: 0.5 });
    }

    #[test]
    fn polynomial_and_laplacian_values() {
        let x = array![[1.0, 1.0]];
        let y = array![[2.0, 0.0]];
        let p = KernelFn::Polynomial {
            degree: 2,
            gamma: 1.0,
            coef0: 1.0,
        }
        .gram(x.view(), y.view())
        .unwrap();
        assert!((p[[0, 0]] - 9.0).abs() < 1e-12);

        let l = KernelFn::Laplacian { gamma: 1.0 }
            .gram(x.view(), y.view())
            .unwrap();
        assert!((l[[0, 0]] - (-2.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn rectangular_gram_shape() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![[0.5], [1.5]];
        let k = KernelFn::Linear.gram(x.view(), y.view()).unwrap();
        assert_eq!(k.dim(), (3, 2));
    }

    #[test]
    fn dimension_mismatch_errors() {
        let x = array![[0.0, 1.0]];
        let y = array![[0.0, 1.0, 2.0]];
        let err = KernelFn::Rbf { gamma: 1.0 }
            .gram(x.view(), y.view())
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn row_parallel_gram_matches_pointwise_evaluation() {
        let x = Array2::from_shape_fn((37, 4), |(i, j)| ((i * 7 + j * 3) % 11) as f64 * 0.3);
        let y = Array2::from_shape_fn((23, 4), |(i, j)| ((i * 5 + j) % 13) as f64 * 0.2 - 1.0);
        for kernel in [
            KernelFn::Rbf { gamma: 0.7 },
            KernelFn::Laplacian { gamma: 0.4 },
            KernelFn::Polynomial {
                degree: 3,
                gamma: 0.5,
                coef0: 1.0,
            },
        ] {
            let k = kernel.gram(x.view(), y.view()).unwrap();
            assert_eq!(k.dim(), (37, 23));
            for (i, xi) in x.outer_iter().enumerate() {
                for (j, yj) in y.outer_iter().enumerate() {
                    assert_eq!(k[[i, j]], kernel.eval(xi, yj), "{kernel:?} at ({i}, {j})");
                }
            }
        }
    }

    #[test]
    fn builtin_kernels_describe_themselves() {
        let k = KernelFn::Laplacian { gamma: 2.0 };
        assert_eq!(k.builtin(), Some(k));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(KernelFn::Rbf { gamma: 0.0 }.validate().is_err());
        assert!(KernelFn::Laplacian { gamma: f64::NAN }.validate().is_err());
        assert!(KernelFn::Polynomial {
            degree: 0,
            gamma: 1.0,
            coef0: 0.0
        }
        .validate()
        .is_err());
        assert!(KernelFn::Linear.validate().is_ok());
    }
}
