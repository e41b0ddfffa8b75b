//! Run configuration.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::invoker::InvokerOptions;
use crate::kernel::KernelFn;

/// Parameters fixed for a whole merge-and-reduce run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RunConfig {
    /// Initial multiplicity q̄ of every admitted point.
    pub target_copies: u64,
    /// Ridge regularization γ of the leverage scores.
    pub regularization: f64,
    /// Accuracy ε of the leverage score estimates, in `[0, 0.5)`.
    pub precision: f64,
    /// Chunk size, and half the largest merge input the scheduler accepts.
    pub max_dict_size: usize,
    /// Similarity between samples.
    pub kernel: KernelFn,
    /// Execution backend for merges.
    pub invoker: InvokerOptions,
    /// Idle wait between scheduler passes that dispatched nothing.
    pub poll_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_copies: 10,
            regularization: 1.0,
            precision: 0.1,
            max_dict_size: 1000,
            kernel: KernelFn::Linear,
            invoker: InvokerOptions::default(),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl RunConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial multiplicity q̄.
    pub fn with_target_copies(mut self, target_copies: u64) -> Self {
        self.target_copies = target_copies;
        self
    }

    /// Set the ridge regularization γ.
    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    /// Set the estimator accuracy ε.
    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    /// Set the chunk size / dictionary cap.
    pub fn with_max_dict_size(mut self, max_dict_size: usize) -> Self {
        self.max_dict_size = max_dict_size;
        self
    }

    /// Set the kernel.
    pub fn with_kernel(mut self, kernel: KernelFn) -> Self {
        self.kernel = kernel;
        self
    }

    /// Set the invoker options.
    pub fn with_invoker(mut self, invoker: InvokerOptions) -> Self {
        self.invoker = invoker;
        self
    }

    /// Set the scheduler's idle wait.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Largest combined size of two dictionaries a merge may take.
    pub fn merge_budget(&self) -> usize {
        self.max_dict_size.saturating_mul(2)
    }

    /// Check every parameter.
    pub fn validate(&self) -> Result<()> {
        if self.target_copies == 0 {
            return Err(Error::InvalidParameter {
                name: "target_copies",
                message: "must be > 0",
            });
        }
        if !(self.regularization.is_finite() && self.regularization > 0.0) {
            return Err(Error::InvalidParameter {
                name: "regularization",
                message: "must be finite and > 0",
            });
        }
        if !(0.0..0.5).contains(&self.precision) {
            return Err(Error::InvalidParameter {
                name: "precision",
                message: "must lie in [0, 0.5)",
            });
        }
        if self.max_dict_size == 0 {
            return Err(Error::InvalidParameter {
                name: "max_dict_size",
                message: "must be > 0",
            });
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidParameter {
                name: "poll_interval",
                message: "must be > 0",
            });
        }
        self.kernel.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
        assert_eq!(RunConfig::new().merge_budget(), 2000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad = [
            RunConfig::new().with_target_copies(0),
            RunConfig::new().with_regularization(0.0),
            RunConfig::new().with_regularization(f64::INFINITY),
            RunConfig::new().with_precision(0.5),
            RunConfig::new().with_precision(-0.1),
            RunConfig::new().with_max_dict_size(0),
            RunConfig::new().with_poll_interval(Duration::ZERO),
            RunConfig::new().with_kernel(KernelFn::Rbf { gamma: -1.0 }),
        ];
        for cfg in bad {
            assert!(
                matches!(cfg.validate(), Err(Error::InvalidParameter { .. })),
                "{cfg:?}"
            );
        }
    }

    #[test]
    fn builder_sets_fields() {
        let cfg = RunConfig::new()
            .with_target_copies(3)
            .with_regularization(0.2)
            .with_precision(0.0)
            .with_max_dict_size(64)
            .with_kernel(KernelFn::Laplacian { gamma: 2.0 })
            .with_invoker(InvokerOptions::pool(2))
            .with_poll_interval(Duration::from_millis(5));
        assert_eq!(cfg.target_copies, 3);
        assert_eq!(cfg.max_dict_size, 64);
        assert_eq!(cfg.invoker.threads, 2);
        assert!(cfg.validate().is_ok());
    }
}
