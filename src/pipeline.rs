//! End-to-end runs: chunk a dataset, build a tree, merge to the root.
//!
//! ```text
//! points (n × d)
//!   └─ random permutation, split into k chunks of ≤ max_dict_size rows
//!        └─ TreeShape::build  → MergeTree
//!             └─ Scheduler::run (via the configured invoker) → root Dictionary
//! ```
//!
//! [`squeak`] uses the sequential shape, [`disqueak`] the balanced one. Both
//! are thin wrappers over [`MergeReduce`].

use std::sync::Arc;

use ndarray::ArrayView2;
use rand::prelude::*;

use crate::config::RunConfig;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::invoker::Invoker;
use crate::kernel::Kernel;
use crate::scheduler::Scheduler;
use crate::tree::{chunk_indices, TreeShape};

/// Seed used when none is given.
pub const DEFAULT_SEED: u64 = 42;

/// A configured merge-and-reduce run.
///
/// ```no_run
/// use ndarray::Array2;
/// use squeak::{MergeReduce, RunConfig, TreeShape};
///
/// let points = Array2::<f64>::zeros((10, 2));
/// let dict = MergeReduce::new(RunConfig::default())
///     .with_shape(TreeShape::Balanced)
///     .with_seed(7)
///     .run(points.view())?;
/// # Ok::<(), squeak::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MergeReduce {
    config: RunConfig,
    shape: TreeShape,
    seed: u64,
    kernel: Option<Arc<dyn Kernel>>,
}

impl MergeReduce {
    /// A sequential run with seed [`DEFAULT_SEED`].
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            shape: TreeShape::default(),
            seed: DEFAULT_SEED,
            kernel: None,
        }
    }

    /// Set the tree shape.
    pub fn with_shape(mut self, shape: TreeShape) -> Self {
        self.shape = shape;
        self
    }

    /// Set the seed of the run generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Use a custom kernel instead of `config.kernel`.
    pub fn with_kernel(mut self, kernel: Arc<dyn Kernel>) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run with the invoker described by `config.invoker`.
    pub fn run(&self, points: ArrayView2<'_, f64>) -> Result<Dictionary> {
        self.config.validate()?;
        let invoker = self.config.invoker.build()?;
        self.run_with_invoker(points, invoker.as_ref())
    }

    /// Run with a caller-supplied invoker; `config.invoker` is ignored.
    pub fn run_with_invoker(
        &self,
        points: ArrayView2<'_, f64>,
        invoker: &dyn Invoker,
    ) -> Result<Dictionary> {
        self.config.validate()?;
        let n = points.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let k = self.shape.chunk_count(n, self.config.max_dict_size);
        let chunks = chunk_indices(n, k, &mut rng);
        let mut tree = self.shape.build(chunks)?;
        tracing::info!(
            rows = n,
            dim = points.ncols(),
            chunks = k,
            shape = ?self.shape,
            depth = tree.depth(),
            seed = self.seed,
            "starting merge-reduce"
        );

        let kernel = self
            .kernel
            .clone()
            .unwrap_or_else(|| Arc::new(self.config.kernel) as Arc<dyn Kernel>);
        let root = Scheduler::new(invoker, kernel, &self.config).run(&mut tree, points, &mut rng)?;
        drop(tree);
        Ok(Arc::unwrap_or_clone(root))
    }
}

/// Sequential merge-and-reduce: fold chunks into one running dictionary.
pub fn squeak(points: ArrayView2<'_, f64>, config: &RunConfig, seed: u64) -> Result<Dictionary> {
    MergeReduce::new(config.clone())
        .with_shape(TreeShape::Sequential)
        .with_seed(seed)
        .run(points)
}

/// Distributed merge-and-reduce: merge chunks pairwise up a balanced tree.
pub fn disqueak(points: ArrayView2<'_, f64>, config: &RunConfig, seed: u64) -> Result<Dictionary> {
    MergeReduce::new(config.clone())
        .with_shape(TreeShape::Balanced)
        .with_seed(seed)
        .run(points)
}
