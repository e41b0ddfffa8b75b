//! Dictionary merge: concatenate, re-estimate leverage, thin out.
//!
//! A merge never grows a probability. If the leverage score of a point went
//! up since its last merge the increase is approximation error, so the new
//! probability is `min(τ, p)`. Copies are then thinned sequentially with
//! `Binomial(copies, p_new / p_old)`, which keeps the marginal inclusion
//! probability of every original sample equal to its current `p` no matter
//! how many merges it went through.

use std::sync::Arc;

use rand::prelude::*;
use rand_distr::Binomial;

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelFn};
use crate::rls::estimate_rls;

/// Merge two dictionaries and resample the union.
///
/// Deterministic given the draws of `rng`. The output never holds more
/// entries than `left.len() + right.len()`.
///
/// # Errors
///
/// [`Error::NumericalInstability`] if any estimated score is not above
/// machine epsilon, plus any error from [`estimate_rls`].
pub fn merge<R: Rng + ?Sized>(
    left: &Dictionary,
    right: &Dictionary,
    kernel: &dyn Kernel,
    rng: &mut R,
) -> Result<Dictionary> {
    let _span = tracing::trace_span!("merge", left = left.len(), right = right.len()).entered();

    let candidate = Dictionary::concat(left, right)?;
    let tau = estimate_rls(&candidate, kernel)?;

    if let Some((index, &value)) = tau.iter().enumerate().find(|(_, &t)| !(t > f64::EPSILON)) {
        return Err(Error::NumericalInstability {
            stage: "rls",
            index,
            value,
        });
    }

    let mut probs = Vec::with_capacity(candidate.len());
    let mut copies = Vec::with_capacity(candidate.len());
    for ((&t, &p), &c) in tau
        .iter()
        .zip(candidate.probs().iter())
        .zip(candidate.copies().iter())
    {
        let new_prob = t.min(p);
        let thinning =
            Binomial::new(c, new_prob / p).map_err(|e| Error::Other(e.to_string()))?;
        copies.push(thinning.sample(rng));
        probs.push(new_prob);
    }

    let out = candidate.resampled(&probs, &copies);
    tracing::debug!(q0 = candidate.len(), q = out.len(), "merge resampled");
    Ok(out)
}

/// A self-contained merge request, ready to be handed to an invoker.
///
/// The job carries a seed rather than a generator: whoever runs it builds a
/// fresh [`StdRng`] from the seed, so the outcome does not depend on where or
/// when the job executes.
#[derive(Debug, Clone)]
pub struct MergeJob {
    /// Dictionary of the left child.
    pub left: Arc<Dictionary>,
    /// Dictionary of the right child.
    pub right: Arc<Dictionary>,
    /// Similarity used for leverage estimation.
    pub kernel: Arc<dyn Kernel>,
    /// Seed for the job-local generator.
    pub seed: u64,
}

impl MergeJob {
    /// Execute the merge with a generator seeded from `self.seed`.
    pub fn run(&self) -> Result<Dictionary> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        merge(&self.left, &self.right, self.kernel.as_ref(), &mut rng)
    }

    /// The owned, by-value form of this job.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the job uses a custom kernel, which
    /// cannot be described by value.
    pub fn to_payload(&self) -> Result<MergePayload> {
        let kernel = self.kernel.builtin().ok_or(Error::InvalidParameter {
            name: "kernel",
            message: "only built-in kernels can be shipped",
        })?;
        Ok(MergePayload {
            left: Dictionary::clone(&self.left),
            right: Dictionary::clone(&self.right),
            kernel,
            seed: self.seed,
        })
    }
}

/// A [`MergeJob`] with everything held by value.
///
/// This is what a remote invoker sends over the wire: with the `serde`
/// feature it serializes, and the receiving side calls [`MergePayload::run`]
/// or turns it back into a job. Both give the same dictionary as running the
/// original job.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergePayload {
    /// Dictionary of the left child.
    pub left: Dictionary,
    /// Dictionary of the right child.
    pub right: Dictionary,
    /// Similarity used for leverage estimation.
    pub kernel: KernelFn,
    /// Seed for the job-local generator.
    pub seed: u64,
}

impl MergePayload {
    /// Execute the merge with a generator seeded from `self.seed`.
    pub fn run(&self) -> Result<Dictionary> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        merge(&self.left, &self.right, &self.kernel, &mut rng)
    }
}

impl From<MergePayload> for MergeJob {
    fn from(payload: MergePayload) -> Self {
        MergeJob {
            left: Arc::new(payload.left),
            right: Arc::new(payload.right),
            kernel: Arc::new(payload.kernel),
            seed: payload.seed,
        }
    }
}
