//! Bottom-up traversal of a merge tree.
//!
//! The scheduler is a single cooperative control loop. Each pass walks the
//! internal nodes and dispatches a merge for every node that is *ready*:
//!
//! - the node has no promise yet, and
//! - both children have finished promises.
//!
//! Readiness is the only thing correctness depends on, so any tree shape
//! works and the walk order only affects how much gets done per pass. Nodes
//! are walked children-first, which lets a synchronous invoker finish the
//! whole tree in one pass.
//!
//! Parallelism, if any, lives in the [`Invoker`]. When a pass dispatches
//! nothing and the root is still open, the loop sleeps for the configured
//! poll interval before scanning again. There is no cancellation and no
//! per-merge timeout: a merge that never finishes stalls the run.
//!
//! Randomness never crosses the invoker boundary as generator state. Once the
//! leaves are initialized the scheduler draws one seed per internal node, in
//! post-order, from its own generator; each job builds a fresh generator from
//! its node's seed. Seeds are tied to nodes rather than to dispatch order, so
//! the root does not depend on when a backend finishes each merge.

use std::ops::Range;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use ndarray::{ArrayView2, Axis};
use rand::Rng;

use crate::config::RunConfig;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::invoker::Invoker;
use crate::kernel::Kernel;
use crate::merge::MergeJob;
use crate::promise::MergePromise;
use crate::tree::{MergeNode, MergeTree, NodeId};

/// Range merge seeds are drawn from.
const SEED_RANGE: Range<u64> = 10..(u32::MAX as u64 - 10);

/// Snapshot of how far a run has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Internal nodes whose merge has not been dispatched.
    pub remaining: usize,
    /// Dispatched merges that have not finished.
    pub running: usize,
    /// Internal nodes in the tree.
    pub total: usize,
}

/// Count dispatched, running and pending merges in `tree`.
pub fn progress(tree: &MergeTree) -> Progress {
    let mut p = Progress::default();
    for node in tree.iter().filter(|n| !n.is_leaf()) {
        p.total += 1;
        match node.promise() {
            None => p.remaining += 1,
            Some(promise) if !promise.is_finished() => p.running += 1,
            Some(_) => {}
        }
    }
    p
}

/// Drives the merges of one tree to completion.
pub struct Scheduler<'a> {
    invoker: &'a dyn Invoker,
    kernel: Arc<dyn Kernel>,
    config: &'a RunConfig,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler dispatching through `invoker`.
    pub fn new(invoker: &'a dyn Invoker, kernel: Arc<dyn Kernel>, config: &'a RunConfig) -> Self {
        Self {
            invoker,
            kernel,
            config,
        }
    }

    /// Initialize the leaves of `tree` from `points`, then merge until the
    /// root finishes, returning the root dictionary.
    ///
    /// The tree is owned by the scheduler for the duration of the call; on
    /// return every internal node holds the promise of its merge.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedTree`] if the tree is not a rooted binary tree, a
    ///   leaf references a row outside `points`, or a node was already
    ///   initialized.
    /// - [`Error::BudgetExceeded`] if a merge would take more than twice
    ///   `max_dict_size` points.
    /// - Any error a merge produced, as soon as its promise finishes.
    pub fn run<R: Rng + ?Sized>(
        &self,
        tree: &mut MergeTree,
        points: ArrayView2<'_, f64>,
        rng: &mut R,
    ) -> Result<Arc<Dictionary>> {
        let _span = tracing::info_span!("visit_merge_tree", nodes = tree.len()).entered();

        tree.validate()?;
        self.init_leaves(tree, points)?;

        let order = tree.post_order();
        let seeds = draw_seeds(tree, &order, rng);
        let total = tree.internal_count();
        let start = Instant::now();
        let mut passes = 0usize;

        loop {
            passes += 1;
            let dispatched = self.dispatch_ready(tree, &order, &seeds)?;

            if let Some(&last) = dispatched.last() {
                let p = progress(tree);
                tracing::info!(
                    remaining = p.remaining,
                    running = p.running,
                    total,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    last_merge = last,
                    "dispatched {} merge(s)",
                    dispatched.len()
                );
            }

            if let Some(outcome) = tree.promise_of(tree.root()).and_then(MergePromise::result) {
                let dict = outcome?;
                tracing::info!(
                    passes,
                    merges = total,
                    size = dict.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "merge tree complete"
                );
                return Ok(dict);
            }

            if dispatched.is_empty() {
                thread::sleep(self.config.poll_interval);
            }
        }
    }

    fn init_leaves(&self, tree: &mut MergeTree, points: ArrayView2<'_, f64>) -> Result<()> {
        let n = points.nrows();
        for id in tree.leaves() {
            let dict = {
                let samples = tree
                    .node(id)
                    .and_then(MergeNode::leaf_samples)
                    .ok_or_else(|| Error::MalformedTree {
                        node: id,
                        reason: "leaf without assigned samples".to_string(),
                    })?;
                if let Some(&bad) = samples.iter().find(|&&i| i >= n) {
                    return Err(Error::MalformedTree {
                        node: id,
                        reason: format!("sample {bad} out of range for {n} rows"),
                    });
                }
                Dictionary::exact(
                    points.select(Axis(0), samples),
                    self.config.target_copies,
                    self.config.regularization,
                    self.config.precision,
                )
            };
            tree.set_promise(id, MergePromise::resolved(dict))?;
        }
        Ok(())
    }

    /// One scan over `order`, dispatching every ready node. Returns the ids
    /// dispatched in this pass.
    fn dispatch_ready(
        &self,
        tree: &mut MergeTree,
        order: &[NodeId],
        seeds: &[u64],
    ) -> Result<Vec<NodeId>> {
        let budget = self.config.merge_budget();
        let mut dispatched = Vec::new();

        for &id in order {
            if let Some(promise) = tree.promise_of(id) {
                if let Some(Err(e)) = promise.result() {
                    return Err(e);
                }
                continue;
            }
            let Some((l, r)) = tree.node(id).and_then(MergeNode::children) else {
                continue;
            };
            let Some((left, right)) = ready_inputs(tree, l, r)? else {
                continue;
            };

            let combined = left.len() + right.len();
            if combined > budget {
                return Err(Error::BudgetExceeded {
                    node: id,
                    combined,
                    limit: budget,
                });
            }

            let seed = seeds[id];
            tracing::debug!(
                node = id,
                left = l,
                right = r,
                left_size = left.len(),
                right_size = right.len(),
                seed,
                "dispatching merge"
            );
            let promise = self.invoker.invoke(MergeJob {
                left,
                right,
                kernel: Arc::clone(&self.kernel),
                seed,
            });
            tree.set_promise(id, promise)?;
            dispatched.push(id);
        }
        Ok(dispatched)
    }
}

/// One seed per internal node, drawn in `order`, indexed by node id. Leaves
/// get 0 and never use it.
fn draw_seeds<R: Rng + ?Sized>(tree: &MergeTree, order: &[NodeId], rng: &mut R) -> Vec<u64> {
    let mut seeds = vec![0; tree.len()];
    for &id in order {
        if tree.node(id).is_some_and(|n| !n.is_leaf()) {
            seeds[id] = rng.random_range(SEED_RANGE);
        }
    }
    seeds
}

/// Both children's dictionaries, if both have finished.
fn ready_inputs(
    tree: &MergeTree,
    l: NodeId,
    r: NodeId,
) -> Result<Option<(Arc<Dictionary>, Arc<Dictionary>)>> {
    let (Some(lp), Some(rp)) = (tree.promise_of(l), tree.promise_of(r)) else {
        return Ok(None);
    };
    if !lp.is_finished() || !rp.is_finished() {
        return Ok(None);
    }
    match (lp.result(), rp.result()) {
        (Some(left), Some(right)) => Ok(Some((left?, right?))),
        _ => Ok(None),
    }
}

/// Run `tree` to completion with the kernel from `config`.
///
/// Convenience wrapper around [`Scheduler`].
pub fn visit_merge_tree<R: Rng + ?Sized>(
    tree: &mut MergeTree,
    points: ArrayView2<'_, f64>,
    invoker: &dyn Invoker,
    config: &RunConfig,
    rng: &mut R,
) -> Result<Arc<Dictionary>> {
    Scheduler::new(invoker, Arc::new(config.kernel), config).run(tree, points, rng)
}
