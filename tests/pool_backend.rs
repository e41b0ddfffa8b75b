use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use squeak::{
    disqueak, progress, visit_merge_tree, Backend, Error, Invoker, InvokerOptions, KernelFn,
    MergeJob, MergePromise, MergeReduce, MergeTree, PoolInvoker, Progress, RunConfig,
    SyncInvoker, TreeShape,
};

fn ring(n: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(8);
    Array2::from_shape_fn((n, 2), |(i, j)| {
        let t = i as f64 / n as f64 * std::f64::consts::TAU;
        let r = 2.0 + rng.random_range(-0.2..0.2);
        if j == 0 {
            r * t.cos()
        } else {
            r * t.sin()
        }
    })
}

fn pool_config(threads: usize) -> RunConfig {
    RunConfig::new()
        .with_max_dict_size(100)
        .with_target_copies(5)
        .with_regularization(0.5)
        .with_precision(0.1)
        .with_kernel(KernelFn::Rbf { gamma: 0.5 })
        .with_invoker(InvokerOptions::pool(threads))
        .with_poll_interval(Duration::from_millis(2))
}

#[test]
fn disqueak_on_a_worker_pool() {
    let pts = ring(800);
    let dict = disqueak(pts.view(), &pool_config(4), 42).unwrap();
    assert!(!dict.is_empty());
    assert!(dict.len() <= 800);
    assert!(dict.copies().iter().all(|&c| (1..=5).contains(&c)));
    assert!(dict.probs().iter().all(|&p| p > 0.0 && p <= 1.0));
}

#[test]
fn local_asynchronous_backend_uses_the_pool() {
    let pts = ring(300);
    let mut config = pool_config(2);
    config.invoker = InvokerOptions::local().with_synchronous(false).with_threads(2);
    assert_eq!(config.invoker.backend, Backend::Local);
    let dict = disqueak(pts.view(), &config, 3).unwrap();
    assert!(!dict.is_empty());
}

/// Completes every job on a background thread after a delay, out of
/// dispatch order.
struct SlowInvoker {
    calls: Arc<AtomicUsize>,
}

impl Invoker for SlowInvoker {
    fn invoke(&self, job: MergeJob) -> MergePromise {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let (promise, slot) = MergePromise::pending();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5 * (4 - (n % 4) as u64)));
            slot.fulfill(job.run().map(Arc::new));
        });
        promise
    }
}

/// Finishes jobs in dispatch order, or in the reverse of it.
struct OrderedInvoker {
    reverse: bool,
    calls: AtomicUsize,
}

impl OrderedInvoker {
    fn new(reverse: bool) -> Self {
        Self {
            reverse,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Invoker for OrderedInvoker {
    fn invoke(&self, job: MergeJob) -> MergePromise {
        let n = (self.calls.fetch_add(1, Ordering::SeqCst) % 8) as u64;
        let delay = if self.reverse { 8 - n } else { n + 1 };
        let (promise, slot) = MergePromise::pending();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(3 * delay));
            slot.fulfill(job.run().map(Arc::new));
        });
        promise
    }
}

#[test]
fn completion_order_does_not_change_the_root() {
    let pts = ring(800);
    let runner = MergeReduce::new(pool_config(1))
        .with_shape(TreeShape::Balanced)
        .with_seed(42);
    let forward = runner
        .run_with_invoker(pts.view(), &OrderedInvoker::new(false))
        .unwrap();
    let reverse = runner
        .run_with_invoker(pts.view(), &OrderedInvoker::new(true))
        .unwrap();
    let inline = runner.run_with_invoker(pts.view(), &SyncInvoker).unwrap();
    assert_eq!(forward, reverse);
    assert_eq!(forward, inline);
}

#[test]
fn hand_built_tree_with_slow_merges() {
    // 0 -> [1, 2], 1 -> [3, 4], 2 -> [5, 6], 6 -> [7, 8]
    let children = vec![
        vec![1, 2],
        vec![3, 4],
        vec![5, 6],
        vec![],
        vec![],
        vec![],
        vec![7, 8],
        vec![],
        vec![],
    ];
    let leaves: HashMap<usize, Vec<usize>> = [
        (3, (0..40).collect()),
        (4, (40..80).collect()),
        (5, (80..120).collect()),
        (7, (120..160).collect()),
        (8, (160..200).collect()),
    ]
    .into_iter()
    .collect();
    let mut tree = MergeTree::from_children(&children, leaves).unwrap();
    assert_eq!(tree.root(), 0);
    assert_eq!(tree.depth(), 3);

    let pts = ring(200);
    let config = pool_config(1).with_max_dict_size(200);
    let calls = Arc::new(AtomicUsize::new(0));
    let invoker = SlowInvoker {
        calls: Arc::clone(&calls),
    };
    let mut rng = StdRng::seed_from_u64(0);
    let root = visit_merge_tree(&mut tree, pts.view(), &invoker, &config, &mut rng).unwrap();

    assert!(!root.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(
        progress(&tree),
        Progress {
            remaining: 0,
            running: 0,
            total: 4
        }
    );
}

#[test]
fn malformed_adjacency_is_rejected() {
    let leaves: HashMap<usize, Vec<usize>> = [(1, vec![0]), (2, vec![1])].into_iter().collect();
    // Node 0 has three children.
    let err = MergeTree::from_children(&[vec![1, 2, 1], vec![], vec![]], leaves).unwrap_err();
    assert!(matches!(err, Error::MalformedTree { node: 0, .. }));
}

#[test]
fn pool_threads_are_configurable() {
    let pool = PoolInvoker::new(3).unwrap();
    assert_eq!(pool.threads(), 3);
}
