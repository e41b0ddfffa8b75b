//! Execution backends for merges.
//!
//! The scheduler only needs `invoke(job) -> MergePromise`, returning
//! immediately. Which backend runs the job is a configuration choice:
//!
//! | Options | Invoker | Promise |
//! |---------|---------|---------|
//! | `Local`, synchronous | [`SyncInvoker`] | resolved on return |
//! | `Local`, asynchronous | [`PoolInvoker`] | pending |
//! | `Queue` | [`PoolInvoker`] | pending |
//! | `Cluster` | (external) | [`Error::UnsupportedBackend`] |
//!
//! A remote transport can be plugged in by implementing [`Invoker`] directly;
//! [`MergeJob`] is self-contained (inputs, kernel and seed) for that purpose.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};
use crate::merge::MergeJob;
use crate::promise::MergePromise;

/// Something that can run a merge and hand back a promise for it.
pub trait Invoker: Send + Sync {
    /// Start `job` and return a promise for its outcome without waiting.
    fn invoke(&self, job: MergeJob) -> MergePromise;
}

/// Runs every merge inline on the calling thread.
///
/// Used for single-process and debug runs; every promise it returns is
/// already finished.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncInvoker;

impl Invoker for SyncInvoker {
    fn invoke(&self, job: MergeJob) -> MergePromise {
        MergePromise::from_outcome(job.run())
    }
}

/// Runs merges on a dedicated `rayon` thread pool.
///
/// A job that panics is reported through the pool's panic handler and its
/// promise stays pending forever; the scheduler does not retry it.
#[derive(Debug)]
pub struct PoolInvoker {
    pool: ThreadPool,
}

impl PoolInvoker {
    /// Create a pool with `threads` workers (0 lets rayon decide).
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("squeak-merge-{i}"))
            .panic_handler(|_| {
                tracing::error!("merge worker panicked; its tree node will never finish");
            })
            .build()
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Invoker for PoolInvoker {
    fn invoke(&self, job: MergeJob) -> MergePromise {
        let (promise, slot) = MergePromise::pending();
        self.pool.spawn(move || {
            let outcome = job.run().map(Arc::new);
            slot.fulfill(outcome);
        });
        promise
    }
}

/// Where merges are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Backend {
    /// This process.
    #[default]
    Local,
    /// An in-process job queue drained by worker threads.
    Queue,
    /// A remote worker cluster reached at `address`.
    Cluster,
}

impl Backend {
    /// Lower-case name, as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Queue => "queue",
            Backend::Cluster => "cluster",
        }
    }
}

/// Options selecting and configuring the invoker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InvokerOptions {
    /// Which backend runs the merges.
    pub backend: Backend,
    /// Host and port of the backend, for remote backends.
    pub address: String,
    /// Run merges inline instead of dispatching them (local backend only).
    pub synchronous: bool,
    /// Worker threads for pool-backed invokers (0 = one per core).
    pub threads: usize,
}

impl Default for InvokerOptions {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            address: "localhost".to_string(),
            synchronous: true,
            threads: 0,
        }
    }
}

impl InvokerOptions {
    /// Synchronous local execution.
    pub fn local() -> Self {
        Self::default()
    }

    /// Asynchronous execution on an in-process worker pool.
    pub fn pool(threads: usize) -> Self {
        Self {
            backend: Backend::Queue,
            synchronous: false,
            threads,
            ..Self::default()
        }
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Set the backend address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Choose synchronous or asynchronous execution.
    pub fn with_synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    /// Set the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Construct the invoker these options describe.
    pub fn build(&self) -> Result<Box<dyn Invoker>> {
        tracing::debug!(
            backend = self.backend.name(),
            address = %self.address,
            synchronous = self.synchronous,
            threads = self.threads,
            "building invoker"
        );
        match self.backend {
            Backend::Local if self.synchronous => Ok(Box::new(SyncInvoker)),
            Backend::Local | Backend::Queue => Ok(Box::new(PoolInvoker::new(self.threads)?)),
            Backend::Cluster => Err(Error::UnsupportedBackend {
                backend: self.backend.name(),
            }),
        }
    }
}
