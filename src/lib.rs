//! # squeak
//!
//! Merge-and-reduce dictionary sampling by ridge leverage scores.
//!
//! A dataset is cut into chunks, each chunk becomes an exact dictionary, and
//! dictionaries are merged pairwise up a binary tree. Every merge re-estimates
//! the leverage scores of the combined points and thins their copies, so the
//! root dictionary stays small while still approximating the kernel matrix of
//! the whole dataset.
//!
//! The merge is the only numerical step ([`merge`], [`estimate_rls`]). How
//! merges are arranged ([`TreeShape`]), scheduled ([`Scheduler`]) and executed
//! ([`Invoker`]) are separate concerns:
//!
//! - [`squeak`]: a sequential tree, one merge at a time.
//! - [`disqueak`]: a balanced tree, independent merges running concurrently
//!   on a worker pool when the configured invoker allows it.
//!
//! ```no_run
//! use ndarray::Array2;
//! use squeak::{disqueak, InvokerOptions, KernelFn, RunConfig};
//!
//! let points = Array2::<f64>::zeros((1000, 2));
//! let config = RunConfig::new()
//!     .with_max_dict_size(200)
//!     .with_kernel(KernelFn::Rbf { gamma: 0.5 })
//!     .with_invoker(InvokerOptions::pool(4));
//! let dict = disqueak(points.view(), &config, 42)?;
//! println!("{} atoms, {} copies", dict.len(), dict.total_copies());
//! # Ok::<(), squeak::Error>(())
//! ```

pub mod config;
pub mod dictionary;
/// Error types used across `squeak`.
pub mod error;
pub mod invoker;
pub mod kernel;
pub mod merge;
pub mod pipeline;
pub mod promise;
pub mod rls;
pub mod scheduler;
pub mod tree;

pub use config::RunConfig;
pub use dictionary::Dictionary;
pub use error::{Error, Result};
pub use invoker::{Backend, Invoker, InvokerOptions, PoolInvoker, SyncInvoker};
pub use kernel::{Kernel, KernelFn};
pub use merge::{merge, MergeJob, MergePayload};
pub use pipeline::{disqueak, squeak, MergeReduce, DEFAULT_SEED};
pub use promise::{MergeOutcome, MergePromise, PromiseSlot};
pub use rls::estimate_rls;
pub use scheduler::{progress, visit_merge_tree, Progress, Scheduler};
pub use tree::{MergeNode, MergeTree, NodeId, TreeShape};
