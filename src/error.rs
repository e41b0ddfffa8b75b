use core::fmt;

/// Result alias for `squeak`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by dictionary merges, tree construction and scheduling.
///
/// Every variant is fatal for the run that produced it: the scheduler never
/// retries a merge and never returns a partial dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// Feature dimension mismatch between two batches of points.
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// A quantity that must be strictly positive collapsed to (near) zero.
    ///
    /// Usually means `regularization` (or the kernel bandwidth) is too large
    /// relative to the scale of the data.
    NumericalInstability {
        /// Which computation produced the value (`"weights"`, `"rls"`, ...).
        stage: &'static str,
        /// Dictionary position of the offending entry.
        index: usize,
        /// The offending value.
        value: f64,
    },

    /// A merge would combine more points than twice the configured cap.
    BudgetExceeded {
        /// Tree node whose merge was refused.
        node: usize,
        /// Combined size of the two child dictionaries.
        combined: usize,
        /// Twice the configured `max_dict_size`.
        limit: usize,
    },

    /// The merge tree is not a single rooted binary tree.
    MalformedTree {
        /// Node where the problem was detected.
        node: usize,
        /// Description of the problem.
        reason: String,
    },

    /// The requested execution backend is not available in-process.
    UnsupportedBackend {
        /// Backend name.
        backend: &'static str,
    },

    /// Generic error with message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::NumericalInstability {
                stage,
                index,
                value,
            } => write!(
                f,
                "numerical instability in {stage}: entry {index} is {value:e}, \
                 regularization may be too large for the data scale"
            ),
            Error::BudgetExceeded {
                node,
                combined,
                limit,
            } => write!(
                f,
                "merge at node {node} would hold {combined} points, above the limit of {limit}"
            ),
            Error::MalformedTree { node, reason } => {
                write!(f, "malformed merge tree at node {node}: {reason}")
            }
            Error::UnsupportedBackend { backend } => {
                write!(f, "backend '{backend}' needs an external transport")
            }
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
