use thiserror::Error;

/// Errors returned by the clustering engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// A string option did not name any known variant.
    #[error("unknown {name}: {value:?}")]
    UnknownOption {
        /// Option name (e.g. `grow_function`).
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Points in a dataset have inconsistent dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// An input point has a NaN or infinite coordinate.
    #[error("non-finite coordinate in point {index}")]
    NonFiniteCoordinate {
        /// Input index of the offending point.
        index: usize,
    },

    /// Internal consistency check failed. Aborts the run.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A simplex collapsed during the exact containment test.
    ///
    /// Recovered inside the connectivity computation; never returned by `fit`.
    #[error("degenerate geometry in {dim}-dimensional containment test")]
    DegenerateGeometry {
        /// Dimensionality of the offending simplex.
        dim: usize,
    },

    /// A connectivity shard failed; the whole matrix is discarded.
    #[error("connectivity shard {shard} failed: {message}")]
    ShardFailed {
        /// Shard index.
        shard: usize,
        /// Failure reported by the worker.
        message: String,
    },
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
