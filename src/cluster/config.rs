//! Clusterer configuration.
//!
//! Everything the engine needs lives in [`CubeParams`], owned by each
//! [`Clusterer`](super::Clusterer) instance. String-valued options parse through
//! [`FromStr`], so callers holding text configuration can use
//! [`Clusterer::configure`](super::Clusterer::configure).

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Growth policy used by [`Cluster::grow`](super::Cluster::grow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrowFunction {
    /// Increment scaled inversely with point density.
    Density,
    /// Fixed increment, elongated by `elongate_grow` along the principal axis.
    #[default]
    Normal,
}

impl FromStr for GrowFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "density" => Ok(Self::Density),
            "normal" => Ok(Self::Normal),
            _ => Err(Error::UnknownOption {
                name: "grow_function",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for GrowFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Density => "density",
            Self::Normal => "normal",
        })
    }
}

/// Where the pairwise connectivity tests run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// On the calling thread.
    #[default]
    Sequential,
    /// On a dedicated rayon thread pool.
    ProcessPool,
    /// As shard tasks shipped to independent workers over channels.
    Distributed,
}

impl FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "sequential" => Ok(Self::Sequential),
            "process-pool" | "processpool" | "pool" => Ok(Self::ProcessPool),
            "distributed" => Ok(Self::Distributed),
            _ => Err(Error::UnknownOption {
                name: "execution_mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sequential => "sequential",
            Self::ProcessPool => "process-pool",
            Self::Distributed => "distributed",
        })
    }
}

/// Implementation of the exact point-in-volume test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainmentKernel {
    /// Project into the volume's frame and compare half extents.
    #[default]
    Projected,
    /// Delaunay triangulation of the volume's vertices plus barycentric tests.
    Simplex,
}

impl FromStr for ContainmentKernel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "projected" => Ok(Self::Projected),
            "simplex" | "delaunay" => Ok(Self::Simplex),
            _ => Err(Error::UnknownOption {
                name: "kernel",
                value: s.to_string(),
            }),
        }
    }
}

/// Clusterer parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeParams {
    /// Adjacency tolerance, and the margin kept around every member.
    pub epsilon: f64,

    /// Growth learning-rate multiplier.
    pub lr: f64,

    /// Hard cap on grow/connect/merge iterations.
    pub max_iter: usize,

    /// Angular cutoff between centroid directions, in radians.
    ///
    /// `None` disables the prune. Only meaningful when clusters radiate from the
    /// coordinate origin (sky-survey style data).
    pub limit_radian: Option<f64>,

    /// Growth steps after which a cluster is forced complete.
    pub grow_limit: usize,

    /// Principal-axis elongation factor for [`GrowFunction::Normal`].
    pub elongate_grow: f64,

    /// Growth policy.
    pub grow_function: GrowFunction,

    /// Minimum cluster-count reduction per iteration to keep going; `0` disables.
    ///
    /// Also the extent change below which a growth step counts as stalled.
    pub min_diff: f64,

    /// Connectivity execution strategy.
    pub execution_mode: ExecutionMode,

    /// Exact containment implementation.
    pub kernel: ContainmentKernel,

    /// Worker count for the parallel modes; `None` uses rayon's default.
    pub workers: Option<usize>,

    /// Row shards created per worker.
    pub shards_per_worker: usize,
}

impl Default for CubeParams {
    fn default() -> Self {
        Self {
            epsilon: 0.5,
            lr: 1.0,
            max_iter: 100,
            limit_radian: None,
            grow_limit: 10,
            elongate_grow: 2.0,
            grow_function: GrowFunction::Normal,
            min_diff: 0.0,
            execution_mode: ExecutionMode::Sequential,
            kernel: ContainmentKernel::Projected,
            workers: None,
            shards_per_worker: 4,
        }
    }
}

impl CubeParams {
    /// Set epsilon.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the growth learning rate.
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Enable the angular prune with the given cutoff.
    pub fn with_limit_radian(mut self, limit_radian: f64) -> Self {
        self.limit_radian = Some(limit_radian);
        self
    }

    /// Set the per-cluster growth step limit.
    pub fn with_grow_limit(mut self, grow_limit: usize) -> Self {
        self.grow_limit = grow_limit;
        self
    }

    /// Set the elongation factor.
    pub fn with_elongate_grow(mut self, elongate_grow: f64) -> Self {
        self.elongate_grow = elongate_grow;
        self
    }

    /// Set the growth policy.
    pub fn with_grow_function(mut self, grow_function: GrowFunction) -> Self {
        self.grow_function = grow_function;
        self
    }

    /// Set the convergence threshold.
    pub fn with_min_diff(mut self, min_diff: f64) -> Self {
        self.min_diff = min_diff;
        self
    }

    /// Set the execution strategy.
    pub fn with_execution_mode(mut self, execution_mode: ExecutionMode) -> Self {
        self.execution_mode = execution_mode;
        self
    }

    /// Set the containment kernel.
    pub fn with_kernel(mut self, kernel: ContainmentKernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// Set the worker count for parallel modes.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the shard granularity.
    pub fn with_shards_per_worker(mut self, shards_per_worker: usize) -> Self {
        self.shards_per_worker = shards_per_worker;
        self
    }

    /// Check every numeric parameter.
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(Error::InvalidParameter {
                name: "epsilon",
                message: "must be positive and finite",
            });
        }

        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::InvalidParameter {
                name: "lr",
                message: "must be positive and finite",
            });
        }

        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }

        if let Some(limit) = self.limit_radian {
            if !(limit > 0.0 && limit <= std::f64::consts::PI) {
                return Err(Error::InvalidParameter {
                    name: "limit_radian",
                    message: "must lie in (0, pi]",
                });
            }
        }

        if !(self.elongate_grow.is_finite() && self.elongate_grow > 0.0) {
            return Err(Error::InvalidParameter {
                name: "elongate_grow",
                message: "must be positive and finite",
            });
        }

        if !(self.min_diff.is_finite() && self.min_diff >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "min_diff",
                message: "must be non-negative and finite",
            });
        }

        if self.workers == Some(0) {
            return Err(Error::InvalidParameter {
                name: "workers",
                message: "must be at least 1",
            });
        }

        if self.shards_per_worker == 0 {
            return Err(Error::InvalidParameter {
                name: "shards_per_worker",
                message: "must be at least 1",
            });
        }

        Ok(())
    }
}
