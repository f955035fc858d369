//! Rotated-cube density clustering.
//!
//! `cubeclust` partitions an n-dimensional point cloud into density-connected
//! groups by growing oriented bounding volumes around clusters and merging the
//! clusters whose volumes collide.
//!
//! The primary public API is under [`cluster`], which provides:
//! - [`Clusterer`]: the grow → connect → merge loop
//! - [`ConnectivityMatrix`] with sequential, worker-pool and distributed evaluators
//! - [`CubeGenerator`] / [`RotatedCube`] geometry helpers

#![forbid(unsafe_code)]

pub mod cluster;
pub mod error;

pub use cluster::{
    Cluster, ClusterSummary, Clusterer, Clustering, ConnectivityEvaluator, ConnectivityMatrix,
    ContainmentKernel, CubeFit, CubeGenerator, CubeParams, ExecutionMode, GrowFunction,
    GrowthPolicy, GrowthState, RotatedCube,
};
pub use error::{Error, Result};
