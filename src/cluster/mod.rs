//! Rotated-cube clustering.
//!
//! ## Idea
//!
//! Classic density clustering (DBSCAN) links points closer than a fixed radius.
//! That radius is a poor fit for elongated structures: too small and a filament
//! breaks into pieces, too large and neighbouring filaments fuse.
//!
//! Here each cluster carries an **oriented bounding volume** (a "rotated cube")
//! whose long side points along the cluster's *principal axis*, the direction
//! from the coordinate origin through its centroid. Volumes grow a little each
//! iteration, elongating along that axis, and clusters whose volumes collide
//! are merged:
//!
//! ```text
//!   iteration 1        iteration 2           iteration 3
//!   ·  ·   ·  ·        [·] [·] [·] [·]       [·  ·   ·  ·]
//!   (ε-close merge)    (grow, collide)       (merged)
//! ```
//!
//! ## Pieces
//!
//! - [`CubeGenerator`] / [`RotatedCube`]: box vertices and their orientation.
//! - [`Cluster`]: one growing group and its `New → Growing → Complete` state.
//! - [`GrowthPolicy`]: how much a volume grows per step ([`NormalGrowth`],
//!   [`DensityGrowth`], or your own).
//! - [`ConnectivityMatrix`]: pairwise collisions, evaluated by a
//!   [`ConnectivityEvaluator`] ([`Sequential`], [`WorkerPool`], [`Distributed`]).
//! - [`Clusterer`]: the grow → connect → merge loop.
//!
//! ## Usage
//!
//! ```rust
//! use cubeclust::cluster::{Clusterer, Clustering, CubeParams, ExecutionMode};
//!
//! let data = vec![
//!     vec![10.0, 0.0],
//!     vec![10.3, 0.0],
//!     vec![10.6, 0.1],
//!     vec![40.0, 30.0],
//!     vec![40.2, 30.1],
//! ];
//!
//! let model = Clusterer::new(
//!     CubeParams::default()
//!         .with_epsilon(0.5)
//!         .with_execution_mode(ExecutionMode::Sequential),
//! )
//! .unwrap();
//! let labels = model.fit_predict(&data).unwrap();
//! assert_eq!(labels[0], labels[2]);
//! assert_eq!(labels[3], labels[4]);
//! assert_ne!(labels[0], labels[3]);
//! ```

mod collision;
mod config;
mod connectivity;
mod cube;
mod cubes;
mod entity;
mod growth;
mod traits;
mod util;

pub use collision::{
    adjacent, ClusterView, PairRules, PairwiseTest, ProjectedBoxTest, SimplexHullTest,
    MAX_SIMPLEX_DIM,
};
pub use config::{ContainmentKernel, CubeParams, ExecutionMode, GrowFunction};
pub use connectivity::{
    evaluate_shard, evaluator_for, shard_rows, ConnectivityEvaluator, ConnectivityMatrix,
    Distributed, MatrixRows, RowShard, Sequential, Snapshot, WorkerPool,
};
pub use cube::{CubeGenerator, RotatedCube};
pub use cubes::{ClusterSummary, Clusterer, CubeFit};
pub use entity::{Cluster, GrowthState, Point};
pub use growth::{DensityGrowth, GrowthPolicy, GrowthStep, NormalGrowth};
pub use traits::Clustering;
