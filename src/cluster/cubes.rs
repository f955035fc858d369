//! Rotated-cube clustering: grow, collide, merge.
//!
//! # The Algorithm
//!
//! Every point starts as its own cluster, wrapped in a small cube of half-extent
//! ε. Each iteration then runs three phases separated by hard barriers:
//!
//! 1. **Grow**: every cluster that is not yet saturated enlarges its oriented
//!    volume (skipped on the first iteration, so ε-close points merge first).
//! 2. **Connect**: an immutable snapshot of all volumes goes to the configured
//!    [`ConnectivityEvaluator`], which returns the symmetric adjacency matrix.
//! 3. **Merge**: connected components of the adjacency graph are fused into
//!    single clusters.
//!
//! The loop stops when every cluster is complete, a single cluster remains,
//! the cluster-count reduction falls to `min_diff`, or `max_iter` is reached.
//! Surviving volumes are then compressed (reporting only) and each point gets
//! the index of its final cluster.
//!
//! ## Complexity
//!
//! - **Time**: O(k²) pair tests per iteration for k clusters, each test at worst
//!   O(m·m') in the member counts. The simplex kernel adds an `n!` factor.
//! - **Space**: O(k²) for the adjacency matrix plus one copy of the points in the
//!   snapshot.
//!
//! ## When to Use
//!
//! - Elongated, filament-like structures that radiate from a common origin
//!   (sky surveys, beams), where a fixed DBSCAN radius either fragments the
//!   filaments or glues neighbours together.
//! - Moderate point counts: the first iterations work on singletons.
//!
//! ## Limitations
//!
//! - No global optimality; a different growth policy can change the result.
//! - Label values are only meaningful within one `fit` call.

use std::sync::Arc;

use log::{debug, info};

use super::collision::{PairRules, MAX_SIMPLEX_DIM};
use super::config::{ContainmentKernel, CubeParams};
use super::connectivity::{evaluator_for, ConnectivityEvaluator, ConnectivityMatrix, Snapshot};
use super::entity::{Cluster, GrowthState, Point};
use super::growth::{policy_for, GrowthPolicy};
use super::traits::Clustering;
use crate::error::{Error, Result};

/// Rotated-cube clusterer.
///
/// Holds only configuration; every [`fit`](Clusterer::fit) starts from scratch, so
/// one instance can be shared across threads.
#[derive(Debug, Clone)]
pub struct Clusterer {
    params: CubeParams,
    evaluator: Arc<dyn ConnectivityEvaluator>,
    policy: Arc<dyn GrowthPolicy>,
}

/// Final state of one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    /// Input indices, ascending.
    pub members: Vec<usize>,
    /// Mean of the members.
    pub centroid: Vec<f64>,
    /// Compressed extent along the principal axis.
    pub length: f64,
    /// Compressed extent across it.
    pub width: f64,
    /// `length · width^(n-1)` of the compressed volume.
    pub volume: f64,
    /// Growth state when the loop stopped.
    pub state: GrowthState,
    /// Growth steps taken.
    pub growth_counter: usize,
}

/// Result of [`Clusterer::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct CubeFit {
    /// One label per input point, in input order.
    pub labels: Vec<usize>,
    /// Grow/connect/merge iterations executed.
    pub iterations: usize,
    /// Cluster count before the first iteration and after each one.
    pub history: Vec<usize>,
    /// Final clusters; `clusters[label]` describes points labelled `label`.
    pub clusters: Vec<ClusterSummary>,
}

impl CubeFit {
    /// Number of final clusters.
    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }
}

impl Clusterer {
    /// Validate `params` and set up the connectivity backend and growth policy.
    pub fn new(params: CubeParams) -> Result<Self> {
        params.validate()?;
        let evaluator = evaluator_for(&params)?;
        let policy: Arc<dyn GrowthPolicy> = Arc::from(policy_for(&params));
        Ok(Self {
            params,
            evaluator,
            policy,
        })
    }

    /// Build from loosely typed options.
    ///
    /// `grow_function` is `"density"` or `"normal"`; `execution_mode` is
    /// `"sequential"`, `"process-pool"` or `"distributed"`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownOption`] for unrecognised strings, [`Error::InvalidParameter`]
    /// for out-of-range numbers.
    #[allow(clippy::too_many_arguments)]
    pub fn configure(
        epsilon: f64,
        lr: f64,
        max_iter: usize,
        limit_radian: Option<f64>,
        grow_limit: usize,
        elongate_grow: f64,
        grow_function: &str,
        min_diff: f64,
        execution_mode: &str,
    ) -> Result<Self> {
        let params = CubeParams {
            epsilon,
            lr,
            max_iter,
            limit_radian,
            grow_limit,
            elongate_grow,
            grow_function: grow_function.parse()?,
            min_diff,
            execution_mode: execution_mode.parse()?,
            ..CubeParams::default()
        };
        Self::new(params)
    }

    /// Replace the built-in growth policy.
    pub fn with_growth_policy(mut self, policy: Arc<dyn GrowthPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Configuration in use.
    pub fn params(&self) -> &CubeParams {
        &self.params
    }

    /// Cluster `data` and return labels plus diagnostics.
    pub fn fit(&self, data: &[Vec<f64>]) -> Result<CubeFit> {
        let n = data.len();
        let Some(dim) = self.validate_input(data)? else {
            return Ok(CubeFit {
                labels: Vec::new(),
                iterations: 0,
                history: vec![0],
                clusters: Vec::new(),
            });
        };
        let params = &self.params;

        let mut clusters = data
            .iter()
            .enumerate()
            .map(|(i, p)| Cluster::singleton(Point::new(i, p.clone()), params.epsilon))
            .collect::<Result<Vec<_>>>()?;

        let rules = PairRules {
            epsilon: params.epsilon,
            limit_radian: params.limit_radian,
            kernel: params.kernel,
        };

        let mut history = vec![clusters.len()];
        let mut iterations = 0;
        while iterations < params.max_iter {
            if clusters.len() <= 1 || clusters.iter().all(Cluster::is_complete) {
                break;
            }

            if iterations > 0 {
                for cluster in clusters.iter_mut().filter(|c| !c.was_complete()) {
                    cluster.grow(params, self.policy.as_ref())?;
                }
            }

            let before = clusters.len();
            let snapshot = Arc::new(Snapshot::new(&clusters, rules));
            let matrix = ConnectivityMatrix::compute(&snapshot, self.evaluator.as_ref())?;
            drop(snapshot);

            clusters = merge_components(clusters, &matrix.components(), params.epsilon)?;
            iterations += 1;
            check_partition(&clusters, n)?;
            history.push(clusters.len());

            let reduction = before - clusters.len();
            debug!(
                "iteration {iterations}: {before} -> {} clusters ({} adjacent pairs, {})",
                clusters.len(),
                matrix.edge_count(),
                self.evaluator.mode()
            );

            if params.min_diff > 0.0 && reduction as f64 <= params.min_diff {
                debug!("cluster count reduction {reduction} <= min_diff; stopping");
                break;
            }
        }

        for cluster in &mut clusters {
            cluster.compress()?;
        }

        let mut labels = vec![0; n];
        for (label, cluster) in clusters.iter().enumerate() {
            for idx in cluster.indices() {
                labels[idx] = label;
            }
        }

        info!(
            "clustered {n} points in {dim} dimensions into {} clusters after {iterations} iterations",
            clusters.len()
        );

        Ok(CubeFit {
            labels,
            iterations,
            history,
            clusters: clusters.iter().map(summarize).collect(),
        })
    }

    /// Returns the dimensionality, or `None` for empty input.
    fn validate_input(&self, data: &[Vec<f64>]) -> Result<Option<usize>> {
        let Some(first) = data.first() else {
            return Ok(None);
        };
        let dim = first.len();
        if dim == 0 {
            return Err(Error::InvalidParameter {
                name: "dimension",
                message: "must be at least 1",
            });
        }
        if self.params.kernel == ContainmentKernel::Simplex && dim > MAX_SIMPLEX_DIM {
            return Err(Error::InvalidParameter {
                name: "kernel",
                message: "simplex kernel supports at most 8 dimensions",
            });
        }
        for (index, point) in data.iter().enumerate() {
            if point.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    found: point.len(),
                });
            }
            if point.iter().any(|x| !x.is_finite()) {
                return Err(Error::NonFiniteCoordinate { index });
            }
        }
        Ok(Some(dim))
    }
}

impl Clustering for Clusterer {
    fn fit_predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>> {
        Ok(self.fit(data)?.labels)
    }

    /// Discovered dynamically, so this returns 0.
    fn n_clusters(&self) -> usize {
        0
    }
}

/// Replace every multi-cluster component by its merge; singletons are settled.
fn merge_components(
    clusters: Vec<Cluster>,
    components: &[Vec<usize>],
    epsilon: f64,
) -> Result<Vec<Cluster>> {
    let mut slots: Vec<Option<Cluster>> = clusters.into_iter().map(Some).collect();
    let mut take = |i: usize| {
        slots
            .get_mut(i)
            .and_then(Option::take)
            .ok_or_else(|| Error::InvariantViolation(format!("cluster {i} claimed twice")))
    };

    let mut out = Vec::with_capacity(components.len());
    for component in components {
        if let [only] = component.as_slice() {
            let mut cluster = take(*only)?;
            cluster.settle();
            out.push(cluster);
        } else {
            let parts = component
                .iter()
                .map(|&i| take(i))
                .collect::<Result<Vec<_>>>()?;
            out.push(Cluster::merge(parts, epsilon)?);
        }
    }
    Ok(out)
}

/// Every input index in exactly one non-empty cluster.
fn check_partition(clusters: &[Cluster], n: usize) -> Result<()> {
    let mut seen = vec![false; n];
    let mut total = 0;
    for cluster in clusters {
        if cluster.is_empty() {
            return Err(Error::InvariantViolation("empty cluster".to_string()));
        }
        for idx in cluster.indices() {
            if idx >= n || seen[idx] {
                return Err(Error::InvariantViolation(format!(
                    "point {idx} owned by more than one cluster"
                )));
            }
            seen[idx] = true;
            total += 1;
        }
    }
    if total != n {
        return Err(Error::InvariantViolation(format!(
            "{} of {n} points lost",
            n - total
        )));
    }
    Ok(())
}

fn summarize(cluster: &Cluster) -> ClusterSummary {
    let mut members: Vec<usize> = cluster.indices().collect();
    members.sort_unstable();
    ClusterSummary {
        members,
        centroid: cluster.centroid().to_vec(),
        length: cluster.length(),
        width: cluster.width(),
        volume: cluster.volume(),
        state: cluster.state(),
        growth_counter: cluster.growth_counter(),
    }
}
