//! Connectivity matrix over the current cluster list.
//!
//! ## Sharding
//!
//! Only the upper triangle is evaluated: row `i` holds the pairs `(i, j)` for
//! `j >= i`, `N(N+1)/2` entries in total. Rows are cut into contiguous
//! [`RowShard`]s of roughly equal pair count (early rows are longer, so early
//! shards hold fewer rows):
//!
//! ```text
//!   row 0  ■ ■ ■ ■ ■ ■   ┐ shard 0
//!   row 1    ■ ■ ■ ■ ■   ┘
//!   row 2      ■ ■ ■ ■   ┐ shard 1
//!   row 3        ■ ■ ■   │
//!   row 4          ■ ■   ┘
//!   row 5            ■   ─ shard 2
//! ```
//!
//! Every strategy evaluates shards against the same immutable [`Snapshot`] and
//! concatenates the rows in shard order, so all of them return identical
//! matrices. A failing shard fails the whole computation.

use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel as channel;
use log::trace;
use rayon::prelude::*;

use super::collision::{adjacent, ClusterView, PairRules};
use super::config::{CubeParams, ExecutionMode};
use super::entity::Cluster;
use super::util::UnionFind;
use crate::error::{Error, Result};

/// Upper-triangle rows: `rows[k][m]` is the pair `(start + k, start + k + m)`.
pub type MatrixRows = Vec<Vec<bool>>;

/// Immutable copy of the cluster list taken between growth and merge.
#[derive(Debug, Clone)]
pub struct Snapshot {
    views: Vec<ClusterView>,
    rules: PairRules,
}

impl Snapshot {
    /// Extract every cluster's geometry.
    pub fn new(clusters: &[Cluster], rules: PairRules) -> Self {
        Self {
            views: clusters.iter().map(ClusterView::from).collect(),
            rules,
        }
    }

    /// Build directly from views.
    pub fn from_views(views: Vec<ClusterView>, rules: PairRules) -> Self {
        Self { views, rules }
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// `true` if there are no clusters.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Per-cluster data.
    pub fn views(&self) -> &[ClusterView] {
        &self.views
    }

    /// Adjacency rules.
    pub fn rules(&self) -> &PairRules {
        &self.rules
    }

    /// Upper-triangle entries including the diagonal.
    pub fn pair_count(&self) -> usize {
        let n = self.len();
        n * (n + 1) / 2
    }
}

/// A contiguous block of matrix rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowShard {
    /// Position in the shard list; results are reassembled by it.
    pub id: usize,
    /// First row.
    pub start: usize,
    /// One past the last row.
    pub end: usize,
}

impl RowShard {
    /// Pairs in this shard for an `n`-cluster snapshot.
    pub fn pair_count(&self, n: usize) -> usize {
        (self.start..self.end).map(|row| n - row).sum()
    }
}

/// Split the `n` rows into at most `shards` contiguous, non-empty groups of
/// roughly equal pair count.
pub fn shard_rows(n: usize, shards: usize) -> Vec<RowShard> {
    if n == 0 {
        return Vec::new();
    }
    let shards = shards.clamp(1, n);
    let total = n * (n + 1) / 2;

    let mut out = Vec::with_capacity(shards);
    let mut start = 0;
    let mut acc = 0;
    for row in 0..n {
        acc += n - row;
        let boundary = total * (out.len() + 1) / shards;
        if acc >= boundary && out.len() + 1 < shards {
            out.push(RowShard {
                id: out.len(),
                start,
                end: row + 1,
            });
            start = row + 1;
        }
    }
    if start < n {
        out.push(RowShard {
            id: out.len(),
            start,
            end: n,
        });
    }
    out
}

/// Evaluate one shard against the snapshot.
pub fn evaluate_shard(snapshot: &Snapshot, shard: &RowShard) -> Result<MatrixRows> {
    let views = snapshot.views();
    let rules = snapshot.rules();
    (shard.start..shard.end)
        .map(|i| {
            (i..views.len())
                .map(|j| {
                    if i == j {
                        Ok(true)
                    } else {
                        adjacent(&views[i], &views[j], rules)
                    }
                })
                .collect()
        })
        .collect()
}

/// Evaluate a shard, turning errors and panics into [`Error::ShardFailed`].
fn run_shard(snapshot: &Snapshot, shard: &RowShard) -> Result<MatrixRows> {
    match panic::catch_unwind(AssertUnwindSafe(|| evaluate_shard(snapshot, shard))) {
        Ok(Ok(rows)) => Ok(rows),
        Ok(Err(e)) => Err(Error::ShardFailed {
            shard: shard.id,
            message: e.to_string(),
        }),
        Err(payload) => Err(Error::ShardFailed {
            shard: shard.id,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Strategy computing the upper-triangle rows of a snapshot.
pub trait ConnectivityEvaluator: Debug + Send + Sync {
    /// Which execution mode this is.
    fn mode(&self) -> ExecutionMode;

    /// All `snapshot.len()` rows, in row order.
    fn evaluate(&self, snapshot: &Arc<Snapshot>) -> Result<MatrixRows>;
}

/// Evaluates every shard on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl ConnectivityEvaluator for Sequential {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Sequential
    }

    fn evaluate(&self, snapshot: &Arc<Snapshot>) -> Result<MatrixRows> {
        let mut rows = Vec::with_capacity(snapshot.len());
        for shard in shard_rows(snapshot.len(), 1) {
            rows.extend(evaluate_shard(snapshot, &shard)?);
        }
        Ok(rows)
    }
}

/// Evaluates shards on a dedicated rayon pool.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    shards_per_worker: usize,
}

impl WorkerPool {
    /// Build the pool; `workers = None` lets rayon pick the thread count.
    pub fn new(workers: Option<usize>, shards_per_worker: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.unwrap_or(0))
            .thread_name(|i| format!("cubeclust-pool-{i}"))
            .build()
            .map_err(|_| Error::InvalidParameter {
                name: "workers",
                message: "could not start the worker pool",
            })?;
        Ok(Self {
            pool,
            shards_per_worker,
        })
    }

    /// Threads in the pool.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl ConnectivityEvaluator for WorkerPool {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::ProcessPool
    }

    fn evaluate(&self, snapshot: &Arc<Snapshot>) -> Result<MatrixRows> {
        let shards = shard_rows(snapshot.len(), self.workers() * self.shards_per_worker);
        trace!(
            "evaluating {} shards on a pool of {} threads",
            shards.len(),
            self.workers()
        );

        let parts: Vec<MatrixRows> = self.pool.install(|| {
            shards
                .par_iter()
                .map(|shard| run_shard(snapshot, shard))
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(parts.into_iter().flatten().collect())
    }
}

/// Ships shard tasks to independent workers over channels.
///
/// Each worker receives the shared read-only snapshot once and then pulls shard
/// descriptors until the task queue closes; results travel back tagged with the
/// shard id.
#[derive(Debug, Clone, Copy)]
pub struct Distributed {
    workers: usize,
    shards_per_worker: usize,
}

impl Distributed {
    /// `workers = None` uses rayon's notion of available parallelism.
    pub fn new(workers: Option<usize>, shards_per_worker: usize) -> Self {
        Self {
            workers: workers.unwrap_or_else(rayon::current_num_threads).max(1),
            shards_per_worker,
        }
    }

    /// Worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl ConnectivityEvaluator for Distributed {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Distributed
    }

    fn evaluate(&self, snapshot: &Arc<Snapshot>) -> Result<MatrixRows> {
        let shards = shard_rows(snapshot.len(), self.workers * self.shards_per_worker);
        if shards.is_empty() {
            return Ok(Vec::new());
        }

        let (task_tx, task_rx) = channel::unbounded::<RowShard>();
        let (result_tx, result_rx) = channel::unbounded::<(usize, Result<MatrixRows>)>();
        for shard in &shards {
            // The receiver is still alive here, so the send cannot fail.
            let _ = task_tx.send(*shard);
        }
        drop(task_tx);

        let n_workers = self.workers.min(shards.len());
        trace!("dispatching {} shards to {} workers", shards.len(), n_workers);

        let mut handles = Vec::with_capacity(n_workers);
        for w in 0..n_workers {
            let tasks = task_rx.clone();
            let results = result_tx.clone();
            let snapshot = Arc::clone(snapshot);
            let handle = thread::Builder::new()
                .name(format!("cubeclust-worker-{w}"))
                .spawn(move || {
                    for shard in tasks.iter() {
                        let out = run_shard(&snapshot, &shard);
                        if results.send((shard.id, out)).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| Error::ShardFailed {
                    shard: 0,
                    message: format!("could not start worker {w}: {e}"),
                })?;
            handles.push(handle);
        }
        drop(result_tx);

        let mut slots: Vec<Option<MatrixRows>> = vec![None; shards.len()];
        let mut failure: Option<Error> = None;
        for (id, out) in result_rx.iter() {
            match out {
                Ok(rows) => slots[id] = Some(rows),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        for handle in handles {
            if handle.join().is_err() && failure.is_none() {
                failure = Some(Error::ShardFailed {
                    shard: 0,
                    message: "worker thread died".to_string(),
                });
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let mut rows = Vec::with_capacity(snapshot.len());
        for (id, slot) in slots.into_iter().enumerate() {
            let part = slot.ok_or_else(|| Error::ShardFailed {
                shard: id,
                message: "no result returned".to_string(),
            })?;
            rows.extend(part);
        }
        Ok(rows)
    }
}

/// Evaluator selected by `params.execution_mode`.
pub fn evaluator_for(params: &CubeParams) -> Result<Arc<dyn ConnectivityEvaluator>> {
    Ok(match params.execution_mode {
        ExecutionMode::Sequential => Arc::new(Sequential),
        ExecutionMode::ProcessPool => {
            Arc::new(WorkerPool::new(params.workers, params.shards_per_worker)?)
        }
        ExecutionMode::Distributed => {
            Arc::new(Distributed::new(params.workers, params.shards_per_worker))
        }
    })
}

/// Symmetric boolean adjacency over a snapshot's clusters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityMatrix {
    n: usize,
    cells: Vec<bool>,
}

impl ConnectivityMatrix {
    /// Run `evaluator` on `snapshot` and mirror the upper triangle.
    pub fn compute(
        snapshot: &Arc<Snapshot>,
        evaluator: &dyn ConnectivityEvaluator,
    ) -> Result<Self> {
        let rows = evaluator.evaluate(snapshot)?;
        Self::from_rows(snapshot.len(), rows)
    }

    /// Assemble from upper-triangle rows.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] if the rows do not form an `n`-row triangle.
    pub fn from_rows(n: usize, rows: MatrixRows) -> Result<Self> {
        if rows.len() != n {
            return Err(Error::InvariantViolation(format!(
                "connectivity returned {} rows for {} clusters",
                rows.len(),
                n
            )));
        }
        let mut cells = vec![false; n * n];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n - i {
                return Err(Error::InvariantViolation(format!(
                    "connectivity row {i} has {} entries, expected {}",
                    row.len(),
                    n - i
                )));
            }
            for (offset, hit) in row.into_iter().enumerate() {
                let j = i + offset;
                cells[i * n + j] = hit;
                cells[j * n + i] = hit;
            }
        }
        Ok(Self { n, cells })
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.n
    }

    /// `true` for the empty matrix.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Entry `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.cells[i * self.n + j]
    }

    /// `get(i, j) == get(j, i)` for every pair.
    pub fn is_symmetric(&self) -> bool {
        (0..self.n).all(|i| (i + 1..self.n).all(|j| self.get(i, j) == self.get(j, i)))
    }

    /// Off-diagonal adjacent pairs `(i, j)` with `i < j`.
    pub fn edge_count(&self) -> usize {
        (0..self.n)
            .map(|i| (i + 1..self.n).filter(|&j| self.get(i, j)).count())
            .sum()
    }

    /// Connected components, self-loops ignored.
    ///
    /// Ordered by smallest cluster index, members ascending.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut uf = UnionFind::new(self.n);
        for i in 0..self.n {
            for j in i + 1..self.n {
                if self.get(i, j) {
                    uf.union(i, j);
                }
            }
        }
        uf.components()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::config::ContainmentKernel;
    use crate::cluster::entity::Point;

    fn rules() -> PairRules {
        PairRules {
            epsilon: 0.5,
            limit_radian: None,
            kernel: ContainmentKernel::Projected,
        }
    }

    fn line_snapshot(n: usize, spacing: f64) -> Arc<Snapshot> {
        let clusters: Vec<Cluster> = (0..n)
            .map(|i| Cluster::singleton(Point::new(i, vec![i as f64 * spacing, 1.0]), 0.5).unwrap())
            .collect();
        Arc::new(Snapshot::new(&clusters, rules()))
    }

    #[test]
    fn shards_cover_rows_once() {
        for n in [1, 2, 5, 17, 64] {
            for k in [1, 2, 3, 8, 100] {
                let shards = shard_rows(n, k);
                assert!(!shards.is_empty());
                assert!(shards.len() <= k.min(n));
                assert_eq!(shards[0].start, 0);
                assert_eq!(shards.last().unwrap().end, n);
                for (idx, pair) in shards.windows(2).enumerate() {
                    assert_eq!(pair[0].end, pair[1].start);
                    assert_eq!(pair[0].id, idx);
                }
                assert!(shards.iter().all(|s| s.start < s.end));
                let pairs: usize = shards.iter().map(|s| s.pair_count(n)).sum();
                assert_eq!(pairs, n * (n + 1) / 2);
            }
        }
    }

    #[test]
    fn shards_are_balanced() {
        let n = 200;
        let shards = shard_rows(n, 4);
        assert_eq!(shards.len(), 4);
        let total = n * (n + 1) / 2;
        for s in &shards {
            let share = s.pair_count(n) as f64 / total as f64;
            assert!((0.2..0.3).contains(&share), "unbalanced shard {s:?}: {share}");
        }
    }

    #[test]
    fn empty_snapshot_has_no_shards() {
        assert!(shard_rows(0, 4).is_empty());
        let snapshot = Arc::new(Snapshot::from_views(Vec::new(), rules()));
        let m = ConnectivityMatrix::compute(&snapshot, &Sequential).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn sequential_matrix_on_a_line() {
        // Spacing 0.4 < ε: only neighbours touch.
        let snapshot = line_snapshot(4, 0.4);
        let m = ConnectivityMatrix::compute(&snapshot, &Sequential).unwrap();
        assert!(m.is_symmetric());
        for i in 0..4 {
            assert!(m.get(i, i));
        }
        assert!(m.get(0, 1) && m.get(1, 2) && m.get(2, 3));
        assert!(!m.get(0, 2));
        assert_eq!(m.edge_count(), 3);
        assert_eq!(m.components(), vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn strategies_agree() {
        let snapshot = line_snapshot(23, 0.45);
        let reference = ConnectivityMatrix::compute(&snapshot, &Sequential).unwrap();

        let pool = WorkerPool::new(Some(3), 2).unwrap();
        let distributed = Distributed::new(Some(4), 3);
        assert_eq!(
            ConnectivityMatrix::compute(&snapshot, &pool).unwrap(),
            reference
        );
        assert_eq!(
            ConnectivityMatrix::compute(&snapshot, &distributed).unwrap(),
            reference
        );
    }

    #[test]
    fn rows_are_validated() {
        assert!(matches!(
            ConnectivityMatrix::from_rows(2, vec![vec![true, false]]),
            Err(Error::InvariantViolation(_))
        ));
        assert!(matches!(
            ConnectivityMatrix::from_rows(2, vec![vec![true], vec![true]]),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn shard_errors_are_reported() {
        // A 9-d volume is beyond the simplex kernel; the shard must fail as a whole.
        let clusters: Vec<Cluster> = (0..2)
            .map(|k| {
                let parts = (0..2)
                    .map(|i| {
                        let mut coords = vec![1.0; 9];
                        coords[0] += 0.1 * (2 * k + i) as f64;
                        Cluster::singleton(Point::new(2 * k + i, coords), 0.5).unwrap()
                    })
                    .collect();
                Cluster::merge(parts, 0.5).unwrap()
            })
            .collect();
        let rules = PairRules {
            kernel: ContainmentKernel::Simplex,
            ..rules()
        };
        let snapshot = Arc::new(Snapshot::new(&clusters, rules));

        assert!(ConnectivityMatrix::compute(&snapshot, &Sequential).is_err());
        let err = ConnectivityMatrix::compute(&snapshot, &Distributed::new(Some(2), 1))
            .unwrap_err();
        assert!(matches!(err, Error::ShardFailed { .. }));
        let err = ConnectivityMatrix::compute(&snapshot, &WorkerPool::new(Some(2), 1).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::ShardFailed { .. }));
    }
}
