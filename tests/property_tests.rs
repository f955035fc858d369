use std::collections::HashMap;
use std::sync::Arc;

use cubeclust::cluster::{
    adjacent, Cluster, ClusterView, Clusterer, Clustering, ConnectivityMatrix, CubeParams,
    Distributed, ExecutionMode, NormalGrowth, PairRules, Point, Sequential, Snapshot, WorkerPool,
};
use cubeclust::{ContainmentKernel, GrowFunction};
use proptest::prelude::*;

fn points(dim: usize, max_len: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(-10.0f64..10.0, dim), 1..max_len)
}

/// Canonical form of a labelling: label -> first index seen with it.
fn partition(labels: &[usize]) -> Vec<usize> {
    let mut first: HashMap<usize, usize> = HashMap::new();
    labels
        .iter()
        .enumerate()
        .map(|(i, l)| *first.entry(*l).or_insert(i))
        .collect()
}

/// Merge consecutive input points into small clusters to get a mixed snapshot.
fn mixed_snapshot(data: &[Vec<f64>], kernel: ContainmentKernel) -> Arc<Snapshot> {
    let singletons: Vec<Cluster> = data
        .iter()
        .enumerate()
        .map(|(i, p)| Cluster::singleton(Point::new(i, p.clone()), 0.5).unwrap())
        .collect();
    let mut clusters = Vec::new();
    let mut group = Vec::new();
    for (i, c) in singletons.into_iter().enumerate() {
        group.push(c);
        if group.len() == 1 + i % 3 {
            clusters.push(Cluster::merge(std::mem::take(&mut group), 0.5).unwrap());
        }
    }
    if !group.is_empty() {
        clusters.push(Cluster::merge(group, 0.5).unwrap());
    }
    let rules = PairRules {
        epsilon: 0.5,
        limit_radian: None,
        kernel,
    };
    Arc::new(Snapshot::new(&clusters, rules))
}

/// A cluster over `points` after `steps` growth steps, as the comparison sees it.
fn grown_view(points: &[Vec<f64>], steps: usize, was_complete: bool) -> ClusterView {
    let parts = points
        .iter()
        .enumerate()
        .map(|(i, p)| Cluster::singleton(Point::new(i, p.clone()), 0.5).unwrap())
        .collect();
    let mut cluster = Cluster::merge(parts, 0.5).unwrap();
    let params = CubeParams::default();
    let policy = NormalGrowth { elongate_grow: 2.0 };
    for _ in 0..steps {
        cluster.grow(&params, &policy).unwrap();
    }
    let mut view = ClusterView::from(&cluster);
    view.was_complete = was_complete;
    view
}

#[allow(clippy::type_complexity)]
fn view_pair() -> impl Strategy<
    Value = (
        Vec<Vec<f64>>,
        Vec<Vec<f64>>,
        usize,
        usize,
        bool,
        bool,
        Option<f64>,
    ),
> {
    (2usize..=3).prop_flat_map(|dim| {
        let cloud = prop::collection::vec(prop::collection::vec(0.0f64..4.0, dim), 1..4);
        (
            cloud.clone(),
            cloud,
            0usize..3,
            0usize..3,
            any::<bool>(),
            any::<bool>(),
            prop::option::of(0.1f64..3.0),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_every_point_labelled_once(data in points(2, 30)) {
        let fit = Clusterer::new(CubeParams::default().with_max_iter(15))
            .unwrap()
            .fit(&data)
            .unwrap();

        prop_assert_eq!(fit.labels.len(), data.len());
        prop_assert_eq!(fit.history.len(), fit.iterations + 1);
        let mut owned = vec![0usize; data.len()];
        for (label, summary) in fit.clusters.iter().enumerate() {
            for &idx in &summary.members {
                owned[idx] += 1;
                prop_assert_eq!(fit.labels[idx], label);
            }
        }
        prop_assert!(owned.iter().all(|&c| c == 1));
    }

    #[test]
    fn prop_cluster_count_never_grows(data in points(3, 25)) {
        let fit = Clusterer::new(CubeParams::default().with_grow_function(GrowFunction::Density))
            .unwrap()
            .fit(&data)
            .unwrap();
        prop_assert_eq!(fit.history[0], data.len());
        prop_assert!(fit.history.windows(2).all(|w| w[1] <= w[0]));
        prop_assert_eq!(*fit.history.last().unwrap(), fit.n_clusters());
    }

    #[test]
    fn prop_sequential_runs_are_deterministic(data in points(2, 25)) {
        let model = Clusterer::new(CubeParams::default()).unwrap();
        let a = model.fit_predict(&data).unwrap();
        let b = model.fit_predict(&data).unwrap();
        prop_assert_eq!(partition(&a), partition(&b));
    }

    #[test]
    fn prop_execution_modes_agree(data in points(2, 25)) {
        let run = |mode| {
            Clusterer::new(
                CubeParams::default()
                    .with_execution_mode(mode)
                    .with_workers(3)
                    .with_shards_per_worker(2),
            )
            .unwrap()
            .fit_predict(&data)
            .unwrap()
        };
        let sequential = run(ExecutionMode::Sequential);
        prop_assert_eq!(&run(ExecutionMode::ProcessPool), &sequential);
        prop_assert_eq!(&run(ExecutionMode::Distributed), &sequential);
    }

    #[test]
    fn prop_adjacency_is_symmetric(
        (pa, pb, steps_a, steps_b, done_a, done_b, limit) in view_pair()
    ) {
        let a = grown_view(&pa, steps_a, done_a);
        let b = grown_view(&pb, steps_b, done_b);
        for kernel in [ContainmentKernel::Projected, ContainmentKernel::Simplex] {
            for limit_radian in [None, limit] {
                let rules = PairRules {
                    epsilon: 0.5,
                    limit_radian,
                    kernel,
                };
                prop_assert_eq!(
                    adjacent(&a, &b, &rules).unwrap(),
                    adjacent(&b, &a, &rules).unwrap()
                );
            }
        }
    }

    #[test]
    fn prop_kernels_agree_on_labels(
        data in points(2, 20),
        limit in prop::option::of(0.2f64..2.0)
    ) {
        let run = |kernel| {
            let mut params = CubeParams::default().with_kernel(kernel);
            params.limit_radian = limit;
            Clusterer::new(params).unwrap().fit_predict(&data).unwrap()
        };
        prop_assert_eq!(
            partition(&run(ContainmentKernel::Projected)),
            partition(&run(ContainmentKernel::Simplex))
        );
    }

    #[test]
    fn prop_matrix_backends_agree(data in points(2, 30)) {
        let snapshot = mixed_snapshot(&data, ContainmentKernel::Projected);
        let reference = ConnectivityMatrix::compute(&snapshot, &Sequential).unwrap();

        let pool = WorkerPool::new(Some(2), 3).unwrap();
        prop_assert_eq!(&ConnectivityMatrix::compute(&snapshot, &pool).unwrap(), &reference);
        let distributed = Distributed::new(Some(3), 2);
        prop_assert_eq!(
            &ConnectivityMatrix::compute(&snapshot, &distributed).unwrap(),
            &reference
        );
    }

    #[test]
    fn prop_compression_is_idempotent(data in points(3, 12)) {
        let parts = data
            .iter()
            .enumerate()
            .map(|(i, p)| Cluster::singleton(Point::new(i, p.clone()), 0.5).unwrap())
            .collect();
        let mut cluster = Cluster::merge(parts, 0.5).unwrap();
        cluster.compress().unwrap();
        let (length, width) = (cluster.length(), cluster.width());
        cluster.compress().unwrap();
        prop_assert!((cluster.length() - length).abs() <= 1e-9 * (1.0 + length));
        prop_assert!((cluster.width() - width).abs() <= 1e-9 * (1.0 + width));
    }
}
