//! Rotated-cube clustering of two filaments and a blob, under each execution mode.

use cubeclust::{Clusterer, CubeParams, ExecutionMode};

fn main() {
    let mut data: Vec<Vec<f64>> = Vec::new();
    // Filament A along the x axis, points 0.4 apart.
    for i in 0..8 {
        data.push(vec![10.0 + 0.4 * i as f64, 0.0]);
    }
    // Filament B along the diagonal.
    for i in 0..8 {
        let t = 12.0 + 0.4 * i as f64;
        data.push(vec![t * 0.7071, t * 0.7071]);
    }
    // A tight blob far away.
    data.push(vec![-20.0, 15.0]);
    data.push(vec![-20.2, 15.1]);
    data.push(vec![-19.9, 14.8]);

    for mode in [
        ExecutionMode::Sequential,
        ExecutionMode::ProcessPool,
        ExecutionMode::Distributed,
    ] {
        let params = CubeParams::default()
            .with_epsilon(0.5)
            .with_max_iter(30)
            .with_execution_mode(mode)
            .with_workers(2);
        let fit = Clusterer::new(params).unwrap().fit(&data).unwrap();

        println!(
            "=== {} ({} clusters after {} iterations) ===",
            mode,
            fit.n_clusters(),
            fit.iterations
        );
        println!("  history: {:?}", fit.history);
        for (i, label) in fit.labels.iter().enumerate() {
            println!(
                "  point {:2} ({:6.2}, {:6.2}) => cluster {}",
                i, data[i][0], data[i][1], label
            );
        }
        for (label, summary) in fit.clusters.iter().enumerate() {
            println!(
                "  cluster {}: {} points, L={:.2} W={:.2} {:?}",
                label,
                summary.members.len(),
                summary.length,
                summary.width,
                summary.state
            );
        }
        println!();
    }
}
