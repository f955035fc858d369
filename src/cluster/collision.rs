//! Pairwise collision test between two cluster volumes.
//!
//! The exact test is expensive, so [`adjacent`] runs a cascade of cheap rejects
//! first:
//!
//! 1. both clusters were already complete: their earlier non-adjacency stands;
//! 2. two singletons: plain Euclidean distance against the larger half-extent;
//! 3. separating axis: centroids further apart on some coordinate axis than the
//!    two half-diagonals combined cannot overlap;
//! 4. angular (optional): centroid directions further apart than `limit_radian`;
//! 5. distance: closest members further apart than `10·ε`;
//! 6. exact: does any member of one cluster lie inside the other's volume?
//!
//! Step 6 has two implementations behind [`PairwiseTest`]: [`ProjectedBoxTest`]
//! projects into the volume's frame, and [`SimplexHullTest`] triangulates the
//! volume (Delaunay) and checks barycentric coordinates. Both agree up to
//! boundary tolerance.

use std::fmt::Debug;

use log::debug;

use super::config::ContainmentKernel;
use super::cube::RotatedCube;
use super::entity::Cluster;
use super::util::{self, dot, norm, squared_euclidean};
use crate::error::{Error, Result};

/// Largest dimensionality the simplex kernel accepts (`8! = 40320` simplices).
pub const MAX_SIMPLEX_DIM: usize = 8;

const DISTANCE_REJECT_FACTOR: f64 = 10.0;
const CONTAINMENT_TOL: f64 = 1e-9;

/// Read-only copy of everything the connectivity test needs from a [`Cluster`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterView {
    /// Member count.
    pub len: usize,
    /// Bounding volume (centroid, frame, extents, vertices).
    pub cube: RotatedCube,
    /// Member coordinates.
    pub points: Vec<Vec<f64>>,
    /// Completion flag seen by this iteration.
    pub was_complete: bool,
}

impl ClusterView {
    /// Centroid of the cluster.
    pub fn centroid(&self) -> &[f64] {
        self.cube.centroid()
    }

    /// Half of the larger extent.
    fn reach(&self) -> f64 {
        self.cube.length().max(self.cube.width()) / 2.0
    }
}

impl From<&Cluster> for ClusterView {
    fn from(cluster: &Cluster) -> Self {
        Self {
            len: cluster.len(),
            cube: cluster.bounding_volume().clone(),
            points: cluster.members().iter().map(|p| p.coords().to_vec()).collect(),
            was_complete: cluster.was_complete(),
        }
    }
}

/// Exact point-in-volume test.
pub trait PairwiseTest: Debug + Send + Sync {
    /// Whether any of `points` lies inside `cube` (boundary included).
    ///
    /// # Errors
    ///
    /// [`Error::DegenerateGeometry`] when the volume cannot be tested.
    fn contains_any(&self, cube: &RotatedCube, points: &[Vec<f64>]) -> Result<bool>;
}

/// Containment by projection onto the volume's own frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectedBoxTest;

impl PairwiseTest for ProjectedBoxTest {
    fn contains_any(&self, cube: &RotatedCube, points: &[Vec<f64>]) -> Result<bool> {
        let tol = CONTAINMENT_TOL * (1.0 + cube.diagonal());
        let half_l = cube.length() / 2.0 + tol;
        let half_w = cube.width() / 2.0 + tol;

        Ok(points.iter().any(|p| {
            let local = cube.to_local(p);
            local[0].abs() <= half_l && local[1..].iter().all(|x| x.abs() <= half_w)
        }))
    }
}

/// Containment by Delaunay triangulation of the volume's vertices.
///
/// A box's vertices are co-spherical, so any triangulation is Delaunay; this one
/// uses the Kuhn (Freudenthal) decomposition into `n!` simplices, one per axis
/// ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplexHullTest;

impl SimplexHullTest {
    /// Simplices as vertex masks into [`RotatedCube::vertices`].
    ///
    /// For the axis ordering `σ`, the simplex walks from vertex 0 by setting bits
    /// `σ(0), σ(1), …` one at a time.
    pub fn triangulate(dim: usize) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        let mut order: Vec<usize> = (0..dim).collect();
        permute(&mut order, 0, &mut |perm| {
            let mut mask = 0usize;
            let mut simplex = Vec::with_capacity(dim + 1);
            simplex.push(mask);
            for &axis in perm {
                mask |= 1 << axis;
                simplex.push(mask);
            }
            out.push(simplex);
        });
        out
    }

    fn inside_simplex(
        vertices: &[Vec<f64>],
        simplex: &[usize],
        point: &[f64],
        pivot_tol: f64,
    ) -> Result<bool> {
        let dim = point.len();
        let origin = &vertices[simplex[0]];
        let a: Vec<Vec<f64>> = (0..dim)
            .map(|row| {
                simplex[1..]
                    .iter()
                    .map(|&m| vertices[m][row] - origin[row])
                    .collect()
            })
            .collect();
        let b: Vec<f64> = point.iter().zip(origin).map(|(p, o)| p - o).collect();

        let lambda = util::solve(a, b, pivot_tol).ok_or(Error::DegenerateGeometry { dim })?;
        let sum: f64 = lambda.iter().sum();
        Ok(lambda.iter().all(|&l| l >= -CONTAINMENT_TOL) && sum <= 1.0 + CONTAINMENT_TOL)
    }
}

impl PairwiseTest for SimplexHullTest {
    fn contains_any(&self, cube: &RotatedCube, points: &[Vec<f64>]) -> Result<bool> {
        let dim = cube.dim();
        if dim > MAX_SIMPLEX_DIM {
            return Err(Error::InvalidParameter {
                name: "kernel",
                message: "simplex kernel supports at most 8 dimensions",
            });
        }

        let simplices = Self::triangulate(dim);
        let radius = cube.diagonal() / 2.0;
        let bound = radius * (1.0 + CONTAINMENT_TOL) + CONTAINMENT_TOL;
        let pivot_tol = 1e-12 * cube.length().max(cube.width()).max(f64::MIN_POSITIVE);

        for p in points {
            // Outside the circumscribed sphere means outside every simplex.
            if squared_euclidean(p, cube.centroid()) > bound * bound {
                continue;
            }
            for simplex in &simplices {
                if Self::inside_simplex(cube.vertices(), simplex, p, pivot_tol)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

fn permute(items: &mut Vec<usize>, start: usize, visit: &mut impl FnMut(&[usize])) {
    if start == items.len() {
        visit(items);
        return;
    }
    for i in start..items.len() {
        items.swap(start, i);
        permute(items, start + 1, visit);
        items.swap(start, i);
    }
}

static PROJECTED: ProjectedBoxTest = ProjectedBoxTest;
static SIMPLEX: SimplexHullTest = SimplexHullTest;

impl ContainmentKernel {
    /// The [`PairwiseTest`] implementing this kernel.
    pub fn pairwise_test(self) -> &'static dyn PairwiseTest {
        match self {
            Self::Projected => &PROJECTED,
            Self::Simplex => &SIMPLEX,
        }
    }
}

/// Parameters of the adjacency cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairRules {
    /// Adjacency tolerance.
    pub epsilon: f64,
    /// Angular cutoff; `None` skips the angular reject.
    pub limit_radian: Option<f64>,
    /// Exact test implementation.
    pub kernel: ContainmentKernel,
}

/// Decide whether two distinct clusters must merge.
///
/// Degenerate geometry in the exact test makes the pair non-adjacent.
pub fn adjacent(a: &ClusterView, b: &ClusterView, rules: &PairRules) -> Result<bool> {
    if a.was_complete && b.was_complete {
        return Ok(false);
    }

    if a.len == 1 && b.len == 1 {
        let reach = a.reach().max(b.reach());
        return Ok(squared_euclidean(&a.points[0], &b.points[0]) <= reach * reach);
    }

    let half_sum = (a.cube.diagonal() + b.cube.diagonal()) / 2.0;
    let separated = a
        .centroid()
        .iter()
        .zip(b.centroid())
        .any(|(x, y)| (x - y).abs() > half_sum);
    if separated {
        return Ok(false);
    }

    if let Some(limit) = rules.limit_radian {
        let (na, nb) = (norm(a.centroid()), norm(b.centroid()));
        if na > f64::EPSILON && nb > f64::EPSILON {
            let cos = (dot(a.centroid(), b.centroid()) / (na * nb)).clamp(-1.0, 1.0);
            if cos.acos() > limit {
                return Ok(false);
            }
        }
    }

    let reject = DISTANCE_REJECT_FACTOR * rules.epsilon;
    if min_squared_distance(&a.points, &b.points) > reject * reject {
        return Ok(false);
    }

    // Both directions always run, so the outcome does not depend on argument order.
    let test = rules.kernel.pairwise_test();
    let mut hit = false;
    for (cube, points) in [(&a.cube, &b.points), (&b.cube, &a.points)] {
        match test.contains_any(cube, points) {
            Ok(inside) => hit |= inside,
            Err(Error::DegenerateGeometry { dim }) => {
                debug!("degenerate {dim}-d volume in containment test; pair left unmerged");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(hit)
}

fn min_squared_distance(a: &[Vec<f64>], b: &[Vec<f64>]) -> f64 {
    a.iter()
        .flat_map(|p| b.iter().map(move |q| squared_euclidean(p, q)))
        .fold(f64::INFINITY, f64::min)
}
