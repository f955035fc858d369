//! A single growing cluster.
//!
//! ```text
//!   New ──grow()──▶ Growing ──grow()──▶ Complete
//!                     │  ▲
//!                     └──┘  (until grow_limit, or the step stalls)
//! ```
//!
//! Clusters never absorb points on their own: membership only changes through
//! [`Cluster::merge`], which consumes its constituents.

use std::cmp::Reverse;

use super::config::CubeParams;
use super::cube::RotatedCube;
use super::growth::{GrowthPolicy, GrowthStep};
use super::util::{self, orthonormal_frame};
use crate::error::{Error, Result};

/// An input coordinate tagged with its position in the input slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    index: usize,
    coords: Vec<f64>,
}

impl Point {
    /// Tag `coords` with its input position.
    pub fn new(index: usize, coords: Vec<f64>) -> Self {
        Self { index, coords }
    }

    /// Position in the original input.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Coordinates.
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }
}

/// Growth state of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthState {
    /// Created and not grown yet.
    New,
    /// Grown at least once, may grow further.
    Growing,
    /// Saturated; further `grow()` calls are no-ops.
    Complete,
}

/// A group of points with its oriented bounding volume.
#[derive(Debug, Clone)]
pub struct Cluster {
    members: Vec<Point>,
    centroid: Vec<f64>,
    cube: RotatedCube,
    growth_counter: usize,
    prev_n: usize,
    prev_v: f64,
    state: GrowthState,
    was_complete: bool,
}

impl Cluster {
    /// One-point cluster, its volume a `2ε` cube around the point.
    pub fn singleton(point: Point, epsilon: f64) -> Result<Self> {
        let centroid = point.coords.clone();
        let members = vec![point];
        let cube = padded_cube(&members, &centroid, epsilon)?;
        let prev_v = extent_volume(cube.length(), cube.width(), centroid.len());

        Ok(Self {
            members,
            centroid,
            cube,
            growth_counter: 0,
            prev_n: 1,
            prev_v,
            state: GrowthState::New,
            was_complete: false,
        })
    }

    /// Merge `parts` into one cluster.
    ///
    /// Growth bookkeeping (`growth_counter`, state, was-complete flag) comes from the
    /// constituent with the most members (lowest position on ties), and its current
    /// size and volume seed `prev_n`/`prev_v`.
    pub fn merge(parts: Vec<Cluster>, epsilon: f64) -> Result<Self> {
        let dominant = parts
            .iter()
            .enumerate()
            .min_by_key(|(i, c)| (Reverse(c.len()), *i))
            .map(|(i, _)| i)
            .ok_or_else(|| Error::InvariantViolation("merge of zero clusters".to_string()))?;

        let growth_counter = parts[dominant].growth_counter;
        let state = parts[dominant].state;
        let was_complete = parts[dominant].was_complete;
        let prev_n = parts[dominant].len();
        let prev_v = parts[dominant].volume();

        let members: Vec<Point> = parts.into_iter().flat_map(|c| c.members).collect();
        if members.is_empty() {
            return Err(Error::InvariantViolation(
                "merge produced an empty cluster".to_string(),
            ));
        }

        let dim = members[0].coords.len();
        let centroid = util::mean(members.iter().map(|p| p.coords.as_slice()), dim);
        let cube = padded_cube(&members, &centroid, epsilon)?;

        Ok(Self {
            members,
            centroid,
            cube,
            growth_counter,
            prev_n,
            prev_v,
            state,
            was_complete,
        })
    }

    /// Take one growth step.
    ///
    /// Re-tightens the volume around the members, then enlarges it by the policy's
    /// increments. The cluster becomes complete once `grow_limit` steps have been
    /// taken or when neither extent changes by more than `min_diff`.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] if the cluster has no members.
    pub fn grow(&mut self, params: &CubeParams, policy: &dyn GrowthPolicy) -> Result<()> {
        if self.members.is_empty() {
            return Err(Error::InvariantViolation(
                "grow() called on a cluster with no members".to_string(),
            ));
        }
        if self.state == GrowthState::Complete {
            return Ok(());
        }
        if self.growth_counter >= params.grow_limit {
            self.state = GrowthState::Complete;
            return Ok(());
        }

        self.growth_counter += 1;
        self.state = GrowthState::Growing;

        let step = GrowthStep {
            dim: self.dim(),
            n: self.len(),
            volume: self.volume(),
            prev_n: self.prev_n,
            prev_v: self.prev_v,
            counter: self.growth_counter,
            epsilon: params.epsilon,
            lr: params.lr,
        };
        let (dl, dw) = policy.increments(&step);
        if !(dl.is_finite() && dl >= 0.0 && dw.is_finite() && dw >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "growth increment",
                message: "policy returned a negative or non-finite value",
            });
        }

        let (tight_l, tight_w) = tight_extents(&self.members, &self.centroid);
        let length = tight_l + 2.0 * params.epsilon + dl;
        let width = tight_w + 2.0 * params.epsilon + dw;
        let change = (length - self.cube.length())
            .abs()
            .max((width - self.cube.width()).abs());

        self.cube = RotatedCube::new(&self.centroid, length, width)?;

        if self.growth_counter >= params.grow_limit || change <= params.min_diff {
            self.state = GrowthState::Complete;
        }
        Ok(())
    }

    /// Shrink the volume to the members with no epsilon margin.
    ///
    /// Only used for reporting; idempotent.
    pub fn compress(&mut self) -> Result<()> {
        let (length, width) = tight_extents(&self.members, &self.centroid);
        self.cube = RotatedCube::new(&self.centroid, length, width)?;
        Ok(())
    }

    /// Record the current completion state as the one seen by the next iteration.
    pub fn settle(&mut self) {
        self.was_complete = self.is_complete();
    }

    /// Size measure `length · width^(n-1)`.
    pub fn volume(&self) -> f64 {
        extent_volume(self.cube.length(), self.cube.width(), self.dim())
    }

    /// Member points.
    pub fn members(&self) -> &[Point] {
        &self.members
    }

    /// Input indices of the members.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().map(Point::index)
    }

    /// Member count.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// `true` if the cluster has no members (never the case for live clusters).
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Exactly one member.
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// Mean of the member coordinates.
    pub fn centroid(&self) -> &[f64] {
        &self.centroid
    }

    /// Dimensionality.
    pub fn dim(&self) -> usize {
        self.centroid.len()
    }

    /// Current bounding volume.
    pub fn bounding_volume(&self) -> &RotatedCube {
        &self.cube
    }

    /// Extent along the principal axis.
    pub fn length(&self) -> f64 {
        self.cube.length()
    }

    /// Extent along the orthogonal axes.
    pub fn width(&self) -> f64 {
        self.cube.width()
    }

    /// Growth steps taken (inherited through merges).
    pub fn growth_counter(&self) -> usize {
        self.growth_counter
    }

    /// Member count inherited at the last merge.
    pub fn prev_n(&self) -> usize {
        self.prev_n
    }

    /// Volume inherited at the last merge.
    pub fn prev_v(&self) -> f64 {
        self.prev_v
    }

    /// Current growth state.
    pub fn state(&self) -> GrowthState {
        self.state
    }

    /// The cluster is saturated.
    pub fn is_complete(&self) -> bool {
        self.state == GrowthState::Complete
    }

    /// The cluster (or its dominant constituent) was already complete at the last
    /// settle point.
    pub fn was_complete(&self) -> bool {
        self.was_complete
    }
}

fn extent_volume(length: f64, width: f64, dim: usize) -> f64 {
    length * width.powi(dim.saturating_sub(1) as i32)
}

/// Full extents `(length, width)` enclosing `members` in the principal frame of
/// `centroid`.
///
/// Width is twice the largest residual norm off the principal axis, so every
/// orthogonal coordinate fits as well.
fn tight_extents(members: &[Point], centroid: &[f64]) -> (f64, f64) {
    let frame = orthonormal_frame(centroid);
    let mut half_l: f64 = 0.0;
    let mut half_w: f64 = 0.0;
    for p in members {
        let offset: Vec<f64> = p.coords.iter().zip(centroid).map(|(x, c)| x - c).collect();
        let along = util::dot(&offset, &frame[0]);
        let across = frame[1..]
            .iter()
            .map(|axis| util::dot(&offset, axis).powi(2))
            .sum::<f64>()
            .sqrt();
        half_l = half_l.max(along.abs());
        half_w = half_w.max(across);
    }
    (2.0 * half_l, 2.0 * half_w)
}

fn padded_cube(members: &[Point], centroid: &[f64], epsilon: f64) -> Result<RotatedCube> {
    let (length, width) = tight_extents(members, centroid);
    RotatedCube::new(centroid, length + 2.0 * epsilon, width + 2.0 * epsilon)
}
