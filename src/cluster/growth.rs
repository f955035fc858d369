//! Growth policies.
//!
//! Each growth step first re-tightens a cluster's volume around its members
//! (plus the epsilon margin), then asks a [`GrowthPolicy`] how much to add on
//! top. The schedule depends on how many steps the cluster (or the dominant
//! cluster it was merged from) has already taken, so merged clusters continue
//! where their largest constituent left off.
//!
//! The two built-in policies are deliberately simple; any type implementing
//! [`GrowthPolicy`] can be installed with
//! [`Clusterer::with_growth_policy`](super::Clusterer::with_growth_policy).

use std::fmt::Debug;

use super::config::{CubeParams, GrowFunction};

/// Inputs to one growth step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthStep {
    /// Dimensionality.
    pub dim: usize,
    /// Current member count.
    pub n: usize,
    /// Volume before this step.
    pub volume: f64,
    /// Member count inherited from the dominant constituent.
    pub prev_n: usize,
    /// Volume inherited from the dominant constituent.
    pub prev_v: f64,
    /// Step number, starting at 1.
    pub counter: usize,
    /// Adjacency tolerance.
    pub epsilon: f64,
    /// Learning-rate multiplier.
    pub lr: f64,
}

impl GrowthStep {
    /// Base increment shared by the built-in policies: `2·ε·lr·counter`.
    pub fn base_increment(&self) -> f64 {
        2.0 * self.epsilon * self.lr * self.counter as f64
    }
}

/// Extra `(length, width)` added on top of the tight, epsilon-padded extents.
pub trait GrowthPolicy: Debug + Send + Sync {
    /// Both values must be finite and non-negative.
    fn increments(&self, step: &GrowthStep) -> (f64, f64);
}

/// Fixed schedule, elongated along the principal axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalGrowth {
    /// Principal-axis multiplier.
    pub elongate_grow: f64,
}

impl GrowthPolicy for NormalGrowth {
    fn increments(&self, step: &GrowthStep) -> (f64, f64) {
        let base = step.base_increment();
        (base * self.elongate_grow, base)
    }
}

/// Schedule scaled by how sparse the cluster is compared with its inherited density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityGrowth;

impl DensityGrowth {
    // Bounds on the sparsity factor, so a single sparse merge cannot explode a volume.
    const MIN_FACTOR: f64 = 0.25;
    const MAX_FACTOR: f64 = 4.0;

    /// `sqrt(reference_density / current_density)`, clamped.
    ///
    /// Returns 1 when either density is undefined.
    pub fn sparsity(step: &GrowthStep) -> f64 {
        if step.volume <= 0.0 || step.prev_v <= 0.0 || step.n == 0 || step.prev_n == 0 {
            return 1.0;
        }
        let current = step.n as f64 / step.volume;
        let reference = step.prev_n as f64 / step.prev_v;
        (reference / current)
            .sqrt()
            .clamp(Self::MIN_FACTOR, Self::MAX_FACTOR)
    }
}

impl GrowthPolicy for DensityGrowth {
    fn increments(&self, step: &GrowthStep) -> (f64, f64) {
        let base = step.base_increment();
        (base * Self::sparsity(step), base)
    }
}

/// Built-in policy selected by `params.grow_function`.
pub(crate) fn policy_for(params: &CubeParams) -> Box<dyn GrowthPolicy> {
    match params.grow_function {
        GrowFunction::Normal => Box::new(NormalGrowth {
            elongate_grow: params.elongate_grow,
        }),
        GrowFunction::Density => Box::new(DensityGrowth),
    }
}
