//! Oriented bounding volumes ("rotated cubes").
//!
//! A cluster's volume is a hyper-rectangle with one long side along the
//! *principal axis* (the direction from the coordinate origin through the
//! centroid) and one shared extent along every axis orthogonal to it:
//!
//! ```text
//!            width
//!          <------>
//!          +------+  ^
//!          |      |  |
//!          |  c   |  | length        principal axis = c / |c|
//!          |      |  |
//!          +------+  v
//! ```
//!
//! [`CubeGenerator`] produces the axis-aligned box at the origin; [`RotatedCube`]
//! rotates it into the principal frame and translates it to the centroid.

use super::util::{dot, orthonormal_frame};
use crate::error::{Error, Result};

/// Generator for axis-aligned box vertices centred at the origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubeGenerator;

impl CubeGenerator {
    /// Return the `2^dim` vertices of a box with extent `length` on axis 0 and
    /// `width` on every other axis.
    ///
    /// Vertex `m` sits at `+half` on axis `k` when bit `k` of `m` is set, `-half`
    /// otherwise. Two vertices differing in one bit therefore share an edge.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `dim == 0`, or if an extent is negative or
    /// not finite.
    pub fn generate(dim: usize, length: f64, width: f64) -> Result<Vec<Vec<f64>>> {
        if dim == 0 {
            return Err(Error::InvalidParameter {
                name: "dimension",
                message: "must be at least 1",
            });
        }
        if dim >= usize::BITS as usize {
            return Err(Error::InvalidParameter {
                name: "dimension",
                message: "too large to enumerate box vertices",
            });
        }
        if !(length.is_finite() && length >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "length",
                message: "must be finite and non-negative",
            });
        }
        if !(width.is_finite() && width >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "width",
                message: "must be finite and non-negative",
            });
        }

        let half: Vec<f64> = (0..dim)
            .map(|k| if k == 0 { length / 2.0 } else { width / 2.0 })
            .collect();

        Ok((0..1usize << dim)
            .map(|mask| {
                half.iter()
                    .enumerate()
                    .map(|(k, &h)| if mask & (1 << k) != 0 { h } else { -h })
                    .collect()
            })
            .collect())
    }
}

/// Oriented hyper-rectangle around a cluster centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedCube {
    centroid: Vec<f64>,
    /// Row `k` is local axis `k` in world coordinates; row 0 is the principal axis.
    frame: Vec<Vec<f64>>,
    length: f64,
    width: f64,
    vertices: Vec<Vec<f64>>,
}

impl RotatedCube {
    /// Build the volume of extent `length × width^(n-1)` centred on `centroid`.
    ///
    /// Vertex order follows [`CubeGenerator::generate`].
    pub fn new(centroid: &[f64], length: f64, width: f64) -> Result<Self> {
        let local = CubeGenerator::generate(centroid.len(), length, width)?;
        let frame = orthonormal_frame(centroid);

        let vertices = local
            .iter()
            .map(|v| {
                let mut world = centroid.to_vec();
                for (coord, axis) in v.iter().zip(&frame) {
                    for (w, a) in world.iter_mut().zip(axis) {
                        *w += coord * a;
                    }
                }
                world
            })
            .collect();

        Ok(Self {
            centroid: centroid.to_vec(),
            frame,
            length,
            width,
            vertices,
        })
    }

    /// Centre of the volume.
    pub fn centroid(&self) -> &[f64] {
        &self.centroid
    }

    /// Orthonormal frame, principal axis first.
    pub fn frame(&self) -> &[Vec<f64>] {
        &self.frame
    }

    /// Extent along the principal axis.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Extent along each orthogonal axis.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// World-space vertices (`2^dim` of them).
    pub fn vertices(&self) -> &[Vec<f64>] {
        &self.vertices
    }

    /// Dimensionality.
    pub fn dim(&self) -> usize {
        self.centroid.len()
    }

    /// Full diagonal length, `sqrt(length² + (n-1)·width²)`.
    ///
    /// Half of it bounds the volume's extent in every direction.
    pub fn diagonal(&self) -> f64 {
        let rest = (self.dim() - 1) as f64;
        (self.length * self.length + rest * self.width * self.width).sqrt()
    }

    /// Coordinates of `point` in the local frame, relative to the centroid.
    pub fn to_local(&self, point: &[f64]) -> Vec<f64> {
        let offset: Vec<f64> = point
            .iter()
            .zip(&self.centroid)
            .map(|(p, c)| p - c)
            .collect();
        self.frame.iter().map(|axis| dot(&offset, axis)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn generate_counts_vertices() {
        for dim in 1..=5 {
            let v = CubeGenerator::generate(dim, 2.0, 1.0).unwrap();
            assert_eq!(v.len(), 1 << dim);
            assert!(v.iter().all(|p| p.len() == dim));
        }
    }

    #[test]
    fn generate_2d_layout() {
        let v = CubeGenerator::generate(2, 4.0, 2.0).unwrap();
        assert_eq!(
            v,
            vec![
                vec![-2.0, -1.0],
                vec![2.0, -1.0],
                vec![-2.0, 1.0],
                vec![2.0, 1.0],
            ]
        );
    }

    #[test]
    fn generate_rejects_zero_dimension() {
        assert!(matches!(
            CubeGenerator::generate(0, 1.0, 1.0),
            Err(Error::InvalidParameter { name: "dimension", .. })
        ));
    }

    #[test]
    fn generate_rejects_bad_extent() {
        assert!(CubeGenerator::generate(2, -1.0, 1.0).is_err());
        assert!(CubeGenerator::generate(2, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn generate_is_deterministic() {
        let a = CubeGenerator::generate(3, 1.5, 0.5).unwrap();
        let b = CubeGenerator::generate(3, 1.5, 0.5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rotated_cube_aligns_with_centroid_direction() {
        // Centroid on the diagonal: the long side must point along (1, 1)/√2.
        let cube = RotatedCube::new(&[3.0, 3.0], 4.0, 2.0).unwrap();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert_abs_diff_eq!(cube.frame()[0][0], s, epsilon = 1e-12);
        assert_abs_diff_eq!(cube.frame()[0][1], s, epsilon = 1e-12);

        // Vertex 1 is (+2, -1) locally.
        let v = &cube.vertices()[1];
        // The second frame axis is (1, -1)/√2.
        assert_abs_diff_eq!(v[0], 3.0 + 2.0 * s - s, epsilon = 1e-12);
        assert_abs_diff_eq!(v[1], 3.0 + 2.0 * s + s, epsilon = 1e-12);

        let local = cube.to_local(v);
        assert_abs_diff_eq!(local[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(local[1].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn diagonal_covers_all_vertices() {
        let cube = RotatedCube::new(&[1.0, -2.0, 0.5], 3.0, 1.0).unwrap();
        let r = cube.diagonal() / 2.0;
        for v in cube.vertices() {
            let d: f64 = v
                .iter()
                .zip(cube.centroid())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            assert_abs_diff_eq!(d, r, epsilon = 1e-9);
        }
    }
}
