#[derive(Clone, Debug)]
pub(crate) struct UnionFind {
    pub(crate) parent: Vec<usize>,
    pub(crate) size: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub(crate) fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }

        // Union by size.
        let (mut big, mut small) = (ra, rb);
        if self.size[big] < self.size[small] {
            std::mem::swap(&mut big, &mut small);
        }

        self.parent[small] = big;
        self.size[big] += self.size[small];
        big
    }

    /// Group `0..n` by root.
    ///
    /// Components are ordered by their smallest element and members are ascending,
    /// so the result does not depend on the union order.
    pub(crate) fn components(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut slot = vec![usize::MAX; n];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            let root = self.find(i);
            if slot[root] == usize::MAX {
                slot[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot[root]].push(i);
        }
        groups
    }
}

#[inline]
pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
pub(crate) fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Component-wise mean of a non-empty set of equal-length vectors.
pub(crate) fn mean<'a>(points: impl IntoIterator<Item = &'a [f64]>, dim: usize) -> Vec<f64> {
    let mut acc = vec![0.0; dim];
    let mut count = 0usize;
    for p in points {
        for (a, x) in acc.iter_mut().zip(p) {
            *a += x;
        }
        count += 1;
    }
    if count > 0 {
        let inv = 1.0 / count as f64;
        acc.iter_mut().for_each(|a| *a *= inv);
    }
    acc
}

/// Orthonormal frame whose first row is `direction`.
///
/// The remaining rows come from Gram-Schmidt over the coordinate axes. A direction
/// too close to zero is replaced by the first coordinate axis.
pub(crate) fn orthonormal_frame(direction: &[f64]) -> Vec<Vec<f64>> {
    const TINY: f64 = 1e-12;
    let dim = direction.len();
    let mut frame: Vec<Vec<f64>> = Vec::with_capacity(dim);

    let len = norm(direction);
    if len > TINY {
        frame.push(direction.iter().map(|x| x / len).collect());
    } else {
        let mut e0 = vec![0.0; dim];
        e0[0] = 1.0;
        frame.push(e0);
    }

    for k in 0..dim {
        if frame.len() == dim {
            break;
        }
        let mut v = vec![0.0; dim];
        v[k] = 1.0;
        for axis in &frame {
            let proj = dot(&v, axis);
            for (x, a) in v.iter_mut().zip(axis) {
                *x -= proj * a;
            }
        }
        let len = norm(&v);
        // Coordinate axes span the space, so at least `dim - 1` survive this cut.
        if len > 1e-9 {
            v.iter_mut().for_each(|x| *x /= len);
            frame.push(v);
        }
    }
    frame
}

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
///
/// `a` is row-major `n × n`. Returns `None` when a pivot is below `tol`.
pub(crate) fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>, tol: f64) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < tol {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn union_find_components_are_ordered() {
        let mut uf = UnionFind::new(6);
        uf.union(4, 1);
        uf.union(5, 3);
        uf.union(3, 0);
        assert_eq!(
            uf.components(),
            vec![vec![0, 3, 5], vec![1, 4], vec![2]]
        );
    }

    #[test]
    fn frame_is_orthonormal() {
        let frame = orthonormal_frame(&[3.0, 4.0, 0.0]);
        assert_eq!(frame.len(), 3);
        assert_abs_diff_eq!(frame[0][0], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(frame[0][1], 0.8, epsilon = 1e-12);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(dot(&frame[i], &frame[j]), expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn frame_at_origin_uses_first_axis() {
        let frame = orthonormal_frame(&[0.0, 0.0]);
        assert_eq!(frame, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn solve_small_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve(a, vec![3.0, 5.0], 1e-12).unwrap();
        assert_abs_diff_eq!(x[0], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 1.4, epsilon = 1e-12);
    }

    #[test]
    fn solve_singular_is_none() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve(a, vec![1.0, 2.0], 1e-12).is_none());
    }
}
