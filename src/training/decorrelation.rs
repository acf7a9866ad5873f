//! Linear decorrelation of input variables
//!
//! Maps `x` to `C^{-1/2} (x - mean)`, where `C` is the covariance of the
//! training sample. The symmetric square root comes from a cyclic Jacobi
//! eigen-decomposition.

use crate::error::{Result, StargalError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Relative eigenvalue floor; directions below it carry no information
const EIGEN_FLOOR: f64 = 1e-12;
const MAX_SWEEPS: usize = 100;

/// Fitted decorrelation transform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decorrelation {
    means: Array1<f64>,
    matrix: Array2<f64>,
}

impl Decorrelation {
    /// Estimate the transform from the rows of `x`.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let n = x.nrows();
        if n < 2 {
            return Err(StargalError::Training(
                "decorrelation needs at least 2 events".to_string(),
            ));
        }

        let means = x
            .mean_axis(Axis(0))
            .ok_or_else(|| StargalError::Training("empty training matrix".to_string()))?;
        let centered = x - &means;
        let covariance = centered.t().dot(&centered) / (n - 1) as f64;

        let (eigenvalues, eigenvectors) = jacobi_eigen(&covariance);
        let largest = eigenvalues.iter().cloned().fold(0.0f64, f64::max);

        let d = covariance.nrows();
        let mut matrix = Array2::zeros((d, d));
        for (k, &lambda) in eigenvalues.iter().enumerate() {
            if lambda <= EIGEN_FLOOR * largest.max(f64::MIN_POSITIVE) {
                continue;
            }
            let scale = 1.0 / lambda.sqrt();
            let v = eigenvectors.column(k);
            for i in 0..d {
                for j in 0..d {
                    matrix[[i, j]] += scale * v[i] * v[j];
                }
            }
        }

        Ok(Self { means, matrix })
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    /// Transform one event
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        self.matrix.dot(&(&row - &self.means))
    }

    /// Transform every row of `x`
    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.means).dot(&self.matrix.t())
    }
}

/// Eigenvalues and column eigenvectors of a symmetric matrix.
fn jacobi_eigen(a: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let d = a.nrows();
    let mut a = a.clone();
    let mut v = Array2::<f64>::eye(d);

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..d)
            .flat_map(|i| (0..d).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]] * a[[i, j]])
            .sum();
        let diag: f64 = (0..d).map(|i| a[[i, i]] * a[[i, i]]).sum();
        if off <= 1e-24 * diag.max(f64::MIN_POSITIVE) {
            break;
        }

        for p in 0..d {
            for q in (p + 1)..d {
                let apq = a[[p, q]];
                if apq.abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..d {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..d {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..d {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    ((0..d).map(|i| a[[i, i]]).collect(), v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::prelude::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn covariance(x: &Array2<f64>) -> Array2<f64> {
        let means = x.mean_axis(Axis(0)).unwrap();
        let c = x - &means;
        c.t().dot(&c) / (x.nrows() - 1) as f64
    }

    #[test]
    fn test_jacobi_reconstructs_matrix() {
        let a = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 2.0]];
        let (values, vectors) = jacobi_eigen(&a);
        let lambda = Array2::from_diag(&Array1::from_vec(values));
        let rebuilt = vectors.dot(&lambda).dot(&vectors.t());
        for (x, y) in a.iter().zip(rebuilt.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_output_covariance_is_identity() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let x = Array2::from_shape_fn((500, 3), |_| rng.gen::<f64>());
        let mixed = array![[1.0, 0.8, 0.0], [0.0, 1.0, 0.5], [0.3, 0.0, 2.0]];
        let x = x.dot(&mixed);

        let transform = Decorrelation::fit(&x).unwrap();
        let cov = covariance(&transform.transform(&x));
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((cov[[i, j]] - expected).abs() < 1e-6, "cov[{},{}] = {}", i, j, cov[[i, j]]);
            }
        }
    }

    #[test]
    fn test_row_and_matrix_transform_agree() {
        let x = array![[1.0, 2.0], [2.0, 3.5], [3.0, 3.0], [4.0, 6.0]];
        let transform = Decorrelation::fit(&x).unwrap();
        let all = transform.transform(&x);
        let one = transform.transform_row(x.row(2));
        for j in 0..2 {
            assert!((all[[2, j]] - one[j]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_is_dropped() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let transform = Decorrelation::fit(&x).unwrap();
        let out = transform.transform(&x);
        assert!(out.iter().all(|v| v.is_finite()));
        assert!(out.column(1).iter().all(|v| v.abs() < 1e-9));
    }
}
