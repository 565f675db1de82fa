//! Sparse linear solve for the implicit engine
//!
//! The Crank-Nicolson system `A·x = b` is nonsymmetric (the advection block
//! is skew), so conjugate gradients is out; BiCGSTAB with a Jacobi (diagonal)
//! preconditioner handles it well at the mesh sizes this crate targets. Both
//! the matrix-vector product and the iteration are hand-rolled over the CSR
//! storage: the kernel is a dozen lines and keeping it local avoids pinning
//! the crate to any particular sparse-ops API.
//!
//! All failure modes surface as [`TransportError::SingularSystem`]: a zero
//! diagonal entry (Jacobi undefined), iteration breakdown (`ρ → 0` or
//! `tᵀt → 0`), divergence to non-finite residuals, or exhausting
//! `max_iterations` without convergence.

use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

use crate::error::TransportError;

/// Near-zero guard for breakdown detection.
const BREAKDOWN_EPS: f64 = 1e-30;

/// Convergence and iteration limits for the sparse solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Relative tolerance on the residual norm (vs `‖b‖`).
    pub rtol: f64,
    /// Absolute tolerance floor on the residual norm.
    pub atol: f64,
    /// Iteration cap before declaring non-convergence.
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-10,
            atol: 1e-12,
            max_iterations: 1000,
        }
    }
}

/// Sparse matrix-vector product `y = A·x` over CSR storage.
pub(crate) fn spmv(a: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    debug_assert_eq!(a.ncols(), x.len());
    let mut y = DVector::zeros(a.nrows());
    for (row, lane) in a.row_iter().enumerate() {
        let mut acc = 0.0;
        for (&col, &value) in lane.col_indices().iter().zip(lane.values()) {
            acc += value * x[col];
        }
        y[row] = acc;
    }
    y
}

/// Inverse-diagonal (Jacobi) preconditioner.
///
/// Fails with [`TransportError::SingularSystem`] when any diagonal entry is
/// missing or zero.
fn jacobi_inverse_diagonal(a: &CsrMatrix<f64>) -> Result<DVector<f64>, TransportError> {
    let n = a.nrows();
    let mut inv_diag = DVector::zeros(n);
    for (row, lane) in a.row_iter().enumerate() {
        let mut diag = 0.0;
        for (&col, &value) in lane.col_indices().iter().zip(lane.values()) {
            if col == row {
                diag = value;
                break;
            }
        }
        if diag == 0.0 || !diag.is_finite() {
            return Err(TransportError::SingularSystem(format!(
                "zero or non-finite diagonal at row {row}"
            )));
        }
        inv_diag[row] = 1.0 / diag;
    }
    Ok(inv_diag)
}

/// Solve `A·x = b` with Jacobi-preconditioned BiCGSTAB.
///
/// `x0` seeds the iteration (the previous timestep's solution is an
/// excellent guess for Crank-Nicolson); `None` starts from zero.
pub fn bicgstab(
    a: &CsrMatrix<f64>,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    config: &SolverConfig,
) -> Result<DVector<f64>, TransportError> {
    debug_assert_eq!(a.nrows(), a.ncols());
    debug_assert_eq!(a.nrows(), b.len());

    let inv_diag = jacobi_inverse_diagonal(a)?;

    let mut x = match x0 {
        Some(seed) => seed.clone(),
        None => DVector::zeros(b.len()),
    };
    let mut r = b - spmv(a, &x);

    let tolerance = (config.rtol * b.norm()).max(config.atol);
    if r.norm() <= tolerance {
        return Ok(x);
    }

    let r_hat = r.clone();
    let mut p = r.clone();
    let mut v = DVector::zeros(b.len());
    let mut rho_prev = 1.0;
    let mut alpha = 1.0;
    let mut omega = 1.0;

    for iteration in 0..config.max_iterations {
        let rho = r_hat.dot(&r);
        if rho.abs() < BREAKDOWN_EPS {
            return Err(TransportError::SingularSystem(format!(
                "BiCGSTAB breakdown (rho ~ 0) at iteration {iteration}"
            )));
        }
        if iteration > 0 {
            let beta = (rho / rho_prev) * (alpha / omega);
            p = &r + beta * (&p - omega * &v);
        }

        let p_hat = inv_diag.component_mul(&p);
        v = spmv(a, &p_hat);
        let denom = r_hat.dot(&v);
        if denom.abs() < BREAKDOWN_EPS {
            return Err(TransportError::SingularSystem(format!(
                "BiCGSTAB breakdown (r̂·v ~ 0) at iteration {iteration}"
            )));
        }
        alpha = rho / denom;

        let s = &r - alpha * &v;
        if s.norm() <= tolerance {
            x += alpha * &p_hat;
            debug!("BiCGSTAB converged at half-iteration {iteration}");
            return Ok(x);
        }

        let s_hat = inv_diag.component_mul(&s);
        let t = spmv(a, &s_hat);
        let tt = t.dot(&t);
        if tt < BREAKDOWN_EPS {
            return Err(TransportError::SingularSystem(format!(
                "BiCGSTAB breakdown (t·t ~ 0) at iteration {iteration}"
            )));
        }
        omega = t.dot(&s) / tt;

        x += alpha * &p_hat + omega * &s_hat;
        r = s - omega * &t;

        let residual = r.norm();
        if !residual.is_finite() {
            return Err(TransportError::SingularSystem(format!(
                "BiCGSTAB diverged (non-finite residual) at iteration {iteration}"
            )));
        }
        if residual <= tolerance {
            debug!("BiCGSTAB converged after {} iterations", iteration + 1);
            return Ok(x);
        }
        if omega.abs() < BREAKDOWN_EPS {
            return Err(TransportError::SingularSystem(format!(
                "BiCGSTAB breakdown (omega ~ 0) at iteration {iteration}"
            )));
        }

        rho_prev = rho;
    }

    Err(TransportError::SingularSystem(format!(
        "no convergence after {} iterations",
        config.max_iterations
    )))
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra_sparse::CooMatrix;

    fn csr_from_dense(rows: usize, cols: usize, entries: &[(usize, usize, f64)]) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(rows, cols);
        for &(r, c, v) in entries {
            coo.push(r, c, v);
        }
        CsrMatrix::from(&coo)
    }

    #[test]
    fn test_spmv_small() {
        let a = csr_from_dense(2, 2, &[(0, 0, 2.0), (0, 1, 1.0), (1, 1, 3.0)]);
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let y = spmv(&a, &x);
        assert_relative_eq!(y[0], 4.0, epsilon = 1e-14);
        assert_relative_eq!(y[1], 6.0, epsilon = 1e-14);
    }

    #[test]
    fn test_identity_solve_is_immediate() {
        let a = csr_from_dense(3, 3, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)]);
        let b = DVector::from_vec(vec![1.0, -2.0, 3.0]);
        let x = bicgstab(&a, &b, None, &SolverConfig::default()).unwrap();
        for k in 0..3 {
            assert_relative_eq!(x[k], b[k], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_spd_system() {
        // A = [[4,1,0],[1,3,1],[0,1,2]], x_exact = [1,2,3], b = A·x.
        let a = csr_from_dense(
            3,
            3,
            &[
                (0, 0, 4.0),
                (0, 1, 1.0),
                (1, 0, 1.0),
                (1, 1, 3.0),
                (1, 2, 1.0),
                (2, 1, 1.0),
                (2, 2, 2.0),
            ],
        );
        let b = DVector::from_vec(vec![6.0, 10.0, 8.0]);
        let x = bicgstab(&a, &b, None, &SolverConfig::default()).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-8);
        assert_relative_eq!(x[2], 3.0, epsilon = 1e-8);
    }

    #[test]
    fn test_nonsymmetric_system() {
        // Advection-like skew part on top of a dominant diagonal.
        let a = csr_from_dense(
            3,
            3,
            &[
                (0, 0, 5.0),
                (0, 1, 1.0),
                (1, 0, -1.0),
                (1, 1, 5.0),
                (1, 2, 1.0),
                (2, 1, -1.0),
                (2, 2, 5.0),
            ],
        );
        let x_exact = DVector::from_vec(vec![1.0, -1.0, 2.0]);
        let b = spmv(&a, &x_exact);
        let x = bicgstab(&a, &b, None, &SolverConfig::default()).unwrap();
        for k in 0..3 {
            assert_relative_eq!(x[k], x_exact[k], epsilon = 1e-8);
        }
    }

    #[test]
    fn test_warm_start_converges() {
        let a = csr_from_dense(2, 2, &[(0, 0, 2.0), (1, 1, 4.0)]);
        let b = DVector::from_vec(vec![2.0, 8.0]);
        let seed = DVector::from_vec(vec![0.9, 2.1]);
        let x = bicgstab(&a, &b, Some(&seed), &SolverConfig::default()).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_zero_diagonal_is_singular() {
        let a = csr_from_dense(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        assert!(matches!(
            bicgstab(&a, &b, None, &SolverConfig::default()),
            Err(TransportError::SingularSystem(_))
        ));
    }

    #[test]
    fn test_iteration_cap_reported() {
        // 20-point 1D Poisson matrix with an absurdly low iteration cap.
        let n = 20;
        let mut entries = Vec::new();
        for row in 0..n {
            entries.push((row, row, 2.0));
            if row > 0 {
                entries.push((row, row - 1, -1.0));
            }
            if row + 1 < n {
                entries.push((row, row + 1, -1.0));
            }
        }
        let a = csr_from_dense(n, n, &entries);
        let b = DVector::from_element(n, 1.0);
        let config = SolverConfig {
            rtol: 1e-15,
            atol: 0.0,
            max_iterations: 1,
        };
        let result = bicgstab(&a, &b, None, &config);
        assert!(matches!(result, Err(TransportError::SingularSystem(_))));
    }
}
