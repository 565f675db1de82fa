//! Concentration field storage
//!
//! A [`ConcentrationField`] is a dense snapshot of the scalar concentration
//! over the channel: `ny` rows (cross-channel) × `nx` columns (along-channel)
//! in a `nalgebra::DMatrix<f64>`, indexed `(row, col)` = `(j, i)`.
//!
//! # Memory layout and the FEM nodal vector
//!
//! `DMatrix` is column-major, so column `i` (one cross-channel profile) is
//! contiguous and the flat offset of `(j, i)` is `i·ny + j` — exactly
//! [`crate::Domain::node_index`]. The conversions [`ConcentrationField::to_nodal_vector`]
//! and [`ConcentrationField::from_nodal_vector`] therefore copy straight
//! through with no permutation.
//!
//! Fields are value types: engines take a field by reference and return a new
//! one, never mutating their input.

use nalgebra::{DMatrix, DVector};

use crate::domain::Domain;
use crate::error::TransportError;

/// Dense 2D concentration snapshot \[kg/m³\] (or any consistent unit).
///
/// # Example
///
/// ```rust
/// use adr_rs::{ConcentrationField, Domain};
///
/// let domain = Domain::cells(80, 40, 100.0, 20.0).unwrap();
/// let mut field = ConcentrationField::zeros(&domain);
/// field.set(5, 10, 2.5);
/// assert_eq!(field.get(5, 10), 2.5);
/// assert_eq!(field.max(), 2.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConcentrationField {
    data: DMatrix<f64>,
}

impl ConcentrationField {
    /// All-zero field matching the domain's shape.
    pub fn zeros(domain: &Domain) -> Self {
        Self {
            data: DMatrix::zeros(domain.ny(), domain.nx()),
        }
    }

    /// Wrap an existing matrix, checking its shape against the domain.
    pub fn from_matrix(domain: &Domain, data: DMatrix<f64>) -> Result<Self, TransportError> {
        if data.nrows() != domain.ny() || data.ncols() != domain.nx() {
            return Err(TransportError::DimensionMismatch {
                field_rows: data.nrows(),
                field_cols: data.ncols(),
                expected_rows: domain.ny(),
                expected_cols: domain.nx(),
            });
        }
        Ok(Self { data })
    }

    /// Gaussian spill centered at the physical point `(x0, y0)`:
    /// `C(x, y) = c0 · exp(−((x−x0)² + (y−y0)²) / (2σ²))`.
    ///
    /// The classic initial condition for an instantaneous release that has
    /// already spread over a small patch.
    pub fn gaussian_spill(domain: &Domain, x0: f64, y0: f64, sigma: f64, c0: f64) -> Self {
        let inv_two_sigma2 = 1.0 / (2.0 * sigma * sigma);
        let data = DMatrix::from_fn(domain.ny(), domain.nx(), |j, i| {
            let dx = domain.x(i) - x0;
            let dy = domain.y(j) - y0;
            c0 * (-(dx * dx + dy * dy) * inv_two_sigma2).exp()
        });
        Self { data }
    }

    // ==================== Element access ====================

    /// Value at row `j` (cross-channel), column `i` (along-channel).
    #[inline]
    pub fn get(&self, j: usize, i: usize) -> f64 {
        self.data[(j, i)]
    }

    /// Set the value at row `j`, column `i`.
    #[inline]
    pub fn set(&mut self, j: usize, i: usize, value: f64) {
        self.data[(j, i)] = value;
    }

    /// Number of rows (cross-channel samples).
    #[inline]
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns (along-channel samples).
    #[inline]
    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Largest value in the field.
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Borrow the backing matrix.
    #[inline]
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Column-major flat view; offset of `(j, i)` is `i·nrows + j`.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice()
    }

    /// Mutable column-major flat view.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data.as_mut_slice()
    }

    // ==================== Nodal vector round-trip ====================

    /// Flatten to a nodal vector in [`Domain::node_index`] order.
    pub fn to_nodal_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }

    /// Rebuild a field from a nodal vector in [`Domain::node_index`] order.
    pub fn from_nodal_vector(
        domain: &Domain,
        vector: &DVector<f64>,
    ) -> Result<Self, TransportError> {
        if vector.len() != domain.len() {
            return Err(TransportError::DimensionMismatch {
                field_rows: vector.len(),
                field_cols: 1,
                expected_rows: domain.ny(),
                expected_cols: domain.nx(),
            });
        }
        Ok(Self {
            data: DMatrix::from_column_slice(domain.ny(), domain.nx(), vector.as_slice()),
        })
    }

    /// Shape check against a domain (`DimensionMismatch` on disagreement).
    pub fn check_shape(&self, domain: &Domain) -> Result<(), TransportError> {
        if self.data.nrows() != domain.ny() || self.data.ncols() != domain.nx() {
            return Err(TransportError::DimensionMismatch {
                field_rows: self.data.nrows(),
                field_cols: self.data.ncols(),
                expected_rows: domain.ny(),
                expected_cols: domain.nx(),
            });
        }
        Ok(())
    }
}

// =================================================================================================
// Tests
// =================================================================================================
