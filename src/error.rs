//! Error taxonomy for the transport core
//!
//! # Design Philosophy
//!
//! Every failure the core can produce falls into one of four categories,
//! all fatal for the operation that raised them:
//!
//! - [`TransportError::InvalidDomain`] — malformed grid geometry, raised at
//!   construction time and never later.
//! - [`TransportError::InvalidParameters`] — non-physical coefficients,
//!   checked before each run (and cheaply re-checked per step).
//! - [`TransportError::DimensionMismatch`] — a field whose shape disagrees
//!   with the domain. This is a programmer error, not a user error.
//! - [`TransportError::SingularSystem`] — the FEM sparse solve failed to
//!   converge or the system matrix is singular. The caller may retry with a
//!   smaller `dt`; the engine never retries on its own.
//!
//! All errors propagate immediately to the caller; none are swallowed. The
//! explicit engine's negative-value clamp is a numerical-domain policy
//! (concentrations are physically non-negative), not an error path.

use thiserror::Error;

/// Errors produced by the transport core.
///
/// # Example
///
/// ```rust
/// use adr_rs::{Domain, TransportError};
///
/// let err = Domain::cells(1, 40, 100.0, 20.0).unwrap_err();
/// assert!(matches!(err, TransportError::InvalidDomain(_)));
/// ```
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Malformed grid dimensions or extents (construction-time).
    #[error("invalid domain: {0}")]
    InvalidDomain(String),

    /// Non-physical coefficients or an unsupported source descriptor.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Concentration field shape disagrees with the domain.
    #[error(
        "dimension mismatch: field is {field_rows}x{field_cols}, \
         domain expects {expected_rows}x{expected_cols}"
    )]
    DimensionMismatch {
        field_rows: usize,
        field_cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    /// The FEM linear system is singular or the iterative solve failed.
    #[error("singular system: {0}")]
    SingularSystem(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = TransportError::InvalidDomain("nx must be >= 2, got 1".into());
        assert!(err.to_string().contains("invalid domain"));

        let err = TransportError::DimensionMismatch {
            field_rows: 10,
            field_cols: 20,
            expected_rows: 40,
            expected_cols: 80,
        };
        let msg = err.to_string();
        assert!(msg.contains("10x20"));
        assert!(msg.contains("40x80"));
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = TransportError::SingularSystem("no convergence after 1000 iterations".into());
        let other = err.clone();
        assert_eq!(err.to_string(), other.to_string());
    }
}
