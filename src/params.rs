//! Physical parameter set for a simulation run
//!
//! # Mathematical Background
//!
//! The 2D advection-diffusion-reaction equation governing the concentration
//! field C(x, y, t) is
//!
//! ```text
//! ∂C/∂t + u·∂C/∂x + v·∂C/∂y = ∇·(D ∇C) − (k₁ + k₂)·C + S
//! ```
//!
//! Where:
//! - **u, v** : channel velocity components \[m/s\]
//! - **D**    : symmetric 2×2 diffusion tensor `[[Dxx, Dxy], [Dxy, Dyy]]` \[m²/s\]
//! - **k₁**   : biological degradation rate \[1/s\]
//! - **k₂**   : chemical reaction rate \[1/s\]
//! - **S**    : localized source term
//!
//! A [`Parameters`] value is a read-only snapshot for one run. The explicit
//! engine reads a fresh snapshot every step, so callers may legitimately vary
//! parameters mid-run with that engine; the FEM engine also accepts per-step
//! parameters and rebuilds (or reuses cached) matrices accordingly.
//!
//! # Shore model knobs
//!
//! The explicit engine's shore effects are part of the parameter set rather
//! than hard-wired into the stencil: the velocity floor fraction, the
//! transverse mixing gain, and the two retention factors all have physical
//! defaults matching the reference channel model and validate to `[0, 1]`.

use crate::error::TransportError;

// =================================================================================================
// Diffusion tensor
// =================================================================================================

/// Symmetric anisotropic diffusion tensor `[[Dxx, Dxy], [Dxy, Dyy]]`.
///
/// # Invariants
///
/// `Dxx > 0` and `Dyy > 0`; the off-diagonal coupling `Dxy` may be negative.
/// Validation additionally rejects an indefinite tensor (`det < 0`), which
/// would make the diffusion operator anti-dissipative.
///
/// # Example
///
/// ```rust
/// use adr_rs::DiffusionTensor;
///
/// let d = DiffusionTensor::new(20.0, 2.0, 0.5);
/// assert!(d.anisotropy_ratio() > 9.0);
/// assert!(d.determinant() > 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusionTensor {
    /// Longitudinal diffusivity Dxx \[m²/s\]
    pub dxx: f64,
    /// Transverse diffusivity Dyy \[m²/s\]
    pub dyy: f64,
    /// Cross-coupling Dxy = Dyx \[m²/s\]
    pub dxy: f64,
}

impl DiffusionTensor {
    /// Create a tensor from its three independent components.
    pub fn new(dxx: f64, dyy: f64, dxy: f64) -> Self {
        Self { dxx, dyy, dxy }
    }

    /// Isotropic tensor with no cross-coupling.
    pub fn isotropic(d: f64) -> Self {
        Self::new(d, d, 0.0)
    }

    /// Diagonal tensor with no cross-coupling.
    pub fn diagonal(dxx: f64, dyy: f64) -> Self {
        Self::new(dxx, dyy, 0.0)
    }

    /// Determinant `Dxx·Dyy − Dxy²`.
    #[inline]
    pub fn determinant(&self) -> f64 {
        self.dxx * self.dyy - self.dxy * self.dxy
    }

    /// Eigenvalues of the symmetric tensor, larger first.
    ///
    /// Closed form for a symmetric 2×2 matrix:
    /// `λ = (Dxx+Dyy)/2 ± √(((Dxx−Dyy)/2)² + Dxy²)`.
    pub fn eigenvalues(&self) -> (f64, f64) {
        let mean = 0.5 * (self.dxx + self.dyy);
        let radius = (0.25 * (self.dxx - self.dyy).powi(2) + self.dxy * self.dxy).sqrt();
        (mean + radius, mean - radius)
    }

    /// Anisotropy ratio: max eigenvalue / min eigenvalue.
    ///
    /// Returns `f64::INFINITY` when the smaller eigenvalue is non-positive.
    pub fn anisotropy_ratio(&self) -> f64 {
        let (hi, lo) = self.eigenvalues();
        if lo <= 0.0 { f64::INFINITY } else { hi / lo }
    }

    fn validate(&self) -> Result<(), TransportError> {
        if !(self.dxx.is_finite() && self.dyy.is_finite() && self.dxy.is_finite()) {
            return Err(TransportError::InvalidParameters(
                "diffusion tensor components must be finite".into(),
            ));
        }
        if self.dxx <= 0.0 || self.dyy <= 0.0 {
            return Err(TransportError::InvalidParameters(format!(
                "diagonal diffusivities must be positive, got Dxx={}, Dyy={}",
                self.dxx, self.dyy
            )));
        }
        if self.determinant() < 0.0 {
            return Err(TransportError::InvalidParameters(format!(
                "diffusion tensor is indefinite (det = {})",
                self.determinant()
            )));
        }
        Ok(())
    }
}

// =================================================================================================
// Source descriptor
// =================================================================================================

/// Localized pollutant source.
///
/// Each engine supports the variant matching its discretization and rejects
/// the other with [`TransportError::InvalidParameters`] — silently dropping a
/// source the engine cannot represent would corrupt the simulated physics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SourceTerm {
    /// No active discharge.
    #[default]
    None,

    /// Continuous lateral discharge from one bank (explicit engine).
    ///
    /// The discharge enters at the column nearest `position · Lx` and spreads
    /// over the rows within `band · Ly` of the near shore; strength decreases
    /// linearly with distance from the shore inside that band.
    BankDischarge {
        /// Along-channel position as a fraction of `Lx`, in `[0, 1]`.
        position: f64,
        /// Depth of the discharge band as a fraction of `Ly`, in `[0, 1]`.
        band: f64,
        /// Discharge rate \[kg/s\].
        rate: f64,
    },

    /// Instantaneous nodal spill (FEM engine, first timestep only).
    PointImpulse {
        /// Along-channel spill coordinate \[m\].
        x: f64,
        /// Cross-channel spill coordinate \[m\].
        y: f64,
        /// Spilled mass \[kg\].
        mass: f64,
    },
}

impl SourceTerm {
    fn validate(&self) -> Result<(), TransportError> {
        match *self {
            SourceTerm::None => Ok(()),
            SourceTerm::BankDischarge {
                position,
                band,
                rate,
            } => {
                if !(0.0..=1.0).contains(&position) || !(0.0..=1.0).contains(&band) {
                    return Err(TransportError::InvalidParameters(format!(
                        "discharge position and band must be fractions in [0, 1], \
                         got position={position}, band={band}"
                    )));
                }
                if !rate.is_finite() || rate < 0.0 {
                    return Err(TransportError::InvalidParameters(format!(
                        "discharge rate must be non-negative and finite, got {rate}"
                    )));
                }
                Ok(())
            }
            SourceTerm::PointImpulse { x, y, mass } => {
                if !(x.is_finite() && y.is_finite()) {
                    return Err(TransportError::InvalidParameters(
                        "impulse coordinates must be finite".into(),
                    ));
                }
                if !mass.is_finite() || mass < 0.0 {
                    return Err(TransportError::InvalidParameters(format!(
                        "impulse mass must be non-negative and finite, got {mass}"
                    )));
                }
                Ok(())
            }
        }
    }
}

// =================================================================================================
// Parameter set
// =================================================================================================

/// Read-only physical parameter snapshot for a simulation run.
///
/// # Example
///
/// ```rust
/// use adr_rs::{DiffusionTensor, Parameters, SourceTerm};
///
/// let params = Parameters::new(0.5, DiffusionTensor::diagonal(0.012, 0.018))
///     .with_decay(0.006, 0.002)
///     .with_source(SourceTerm::BankDischarge {
///         position: 0.02,
///         band: 0.2,
///         rate: 250.0,
///     });
///
/// assert!(params.validate().is_ok());
/// assert_eq!(params.total_decay(), 0.008);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Along-channel velocity magnitude u \[m/s\].
    pub u: f64,
    /// Cross-channel velocity component v \[m/s\] (FEM engine only; the
    /// explicit stencil models purely longitudinal flow).
    pub v: f64,
    /// Anisotropic diffusion tensor.
    pub diffusion: DiffusionTensor,
    /// Biological degradation rate k₁ \[1/s\], ≥ 0.
    pub k1: f64,
    /// Chemical reaction rate k₂ \[1/s\], ≥ 0.
    pub k2: f64,
    /// Localized source descriptor.
    pub source: SourceTerm,

    // ==================== Shore model (explicit engine) ====================
    /// Fraction of `u` retained at the shores by the parabolic velocity
    /// profile, in `[0, 1]`. The profile peaks at `u` mid-channel.
    pub velocity_floor: f64,
    /// Gain of the transverse mixing-intensity factor: `Dyy` is scaled by
    /// `1 + gain · p` where `p` is the proximity to the nearest bank
    /// (1 at the banks, 0 mid-channel).
    pub mixing_gain: f64,
    /// Retention factor applied to row 0 (the discharge-side shore) after
    /// each update, in `[0, 1]`.
    pub north_retention: f64,
    /// Retention factor applied to row `ny-1` (the far shore). The reference
    /// channel has a lossier far bank.
    pub south_retention: f64,
}

impl Parameters {
    /// Defaults for the shore model, taken from the reference channel.
    pub const DEFAULT_VELOCITY_FLOOR: f64 = 0.3;
    pub const DEFAULT_MIXING_GAIN: f64 = 2.0;
    pub const DEFAULT_NORTH_RETENTION: f64 = 0.95;
    pub const DEFAULT_SOUTH_RETENTION: f64 = 0.85;

    /// Create a parameter set with the given velocity and diffusion tensor.
    ///
    /// Decay rates start at zero, the source at [`SourceTerm::None`], and the
    /// shore model at its reference defaults.
    pub fn new(u: f64, diffusion: DiffusionTensor) -> Self {
        Self {
            u,
            v: 0.0,
            diffusion,
            k1: 0.0,
            k2: 0.0,
            source: SourceTerm::None,
            velocity_floor: Self::DEFAULT_VELOCITY_FLOOR,
            mixing_gain: Self::DEFAULT_MIXING_GAIN,
            north_retention: Self::DEFAULT_NORTH_RETENTION,
            south_retention: Self::DEFAULT_SOUTH_RETENTION,
        }
    }

    /// Set the secondary (cross-channel) velocity component.
    pub fn with_transverse_velocity(mut self, v: f64) -> Self {
        self.v = v;
        self
    }

    /// Set degradation and reaction rates.
    pub fn with_decay(mut self, k1: f64, k2: f64) -> Self {
        self.k1 = k1;
        self.k2 = k2;
        self
    }

    /// Set the source descriptor.
    pub fn with_source(mut self, source: SourceTerm) -> Self {
        self.source = source;
        self
    }

    /// Override the shore model (velocity floor, mixing gain, retentions).
    pub fn with_shore_model(
        mut self,
        velocity_floor: f64,
        mixing_gain: f64,
        north_retention: f64,
        south_retention: f64,
    ) -> Self {
        self.velocity_floor = velocity_floor;
        self.mixing_gain = mixing_gain;
        self.north_retention = north_retention;
        self.south_retention = south_retention;
        self
    }

    /// Disable every shore effect: uniform velocity, uniform transverse
    /// mixing, fully reflective banks. Useful for conservation studies.
    pub fn without_shore_effects(self) -> Self {
        self.with_shore_model(1.0, 0.0, 1.0, 1.0)
    }

    /// Combined linear sink rate `k₁ + k₂`.
    #[inline]
    pub fn total_decay(&self) -> f64 {
        self.k1 + self.k2
    }

    /// Validate the snapshot against the physical model.
    ///
    /// Checked once before each run; engines re-run it per step because it is
    /// O(1) and the explicit engine accepts fresh parameters every call.
    pub fn validate(&self) -> Result<(), TransportError> {
        if !(self.u.is_finite() && self.v.is_finite()) {
            return Err(TransportError::InvalidParameters(
                "velocity components must be finite".into(),
            ));
        }
        self.diffusion.validate()?;
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(TransportError::InvalidParameters(format!(
                "degradation rate k1 must be non-negative, got {}",
                self.k1
            )));
        }
        if !self.k2.is_finite() || self.k2 < 0.0 {
            return Err(TransportError::InvalidParameters(format!(
                "reaction rate k2 must be non-negative, got {}",
                self.k2
            )));
        }
        self.source.validate()?;
        for (name, value) in [
            ("velocity_floor", self.velocity_floor),
            ("north_retention", self.north_retention),
            ("south_retention", self.south_retention),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TransportError::InvalidParameters(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        if !self.mixing_gain.is_finite() || self.mixing_gain < 0.0 {
            return Err(TransportError::InvalidParameters(format!(
                "mixing_gain must be non-negative, got {}",
                self.mixing_gain
            )));
        }
        Ok(())
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference_params() -> Parameters {
        Parameters::new(0.5, DiffusionTensor::diagonal(0.012, 0.018))
            .with_decay(0.006, 0.002)
            .with_source(SourceTerm::BankDischarge {
                position: 0.02,
                band: 0.2,
                rate: 250.0,
            })
    }

    // ====== Tensor tests ======

    #[test]
    fn test_tensor_eigenvalues_diagonal() {
        let d = DiffusionTensor::diagonal(20.0, 2.0);
        let (hi, lo) = d.eigenvalues();
        assert_relative_eq!(hi, 20.0, epsilon = 1e-12);
        assert_relative_eq!(lo, 2.0, epsilon = 1e-12);
        assert_relative_eq!(d.anisotropy_ratio(), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tensor_eigenvalues_with_coupling() {
        let d = DiffusionTensor::new(20.0, 2.0, 0.5);
        let (hi, lo) = d.eigenvalues();
        // Coupling widens the spectrum around the diagonal values.
        assert!(hi > 20.0);
        assert!(lo < 2.0);
        assert_relative_eq!(hi + lo, 22.0, epsilon = 1e-10); // trace preserved
        assert_relative_eq!(hi * lo, d.determinant(), epsilon = 1e-10);
    }

    #[test]
    fn test_tensor_isotropic_ratio_is_one() {
        let d = DiffusionTensor::isotropic(3.5);
        assert_relative_eq!(d.anisotropy_ratio(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tensor_rejects_non_positive_diagonal() {
        let p = Parameters::new(1.0, DiffusionTensor::diagonal(0.0, 1.0));
        assert!(matches!(
            p.validate(),
            Err(TransportError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_tensor_rejects_indefinite() {
        // det = 1*1 - 4 < 0: anti-dissipative along one eigen-direction.
        let p = Parameters::new(1.0, DiffusionTensor::new(1.0, 1.0, 2.0));
        assert!(p.validate().is_err());
    }

    // ====== Source tests ======

    #[test]
    fn test_source_fraction_bounds() {
        let p = reference_params().with_source(SourceTerm::BankDischarge {
            position: 1.5,
            band: 0.2,
            rate: 250.0,
        });
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_source_negative_rate_rejected() {
        let p = reference_params().with_source(SourceTerm::BankDischarge {
            position: 0.02,
            band: 0.2,
            rate: -1.0,
        });
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_impulse_negative_mass_rejected() {
        let p = reference_params().with_source(SourceTerm::PointImpulse {
            x: 1000.0,
            y: 100.0,
            mass: -500.0,
        });
        assert!(p.validate().is_err());
    }

    // ====== Parameter validation ======

    #[test]
    fn test_reference_parameters_valid() {
        assert!(reference_params().validate().is_ok());
    }

    #[test]
    fn test_negative_decay_rejected() {
        let p = reference_params().with_decay(-0.001, 0.0);
        assert!(p.validate().is_err());
        let p = reference_params().with_decay(0.0, -0.001);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_non_finite_velocity_rejected() {
        let mut p = reference_params();
        p.u = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_shore_model_bounds() {
        let p = reference_params().with_shore_model(1.2, 2.0, 0.95, 0.85);
        assert!(p.validate().is_err());
        let p = reference_params().with_shore_model(0.3, -1.0, 0.95, 0.85);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_without_shore_effects() {
        let p = reference_params().without_shore_effects();
        assert_eq!(p.velocity_floor, 1.0);
        assert_eq!(p.mixing_gain, 0.0);
        assert_eq!(p.north_retention, 1.0);
        assert_eq!(p.south_retention, 1.0);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_total_decay() {
        assert_relative_eq!(reference_params().total_decay(), 0.008, epsilon = 1e-15);
    }
}
