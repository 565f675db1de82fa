//! Explicit finite-difference stencil engine
//!
//! Forward-time, cell-centered update. Each new cell value is the old value
//! plus `dt` times five additive terms, all read from the old field only:
//!
//! 1. **Upwind advection** along the channel, with a parabolic cross-channel
//!    velocity profile: full `u` mid-channel, `velocity_floor · u` at both
//!    shores.
//! 2. **Central longitudinal diffusion** (`Dxx`), interior columns only.
//! 3. **Central transverse diffusion** (`Dyy`), interior rows only, scaled by
//!    a mixing-intensity factor `1 + gain · p` where `p` is the proximity to
//!    the nearest bank (1 at the banks, 0 mid-channel).
//! 4. **Linear sink** `−(k₁ + k₂)·C`.
//! 5. **Bank discharge**: a continuous source confined to the column nearest
//!    `position · Lx` and the rows within the near-shore band, with strength
//!    decreasing linearly away from the shore.
//!
//! Shore rows are then damped by their retention factors, and any negative
//! result clamps to zero (concentrations are physically non-negative; the
//! clamp is a numerical-domain policy, not an error).
//!
//! # Boundary treatment
//!
//! Longitudinal ends use missing-neighbor truncation: a term whose stencil
//! neighbor falls outside the grid is simply omitted. Lateral shores rely on
//! the retention damping instead of a diffusion ghost cell.
//!
//! # Stability
//!
//! The scheme is conditionally stable; choosing `dt` within the CFL limit is
//! the caller's responsibility. [`ExplicitEngine::cfl_number`] computes the
//! standard advisory number (stable when < 1) using the worst-case transverse
//! diffusivity including the mixing gain.
//!
//! # Parallelism
//!
//! The sweep is embarrassingly parallel across columns (one column of the
//! column-major field is contiguous). With the `parallel` feature enabled and
//! a grid at or above [`crate::engine::parallel_threshold`] cells, columns are
//! distributed over Rayon's pool; per-column maxima and masses reduce into
//! the final [`SweepStats`].

use log::debug;

use crate::domain::{Domain, GridKind};
use crate::engine::{SweepStats, TransportEngine};
use crate::error::TransportError;
use crate::field::ConcentrationField;
use crate::params::{Parameters, SourceTerm};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Per-sweep constants hoisted out of the cell loop.
struct SweepContext {
    nx: usize,
    ny: usize,
    dt: f64,
    inv_dx: f64,
    inv_dx2: f64,
    inv_dy2: f64,
    dxx: f64,
    total_decay: f64,
    cell_area: f64,
    /// Along-channel velocity per row (parabolic profile).
    u_row: Vec<f64>,
    /// Transverse diffusivity per row (`Dyy` scaled by mixing intensity).
    dyy_row: Vec<f64>,
    /// Retention factor per row (1 everywhere except the two shore rows).
    retention_row: Vec<f64>,
    /// `Some((column, band_rows, rate))` when a bank discharge is active.
    discharge: Option<(usize, usize, f64)>,
}

impl SweepContext {
    fn new(domain: &Domain, dt: f64, params: &Parameters) -> Self {
        let (nx, ny) = (domain.nx(), domain.ny());
        let span = (ny - 1) as f64;

        let mut u_row = Vec::with_capacity(ny);
        let mut dyy_row = Vec::with_capacity(ny);
        let mut retention_row = Vec::with_capacity(ny);
        for j in 0..ny {
            // Normalized distance to the nearest bank, 0 at a shore row,
            // 0.5 mid-channel.
            let s = j.min(ny - 1 - j) as f64 / span;
            let profile = params.velocity_floor + (1.0 - params.velocity_floor) * 4.0 * s * (1.0 - s);
            u_row.push(params.u * profile);

            let bank_proximity = 1.0 - 2.0 * s;
            dyy_row.push(params.diffusion.dyy * (1.0 + params.mixing_gain * bank_proximity));

            retention_row.push(if j == 0 {
                params.north_retention
            } else if j == ny - 1 {
                params.south_retention
            } else {
                1.0
            });
        }

        let discharge = match params.source {
            SourceTerm::BankDischarge {
                position,
                band,
                rate,
            } => {
                let column = ((position * nx as f64).floor() as usize).min(nx - 1);
                let band_rows = ((band * ny as f64).floor() as usize).min(ny - 1);
                Some((column, band_rows, rate))
            }
            _ => None,
        };

        Self {
            nx,
            ny,
            dt,
            inv_dx: 1.0 / domain.dx(),
            inv_dx2: 1.0 / (domain.dx() * domain.dx()),
            inv_dy2: 1.0 / (domain.dy() * domain.dy()),
            dxx: params.diffusion.dxx,
            total_decay: params.total_decay(),
            cell_area: domain.dx() * domain.dy(),
            u_row,
            dyy_row,
            retention_row,
            discharge,
        }
    }

    /// Compute column `i` of the new field into `out` (length `ny`).
    ///
    /// Returns `(column max, column mass)`.
    fn sweep_column(&self, old: &ConcentrationField, i: usize, out: &mut [f64]) -> (f64, f64) {
        let mut col_max = 0.0f64;
        let mut col_mass = 0.0f64;

        for j in 0..self.ny {
            let c = old.get(j, i);

            // Upwind advection: backward difference for downstream flow,
            // forward difference for upstream; omitted when the upwind
            // neighbor is outside the grid.
            let u = self.u_row[j];
            let advection = if u >= 0.0 {
                if i > 0 {
                    u * (c - old.get(j, i - 1)) * self.inv_dx
                } else {
                    0.0
                }
            } else if i < self.nx - 1 {
                u * (old.get(j, i + 1) - c) * self.inv_dx
            } else {
                0.0
            };

            let diffusion_x = if i > 0 && i < self.nx - 1 {
                self.dxx * (old.get(j, i + 1) - 2.0 * c + old.get(j, i - 1)) * self.inv_dx2
            } else {
                0.0
            };

            let diffusion_y = if j > 0 && j < self.ny - 1 {
                self.dyy_row[j] * (old.get(j + 1, i) - 2.0 * c + old.get(j - 1, i)) * self.inv_dy2
            } else {
                0.0
            };

            let source = match self.discharge {
                Some((column, band_rows, rate)) if i == column && j <= band_rows => {
                    let depth_fraction = j as f64 / band_rows.max(1) as f64;
                    rate * (1.0 - 0.8 * depth_fraction) / self.cell_area
                }
                _ => 0.0,
            };

            let mut value = c
                + self.dt * (-advection + diffusion_x + diffusion_y - self.total_decay * c + source);
            value *= self.retention_row[j];
            if value < 0.0 {
                value = 0.0;
            }

            out[j] = value;
            col_max = col_max.max(value);
            col_mass += value;
        }

        (col_max, col_mass * self.cell_area)
    }
}

/// Explicit stencil engine over a cell-centered domain.
///
/// Stateless between steps: every call reads the parameter snapshot afresh,
/// so callers may vary coefficients or the discharge mid-run.
///
/// # Example
///
/// ```rust
/// use adr_rs::{
///     ConcentrationField, DiffusionTensor, Domain, Parameters, SourceTerm,
///     engine::{ExplicitEngine, TransportEngine},
/// };
///
/// let domain = Domain::cells(80, 40, 100.0, 20.0).unwrap();
/// let params = Parameters::new(0.5, DiffusionTensor::diagonal(0.012, 0.018))
///     .with_decay(0.006, 0.002)
///     .with_source(SourceTerm::BankDischarge {
///         position: 0.02,
///         band: 0.2,
///         rate: 250.0,
///     });
///
/// let mut engine = ExplicitEngine::new(domain.clone()).unwrap();
/// assert!(engine.cfl_number(&params, 0.05) < 1.0);
///
/// let field = ConcentrationField::zeros(&domain);
/// let next = engine.step(&field, 0.05, &params).unwrap();
/// assert!(next.max() > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct ExplicitEngine {
    domain: Domain,
}

impl ExplicitEngine {
    /// Create an engine for a cell-centered domain.
    ///
    /// Fails with [`TransportError::InvalidDomain`] when the domain is
    /// node-based: the stencil's cell-center coordinates and the FEM node
    /// coordinates differ by half a spacing, and silently mixing them would
    /// misplace every source and diagnostic.
    pub fn new(domain: Domain) -> Result<Self, TransportError> {
        if domain.kind() != GridKind::CellCentered {
            return Err(TransportError::InvalidDomain(
                "explicit stencil engine requires a cell-centered domain \
                 (use Domain::cells)"
                    .into(),
            ));
        }
        Ok(Self { domain })
    }

    /// Advisory CFL number for `dt` under `params`; stable when below 1.
    ///
    /// `dt · (|u|/dx + 2·Dxx/dx² + 2·Dyy·(1+gain)/dy²)`, taking the
    /// worst-case transverse diffusivity at the banks.
    pub fn cfl_number(&self, params: &Parameters, dt: f64) -> f64 {
        let dx = self.domain.dx();
        let dy = self.domain.dy();
        let dyy_max = params.diffusion.dyy * (1.0 + params.mixing_gain);
        dt * (params.u.abs() / dx
            + 2.0 * params.diffusion.dxx / (dx * dx)
            + 2.0 * dyy_max / (dy * dy))
    }

    /// One timestep returning the new field and its sweep statistics.
    ///
    /// The statistics come from the same pass that writes the field, so
    /// recording diagnostics every step costs no extra scan.
    pub fn step_with_stats(
        &self,
        field: &ConcentrationField,
        dt: f64,
        params: &Parameters,
    ) -> Result<(ConcentrationField, SweepStats), TransportError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(TransportError::InvalidParameters(format!(
                "timestep must be positive and finite, got {dt}"
            )));
        }
        params.validate()?;
        if matches!(params.source, SourceTerm::PointImpulse { .. }) {
            return Err(TransportError::InvalidParameters(
                "explicit engine supports SourceTerm::None or BankDischarge; \
                 point impulses belong to the FEM engine"
                    .into(),
            ));
        }
        field.check_shape(&self.domain)?;

        let ctx = SweepContext::new(&self.domain, dt, params);
        let ny = self.domain.ny();
        let mut new_field = ConcentrationField::zeros(&self.domain);

        let (max_concentration, total_mass) = self.run_sweep(&ctx, field, new_field.as_mut_slice(), ny);

        debug!(
            "explicit sweep: {}x{} cells, dt={}, max={:.6e}, mass={:.6e}",
            self.domain.nx(),
            ny,
            dt,
            max_concentration,
            total_mass
        );

        Ok((
            new_field,
            SweepStats {
                max_concentration,
                total_mass,
            },
        ))
    }

    #[cfg(feature = "parallel")]
    fn run_sweep(
        &self,
        ctx: &SweepContext,
        old: &ConcentrationField,
        out: &mut [f64],
        ny: usize,
    ) -> (f64, f64) {
        if self.domain.len() >= crate::engine::parallel_threshold() {
            out.par_chunks_mut(ny)
                .enumerate()
                .map(|(i, column)| ctx.sweep_column(old, i, column))
                .reduce(
                    || (0.0, 0.0),
                    |(max_a, mass_a), (max_b, mass_b)| (max_a.max(max_b), mass_a + mass_b),
                )
        } else {
            self.sequential_sweep(ctx, old, out, ny)
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run_sweep(
        &self,
        ctx: &SweepContext,
        old: &ConcentrationField,
        out: &mut [f64],
        ny: usize,
    ) -> (f64, f64) {
        self.sequential_sweep(ctx, old, out, ny)
    }

    fn sequential_sweep(
        &self,
        ctx: &SweepContext,
        old: &ConcentrationField,
        out: &mut [f64],
        ny: usize,
    ) -> (f64, f64) {
        let mut max_concentration = 0.0f64;
        let mut total_mass = 0.0f64;
        for (i, column) in out.chunks_mut(ny).enumerate() {
            let (col_max, col_mass) = ctx.sweep_column(old, i, column);
            max_concentration = max_concentration.max(col_max);
            total_mass += col_mass;
        }
        (max_concentration, total_mass)
    }
}

impl TransportEngine for ExplicitEngine {
    fn step(
        &mut self,
        field: &ConcentrationField,
        dt: f64,
        params: &Parameters,
    ) -> Result<ConcentrationField, TransportError> {
        self.step_with_stats(field, dt, params)
            .map(|(field, _)| field)
    }

    fn name(&self) -> &str {
        "Explicit upwind stencil (FTCS)"
    }

    fn domain(&self) -> &Domain {
        &self.domain
    }

    fn reset(&mut self) {
        // Stateless between steps.
    }
}

// =================================================================================================
// Tests
// =================================================================================================
