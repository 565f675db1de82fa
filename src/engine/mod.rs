//! Transport engines
//!
//! This module provides the [`TransportEngine`] trait and its two
//! implementations. An engine advances a concentration field by one timestep
//! under a parameter snapshot; it owns whatever per-run state its scheme
//! needs (cached matrices, step counters) and nothing else.
//!
//! # Core Concepts
//!
//! ## The Architecture (WHAT vs HOW)
//!
//! The engine architecture separates concerns into three layers:
//!
//! 1. **Domain + Parameters** — WHAT to simulate
//!    - Channel geometry and grid convention
//!    - Physical coefficients, source descriptor, shore model
//!
//! 2. **Engine** ([`TransportEngine`]) — HOW to advance it
//!    - [`ExplicitEngine`](explicit::ExplicitEngine): forward-time
//!      cell-centered stencil; cheap steps, CFL-limited
//!    - [`FemEngine`](fem::FemEngine): Crank-Nicolson bilinear finite
//!      elements; a sparse solve per step, unconditionally stable
//!
//! 3. **Simulation driver** ([`crate::simulation`]) — the run loop
//!    - Steps sequentially, records diagnostics at a stride
//!    - Independent of the scheme
//!
//! This separation allows the same driver and diagnostics to run either
//! scheme, and benchmarks to compare them on equal footing.
//!
//! # State layout
//!
//! The two engines share no state representation. The explicit engine works
//! directly on the `ny × nx` matrix; the FEM engine flattens it to a nodal
//! vector in [`crate::Domain::node_index`] order, solves, and reshapes. Both
//! consume the input field immutably and return a fresh field; a failed step
//! leaves the input untouched.
//!
//! # Error Handling
//!
//! Every step returns `Result<ConcentrationField, TransportError>`:
//!
//! - `InvalidParameters` — non-physical coefficients, `dt <= 0`, or a source
//!   variant the engine cannot represent
//! - `DimensionMismatch` — field shape disagrees with the engine's domain
//! - `SingularSystem` — the FEM sparse solve broke down or did not converge

// =================================================================================================
// Module Declarations
// =================================================================================================
pub mod explicit;
pub mod fem;
pub mod solve;

// =================================================================================================
// Parallel Execution Threshold
// =================================================================================================
//
// Deciding *when* to hand the stencil sweep off to Rayon is an execution
// concern, not a physics concern, so it lives here rather than with the
// stencil arithmetic.
//
// The threshold is stored in an AtomicUsize so that it can be changed at
// runtime (useful in benchmarks and tests) without requiring a mutex on every
// `step()` call. Relaxed ordering is sufficient: the value is a performance
// hint, not a synchronisation point.
// =================================================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::TransportError;
use crate::field::ConcentrationField;
use crate::params::Parameters;

/// Default number of cells above which the explicit sweep switches to
/// parallel iteration over columns.
///
/// The crossover is set at 10 000 cells. Below that point the overhead of
/// Rayon's thread-pool dispatch outweighs the per-cell stencil arithmetic.
const DEFAULT_PARALLEL_THRESHOLD: usize = 9_999;

/// Runtime-configurable parallel-execution threshold.
///
/// Read via [`parallel_threshold()`], written via [`set_parallel_threshold()`].
static PARALLEL_THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_PARALLEL_THRESHOLD);

/// Return the current parallel-execution threshold.
///
/// The explicit engine sweeps sequentially when the grid contains fewer
/// cells than this value, and switches to Rayon when it contains more — but
/// only when the crate is compiled with the `parallel` feature.
///
/// # Example
///
/// ```rust
/// use adr_rs::engine::parallel_threshold;
///
/// assert!(parallel_threshold() > 0);
/// ```
pub fn parallel_threshold() -> usize {
    PARALLEL_THRESHOLD.load(Ordering::Relaxed)
}

/// Set the parallel-execution threshold to a new value.
///
/// # Panics
///
/// Panics when `threshold == 0`. A zero-cell threshold would force parallel
/// dispatch on every single-cell sweep, which is never the intended
/// behaviour.
///
/// # Example
///
/// ```rust
/// use adr_rs::engine::{parallel_threshold, set_parallel_threshold};
///
/// let previous = parallel_threshold();
/// set_parallel_threshold(2048);
/// assert_eq!(parallel_threshold(), 2048);
///
/// // Restore so other tests are not affected.
/// set_parallel_threshold(previous);
/// ```
pub fn set_parallel_threshold(threshold: usize) {
    assert!(threshold > 0, "parallel threshold must be at least 1");
    PARALLEL_THRESHOLD.store(threshold, Ordering::Relaxed);
}

/// RAII guard that saves the current threshold on construction and restores
/// it on drop.
///
/// Only compiled in test builds. Prevents one test from leaking a modified
/// threshold value into the next.
#[cfg(test)]
pub(crate) struct ThresholdGuard {
    previous: usize,
}

#[cfg(test)]
impl ThresholdGuard {
    /// Set the threshold to `new_value` and return a guard that will
    /// restore the previous value on drop.
    pub(crate) fn save(new_value: usize) -> Self {
        let previous = parallel_threshold();
        set_parallel_threshold(new_value);
        Self { previous }
    }
}

#[cfg(test)]
impl Drop for ThresholdGuard {
    fn drop(&mut self) {
        // Bypass the public setter so that restoring any saved value never
        // panics.
        PARALLEL_THRESHOLD.store(self.previous, Ordering::Relaxed);
    }
}

// =================================================================================================
// Engine trait
// =================================================================================================

/// Per-sweep statistics, gathered in the same pass that writes the new field.
///
/// Avoids a second O(nx·ny) scan per step when a run records diagnostics at
/// every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepStats {
    /// Largest concentration in the new field.
    pub max_concentration: f64,
    /// Total mass `Σ C·dx·dy` of the new field.
    pub total_mass: f64,
}

/// A timestepping scheme for the advection-diffusion-reaction equation.
///
/// Implementations advance a field by exactly one `dt` per call. Steps are
/// strictly sequential — an engine may carry per-run state (a step counter,
/// cached matrices), so a single engine instance must not be stepped from
/// two runs at once. [`TransportEngine::reset`] returns the engine to its
/// pre-run state for reuse.
pub trait TransportEngine {
    /// Advance `field` by one timestep of length `dt` under `params`.
    ///
    /// On failure the input field is untouched and the engine's own state is
    /// unchanged.
    fn step(
        &mut self,
        field: &ConcentrationField,
        dt: f64,
        params: &Parameters,
    ) -> Result<ConcentrationField, TransportError>;

    /// Human-readable scheme name for logs and result metadata.
    fn name(&self) -> &str;

    /// The domain this engine was built for.
    fn domain(&self) -> &crate::domain::Domain;

    /// Discard per-run state (step counters, parameter-keyed caches).
    fn reset(&mut self);
}

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use explicit::ExplicitEngine;
pub use fem::FemEngine;

// =================================================================================================
// Tests
// =================================================================================================
