//! Run driver
//!
//! [`run`] owns the stepping loop: validate once, reset the engine, advance
//! sequentially, and record `(time, field, metrics)` at a configurable
//! stride. Times are computed as `(step + 1) · dt` directly rather than
//! accumulated, so a million-step run carries no summation drift.
//!
//! Wall-clock pacing, cancellation, and progress reporting stay with the
//! caller; the driver is a plain synchronous loop.

use std::collections::HashMap;

use log::info;

use crate::diagnostics::{self, MetricsLog};
use crate::engine::TransportEngine;
use crate::error::TransportError;
use crate::field::ConcentrationField;
use crate::params::Parameters;

/// Stepping configuration for one run.
///
/// # Example
///
/// ```rust
/// use adr_rs::SimulationConfig;
///
/// let config = SimulationConfig::new(0.05, 1000).with_record_every(20);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.total_time(), 50.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    /// Timestep length \[s\].
    pub dt: f64,
    /// Number of steps to take.
    pub steps: usize,
    /// Record a snapshot every this many steps (the final step is always
    /// recorded).
    pub record_every: usize,
}

impl SimulationConfig {
    /// Configuration recording every step.
    pub fn new(dt: f64, steps: usize) -> Self {
        Self {
            dt,
            steps,
            record_every: 1,
        }
    }

    /// Set the recording stride.
    pub fn with_record_every(mut self, record_every: usize) -> Self {
        self.record_every = record_every;
        self
    }

    /// Total simulated time `steps · dt`.
    pub fn total_time(&self) -> f64 {
        self.steps as f64 * self.dt
    }

    /// Reject non-positive `dt`, zero steps, or a zero stride.
    pub fn validate(&self) -> Result<(), TransportError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(TransportError::InvalidParameters(format!(
                "timestep must be positive and finite, got {}",
                self.dt
            )));
        }
        if self.steps == 0 {
            return Err(TransportError::InvalidParameters(
                "a run must take at least one step".into(),
            ));
        }
        if self.record_every == 0 {
            return Err(TransportError::InvalidParameters(
                "record_every must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Recorded simulation times, in order.
    pub times: Vec<f64>,
    /// Recorded snapshots, aligned with `times`.
    pub fields: Vec<ConcentrationField>,
    /// Diagnostics at each recorded time.
    pub metrics: MetricsLog,
    /// The field after the last step (always present, recorded or not).
    pub final_field: ConcentrationField,
    /// Run description: engine name, step counts, final diagnostics.
    pub metadata: HashMap<String, String>,
}

impl SimulationResult {
    /// Number of recorded snapshots.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// True when nothing was recorded (never the case for a completed run).
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Drive an engine from `initial` through `config.steps` timesteps.
///
/// The engine is [`reset`](TransportEngine::reset) first, so each run starts
/// from a clean per-run state (the FEM impulse fires on this run's first
/// step). Configuration and parameters are validated once up front; the
/// first failing step aborts the run and propagates its error.
pub fn run<E>(
    engine: &mut E,
    params: &Parameters,
    initial: &ConcentrationField,
    config: &SimulationConfig,
) -> Result<SimulationResult, TransportError>
where
    E: TransportEngine + ?Sized,
{
    config.validate()?;
    params.validate()?;
    initial.check_shape(engine.domain())?;
    engine.reset();

    let mut times = Vec::new();
    let mut fields = Vec::new();
    let mut metrics = MetricsLog::new();
    let mut current = initial.clone();

    for step in 0..config.steps {
        current = engine.step(&current, config.dt, params)?;

        let completed = step + 1;
        if completed % config.record_every == 0 || completed == config.steps {
            let time = completed as f64 * config.dt;
            let summary = diagnostics::summarize(&current, engine.domain())?;
            metrics.push(time, summary);
            times.push(time);
            fields.push(current.clone());
        }
    }

    let final_summary = diagnostics::summarize(&current, engine.domain())?;
    info!(
        "run complete: {} over {} steps of dt={} — final mass {:.6e}, max {:.6e}",
        engine.name(),
        config.steps,
        config.dt,
        final_summary.total_mass,
        final_summary.max_concentration
    );

    let mut metadata = HashMap::new();
    metadata.insert("engine".to_string(), engine.name().to_string());
    metadata.insert("steps".to_string(), config.steps.to_string());
    metadata.insert("dt".to_string(), config.dt.to_string());
    metadata.insert("recorded".to_string(), times.len().to_string());
    metadata.insert(
        "final_mass".to_string(),
        format!("{:.6e}", final_summary.total_mass),
    );
    metadata.insert(
        "final_max".to_string(),
        format!("{:.6e}", final_summary.max_concentration),
    );

    Ok(SimulationResult {
        times,
        fields,
        metrics,
        final_field: current,
        metadata,
    })
}

// =================================================================================================
// Tests
// =================================================================================================
