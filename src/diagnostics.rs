//! Plume diagnostics
//!
//! Scalar summaries of a concentration snapshot, and an append-only log of
//! time-stamped summaries for a run. [`summarize`] is a pure function over an
//! independent snapshot: it never mutates the field and is safe to call from
//! any thread that holds one.
//!
//! All moments are computed in one pass over the field. Mass uses the
//! midpoint quadrature `Σ C·dx·dy`; centroid and spread are concentration-
//! weighted first and second moments per axis. When the field carries no
//! mass, centroid and spread are zero by convention rather than NaN — a run
//! that has not been seeded yet should log zeros, not poison downstream
//! arithmetic.

use crate::domain::Domain;
use crate::error::TransportError;
use crate::field::ConcentrationField;

/// Scalar summary of one concentration snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSummary {
    /// Total mass `Σ C·dx·dy` \[kg\].
    pub total_mass: f64,
    /// Largest concentration in the field.
    pub max_concentration: f64,
    /// Mass-weighted along-channel centroid \[m\].
    pub centroid_x: f64,
    /// Mass-weighted cross-channel centroid \[m\].
    pub centroid_y: f64,
    /// Along-channel second-moment spread (standard deviation) \[m\].
    pub spread_x: f64,
    /// Cross-channel second-moment spread \[m\].
    pub spread_y: f64,
}

/// Summarize a snapshot in a single pass.
///
/// Fails with [`TransportError::DimensionMismatch`] when the field shape
/// disagrees with the domain.
///
/// # Example
///
/// ```rust
/// use adr_rs::{ConcentrationField, Domain, diagnostics::summarize};
///
/// let domain = Domain::nodes(41, 21, 5000.0, 200.0).unwrap();
/// let field = ConcentrationField::gaussian_spill(&domain, 1000.0, 100.0, 50.0, 2.0);
/// let summary = summarize(&field, &domain).unwrap();
/// assert!(summary.total_mass > 0.0);
/// assert!((summary.centroid_x - 1000.0).abs() < 1.0);
/// ```
pub fn summarize(
    field: &ConcentrationField,
    domain: &Domain,
) -> Result<FieldSummary, TransportError> {
    field.check_shape(domain)?;

    let mut sum = 0.0;
    let mut max_concentration = 0.0f64;
    let mut moment_x = 0.0;
    let mut moment_y = 0.0;
    let mut moment_xx = 0.0;
    let mut moment_yy = 0.0;

    for i in 0..domain.nx() {
        let x = domain.x(i);
        for j in 0..domain.ny() {
            let c = field.get(j, i);
            let y = domain.y(j);
            sum += c;
            max_concentration = max_concentration.max(c);
            moment_x += c * x;
            moment_y += c * y;
            moment_xx += c * x * x;
            moment_yy += c * y * y;
        }
    }

    let cell_area = domain.dx() * domain.dy();
    let total_mass = sum * cell_area;

    if sum <= 0.0 {
        return Ok(FieldSummary {
            total_mass: 0.0,
            max_concentration,
            centroid_x: 0.0,
            centroid_y: 0.0,
            spread_x: 0.0,
            spread_y: 0.0,
        });
    }

    let centroid_x = moment_x / sum;
    let centroid_y = moment_y / sum;
    // Variance by the shifted-moment identity; clamp tiny negative
    // round-off before the square root.
    let variance_x = (moment_xx / sum - centroid_x * centroid_x).max(0.0);
    let variance_y = (moment_yy / sum - centroid_y * centroid_y).max(0.0);

    Ok(FieldSummary {
        total_mass,
        max_concentration,
        centroid_x,
        centroid_y,
        spread_x: variance_x.sqrt(),
        spread_y: variance_y.sqrt(),
    })
}

/// A [`FieldSummary`] stamped with its simulation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlumeMetrics {
    /// Simulation time \[s\].
    pub time: f64,
    /// Snapshot summary at that time.
    pub summary: FieldSummary,
}

/// Append-only sequence of recorded metrics for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsLog {
    records: Vec<PlumeMetrics>,
}

impl MetricsLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record. Records are expected in time order; the log never
    /// reorders or overwrites.
    pub fn push(&mut self, time: f64, summary: FieldSummary) {
        self.records.push(PlumeMetrics { time, summary });
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in recording order.
    pub fn records(&self) -> &[PlumeMetrics] {
        &self.records
    }

    /// The most recent record, if any.
    pub fn last(&self) -> Option<&PlumeMetrics> {
        self.records.last()
    }

    /// Recorded times, in order.
    pub fn times(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.time).collect()
    }

    /// Recorded total masses, in order.
    pub fn masses(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.summary.total_mass).collect()
    }

    /// Recorded maxima, in order.
    pub fn max_concentrations(&self) -> Vec<f64> {
        self.records
            .iter()
            .map(|r| r.summary.max_concentration)
            .collect()
    }

    /// Render as CSV with a header row, for export to external tooling.
    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "time,total_mass,max_concentration,centroid_x,centroid_y,spread_x,spread_y\n",
        );
        for r in &self.records {
            let s = &r.summary;
            out.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                r.time,
                s.total_mass,
                s.max_concentration,
                s.centroid_x,
                s.centroid_y,
                s.spread_x,
                s.spread_y
            ));
        }
        out
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_field_uses_zero_convention() {
        let domain = Domain::cells(10, 10, 10.0, 10.0).unwrap();
        let field = ConcentrationField::zeros(&domain);
        let summary = summarize(&field, &domain).unwrap();
        assert_eq!(summary.total_mass, 0.0);
        assert_eq!(summary.max_concentration, 0.0);
        assert_eq!(summary.centroid_x, 0.0);
        assert_eq!(summary.centroid_y, 0.0);
        assert_eq!(summary.spread_x, 0.0);
        assert_eq!(summary.spread_y, 0.0);
    }

    #[test]
    fn test_point_mass_centroid_and_spread() {
        let domain = Domain::cells(10, 10, 10.0, 10.0).unwrap();
        let mut field = ConcentrationField::zeros(&domain);
        field.set(3, 7, 4.0); // x = 7.5, y = 3.5, cell area 1
        let summary = summarize(&field, &domain).unwrap();
        assert_relative_eq!(summary.total_mass, 4.0, epsilon = 1e-12);
        assert_relative_eq!(summary.max_concentration, 4.0, epsilon = 1e-12);
        assert_relative_eq!(summary.centroid_x, 7.5, epsilon = 1e-12);
        assert_relative_eq!(summary.centroid_y, 3.5, epsilon = 1e-12);
        assert_relative_eq!(summary.spread_x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(summary.spread_y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_two_point_spread() {
        let domain = Domain::cells(10, 2, 10.0, 1.0).unwrap();
        let mut field = ConcentrationField::zeros(&domain);
        // Equal masses at x = 2.5 and x = 7.5: centroid 5.0, spread 2.5.
        field.set(0, 2, 1.0);
        field.set(0, 7, 1.0);
        let summary = summarize(&field, &domain).unwrap();
        assert_relative_eq!(summary.centroid_x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(summary.spread_x, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_centroid_matches_center() {
        let domain = Domain::nodes(101, 41, 1000.0, 100.0).unwrap();
        let field = ConcentrationField::gaussian_spill(&domain, 400.0, 50.0, 30.0, 1.0);
        let summary = summarize(&field, &domain).unwrap();
        assert_relative_eq!(summary.centroid_x, 400.0, epsilon = 1e-6);
        assert_relative_eq!(summary.centroid_y, 50.0, epsilon = 1e-6);
        // Discrete second moment of a well-resolved Gaussian tracks sigma.
        assert_relative_eq!(summary.spread_x, 30.0, max_relative = 0.02);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let domain = Domain::cells(10, 10, 10.0, 10.0).unwrap();
        let other = Domain::cells(12, 10, 10.0, 10.0).unwrap();
        let field = ConcentrationField::zeros(&other);
        assert!(matches!(
            summarize(&field, &domain),
            Err(TransportError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_metrics_log_accessors() {
        let domain = Domain::cells(4, 4, 4.0, 4.0).unwrap();
        let mut field = ConcentrationField::zeros(&domain);
        field.set(1, 1, 2.0);

        let mut log = MetricsLog::new();
        assert!(log.is_empty());

        log.push(0.5, summarize(&field, &domain).unwrap());
        field.set(1, 2, 2.0);
        log.push(1.0, summarize(&field, &domain).unwrap());

        assert_eq!(log.len(), 2);
        assert_eq!(log.times(), vec![0.5, 1.0]);
        assert!(log.masses()[1] > log.masses()[0]);
        assert_eq!(log.last().unwrap().time, 1.0);

        let csv = log.to_csv();
        assert!(csv.starts_with("time,total_mass"));
        assert_eq!(csv.lines().count(), 3);
    }
}
