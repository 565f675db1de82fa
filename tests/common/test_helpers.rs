//! Helper functions for integration tests

use adr_rs::prelude::*;

/// Reference discharge channel: 80×40 cells over 100 m × 20 m.
pub fn channel_domain() -> Domain {
    Domain::cells(80, 40, 100.0, 20.0).unwrap()
}

/// Reference spill reach: 41×21 nodes over 5000 m × 200 m.
pub fn reach_domain() -> Domain {
    Domain::nodes(41, 21, 5000.0, 200.0).unwrap()
}

/// Reference bank-discharge parameter set for the explicit engine.
pub fn discharge_params() -> Parameters {
    Parameters::new(0.5, DiffusionTensor::diagonal(0.012, 0.018))
        .with_decay(0.006, 0.002)
        .with_source(SourceTerm::BankDischarge {
            position: 0.02,
            band: 0.2,
            rate: 250.0,
        })
}

/// Reference spill parameter set for the FEM engine.
///
/// The 0.1/day decay rate is converted to per-second.
pub fn impulse_params() -> Parameters {
    Parameters::new(1.2, DiffusionTensor::new(20.0, 2.0, 0.5))
        .with_decay(0.1 / 86_400.0, 0.0)
        .with_source(SourceTerm::PointImpulse {
            x: 1000.0,
            y: 100.0,
            mass: 500.0,
        })
}

/// Midpoint-quadrature total mass of a snapshot.
pub fn total_mass(field: &ConcentrationField, domain: &Domain) -> f64 {
    field.as_slice().iter().sum::<f64>() * domain.dx() * domain.dy()
}

/// Mass-weighted along-channel centroid of a snapshot.
pub fn centroid_x(field: &ConcentrationField, domain: &Domain) -> f64 {
    let mut sum = 0.0;
    let mut moment = 0.0;
    for i in 0..domain.nx() {
        let x = domain.x(i);
        for j in 0..domain.ny() {
            let c = field.get(j, i);
            sum += c;
            moment += c * x;
        }
    }
    if sum > 0.0 { moment / sum } else { 0.0 }
}

/// Grid position `(j, i)` of the largest value in a snapshot.
pub fn argmax(field: &ConcentrationField) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_value = f64::NEG_INFINITY;
    for i in 0..field.ncols() {
        for j in 0..field.nrows() {
            if field.get(j, i) > best_value {
                best_value = field.get(j, i);
                best = (j, i);
            }
        }
    }
    best
}

/// Relative error `|a - b| / max(|b|, eps)`.
pub fn relative_error(a: f64, b: f64) -> f64 {
    (a - b).abs() / b.abs().max(f64::EPSILON)
}
