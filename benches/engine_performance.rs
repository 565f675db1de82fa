//! Performance benchmarks for the two transport engines
//!
//! Compares the cost of one timestep under each scheme on its reference
//! scenario, plus scaling of the explicit sweep with grid size.
//!
//! # What We're Measuring
//!
//! 1. **Explicit stencil step**:
//!    - O(nx·ny) arithmetic, no linear algebra
//!    - Cost dominated by the five-term sweep
//!    - Many cheap steps (CFL-limited dt)
//!
//! 2. **FEM Crank-Nicolson step**:
//!    - One BiCGSTAB solve per step over a sparse system
//!    - Stiffness assembly amortized by the parameter cache
//!    - Few expensive steps (unconditionally stable dt)
//!
//! # Expected Results
//!
//! On the reference grids the explicit step should run one to two orders of
//! magnitude faster than the FEM step; the FEM engine wins only when its
//! larger stable dt lets it take far fewer steps.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all engine benchmarks
//! cargo bench --bench engine_performance
//!
//! # Run only the explicit sweep scaling group
//! cargo bench --bench engine_performance "Explicit"
//!
//! # With the rayon sweep enabled
//! cargo bench --bench engine_performance --features parallel
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use adr_rs::prelude::*;

fn discharge_params() -> Parameters {
    Parameters::new(0.5, DiffusionTensor::diagonal(0.012, 0.018))
        .with_decay(0.006, 0.002)
        .with_source(SourceTerm::BankDischarge {
            position: 0.02,
            band: 0.2,
            rate: 250.0,
        })
}

fn impulse_params() -> Parameters {
    Parameters::new(1.2, DiffusionTensor::new(20.0, 2.0, 0.5))
        .with_decay(0.1 / 86_400.0, 0.0)
        .with_source(SourceTerm::PointImpulse {
            x: 1000.0,
            y: 100.0,
            mass: 500.0,
        })
}

/// Explicit sweep scaling with grid size.
///
/// Grid sizes bracket the reference channel (80×40) from both directions so
/// the per-cell cost and its linearity are both visible.
fn benchmark_explicit_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("Explicit Stencil Step");

    for &(nx, ny) in &[(40, 20), (80, 40), (160, 80), (320, 160)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{nx}x{ny}")),
            &(nx, ny),
            |b, &(nx, ny)| {
                // Setup phase (not measured): a developed plume, so the
                // sweep touches realistic nonzero data everywhere.
                let domain = Domain::cells(nx, ny, 100.0, 20.0).unwrap();
                let engine = ExplicitEngine::new(domain.clone()).unwrap();
                let params = discharge_params();
                let field = ConcentrationField::gaussian_spill(&domain, 50.0, 10.0, 8.0, 2.0);

                b.iter(|| {
                    engine
                        .step_with_stats(black_box(&field), black_box(0.05), black_box(&params))
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

/// FEM step cost on the reference reach, warm and cold stiffness cache.
fn benchmark_fem_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("FEM Crank-Nicolson Step");

    for &(nx, ny) in &[(41, 21), (81, 41)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{nx}x{ny} nodes")),
            &(nx, ny),
            |b, &(nx, ny)| {
                let domain = Domain::nodes(nx, ny, 5000.0, 200.0).unwrap();
                let mut engine = FemEngine::new(domain.clone()).unwrap();
                let params = impulse_params();
                let field = ConcentrationField::gaussian_spill(&domain, 1500.0, 100.0, 120.0, 1.0);

                // Warm the stiffness cache; the steady-state step is what a
                // long run pays per iteration.
                let _ = engine.step(&field, 60.0, &params).unwrap();

                b.iter(|| {
                    engine
                        .step(black_box(&field), black_box(60.0), black_box(&params))
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

/// Full reference runs, engine against engine.
///
/// Not an apples-to-apples per-step race: each engine runs its own scenario
/// at its own natural dt, which is how the two are actually used.
fn benchmark_reference_runs(c: &mut Criterion) {
    let mut group = c.benchmark_group("Reference Runs");
    group.sample_size(10);

    group.bench_function("explicit discharge, 1000 steps", |b| {
        let domain = Domain::cells(80, 40, 100.0, 20.0).unwrap();
        let params = discharge_params();
        let initial = ConcentrationField::zeros(&domain);
        let config = SimulationConfig::new(0.05, 1000).with_record_every(100);

        b.iter(|| {
            let mut engine = ExplicitEngine::new(domain.clone()).unwrap();
            simulation::run(
                black_box(&mut engine),
                black_box(&params),
                black_box(&initial),
                black_box(&config),
            )
            .unwrap()
        });
    });

    group.bench_function("fem spill, 40 steps", |b| {
        let domain = Domain::nodes(41, 21, 5000.0, 200.0).unwrap();
        let params = impulse_params();
        let initial = ConcentrationField::zeros(&domain);
        let config = SimulationConfig::new(60.0, 40).with_record_every(10);

        b.iter(|| {
            let mut engine = FemEngine::new(domain.clone()).unwrap();
            simulation::run(
                black_box(&mut engine),
                black_box(&params),
                black_box(&initial),
                black_box(&config),
            )
            .unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_explicit_step,
    benchmark_fem_step,
    benchmark_reference_runs,
);
criterion_main!(benches);
