//! Iteration-cap failures and rollback.

use std::f64::consts::{FRAC_PI_4, PI};

use mbd_conformance_tests::{driven_crank, pendulum};
use mbd_core::{SimError, Stepper};
use mbd_types::{LoadPolicy, SolverConfig, SolverMode};

fn strict_config() -> SolverConfig {
    SolverConfig::default()
        .with_step_size(1e-2)
        .with_tolerance(1e-14)
        .with_max_iterations(0)
        .with_load_policy(LoadPolicy::Constant)
}

#[test]
fn zero_iteration_cap_reports_time_and_count() {
    let mut system = pendulum(1.0, 1.0, strict_config());
    system.set_dynamics();
    system.initialize().unwrap();
    system.do_step(0, 0.0).unwrap();

    let before = system.bodies()[0].clone();
    let lambda_before = system.lambda_hat().clone();
    let loads_before = system.external_forces().clone();

    let err = system.do_step(1, 0.01).unwrap_err();
    assert!(err.is_convergence_failure());
    assert_eq!(
        err,
        SimError::ConvergenceFailure {
            mode: SolverMode::Dynamics,
            time: 0.01,
            iterations: 0,
        }
    );
    assert!(err.to_string().contains("k:  0"), "{err}");

    let after = &system.bodies()[0];
    assert_eq!(after.position, before.position);
    assert_eq!(after.velocity, before.velocity);
    assert_eq!(after.orientation, before.orientation);
    assert_eq!(after.angular_velocity, before.angular_velocity);
    assert_eq!(after.acceleration, before.acceleration);
    assert_eq!(system.lambda_hat(), &lambda_before);
    assert_eq!(system.external_forces(), &loads_before);
}

#[test]
fn failed_step_can_be_retried_with_looser_settings() {
    let mut system = pendulum(1.0, 1.0, strict_config());
    system.set_dynamics();
    system.initialize().unwrap();
    system.do_step(0, 0.0).unwrap();
    assert!(system.do_step(1, 0.01).is_err());

    // The configuration is locked after initialize(), so a driver retries on
    // a fresh system.
    let mut retry = pendulum(
        1.0,
        1.0,
        strict_config().with_max_iterations(20).with_tolerance(1e-8),
    );
    retry.set_dynamics();
    retry.initialize().unwrap();
    retry.do_step(0, 0.0).unwrap();
    retry.do_step(1, 0.01).unwrap();
    assert!(retry.iterations() >= 1);
}

#[test]
fn stepper_stops_at_first_failure() {
    let mut system = pendulum(1.0, 1.0, strict_config());
    system.set_dynamics();

    let err = Stepper::new(1.0).run(&mut system).unwrap_err();
    assert_eq!(
        err,
        SimError::ConvergenceFailure {
            mode: SolverMode::Dynamics,
            time: 0.01,
            iterations: 0,
        }
    );
}

#[test]
fn kinematics_failure_restores_configuration() {
    let config = SolverConfig::default()
        .with_step_size(1e-3)
        .with_tolerance(1e-300)
        .with_max_iterations(2);
    let mut system = driven_crank(1.0, 0.5, false, config);
    system.set_kinematics();
    system.initialize().unwrap();

    let before = system.bodies()[0].clone();
    let err = system.do_step(1, 0.2).unwrap_err();
    assert_eq!(
        err,
        SimError::ConvergenceFailure {
            mode: SolverMode::Kinematics,
            time: 0.2,
            iterations: 2,
        }
    );
    assert_eq!(system.bodies()[0].position, before.position);
    assert_eq!(system.bodies()[0].orientation, before.orientation);
}

#[test]
fn failed_step_keeps_driver_swap() {
    let config = SolverConfig::default()
        .with_step_size(1e-3)
        .with_tolerance(1e-300)
        .with_max_iterations(2);
    let mut system = driven_crank(PI, FRAC_PI_4, true, config);
    system.set_kinematics();
    system.initialize().unwrap();
    let before = system.bodies()[0].clone();

    // θ(0.7) = 0.95π, so |cos θ| > 0.9 and the sine driver takes the slot.
    let expected = SimError::ConvergenceFailure {
        mode: SolverMode::Kinematics,
        time: 0.7,
        iterations: 2,
    };
    assert_eq!(system.do_step(1, 0.7), Err(expected.clone()));
    assert_eq!(system.bodies()[0].position, before.position);
    assert_eq!(system.bodies()[0].orientation, before.orientation);
    assert_eq!(system.constraints().constraint(5).unwrap().name(), "driver-sin");
    assert_eq!(system.swap_events().len(), 1);

    // Retrying at the same time keeps the swapped formulation and fails alike.
    assert_eq!(system.do_step(1, 0.7), Err(expected));
    assert_eq!(system.constraints().constraint(5).unwrap().name(), "driver-sin");
    assert_eq!(system.swap_events().len(), 1);
}

#[test]
fn stepping_requires_initialize() {
    let mut system = pendulum(1.0, 1.0, strict_config());
    assert_eq!(system.do_step(0, 0.0), Err(SimError::NotInitialized));
}
