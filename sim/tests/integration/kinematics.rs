//! Fully prescribed mechanisms in kinematics mode.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use approx::assert_relative_eq;
use mbd_conformance_tests::driven_crank;
use mbd_core::Stepper;
use mbd_types::{math::is_rotation, SolverConfig, SolverMode};
use nalgebra::Vector3;

fn config() -> SolverConfig {
    SolverConfig::default().with_step_size(1e-3)
}

#[test]
fn crank_residual_below_tolerance_every_step() {
    let rate = 1.5;
    let mut system = driven_crank(rate, FRAC_PI_4, false, config());
    system.set_kinematics();
    system.initialize().unwrap();
    assert_eq!(system.mode(), SolverMode::Kinematics);
    assert_eq!(system.nc(), 6 * system.nb());

    let tol = system.tolerance();
    assert_eq!(tol, mbd_types::DEFAULT_KINEMATICS_TOLERANCE);

    let h = system.config().step_size;
    for i in 0..1000 {
        // θ stays within (π/4, π/4 + 1.5) and clear of the driver's
        // singular configurations.
        let t = i as f64 * h;
        system.do_step(i, t).unwrap();

        let residual = system.constraint_residual(t).norm();
        assert!(residual < tol, "‖Φ‖ = {residual} at t = {t}");

        let crank = &system.bodies()[0];
        let theta = rate * t + FRAC_PI_4;
        assert!(is_rotation(&crank.orientation, 1e-9));
        assert_relative_eq!(
            crank.direction(&Vector3::x()),
            Vector3::new(theta.cos(), theta.sin(), 0.0),
            epsilon = 1e-6
        );
        assert_relative_eq!(crank.angular_velocity.z, rate, epsilon = 1e-6);
    }
}

#[test]
fn crank_trajectory_through_stepper() {
    let rate = 2.0;
    let mut system = driven_crank(rate, FRAC_PI_4, false, config());
    system.set_kinematics();

    let trajectory = Stepper::new(0.5).run(&mut system).unwrap();
    assert_eq!(trajectory.len(), 500);

    for record in trajectory.records() {
        let theta = rate * record.time + FRAC_PI_4;
        let r = record.positions[0];
        assert_relative_eq!(r, Vector3::new(theta.cos(), theta.sin(), 0.0), epsilon = 1e-6);
        // Uniform rotation: purely centripetal acceleration.
        assert_relative_eq!(record.accelerations[0], -r * rate * rate, epsilon = 1e-5);
        // Reaction multipliers are not computed in kinematics mode.
        assert_eq!(record.lambda.norm(), 0.0);
    }
}

#[test]
fn driver_swaps_once_per_crossing() {
    // θ = πt + π/2 passes θ = π and 2π (cos driver singular) and 3π/2
    // (sin driver singular) over t ∈ [0, 2).
    let mut system = driven_crank(PI, FRAC_PI_2, true, config());
    system.set_kinematics();
    system.initialize().unwrap();

    let h = system.config().step_size;
    let mut active = Vec::new();
    for i in 0..2000 {
        let t = i as f64 * h;
        system.do_step(i, t).unwrap();

        let residual = system.constraint_residual(t).norm();
        assert!(residual < system.tolerance(), "‖Φ‖ = {residual} at t = {t}");

        let theta = PI * t + FRAC_PI_2;
        let crank = &system.bodies()[0];
        assert_relative_eq!(
            crank.direction(&Vector3::x()),
            Vector3::new(theta.cos(), theta.sin(), 0.0),
            epsilon = 1e-6
        );
        assert_relative_eq!(crank.angular_velocity.z, PI, epsilon = 1e-6);

        let name = system.constraints().constraint(5).unwrap().name().to_string();
        if active.last() != Some(&name) {
            active.push(name);
        }
    }

    let events = system.swap_events();
    let times: Vec<f64> = events.iter().map(|e| e.time).collect();
    assert_eq!(events.len(), 4, "swaps at {times:?}");
    for (event, expected) in events.iter().zip([0.356, 0.856, 1.356, 1.856]) {
        assert!((event.time - expected).abs() < 2e-3, "swap at {}", event.time);
        assert_eq!(event.slot, 5);
    }
    assert_eq!(
        active,
        ["driver-cos", "driver-sin", "driver-cos", "driver-sin", "driver-cos"]
    );
}
