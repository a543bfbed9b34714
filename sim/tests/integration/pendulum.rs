//! Single-link pendulum under gravity, dynamics mode.

use mbd_conformance_tests::{pendulum, pendulum_angle};
use mbd_types::{math::is_rotation, LoadPolicy, SolverConfig, SolverMode};

const HALF_LENGTH: f64 = 20.0;

fn config() -> SolverConfig {
    SolverConfig::default()
        .with_step_size(1e-3)
        .with_tolerance(1e-3)
        .with_max_iterations(20)
        .with_load_policy(LoadPolicy::Constant)
}

#[test]
fn pendulum_returns_to_release_angle() {
    let mut system = pendulum(1.0, HALF_LENGTH, config());
    system.set_dynamics();
    system.initialize().unwrap();
    assert_eq!(system.mode(), SolverMode::Dynamics);

    let h = system.config().step_size;
    let release = pendulum_angle(&system.bodies()[0].position);
    assert!(release.abs() < 1e-12);

    // Swing out to the far side, then watch for the turning point on the
    // way back: the step after which x stops growing.
    let mut far_side = false;
    let mut previous_x = f64::NEG_INFINITY;
    let mut turning = None;
    for i in 0..20_000 {
        let t = i as f64 * h;
        system.do_step(i, t).unwrap();

        let link = &system.bodies()[0];
        assert!(
            is_rotation(&link.orientation, 1e-9),
            "orientation left SO(3) at t = {t}"
        );
        assert!(link.position.y.abs() < 1e-9, "left the swing plane at t = {t}");

        let x = link.position.x;
        if x < 0.0 {
            far_side = true;
        }
        if far_side && x > 0.0 && x < previous_x {
            turning = Some((t, pendulum_angle(&link.position)));
            break;
        }
        previous_x = x;
    }

    let (period, angle) = turning.expect("pendulum never came back");
    assert!(
        (angle - release).abs() < 1e-2,
        "returned to {angle} rad after {period} s"
    );
    // Large-amplitude period for a 90° release: 1.18·2π·√(I_pivot / m g l).
    assert!(period > 11.0 && period < 13.5, "period {period}");
}

#[test]
fn pendulum_holds_the_pin() {
    let mut system = pendulum(3.0, 1.0, config().with_tolerance(1e-8));
    system.set_dynamics();
    system.initialize().unwrap();

    let h = system.config().step_size;
    for i in 0..2000 {
        let t = i as f64 * h;
        system.do_step(i, t).unwrap();
        let residual = system.constraint_residual(t).norm();
        assert!(residual < 1e-8, "constraint residual {residual} at t = {t}");
    }

    // Near the bottom of the return swing after two seconds.
    let link = &system.bodies()[0];
    assert!(link.position.z < -0.5);
    assert!(system.iterations() >= 1);
}

#[test]
fn underconstrained_kinematics_runs_dynamics() {
    let mut system = pendulum(1.0, 1.0, config());
    system.set_kinematics();
    system.initialize().unwrap();

    assert_eq!(system.mode(), SolverMode::Dynamics);
    assert_eq!(system.nc(), 5);
    system.do_step(0, 0.0).unwrap();
    system.do_step(1, 1e-3).unwrap();
}
