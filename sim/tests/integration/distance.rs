//! Two free bodies tethered by a distance constraint.

use approx::assert_relative_eq;
use mbd_conformance_tests::{tether_length, tethered_pair};
use mbd_types::{math::is_rotation, BodyId, LoadPolicy, SolverConfig};
use nalgebra::Vector3;

const LENGTH: f64 = 1.5;

fn config() -> SolverConfig {
    SolverConfig::default()
        .with_step_size(1e-3)
        .with_tolerance(1e-6)
        .with_max_iterations(20)
        .zero_gravity()
        .with_load_policy(LoadPolicy::Constant)
}

#[test]
fn tether_length_held_within_tolerance() {
    let mut system = tethered_pair(LENGTH, config());
    system.set_dynamics();
    system.initialize().unwrap();

    let tol = system.tolerance();
    assert_relative_eq!(tether_length(&system), LENGTH, epsilon = 1e-12);

    let h = system.config().step_size;
    for i in 0..3000 {
        let t = i as f64 * h;
        system.do_step(i, t).unwrap();

        let length = tether_length(&system);
        assert!((length - LENGTH).abs() < tol, "length {length} at t = {t}");
        for body in system.bodies() {
            assert!(is_rotation(&body.orientation, 1e-9));
        }
    }

    // The offsets pull the bodies into rotation once the tether swings.
    assert!(system.bodies().iter().any(|b| b.angular_velocity.norm() > 1e-4));
}

#[test]
fn tether_conserves_linear_momentum() {
    let mut system = tethered_pair(LENGTH, config());
    system.set_dynamics();
    system.initialize().unwrap();

    let momentum = |s: &mbd_core::System| -> Vector3<f64> {
        s.bodies().iter().map(|b| b.velocity * b.mass()).sum()
    };
    let p0 = momentum(&system);

    let h = system.config().step_size;
    for i in 0..1000 {
        system.do_step(i, i as f64 * h).unwrap();
    }
    assert_relative_eq!(momentum(&system), p0, epsilon = 1e-9);
}

#[test]
fn tether_reactions_obey_third_law() {
    let mut system = tethered_pair(LENGTH, config());
    system.set_dynamics();
    system.initialize().unwrap();

    let h = system.config().step_size;
    for i in 0..500 {
        system.do_step(i, i as f64 * h).unwrap();

        for axis in 0..3 {
            let on_a = system.joint_force_on_body(BodyId::new(0), axis, 0).unwrap();
            let on_b = system.joint_force_on_body(BodyId::new(1), axis, 0).unwrap();
            assert_relative_eq!(on_a + on_b, 0.0, epsilon = 1e-12);
        }
    }

    // The tether is in tension, not slack.
    let on_b = system.reaction_force_on(BodyId::new(1)).unwrap();
    assert!(on_b.norm() > 1e-3);
}
