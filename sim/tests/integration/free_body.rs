//! Torque-free flight of an unconstrained body.

use mbd_constraint::ConstraintGroup;
use mbd_core::{Stepper, System};
use mbd_types::{math::is_rotation, Body, SolverConfig};
use nalgebra::{Matrix3, Vector3};

fn tumbling_body() -> System {
    let body = Body::new(2.0, Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0)))
        .unwrap()
        .with_position(Vector3::new(0.0, 0.0, 1.0))
        .with_velocity(Vector3::new(1.0, -2.0, 0.5))
        .with_angular_velocity(Vector3::new(0.3, 0.5, 0.2));
    let mut system = System::new(vec![body], ConstraintGroup::new(vec![], 1))
        .unwrap()
        .with_config(
            SolverConfig::default()
                .with_step_size(1e-3)
                .with_tolerance(1e-10)
                .zero_gravity(),
        )
        .unwrap();
    system.set_dynamics();
    system
}

#[test]
fn free_body_keeps_velocity_momentum_and_energy() {
    let mut system = tumbling_body();
    system.initialize().unwrap();

    let v0 = system.bodies()[0].velocity;
    let l0 = system.bodies()[0].angular_momentum().norm();
    let e0 = system.bodies()[0].kinetic_energy();

    let h = system.config().step_size;
    for i in 0..1000 {
        let t = i as f64 * h;
        system.do_step(i, t).unwrap();

        let body = &system.bodies()[0];
        assert_eq!(body.velocity, v0, "translational velocity drifted at t = {t}");
        assert!(is_rotation(&body.orientation, 1e-9), "A left SO(3) at t = {t}");

        let l = body.angular_momentum().norm();
        assert!(
            ((l - l0) / l0).abs() < 1e-3,
            "|Jω| went from {l0} to {l} by t = {t}"
        );

        let e = body.kinetic_energy();
        assert!(((e - e0) / e0).abs() < 1e-3, "kinetic energy went from {e0} to {e} by t = {t}");
    }

    // Still tumbling about more than one axis.
    let omega = system.bodies()[0].angular_velocity;
    assert!(omega.x.abs() > 1e-3 && omega.y.abs() > 1e-3 && omega.z.abs() > 1e-3);
}

#[test]
fn free_body_moves_in_a_straight_line() {
    let mut system = tumbling_body();
    let trajectory = Stepper::new(1.0).with_record_interval(250).run(&mut system).unwrap();

    let start = Vector3::new(0.0, 0.0, 1.0);
    let v = Vector3::new(1.0, -2.0, 0.5);
    for record in trajectory.records() {
        let expected = start + v * record.time;
        assert!(
            (record.positions[0] - expected).norm() < 1e-9,
            "off the line at t = {}",
            record.time
        );
        assert!(record.lambda.is_empty());
    }
}
