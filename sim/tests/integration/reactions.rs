//! Reaction forces of a pendulum hanging at rest.

use approx::assert_relative_eq;
use mbd_conformance_tests::hanging_pendulum;
use mbd_types::{BodyId, LoadPolicy, SolverConfig};
use nalgebra::Vector3;

const MASS: f64 = 2.5;

fn config() -> SolverConfig {
    SolverConfig::default()
        .with_step_size(1e-3)
        .with_tolerance(1e-9)
        .with_max_iterations(20)
        .with_load_policy(LoadPolicy::Constant)
}

#[test]
fn hanging_pendulum_pin_carries_the_weight() {
    let mut system = hanging_pendulum(MASS, 1.0, config());
    system.set_dynamics();
    system.initialize().unwrap();

    let weight = Vector3::new(0.0, 0.0, -9.81 * MASS);
    let link = BodyId::new(0);

    let h = system.config().step_size;
    for i in 0..200 {
        let t = i as f64 * h;
        system.do_step(i, t).unwrap();

        // At rest the constraint term balances the applied load exactly.
        let reaction = system.reaction_force_on(link).unwrap();
        assert_relative_eq!(reaction, weight, epsilon = 1e-6);
        assert_relative_eq!(system.reaction_torque_on(link).unwrap(), Vector3::zeros(), epsilon = 1e-6);
    }

    // Only the vertical coordinate-difference row carries load.
    assert_relative_eq!(system.joint_force_on_body(link, 2, 2).unwrap(), weight.z, epsilon = 1e-6);
    for c in [0, 1, 3, 4] {
        for axis in 0..3 {
            assert_relative_eq!(system.joint_force_on_body(link, axis, c).unwrap(), 0.0, epsilon = 1e-6);
        }
    }

    // And the link has not moved.
    assert_relative_eq!(
        system.bodies()[0].position,
        Vector3::new(0.0, 0.0, -1.0),
        epsilon = 1e-9
    );
}

#[test]
fn stacked_reactions_match_per_body_totals() {
    let mut system = hanging_pendulum(MASS, 1.0, config());
    system.set_dynamics();
    system.initialize().unwrap();
    system.do_step(0, 0.0).unwrap();
    system.do_step(1, 1e-3).unwrap();

    let forces = system.reaction_forces();
    let torques = system.reaction_torques();
    assert_eq!(forces.len(), 3);
    assert_eq!(torques.len(), 3);

    let link = BodyId::new(0);
    let force = system.reaction_force_on(link).unwrap();
    let torque = system.reaction_torque_on(link).unwrap();
    for axis in 0..3 {
        assert_eq!(forces[axis], force[axis]);
        assert_eq!(torques[axis], torque[axis]);

        let summed: f64 = (0..system.nc())
            .map(|c| system.joint_torque_on_body(link, axis, c).unwrap())
            .sum();
        assert_relative_eq!(summed, torque[axis], epsilon = 1e-12);
    }
}
