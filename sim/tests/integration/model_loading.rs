//! Systems built from JSON model descriptions.

use approx::assert_relative_eq;
use mbd_conformance_tests::{pendulum, rod_inertia};
use mbd_core::{load_model, load_model_file, SimError, Stepper};
use mbd_types::{BodyId, LoadPolicy, SolverConfig, SolverMode};

fn pendulum_json(half_length: f64) -> String {
    let inertia = rod_inertia(1.0, 2.0 * half_length);
    let (axial, transverse) = (inertia[(0, 0)], inertia[(1, 1)]);
    let pin = -half_length;
    format!(
        r#"{{
        "bodies": [
            {{ "id": "world", "ground": true }},
            {{ "id": "link", "mass": 1.0,
               "inertia": [[{axial}, 0, 0], [0, {transverse}, 0], [0, 0, {transverse}]],
               "position": [{half_length}, 0, 0] }}
        ],
        "constraints": [
            {{ "type": "CD", "body_i": "world", "body_j": "link", "c": [1, 0, 0], "s_bar_j": [{pin}, 0, 0] }},
            {{ "type": "CD", "body_i": "world", "body_j": "link", "c": [0, 1, 0], "s_bar_j": [{pin}, 0, 0] }},
            {{ "type": "CD", "body_i": "world", "body_j": "link", "c": [0, 0, 1], "s_bar_j": [{pin}, 0, 0] }},
            {{ "type": "DP1", "name": "hinge-u", "body_i": "world", "body_j": "link",
               "a_bar_i": [0, 0, -1], "a_bar_j": [0, 1, 0] }},
            {{ "type": "DP1", "name": "hinge-v", "body_i": "world", "body_j": "link",
               "a_bar_i": [-1, 0, 0], "a_bar_j": [0, 1, 0] }}
        ]
    }}"#
    )
}

fn config() -> SolverConfig {
    SolverConfig::default()
        .with_step_size(1e-3)
        .with_max_iterations(20)
        .with_load_policy(LoadPolicy::Constant)
}

#[test]
fn loaded_pendulum_matches_built_pendulum() {
    let model = load_model(&pendulum_json(2.0)).unwrap();
    assert_eq!(model.body_id("link"), Some(BodyId::new(0)));
    assert_eq!(model.body_id("world"), None);

    let mut loaded = model.into_system().unwrap().with_config(config()).unwrap();
    loaded.set_dynamics();
    let mut built = pendulum(1.0, 2.0, config());
    built.set_dynamics();

    let from_file = Stepper::new(0.5).run(&mut loaded).unwrap();
    let from_code = Stepper::new(0.5).run(&mut built).unwrap();

    assert_eq!(from_file.len(), from_code.len());
    for (a, b) in from_file.records().iter().zip(from_code.records()) {
        assert_relative_eq!(a.positions[0], b.positions[0], epsilon = 1e-12);
        assert_relative_eq!(a.orientations[0], b.orientations[0], epsilon = 1e-12);
        assert_relative_eq!(a.lambda, b.lambda, epsilon = 1e-9);
    }
}

#[test]
fn model_file_round_trip() {
    let path = std::env::temp_dir().join(format!("mbd-pendulum-{}.json", std::process::id()));
    std::fs::write(&path, pendulum_json(1.0)).unwrap();

    let model = load_model_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(model.bodies.len(), 1);
    assert_eq!(model.constraints.nc(), 5);
    assert_eq!(model.constraints.constraint(3).unwrap().name(), "hinge-u");
}

#[test]
fn driven_model_swaps_to_alternate() {
    let json = r#"{
        "bodies": [
            { "id": "ground", "ground": true },
            { "id": "crank", "mass": 1.0, "inertia": [[0.01, 0, 0], [0, 0.3, 0], [0, 0, 0.3]],
              "position": [0, 1, 0],
              "orientation": [[0, -1, 0], [1, 0, 0], [0, 0, 1]] }
        ],
        "constraints": [
            { "type": "CD", "body_i": "ground", "body_j": "crank", "c": [1, 0, 0], "s_bar_j": [-1, 0, 0] },
            { "type": "CD", "body_i": "ground", "body_j": "crank", "c": [0, 1, 0], "s_bar_j": [-1, 0, 0] },
            { "type": "CD", "body_i": "ground", "body_j": "crank", "c": [0, 0, 1], "s_bar_j": [-1, 0, 0] },
            { "type": "DP1", "body_i": "ground", "body_j": "crank", "a_bar_i": [1, 0, 0], "a_bar_j": [0, 0, 1] },
            { "type": "DP1", "body_i": "ground", "body_j": "crank", "a_bar_i": [0, 1, 0], "a_bar_j": [0, 0, 1] },
            { "type": "DP1", "name": "drive-cos", "body_i": "ground", "body_j": "crank",
              "a_bar_i": [1, 0, 0], "a_bar_j": [1, 0, 0],
              "f": { "harmonic": { "amplitude": 1.0, "frequency": 3.141592653589793, "phase": 1.5707963267948966 } },
              "alternate": {
                  "type": "DP1", "name": "drive-sin", "body_i": "ground", "body_j": "crank",
                  "a_bar_i": [0, 1, 0], "a_bar_j": [1, 0, 0],
                  "f": { "harmonic": { "amplitude": 1.0, "frequency": 3.141592653589793, "phase": 0.0 } }
              } }
        ]
    }"#;

    let mut system = load_model(json).unwrap().into_system().unwrap();
    system
        .set_config(SolverConfig::default().with_step_size(1e-3))
        .unwrap();
    system.set_kinematics();

    Stepper::new(1.0).run(&mut system).unwrap();

    assert_eq!(system.mode(), SolverMode::Kinematics);
    let events = system.swap_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].from, "drive-cos");
    assert_eq!(events[0].to, "drive-sin");
    assert_eq!(events[1].to, "drive-cos");
}

#[test]
fn bad_models_are_rejected() {
    assert!(matches!(load_model("[]"), Err(SimError::ModelParse { .. })));

    let unknown_type = r#"{ "bodies": [], "constraints": [ { "type": "XYZ", "body_i": "a", "body_j": "b" } ] }"#;
    assert!(matches!(load_model(unknown_type), Err(SimError::ModelParse { .. })));

    let missing_length = r#"{
        "bodies": [ { "id": "a", "mass": 1, "inertia": [[1,0,0],[0,1,0],[0,0,1]] } ],
        "constraints": [ { "type": "D", "body_i": "a", "body_j": "a" } ]
    }"#;
    assert!(matches!(load_model(missing_length), Err(SimError::InvalidModel { .. })));
}
