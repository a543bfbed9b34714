//! JSON model loading.
//!
//! A model file lists bodies and constraints. Bodies are referred to by
//! string id; bodies flagged `ground` are dropped from the indexed body list
//! and constraints that name them attach to the global frame.
//!
//! ```json
//! {
//!   "bodies": [
//!     { "id": "ground", "ground": true },
//!     { "id": "link", "mass": 1.0, "inertia": [[1,0,0],[0,1,0],[0,0,1]],
//!       "position": [2, 0, 0] }
//!   ],
//!   "constraints": [
//!     { "type": "D", "body_i": "ground", "body_j": "link", "length": 2.0 },
//!     { "type": "DP1", "name": "driver", "body_i": "ground", "body_j": "link",
//!       "a_bar_i": [1, 0, 0], "a_bar_j": [1, 0, 0],
//!       "f": { "harmonic": { "amplitude": 1, "frequency": 3.14, "phase": 0 } },
//!       "alternate": { "type": "DP1", "body_i": "ground", "body_j": "link",
//!                      "a_bar_i": [0, 1, 0], "a_bar_j": [1, 0, 0] } }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use mbd_constraint::{BodyRef, Constraint, ConstraintGroup, ConstraintKind, DrivingFunction};
use mbd_types::{Body, BodyId, Result, SimError};

use crate::System;

type Matrix3Rows = [[f64; 3]; 3];

/// Top-level model file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescription {
    /// Bodies, including ground.
    pub bodies: Vec<BodyDescription>,
    /// Constraints in multiplier order.
    #[serde(default)]
    pub constraints: Vec<ConstraintDescription>,
}

/// One body entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyDescription {
    /// Unique id used by constraints.
    pub id: String,
    /// Whether this body is the fixed global frame.
    #[serde(default)]
    pub ground: bool,
    /// Mass; required for non-ground bodies.
    #[serde(default)]
    pub mass: Option<f64>,
    /// Inertia tensor rows in the body frame; required for non-ground bodies.
    #[serde(default)]
    pub inertia: Option<Matrix3Rows>,
    /// Initial position.
    #[serde(default)]
    pub position: [f64; 3],
    /// Initial orientation rows; identity if omitted.
    #[serde(default)]
    pub orientation: Option<Matrix3Rows>,
    /// Initial velocity.
    #[serde(default)]
    pub velocity: [f64; 3],
    /// Initial body-frame angular velocity.
    #[serde(default)]
    pub angular_velocity: [f64; 3],
}

/// Constraint type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintType {
    /// Dot product of two body axes.
    #[serde(rename = "DP1")]
    Dp1,
    /// Dot product of a body axis and a point-to-point vector.
    #[serde(rename = "DP2")]
    Dp2,
    /// Coordinate difference along a global axis.
    #[serde(rename = "CD")]
    Cd,
    /// Point-to-point distance.
    #[serde(rename = "D")]
    D,
}

/// One constraint entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintDescription {
    /// Constraint type.
    #[serde(rename = "type")]
    pub kind: ConstraintType,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Id of body `i`.
    pub body_i: String,
    /// Id of body `j`.
    pub body_j: String,
    /// Axis on body `i` (DP1, DP2).
    #[serde(default)]
    pub a_bar_i: Option<[f64; 3]>,
    /// Axis on body `j` (DP1).
    #[serde(default)]
    pub a_bar_j: Option<[f64; 3]>,
    /// Point on body `i` (DP2, CD, D).
    #[serde(default)]
    pub s_bar_i: [f64; 3],
    /// Point on body `j` (DP2, CD, D).
    #[serde(default)]
    pub s_bar_j: [f64; 3],
    /// Global axis (CD).
    #[serde(default)]
    pub c: Option<[f64; 3]>,
    /// Distance (D) when `f` is not given.
    #[serde(default)]
    pub length: Option<f64>,
    /// Prescribed value; zero if omitted.
    #[serde(default)]
    pub f: Option<DrivingFunction>,
    /// Alternate formulation swapped in near singular configurations.
    #[serde(default)]
    pub alternate: Option<Box<ConstraintDescription>>,
}

/// A model ready to become a [`System`].
#[derive(Debug, Clone)]
pub struct LoadedModel {
    /// Non-ground bodies in index order.
    pub bodies: Vec<Body>,
    /// Constraints with alternates registered.
    pub constraints: ConstraintGroup,
    /// Map from body id string to index. Ground ids are absent.
    pub body_ids: HashMap<String, BodyId>,
}

impl LoadedModel {
    /// Index of a body by its id string.
    #[must_use]
    pub fn body_id(&self, name: &str) -> Option<BodyId> {
        self.body_ids.get(name).copied()
    }

    /// Build a [`System`] with default solver configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bodies and constraints are inconsistent.
    pub fn into_system(self) -> Result<System> {
        System::new(self.bodies, self.constraints)
    }
}

/// Load a model from a JSON string.
///
/// # Errors
///
/// Returns [`SimError::ModelParse`] for malformed JSON and
/// [`SimError::InvalidModel`] for an inconsistent model.
pub fn load_model(json: &str) -> Result<LoadedModel> {
    let description: ModelDescription =
        serde_json::from_str(json).map_err(|e| SimError::ModelParse {
            reason: e.to_string(),
        })?;
    build_model(&description)
}

/// Load a model from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_model_file(path: impl AsRef<Path>) -> Result<LoadedModel> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| SimError::invalid_model(format!("{}: {e}", path.display())))?;
    load_model(&content)
}

/// Convert a parsed description into bodies and constraints.
///
/// # Errors
///
/// Returns [`SimError::InvalidModel`] for duplicate or unknown body ids,
/// missing constraint vectors, or invalid body properties.
pub fn build_model(description: &ModelDescription) -> Result<LoadedModel> {
    let mut refs: HashMap<&str, BodyRef> = HashMap::new();
    let mut body_ids = HashMap::new();
    let mut bodies = Vec::new();

    for desc in &description.bodies {
        if refs.contains_key(desc.id.as_str()) {
            return Err(SimError::invalid_model(format!("duplicate body id '{}'", desc.id)));
        }
        if desc.ground {
            if desc.position != [0.0; 3] || desc.orientation.is_some() {
                tracing::warn!("Pose of ground body '{}' ignored; ground is the global frame", desc.id);
            }
            refs.insert(desc.id.as_str(), BodyRef::Ground);
            continue;
        }

        let id = BodyId::new(bodies.len());
        bodies.push(build_body(desc, id)?);
        refs.insert(desc.id.as_str(), BodyRef::Body(id));
        body_ids.insert(desc.id.clone(), id);
    }

    let mut constraints = Vec::with_capacity(description.constraints.len());
    let mut alternates = Vec::new();
    for (slot, desc) in description.constraints.iter().enumerate() {
        constraints.push(build_constraint(desc, &refs)?);
        if let Some(alternate) = &desc.alternate {
            alternates.push((slot, build_constraint(alternate, &refs)?));
        }
    }

    let mut group = ConstraintGroup::new(constraints, bodies.len());
    for (slot, alternate) in alternates {
        group.register_alternate(slot, alternate)?;
    }

    Ok(LoadedModel {
        bodies,
        constraints: group,
        body_ids,
    })
}

fn build_body(desc: &BodyDescription, id: BodyId) -> Result<Body> {
    let context = |e: SimError| SimError::invalid_model(format!("body '{}': {e}", desc.id));

    let mass = desc
        .mass
        .ok_or_else(|| SimError::invalid_model(format!("body '{}' has no mass", desc.id)))?;
    let inertia = desc
        .inertia
        .ok_or_else(|| SimError::invalid_model(format!("body '{}' has no inertia", desc.id)))?;

    let mut body = Body::new(mass, matrix_from_rows(&inertia))
        .map_err(context)?
        .with_id(id)
        .with_position(Vector3::from(desc.position))
        .with_velocity(Vector3::from(desc.velocity))
        .with_angular_velocity(Vector3::from(desc.angular_velocity));
    if let Some(rows) = &desc.orientation {
        body = body.try_with_orientation(matrix_from_rows(rows)).map_err(context)?;
    }
    Ok(body)
}

fn build_constraint(desc: &ConstraintDescription, refs: &HashMap<&str, BodyRef>) -> Result<Constraint> {
    let resolve = |id: &str| {
        refs.get(id)
            .copied()
            .ok_or_else(|| SimError::invalid_model(format!("constraint references unknown body '{id}'")))
    };
    let body_i = resolve(&desc.body_i)?;
    let body_j = resolve(&desc.body_j)?;

    let s_i = Vector3::from(desc.s_bar_i);
    let s_j = Vector3::from(desc.s_bar_j);
    let kind = match desc.kind {
        ConstraintType::Dp1 => ConstraintKind::DotProduct1 {
            a_i: required_axis(desc.a_bar_i, "a_bar_i", desc)?,
            a_j: required_axis(desc.a_bar_j, "a_bar_j", desc)?,
        },
        ConstraintType::Dp2 => ConstraintKind::DotProduct2 {
            a_i: required_axis(desc.a_bar_i, "a_bar_i", desc)?,
            s_i,
            s_j,
        },
        ConstraintType::Cd => ConstraintKind::CoordinateDifference {
            c: required_axis(desc.c, "c", desc)?,
            s_i,
            s_j,
        },
        ConstraintType::D => ConstraintKind::Distance { s_i, s_j },
    };

    let target = match (&desc.f, desc.length, desc.kind) {
        (Some(f), _, _) => f.clone(),
        (None, Some(length), ConstraintType::D) => DrivingFunction::Constant(length * length),
        (None, None, ConstraintType::D) => {
            return Err(SimError::invalid_model(format!(
                "distance constraint '{}' needs `length` or `f`",
                display_name(desc)
            )))
        }
        (None, Some(_), _) => {
            return Err(SimError::invalid_model(format!(
                "`length` only applies to distance constraints ('{}')",
                display_name(desc)
            )))
        }
        (None, None, _) => DrivingFunction::default(),
    };

    let constraint = Constraint::new(kind, body_i, body_j).with_target(target);
    Ok(match &desc.name {
        Some(name) => constraint.with_name(name.clone()),
        None => constraint,
    })
}

fn required_axis(
    value: Option<[f64; 3]>,
    field: &str,
    desc: &ConstraintDescription,
) -> Result<Vector3<f64>> {
    let axis = value.map(Vector3::from).ok_or_else(|| {
        SimError::invalid_model(format!("constraint '{}' is missing `{field}`", display_name(desc)))
    })?;
    if axis.norm() == 0.0 {
        return Err(SimError::invalid_model(format!(
            "constraint '{}' has a zero `{field}`",
            display_name(desc)
        )));
    }
    Ok(axis)
}

fn display_name(desc: &ConstraintDescription) -> &str {
    desc.name.as_deref().unwrap_or(match desc.kind {
        ConstraintType::Dp1 => "DP1",
        ConstraintType::Dp2 => "DP2",
        ConstraintType::Cd => "CD",
        ConstraintType::D => "D",
    })
}

fn matrix_from_rows(rows: &Matrix3Rows) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| rows[i][j])
}
