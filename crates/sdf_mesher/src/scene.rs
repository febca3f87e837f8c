//! Field scene: a small tree of named primitive nodes.
//!
//! The scene is what both evaluator backends see. The CPU backend evaluates
//! it directly; the accelerator receives its parameters as named properties
//! and per-node transforms during configuration.
//!
//! # Property Naming
//!
//! ```text
//! node "ball", Sphere { radius }         →  "ball_radius"
//! node "ring", Torus { major, minor }    →  "ring_major", "ring_minor"
//! transform of node "ring"               →  "_transform_ring"  (transform path)
//! ```
//!
//! The scene distance is the union (minimum) of every primitive, each
//! evaluated in its node's local frame: `local = rotation⁻¹ · (p − translation)`.

use std::collections::HashSet;

use glam::{Affine3A, Quat, Vec3};
use smallvec::SmallVec;

use crate::constants::TRANSFORM_PROPERTY_PREFIX;
use crate::error::ConfigurationError;
use crate::field::DistanceField;

// =============================================================================
// Primitives
// =============================================================================

/// Primitive shape in its local frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
  /// Sphere centered at the local origin.
  Sphere { radius: f32 },
  /// Torus around the local Y axis.
  Torus { major: f32, minor: f32 },
  /// Axis-aligned box centered at the local origin.
  Cuboid { half_extents: Vec3 },
  /// Power-`power` Mandelbulb distance estimate.
  Mandelbulb {
    power: f32,
    bailout: f32,
    iterations: u32,
  },
}

impl Primitive {
  /// Named parameters with their current values.
  pub fn params(&self) -> SmallVec<[(&'static str, f32); 3]> {
    match self {
      Primitive::Sphere { radius } => SmallVec::from_slice(&[("radius", *radius)]),
      Primitive::Torus { major, minor } => {
        SmallVec::from_slice(&[("major", *major), ("minor", *minor)])
      }
      Primitive::Cuboid { half_extents } => SmallVec::from_slice(&[
        ("half_x", half_extents.x),
        ("half_y", half_extents.y),
        ("half_z", half_extents.z),
      ]),
      Primitive::Mandelbulb {
        power,
        bailout,
        iterations,
      } => SmallVec::from_slice(&[
        ("power", *power),
        ("bailout", *bailout),
        ("iterations", *iterations as f32),
      ]),
    }
  }

  /// Same shape with every parameter replaced through `lookup`.
  pub fn with_params<F>(&self, lookup: F) -> Self
  where
    F: Fn(&str) -> f32,
  {
    match self {
      Primitive::Sphere { .. } => Primitive::Sphere {
        radius: lookup("radius"),
      },
      Primitive::Torus { .. } => Primitive::Torus {
        major: lookup("major"),
        minor: lookup("minor"),
      },
      Primitive::Cuboid { .. } => Primitive::Cuboid {
        half_extents: Vec3::new(lookup("half_x"), lookup("half_y"), lookup("half_z")),
      },
      Primitive::Mandelbulb { .. } => Primitive::Mandelbulb {
        power: lookup("power"),
        bailout: lookup("bailout"),
        iterations: lookup("iterations").max(0.0) as u32,
      },
    }
  }

  /// Signed distance at local position `p`.
  pub fn distance(&self, p: Vec3) -> f32 {
    match self {
      Primitive::Sphere { radius } => p.length() - radius,
      Primitive::Torus { major, minor } => {
        let ring = Vec3::new(p.x, 0.0, p.z).length() - major;
        (ring * ring + p.y * p.y).sqrt() - minor
      }
      Primitive::Cuboid { half_extents } => {
        let q = p.abs() - *half_extents;
        q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
      }
      Primitive::Mandelbulb {
        power,
        bailout,
        iterations,
      } => mandelbulb(p, *power, *bailout, *iterations),
    }
  }
}

fn mandelbulb(p: Vec3, power: f32, bailout: f32, iterations: u32) -> f32 {
  let mut z = p;
  let mut dr = 1.0f32;
  let mut r = 0.0f32;
  for _ in 0..iterations {
    r = z.length();
    if r > bailout || r < 1e-12 {
      break;
    }
    // Polar form, raise to `power`, back to cartesian
    let theta = (z.z / r).acos() * power;
    let phi = z.y.atan2(z.x) * power;
    dr = r.powf(power - 1.0) * power * dr + 1.0;
    let zr = r.powf(power);
    z = zr * Vec3::new(theta.sin() * phi.cos(), phi.sin() * theta.sin(), theta.cos()) + p;
  }
  if r < 1e-12 {
    return 0.0;
  }
  0.5 * r.ln() * r / dr
}

// =============================================================================
// Scene tree
// =============================================================================

/// Named node with an optional primitive and child nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldNode {
  pub name: String,
  pub primitive: Option<Primitive>,
  /// World-space position of the node's local origin.
  pub translation: Vec3,
  /// World-space orientation of the node's local frame.
  pub rotation: Quat,
  pub children: Vec<FieldNode>,
}

impl FieldNode {
  /// Grouping node without a primitive of its own.
  pub fn group(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      primitive: None,
      translation: Vec3::ZERO,
      rotation: Quat::IDENTITY,
      children: Vec::new(),
    }
  }

  pub fn primitive(name: impl Into<String>, primitive: Primitive) -> Self {
    Self {
      primitive: Some(primitive),
      ..Self::group(name)
    }
  }

  pub fn sphere(name: impl Into<String>, radius: f32) -> Self {
    Self::primitive(name, Primitive::Sphere { radius })
  }

  pub fn torus(name: impl Into<String>, major: f32, minor: f32) -> Self {
    Self::primitive(name, Primitive::Torus { major, minor })
  }

  pub fn cuboid(name: impl Into<String>, half_extents: Vec3) -> Self {
    Self::primitive(name, Primitive::Cuboid { half_extents })
  }

  pub fn mandelbulb(name: impl Into<String>, power: f32, bailout: f32, iterations: u32) -> Self {
    Self::primitive(
      name,
      Primitive::Mandelbulb {
        power,
        bailout,
        iterations,
      },
    )
  }

  pub fn with_translation(mut self, translation: Vec3) -> Self {
    self.translation = translation;
    self
  }

  pub fn with_rotation(mut self, rotation: Quat) -> Self {
    self.rotation = rotation;
    self
  }

  pub fn with_child(mut self, child: FieldNode) -> Self {
    self.children.push(child);
    self
  }

  /// Depth-first, parent before children.
  fn visit<'a, F>(&'a self, f: &mut F)
  where
    F: FnMut(&'a FieldNode),
  {
    f(self);
    for child in &self.children {
      child.visit(f);
    }
  }
}

/// Source of the parameter values used to evaluate a scene.
pub trait ParamSource {
  /// Value of property `name`, e.g. `"ball_radius"`.
  fn float(&self, name: &str) -> Option<f32>;
  /// Translation and rotation of node `node`.
  fn transform(&self, node: &str) -> Option<(Vec3, Quat)>;
}

/// Name of the property carrying `param` of `node`.
pub fn property_name(node: &str, param: &str) -> String {
  format!("{node}_{param}")
}

/// Name of the property marking the transform of `node`.
pub fn transform_property_name(node: &str) -> String {
  format!("{TRANSFORM_PROPERTY_PREFIX}{node}")
}

/// Validated scene tree with its own parameters resolved for evaluation.
#[derive(Clone, Debug)]
pub struct FieldScene {
  root: FieldNode,
  resolved: ResolvedScene,
}

impl FieldScene {
  /// Build a scene. Node names must be unique, they key the properties.
  pub fn new(root: FieldNode) -> Result<Self, ConfigurationError> {
    let mut seen = HashSet::new();
    let mut duplicate = None;
    root.visit(&mut |node| {
      if !seen.insert(node.name.as_str()) && duplicate.is_none() {
        duplicate = Some(node.name.clone());
      }
    });
    if let Some(name) = duplicate {
      return Err(ConfigurationError::DuplicateNode(name));
    }

    let mut scene = Self {
      root,
      resolved: ResolvedScene::default(),
    };
    scene.resolved = scene.resolve(&scene);
    Ok(scene)
  }

  pub fn root(&self) -> &FieldNode {
    &self.root
  }

  /// All nodes, depth-first.
  pub fn nodes(&self) -> Vec<&FieldNode> {
    let mut nodes = Vec::new();
    self.root.visit(&mut |node| nodes.push(node));
    nodes
  }

  /// Nodes carrying a primitive; these receive transforms.
  pub fn shape_nodes(&self) -> Vec<&FieldNode> {
    let mut nodes = self.nodes();
    nodes.retain(|node| node.primitive.is_some());
    nodes
  }

  /// Property block describing this scene: one float per primitive parameter
  /// plus a transform marker per shape node.
  pub fn properties(&self) -> PropertyBlock {
    let mut block = PropertyBlock::default();
    for node in self.shape_nodes() {
      block.set(transform_property_name(&node.name), 0.0);
      if let Some(primitive) = &node.primitive {
        for (param, value) in primitive.params() {
          block.set(property_name(&node.name, param), value);
        }
      }
    }
    block
  }

  /// Resolve every primitive against `params`. Missing floats read as zero
  /// and missing transforms as identity, like unset uniforms.
  pub fn resolve(&self, params: &dyn ParamSource) -> ResolvedScene {
    let shapes = self
      .shape_nodes()
      .into_iter()
      .filter_map(|node| {
        let primitive = node.primitive.as_ref()?;
        let (translation, rotation) = params
          .transform(&node.name)
          .unwrap_or((Vec3::ZERO, Quat::IDENTITY));
        let world_to_local = Affine3A::from_rotation_translation(rotation, translation).inverse();
        let primitive = primitive.with_params(|param| {
          params
            .float(&property_name(&node.name, param))
            .unwrap_or(0.0)
        });
        Some(ResolvedShape {
          world_to_local,
          primitive,
        })
      })
      .collect();
    ResolvedScene { shapes }
  }

  fn find(&self, name: &str) -> Option<&FieldNode> {
    self.nodes().into_iter().find(|node| node.name == name)
  }
}

impl ParamSource for FieldScene {
  fn float(&self, name: &str) -> Option<f32> {
    self.shape_nodes().into_iter().find_map(|node| {
      let param = name.strip_prefix(node.name.as_str())?.strip_prefix('_')?;
      let primitive = node.primitive.as_ref()?;
      primitive
        .params()
        .into_iter()
        .find(|(p, _)| *p == param)
        .map(|(_, v)| v)
    })
  }

  fn transform(&self, node: &str) -> Option<(Vec3, Quat)> {
    self
      .find(node)
      .map(|node| (node.translation, node.rotation))
  }
}

impl DistanceField for FieldScene {
  fn distance(&self, p: Vec3) -> f32 {
    self.resolved.distance(p)
  }
}

#[derive(Clone, Debug)]
struct ResolvedShape {
  world_to_local: Affine3A,
  primitive: Primitive,
}

/// Scene with concrete parameters and precomputed frames.
#[derive(Clone, Debug, Default)]
pub struct ResolvedScene {
  shapes: Vec<ResolvedShape>,
}

impl ResolvedScene {
  pub fn shape_count(&self) -> usize {
    self.shapes.len()
  }
}

impl DistanceField for ResolvedScene {
  /// Union of all shapes; an empty scene is empty space everywhere.
  fn distance(&self, p: Vec3) -> f32 {
    self
      .shapes
      .iter()
      .map(|shape| {
        shape
          .primitive
          .distance(shape.world_to_local.transform_point3(p))
      })
      .fold(f32::MAX, f32::min)
  }
}

// =============================================================================
// Property block
// =============================================================================

/// Ordered name → float property list, as exposed by a material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyBlock {
  entries: Vec<(String, f32)>,
}

impl PropertyBlock {
  /// Set or overwrite a property.
  pub fn set(&mut self, name: impl Into<String>, value: f32) {
    let name = name.into();
    match self.entries.iter_mut().find(|(n, _)| *n == name) {
      Some(entry) => entry.1 = value,
      None => self.entries.push((name, value)),
    }
  }

  pub fn get(&self, name: &str) -> Option<f32> {
    self
      .entries
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, v)| *v)
  }

  /// Apply every entry of `overrides` on top of this block.
  pub fn merge(&mut self, overrides: &PropertyBlock) {
    for (name, value) in overrides.iter() {
      self.set(name, value);
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
    self.entries.iter().map(|(n, v)| (n.as_str(), *v))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
#[path = "scene_test.rs"]
mod scene_test;
