use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use super::*;

fn two_shape_scene() -> FieldScene {
  FieldScene::new(
    FieldNode::group("root")
      .with_child(FieldNode::sphere("ball", 1.0).with_translation(Vec3::new(2.0, 0.0, 0.0)))
      .with_child(
        FieldNode::torus("ring", 2.0, 0.5)
          .with_translation(Vec3::new(-3.0, 0.0, 0.0))
          .with_rotation(Quat::from_rotation_x(FRAC_PI_2)),
      ),
  )
  .expect("valid scene")
}

/// Uniform values held outside the scene, like an accelerator's state.
#[derive(Default)]
struct Uniforms {
  floats: HashMap<String, f32>,
  transforms: HashMap<String, (Vec3, Quat)>,
}

impl ParamSource for Uniforms {
  fn float(&self, name: &str) -> Option<f32> {
    self.floats.get(name).copied()
  }

  fn transform(&self, node: &str) -> Option<(Vec3, Quat)> {
    self.transforms.get(node).copied()
  }
}

#[test]
fn test_primitive_distances() {
  let sphere = Primitive::Sphere { radius: 2.0 };
  assert!((sphere.distance(Vec3::new(0.0, 3.0, 0.0)) - 1.0).abs() < 1e-6);

  let torus = Primitive::Torus {
    major: 2.0,
    minor: 0.5,
  };
  assert!(torus.distance(Vec3::new(2.0, 0.0, 0.0)) + 0.5 < 1e-6);
  assert!((torus.distance(Vec3::ZERO) - 1.5).abs() < 1e-6);

  let cuboid = Primitive::Cuboid {
    half_extents: Vec3::new(1.0, 2.0, 3.0),
  };
  assert!((cuboid.distance(Vec3::new(2.0, 0.0, 0.0)) - 1.0).abs() < 1e-6);
  assert!((cuboid.distance(Vec3::ZERO) + 1.0).abs() < 1e-6);
}

#[test]
fn test_mandelbulb_sign() {
  let bulb = Primitive::Mandelbulb {
    power: 8.0,
    bailout: 2.0,
    iterations: 32,
  };
  assert!(bulb.distance(Vec3::new(0.1, 0.1, 0.1)) <= 0.0, "near origin is inside");
  assert!(bulb.distance(Vec3::new(3.0, 0.0, 0.0)) > 0.0, "far point is outside");
  assert!(bulb.distance(Vec3::ZERO).is_finite());
}

#[test]
fn test_scene_distance_is_union_in_local_frames() {
  let scene = two_shape_scene();
  // Sphere surface at x = 3
  assert!(scene.distance(Vec3::new(3.0, 0.0, 0.0)).abs() < 1e-5);
  // Torus rotated into the XY plane: its tube passes through (-3, 2, 0)
  assert!(scene.distance(Vec3::new(-3.0, 2.0, 0.0)) < 0.0);
  // Before rotation the tube sat at (-3, 0, 2), which is now the hole axis
  assert!(scene.distance(Vec3::new(-3.0, 0.0, 2.0)) > 0.0);
}

#[test]
fn test_duplicate_names_rejected() {
  let root = FieldNode::group("root")
    .with_child(FieldNode::sphere("a", 1.0))
    .with_child(FieldNode::sphere("a", 2.0));
  assert_eq!(
    FieldScene::new(root).unwrap_err(),
    ConfigurationError::DuplicateNode("a".into())
  );
}

#[test]
fn test_properties_and_markers() {
  let scene = two_shape_scene();
  let props = scene.properties();

  assert_eq!(props.get("ball_radius"), Some(1.0));
  assert_eq!(props.get("ring_major"), Some(2.0));
  assert_eq!(props.get("ring_minor"), Some(0.5));
  assert!(props.get("_transform_ball").is_some());
  assert!(props.get("_transform_ring").is_some());
  assert!(props.get("_transform_root").is_none(), "groups carry no transform");
  assert_eq!(props.len(), 5);
}

#[test]
fn test_scene_as_param_source() {
  let scene = two_shape_scene();
  assert_eq!(scene.float("ball_radius"), Some(1.0));
  assert_eq!(scene.float("ring_minor"), Some(0.5));
  assert_eq!(scene.float("ring_radius"), None);
  assert_eq!(
    scene.transform("ball"),
    Some((Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY))
  );
  assert_eq!(scene.transform("missing"), None);
}

#[test]
fn test_resolve_against_external_uniforms() {
  let scene = two_shape_scene();

  // Nothing pushed: zero-sized shapes at the origin
  let unset = scene.resolve(&Uniforms::default());
  assert_eq!(unset.shape_count(), 2);
  assert!((unset.distance(Vec3::new(0.0, 5.0, 0.0)) - 5.0).abs() < 1e-5);

  // Everything pushed: identical to the scene's own evaluation
  let mut uniforms = Uniforms::default();
  for (name, value) in scene.properties().iter() {
    uniforms.floats.insert(name.to_string(), value);
  }
  for node in scene.shape_nodes() {
    uniforms
      .transforms
      .insert(node.name.clone(), (node.translation, node.rotation));
  }
  let pushed = scene.resolve(&uniforms);
  for p in [
    Vec3::new(3.0, 0.0, 0.0),
    Vec3::new(-3.0, 2.0, 0.0),
    Vec3::new(0.5, -1.5, 2.5),
  ] {
    assert!((pushed.distance(p) - scene.distance(p)).abs() < 1e-6);
  }
}

#[test]
fn test_empty_scene_is_outside_everywhere() {
  let scene = FieldScene::new(FieldNode::group("empty")).unwrap();
  assert!(scene.distance(Vec3::ZERO) > 0.0);
}

#[test]
fn test_property_block_set_overwrites() {
  let mut block = PropertyBlock::default();
  block.set("a", 1.0);
  block.set("b", 2.0);
  block.set("a", 3.0);
  assert_eq!(block.len(), 2);
  assert_eq!(block.get("a"), Some(3.0));

  let mut overrides = PropertyBlock::default();
  overrides.set("b", 5.0);
  overrides.set("c", 6.0);
  block.merge(&overrides);
  let names: Vec<&str> = block.iter().map(|(n, _)| n).collect();
  assert_eq!(names, vec!["a", "b", "c"]);
  assert_eq!(block.get("b"), Some(5.0));
}
