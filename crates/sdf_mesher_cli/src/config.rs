//! Scene file parsing for the mesher CLI.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use glam::{EulerRot, Quat, Vec3};
use sdf_mesher::scene::property_name;
use sdf_mesher::{AcceleratorConfig, FieldNode, FieldScene, MesherConfig, Primitive, PropertyBlock};
use serde::Deserialize;

/// Root of a scene file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	/// Lattice and refinement settings.
	#[serde(default)]
	pub mesher: MesherSection,
	/// Batch sizing of the software accelerator.
	#[serde(default)]
	pub accelerator: AcceleratorSection,
	/// Root node of the scene tree.
	pub scene: NodeConfig,
	/// Property overrides, e.g. `ball_radius = 2.5`.
	#[serde(default)]
	pub overrides: BTreeMap<String, f32>,
}

/// Optional mesher settings; unset fields keep the library defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MesherSection {
	pub grid_radius: Option<f32>,
	pub grid_size: Option<usize>,
	pub max_vertices: Option<usize>,
	pub refine_iterations: Option<u32>,
	pub raymarch_iterations: Option<u32>,
	pub epsilon: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceleratorSection {
	pub threads_per_group: Option<usize>,
	pub max_concurrent_groups: Option<usize>,
}

/// One scene node.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
	/// Unique name, keys the node's properties.
	pub name: String,
	#[serde(default)]
	pub shape: Option<ShapeConfig>,
	#[serde(default)]
	pub translation: [f32; 3],
	/// XYZ Euler angles in degrees.
	#[serde(default)]
	pub rotation_degrees: [f32; 3],
	#[serde(default)]
	pub children: Vec<NodeConfig>,
}

/// Primitive of a node, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeConfig {
	Sphere {
		radius: f32,
	},
	Torus {
		major: f32,
		minor: f32,
	},
	Cuboid {
		half_extents: [f32; 3],
	},
	Mandelbulb {
		#[serde(default = "default_power")]
		power: f32,
		#[serde(default = "default_bailout")]
		bailout: f32,
		#[serde(default = "default_iterations")]
		iterations: u32,
	},
}

fn default_power() -> f32 {
	8.0
}

fn default_bailout() -> f32 {
	2.0
}

fn default_iterations() -> u32 {
	12
}

impl Config {
	/// Load and validate a scene file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read scene file: {}", path.display()))?;
		let config: Config = toml::from_str(&content).with_context(|| "Failed to parse scene TOML")?;
		config.validate()?;
		Ok(config)
	}

	/// Check that the scene builds and every override names a property.
	pub fn validate(&self) -> Result<()> {
		let scene = self.scene()?;
		let properties = scene.properties();
		for name in self.overrides.keys() {
			if properties.get(name).is_none() {
				anyhow::bail!("Override `{name}` does not name a scene property");
			}
		}
		self.mesher_config().validate().context("Invalid [mesher] section")?;
		self.accelerator_config().validate().context("Invalid [accelerator] section")?;
		Ok(())
	}

	pub fn mesher_config(&self) -> MesherConfig {
		let m = &self.mesher;
		let defaults = MesherConfig::default();
		MesherConfig::new()
			.with_grid_radius(m.grid_radius.unwrap_or(defaults.grid_radius))
			.with_grid_size(m.grid_size.unwrap_or(defaults.grid_size))
			.with_max_vertices(m.max_vertices.unwrap_or(defaults.max_vertices))
			.with_refine_iterations(m.refine_iterations.unwrap_or(defaults.refine_iterations))
			.with_raymarch_iterations(m.raymarch_iterations.unwrap_or(defaults.raymarch_iterations))
			.with_epsilon(m.epsilon.unwrap_or(defaults.epsilon))
	}

	pub fn accelerator_config(&self) -> AcceleratorConfig {
		let a = &self.accelerator;
		let defaults = AcceleratorConfig::default();
		defaults
			.with_threads_per_group(a.threads_per_group.unwrap_or(defaults.threads_per_group))
			.with_max_concurrent_groups(a.max_concurrent_groups.unwrap_or(defaults.max_concurrent_groups))
	}

	/// Scene tree as written, overrides not applied.
	pub fn scene(&self) -> Result<FieldScene> {
		FieldScene::new(self.scene.to_node()).context("Invalid scene tree")
	}

	/// Scene tree with the overrides baked into its primitives.
	pub fn scene_with_overrides(&self) -> Result<FieldScene> {
		let mut root = self.scene.to_node();
		apply_overrides(&mut root, &self.overrides);
		FieldScene::new(root).context("Invalid scene tree")
	}

	/// Overrides as a property block for the accelerator.
	pub fn property_overrides(&self) -> PropertyBlock {
		let mut block = PropertyBlock::default();
		for (name, value) in &self.overrides {
			block.set(name.as_str(), *value);
		}
		block
	}
}

impl NodeConfig {
	fn to_node(&self) -> FieldNode {
		let [rx, ry, rz] = self.rotation_degrees.map(f32::to_radians);
		let node = match &self.shape {
			Some(shape) => FieldNode::primitive(self.name.as_str(), shape.to_primitive()),
			None => FieldNode::group(self.name.as_str()),
		}
		.with_translation(Vec3::from_array(self.translation))
		.with_rotation(Quat::from_euler(EulerRot::XYZ, rx, ry, rz));

		self
			.children
			.iter()
			.fold(node, |node, child| node.with_child(child.to_node()))
	}
}

impl ShapeConfig {
	fn to_primitive(&self) -> Primitive {
		match *self {
			ShapeConfig::Sphere { radius } => Primitive::Sphere { radius },
			ShapeConfig::Torus { major, minor } => Primitive::Torus { major, minor },
			ShapeConfig::Cuboid { half_extents } => Primitive::Cuboid {
				half_extents: Vec3::from_array(half_extents),
			},
			ShapeConfig::Mandelbulb {
				power,
				bailout,
				iterations,
			} => Primitive::Mandelbulb {
				power,
				bailout,
				iterations,
			},
		}
	}
}

fn apply_overrides(node: &mut FieldNode, overrides: &BTreeMap<String, f32>) {
	if let Some(primitive) = &node.primitive {
		let current: BTreeMap<&str, f32> = primitive.params().into_iter().collect();
		let updated = primitive.with_params(|param| {
			overrides
				.get(&property_name(&node.name, param))
				.or_else(|| current.get(param))
				.copied()
				.unwrap_or_default()
		});
		node.primitive = Some(updated);
	}
	for child in &mut node.children {
		apply_overrides(child, overrides);
	}
}
