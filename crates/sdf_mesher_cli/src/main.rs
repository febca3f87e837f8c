//! Distance field mesher.
//!
//! Meshes a TOML scene of named primitives into a Wavefront OBJ file.
//!
//! Stages run on background workers; this thread pumps the pipeline, serves
//! accelerator dispatches and logs progress:
//! - distances: sample the scene over the lattice
//! - edges: find and refine sign-changing lattice edges
//! - vertices: one dual vertex per touched cell
//! - mesh: quads per edge, normals from the field

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use sdf_mesher::{
	AcceleratorHost, MeshSink, MeshingPipeline, ObjSink, PipelineError, ProgressReport, RunStatus,
	SoftwareDevice,
};
use web_time::Instant;

use config::Config;

/// Evaluator backend.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
	/// Evaluate the scene directly on worker threads.
	Cpu,
	/// Batch through the software compute device on this thread.
	Software,
}

/// Dual-contouring mesher for distance field scenes.
#[derive(Parser, Debug)]
#[command(name = "sdf_mesh")]
#[command(about = "Meshes a distance field scene into a Wavefront OBJ file")]
struct Args {
	/// Path to the scene TOML file.
	#[arg(short, long)]
	config: PathBuf,

	/// Output OBJ path.
	#[arg(short, long, default_value = "mesh.obj")]
	output: PathBuf,

	#[arg(short, long, value_enum, default_value_t = Backend::Cpu)]
	backend: Backend,

	/// Lattice points per axis, overrides the scene file.
	#[arg(long)]
	grid_size: Option<usize>,

	/// Half-extent of the sampled cube, overrides the scene file.
	#[arg(long)]
	grid_radius: Option<f32>,

	/// Object name written to the OBJ file (default: scene root name).
	#[arg(long)]
	object: Option<String>,
}

fn main() -> Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let args = Args::parse();

	info!("Loading scene from: {}", args.config.display());
	let config = Config::load(&args.config)?;

	let mut mesher = config.mesher_config();
	if let Some(size) = args.grid_size {
		mesher = mesher.with_grid_size(size);
	}
	if let Some(radius) = args.grid_radius {
		mesher = mesher.with_grid_radius(radius);
	}
	mesher.validate().context("Invalid grid arguments")?;
	info!(
		"Meshing {}³ lattice over [-{r}, {r}]³ with the {:?} backend",
		mesher.grid_size,
		args.backend,
		r = mesher.grid_radius
	);

	let mut pipeline = match args.backend {
		Backend::Cpu => MeshingPipeline::cpu(mesher, config.scene_with_overrides()?),
		Backend::Software => {
			let scene = config.scene()?;
			let accel = config.accelerator_config();
			let device =
				SoftwareDevice::new(scene.clone()).with_threads_per_group(accel.threads_per_group);
			let host = AcceleratorHost::new(Box::new(device), Arc::new(scene))
				.with_config(accel)
				.with_overrides(config.property_overrides());
			MeshingPipeline::accelerated(mesher, host)
		}
	};

	let report = Arc::new(ProgressReport::new());
	let started = Instant::now();
	pipeline.clear().context("Failed to configure pipeline")?;

	run_stage(&mut pipeline, &report, |p, r| p.calculate_distances(r))?;
	run_stage(&mut pipeline, &report, |p, r| p.find_edge_intersections(r))?;
	let edges = pipeline.edge_count()?;
	info!("Found {edges} crossing edges");
	run_stage(&mut pipeline, &report, |p, r| p.construct_vertices(r))?;
	let vertices = pipeline.vertex_count()?;
	info!("Constructed {vertices} dual vertices");
	if vertices == 0 {
		warn!("Scene has no surface inside the sampled cube");
	}

	let object = args
		.object
		.unwrap_or_else(|| config.scene.name.clone());
	let obj: Box<dyn MeshSink> = Box::new(
		ObjSink::create(&args.output)
			.with_context(|| format!("Failed to create: {}", args.output.display()))?
			.with_object_name(object),
	);
	run_stage(&mut pipeline, &report, move |p, r| p.create_mesh(r, Some(obj)))?;

	let triangles = 2 * edges;
	info!(
		"Wrote {vertices} vertices, {triangles} triangles to {} in {:.2?}",
		args.output.display(),
		started.elapsed()
	);
	Ok(())
}

/// Start one stage and pump the pipeline until it is over.
fn run_stage<F>(pipeline: &mut MeshingPipeline, report: &Arc<ProgressReport>, start: F) -> Result<()>
where
	F: FnOnce(&mut MeshingPipeline, &Arc<ProgressReport>) -> Result<(), PipelineError>,
{
	start(pipeline, report)?;
	let message = report.current_state().message;
	let started = Instant::now();
	let mut logged = 0.0;

	loop {
		match pipeline.pump(report) {
			RunStatus::Running => {
				let progress = report.current_state().progress;
				if progress - logged >= 0.25 {
					debug!("{message}: {:.0}%", progress * 100.0);
					logged = progress;
				}
				thread::sleep(Duration::from_millis(1));
			}
			RunStatus::Finished => break,
			RunStatus::Cancelled => anyhow::bail!("{message} was cancelled"),
			RunStatus::NotStarted => anyhow::bail!("{message} never started"),
		}
	}

	if let Some(failure) = report.current_state().failure {
		anyhow::bail!("{message} failed: {failure}");
	}
	info!("{message} done in {:.2?}", started.elapsed());
	Ok(())
}
