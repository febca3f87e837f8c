//! Mesh sinks: where finished meshes go.
//!
//! The assembler hands the buffers to a [`MeshSink`] from the completion
//! callback, so on the owner thread.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::constants::MAX_MESH_VERTICES;
use crate::error::SinkError;
use crate::types::MeshBuffers;

/// Receiver of finished meshes.
pub trait MeshSink: Send {
  /// Largest vertex count the sink's mesh format can index.
  fn max_vertices(&self) -> usize {
    MAX_MESH_VERTICES
  }

  fn accept(&mut self, mesh: MeshBuffers) -> Result<(), SinkError>;
}

fn check_limit(sink: &dyn MeshSink, mesh: &MeshBuffers) -> Result<(), SinkError> {
  let limit = sink.max_vertices();
  if mesh.vertex_count() > limit {
    return Err(SinkError::TooManyVertices {
      vertices: mesh.vertex_count(),
      limit,
    });
  }
  Ok(())
}

// =============================================================================
// Memory sink
// =============================================================================

/// Keeps every accepted mesh. Clones share the same storage, so one clone can
/// be given to the pipeline while another is inspected.
#[derive(Clone, Default)]
pub struct MemorySink {
  meshes: Arc<Mutex<Vec<MeshBuffers>>>,
  limit: Option<usize>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  /// Reject meshes above `limit` vertices instead of the default cap.
  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  /// Most recent mesh.
  pub fn last(&self) -> Option<MeshBuffers> {
    self.lock().last().cloned()
  }

  pub fn take(&self) -> Vec<MeshBuffers> {
    std::mem::take(&mut *self.lock())
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MeshBuffers>> {
    self.meshes.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl MeshSink for MemorySink {
  fn max_vertices(&self) -> usize {
    self.limit.unwrap_or(MAX_MESH_VERTICES)
  }

  fn accept(&mut self, mesh: MeshBuffers) -> Result<(), SinkError> {
    check_limit(self, &mesh)?;
    self.lock().push(mesh);
    Ok(())
  }
}

// =============================================================================
// OBJ sink
// =============================================================================

/// Writes each accepted mesh as Wavefront OBJ.
pub struct ObjSink<W: Write + Send> {
  writer: W,
  object: String,
}

impl ObjSink<BufWriter<File>> {
  pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
    Ok(Self::new(BufWriter::new(File::create(path)?)))
  }
}

impl<W: Write + Send> ObjSink<W> {
  pub fn new(writer: W) -> Self {
    Self {
      writer,
      object: "Object".to_string(),
    }
  }

  /// Name written on the `o` line.
  pub fn with_object_name(mut self, name: impl Into<String>) -> Self {
    self.object = name.into();
    self
  }

  pub fn into_inner(self) -> W {
    self.writer
  }
}

impl<W: Write + Send> MeshSink for ObjSink<W> {
  fn accept(&mut self, mesh: MeshBuffers) -> Result<(), SinkError> {
    check_limit(self, &mesh)?;
    write_obj(&mut self.writer, &self.object, &mesh)?;
    self.writer.flush()?;
    Ok(())
  }
}

/// OBJ text for `mesh`: positions, normals, then 1-based `f a//a b//b c//c`.
pub fn write_obj<W: Write>(writer: &mut W, object: &str, mesh: &MeshBuffers) -> io::Result<()> {
  writeln!(writer, "o {object}")?;
  for v in &mesh.vertices {
    writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
  }
  for n in &mesh.normals {
    writeln!(writer, "vn {} {} {}", n.x, n.y, n.z)?;
  }
  for [a, b, c] in &mesh.triangles {
    let (a, b, c) = (a + 1, b + 1, c + 1);
    writeln!(writer, "f {a}//{a} {b}//{b} {c}//{c}")?;
  }
  Ok(())
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod sink_test;
