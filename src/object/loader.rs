//! Object model loaders
//!
//! The builder resolves an [`ObjectResourceIdentifier`] through an
//! [`ObjectModelLoader`]. [`ObjMeshLoader`] reads Wavefront OBJ files from
//! disk; [`InMemoryModelLoader`] serves meshes registered in code.

use std::collections::HashMap;
use std::path::Path;

use nalgebra::Point3;

use super::model::{MeshPart, ObjectModel};
use super::resource::ObjectResourceIdentifier;
use crate::errors::TrackerError;

/// Resolves a resource identifier into an in-memory object model
pub trait ObjectModelLoader: Send + Sync {
    /// Load every mesh named by `ori`, one part per mesh
    fn load(&self, ori: &ObjectResourceIdentifier) -> Result<ObjectModel, TrackerError>;

    /// Loader name for logs
    fn name(&self) -> &'static str;
}

// ============================================================================
// Wavefront OBJ
// ============================================================================

/// Loads `v`/`f` records from Wavefront OBJ files
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjMeshLoader;

impl ObjMeshLoader {
    /// Create a new OBJ loader
    pub fn new() -> Self {
        Self
    }

    fn load_part(path: &Path) -> Result<MeshPart, TrackerError> {
        if !path.is_file() {
            return Err(TrackerError::ResourceNotFound {
                resource: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| TrackerError::MalformedResource {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        parse_obj(&text, &name).map_err(|reason| TrackerError::MalformedResource {
            path: path.display().to_string(),
            reason,
        })
    }
}

impl ObjectModelLoader for ObjMeshLoader {
    fn load(&self, ori: &ObjectResourceIdentifier) -> Result<ObjectModel, TrackerError> {
        let parts = ori
            .mesh_paths()
            .iter()
            .map(|p| Self::load_part(p))
            .collect::<Result<Vec<_>, _>>()?;
        let model = ObjectModel::new(parts)?;
        log::debug!(
            "Loaded {} mesh part(s) from {}: {} vertices, {} triangles",
            ori.count_meshes(),
            ori.package_path.join(&ori.directory).display(),
            model.vertex_count(),
            model.triangle_count()
        );
        Ok(model)
    }

    fn name(&self) -> &'static str {
        "obj"
    }
}

/// Parse the geometry of a Wavefront OBJ document
///
/// Faces with more than three vertices are fan-triangulated. Vertex
/// references may be written as `i`, `i/t`, `i//n` or `i/t/n`; negative
/// indices count back from the most recent vertex. All other records are
/// ignored.
pub fn parse_obj(text: &str, name: &str) -> Result<MeshPart, String> {
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let coords = tokens
                    .take(3)
                    .map(|t| t.parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| format!("line {}: bad vertex: {}", lineno + 1, e))?;
                if coords.len() != 3 {
                    return Err(format!(
                        "line {}: vertex needs 3 coordinates",
                        lineno + 1
                    ));
                }
                vertices.push(Point3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let indices = tokens
                    .map(|t| resolve_index(t, vertices.len()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| format!("line {}: {}", lineno + 1, e))?;
                if indices.len() < 3 {
                    return Err(format!("line {}: face needs 3 vertices", lineno + 1));
                }
                for k in 1..indices.len() - 1 {
                    triangles.push([indices[0], indices[k], indices[k + 1]]);
                }
            }
            _ => {}
        }
    }

    MeshPart::new(name, vertices, triangles).map_err(|e| e.to_string())
}

fn resolve_index(token: &str, vertex_count: usize) -> Result<usize, String> {
    let head = token.split('/').next().unwrap_or("");
    let index: i64 = head
        .parse()
        .map_err(|_| format!("bad face index `{}`", token))?;
    let resolved = match index {
        0 => return Err("face index 0 is not allowed".to_string()),
        i if i > 0 => i - 1,
        i => vertex_count as i64 + i,
    };
    if resolved < 0 || resolved as usize >= vertex_count {
        return Err(format!(
            "face index {} out of range ({} vertices defined)",
            index, vertex_count
        ));
    }
    Ok(resolved as usize)
}

// ============================================================================
// In-memory registry
// ============================================================================

/// Serves mesh parts registered under `directory/mesh` keys
#[derive(Debug, Clone, Default)]
pub struct InMemoryModelLoader {
    parts: HashMap<String, MeshPart>,
}

impl InMemoryModelLoader {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a part under `directory/mesh`
    pub fn insert(&mut self, directory: &str, mesh: &str, part: MeshPart) {
        self.parts.insert(format!("{}/{}", directory, mesh), part);
    }

    /// Register every part of a model under `directory`, named by part name
    pub fn with_model(mut self, directory: &str, model: &ObjectModel) -> Self {
        for part in model.parts() {
            self.insert(directory, &part.name, part.clone());
        }
        self
    }

    /// Number of registered parts
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl ObjectModelLoader for InMemoryModelLoader {
    fn load(&self, ori: &ObjectResourceIdentifier) -> Result<ObjectModel, TrackerError> {
        let parts = (0..ori.count_meshes())
            .filter_map(|i| ori.mesh_key(i))
            .map(|key| {
                self.parts
                    .get(&key)
                    .cloned()
                    .ok_or(TrackerError::ResourceNotFound { resource: key })
            })
            .collect::<Result<Vec<_>, _>>()?;
        ObjectModel::new(parts)
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
