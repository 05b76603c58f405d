//! Object resource identifier
//!
//! Names an object model as a package root, a directory inside it, and the
//! mesh files that make up the object's parts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::TrackerError;

/// Opaque handle resolving to one or more mesh files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectResourceIdentifier {
    /// Root directory of the object package
    pub package_path: PathBuf,
    /// Directory of the object inside the package
    pub directory: String,
    /// Mesh file names, one per rigid part
    pub meshes: Vec<String>,
}

impl ObjectResourceIdentifier {
    /// Create a new identifier
    pub fn new(
        package_path: impl Into<PathBuf>,
        directory: impl Into<String>,
        meshes: Vec<String>,
    ) -> Self {
        Self {
            package_path: package_path.into(),
            directory: directory.into(),
            meshes,
        }
    }

    /// Number of mesh parts
    #[inline]
    pub fn count_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Filesystem path of every mesh, in declaration order
    pub fn mesh_paths(&self) -> Vec<PathBuf> {
        self.meshes
            .iter()
            .map(|m| self.package_path.join(&self.directory).join(m))
            .collect()
    }

    /// Package-relative key of a mesh (`directory/mesh`)
    pub fn mesh_key(&self, index: usize) -> Option<String> {
        self.meshes
            .get(index)
            .map(|m| format!("{}/{}", self.directory, m))
    }

    pub(crate) fn validate(&self) -> Result<(), TrackerError> {
        if self.meshes.is_empty() {
            return Err(TrackerError::invalid_parameter(
                "ori.meshes",
                "at least one mesh is required",
            ));
        }
        if self.meshes.iter().any(|m| m.trim().is_empty()) {
            return Err(TrackerError::invalid_parameter(
                "ori.meshes",
                "mesh names must not be empty",
            ));
        }
        Ok(())
    }
}
