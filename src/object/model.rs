//! In-memory object model
//!
//! An [`ObjectModel`] is an immutable set of triangle meshes expressed in the
//! object frame. It is shared read-only (behind an `Arc`) by the renderer and
//! every observation evaluation.

use nalgebra::{Point3, Vector3};

use crate::errors::TrackerError;

/// One rigid part of an object: vertices and triangle indices
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPart {
    /// Part name (usually the mesh file name)
    pub name: String,
    /// Vertex positions in the object frame
    pub vertices: Vec<Point3<f64>>,
    /// Counter-clockwise vertex index triples
    pub triangles: Vec<[usize; 3]>,
}

impl MeshPart {
    /// Create a part, checking that every index refers to a vertex
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Point3<f64>>,
        triangles: Vec<[usize; 3]>,
    ) -> Result<Self, TrackerError> {
        let name = name.into();
        if let Some(bad) = triangles
            .iter()
            .flatten()
            .find(|&&i| i >= vertices.len())
        {
            return Err(TrackerError::MalformedResource {
                path: name,
                reason: format!(
                    "triangle index {} out of range ({} vertices)",
                    bad,
                    vertices.len()
                ),
            });
        }
        if vertices.iter().any(|v| !v.coords.iter().all(|c| c.is_finite())) {
            return Err(TrackerError::MalformedResource {
                path: name,
                reason: "non-finite vertex coordinate".to_string(),
            });
        }
        Ok(Self {
            name,
            vertices,
            triangles,
        })
    }
}

/// Rigid object made of one or more mesh parts
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectModel {
    parts: Vec<MeshPart>,
}

impl ObjectModel {
    /// Create a model from its parts; at least one triangle is required
    pub fn new(parts: Vec<MeshPart>) -> Result<Self, TrackerError> {
        if parts.iter().all(|p| p.triangles.is_empty()) {
            let name = parts
                .first()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "<empty>".to_string());
            return Err(TrackerError::MalformedResource {
                path: name,
                reason: "object model has no triangles".to_string(),
            });
        }
        Ok(Self { parts })
    }

    /// Mesh parts
    pub fn parts(&self) -> &[MeshPart] {
        &self.parts
    }

    /// Total number of vertices over all parts
    pub fn vertex_count(&self) -> usize {
        self.parts.iter().map(|p| p.vertices.len()).sum()
    }

    /// Total number of triangles over all parts
    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.triangles.len()).sum()
    }

    /// Iterate over all triangles as vertex triples in the object frame
    pub fn triangles(&self) -> impl Iterator<Item = [Point3<f64>; 3]> + '_ {
        self.parts.iter().flat_map(|part| {
            part.triangles.iter().map(move |t| {
                [
                    part.vertices[t[0]],
                    part.vertices[t[1]],
                    part.vertices[t[2]],
                ]
            })
        })
    }

    /// Mean of all vertices
    pub fn centroid(&self) -> Point3<f64> {
        let count = self.vertex_count();
        if count == 0 {
            return Point3::origin();
        }
        let sum = self
            .parts
            .iter()
            .flat_map(|p| p.vertices.iter())
            .fold(Vector3::zeros(), |acc, v| acc + v.coords);
        Point3::from(sum / count as f64)
    }

    /// Shift every vertex so the centroid sits at the origin
    ///
    /// Returns the re-centered model and the offset that was subtracted.
    pub fn centered(mut self) -> (Self, Vector3<f64>) {
        let offset = self.centroid().coords;
        for part in &mut self.parts {
            for v in &mut part.vertices {
                *v -= offset;
            }
        }
        (self, offset)
    }

    /// Axis-aligned bounding box `(min, max)` in the object frame
    pub fn bounding_box(&self) -> (Point3<f64>, Point3<f64>) {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for v in self.parts.iter().flat_map(|p| p.vertices.iter()) {
            min = min.inf(v);
            max = max.sup(v);
        }
        (min, max)
    }

    /// Axis-aligned box centered at the origin, two triangles per face
    pub fn cuboid(half_extents: Vector3<f64>) -> Self {
        let (x, y, z) = (half_extents.x, half_extents.y, half_extents.z);
        let vertices = vec![
            Point3::new(-x, -y, -z),
            Point3::new(x, -y, -z),
            Point3::new(x, y, -z),
            Point3::new(-x, y, -z),
            Point3::new(-x, -y, z),
            Point3::new(x, -y, z),
            Point3::new(x, y, z),
            Point3::new(-x, y, z),
        ];
        #[rustfmt::skip]
        let triangles = vec![
            [0, 2, 1], [0, 3, 2], // -z
            [4, 5, 6], [4, 6, 7], // +z
            [0, 1, 5], [0, 5, 4], // -y
            [3, 7, 6], [3, 6, 2], // +y
            [0, 4, 7], [0, 7, 3], // -x
            [1, 2, 6], [1, 6, 5], // +x
        ];
        Self {
            parts: vec![MeshPart {
                name: "cuboid".to_string(),
                vertices,
                triangles,
            }],
        }
    }

    /// Square in the object's z = 0 plane, facing -z
    pub fn square(half_size: f64) -> Self {
        let h = half_size;
        let vertices = vec![
            Point3::new(-h, -h, 0.0),
            Point3::new(h, -h, 0.0),
            Point3::new(h, h, 0.0),
            Point3::new(-h, h, 0.0),
        ];
        Self {
            parts: vec![MeshPart {
                name: "square".to_string(),
                vertices,
                triangles: vec![[0, 2, 1], [0, 3, 2]],
            }],
        }
    }
}
