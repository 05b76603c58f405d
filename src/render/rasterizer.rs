//! CPU z-buffer rasterizer
//!
//! Pixel `(row, col)` samples the image plane at `u = col`, `v = row`.
//! Depth is the camera-frame z of the closest surface, interpolated
//! perspective-correctly (linear in `1/z`). Pixels with no surface are
//! `f64::INFINITY`.

use std::sync::Arc;

use nalgebra::{Isometry3, Point3};

use crate::camera::CameraData;
use crate::depth::DepthImage;
use crate::object::ObjectModel;

/// Triangles closer to the camera than this are not drawn
pub const NEAR_PLANE: f64 = 1e-3;

/// Barycentric slack so pixels on shared edges are never dropped
const EDGE_EPS: f64 = 1e-9;

/// Renders depth images of a rigid object seen by one camera
#[derive(Debug, Clone)]
pub struct RigidBodyRenderer {
    object: Arc<ObjectModel>,
    camera: Arc<CameraData>,
}

impl RigidBodyRenderer {
    /// Create a renderer sharing the object and camera
    pub fn new(object: Arc<ObjectModel>, camera: Arc<CameraData>) -> Self {
        Self { object, camera }
    }

    /// Camera this renderer draws for
    pub fn camera(&self) -> &CameraData {
        &self.camera
    }

    /// Object being drawn
    pub fn object(&self) -> &ObjectModel {
        &self.object
    }

    /// Depth image of the object at `world_from_object`
    pub fn render(&self, world_from_object: &Isometry3<f64>) -> DepthImage {
        let (width, height) = self.camera.resolution();
        let mut depth = DepthImage::filled(width, height, f64::INFINITY);
        let camera_from_object = self.camera.camera_from_world() * world_from_object;
        let k = self.camera.intrinsics();

        for tri in self.object.triangles() {
            let c = tri.map(|p| camera_from_object * p);
            if c.iter().any(|p| p.z <= NEAR_PLANE) {
                continue;
            }
            let s = c.map(|p| {
                // z > NEAR_PLANE, so the projection exists
                let (u, v) = k.project(&p).unwrap_or((f64::NAN, f64::NAN));
                Point3::new(u, v, 1.0 / p.z)
            });
            rasterize_triangle(&s, &mut depth);
        }
        depth
    }
}

/// Edge function: twice the signed area of `(a, b, p)`
#[inline]
fn edge(a: &Point3<f64>, b: &Point3<f64>, u: f64, v: f64) -> f64 {
    (b.x - a.x) * (v - a.y) - (b.y - a.y) * (u - a.x)
}

/// Draw one screen-space triangle (`x = u`, `y = v`, `z = 1/depth`)
fn rasterize_triangle(s: &[Point3<f64>; 3], depth: &mut DepthImage) {
    let area = edge(&s[0], &s[1], s[2].x, s[2].y);
    if area.abs() < 1e-12 || !area.is_finite() {
        return;
    }

    let (width, height) = (depth.width() as f64, depth.height() as f64);
    let min_u = s.iter().map(|p| p.x).fold(f64::INFINITY, f64::min).ceil().max(0.0);
    let max_u = s.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max).floor().min(width - 1.0);
    let min_v = s.iter().map(|p| p.y).fold(f64::INFINITY, f64::min).ceil().max(0.0);
    let max_v = s.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max).floor().min(height - 1.0);
    if min_u > max_u || min_v > max_v {
        return;
    }

    for row in min_v as usize..=max_v as usize {
        let v = row as f64;
        for col in min_u as usize..=max_u as usize {
            let u = col as f64;
            let w0 = edge(&s[1], &s[2], u, v) / area;
            let w1 = edge(&s[2], &s[0], u, v) / area;
            let w2 = edge(&s[0], &s[1], u, v) / area;
            if w0 < -EDGE_EPS || w1 < -EDGE_EPS || w2 < -EDGE_EPS {
                continue;
            }
            let inv_z = w0 * s[0].z + w1 * s[1].z + w2 * s[2].z;
            if inv_z <= 0.0 {
                continue;
            }
            let z = 1.0 / inv_z;
            if z < depth.get(row, col) {
                depth.set(row, col, z);
            }
        }
    }
}
