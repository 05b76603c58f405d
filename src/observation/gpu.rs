//! wgpu compute backend
//!
//! The object mesh is uploaded once. Each call uploads the pose set and one
//! observed image, dispatches `(ceil(pixels / 64), poses, 1)` workgroups of
//! the ray-casting kernel and reads back per-pixel depth and log density.
//! Per-pose sums are reduced on the CPU in f64, so pixel order never
//! affects the result.
//!
//! Calls block the calling thread until the queue has drained.

use std::fmt;
use std::sync::{mpsc, Arc};

use bytemuck::{Pod, Zeroable};
use nalgebra::Isometry3;
use wgpu::util::DeviceExt;

use super::mixture::PixelMixture;
use super::{check_observations, ObservationModel, PoseScore, SensorScores};
use crate::camera::CameraData;
use crate::config::Backend;
use crate::depth::{is_valid_reading, DepthImage};
use crate::errors::TrackerError;
use crate::object::ObjectModel;
use crate::render::NEAR_PLANE;

/// Kernel source
pub const RENDER_LIKELIHOOD_SHADER: &str = include_str!("shaders/render_likelihood.wgsl");

const WORKGROUP_SIZE: u32 = 64;

/// Log weights of empty mixture components; finite so the kernel never sees `-inf`
const LN_ZERO: f32 = -1.0e30;

/// Depth the kernel writes for pixels with no hit
const NO_HIT: f32 = 3.0e38;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct KernelParams {
    width: u32,
    height: u32,
    pose_count: u32,
    triangle_count: u32,
    fx: f32,
    fy: f32,
    cx: f32,
    cy: f32,
    fg_std: f32,
    bg_std: f32,
    bg_depth: f32,
    occlusion_margin: f32,
    ln_body_weight: f32,
    ln_tail_weight: f32,
    ln_tail_density: f32,
    near_plane: f32,
}

/// Per-pose output of one dispatch
struct KernelOutput {
    depth: Vec<f32>,
    loglik: Vec<f32>,
}

/// Observation model evaluated by a wgpu compute kernel
pub struct GpuObservationModel {
    mixture: PixelMixture,
    cameras: Vec<Arc<CameraData>>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    triangles: wgpu::Buffer,
    triangle_count: u32,
    adapter_name: String,
}

impl fmt::Debug for GpuObservationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuObservationModel")
            .field("adapter", &self.adapter_name)
            .field("sensors", &self.cameras.len())
            .field("triangles", &self.triangle_count)
            .finish()
    }
}

fn unsupported(reason: impl Into<String>) -> TrackerError {
    TrackerError::UnsupportedBackend {
        backend: Backend::Gpu.name().to_string(),
        reason: reason.into(),
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuObservationModel {
    /// Acquire an adapter, compile the kernel and upload the mesh
    ///
    /// Fails with `UnsupportedBackend` if no adapter or device is available.
    pub fn new(
        mixture: PixelMixture,
        object: Arc<ObjectModel>,
        cameras: &[Arc<CameraData>],
    ) -> Result<Self, TrackerError> {
        pollster::block_on(Self::create(mixture, object, cameras.to_vec()))
    }

    async fn create(
        mixture: PixelMixture,
        object: Arc<ObjectModel>,
        cameras: Vec<Arc<CameraData>>,
    ) -> Result<Self, TrackerError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| unsupported("no compatible GPU adapter found"))?;
        let adapter_name = adapter.get_info().name;
        log::info!("Selected GPU adapter: {}", adapter_name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("tracker-gpu"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| unsupported(format!("device request failed: {}", e)))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("render_likelihood"),
            source: wgpu::ShaderSource::Wgsl(RENDER_LIKELIHOOD_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("render_likelihood_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, false),
                storage_entry(5, false),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("render_likelihood_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("render_likelihood_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let vertices: Vec<[f32; 4]> = object
            .triangles()
            .flat_map(|tri| tri.map(|p| [p.x as f32, p.y as f32, p.z as f32, 1.0]))
            .collect();
        let triangle_count = (vertices.len() / 3) as u32;
        let triangles = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("triangles"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::STORAGE,
        });

        Ok(Self {
            mixture,
            cameras,
            device,
            queue,
            pipeline,
            bind_group_layout,
            triangles,
            triangle_count,
            adapter_name,
        })
    }

    /// Name of the adapter in use
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn kernel_params(&self, camera: &CameraData, pose_count: usize) -> KernelParams {
        let (width, height) = camera.resolution();
        let k = camera.intrinsics();
        let m = &self.mixture;
        KernelParams {
            width: width as u32,
            height: height as u32,
            pose_count: pose_count as u32,
            triangle_count: self.triangle_count,
            fx: k.fx as f32,
            fy: k.fy as f32,
            cx: k.cx as f32,
            cy: k.cy as f32,
            fg_std: m.fg_std() as f32,
            bg_std: m.bg_std() as f32,
            bg_depth: m.bg_depth() as f32,
            occlusion_margin: m.occlusion_margin() as f32,
            ln_body_weight: (m.ln_body_weight() as f32).max(LN_ZERO),
            ln_tail_weight: (m.ln_tail_weight() as f32).max(LN_ZERO),
            ln_tail_density: m.ln_tail_density() as f32,
            near_plane: NEAR_PLANE as f32,
        }
    }

    /// Run the kernel for one sensor and every pose
    fn dispatch(
        &self,
        sensor: usize,
        poses: &[Isometry3<f64>],
        observed: Option<&DepthImage>,
    ) -> Result<KernelOutput, TrackerError> {
        let camera = self.cameras.get(sensor).ok_or_else(|| {
            TrackerError::dimension_mismatch(self.cameras.len(), sensor + 1, "sensor index")
        })?;
        let pixel_count = camera.pixel_count();
        let out_len = pixel_count * poses.len();
        if out_len == 0 {
            return Ok(KernelOutput {
                depth: Vec::new(),
                loglik: Vec::new(),
            });
        }

        let params = self.kernel_params(camera, poses.len());
        let transforms: Vec<[f32; 16]> = poses
            .iter()
            .map(|pose| {
                let object_from_camera = (camera.camera_from_world() * pose).inverse();
                let m = object_from_camera.to_homogeneous().cast::<f32>();
                let mut cols = [0.0f32; 16];
                cols.copy_from_slice(m.as_slice());
                cols
            })
            .collect();
        let readings: Vec<f32> = match observed {
            Some(img) => img
                .row_major()
                .map(|z| {
                    if is_valid_reading(z) {
                        (z as f32).min(f32::MAX)
                    } else {
                        -1.0
                    }
                })
                .collect(),
            None => vec![-1.0; pixel_count],
        };

        let d = &self.device;
        let params_buf = d.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let poses_buf = d.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("object_from_camera"),
            contents: bytemuck::cast_slice(&transforms),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let observed_buf = d.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("observed"),
            contents: bytemuck::cast_slice(&readings),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let out_size = (out_len * std::mem::size_of::<f32>()) as u64;
        let output = |label| {
            d.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: out_size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let staging = |label| {
            d.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: out_size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let depth_buf = output("depth_out");
        let loglik_buf = output("loglik_out");
        let depth_staging = staging("depth_staging");
        let loglik_staging = staging("loglik_staging");

        let bind_group = d.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("render_likelihood_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.triangles.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: poses_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: observed_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: depth_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: loglik_buf.as_entire_binding(),
                },
            ],
        });

        let mut encoder = d.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_likelihood_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("render_likelihood_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let groups_x = (pixel_count as u32).div_ceil(WORKGROUP_SIZE);
            pass.dispatch_workgroups(groups_x, poses.len() as u32, 1);
        }
        encoder.copy_buffer_to_buffer(&depth_buf, 0, &depth_staging, 0, out_size);
        encoder.copy_buffer_to_buffer(&loglik_buf, 0, &loglik_staging, 0, out_size);
        self.queue.submit(std::iter::once(encoder.finish()));

        Ok(KernelOutput {
            depth: self.read_buffer_f32(&depth_staging)?,
            loglik: self.read_buffer_f32(&loglik_staging)?,
        })
    }

    fn read_buffer_f32(&self, buffer: &wgpu::Buffer) -> Result<Vec<f32>, TrackerError> {
        let slice = buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| TrackerError::Render {
                reason: "readback channel closed".to_string(),
            })?
            .map_err(|e| TrackerError::Render {
                reason: e.to_string(),
            })?;

        let data = slice.get_mapped_range();
        let values = bytemuck::cast_slice::<u8, f32>(&data).to_vec();
        drop(data);
        buffer.unmap();
        Ok(values)
    }
}

impl ObservationModel for GpuObservationModel {
    fn backend(&self) -> Backend {
        Backend::Gpu
    }

    fn sensor_count(&self) -> usize {
        self.cameras.len()
    }

    fn camera(&self, sensor: usize) -> Option<&CameraData> {
        self.cameras.get(sensor).map(|c| c.as_ref())
    }

    fn render(&self, sensor: usize, pose: &Isometry3<f64>) -> Result<DepthImage, TrackerError> {
        let camera = self.camera(sensor).ok_or_else(|| {
            TrackerError::dimension_mismatch(self.cameras.len(), sensor + 1, "sensor index")
        })?;
        let (width, height) = camera.resolution();
        let out = self.dispatch(sensor, std::slice::from_ref(pose), None)?;
        let depth: Vec<f64> = out
            .depth
            .iter()
            .map(|&z| if z >= NO_HIT { f64::INFINITY } else { z as f64 })
            .collect();
        DepthImage::from_row_major(width, height, &depth)
    }

    fn log_likelihoods(
        &self,
        poses: &[Isometry3<f64>],
        observations: &[DepthImage],
    ) -> Result<Vec<PoseScore>, TrackerError> {
        check_observations(self, observations)?;
        let mut per_pose = vec![SensorScores::new(); poses.len()];
        for (sensor, observed) in observations.iter().enumerate() {
            let pixel_count = observed.width() * observed.height();
            let out = self.dispatch(sensor, poses, Some(observed))?;
            for (scores, chunk) in per_pose.iter_mut().zip(out.loglik.chunks(pixel_count.max(1))) {
                scores.push(chunk.iter().map(|&v| v as f64).sum());
            }
        }
        Ok(per_pose.into_iter().map(PoseScore::from_sensors).collect())
    }
}
