//! Per-frame visibility culling on the GPU.
//!
//! Each dispatch resets the batch's survivor counter with
//! `encoder.clear_buffer()`, runs one thread per source instance, then copies
//! the counter into the `instance_count` field of the batch's indirect args.

use crate::batch::GpuBatch;
use crate::error::RenderError;
use bytemuck::{Pod, Zeroable};
use jellyfield_render::{CameraState, DrawIndexedIndirectArgs};

/// Threads per workgroup; must match `@workgroup_size` in the cull kernel.
pub const WORKGROUP_SIZE: u32 = 256;

/// Uniforms matching `CullUniforms` in the cull kernel.
///
/// Layout (128 bytes):
/// - planes: array<vec4<f32>, 6> (96 bytes)
/// - camera_position: vec4<f32>  (16 bytes)
/// - count, bound_radius, max_distance_sq, _pad (16 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CullUniforms {
    pub planes: [[f32; 4]; 6],
    pub camera_position: [f32; 4],
    pub count: u32,
    pub bound_radius: f32,
    pub max_distance_sq: f32,
    pub _pad: u32,
}

const _: () = assert!(std::mem::size_of::<CullUniforms>() == 128);

impl CullUniforms {
    pub fn new(camera: &CameraState, count: u32, bound_radius: f32, max_distance_sq: f32) -> Self {
        Self {
            planes: camera.frustum.as_arrays(),
            camera_position: camera.position.extend(1.0).to_array(),
            count,
            bound_radius,
            max_distance_sq,
            _pad: 0,
        }
    }
}

/// Workgroups needed to cover `count` instances.
pub fn workgroup_count(count: u32) -> u32 {
    count.div_ceil(WORKGROUP_SIZE)
}

/// Owns the culling compute pipeline. One per renderer; shared by every batch.
pub struct CullingDispatcher {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
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

impl CullingDispatcher {
    /// Compile the culling kernel from WGSL source.
    pub fn new(device: &wgpu::Device, source: &str) -> Result<Self, RenderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cull_shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cull_bind_group_layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cull_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("cull_pipeline"),
            layout: Some(&layout),
            module: &module,
            entry_point: Some("cs_cull"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompile {
                label: "cull_shader",
                message: err.to_string(),
            });
        }

        tracing::info!("culling kernel compiled");
        Ok(Self {
            pipeline,
            bind_group_layout,
        })
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Record the cull for one batch: write uniforms, reset the counter,
    /// dispatch, copy the survivor count into the indirect args.
    ///
    /// Returns false (recording nothing) when the batch has no active
    /// instances.
    pub fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        batch: &GpuBatch,
        camera: &CameraState,
    ) -> bool {
        let count = batch.active_count();
        if count == 0 {
            return false;
        }

        let params = batch.cull_params();
        let uniforms = CullUniforms::new(camera, count, params.bound_radius, params.max_distance_sq);
        queue.write_buffer(batch.cull_uniform_buffer(), 0, bytemuck::bytes_of(&uniforms));

        encoder.clear_buffer(batch.counter_buffer(), 0, None);
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("cull_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, batch.cull_bind_group(), &[]);
            pass.dispatch_workgroups(workgroup_count(count), 1, 1);
        }
        encoder.copy_buffer_to_buffer(
            batch.counter_buffer(),
            0,
            batch.args_buffer(),
            DrawIndexedIndirectArgs::INSTANCE_COUNT_OFFSET,
            4,
        );
        tracing::trace!(stream = batch.kind().label(), count, "cull dispatched");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn cull_uniforms_size() {
        assert_eq!(std::mem::size_of::<CullUniforms>(), 128);
    }

    #[test]
    fn workgroup_math() {
        assert_eq!(workgroup_count(0), 0);
        assert_eq!(workgroup_count(1), 1);
        assert_eq!(workgroup_count(256), 1);
        assert_eq!(workgroup_count(257), 2);
        assert_eq!(workgroup_count(1000), 4);
    }

    #[test]
    fn uniforms_carry_camera_planes() {
        let eye = Vec3::new(1.0, 2.0, 3.0);
        let vp = Mat4::perspective_rh(1.0, 1.0, 0.1, 50.0)
            * Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let cam = CameraState::new(eye, vp);
        let u = CullUniforms::new(&cam, 7, 2.0, 100.0);
        assert_eq!(u.planes, cam.frustum.as_arrays());
        assert_eq!(u.camera_position, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(u.count, 7);
    }
}
