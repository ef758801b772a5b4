use crate::culling::{CullUniforms, CullingDispatcher};
use crate::mesh::GpuMesh;
use jellyfield_render::{
    CullParams, DrawIndexedIndirectArgs, InstanceBatch, InstanceRecord, StreamKind,
};
use wgpu::util::DeviceExt;

const RECORD_SIZE: u64 = std::mem::size_of::<InstanceRecord>() as u64;

/// GPU half of an instance stream: source records, culled survivors, the
/// survivor counter and the indirect draw arguments.
///
/// Buffers are sized once at allocation. A new level allocates a new batch.
pub struct GpuBatch {
    kind: StreamKind,
    capacity: u32,
    active: u32,
    mesh: GpuMesh,
    cull: CullParams,
    source: wgpu::Buffer,
    survivors: wgpu::Buffer,
    counter: wgpu::Buffer,
    args: wgpu::Buffer,
    cull_uniforms: wgpu::Buffer,
    cull_bind_group: wgpu::BindGroup,
    draw_bind_group: wgpu::BindGroup,
}

impl GpuBatch {
    pub fn allocate(
        device: &wgpu::Device,
        kind: StreamKind,
        capacity: usize,
        mesh: GpuMesh,
        cull: CullParams,
        dispatcher: &CullingDispatcher,
        draw_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let label = kind.label();
        // Never create a zero-sized binding.
        let slots = capacity.max(1) as u64;

        let source = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}_source_buffer")),
            size: slots * RECORD_SIZE,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let survivors = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}_survivor_buffer")),
            size: slots * RECORD_SIZE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let counter = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}_counter_buffer")),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let args = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_indirect_args")),
            contents: bytemuck::bytes_of(&DrawIndexedIndirectArgs::for_mesh(mesh.index_count)),
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
        });
        let cull_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}_cull_uniforms")),
            size: std::mem::size_of::<CullUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let cull_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label}_cull_bind_group")),
            layout: dispatcher.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: source.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: survivors.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: counter.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: cull_uniforms.as_entire_binding(),
                },
            ],
        });
        let draw_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label}_draw_bind_group")),
            layout: draw_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: survivors.as_entire_binding(),
            }],
        });

        tracing::info!(
            stream = label,
            capacity,
            bound_radius = cull.bound_radius,
            "gpu batch allocated"
        );

        Self {
            kind,
            capacity: capacity as u32,
            active: 0,
            mesh,
            cull,
            source,
            survivors,
            counter,
            args,
            cull_uniforms,
            cull_bind_group,
            draw_bind_group,
        }
    }

    /// Copy the CPU batch's records to the source buffer if they changed, and
    /// take over its active count.
    pub fn upload(&mut self, queue: &wgpu::Queue, batch: &mut InstanceBatch) {
        let active = batch.active_count().min(self.capacity as usize);
        if let Some(records) = batch.take_upload() {
            let records = &records[..active];
            queue.write_buffer(&self.source, 0, bytemuck::cast_slice(records));
        }
        self.active = active as u32;
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn active_count(&self) -> u32 {
        self.active
    }

    pub fn mesh(&self) -> &GpuMesh {
        &self.mesh
    }

    pub fn cull_params(&self) -> CullParams {
        self.cull
    }

    /// Culled instances, valid after this frame's dispatch.
    pub fn survivor_buffer(&self) -> &wgpu::Buffer {
        &self.survivors
    }

    pub(crate) fn counter_buffer(&self) -> &wgpu::Buffer {
        &self.counter
    }

    pub(crate) fn args_buffer(&self) -> &wgpu::Buffer {
        &self.args
    }

    pub(crate) fn cull_uniform_buffer(&self) -> &wgpu::Buffer {
        &self.cull_uniforms
    }

    pub(crate) fn cull_bind_group(&self) -> &wgpu::BindGroup {
        &self.cull_bind_group
    }

    pub(crate) fn draw_bind_group(&self) -> &wgpu::BindGroup {
        &self.draw_bind_group
    }
}
