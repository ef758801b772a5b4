use crate::batch::GpuBatch;
use crate::camera::GameCamera;
use crate::culling::CullingDispatcher;
use crate::error::RenderError;
use crate::indirect::{CameraUniforms, IndirectRenderer};
use crate::mesh::{GpuMesh, MeshData};
use crate::shaders;
use jellyfield_common::GameConfig;
use jellyfield_kernel::Session;
use jellyfield_render::{CullParams, StreamKind};

/// Render resources consumed once at startup. A stream whose mesh is `None`
/// is disabled for the rest of the level.
#[derive(Debug, Clone)]
pub struct RenderResources {
    pub enemy_mesh: Option<MeshData>,
    pub projectile_mesh: Option<MeshData>,
    pub cull_kernel: Option<String>,
}

impl Default for RenderResources {
    fn default() -> Self {
        Self {
            enemy_mesh: Some(MeshData::cube()),
            projectile_mesh: Some(MeshData::octahedron(0.5)),
            cull_kernel: Some(shaders::CULL_SHADER.to_string()),
        }
    }
}

/// Per-stream capacities, fixed for a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCapacities {
    pub enemies: usize,
    pub projectiles: usize,
}

impl StreamCapacities {
    pub fn for_session(session: &Session) -> Self {
        Self {
            enemies: session.batch(StreamKind::Enemy).capacity(),
            projectiles: session.batch(StreamKind::Projectile).capacity(),
        }
    }
}

/// GPU-culled, indirectly drawn renderer for both instance streams.
///
/// Per frame: upload dirty batches, then in one encoder clear each survivor
/// counter, cull, copy the count into the indirect args, and draw.
pub struct JellyRenderer {
    dispatcher: CullingDispatcher,
    indirect: IndirectRenderer,
    enemies: Option<GpuBatch>,
    projectiles: Option<GpuBatch>,
    surface_format: wgpu::TextureFormat,
    clear_color: wgpu::Color,
}

impl JellyRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: &GameConfig,
        capacities: StreamCapacities,
        resources: RenderResources,
    ) -> Result<Self, RenderError> {
        let kernel = resources
            .cull_kernel
            .as_deref()
            .ok_or(RenderError::MissingCullKernel)?;
        let dispatcher = CullingDispatcher::new(device, kernel)?;
        let indirect = IndirectRenderer::new(device, surface_format, width, height)?;

        let allocate = |kind: StreamKind, mesh: Option<&MeshData>, capacity: usize| {
            let Some(mesh) = mesh else {
                tracing::error!(stream = kind.label(), "mesh missing, stream disabled");
                return None;
            };
            let mesh = GpuMesh::upload(device, kind.label(), mesh);
            let cull = CullParams::new(mesh.bound_radius, config.bounds_padding, config.cull_distance);
            Some(GpuBatch::allocate(
                device,
                kind,
                capacity,
                mesh,
                cull,
                &dispatcher,
                indirect.instance_layout(),
            ))
        };
        let enemies = allocate(
            StreamKind::Enemy,
            resources.enemy_mesh.as_ref(),
            capacities.enemies,
        );
        let projectiles = allocate(
            StreamKind::Projectile,
            resources.projectile_mesh.as_ref(),
            capacities.projectiles,
        );

        if enemies.is_none() && projectiles.is_none() {
            return Err(RenderError::NoRenderableStreams);
        }

        Ok(Self {
            dispatcher,
            indirect,
            enemies,
            projectiles,
            surface_format,
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.15,
                a: 1.0,
            },
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    pub fn stream_enabled(&self, kind: StreamKind) -> bool {
        self.batch(kind).is_some()
    }

    pub fn batch(&self, kind: StreamKind) -> Option<&GpuBatch> {
        match kind {
            StreamKind::Enemy => self.enemies.as_ref(),
            StreamKind::Projectile => self.projectiles.as_ref(),
        }
    }

    fn batch_mut(&mut self, kind: StreamKind) -> Option<&mut GpuBatch> {
        match kind {
            StreamKind::Enemy => self.enemies.as_mut(),
            StreamKind::Projectile => self.projectiles.as_mut(),
        }
    }

    /// Tell `session` which streams can be drawn so it stops simulating the
    /// others.
    pub fn apply_stream_state(&self, session: &mut Session) {
        for kind in StreamKind::ALL {
            if !self.stream_enabled(kind) {
                session.set_stream_enabled(kind, false);
            }
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.indirect.resize(device, width, height);
    }

    /// Copy changed instance data from the session's batches to the GPU.
    pub fn upload(&mut self, queue: &wgpu::Queue, session: &mut Session) {
        for kind in StreamKind::ALL {
            if let Some(gpu) = self.batch_mut(kind) {
                gpu.upload(queue, session.batch_mut(kind));
            }
        }
    }

    /// Record cull and draw for both streams into `encoder`, targeting `view`.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        camera: &GameCamera,
        time: f32,
    ) {
        let _span = tracing::info_span!("render_frame").entered();
        let state = camera.state();
        self.indirect.write_camera(
            queue,
            &CameraUniforms::new(camera.view_projection(), camera.position, time),
        );

        let batches = [self.enemies.as_ref(), self.projectiles.as_ref()];
        for batch in batches.iter().flatten() {
            self.dispatcher.dispatch(encoder, queue, batch, &state);
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("jelly_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.indirect.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        for batch in batches.iter().flatten() {
            self.indirect.draw(&mut pass, batch);
        }
    }

    /// Upload, encode and submit one frame.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        camera: &GameCamera,
        session: &mut Session,
        time: f32,
    ) {
        self.upload(queue, session);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("jelly_encoder"),
        });
        self.encode(&mut encoder, queue, view, camera, time);
        queue.submit(std::iter::once(encoder.finish()));
    }
}
