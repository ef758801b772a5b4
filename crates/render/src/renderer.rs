use crate::cull::{CameraState, CpuCuller, CullParams};
use crate::instance::InstanceBatch;

/// One stream as handed to a renderer for a frame.
#[derive(Debug, Clone, Copy)]
pub struct StreamView<'a> {
    pub batch: &'a InstanceBatch,
    pub cull: CullParams,
    pub index_count: u32,
}

/// Everything a renderer reads to produce one frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderFrame<'a> {
    pub camera: CameraState,
    pub streams: &'a [StreamView<'a>],
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// A renderer reads batches and camera state; it never writes simulation
/// state.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    fn render(&mut self, frame: &RenderFrame<'_>) -> Self::Output;
}

/// Text renderer used by the headless host.
///
/// Culls each stream on the CPU with the same test the GPU kernel runs and
/// reports how many instances would be drawn.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    culler: CpuCuller,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, frame: &RenderFrame<'_>) -> String {
        let p = frame.camera.position;
        let mut out = format!("camera=({:.1}, {:.1}, {:.1})\n", p.x, p.y, p.z);
        for stream in frame.streams {
            let batch = stream.batch;
            let args = self.culler.cull(
                batch.active(),
                stream.index_count,
                &frame.camera,
                &stream.cull,
            );
            out.push_str(&format!(
                "  {:<10} active={}/{} visible={} dirty={}\n",
                batch.kind().label(),
                batch.active_count(),
                batch.capacity(),
                args.instance_count,
                batch.is_dirty()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{InstanceRecord, StreamKind};
    use glam::{Mat4, Quat, Vec3};

    fn camera() -> CameraState {
        let eye = Vec3::new(0.0, 5.0, 0.0);
        let view = Mat4::look_at_rh(eye, Vec3::new(0.0, 0.0, 20.0), Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.5, 0.1, 300.0);
        CameraState::new(eye, proj * view)
    }

    #[test]
    fn empty_streams() {
        let enemies = InstanceBatch::new(StreamKind::Enemy, 8);
        let projectiles = InstanceBatch::new(StreamKind::Projectile, 4);
        let cull = CullParams::new(1.0, 1.5, 200.0);
        let streams = [
            StreamView {
                batch: &enemies,
                cull,
                index_count: 36,
            },
            StreamView {
                batch: &projectiles,
                cull,
                index_count: 36,
            },
        ];
        let out = DebugTextRenderer::new().render(&RenderFrame {
            camera: camera(),
            streams: &streams,
        });
        assert!(out.contains("enemy      active=0/8 visible=0"));
        assert!(out.contains("projectile active=0/4"));
    }

    #[test]
    fn reports_visible_subset() {
        let mut enemies = InstanceBatch::new(StreamKind::Enemy, 8);
        for z in [15.0, 20.0, -40.0] {
            let mut r = InstanceRecord::default();
            r.set_transform(Vec3::new(0.0, 2.0, z), Quat::IDENTITY, 0.54);
            enemies.push(r);
        }
        enemies.mark_dirty();
        let streams = [StreamView {
            batch: &enemies,
            cull: CullParams::new(0.87, 1.5, 200.0),
            index_count: 36,
        }];
        let out = DebugTextRenderer::new().render(&RenderFrame {
            camera: camera(),
            streams: &streams,
        });
        assert!(out.contains("active=3/8 visible=2 dirty=true"), "{out}");
    }
}
