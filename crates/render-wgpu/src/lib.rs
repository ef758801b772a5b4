//! wgpu back end for jellyfield: GPU culling and indirect instanced drawing.
//!
//! Each instance stream owns a source buffer, a survivor buffer with an atomic
//! counter, and an indirect-args buffer. Per frame the cull kernel appends
//! visible instances to the survivor buffer and the counter is copied into
//! the draw's instance count; the CPU never reads it back.
//!
//! # Invariants
//! - Counter reset, cull, count copy and draw are recorded in that order in a
//!   single encoder.
//! - A batch with no active instances records neither a dispatch nor a draw.
//! - Renderer never mutates simulation state; it only clears dirty flags.

mod batch;
mod camera;
mod culling;
mod error;
mod gpu;
mod indirect;
mod mesh;
mod shaders;

pub use batch::GpuBatch;
pub use camera::GameCamera;
pub use culling::{CullUniforms, CullingDispatcher, WORKGROUP_SIZE, workgroup_count};
pub use error::RenderError;
pub use gpu::{JellyRenderer, RenderResources, StreamCapacities};
pub use indirect::{CameraUniforms, DEPTH_FORMAT, IndirectRenderer};
pub use mesh::{GpuMesh, MeshData, Vertex};
pub use shaders::{CULL_SHADER, INSTANCE_SHADER};
