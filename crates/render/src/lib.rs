//! Renderer-agnostic rendering data for jellyfield.
//!
//! Simulation code writes [`InstanceRecord`]s into an [`InstanceBatch`]; a
//! renderer culls each batch against a [`CameraState`] and draws the
//! survivors.
//!
//! # Invariants
//! - A batch never holds more active records than its capacity.
//! - A record's inverse transform is rewritten whenever its forward transform is.
//! - The culling test only rejects spheres entirely outside one plane or beyond
//!   the distance cutoff.

mod cull;
mod instance;
mod renderer;

pub use cull::{
    CameraState, CpuCuller, CullParams, DrawIndexedIndirectArgs, Frustum, Plane, sphere_visible,
};
pub use instance::{InstanceBatch, InstanceRecord, StreamKind};
pub use renderer::{DebugTextRenderer, RenderFrame, Renderer, StreamView};

pub fn crate_info() -> &'static str {
    "jellyfield-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
