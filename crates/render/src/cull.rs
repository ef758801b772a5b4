//! Frustum + distance visibility test shared by the GPU kernel and the CPU
//! reference culler.

use crate::instance::InstanceRecord;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// A half-space boundary `dot(normal, p) + d >= 0` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: Vec3::Y,
            d: 0.0,
        }
    }
}

impl Plane {
    /// Builds a plane from raw coefficients and normalizes it.
    pub fn from_coefficients(v: Vec4) -> Self {
        let normal = v.truncate();
        let len = normal.length();
        if len > 0.0 {
            Self {
                normal: normal / len,
                d: v.w / len,
            }
        } else {
            Self { normal, d: v.w }
        }
    }

    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.d]
    }
}

/// The six planes of a camera's visible volume, normals pointing inward.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far.
    pub planes: [Plane; 6],
}

impl Frustum {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const BOTTOM: usize = 2;
    pub const TOP: usize = 3;
    pub const NEAR: usize = 4;
    pub const FAR: usize = 5;

    /// Extracts the planes of a view-projection matrix whose clip depth runs
    /// 0..1 (the wgpu convention).
    pub fn from_view_projection(m: Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    pub fn as_arrays(&self) -> [[f32; 4]; 6] {
        self.planes.map(|p| p.to_array())
    }
}

/// What the culling pass needs from the view layer each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    pub frustum: Frustum,
}

impl CameraState {
    pub fn new(position: Vec3, view_projection: Mat4) -> Self {
        Self {
            position,
            frustum: Frustum::from_view_projection(view_projection),
        }
    }
}

/// Per-stream culling constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullParams {
    /// Bounding-sphere radius, padding already added.
    pub bound_radius: f32,
    pub max_distance_sq: f32,
}

impl CullParams {
    pub fn new(mesh_radius: f32, padding: f32, max_distance: f32) -> Self {
        Self {
            bound_radius: mesh_radius + padding,
            max_distance_sq: max_distance * max_distance,
        }
    }
}

/// Conservative sphere test: rejects only when the sphere lies entirely on
/// the negative side of some plane, then applies the distance cutoff.
pub fn sphere_visible(camera: &CameraState, center: Vec3, params: &CullParams) -> bool {
    for plane in &camera.frustum.planes {
        if plane.signed_distance(center) < -params.bound_radius {
            return false;
        }
    }
    camera.position.distance_squared(center) <= params.max_distance_sq
}

/// Arguments for one `draw_indexed_indirect` call.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    pub index_count: u32,
    /// Written by the cull pass, never by the caller.
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

const _: () = assert!(std::mem::size_of::<DrawIndexedIndirectArgs>() == 20);

impl DrawIndexedIndirectArgs {
    pub fn for_mesh(index_count: u32) -> Self {
        Self {
            index_count,
            ..Self::default()
        }
    }

    /// Byte offset of `instance_count`, the target of the count copy.
    pub const INSTANCE_COUNT_OFFSET: u64 = 4;
}

/// CPU rendition of the culling kernel, used headless and in tests.
#[derive(Debug, Default)]
pub struct CpuCuller {
    survivors: Vec<InstanceRecord>,
}

impl CpuCuller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Culls `records` and returns the draw arguments the GPU path would
    /// produce. Survivors are available through [`survivors`](Self::survivors)
    /// until the next call.
    pub fn cull(
        &mut self,
        records: &[InstanceRecord],
        index_count: u32,
        camera: &CameraState,
        params: &CullParams,
    ) -> DrawIndexedIndirectArgs {
        self.survivors.clear();
        self.survivors.extend(
            records
                .iter()
                .filter(|r| sphere_visible(camera, r.position(), params)),
        );
        DrawIndexedIndirectArgs {
            instance_count: self.survivors.len() as u32,
            ..DrawIndexedIndirectArgs::for_mesh(index_count)
        }
    }

    pub fn survivors(&self) -> &[InstanceRecord] {
        &self.survivors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn camera() -> CameraState {
        let eye = Vec3::ZERO;
        let view = Mat4::look_at_rh(eye, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        CameraState::new(eye, proj * view)
    }

    fn params() -> CullParams {
        CullParams {
            bound_radius: 1.0,
            max_distance_sq: 80.0 * 80.0,
        }
    }

    fn record_at(p: Vec3) -> InstanceRecord {
        let mut r = InstanceRecord::default();
        r.set_transform(p, Quat::IDENTITY, 1.0);
        r
    }

    #[test]
    fn planes_are_normalized_and_face_inward() {
        let cam = camera();
        let inside = Vec3::new(0.0, 0.0, -10.0);
        for plane in &cam.frustum.planes {
            assert!((plane.normal.length() - 1.0).abs() < 1e-5);
            assert!(plane.signed_distance(inside) > 0.0);
        }
    }

    #[test]
    fn near_plane_sits_at_near_distance() {
        let cam = camera();
        let near = cam.frustum.planes[Frustum::NEAR];
        assert!(near.signed_distance(Vec3::new(0.0, 0.0, -0.1)).abs() < 1e-3);
        let far = cam.frustum.planes[Frustum::FAR];
        assert!(far.signed_distance(Vec3::new(0.0, 0.0, -100.0)).abs() < 0.5);
    }

    #[test]
    fn inside_sphere_is_accepted() {
        assert!(sphere_visible(&camera(), Vec3::new(0.0, 0.0, -10.0), &params()));
    }

    #[test]
    fn sphere_behind_camera_is_rejected() {
        assert!(!sphere_visible(&camera(), Vec3::new(0.0, 0.0, 10.0), &params()));
    }

    #[test]
    fn straddling_sphere_is_kept() {
        let cam = camera();
        let p = params();
        let left = cam.frustum.planes[Frustum::LEFT];
        let base = Vec3::new(0.0, 0.0, -10.0);
        let d0 = left.signed_distance(base);

        let straddling = base - left.normal * (d0 + 0.5 * p.bound_radius);
        assert!((left.signed_distance(straddling) + 0.5).abs() < 1e-4);
        assert!(sphere_visible(&cam, straddling, &p));

        let outside = base - left.normal * (d0 + 1.5 * p.bound_radius);
        assert!(!sphere_visible(&cam, outside, &p));
    }

    #[test]
    fn sphere_outside_any_single_plane_is_rejected() {
        let cam = camera();
        let p = CullParams {
            bound_radius: 1.0,
            max_distance_sq: f32::MAX,
        };
        let base = Vec3::new(0.0, 0.0, -10.0);
        for (i, plane) in cam.frustum.planes.iter().enumerate() {
            let d0 = plane.signed_distance(base);
            let outside = base - plane.normal * (d0 + p.bound_radius + 0.01);
            assert!(plane.signed_distance(outside) < -p.bound_radius, "plane {i}");
            assert!(!sphere_visible(&cam, outside, &p), "plane {i}");
        }
    }

    #[test]
    fn distance_cutoff_rejects_far_spheres() {
        let cam = camera();
        let p = CullParams {
            bound_radius: 1.0,
            max_distance_sq: 30.0 * 30.0,
        };
        assert!(sphere_visible(&cam, Vec3::new(0.0, 0.0, -29.0), &p));
        assert!(!sphere_visible(&cam, Vec3::new(0.0, 0.0, -50.0), &p));
    }

    #[test]
    fn cpu_culler_counts_survivors() {
        let records = [
            record_at(Vec3::new(0.0, 0.0, -5.0)),
            record_at(Vec3::new(0.0, 0.0, 5.0)),
            record_at(Vec3::new(1.0, 0.5, -20.0)),
            record_at(Vec3::new(0.0, 0.0, -95.0)),
        ];
        let mut culler = CpuCuller::new();
        let args = culler.cull(&records, 36, &camera(), &params());
        assert_eq!(args.index_count, 36);
        assert_eq!(args.instance_count, 2);
        assert_eq!(culler.survivors().len(), 2);

        let args = culler.cull(&[], 36, &camera(), &params());
        assert_eq!(args.instance_count, 0);
    }

    #[test]
    fn cull_params_pad_radius() {
        let p = CullParams::new(0.866, 1.5, 200.0);
        assert!((p.bound_radius - 2.366).abs() < 1e-6);
        assert_eq!(p.max_distance_sq, 40_000.0);
    }
}
