use glam::{Mat4, Vec3};
use jellyfield_render::CameraState;

/// Player camera: sits behind the firing line looking down the grid, and can
/// be flown around for inspection.
/// Camera motion is not part of the simulation; it only feeds culling and
/// drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct GameCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for GameCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 9.0, -4.0),
            yaw: 90.0_f32.to_radians(),
            pitch: -25.0_f32.to_radians(),
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 500.0,
            speed: 10.0,
            sensitivity: 0.003,
        }
    }
}

impl GameCamera {
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn move_forward(&mut self, dt: f32) {
        self.position += self.forward() * self.speed * dt;
    }

    pub fn move_backward(&mut self, dt: f32) {
        self.position -= self.forward() * self.speed * dt;
    }

    pub fn move_left(&mut self, dt: f32) {
        self.position -= self.right() * self.speed * dt;
    }

    pub fn move_right(&mut self, dt: f32) {
        self.position += self.right() * self.speed * dt;
    }

    pub fn move_up(&mut self, dt: f32) {
        self.position.y += self.speed * dt;
    }

    pub fn move_down(&mut self, dt: f32) {
        self.position.y -= self.speed * dt;
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self
            .pitch
            .clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Where projectiles leave from: just below and ahead of the eye.
    pub fn muzzle(&self) -> Vec3 {
        self.position + self.forward() * 1.5 - Vec3::Y * 0.5
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Eye position and frustum planes for this frame's culling.
    pub fn state(&self) -> CameraState {
        CameraState::new(self.position, self.view_projection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jellyfield_render::{CullParams, sphere_visible};

    #[test]
    fn default_camera_sees_the_grid() {
        let cam = GameCamera::default();
        let vp = cam.view_projection();
        assert!(!vp.col(0).x.is_nan());

        let params = CullParams::new(0.87, 1.5, 200.0);
        let state = cam.state();
        assert!(sphere_visible(&state, Vec3::new(0.0, 2.0, 15.0), &params));
        assert!(!sphere_visible(&state, Vec3::new(0.0, 2.0, -30.0), &params));
    }

    #[test]
    fn camera_movement() {
        let mut cam = GameCamera::default();
        let start = cam.position;
        cam.move_forward(1.0);
        assert_ne!(cam.position, start);
        cam.rotate(0.0, 10_000.0);
        assert!(cam.pitch >= -89.0_f32.to_radians());
    }

    #[test]
    fn viewport_sets_aspect() {
        let mut cam = GameCamera::default();
        cam.set_viewport(800, 400);
        assert_eq!(cam.aspect, 2.0);
        cam.set_viewport(800, 0);
        assert_eq!(cam.aspect, 2.0);
    }
}
