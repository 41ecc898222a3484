use glam::{Mat4, Vec3};

/// Fixed perspective camera looking at the stage. The far plane follows
/// the tier's draw distance.
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub viewport: (u32, u32),
}

impl PerspectiveCamera {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 12.0),
            target: Vec3::ZERO,
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            viewport: (viewport_width, viewport_height),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.0.max(1) as f32 / self.viewport.1.max(1) as f32
    }

    pub fn view_proj(&self) -> Mat4 {
        let far = self.far.max(self.near + 0.01);
        let proj = Mat4::perspective_rh(self.fov_y_degrees.to_radians(), self.aspect(), self.near, far);
        let view = Mat4::look_at_rh(self.position, self.target, Vec3::Y);
        proj * view
    }
}

/// Orthographic view-projection for a directional light's shadow map.
pub fn light_view_proj(light_position: Vec3, extent: f32) -> Mat4 {
    let eye = light_position.try_normalize().unwrap_or(Vec3::Y) * extent * 1.5;
    let up = if eye.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, up);
    let proj = Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.1, extent * 3.0);
    proj * view
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_projects_to_screen_centre() {
        let camera = PerspectiveCamera::new(1280, 720);
        let clip = camera.view_proj() * camera.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn points_past_far_plane_are_clipped() {
        let mut camera = PerspectiveCamera::new(800, 600);
        camera.far = 25.0;
        let clip = camera.view_proj() * Vec3::new(0.0, 0.0, -50.0).extend(1.0);
        assert!(clip.z / clip.w > 1.0);
    }

    #[test]
    fn light_projection_contains_origin() {
        let m = light_view_proj(Vec3::new(5.0, 10.0, 5.0), 15.0);
        let clip = m * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
