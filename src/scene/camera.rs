use cgmath::{Deg, EuclideanSpace, Matrix4, Point3, Vector3, Vector4, perspective};

const MAX_PITCH: f32 = 89.0;

/// Perspective camera orbiting `target`. Angles are in degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitCamera {
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub target: Point3<f32>,
    pub fovy: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 15.0,
            distance: 5.0,
            target: Point3::origin(),
            fovy: 60.0,
            z_near: 0.1,
            z_far: 100.0,
        }
    }
}

impl OrbitCamera {
    pub fn eye(&self) -> Point3<f32> {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        let dir = Vector3::new(
            pitch.cos() * yaw.sin(),
            pitch.sin(),
            pitch.cos() * yaw.cos(),
        );
        self.target + dir * self.distance
    }

    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye(), self.target, Vector3::unit_y())
    }

    pub fn projection(&self, aspect: f32) -> Matrix4<f32> {
        perspective(Deg(self.fovy), aspect.max(1e-3), self.z_near, self.z_far)
    }

    pub fn view_projection(&self, aspect: f32) -> Matrix4<f32> {
        self.projection(aspect) * self.view()
    }

    /// Screen position in pixels, `None` when the point is behind the camera
    /// or outside the depth range.
    pub fn project(&self, point: Point3<f32>, width: u32, height: u32) -> Option<(f32, f32)> {
        let aspect = width as f32 / height.max(1) as f32;
        project_with(&self.view_projection(aspect), point, width, height)
    }

    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw = (self.yaw + delta_yaw) % 360.0;
        self.pitch = (self.pitch + delta_pitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn zoom(&mut self, factor: f32) {
        if factor > 0.0 {
            self.distance = (self.distance * factor).clamp(self.z_near * 2.0, self.z_far * 0.5);
        }
    }
}

/// Projects with a precomputed view-projection matrix.
pub fn project_with(
    view_projection: &Matrix4<f32>,
    point: Point3<f32>,
    width: u32,
    height: u32,
) -> Option<(f32, f32)> {
    let clip: Vector4<f32> = *view_projection * point.to_homogeneous();
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    if !(-1.0..=1.0).contains(&ndc.z) {
        return None;
    }
    Some((
        (ndc.x + 1.0) * 0.5 * width as f32,
        (1.0 - ndc.y) * 0.5 * height as f32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level_camera() -> OrbitCamera {
        OrbitCamera {
            pitch: 0.0,
            ..OrbitCamera::default()
        }
    }

    #[test]
    fn target_projects_to_center() {
        let camera = OrbitCamera::default();
        let (x, y) = camera.project(camera.target, 640, 480).unwrap();
        assert!((x - 320.0).abs() < 1e-3);
        assert!((y - 240.0).abs() < 1e-3);
    }

    #[test]
    fn up_is_up_on_screen() {
        let camera = level_camera();
        let (_, y) = camera.project(Point3::new(0.0, 1.0, 0.0), 640, 480).unwrap();
        assert!(y < 240.0);
    }

    #[test]
    fn behind_camera_is_rejected() {
        let camera = level_camera();
        assert!(camera.project(Point3::new(0.0, 0.0, 10.0), 640, 480).is_none());
    }

    #[test]
    fn beyond_far_plane_is_rejected() {
        let camera = level_camera();
        assert!(camera.project(Point3::new(0.0, 0.0, -200.0), 640, 480).is_none());
    }

    #[test]
    fn orbit_clamps_pitch() {
        let mut camera = OrbitCamera::default();
        camera.orbit(30.0, 500.0);
        assert_eq!(camera.pitch, MAX_PITCH);
        assert_eq!(camera.yaw, 30.0);
    }

    #[test]
    fn scaled_camera_keeps_framing() {
        let mut camera = level_camera();
        camera.distance *= 100.0;
        camera.z_far *= 100.0;
        let near = level_camera().project(Point3::new(1.0, 0.0, 0.0), 640, 480).unwrap();
        let far = camera.project(Point3::new(100.0, 0.0, 0.0), 640, 480).unwrap();
        assert!((near.0 - far.0).abs() < 1e-2);
    }
}
