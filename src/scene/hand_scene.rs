use cgmath::Point3;

use super::{Canvas, Color, HAND_CONNECTIONS, OrbitCamera, Scene, draw_segments, lighten};
use crate::types::WorldLandmark;

/// Tracked hand in metric space.
#[derive(Clone, Debug, Default)]
pub struct HandScene {
    points: Vec<Point3<f32>>,
}

impl HandScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Landmarks arrive image-oriented (y down, z away from the viewer).
    pub fn update(&mut self, landmarks: &[WorldLandmark]) {
        self.points = landmarks
            .iter()
            .map(|lm| Point3::new(lm.x, -lm.y, -lm.z))
            .collect();
    }

    pub fn points(&self) -> &[Point3<f32>] {
        &self.points
    }
}

impl Scene for HandScene {
    fn draw(&self, camera: &OrbitCamera, color: Color, canvas: &mut Canvas) {
        if self.points.is_empty() {
            return;
        }
        let projected = draw_segments(camera, canvas, &self.points, HAND_CONNECTIONS, color, 2);
        let joint_color = lighten(color, 0.4);
        for (x, y) in projected.into_iter().flatten() {
            canvas.draw_circle((x as i32, y as i32), 2, joint_color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_hand() -> Vec<WorldLandmark> {
        (0..21)
            .map(|i| WorldLandmark {
                x: 0.0,
                y: -0.005 * i as f32,
                z: 0.0,
            })
            .collect()
    }

    #[test]
    fn update_flips_to_world_up() {
        let mut scene = HandScene::new();
        scene.update(&straight_hand());
        assert_eq!(scene.points().len(), 21);
        assert!(scene.points()[20].y > scene.points()[0].y);
    }

    #[test]
    fn fingertips_render_above_wrist() {
        let mut scene = HandScene::new();
        scene.update(&straight_hand());
        let camera = OrbitCamera {
            pitch: 0.0,
            distance: 0.3,
            z_near: 0.01,
            ..OrbitCamera::default()
        };

        let wrist = camera.project(scene.points()[0], 100, 100).unwrap();
        let tip = camera.project(scene.points()[20], 100, 100).unwrap();
        assert!(tip.1 < wrist.1);

        let mut canvas = Canvas::new(100, 100);
        scene.draw(&camera, [0, 200, 0, 255], &mut canvas);
        assert!(canvas.rgba.chunks_exact(4).any(|px| px[3] == 255));
    }

    #[test]
    fn empty_scene_draws_nothing() {
        let scene = HandScene::new();
        let mut canvas = Canvas::new(10, 10);
        scene.draw(&OrbitCamera::default(), [255, 255, 255, 255], &mut canvas);
        assert!(canvas.rgba.iter().all(|&b| b == 0));
    }
}
