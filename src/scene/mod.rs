//! Software-rasterized 3D views over the loaded motion and the tracked hand.

mod bvh_scene;
mod camera;
mod canvas;
mod capture_scene;
mod hand_scene;
mod humanoid_scene;

pub use bvh_scene::BvhScene;
pub use camera::{OrbitCamera, project_with};
pub use canvas::{Canvas, Color, color_from_f32};
pub use capture_scene::CaptureScene;
pub use hand_scene::HandScene;
pub use humanoid_scene::HumanoidScene;

use cgmath::Point3;

pub const HAND_CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

pub trait Scene {
    fn draw(&self, camera: &OrbitCamera, color: Color, canvas: &mut Canvas);
}

/// A scene together with the camera and color it was pushed with.
pub struct SceneView<S> {
    pub scene: S,
    pub camera: OrbitCamera,
    pub color: Color,
}

impl<S: Scene> SceneView<S> {
    pub fn new(scene: S, color: Color) -> Self {
        Self {
            scene,
            camera: OrbitCamera::default(),
            color,
        }
    }
}

pub trait Layer {
    fn draw_layer(&self, canvas: &mut Canvas);
    fn camera_mut(&mut self) -> &mut OrbitCamera;
}

impl<S: Scene> Layer for SceneView<S> {
    fn draw_layer(&self, canvas: &mut Canvas) {
        self.scene.draw(&self.camera, self.color, canvas);
    }

    fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }
}

/// Several scenes drawn over one another into a single viewport.
#[derive(Clone, Debug)]
pub struct MultiView {
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,
}

impl MultiView {
    pub fn new(width: u32, height: u32, clear_color: Color) -> Self {
        Self {
            width,
            height,
            clear_color,
        }
    }

    pub fn render(&self, layers: &[&dyn Layer]) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height);
        canvas.clear(self.clear_color);
        for layer in layers {
            layer.draw_layer(&mut canvas);
        }
        canvas
    }
}

pub(crate) fn dim(color: Color, factor: f32) -> Color {
    let scale = |v: u8| (v as f32 * factor).clamp(0.0, 255.0) as u8;
    [scale(color[0]), scale(color[1]), scale(color[2]), color[3]]
}

pub(crate) fn lighten(color: Color, amount: f32) -> Color {
    let mix = |v: u8| (v as f32 + (255.0 - v as f32) * amount).clamp(0.0, 255.0) as u8;
    [mix(color[0]), mix(color[1]), mix(color[2]), color[3]]
}

/// Projects every point once and draws `segments` between visible pairs.
pub(crate) fn draw_segments(
    camera: &OrbitCamera,
    canvas: &mut Canvas,
    points: &[Point3<f32>],
    segments: &[(usize, usize)],
    color: Color,
    thickness: i32,
) -> Vec<Option<(f32, f32)>> {
    let aspect = canvas.width as f32 / canvas.height.max(1) as f32;
    let vp = camera.view_projection(aspect);
    let projected: Vec<Option<(f32, f32)>> = points
        .iter()
        .map(|p| project_with(&vp, *p, canvas.width, canvas.height))
        .collect();

    for &(a, b) in segments {
        if let (Some(Some(pa)), Some(Some(pb))) = (projected.get(a), projected.get(b)) {
            canvas.draw_line(*pa, *pb, color, thickness);
        }
    }
    projected
}

/// Square grid on the y = 0 plane.
pub(crate) fn draw_ground(
    camera: &OrbitCamera,
    canvas: &mut Canvas,
    half_extent: f32,
    divisions: usize,
    color: Color,
) {
    if divisions == 0 || half_extent <= 0.0 {
        return;
    }
    let step = half_extent * 2.0 / divisions as f32;
    let mut points = Vec::with_capacity((divisions + 1) * 4);
    let mut segments = Vec::with_capacity((divisions + 1) * 2);
    for i in 0..=divisions {
        let t = -half_extent + step * i as f32;
        let base = points.len();
        points.push(Point3::new(t, 0.0, -half_extent));
        points.push(Point3::new(t, 0.0, half_extent));
        points.push(Point3::new(-half_extent, 0.0, t));
        points.push(Point3::new(half_extent, 0.0, t));
        segments.push((base, base + 1));
        segments.push((base + 2, base + 3));
    }
    draw_segments(camera, canvas, &points, &segments, color, 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dot;

    impl Scene for Dot {
        fn draw(&self, camera: &OrbitCamera, color: Color, canvas: &mut Canvas) {
            if let Some((x, y)) = camera.project(camera.target, canvas.width, canvas.height) {
                canvas.draw_circle((x as i32, y as i32), 2, color);
            }
        }
    }

    #[test]
    fn multiview_clears_then_draws_layers() {
        let view = MultiView::new(32, 24, [10, 10, 10, 255]);
        let dot = SceneView::new(Dot, [200, 0, 0, 255]);
        let canvas = view.render(&[&dot]);

        assert_eq!(canvas.pixel(0, 0), Some([10, 10, 10, 255]));
        assert_eq!(canvas.pixel(16, 12), Some([200, 0, 0, 255]));
    }

    #[test]
    fn later_layers_draw_on_top() {
        let view = MultiView::new(32, 24, [0, 0, 0, 255]);
        let first = SceneView::new(Dot, [200, 0, 0, 255]);
        let second = SceneView::new(Dot, [0, 200, 0, 255]);
        let canvas = view.render(&[&first, &second]);

        assert_eq!(canvas.pixel(16, 12), Some([0, 200, 0, 255]));
    }

    #[test]
    fn ground_grid_is_visible_from_above() {
        let camera = OrbitCamera {
            pitch: 45.0,
            ..OrbitCamera::default()
        };
        let mut canvas = Canvas::new(64, 48);
        draw_ground(&camera, &mut canvas, 1.0, 4, [255, 255, 255, 255]);
        assert!(canvas.rgba.chunks_exact(4).any(|px| px[0] == 255));
    }

    #[test]
    fn color_helpers_stay_in_range() {
        assert_eq!(dim([200, 100, 0, 255], 0.5), [100, 50, 0, 255]);
        assert_eq!(lighten([0, 255, 100, 255], 1.0), [255, 255, 255, 255]);
    }
}
