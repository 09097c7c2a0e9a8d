use cgmath::Point3;

use super::{Canvas, Color, OrbitCamera, Scene, dim, draw_ground, draw_segments, lighten};
use crate::bvh::{Bvh, Skeleton};

const BONE_THICKNESS: i32 = 3;
const JOINT_RADIUS: i32 = 3;
const GROUND_DIVISIONS: usize = 10;

/// The loaded motion posed at the current frame.
#[derive(Clone, Debug, Default)]
pub struct BvhScene {
    skeleton: Skeleton,
    bones: Vec<(usize, usize)>,
    motion: Vec<f32>,
    frames: usize,
    current_frame: usize,
    positions: Vec<Point3<f32>>,
    ground_extent: f32,
}

impl BvhScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, bvh: &Bvh) {
        self.skeleton = Skeleton::from_bvh(bvh);
        self.bones = self.skeleton.bones();
        self.motion = bvh.motion.clone();
        self.frames = bvh.frames;
        self.current_frame = 0;

        let rest = self.skeleton.rest_positions();
        self.ground_extent = rest
            .iter()
            .map(|p| p.x.abs().max(p.y.abs()).max(p.z.abs()))
            .fold(0.0_f32, f32::max);

        if self.frames == 0 {
            self.positions = rest;
        } else {
            self.set_frame(0);
        }
    }

    /// Clamps to the last frame; no-op when nothing is loaded.
    pub fn set_frame(&mut self, frame: usize) {
        if self.frames == 0 {
            return;
        }
        let frame = frame.min(self.frames - 1);
        let width = self.skeleton.channel_count();
        let Some(values) = self.motion.get(frame * width..(frame + 1) * width) else {
            log::warn!("motion row {frame} out of range");
            return;
        };
        self.positions = self.skeleton.positions(values);
        self.current_frame = frame;
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }
}

impl Scene for BvhScene {
    fn draw(&self, camera: &OrbitCamera, color: Color, canvas: &mut Canvas) {
        if self.positions.is_empty() {
            return;
        }
        draw_ground(
            camera,
            canvas,
            self.ground_extent,
            GROUND_DIVISIONS,
            dim(color, 0.6),
        );

        let projected = draw_segments(
            camera,
            canvas,
            &self.positions,
            &self.bones,
            color,
            BONE_THICKNESS,
        );
        let joint_color = lighten(color, 0.5);
        for (x, y) in projected.into_iter().flatten() {
            canvas.draw_circle((x as i32, y as i32), JOINT_RADIUS, joint_color);
        }
    }
}
