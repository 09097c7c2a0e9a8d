use cgmath::{Point3, Vector3};

use super::{Canvas, Color, OrbitCamera, Scene, draw_ground, draw_segments, lighten};

const BONE_THICKNESS: i32 = 2;
const JOINT_RADIUS: i32 = 2;
const GROUND_DIVISIONS: usize = 8;

/// Reference humanoid bone in metres, relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HumanoidBone {
    pub name: &'static str,
    pub parent: Option<usize>,
    pub offset: [f32; 3],
}

const fn bone(name: &'static str, parent: Option<usize>, offset: [f32; 3]) -> HumanoidBone {
    HumanoidBone {
        name,
        parent,
        offset,
    }
}

/// Parents always precede their children.
pub const HUMANOID_BONES: &[HumanoidBone] = &[
    bone("hips", None, [0.0, 0.95, 0.0]),
    bone("spine", Some(0), [0.0, 0.1, 0.0]),
    bone("chest", Some(1), [0.0, 0.15, 0.0]),
    bone("neck", Some(2), [0.0, 0.2, 0.0]),
    bone("head", Some(3), [0.0, 0.1, 0.0]),
    bone("leftShoulder", Some(2), [0.05, 0.17, 0.0]),
    bone("leftUpperArm", Some(5), [0.1, 0.0, 0.0]),
    bone("leftLowerArm", Some(6), [0.27, 0.0, 0.0]),
    bone("leftHand", Some(7), [0.25, 0.0, 0.0]),
    bone("rightShoulder", Some(2), [-0.05, 0.17, 0.0]),
    bone("rightUpperArm", Some(9), [-0.1, 0.0, 0.0]),
    bone("rightLowerArm", Some(10), [-0.27, 0.0, 0.0]),
    bone("rightHand", Some(11), [-0.25, 0.0, 0.0]),
    bone("leftUpperLeg", Some(0), [0.09, -0.05, 0.0]),
    bone("leftLowerLeg", Some(13), [0.0, -0.42, 0.0]),
    bone("leftFoot", Some(14), [0.0, -0.43, 0.0]),
    bone("leftToes", Some(15), [0.0, -0.05, 0.12]),
    bone("rightUpperLeg", Some(0), [-0.09, -0.05, 0.0]),
    bone("rightLowerLeg", Some(17), [0.0, -0.42, 0.0]),
    bone("rightFoot", Some(18), [0.0, -0.43, 0.0]),
    bone("rightToes", Some(19), [0.0, -0.05, 0.12]),
];

/// Rest-pose humanoid drawn behind the loaded motion as a size reference.
#[derive(Clone, Debug)]
pub struct HumanoidScene {
    positions: Vec<Point3<f32>>,
    bones: Vec<(usize, usize)>,
}

impl HumanoidScene {
    pub fn new() -> Self {
        let mut positions: Vec<Point3<f32>> = Vec::with_capacity(HUMANOID_BONES.len());
        let mut bones = Vec::new();
        for (index, bone) in HUMANOID_BONES.iter().enumerate() {
            let offset = Vector3::from(bone.offset);
            let position = match bone.parent.and_then(|parent| positions.get(parent)) {
                Some(parent_position) => *parent_position + offset,
                None => Point3::new(0.0, 0.0, 0.0) + offset,
            };
            if let Some(parent) = bone.parent {
                bones.push((parent, index));
            }
            positions.push(position);
        }
        Self { positions, bones }
    }

    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    /// Bone rows for the dock: depth, name and world position.
    pub fn rows(&self) -> Vec<(usize, &'static str, Point3<f32>)> {
        let mut depths: Vec<usize> = Vec::with_capacity(HUMANOID_BONES.len());
        for bone in HUMANOID_BONES {
            let depth = bone
                .parent
                .and_then(|parent| depths.get(parent))
                .map_or(0, |d| d + 1);
            depths.push(depth);
        }
        HUMANOID_BONES
            .iter()
            .zip(depths)
            .zip(&self.positions)
            .map(|((bone, depth), position)| (depth, bone.name, *position))
            .collect()
    }
}

impl Default for HumanoidScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for HumanoidScene {
    fn draw(&self, camera: &OrbitCamera, color: Color, canvas: &mut Canvas) {
        draw_ground(camera, canvas, 1.0, GROUND_DIVISIONS, color);
        let projected = draw_segments(
            camera,
            canvas,
            &self.positions,
            &self.bones,
            color,
            BONE_THICKNESS,
        );
        let joint_color = lighten(color, 0.3);
        for (x, y) in projected.into_iter().flatten() {
            canvas.draw_circle((x as i32, y as i32), JOINT_RADIUS, joint_color);
        }
    }
}
