use cgmath::{Deg, Matrix4, One, Point3, Transform, Vector3};

use super::parser::{Bvh, Channel, Node};

#[derive(Clone, Debug)]
pub struct Joint {
    pub name: String,
    pub parent: Option<usize>,
    pub offset: Vector3<f32>,
    pub channels: Vec<Channel>,
    /// Index of this joint's first channel inside a frame row.
    pub channel_offset: usize,
}

impl Joint {
    pub fn is_end_site(&self) -> bool {
        self.name.is_empty()
    }
}

/// Flattened joint hierarchy. Parents always precede their children.
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    joints: Vec<Joint>,
    channel_count: usize,
}

impl Skeleton {
    pub fn from_bvh(bvh: &Bvh) -> Self {
        let mut skeleton = Skeleton::default();
        skeleton.push_node(&bvh.root, None);
        skeleton
    }

    fn push_node(&mut self, node: &Node, parent: Option<usize>) {
        let index = self.joints.len();
        self.joints.push(Joint {
            name: node.name.clone(),
            parent,
            offset: Vector3::new(node.offset[0], node.offset[1], node.offset[2]),
            channels: node.channels.clone(),
            channel_offset: self.channel_count,
        });
        self.channel_count += node.channels.len();
        for child in &node.children {
            self.push_node(child, Some(index));
        }
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// `(parent, child)` pairs, one per bone.
    pub fn bones(&self) -> Vec<(usize, usize)> {
        self.joints
            .iter()
            .enumerate()
            .filter_map(|(child, joint)| joint.parent.map(|parent| (parent, child)))
            .collect()
    }

    /// Position channels replace the matching offset component; rotations are
    /// applied in the listed channel order.
    pub fn local_transform(&self, joint: usize, frame_values: &[f32]) -> Matrix4<f32> {
        let joint = &self.joints[joint];
        let mut translation = joint.offset;
        let mut rotation = Matrix4::one();

        for (i, channel) in joint.channels.iter().enumerate() {
            let value = frame_values
                .get(joint.channel_offset + i)
                .copied()
                .unwrap_or(0.0);
            if channel.is_position() {
                translation[channel.axis()] = value;
            } else {
                rotation = rotation * axis_rotation(*channel, value);
            }
        }

        Matrix4::from_translation(translation) * rotation
    }

    pub fn global_transforms(&self, frame_values: &[f32]) -> Vec<Matrix4<f32>> {
        let mut globals: Vec<Matrix4<f32>> = Vec::with_capacity(self.joints.len());
        for (index, joint) in self.joints.iter().enumerate() {
            let local = self.local_transform(index, frame_values);
            let global = match joint.parent {
                Some(parent) => globals[parent] * local,
                None => local,
            };
            globals.push(global);
        }
        globals
    }

    pub fn positions(&self, frame_values: &[f32]) -> Vec<Point3<f32>> {
        self.global_transforms(frame_values)
            .iter()
            .map(|m| m.transform_point(Point3::new(0.0, 0.0, 0.0)))
            .collect()
    }

    pub fn rest_positions(&self) -> Vec<Point3<f32>> {
        let mut positions: Vec<Point3<f32>> = Vec::with_capacity(self.joints.len());
        for joint in &self.joints {
            let position = match joint.parent {
                Some(parent) => positions[parent] + joint.offset,
                None => Point3::new(0.0, 0.0, 0.0) + joint.offset,
            };
            positions.push(position);
        }
        positions
    }
}

fn axis_rotation(channel: Channel, degrees: f32) -> Matrix4<f32> {
    match channel.axis() {
        0 => Matrix4::from_angle_x(Deg(degrees)),
        1 => Matrix4::from_angle_y(Deg(degrees)),
        _ => Matrix4::from_angle_z(Deg(degrees)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::{SAMPLE_BVH, parse};

    fn assert_point(p: Point3<f32>, expected: [f32; 3]) {
        let ok = (p.x - expected[0]).abs() < 1e-4
            && (p.y - expected[1]).abs() < 1e-4
            && (p.z - expected[2]).abs() < 1e-4;
        assert!(ok, "got {p:?}, expected {expected:?}");
    }

    #[test]
    fn flattens_with_parent_links() {
        let bvh = parse(SAMPLE_BVH).unwrap();
        let skeleton = Skeleton::from_bvh(&bvh);

        assert_eq!(skeleton.joints().len(), 5);
        assert_eq!(skeleton.channel_count(), 12);
        assert_eq!(skeleton.joints()[1].parent, Some(0));
        assert_eq!(skeleton.joints()[3].channel_offset, 9);
        assert!(skeleton.joints()[4].is_end_site());
        assert_eq!(skeleton.bones(), vec![(0, 1), (1, 2), (0, 3), (3, 4)]);
    }

    #[test]
    fn first_frame_places_joints_at_offsets() {
        let bvh = parse(SAMPLE_BVH).unwrap();
        let skeleton = Skeleton::from_bvh(&bvh);
        let positions = skeleton.positions(bvh.frame(0).unwrap());

        assert_point(positions[0], [0.0, 90.0, 0.0]);
        assert_point(positions[1], [0.0, 100.0, 0.0]);
        assert_point(positions[2], [0.0, 105.0, 0.0]);
        assert_point(positions[3], [3.0, 90.0, 0.0]);
        assert_point(positions[4], [3.0, 82.0, 0.0]);
    }

    #[test]
    fn rotation_propagates_to_children() {
        let bvh = parse(SAMPLE_BVH).unwrap();
        let skeleton = Skeleton::from_bvh(&bvh);
        let positions = skeleton.positions(bvh.frame(1).unwrap());

        assert_point(positions[0], [1.0, 90.0, 0.0]);
        assert_point(positions[1], [1.0, 100.0, 0.0]);
        // Chest rotated 90 degrees about Z swings its end site to -X.
        assert_point(positions[2], [-4.0, 100.0, 0.0]);
        assert_point(positions[4], [4.0, 82.0, 0.0]);
    }

    #[test]
    fn rotation_order_follows_channel_order() {
        let bvh = parse(SAMPLE_BVH).unwrap();
        let skeleton = Skeleton::from_bvh(&bvh);
        let mut values = vec![0.0; skeleton.channel_count()];
        // Chest: Zrotation 90 then Xrotation 90.
        values[6] = 90.0;
        values[7] = 90.0;
        let positions = skeleton.positions(&values);

        // Rz(90) * Rx(90) * (0, 5, 0) = Rz(90) * (0, 0, 5) = (0, 0, 5)
        assert_point(positions[2], [0.0, 10.0, 5.0]);
    }

    #[test]
    fn rest_pose_uses_offsets_only() {
        let bvh = parse(SAMPLE_BVH).unwrap();
        let skeleton = Skeleton::from_bvh(&bvh);
        let rest = skeleton.rest_positions();

        assert_point(rest[0], [0.0, 0.0, 0.0]);
        assert_point(rest[2], [0.0, 15.0, 0.0]);
        assert_point(rest[4], [3.0, -8.0, 0.0]);
    }
}
