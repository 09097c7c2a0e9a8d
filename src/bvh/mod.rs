mod parser;
mod pose;

pub use parser::{Bvh, BvhError, Channel, Node, load, parse};
pub use pose::{Joint, Skeleton};

#[cfg(test)]
pub(crate) const SAMPLE_BVH: &str = "HIERARCHY
ROOT Hips
{
  OFFSET 0.0 0.0 0.0
  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
  JOINT Chest
  {
    OFFSET 0.0 10.0 0.0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 0.0 5.0 0.0
    }
  }
  JOINT LeftHip
  {
    OFFSET 3.0 0.0 0.0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 0.0 -8.0 0.0
    }
  }
}
MOTION
Frames: 2
Frame Time: 0.5
0 90 0 0 0 0 0 0 0 0 0 0
1 90 0 0 0 0 90 0 0 0 0 0
";
