use std::time::Instant;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl Frame {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.rgba.is_empty()
    }
}

/// Image-space landmark; x and y are normalized by the frame size, z uses the
/// same scale as x.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Metric landmark in metres, centred near the hand.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn from_score(score: f32) -> Self {
        if score <= 0.5 {
            Handedness::Left
        } else {
            Handedness::Right
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        }
    }
}

#[derive(Clone, Debug)]
pub struct DetectedHand {
    pub landmarks: Vec<NormalizedLandmark>,
    pub world: Vec<WorldLandmark>,
    pub confidence: f32,
    pub handedness: Handedness,
}

#[derive(Clone, Debug)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub landmarks: Vec<(f32, f32)>,
    pub score: f32,
}

/// One processed camera frame and every hand found in it.
#[derive(Clone, Debug)]
pub struct HandFrame {
    pub frame: Frame,
    pub hands: Vec<DetectedHand>,
}
