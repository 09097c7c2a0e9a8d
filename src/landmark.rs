//! Latest hand-tracking result, fanned out to the capture overlay, the 3D hand
//! and the landmark table.

use crate::{
    scene::{CaptureScene, HandScene},
    types::{HandFrame, Handedness, WorldLandmark},
};

pub const TABLE_HEADERS: [&str; 4] = ["index", "x", "y", "z"];

#[derive(Clone, Debug, Default)]
pub struct HandLandmark {
    pub landmark: Vec<WorldLandmark>,
    pub capture: CaptureScene,
    pub hand: HandScene,
    pub handedness: Option<Handedness>,
}

impl HandLandmark {
    pub fn new() -> Self {
        Self::default()
    }

    /// With several hands the last one wins; with none, the previous points
    /// and landmarks stay.
    pub fn apply(&mut self, result: &HandFrame) {
        self.capture.update_capture_texture(&result.frame);
        for hand in &result.hands {
            self.capture.points.update(&hand.landmarks);
        }
        for hand in &result.hands {
            self.landmark = hand.world.clone();
            self.hand.update(&hand.world);
            self.handedness = Some(hand.handedness);
        }
    }

    pub fn handedness_label(&self) -> &'static str {
        self.handedness.map(|h| h.label()).unwrap_or("No hand")
    }

    pub fn table_rows(&self) -> Vec<[String; 4]> {
        self.landmark
            .iter()
            .enumerate()
            .map(|(i, lm)| {
                [
                    i.to_string(),
                    format!("{:.2}", lm.x),
                    format!("{:.2}", lm.y),
                    format!("{:.2}", lm.z),
                ]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::types::{DetectedHand, Frame, Handedness, NormalizedLandmark};

    fn frame(width: u32) -> Frame {
        Frame {
            rgba: vec![0; width as usize * 4],
            width,
            height: 1,
            timestamp: Instant::now(),
        }
    }

    fn hand(value: f32) -> DetectedHand {
        hand_with(value, Handedness::Left)
    }

    fn hand_with(value: f32, handedness: Handedness) -> DetectedHand {
        DetectedHand {
            landmarks: vec![
                NormalizedLandmark {
                    x: value,
                    y: value,
                    z: 0.0,
                };
                21
            ],
            world: vec![
                WorldLandmark {
                    x: value,
                    y: -value,
                    z: 0.1,
                };
                21
            ],
            confidence: 0.9,
            handedness,
        }
    }

    #[test]
    fn last_hand_wins() {
        let mut landmark = HandLandmark::new();
        landmark.apply(&HandFrame {
            frame: frame(4),
            hands: vec![hand(0.1), hand_with(0.7, Handedness::Right)],
        });

        assert_eq!(landmark.landmark[0].x, 0.7);
        assert_eq!(landmark.handedness_label(), "Right");
        assert_eq!(landmark.capture.points.points()[0].x, 0.7);
        assert_eq!(landmark.hand.points().len(), 21);
    }

    #[test]
    fn no_hand_keeps_previous_result_but_updates_frame() {
        let mut landmark = HandLandmark::new();
        assert_eq!(landmark.handedness_label(), "No hand");
        landmark.apply(&HandFrame {
            frame: frame(4),
            hands: vec![hand(0.3)],
        });
        landmark.apply(&HandFrame {
            frame: frame(8),
            hands: Vec::new(),
        });

        assert_eq!(landmark.landmark.len(), 21);
        assert_eq!(landmark.capture.points.points().len(), 21);
        assert_eq!(landmark.capture.rect.texture().map(|f| f.width), Some(8));
    }

    #[test]
    fn table_rows_use_two_decimals() {
        let mut landmark = HandLandmark::new();
        landmark.apply(&HandFrame {
            frame: frame(4),
            hands: vec![hand(0.256)],
        });

        let rows = landmark.table_rows();
        assert_eq!(rows.len(), 21);
        assert_eq!(rows[3], ["3", "0.26", "-0.26", "0.10"].map(String::from));
        assert_eq!(TABLE_HEADERS, ["index", "x", "y", "z"]);
    }
}
