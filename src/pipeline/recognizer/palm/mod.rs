mod anchors;

use std::{cmp::Ordering, path::Path};

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::common::{HandRoi, Letterbox, PALM_INPUT_SIZE, letterbox_frame, upright_angle};
use crate::types::{Frame, PalmRegion};

pub use anchors::{NUM_ANCHORS, generate_anchors};

const PALM_KEYPOINTS: usize = 7;
const KEYPOINT_WRIST: usize = 0;
const KEYPOINT_MIDDLE_MCP: usize = 2;
const BOX_FEATURES: usize = 4 + PALM_KEYPOINTS * 2;

const ROI_SCALE: f32 = 2.6;
const ROI_SHIFT: f32 = 0.5;

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 2,
        }
    }
}

pub struct PalmDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;

        Ok(Self {
            session,
            anchors: generate_anchors(),
            cfg,
        })
    }

    /// Palms above the score threshold after NMS, best first.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = letterbox_frame(frame, PALM_INPUT_SIZE)?;
        let outputs = self
            .session
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run palm detector session")?;
        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected 2",
                outputs.len()
            ));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let feature_dim = boxes
            .shape()
            .last()
            .copied()
            .ok_or_else(|| anyhow!("palm box output has no dimensions"))?;
        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();

        decode_palms(
            &boxes,
            feature_dim,
            &scores,
            &self.anchors,
            &letterbox,
            &self.cfg,
        )
    }
}

/// Decodes raw regressor output. `boxes` holds `feature_dim` values per
/// anchor: box centre and size, then seven keypoints, all in input pixels
/// relative to the anchor.
pub fn decode_palms(
    boxes: &[f32],
    feature_dim: usize,
    scores: &[f32],
    anchors: &[[f32; 2]],
    letterbox: &Letterbox,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<PalmRegion>> {
    if feature_dim < BOX_FEATURES {
        return Err(anyhow!("palm box feature dimension too small: {feature_dim}"));
    }
    let count = anchors
        .len()
        .min(scores.len())
        .min(boxes.len() / feature_dim);
    if count < anchors.len() {
        log::warn!(
            "palm detector produced {count} anchors, expected {}",
            anchors.len()
        );
    }

    let input = PALM_INPUT_SIZE as f32;
    let extent = letterbox.orig_w.max(letterbox.orig_h) as f32;
    let to_image = |nx: f32, ny: f32| {
        (
            nx * extent - letterbox.pad_x / letterbox.scale,
            ny * extent - letterbox.pad_y / letterbox.scale,
        )
    };

    let mut candidates = Vec::new();
    for (idx, anchor) in anchors.iter().enumerate().take(count) {
        let score = sigmoid(scores[idx]);
        if score < cfg.score_threshold {
            continue;
        }

        let raw = &boxes[idx * feature_dim..idx * feature_dim + BOX_FEATURES];
        let cx = raw[0] / input + anchor[0];
        let cy = raw[1] / input + anchor[1];
        let hw = raw[2] / input / 2.0;
        let hh = raw[3] / input / 2.0;
        if hw <= 0.0 || hh <= 0.0 {
            continue;
        }

        let (x1, y1) = to_image(cx - hw, cy - hh);
        let (x2, y2) = to_image(cx + hw, cy + hh);
        let landmarks = raw[4..]
            .chunks_exact(2)
            .map(|kp| to_image(kp[0] / input + anchor[0], kp[1] / input + anchor[1]))
            .collect();

        candidates.push(PalmRegion {
            bbox: [x1, y1, x2, y2],
            landmarks,
            score,
        });
    }

    Ok(nms(candidates, cfg.nms_threshold, cfg.top_k))
}

/// Hand region for the landmark model: rotated so the fingers point up,
/// shifted from the palm towards the fingers and enlarged to cover them.
pub fn roi_from_palm(palm: &PalmRegion) -> HandRoi {
    let [x1, y1, x2, y2] = palm.bbox;
    let size = (x2 - x1).abs().max((y2 - y1).abs());
    let angle = match (
        palm.landmarks.get(KEYPOINT_WRIST),
        palm.landmarks.get(KEYPOINT_MIDDLE_MCP),
    ) {
        (Some(&wrist), Some(&mcp)) => upright_angle(wrist, mcp),
        _ => 0.0,
    };
    let (sin, cos) = angle.sin_cos();
    let shift = size * ROI_SHIFT;

    HandRoi {
        center: ((x1 + x2) * 0.5 + sin * shift, (y1 + y2) * 0.5 - cos * shift),
        side: size * ROI_SCALE,
        angle,
    }
}

fn nms(mut candidates: Vec<PalmRegion>, threshold: f32, top_k: usize) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if keep.len() >= top_k {
            break;
        }
        if keep.iter().all(|k| iou(&k.bbox, &candidate.bbox) < threshold) {
            keep.push(candidate);
        }
    }
    keep
}

pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn square_letterbox() -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 192,
            orig_h: 192,
        }
    }

    fn region(bbox: [f32; 4], score: f32) -> PalmRegion {
        PalmRegion {
            bbox,
            landmarks: Vec::new(),
            score,
        }
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert!(approx(iou(&a, &a), 1.0));
        assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
        assert!(approx(iou(&a, &[5.0, 0.0, 15.0, 10.0]), 50.0 / 150.0));
    }

    #[test]
    fn nms_keeps_best_of_overlapping_boxes() {
        let kept = nms(
            vec![
                region([0.0, 0.0, 10.0, 10.0], 0.6),
                region([1.0, 0.0, 11.0, 10.0], 0.9),
                region([50.0, 50.0, 60.0, 60.0], 0.7),
            ],
            0.3,
            5,
        );
        let scores: Vec<f32> = kept.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }

    #[test]
    fn nms_respects_top_k() {
        let kept = nms(
            vec![
                region([0.0, 0.0, 1.0, 1.0], 0.9),
                region([5.0, 5.0, 6.0, 6.0], 0.8),
            ],
            0.3,
            1,
        );
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn decodes_single_confident_anchor() {
        let anchors = generate_anchors();
        let mut boxes = vec![0.0_f32; NUM_ANCHORS * BOX_FEATURES];
        let mut scores = vec![-10.0_f32; NUM_ANCHORS];

        let hit = 24 * 12 * 2 + 12 * 2;
        scores[hit] = 5.0;
        boxes[hit * BOX_FEATURES + 2] = 38.4;
        boxes[hit * BOX_FEATURES + 3] = 38.4;

        let palms = decode_palms(
            &boxes,
            BOX_FEATURES,
            &scores,
            &anchors,
            &square_letterbox(),
            &PalmDetectorConfig::default(),
        )
        .unwrap();

        assert_eq!(palms.len(), 1);
        let [x1, y1, x2, y2] = palms[0].bbox;
        let centre = 192.0 * anchors[hit][0];
        assert!(approx((x1 + x2) * 0.5, centre));
        assert!(approx(x2 - x1, 38.4) && approx(y2 - y1, 38.4));
        assert_eq!(palms[0].landmarks.len(), PALM_KEYPOINTS);
    }

    #[test]
    fn short_feature_dim_is_rejected() {
        let result = decode_palms(
            &[0.0; 8],
            4,
            &[0.0; 2],
            &generate_anchors(),
            &square_letterbox(),
            &PalmDetectorConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn palm_roi_moves_towards_fingers() {
        let palm = PalmRegion {
            bbox: [40.0, 40.0, 60.0, 60.0],
            landmarks: vec![(50.0, 60.0), (0.0, 0.0), (70.0, 60.0)],
            score: 0.9,
        };
        let roi = roi_from_palm(&palm);

        // Wrist to knuckle points to +x, so the fingers are to the right.
        assert!(approx(roi.angle, FRAC_PI_2));
        assert!(approx(roi.center.0, 60.0) && approx(roi.center.1, 50.0));
        assert!(approx(roi.side, 52.0));
    }
}
