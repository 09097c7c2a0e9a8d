use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::{DynValue, Tensor};

use super::{
    EstimatorSettings, HandposeEngine,
    common::{self, HandRoi, LANDMARK_INPUT_SIZE},
    palm::{PalmDetector, PalmDetectorConfig, roi_from_palm},
};
use crate::types::{DetectedHand, Frame, Handedness, PalmRegion};

/// MediaPipe palm detector plus handpose estimator on ONNX Runtime. Hands
/// that stay confident are followed from their own landmarks, so palm
/// detection only runs while fewer than `max_num_hands` are tracked.
pub struct OrtEngine {
    handpose: Session,
    palm_detector: PalmDetector,
    settings: EstimatorSettings,
    tracked: Vec<HandRoi>,
}

struct Estimate {
    hand: DetectedHand,
    image_points: Vec<(f32, f32)>,
}

impl OrtEngine {
    pub fn new(
        handpose_model: &Path,
        palm_detector_model: &Path,
        settings: EstimatorSettings,
    ) -> Result<Self> {
        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(handpose_model)
            .with_context(|| {
                format!(
                    "failed to load handpose estimator from {}",
                    handpose_model.display()
                )
            })?;

        let palm_detector = PalmDetector::new(
            palm_detector_model,
            PalmDetectorConfig {
                score_threshold: settings.min_detection_confidence,
                top_k: settings.max_num_hands,
                ..PalmDetectorConfig::default()
            },
        )?;

        Ok(Self {
            handpose,
            palm_detector,
            settings,
            tracked: Vec::new(),
        })
    }

    fn estimate(&mut self, frame: &Frame, roi: &HandRoi) -> Result<Estimate> {
        let input = common::crop_roi(frame, roi, LANDMARK_INPUT_SIZE)?;
        let outputs = self
            .handpose
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run handpose estimator")?;
        if outputs.len() < 4 {
            return Err(anyhow!(
                "handpose estimator returned {} outputs, expected 4",
                outputs.len()
            ));
        }

        let raw = common::decode_triplets(&flatten(&outputs[0])?, "landmarks")?;
        let confidence = first_value(&outputs[1], "confidence")?;
        let handedness = first_value(&outputs[2], "handedness")?;
        let world_raw = common::decode_triplets(&flatten(&outputs[3])?, "world landmarks")?;

        let image_points = common::project_to_image(&raw, roi);
        let landmarks =
            common::normalize_landmarks(&raw, &image_points, roi, frame.width, frame.height);

        Ok(Estimate {
            hand: DetectedHand {
                landmarks,
                world: common::world_landmarks(&world_raw, roi),
                confidence: confidence.clamp(0.0, 1.0),
                handedness: Handedness::from_score(handedness),
            },
            image_points,
        })
    }
}

fn flatten(value: &DynValue) -> Result<Vec<f32>> {
    Ok(value
        .try_extract_array::<f32>()?
        .iter()
        .copied()
        .collect())
}

fn first_value(value: &DynValue, what: &str) -> Result<f32> {
    value
        .try_extract_array::<f32>()?
        .iter()
        .next()
        .copied()
        .ok_or_else(|| anyhow!("handpose {what} output is empty"))
}

/// Adds regions for palms that no tracked hand already covers, best palm
/// first, until `max_hands` regions exist.
pub(crate) fn add_detected_regions(
    regions: &mut Vec<HandRoi>,
    palms: &[PalmRegion],
    max_hands: usize,
) {
    for palm in palms {
        if regions.len() >= max_hands {
            break;
        }
        let roi = roi_from_palm(palm);
        if regions.iter().any(|tracked| tracked.overlaps(&roi)) {
            continue;
        }
        regions.push(roi);
    }
}

/// Estimates every region, skipping ones that fail or fall below
/// `min_confidence`. Returns the hands and the regions to follow next frame.
fn track_regions<F>(
    regions: Vec<HandRoi>,
    min_confidence: f32,
    mut estimate: F,
) -> (Vec<DetectedHand>, Vec<HandRoi>)
where
    F: FnMut(&HandRoi) -> Result<Estimate>,
{
    let mut hands = Vec::with_capacity(regions.len());
    let mut tracked = Vec::with_capacity(regions.len());
    for roi in regions {
        let estimate = match estimate(&roi) {
            Ok(estimate) => estimate,
            Err(err) => {
                log::warn!("hand landmark estimation failed for one region: {err:?}");
                continue;
            }
        };
        if estimate.hand.confidence < min_confidence {
            continue;
        }
        if let Some(next) = HandRoi::from_landmarks(&estimate.image_points) {
            tracked.push(next);
        }
        hands.push(estimate.hand);
    }
    (hands, tracked)
}

impl HandposeEngine for OrtEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<DetectedHand>> {
        let mut regions = std::mem::take(&mut self.tracked);
        if regions.len() < self.settings.max_num_hands {
            match self.palm_detector.detect(frame) {
                Ok(palms) => {
                    add_detected_regions(&mut regions, &palms, self.settings.max_num_hands)
                }
                Err(err) => log::warn!("palm detection failed: {err:?}"),
            }
        }

        let min_confidence = self.settings.min_tracking_confidence;
        let (hands, tracked) =
            track_regions(regions, min_confidence, |roi| self.estimate(frame, roi));
        self.tracked = tracked;
        Ok(hands)
    }
}
