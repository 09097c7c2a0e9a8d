mod common;
mod ort;
mod palm;

use std::{
    path::{Path, PathBuf},
    thread,
};

use crossbeam_channel::{Receiver, Sender, TrySendError};

pub use self::ort::OrtEngine;
use crate::{
    model_download::{ModelKind, ensure_model_ready},
    types::{DetectedHand, Frame, HandFrame},
};

pub trait HandposeEngine: Send + 'static {
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Vec<DetectedHand>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct EstimatorSettings {
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub max_num_hands: usize,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            max_num_hands: 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EstimatorBackend {
    pub model_dir: PathBuf,
    pub settings: EstimatorSettings,
}

impl EstimatorBackend {
    pub fn new(model_dir: impl AsRef<Path>, settings: EstimatorSettings) -> Self {
        Self {
            model_dir: model_dir.as_ref().to_path_buf(),
            settings,
        }
    }

    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.model_dir.join(kind.file_name())
    }

    pub fn label(&self) -> &'static str {
        "ort"
    }
}

/// Runs `engine` on the newest pending frame until the frame channel closes
/// or nobody listens for results.
pub fn run_worker_loop<E: HandposeEngine>(
    mut engine: E,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<HandFrame>,
) {
    while let Some(frame) = recv_latest_frame(&frame_rx) {
        if frame.is_empty() {
            log::warn!("ignoring empty camera frame");
            continue;
        }

        let hands = match engine.infer(&frame) {
            Ok(hands) => hands,
            Err(err) => {
                log::warn!("hand landmark inference failed: {err:?}");
                continue;
            }
        };

        match result_tx.try_send(HandFrame { frame, hands }) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
    log::debug!("hand landmark worker stopped");
}

fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

/// Loads the models (downloading any that are missing) and runs the
/// estimator on its own thread.
pub fn start_estimator(
    backend: EstimatorBackend,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<HandFrame>,
) -> thread::JoinHandle<()> {
    log::info!("starting hand landmark backend: {}", backend.label());

    thread::spawn(move || {
        let handpose_path = backend.model_path(ModelKind::HandposeEstimator);
        let palm_path = backend.model_path(ModelKind::PalmDetector);

        for (kind, path) in [
            (ModelKind::HandposeEstimator, &handpose_path),
            (ModelKind::PalmDetector, &palm_path),
        ] {
            if let Err(err) = ensure_model_ready(kind, path, |_| {}) {
                log::error!(
                    "failed to prepare {} model at {}: {err:?}",
                    kind.label(),
                    path.display()
                );
                return;
            }
        }

        let engine = match OrtEngine::new(&handpose_path, &palm_path, backend.settings.clone()) {
            Ok(engine) => engine,
            Err(err) => {
                log::error!("failed to load ORT hand landmark models: {err:?}");
                return;
            }
        };
        log::info!(
            "hand landmark estimator ready using {} and {}",
            handpose_path.display(),
            palm_path.display()
        );

        run_worker_loop(engine, frame_rx, result_tx);
    })
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use crossbeam_channel::{bounded, unbounded};

    use super::*;
    use crate::types::{Handedness, NormalizedLandmark, WorldLandmark};

    /// Reports one hand per frame, tagging it with the frame width.
    struct FakeEngine {
        fail_on_width: Option<u32>,
    }

    impl HandposeEngine for FakeEngine {
        fn infer(&mut self, frame: &Frame) -> anyhow::Result<Vec<DetectedHand>> {
            if Some(frame.width) == self.fail_on_width {
                anyhow::bail!("simulated failure");
            }
            Ok(vec![DetectedHand {
                landmarks: vec![NormalizedLandmark::default(); 21],
                world: vec![WorldLandmark::default(); 21],
                confidence: frame.width as f32,
                handedness: Handedness::Right,
            }])
        }
    }

    fn frame(width: u32) -> Frame {
        Frame {
            rgba: vec![0; width as usize * 4],
            width,
            height: 1,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn latest_frame_wins() {
        let (tx, rx) = unbounded();
        tx.send(frame(1)).unwrap();
        tx.send(frame(2)).unwrap();
        tx.send(frame(3)).unwrap();
        assert_eq!(recv_latest_frame(&rx).map(|f| f.width), Some(3));
    }

    #[test]
    fn worker_skips_empty_and_failed_frames() {
        let (frame_tx, frame_rx) = bounded(1);
        let (result_tx, result_rx) = unbounded();
        let worker = thread::spawn(move || {
            run_worker_loop(
                FakeEngine {
                    fail_on_width: Some(2),
                },
                frame_rx,
                result_tx,
            )
        });

        let mut empty = frame(4);
        empty.rgba.clear();
        for f in [empty, frame(2), frame(5)] {
            frame_tx.send(f).unwrap();
        }
        drop(frame_tx);
        worker.join().unwrap();

        let results: Vec<HandFrame> = result_rx.try_iter().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].frame.width, 5);
        assert_eq!(results[0].hands.len(), 1);
        assert_eq!(results[0].hands[0].confidence, 5.0);
    }

    #[test]
    fn worker_stops_when_results_are_dropped() {
        let (frame_tx, frame_rx) = bounded(1);
        let (result_tx, result_rx) = bounded(1);
        drop(result_rx);
        let worker = thread::spawn(move || {
            run_worker_loop(FakeEngine { fail_on_width: None }, frame_rx, result_tx)
        });

        frame_tx.send(frame(1)).unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn model_paths_live_in_model_dir() {
        let backend = EstimatorBackend::new("weights", EstimatorSettings::default());
        assert_eq!(
            backend.model_path(ModelKind::PalmDetector),
            Path::new("weights").join(ModelKind::PalmDetector.file_name())
        );
    }
}
