use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::{pipeline::EstimatorSettings, playback::EasingCurve};

/// BVH motion viewer with optional live hand landmark capture.
#[derive(Debug, Parser)]
#[command(name = "humanbone-viewer", version, about)]
pub struct Args {
    /// BVH file to open at startup
    #[arg(value_name = "BVH")]
    pub bvh: Option<PathBuf>,

    /// Scale applied to the window and the viewport raster
    #[arg(long, default_value_t = 1.5)]
    pub gui_scale: f32,

    #[arg(long, default_value_t = 1024)]
    pub width: u32,

    #[arg(long, default_value_t = 768)]
    pub height: u32,

    /// Track hands from a camera and show their landmarks
    #[arg(long)]
    pub hands: bool,

    /// Camera index used with --hands
    #[arg(long, default_value_t = 0)]
    pub camera: u32,

    /// Where the ONNX models live or are downloaded to
    #[arg(long, default_value = "models")]
    pub model_dir: PathBuf,

    #[arg(long, default_value_t = 0.5)]
    pub min_detection_confidence: f32,

    #[arg(long, default_value_t = 0.5)]
    pub min_tracking_confidence: f32,

    #[arg(long, default_value_t = 2)]
    pub max_num_hands: usize,

    /// Restart playback after the last frame
    #[arg(long = "loop")]
    pub looping: bool,

    #[arg(long, value_enum, default_value_t = EasingCurve::InOutSine)]
    pub easing: EasingCurve,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("--gui-scale must be greater than 0, got {0}")]
    InvalidGuiScale(f32),
    #[error("window size must be non-zero, got {width}x{height}")]
    InvalidWindowSize { width: u32, height: u32 },
    #[error("--{name} must lie in [0, 1], got {value}")]
    ConfidenceOutOfRange { name: &'static str, value: f32 },
    #[error("--max-num-hands must be at least 1")]
    NoHands,
}

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub bvh: Option<PathBuf>,
    pub gui_scale: f32,
    pub window_size: (u32, u32),
    pub hands: bool,
    pub camera_index: u32,
    pub model_dir: PathBuf,
    pub estimator: EstimatorSettings,
    pub looping: bool,
    pub easing: EasingCurve,
}

impl ViewerConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        if !(args.gui_scale > 0.0 && args.gui_scale.is_finite()) {
            return Err(ConfigError::InvalidGuiScale(args.gui_scale));
        }
        if args.width == 0 || args.height == 0 {
            return Err(ConfigError::InvalidWindowSize {
                width: args.width,
                height: args.height,
            });
        }
        check_confidence("min-detection-confidence", args.min_detection_confidence)?;
        check_confidence("min-tracking-confidence", args.min_tracking_confidence)?;
        if args.max_num_hands == 0 {
            return Err(ConfigError::NoHands);
        }

        Ok(Self {
            bvh: args.bvh,
            gui_scale: args.gui_scale,
            window_size: (args.width, args.height),
            hands: args.hands,
            camera_index: args.camera,
            model_dir: args.model_dir,
            estimator: EstimatorSettings {
                min_detection_confidence: args.min_detection_confidence,
                min_tracking_confidence: args.min_tracking_confidence,
                max_num_hands: args.max_num_hands,
            },
            looping: args.looping,
            easing: args.easing,
        })
    }

    /// Window size in logical pixels after `gui_scale`.
    pub fn scaled_window_size(&self) -> (f32, f32) {
        (
            self.window_size.0 as f32 * self.gui_scale,
            self.window_size.1 as f32 * self.gui_scale,
        )
    }
}

fn check_confidence(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ConfidenceOutOfRange { name, value })
    }
}
