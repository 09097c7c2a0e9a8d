use super::{Canvas, Color, HAND_CONNECTIONS};
use crate::types::{Frame, NormalizedLandmark};

const LINE_COLOR: Color = [0, 255, 0, 255];
const POINT_COLOR: Color = [255, 0, 0, 255];

/// Latest camera frame shown behind the landmark overlay.
#[derive(Clone, Debug, Default)]
pub struct CaptureRect {
    texture: Option<Frame>,
}

impl CaptureRect {
    pub fn update_capture_texture(&mut self, frame: &Frame) {
        if frame.is_empty() {
            return;
        }
        self.texture = Some(frame.clone());
    }

    pub fn texture(&self) -> Option<&Frame> {
        self.texture.as_ref()
    }
}

#[derive(Clone, Debug, Default)]
pub struct CapturePoints {
    points: Vec<NormalizedLandmark>,
}

impl CapturePoints {
    pub fn update(&mut self, landmarks: &[NormalizedLandmark]) {
        self.points = landmarks.to_vec();
    }

    pub fn points(&self) -> &[NormalizedLandmark] {
        &self.points
    }

    fn to_pixels(&self, width: u32, height: u32) -> Vec<(f32, f32)> {
        self.points
            .iter()
            .map(|p| (p.x * width as f32, p.y * height as f32))
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct CaptureScene {
    pub rect: CaptureRect,
    pub points: CapturePoints,
}

impl CaptureScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_capture_texture(&mut self, frame: &Frame) {
        self.rect.update_capture_texture(frame);
    }

    /// The captured frame with the 2D skeleton drawn on top.
    pub fn render(&self) -> Option<Canvas> {
        let frame = self.rect.texture()?;
        let mut canvas = Canvas::from_frame(frame);
        let thickness = ((frame.width.min(frame.height) as f32) / 240.0).round().max(1.0) as i32;
        let points = self.points.to_pixels(frame.width, frame.height);
        canvas.draw_skeleton(&points, HAND_CONNECTIONS, LINE_COLOR, POINT_COLOR, thickness);
        Some(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn gray_frame(width: u32, height: u32) -> Frame {
        Frame {
            rgba: vec![128; (width * height * 4) as usize],
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn render_needs_a_frame() {
        assert!(CaptureScene::new().render().is_none());
    }

    #[test]
    fn empty_frames_keep_previous_texture() {
        let mut scene = CaptureScene::new();
        scene.update_capture_texture(&gray_frame(8, 8));
        scene.update_capture_texture(&gray_frame(0, 0));
        assert_eq!(scene.rect.texture().map(|f| f.width), Some(8));
    }

    #[test]
    fn overlay_uses_pixel_space() {
        let mut scene = CaptureScene::new();
        scene.update_capture_texture(&gray_frame(100, 50));
        let landmarks: Vec<NormalizedLandmark> = (0..21)
            .map(|_| NormalizedLandmark {
                x: 0.5,
                y: 0.5,
                z: 0.0,
            })
            .collect();
        scene.points.update(&landmarks);

        let canvas = scene.render().unwrap();
        assert_eq!((canvas.width, canvas.height), (100, 50));
        assert_eq!(canvas.pixel(50, 25), Some(POINT_COLOR));
        assert_eq!(canvas.pixel(0, 0), Some([128, 128, 128, 128]));
    }
}
