use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, NormalizedLandmark, WorldLandmark};

pub const LANDMARK_INPUT_SIZE: u32 = 224;
pub const PALM_INPUT_SIZE: u32 = 192;
pub const NUM_LANDMARKS: usize = 21;

pub const WRIST: usize = 0;
pub const MIDDLE_FINGER_MCP: usize = 9;

/// Maps letterboxed model coordinates back to the source frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Square, rotated region of the source frame fed to the landmark model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandRoi {
    pub center: (f32, f32),
    pub side: f32,
    /// Radians; the crop's up direction points along `(sin, -cos)` in the image.
    pub angle: f32,
}

impl HandRoi {
    /// Crop-pixel coordinates to source-pixel coordinates, unclamped.
    pub fn to_image(&self, x: f32, y: f32, output_size: u32) -> (f32, f32) {
        let half = output_size as f32 / 2.0;
        let scale = self.side / output_size as f32;
        let dx = (x - half) * scale;
        let dy = (y - half) * scale;
        let (sin, cos) = self.angle.sin_cos();
        (
            self.center.0 + dx * cos - dy * sin,
            self.center.1 + dx * sin + dy * cos,
        )
    }

    /// Tracking region for the next frame: aligned wrist to middle knuckle and
    /// twice the landmark extent.
    pub fn from_landmarks(points: &[(f32, f32)]) -> Option<Self> {
        if points.len() <= MIDDLE_FINGER_MCP {
            return None;
        }
        let (min_x, max_x, min_y, max_y) = points.iter().fold(
            (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
            |acc, &(x, y)| (acc.0.min(x), acc.1.max(x), acc.2.min(y), acc.3.max(y)),
        );
        let extent = (max_x - min_x).max(max_y - min_y);
        if !extent.is_finite() || extent <= 0.0 {
            return None;
        }

        Some(Self {
            center: ((min_x + max_x) * 0.5, (min_y + max_y) * 0.5),
            side: extent * 2.0,
            angle: upright_angle(points[WRIST], points[MIDDLE_FINGER_MCP]),
        })
    }

    /// Two regions are the same hand when either centre lies inside the
    /// other's inscribed circle.
    pub fn overlaps(&self, other: &HandRoi) -> bool {
        let dx = self.center.0 - other.center.0;
        let dy = self.center.1 - other.center.1;
        let dist = (dx * dx + dy * dy).sqrt();
        dist < self.side.max(other.side) * 0.5
    }
}

/// Rotation that turns `from -> to` into the crop's up direction.
pub fn upright_angle(from: (f32, f32), to: (f32, f32)) -> f32 {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    dx.atan2(-dy)
}

fn check_frame(frame: &Frame) -> Result<()> {
    let expected = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {expected}",
            frame.rgba.len()
        ));
    }
    Ok(())
}

/// Aspect-preserving resize into a `target_size` square, padded with black,
/// as an NHWC tensor in `[0, 1]`.
pub fn letterbox_frame(frame: &Frame, target_size: u32) -> Result<(Array4<f32>, Letterbox)> {
    check_frame(frame)?;

    let scale = target_size as f32 / frame.width.max(frame.height) as f32;
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target_size);

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("fast resize failed")?;
    let resized = dst.into_vec();

    let pad_x = ((target_size - new_w) / 2) as usize;
    let pad_y = ((target_size - new_h) / 2) as usize;
    let side = target_size as usize;
    let mut rgb = vec![0.0_f32; side * side * 3];
    rgb.par_chunks_mut(side * 3)
        .enumerate()
        .for_each(|(row, dst_row)| {
            if row < pad_y || row >= pad_y + new_h as usize {
                return;
            }
            let src_row = &resized[(row - pad_y) * new_w as usize * 4..][..new_w as usize * 4];
            for (col, px) in src_row.chunks_exact(4).enumerate() {
                let out = &mut dst_row[(pad_x + col) * 3..][..3];
                out[0] = px[0] as f32 / 255.0;
                out[1] = px[1] as f32 / 255.0;
                out[2] = px[2] as f32 / 255.0;
            }
        });

    let input = Array4::from_shape_vec((1, side, side, 3), rgb)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    Ok((
        input,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            orig_w: frame.width,
            orig_h: frame.height,
        },
    ))
}

/// Bilinear rotated crop of `roi` as an NHWC tensor in `[0, 1]`.
pub fn crop_roi(frame: &Frame, roi: &HandRoi, output_size: u32) -> Result<Array4<f32>> {
    check_frame(frame)?;

    let size = output_size as usize;
    let mut data = vec![0.0_f32; size * size * 3];
    data.par_chunks_mut(size * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..size {
                let (sx, sy) = roi.to_image(x as f32 + 0.5, y as f32 + 0.5, output_size);
                row[x * 3..x * 3 + 3].copy_from_slice(&sample_rgb(frame, sx - 0.5, sy - 0.5));
            }
        });

    Array4::from_shape_vec((1, size, size, 3), data)
        .map_err(|err| anyhow!("failed to build crop tensor: {err}"))
}

fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }
    let (w, h) = (frame.width as i64, frame.height as i64);
    let fetch = |ix: i64, iy: i64| -> [f32; 3] {
        if ix < 0 || iy < 0 || ix >= w || iy >= h {
            return [0.0; 3];
        }
        let idx = ((iy * w + ix) as usize) * 4;
        match frame.rgba.get(idx..idx + 3) {
            Some(px) => [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ],
            None => [0.0; 3],
        }
    };

    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (ix, iy) = (x0 as i64, y0 as i64);
    let c00 = fetch(ix, iy);
    let c10 = fetch(ix + 1, iy);
    let c01 = fetch(ix, iy + 1);
    let c11 = fetch(ix + 1, iy + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    std::array::from_fn(|c| lerp(lerp(c00[c], c10[c], fx), lerp(c01[c], c11[c], fx), fy))
}

pub fn decode_triplets(flat: &[f32], what: &str) -> Result<Vec<[f32; 3]>> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected {what} length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }
    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}

/// Crop-space landmarks to source pixels.
pub fn project_to_image(raw: &[[f32; 3]], roi: &HandRoi) -> Vec<(f32, f32)> {
    raw.iter()
        .map(|&[x, y, _]| roi.to_image(x, y, LANDMARK_INPUT_SIZE))
        .collect()
}

/// Source pixels to `[0, 1]` by frame size; depth keeps the x scale.
pub fn normalize_landmarks(
    raw: &[[f32; 3]],
    image_points: &[(f32, f32)],
    roi: &HandRoi,
    width: u32,
    height: u32,
) -> Vec<NormalizedLandmark> {
    let crop_scale = roi.side / LANDMARK_INPUT_SIZE as f32;
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    raw.iter()
        .zip(image_points)
        .map(|(&[_, _, z], &(x, y))| NormalizedLandmark {
            x: x / w,
            y: y / h,
            z: z * crop_scale / w,
        })
        .collect()
}

/// World landmarks come out in the crop's orientation; undo the ROI rotation.
pub fn world_landmarks(raw: &[[f32; 3]], roi: &HandRoi) -> Vec<WorldLandmark> {
    let (sin, cos) = roi.angle.sin_cos();
    raw.iter()
        .map(|&[x, y, z]| WorldLandmark {
            x: x * cos - y * sin,
            y: x * sin + y * cos,
            z,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;
    use std::time::Instant;

    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let rgba = (0..width * height)
            .flat_map(|_| [rgb[0], rgb[1], rgb[2], 255])
            .collect();
        Frame {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn letterbox_pads_the_short_side() {
        let frame = solid_frame(40, 20, [255, 255, 255]);
        let (input, letterbox) = letterbox_frame(&frame, 8).unwrap();

        assert_eq!(input.shape(), &[1, 8, 8, 3]);
        assert!(approx(letterbox.scale, 0.2));
        assert_eq!((letterbox.pad_x, letterbox.pad_y), (0.0, 2.0));
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        assert!(approx(input[[0, 4, 4, 0]], 1.0));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let mut frame = solid_frame(4, 4, [0, 0, 0]);
        frame.rgba.pop();
        assert!(letterbox_frame(&frame, 8).is_err());
        let roi = HandRoi {
            center: (2.0, 2.0),
            side: 4.0,
            angle: 0.0,
        };
        assert!(crop_roi(&frame, &roi, 4).is_err());
    }

    #[test]
    fn unrotated_roi_maps_crop_corners() {
        let roi = HandRoi {
            center: (100.0, 50.0),
            side: 448.0,
            angle: 0.0,
        };
        let (x, y) = roi.to_image(0.0, 0.0, LANDMARK_INPUT_SIZE);
        assert!(approx(x, -124.0) && approx(y, -174.0));
        let (x, y) = roi.to_image(112.0, 112.0, LANDMARK_INPUT_SIZE);
        assert!(approx(x, 100.0) && approx(y, 50.0));
    }

    #[test]
    fn quarter_turn_roi_rotates_crop_up_to_image_right() {
        let roi = HandRoi {
            center: (0.0, 0.0),
            side: 224.0,
            angle: FRAC_PI_2,
        };
        // A point above the crop centre lands to the right in the image.
        let (x, y) = roi.to_image(112.0, 12.0, LANDMARK_INPUT_SIZE);
        assert!(approx(x, 100.0) && approx(y, 0.0));
    }

    #[test]
    fn upright_angle_points_crop_up_along_the_hand() {
        assert!(approx(upright_angle((0.0, 10.0), (0.0, 0.0)), 0.0));
        assert!(approx(upright_angle((0.0, 0.0), (10.0, 0.0)), FRAC_PI_2));
    }

    #[test]
    fn roi_from_landmarks_doubles_the_extent() {
        let mut points = vec![(50.0, 100.0); NUM_LANDMARKS];
        points[MIDDLE_FINGER_MCP] = (50.0, 60.0);
        points[12] = (70.0, 40.0);
        let roi = HandRoi::from_landmarks(&points).unwrap();

        assert!(approx(roi.side, 120.0));
        assert!(approx(roi.center.0, 60.0) && approx(roi.center.1, 70.0));
        assert!(approx(roi.angle, 0.0));
    }

    #[test]
    fn degenerate_landmarks_give_no_roi() {
        assert!(HandRoi::from_landmarks(&[(1.0, 1.0); NUM_LANDMARKS]).is_none());
        assert!(HandRoi::from_landmarks(&[(1.0, 1.0); 3]).is_none());
    }

    #[test]
    fn overlap_uses_the_larger_region() {
        let a = HandRoi {
            center: (0.0, 0.0),
            side: 100.0,
            angle: 0.0,
        };
        let near = HandRoi {
            center: (30.0, 0.0),
            ..a
        };
        let far = HandRoi {
            center: (80.0, 0.0),
            ..a
        };
        assert!(a.overlaps(&near));
        assert!(!a.overlaps(&far));
    }

    #[test]
    fn crop_of_solid_frame_is_solid() {
        let frame = solid_frame(16, 16, [255, 0, 0]);
        let roi = HandRoi {
            center: (8.0, 8.0),
            side: 8.0,
            angle: 0.3,
        };
        let crop = crop_roi(&frame, &roi, 4).unwrap();
        assert_eq!(crop.shape(), &[1, 4, 4, 3]);
        assert!(crop.iter().step_by(3).all(|&r| approx(r, 1.0)));
    }

    #[test]
    fn normalization_divides_by_frame_size() {
        let roi = HandRoi {
            center: (320.0, 240.0),
            side: 448.0,
            angle: 0.0,
        };
        let raw = vec![[112.0, 112.0, 10.0]; NUM_LANDMARKS];
        let image = project_to_image(&raw, &roi);
        let normalized = normalize_landmarks(&raw, &image, &roi, 640, 480);

        assert!(approx(normalized[0].x, 0.5));
        assert!(approx(normalized[0].y, 0.5));
        assert!(approx(normalized[0].z, 20.0 / 640.0));
    }

    #[test]
    fn world_landmarks_undo_roi_rotation() {
        let roi = HandRoi {
            center: (0.0, 0.0),
            side: 1.0,
            angle: FRAC_PI_2,
        };
        let world = world_landmarks(&[[0.0, -0.1, 0.02]], &roi);
        assert!(approx(world[0].x, 0.1) && approx(world[0].y, 0.0));
        assert!(approx(world[0].z, 0.02));
    }

    #[test]
    fn short_model_output_is_an_error() {
        assert!(decode_triplets(&[0.0; 10], "landmarks").is_err());
        assert_eq!(decode_triplets(&[0.0; 64], "landmarks").unwrap().len(), 21);
    }
}
