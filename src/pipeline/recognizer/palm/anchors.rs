//! SSD anchors for the 192 px palm detector.

use crate::pipeline::recognizer::common::PALM_INPUT_SIZE;

/// `(stride, anchors per cell)` after merging layers that share a stride.
const FEATURE_MAPS: &[(u32, usize)] = &[(8, 2), (16, 6)];

pub const NUM_ANCHORS: usize = 2016;

/// Normalized `[cx, cy]` anchor centres in row-major cell order. Anchor sizes
/// are fixed at 1, so only centres are kept.
pub fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for &(stride, per_cell) in FEATURE_MAPS {
        let grid = PALM_INPUT_SIZE.div_ceil(stride);
        for y in 0..grid {
            for x in 0..grid {
                let center = [
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                ];
                anchors.extend(std::iter::repeat_n(center, per_cell));
            }
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_count_matches_model_output() {
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn anchors_follow_grid_order() {
        let anchors = generate_anchors();
        let first = 0.5 / 24.0;
        assert_eq!(anchors[0], [first, first]);
        assert_eq!(anchors[1], [first, first]);
        assert_eq!(anchors[2], [1.5 / 24.0, first]);

        let coarse = 24 * 24 * 2;
        assert_eq!(anchors[coarse], [0.5 / 12.0, 0.5 / 12.0]);
        assert_eq!(anchors[NUM_ANCHORS - 1], [11.5 / 12.0, 11.5 / 12.0]);
    }
}
