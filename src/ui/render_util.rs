use std::sync::Arc;

use gpui::RenderImage;
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::scene::Canvas;

/// Uploads a finished raster as a GPUI image. GPUI samples BGRA.
pub(super) fn canvas_to_image(canvas: &Canvas) -> Option<Arc<RenderImage>> {
    if canvas.width == 0 || canvas.height == 0 {
        return None;
    }
    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
        canvas.width,
        canvas.height,
        rgba_to_bgra(&canvas.rgba),
    )?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}

fn rgba_to_bgra(rgba: &[u8]) -> Vec<u8> {
    let mut out = rgba.to_vec();
    for px in out.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_red_and_blue() {
        assert_eq!(rgba_to_bgra(&[1, 2, 3, 4, 5, 6, 7, 8]), vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn empty_canvas_has_no_image() {
        assert!(canvas_to_image(&Canvas::new(0, 0)).is_none());
    }
}
