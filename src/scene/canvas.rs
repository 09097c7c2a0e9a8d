use crate::types::Frame;

pub type Color = [u8; 4];

/// Converts a `0.0..=1.0` RGBA tuple to an opaque byte color.
pub fn color_from_f32(rgba: (f32, f32, f32, f32)) -> Color {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_byte(rgba.0), to_byte(rgba.1), to_byte(rgba.2), 255]
}

/// RGBA8 raster target.
#[derive(Clone, Debug)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            rgba: frame.rgba.clone(),
        }
    }

    pub fn clear(&mut self, color: Color) {
        for px in self.rgba.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) as usize) * 4;
        let px = self.rgba.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn put_pixel(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 {
            return;
        }
        let (ux, uy) = (x as u32, y as u32);
        if ux >= self.width || uy >= self.height {
            return;
        }
        let idx = ((uy * self.width + ux) as usize) * 4;
        if idx + 3 < self.rgba.len() {
            self.rgba[idx..idx + 4].copy_from_slice(&color);
        }
    }

    pub fn draw_line(&mut self, p0: (f32, f32), p1: (f32, f32), color: Color, thickness: i32) {
        let radius = (thickness.max(1) - 1) / 2;
        let margin = radius as f32 + 1.0;
        let bounds = (
            -margin,
            -margin,
            self.width as f32 + margin,
            self.height as f32 + margin,
        );
        let Some((p0, p1)) = clip_segment(p0, p1, bounds) else {
            return;
        };

        let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
        let (x1, y1) = (p1.0 as i32, p1.1 as i32);
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.put_pixel(x0, y0, color);
            if radius > 0 {
                for ox in -radius..=radius {
                    for oy in -radius..=radius {
                        if ox == 0 && oy == 0 {
                            continue;
                        }
                        if ox.abs() + oy.abs() <= radius {
                            self.put_pixel(x0 + ox, y0 + oy, color);
                        }
                    }
                }
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    pub fn draw_circle(&mut self, center: (i32, i32), radius: i32, color: Color) {
        let (cx, cy) = center;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// Lines for `connections` between `points`, then a dot on every point.
    pub fn draw_skeleton(
        &mut self,
        points: &[(f32, f32)],
        connections: &[(usize, usize)],
        line_color: Color,
        point_color: Color,
        thickness: i32,
    ) {
        if points.len() < 2 {
            return;
        }
        for &(a, b) in connections {
            if let (Some(pa), Some(pb)) = (points.get(a), points.get(b)) {
                self.draw_line(*pa, *pb, line_color, thickness);
            }
        }

        let point_radius = (thickness / 2).max(2) + 1;
        for &(x, y) in points {
            self.draw_circle((x as i32, y as i32), point_radius, point_color);
        }
    }
}

/// Liang-Barsky clip of `p0 -> p1` against `(min_x, min_y, max_x, max_y)`.
/// `None` when the segment misses the box or has a non-finite endpoint.
fn clip_segment(
    p0: (f32, f32),
    p1: (f32, f32),
    (min_x, min_y, max_x, max_y): (f32, f32, f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    if !(p0.0.is_finite() && p0.1.is_finite() && p1.0.is_finite() && p1.1.is_finite()) {
        return None;
    }
    // f64 keeps the clipped endpoints exact for far-away inputs.
    let (x0, y0) = (p0.0 as f64, p0.1 as f64);
    let (dx, dy) = (p1.0 as f64 - x0, p1.1 as f64 - y0);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [
        (-dx, x0 - min_x as f64),
        (dx, max_x as f64 - x0),
        (-dy, y0 - min_y as f64),
        (dy, max_y as f64 - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    let at = |t: f64| ((x0 + t * dx) as f32, (y0 + t * dy) as f32);
    Some((at(t0), at(t1)))
}
