use egui::Pos2;
use image::Rgba;

use crate::raster::Raster;
use crate::render::compositor::BlendMode;

// ============================================================================
// STROKE INK
// ============================================================================

/// What a stroke deposits: a colour, or erasure of what is underneath.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ink {
    Color(Rgba<u8>),
    Erase,
}

impl Ink {
    pub fn blend_mode(&self) -> BlendMode {
        match self {
            Ink::Color(_) => BlendMode::Over,
            Ink::Erase => BlendMode::DestinationOut,
        }
    }

    /// Source pixel composited over every covered pixel. Erasing only looks
    /// at the alpha, so it uses opaque black.
    pub fn source_pixel(&self) -> Rgba<u8> {
        match self {
            Ink::Color(c) => *c,
            Ink::Erase => Rgba([0, 0, 0, 255]),
        }
    }
}

// ============================================================================
// GEOMETRY HELPERS
// ============================================================================

/// Stroke points are snapped to whole pixels before drawing.
#[inline]
pub fn floor_point(p: Pos2) -> (i64, i64) {
    (p.x.floor() as i64, p.y.floor() as i64)
}

/// Integer pen width, never below one pixel.
#[inline]
pub fn effective_width(width: f32) -> u32 {
    if width.is_finite() && width >= 1.0 {
        width.floor() as u32
    } else {
        1
    }
}

// ============================================================================
// COVERAGE MASK
// ============================================================================

/// Boolean coverage over a clipped sub-rectangle of the target raster.
///
/// A stroke first marks every pixel it touches, then composites once, so
/// overlapping stamps along the polyline never double-blend.
struct Coverage {
    x0: i64,
    y0: i64,
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Coverage {
    /// Region covering all `centers` grown by `radius`, clipped to `dims`.
    /// `None` when nothing of it lands on the raster.
    fn around(centers: &[(i64, i64)], radius: f32, dims: (u32, u32)) -> Option<Self> {
        let pad = radius.ceil() as i64 + 1;
        let min_x = centers.iter().map(|p| p.0).min()? - pad;
        let min_y = centers.iter().map(|p| p.1).min()? - pad;
        let max_x = centers.iter().map(|p| p.0).max()? + pad;
        let max_y = centers.iter().map(|p| p.1).max()? + pad;

        let x0 = min_x.max(0);
        let y0 = min_y.max(0);
        let x1 = (max_x + 1).min(dims.0 as i64);
        let y1 = (max_y + 1).min(dims.1 as i64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        let width = (x1 - x0) as usize;
        let height = (y1 - y0) as usize;
        Some(Self {
            x0,
            y0,
            width,
            height,
            bits: vec![false; width * height],
        })
    }

    /// Mark a hard-edged disc. A pixel is covered when its centre lies
    /// within `radius` of `(cx, cy)`.
    fn stamp(&mut self, cx: f32, cy: f32, radius: f32) {
        let r2 = radius * radius;
        let lx = ((cx - radius).floor() as i64).max(self.x0);
        let ly = ((cy - radius).floor() as i64).max(self.y0);
        let hx = ((cx + radius).ceil() as i64).min(self.x0 + self.width as i64 - 1);
        let hy = ((cy + radius).ceil() as i64).min(self.y0 + self.height as i64 - 1);
        for py in ly..=hy {
            let dy = py as f32 + 0.5 - cy;
            let row = (py - self.y0) as usize * self.width;
            for px in lx..=hx {
                let dx = px as f32 + 0.5 - cx;
                if dx * dx + dy * dy <= r2 {
                    self.bits[row + (px - self.x0) as usize] = true;
                }
            }
        }
    }

    /// Dense stepping along a segment: one stamp per pixel of travel.
    fn segment(&mut self, a: (i64, i64), b: (i64, i64), radius: f32) {
        // Stamp centres sit on pixel centres of the snapped endpoints.
        let (x0, y0) = (a.0 as f32 + 0.5, a.1 as f32 + 0.5);
        let (x1, y1) = (b.0 as f32 + 0.5, b.1 as f32 + 0.5);
        let dx = x1 - x0;
        let dy = y1 - y0;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance < 0.1 {
            self.stamp(x0, y0, radius);
            return;
        }

        let steps = distance.ceil() as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.stamp(x0 + dx * t, y0 + dy * t, radius);
        }
    }

    fn composite(&self, raster: &mut Raster, ink: Ink) -> usize {
        let src = ink.source_pixel();
        let mode = ink.blend_mode();
        let mut touched = 0;
        for (i, covered) in self.bits.iter().enumerate() {
            if !*covered {
                continue;
            }
            let x = self.x0 + (i % self.width) as i64;
            let y = self.y0 + (i / self.width) as i64;
            raster.blend_pixel_at(x, y, src, mode);
            touched += 1;
        }
        touched
    }
}

// ============================================================================
// POLYLINE RASTERIZER
// ============================================================================

/// Draw a round-capped, round-joined polyline through `points` and return the
/// number of pixels it covered. A single point draws one disc.
pub fn draw_polyline(raster: &mut Raster, points: &[Pos2], width: f32, ink: Ink) -> usize {
    let snapped: Vec<(i64, i64)> = points.iter().copied().map(floor_point).collect();
    let radius = effective_width(width) as f32 / 2.0;

    let Some(mut coverage) = Coverage::around(&snapped, radius, raster.dimensions()) else {
        return 0;
    };

    match snapped.as_slice() {
        [] => return 0,
        [only] => coverage.segment(*only, *only, radius),
        _ => {
            for pair in snapped.windows(2) {
                coverage.segment(pair[0], pair[1], radius);
            }
        }
    }

    coverage.composite(raster, ink)
}
