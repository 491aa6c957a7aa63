use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::render::compositor::{BlendMode, blend_pixel};

pub use crate::render::compositor::TRANSPARENT;

// ============================================================================
// RASTER – owned RGBA8 pixel buffer shared by every part of the engine
// ============================================================================

/// A flat, row-major RGBA8 pixel buffer.
///
/// Every clone owns its pixels outright, so a checkpoint taken with `clone()`
/// lives exactly as long as the history entry holding it.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    pixels: RgbaImage,
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl Default for Raster {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl Raster {
    // ---- construction -------------------------------------------------------

    /// Fully transparent raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, color),
        }
    }

    pub fn from_rgba_image(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    // ---- accessors ----------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_rgba_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Bytes held by the pixel buffer.
    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len()
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width() as i64 && y < self.height() as i64
    }

    // ---- pixel access -------------------------------------------------------

    /// Read a pixel; out-of-bounds reads are transparent.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        if x >= self.width() || y >= self.height() {
            return TRANSPARENT;
        }
        *self.pixels.get_pixel(x, y)
    }

    /// Signed-coordinate read, `None` outside the raster.
    #[inline]
    pub fn pixel_at(&self, x: i64, y: i64) -> Option<Rgba<u8>> {
        if self.contains(x, y) {
            Some(*self.pixels.get_pixel(x as u32, y as u32))
        } else {
            None
        }
    }

    /// Write a pixel; out-of-bounds writes are ignored.
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x < self.width() && y < self.height() {
            self.pixels.put_pixel(x, y, pixel);
        }
    }

    /// Composite a single pixel at signed coordinates.
    #[inline]
    pub fn blend_pixel_at(&mut self, x: i64, y: i64, src: Rgba<u8>, mode: BlendMode) {
        if !self.contains(x, y) {
            return;
        }
        let dst = self.pixels.get_pixel_mut(x as u32, y as u32);
        *dst = blend_pixel(*dst, src, mode);
    }

    // ---- bulk operations ----------------------------------------------------

    /// Make every pixel transparent.
    pub fn clear(&mut self) {
        self.fill(TRANSPARENT);
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = color;
        }
    }

    /// Overwrite a rectangle (clipped to the raster) with `color`.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Rgba<u8>) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w as i64).min(self.width() as i64);
        let y1 = (y + h as i64).min(self.height() as i64);
        for py in y0..y1 {
            for px in x0..x1 {
                self.pixels.put_pixel(px as u32, py as u32, color);
            }
        }
    }

    /// Copy a `w × h` region starting at `(x, y)`. Parts of the region outside
    /// the raster come back transparent.
    pub fn crop(&self, x: i64, y: i64, w: u32, h: u32) -> Raster {
        let mut out = Raster::new(w, h);
        out.blit(self, -x, -y, BlendMode::Copy);
        out
    }

    /// Same pixels anchored top-left in a `w × h` raster (crops or pads with
    /// transparency).
    pub fn fitted_to(&self, w: u32, h: u32) -> Raster {
        if self.dimensions() == (w, h) {
            return self.clone();
        }
        self.crop(0, 0, w, h)
    }

    /// Composite `src` with its top-left corner at `(dst_x, dst_y)`.
    /// Rows are processed in parallel.
    pub fn blit(&mut self, src: &Raster, dst_x: i64, dst_y: i64, mode: BlendMode) {
        let dst_w = self.width() as i64;
        let dst_h = self.height() as i64;
        let src_w = src.width() as i64;
        let src_h = src.height() as i64;

        // Destination-space overlap.
        let x0 = dst_x.max(0);
        let y0 = dst_y.max(0);
        let x1 = (dst_x + src_w).min(dst_w);
        let y1 = (dst_y + src_h).min(dst_h);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let row_bytes = dst_w as usize * 4;
        let src_raw = src.as_raw();
        let src_row_bytes = src_w as usize * 4;

        let rows: &mut [u8] = &mut self.pixels;
        rows.par_chunks_mut(row_bytes)
            .enumerate()
            .skip(y0 as usize)
            .take((y1 - y0) as usize)
            .for_each(|(gy, row)| {
                let sy = (gy as i64 - dst_y) as usize;
                let src_row = &src_raw[sy * src_row_bytes..(sy + 1) * src_row_bytes];
                for gx in x0..x1 {
                    let sx = (gx - dst_x) as usize;
                    let s = &src_row[sx * 4..sx * 4 + 4];
                    let d = &mut row[gx as usize * 4..gx as usize * 4 + 4];
                    let out = blend_pixel(
                        Rgba([d[0], d[1], d[2], d[3]]),
                        Rgba([s[0], s[1], s[2], s[3]]),
                        mode,
                    );
                    d.copy_from_slice(&out.0);
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

    #[test]
    fn new_raster_is_transparent() {
        let r = Raster::new(4, 3);
        assert_eq!(r.dimensions(), (4, 3));
        assert!(r.as_raw().iter().all(|b| *b == 0));
    }

    #[test]
    fn out_of_bounds_reads_and_writes_are_harmless() {
        let mut r = Raster::new(2, 2);
        r.put_pixel(5, 5, RED);
        assert_eq!(r.get_pixel(5, 5), TRANSPARENT);
        assert_eq!(r.pixel_at(-1, 0), None);
        assert_eq!(r.pixel_at(1, 1), Some(TRANSPARENT));
    }

    #[test]
    fn crop_pads_outside_region_with_transparency() {
        let r = Raster::new_filled(4, 4, RED);
        let c = r.crop(2, 2, 4, 4);
        assert_eq!(c.dimensions(), (4, 4));
        assert_eq!(c.get_pixel(0, 0), RED);
        assert_eq!(c.get_pixel(1, 1), RED);
        assert_eq!(c.get_pixel(2, 2), TRANSPARENT);
    }

    #[test]
    fn blit_clips_to_destination() {
        let mut dst = Raster::new(5, 5);
        let src = Raster::new_filled(3, 3, GREEN);
        dst.blit(&src, 3, -1, BlendMode::Over);
        assert_eq!(dst.get_pixel(3, 0), GREEN);
        assert_eq!(dst.get_pixel(4, 1), GREEN);
        assert_eq!(dst.get_pixel(4, 2), TRANSPARENT);
        assert_eq!(dst.get_pixel(2, 0), TRANSPARENT);
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut r = Raster::new(3, 3);
        r.fill_rect(-1, -1, 3, 3, RED);
        assert_eq!(r.get_pixel(0, 0), RED);
        assert_eq!(r.get_pixel(1, 1), RED);
        assert_eq!(r.get_pixel(2, 2), TRANSPARENT);
    }

    #[test]
    fn fitted_to_pads_and_crops() {
        let r = Raster::new_filled(2, 2, RED);
        let bigger = r.fitted_to(3, 1);
        assert_eq!(bigger.dimensions(), (3, 1));
        assert_eq!(bigger.get_pixel(1, 0), RED);
        assert_eq!(bigger.get_pixel(2, 0), TRANSPARENT);
    }
}
