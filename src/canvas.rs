use egui::{Pos2, Rect, Vec2};

// ============================================================================
// VIEW TRANSFORM – zoom / pan and screen ↔ image conversions
// ============================================================================

pub const MIN_ZOOM: f32 = 0.01;
pub const MAX_ZOOM: f32 = 100.0;

/// Step factors used by the wheel and the zoom buttons.
pub const ZOOM_IN_STEP: f32 = 1.1;
pub const ZOOM_OUT_STEP: f32 = 0.9;

/// Zoom and pan of the drawing surface.
///
/// `pan` is measured in image pixels (unscaled); on screen it shifts the
/// image by `pan * zoom`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub zoom: f32,
    pub pan: Vec2,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl ViewTransform {
    pub fn new(zoom: f32) -> Self {
        Self {
            zoom: if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 },
            pan: Vec2::ZERO,
        }
    }

    /// Multiply the zoom by `factor`, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn zoom_by(&mut self, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// On-screen rectangle of an image of `image_size` pixels inside
    /// `viewport`: centred, scaled by zoom, then offset by the pan.
    pub fn image_rect(&self, viewport: Rect, image_size: Vec2) -> Rect {
        let center = viewport.center() + self.pan * self.zoom;
        Rect::from_center_size(center, image_size * self.zoom)
    }

    /// Converts a screen position into (sub-pixel) image coordinates.
    /// `canvas_bounds` is the image's on-screen rect and already reflects the
    /// pan, so only the origin and the zoom take part.
    pub fn screen_to_image(&self, screen_pos: Pos2, canvas_bounds: Rect) -> Pos2 {
        screen_to_image(screen_pos, canvas_bounds, self)
    }

    /// Inverse of [`ViewTransform::screen_to_image`].
    pub fn image_to_screen(&self, image_pos: Pos2, canvas_bounds: Rect) -> Pos2 {
        canvas_bounds.min + image_pos.to_vec2() * self.zoom
    }
}

/// Free-function form of the screen → image mapping.
pub fn screen_to_image(screen_pos: Pos2, canvas_bounds: Rect, transform: &ViewTransform) -> Pos2 {
    let rel = screen_pos - canvas_bounds.min;
    Pos2::new(rel.x / transform.zoom, rel.y / transform.zoom)
}

// ============================================================================
// DRAG TRACKING – pan from a drag-start snapshot
// ============================================================================

/// Pointer drag in progress. The pan at drag start is snapshotted so each
/// move recomputes the pan from scratch instead of accumulating per-frame
/// deltas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragStatus {
    pub start: Pos2,
    pub current: Pos2,
    pub original_pan: Vec2,
}

impl DragStatus {
    pub fn begin(start: Pos2, transform: &ViewTransform) -> Self {
        Self {
            start,
            current: start,
            original_pan: transform.pan,
        }
    }

    pub fn update(&mut self, current: Pos2) {
        self.current = current;
    }

    /// Pan implied by the drag so far.
    pub fn panned(&self, zoom: f32) -> Vec2 {
        self.original_pan + (self.current - self.start) / zoom
    }

    /// Screen-space rectangle spanned by the drag (for the selection overlay).
    pub fn screen_rect(&self) -> Rect {
        Rect::from_two_pos(self.start, self.current)
    }
}

// ============================================================================
// SELECTION BOX – drag endpoints → clamped integer box in image space
// ============================================================================

/// Axis-aligned box in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBox {
    pub x_min: u32,
    pub y_min: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelBox {
    pub fn x_max(&self) -> u32 {
        self.x_min + self.width
    }

    pub fn y_max(&self) -> u32 {
        self.y_min + self.height
    }
}

/// Image-space box covered by a drag from `drag_start` to `drag_current`.
///
/// Both endpoints are converted to image space, each coordinate is clamped
/// into `[0, target_dims)` and floored, then min/max form the box.
pub fn bounding_box(
    drag_start: Pos2,
    drag_current: Pos2,
    canvas_bounds: Rect,
    transform: &ViewTransform,
    target_dims: (u32, u32),
) -> PixelBox {
    let a = screen_to_image(drag_start, canvas_bounds, transform);
    let b = screen_to_image(drag_current, canvas_bounds, transform);

    fn clamp_floor(v: f32, dim: u32) -> u32 {
        if dim == 0 || !v.is_finite() {
            return 0;
        }
        let v = v.max(0.0).floor() as u32;
        v.min(dim - 1)
    }

    let (w, h) = target_dims;
    let ax = clamp_floor(a.x, w);
    let bx = clamp_floor(b.x, w);
    let ay = clamp_floor(a.y, h);
    let by = clamp_floor(b.y, h);

    let x_min = ax.min(bx);
    let y_min = ay.min(by);
    PixelBox {
        x_min,
        y_min,
        width: ax.max(bx) - x_min,
        height: ay.max(by) - y_min,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Rect {
        Rect::from_min_size(Pos2::new(100.0, 50.0), Vec2::new(400.0, 300.0))
    }

    #[test]
    fn screen_delta_scales_by_inverse_zoom() {
        for zoom in [0.125_f32, 0.25, 0.5, 1.0, 2.0, 4.0] {
            let t = ViewTransform::new(zoom);
            let d = 40.0;
            let p0 = t.screen_to_image(Pos2::new(120.0, 70.0), bounds());
            let p1 = t.screen_to_image(Pos2::new(120.0 + d, 70.0 + d), bounds());
            assert_eq!(p1.x - p0.x, d / zoom);
            assert_eq!(p1.y - p0.y, d / zoom);
        }
    }

    #[test]
    fn canvas_origin_maps_to_image_origin() {
        let t = ViewTransform::new(3.0);
        assert_eq!(t.screen_to_image(bounds().min, bounds()), Pos2::ZERO);
    }

    #[test]
    fn image_to_screen_inverts_screen_to_image() {
        let t = ViewTransform::new(2.0);
        let img = Pos2::new(12.0, 7.5);
        let screen = t.image_to_screen(img, bounds());
        assert_eq!(t.screen_to_image(screen, bounds()), img);
    }

    #[test]
    fn zoom_steps_are_multiplicative_and_clamped() {
        let mut t = ViewTransform::new(1.0);
        t.zoom_by(ZOOM_IN_STEP);
        t.zoom_by(ZOOM_IN_STEP);
        assert!((t.zoom - 1.21).abs() < 1e-6);
        for _ in 0..200 {
            t.zoom_by(ZOOM_OUT_STEP);
        }
        assert_eq!(t.zoom, MIN_ZOOM);
    }

    #[test]
    fn drag_pan_is_relative_to_snapshot() {
        let mut t = ViewTransform::new(2.0);
        t.pan = Vec2::new(5.0, -5.0);
        let mut drag = DragStatus::begin(Pos2::new(10.0, 10.0), &t);
        drag.update(Pos2::new(30.0, 0.0));
        drag.update(Pos2::new(50.0, 30.0));
        assert_eq!(drag.panned(t.zoom), Vec2::new(25.0, 5.0));
    }

    #[test]
    fn image_rect_follows_pan_and_zoom() {
        let mut t = ViewTransform::new(2.0);
        t.pan = Vec2::new(10.0, 0.0);
        let viewport = Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 100.0));
        let r = t.image_rect(viewport, Vec2::new(50.0, 20.0));
        assert_eq!(r.size(), Vec2::new(100.0, 40.0));
        assert_eq!(r.center(), Pos2::new(120.0, 50.0));
    }

    #[test]
    fn bounding_box_orders_and_clamps_endpoints() {
        let t = ViewTransform::new(0.5);
        let b = bounds();
        // Drag from bottom-right (beyond the image) to a point inside.
        let start = Pos2::new(b.min.x + 600.0, b.min.y + 700.0);
        let current = Pos2::new(b.min.x + 20.0, b.min.y + 30.0);
        let bx = bounding_box(start, current, b, &t, (800, 600));
        assert_eq!(bx.x_min, 40);
        assert_eq!(bx.y_min, 60);
        assert_eq!(bx.x_max(), 800 - 1);
        assert_eq!(bx.y_max(), 600 - 1);
    }

    #[test]
    fn bounding_box_clamps_negative_coordinates_to_zero() {
        let t = ViewTransform::new(1.0);
        let b = bounds();
        let bx = bounding_box(
            Pos2::new(b.min.x - 30.0, b.min.y - 30.0),
            Pos2::new(b.min.x + 70.5, b.min.y + 80.9),
            b,
            &t,
            (400, 300),
        );
        assert_eq!(bx, PixelBox { x_min: 0, y_min: 0, width: 70, height: 80 });
    }
}
