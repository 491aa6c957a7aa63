// ============================================================================
// RENDER ENGINE – replays operations onto the annotation raster
// ============================================================================

use crate::components::history::{History, Operation};
use crate::ops::flood_fill::flood_fill;
use crate::ops::strokes::draw_polyline;
use crate::raster::Raster;
use crate::render::compositor::BlendMode;

/// Draw a single operation on top of `raster`.
pub fn render_operation(raster: &mut Raster, op: &Operation) {
    match op {
        Operation::Stroke {
            ink, width, points, ..
        } => {
            draw_polyline(raster, points, *width, *ink);
        }
        Operation::ScanlineFill { color, seed } => {
            // The fill works on its own copy; its output replaces the canvas.
            let outcome = flood_fill(raster, *seed, *color);
            if outcome.pixels_filled > 0 {
                raster.blit(&outcome.raster, 0, 0, BlendMode::Copy);
            }
        }
        Operation::PaintFillPatch { anchor, result } => {
            raster.blit(result, anchor.0, anchor.1, BlendMode::Over);
        }
    }
}

/// Clear, draw the base image if there is one, then replay every retained
/// operation in append order.
pub fn render_full(raster: &mut Raster, base: Option<&Raster>, history: &History) {
    raster.clear();
    if let Some(base) = base {
        raster.blit(base, 0, 0, BlendMode::Over);
    }
    for op in history.iter() {
        render_operation(raster, op);
    }
}

/// Draw only what the last operation added since the previous render: the
/// newest segment of an in-progress stroke, or the whole operation otherwise.
pub fn render_incremental(raster: &mut Raster, history: &History) {
    match history.last() {
        Some(Operation::Stroke {
            ink, width, points, ..
        }) => {
            let tail = &points[points.len().saturating_sub(2)..];
            draw_polyline(raster, tail, *width, *ink);
        }
        Some(op) => render_operation(raster, op),
        None => {}
    }
}
