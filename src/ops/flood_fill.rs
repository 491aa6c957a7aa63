//! Scanline-stack flood fill.
//!
//! Works column-wise: every stack entry expands to the whole contiguous
//! vertical run of the seed colour containing it, and only the left/right
//! neighbours of that run are pushed as new seeds. A per-column list of
//! visited intervals (padded by a few pixels) keeps neighbouring scans from
//! reprocessing the same span.

use image::Rgba;

use crate::raster::Raster;

/// Limit on popped seed points for a single fill, and separately on painted
/// pixels. Reaching either stops the fill and reports `capped`.
pub const MAX_FILL_POINTS: usize = 50_000;

/// Padding added to both ends of a visited interval.
const SEEN_PADDING: i64 = 3;

/// Result of [`flood_fill`].
#[derive(Clone, Debug)]
pub struct FillOutcome {
    pub raster: Raster,
    pub pixels_filled: usize,
    /// `true` when a limit was hit before the region was exhausted.
    pub capped: bool,
}

impl FillOutcome {
    fn unchanged(raster: &Raster) -> Self {
        Self {
            raster: raster.clone(),
            pixels_filled: 0,
            capped: false,
        }
    }
}

/// Closed `[y_min, y_max]` intervals already scanned, per column.
struct SeenColumns {
    columns: Vec<Vec<(i64, i64)>>,
}

impl SeenColumns {
    fn new(width: u32) -> Self {
        Self {
            columns: vec![Vec::new(); width as usize],
        }
    }

    fn mark(&mut self, x: i64, y_min: i64, y_max: i64) {
        if let Some(col) = self.columns.get_mut(x as usize) {
            col.push((y_min, y_max));
        }
    }

    fn contains(&self, x: i64, y: i64) -> bool {
        if x < 0 {
            return false;
        }
        self.columns
            .get(x as usize)
            .is_some_and(|col| col.iter().any(|&(lo, hi)| y >= lo && y <= hi))
    }
}

/// Flood-fill the 4-connected region of the seed pixel's colour with
/// `target`, using the default limits.
pub fn flood_fill(raster: &Raster, seed: (i64, i64), target: Rgba<u8>) -> FillOutcome {
    flood_fill_with_limit(raster, seed, target, MAX_FILL_POINTS)
}

/// [`flood_fill`] with an explicit limit on popped points and on painted
/// pixels.
pub fn flood_fill_with_limit(
    raster: &Raster,
    seed: (i64, i64),
    target: Rgba<u8>,
    max_points: usize,
) -> FillOutcome {
    let Some(original) = raster.pixel_at(seed.0, seed.1) else {
        return FillOutcome::unchanged(raster);
    };
    if original == target {
        return FillOutcome::unchanged(raster);
    }

    let width = raster.width() as i64;
    let height = raster.height() as i64;

    // Exact per-channel match; pixels outside the raster never match.
    let matches = |r: &Raster, x: i64, y: i64| r.pixel_at(x, y) == Some(original);

    let mut out = raster.clone();
    let mut seen = SeenColumns::new(raster.width());
    let mut stack: Vec<(i64, i64)> = Vec::with_capacity(1024);
    stack.push(seed);

    let mut popped = 0usize;
    let mut pixels_filled = 0usize;
    let mut capped = false;

    'fill: while let Some((x, mut y)) = stack.pop() {
        if popped >= max_points {
            capped = true;
            break;
        }
        popped += 1;

        if x < 0 || x >= width {
            continue;
        }

        // Climb to the top of the run containing y.
        while y >= 0 && y < height && matches(&out, x, y - 1) {
            y -= 1;
        }

        let mut run = 0i64;
        while matches(&out, x, y + run) {
            run += 1;
        }
        seen.mark(x, y - SEEN_PADDING, y + run + SEEN_PADDING);

        let mut stacking_left = true;
        let mut stacking_right = true;
        for row in y..y + run {
            if pixels_filled >= max_points {
                capped = true;
                break 'fill;
            }
            out.put_pixel(x as u32, row as u32, target);
            pixels_filled += 1;

            for (nx, stacking) in [(x - 1, &mut stacking_left), (x + 1, &mut stacking_right)] {
                let neighbour_matches = matches(&out, nx, row);
                if neighbour_matches && *stacking && !seen.contains(nx, row) {
                    stack.push((nx, row));
                    *stacking = false;
                }
                if !*stacking && !neighbour_matches {
                    *stacking = true;
                }
            }
        }
    }

    if capped {
        crate::log_warn!(
            "flood fill at ({}, {}) hit the {} limit after {} points and {} pixels",
            seed.0,
            seed.1,
            max_points,
            popped,
            pixels_filled
        );
    }

    FillOutcome {
        raster: out,
        pixels_filled,
        capped,
    }
}
