use egui::Pos2;
use image::Rgba;
use std::fmt;
use uuid::Uuid;

use crate::canvas::PixelBox;
use crate::components::tools::Swatch;
use crate::raster::Raster;

// ============================================================================
// PAINT FILL – region selection gate
// ============================================================================

/// Selection sides must be strictly inside this open range.
pub const MIN_SELECTION: u32 = 50;
pub const MAX_SELECTION: u32 = 1000;

/// Mask stamp edge length, centred on the pointer.
const MASK_STAMP: u32 = 3;

pub const MASK_KEEP: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const MASK_REMOVE: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionRejected {
    InvalidSize { width: u32, height: u32 },
    ReservedColor,
}

impl fmt::Display for SelectionRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionRejected::InvalidSize { width, height } => write!(
                f,
                "Invalid size ({}, {}) for Paint Fill. Minimum size is (50x50) and maximum (1000x1000). Drag in order to choose the size",
                width, height
            ),
            SelectionRejected::ReservedColor => {
                write!(f, "Invalid color. You must choose color for paint fill tool.")
            }
        }
    }
}

/// Size is checked before colour. On success returns the ink colour.
pub fn validate_selection(
    selection: &PixelBox,
    swatch: Swatch,
) -> Result<Rgba<u8>, SelectionRejected> {
    let ok = |v: u32| v > MIN_SELECTION && v < MAX_SELECTION;
    if !ok(selection.width) || !ok(selection.height) {
        return Err(SelectionRejected::InvalidSize {
            width: selection.width,
            height: selection.height,
        });
    }
    swatch.color().ok_or(SelectionRejected::ReservedColor)
}

// ============================================================================
// SESSION
// ============================================================================

/// Everything the inference service needs for one round trip.
#[derive(Clone, Debug)]
pub struct PaintFillRequest {
    pub session: Uuid,
    pub seq: u64,
    pub color: [u8; 3],
    pub patch: Raster,
    pub mask: Raster,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStage {
    Editing,
    AwaitingResult,
}

/// What became of an inference response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    Applied,
    /// Older than a response already applied.
    Stale,
    /// Addressed to a different session.
    WrongSession,
}

/// A live paint-fill sub-mode: a cropped patch of the source image, the
/// user's keep/remove mask, and the latest inferred fill.
#[derive(Clone, Debug)]
pub struct PaintFillSession {
    id: Uuid,
    anchor: (u32, u32),
    color: Rgba<u8>,
    base_patch: Raster,
    mask: Option<Raster>,
    pub auto_update: bool,
    result: Option<Raster>,
    next_seq: u64,
    latest_applied_seq: Option<u64>,
    /// Sequence numbers of requests still awaiting a reply.
    outstanding: Vec<u64>,
    /// Mask changed while a live update was already on the wire.
    resync: bool,
}

impl PaintFillSession {
    /// Crop `selection` out of `source`. Pair with [`Self::request`] to
    /// issue the first inference right away.
    pub fn begin(source: &Raster, selection: &PixelBox, color: Rgba<u8>) -> Self {
        let base_patch = source.crop(
            selection.x_min as i64,
            selection.y_min as i64,
            selection.width,
            selection.height,
        );
        let session = Self {
            id: Uuid::new_v4(),
            anchor: (selection.x_min, selection.y_min),
            color,
            base_patch,
            mask: None,
            auto_update: true,
            result: None,
            next_seq: 0,
            latest_applied_seq: None,
            outstanding: Vec::new(),
            resync: false,
        };
        crate::log_info!(
            "paint fill {}: opened {}x{} at ({}, {})",
            session.id,
            selection.width,
            selection.height,
            selection.x_min,
            selection.y_min
        );
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn anchor(&self) -> (u32, u32) {
        self.anchor
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn base_patch(&self) -> &Raster {
        &self.base_patch
    }

    pub fn mask(&self) -> Option<&Raster> {
        self.mask.as_ref()
    }

    pub fn result(&self) -> Option<&Raster> {
        self.result.as_ref()
    }

    pub fn stage(&self) -> SessionStage {
        if self.outstanding.is_empty() {
            SessionStage::Editing
        } else {
            SessionStage::AwaitingResult
        }
    }

    pub fn is_loading(&self) -> bool {
        !self.outstanding.is_empty()
    }

    /// Patch-local coordinates of an image-space point, if it lies on the patch.
    pub fn to_patch(&self, image_pos: Pos2) -> Option<(i64, i64)> {
        let x = image_pos.x.floor() as i64 - self.anchor.0 as i64;
        let y = image_pos.y.floor() as i64 - self.anchor.1 as i64;
        self.base_patch.contains(x, y).then_some((x, y))
    }

    /// Snapshot the patch and mask into a new numbered request.
    pub fn request(&mut self) -> PaintFillRequest {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.outstanding.push(seq);
        self.resync = false;

        let (w, h) = self.base_patch.dimensions();
        let mask = self.mask.clone().unwrap_or_else(|| Raster::new(w, h));
        PaintFillRequest {
            session: self.id,
            seq,
            color: [self.color[0], self.color[1], self.color[2]],
            patch: self.base_patch.clone(),
            mask,
        }
    }

    /// Stamp the mask at patch-local `(x, y)`: white for keep (primary
    /// button), black for remove. While live updates are on this issues a
    /// request, or queues one if a request is already outstanding.
    pub fn stamp_mask(&mut self, at: (i64, i64), keep: bool) -> Option<PaintFillRequest> {
        let (w, h) = self.base_patch.dimensions();
        let mask = self.mask.get_or_insert_with(|| Raster::new(w, h));
        let color = if keep { MASK_KEEP } else { MASK_REMOVE };
        mask.fill_rect(at.0 - 1, at.1 - 1, MASK_STAMP, MASK_STAMP, color);

        if !self.auto_update {
            return None;
        }
        if self.outstanding.is_empty() {
            Some(self.request())
        } else {
            self.resync = true;
            None
        }
    }

    /// Pointer released after a mask edit: always sync.
    pub fn finish_mask_stroke(&mut self) -> PaintFillRequest {
        self.request()
    }

    /// Flip live updates. Turning them on syncs immediately.
    pub fn toggle_auto_update(&mut self) -> Option<PaintFillRequest> {
        self.auto_update = !self.auto_update;
        crate::log_info!("paint fill {}: auto update {}", self.id, self.auto_update);
        if self.auto_update {
            Some(self.request())
        } else {
            self.resync = false;
            None
        }
    }

    /// Accept a response only if it belongs to this session and is newer
    /// than anything already applied. The result is normalised to the patch
    /// size. May return a follow-up request for edits made meanwhile.
    pub fn apply_response(
        &mut self,
        session: Uuid,
        seq: u64,
        result: Raster,
    ) -> (ResponseOutcome, Option<PaintFillRequest>) {
        if session != self.id {
            crate::log_warn!("paint fill: dropped response for closed session {}", session);
            return (ResponseOutcome::WrongSession, None);
        }
        self.outstanding.retain(|s| *s != seq);

        let outcome = if self.latest_applied_seq.is_some_and(|latest| seq <= latest) {
            crate::log_info!("paint fill {}: dropped stale response #{}", self.id, seq);
            ResponseOutcome::Stale
        } else {
            let (w, h) = self.base_patch.dimensions();
            self.result = Some(result.fitted_to(w, h));
            self.latest_applied_seq = Some(seq);
            ResponseOutcome::Applied
        };

        let follow_up = (self.resync && self.auto_update && self.outstanding.is_empty())
            .then(|| self.request());
        (outcome, follow_up)
    }

    /// A request failed; stop waiting for it.
    pub fn request_failed(&mut self, session: Uuid, seq: u64) {
        if session == self.id {
            self.outstanding.retain(|s| *s != seq);
        }
    }

    /// Consume the session, yielding the anchor and result to commit.
    /// Without a result the session is handed back unchanged.
    pub fn into_patch(self) -> Result<((i64, i64), Raster), Self> {
        match self.result {
            Some(result) => {
                crate::log_info!("paint fill {}: applied", self.id);
                Ok(((self.anchor.0 as i64, self.anchor.1 as i64), result))
            }
            None => Err(self),
        }
    }
}
