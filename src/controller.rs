//! Drawing controller: the single owner of history, view transform, the
//! annotation raster and the paint-fill session.
//!
//! Every input is an [`Action`]; [`DrawingController::dispatch`] applies it
//! and returns the [`Effect`]s the host has to carry out (service requests,
//! user notices). Nothing here blocks or touches the network.

use egui::{Pos2, Rect, Vec2};
use uuid::Uuid;

use crate::canvas::{DragStatus, ViewTransform, ZOOM_IN_STEP, ZOOM_OUT_STEP, bounding_box};
use crate::components::history::{History, Operation, UndoOutcome};
use crate::components::paint_fill::{
    PaintFillRequest, PaintFillSession, ResponseOutcome, validate_selection,
};
use crate::components::tools::{BrushChoice, Swatch, Tool, default_brush};
use crate::raster::Raster;
use crate::render::compositor::BlendMode;
use crate::render::renderer::{render_full, render_incremental};

pub const UNKNOWN_ERROR: &str = "Unknown error";

// ============================================================================
// ACTIONS / EFFECTS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

#[derive(Clone, Debug)]
pub enum Action {
    /// On-screen area available to the drawing surface.
    Resize { viewport: Rect },
    /// The image being annotated. Resets the raster and the history.
    SourceLoaded(Raster),
    /// A previously saved composite to keep drawing on (edit mode).
    BaseLoaded(Raster),
    SelectSwatch(Swatch),
    SelectBrush(BrushChoice),
    PointerDown { pos: Pos2, button: PointerButton },
    PointerMove { pos: Pos2 },
    PointerUp { pos: Pos2 },
    Click { pos: Pos2, button: PointerButton },
    Wheel { delta_y: f32 },
    Zoom { factor: f32 },
    Undo,
    ToggleAutoUpdate,
    ApplyPaintFill,
    CancelPaintFill,
    PaintFillResponse { session: Uuid, seq: u64, result: Raster },
    PaintFillFailed { session: Uuid, seq: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Effect {
    RequestPaintFill(PaintFillRequest),
    Notify(Notice),
}

impl Effect {
    fn warn(message: impl Into<String>) -> Self {
        Effect::Notify(Notice::new(NoticeLevel::Warning, message))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchOverlay {
    pub rect: Rect,
    pub busy: bool,
}

// ============================================================================
// GESTURES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
enum Gesture {
    Idle,
    Pan(DragStatus),
    Stroke,
    Selecting(DragStatus),
    Mask { keep: bool },
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct DrawingController {
    history: History,
    transform: ViewTransform,
    viewport: Rect,
    raster: Raster,
    source: Option<Raster>,
    base: Option<Raster>,
    session: Option<PaintFillSession>,
    gesture: Gesture,
    swatch: Swatch,
    brush: BrushChoice,
    /// Bumped whenever `raster` changes, so the shell knows to re-upload.
    revision: u64,
}

impl Default for DrawingController {
    fn default() -> Self {
        Self::new(ViewTransform::default().zoom)
    }
}

impl DrawingController {
    pub fn new(initial_zoom: f32) -> Self {
        Self {
            history: History::default(),
            transform: ViewTransform::new(initial_zoom),
            viewport: Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0)),
            raster: Raster::default(),
            source: None,
            base: None,
            session: None,
            gesture: Gesture::Idle,
            swatch: Swatch::Drag,
            brush: default_brush(),
            revision: 0,
        }
    }

    // ---- read access --------------------------------------------------------

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    pub fn source(&self) -> Option<&Raster> {
        self.source.as_ref()
    }

    pub fn session(&self) -> Option<&PaintFillSession> {
        self.session.as_ref()
    }

    pub fn swatch(&self) -> Swatch {
        self.swatch
    }

    pub fn brush(&self) -> BrushChoice {
        self.brush
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_loading(&self) -> bool {
        self.session.as_ref().is_some_and(PaintFillSession::is_loading)
    }

    /// On-screen rectangle of the image for the current viewport.
    pub fn canvas_bounds(&self) -> Rect {
        let (w, h) = self.raster.dimensions();
        self.transform
            .image_rect(self.viewport, Vec2::new(w as f32, h as f32))
    }

    /// Screen rectangle of a paint-fill selection in progress.
    pub fn selection_overlay(&self) -> Option<Rect> {
        match self.gesture {
            Gesture::Selecting(drag) => Some(drag.screen_rect()),
            _ => None,
        }
    }

    /// Screen rectangle of the open paint-fill patch. `busy` while a request
    /// is still outstanding; the shell dims the patch meanwhile.
    pub fn paint_fill_overlay(&self) -> Option<PatchOverlay> {
        let session = self.session.as_ref()?;
        let (ax, ay) = session.anchor();
        let (pw, ph) = session.base_patch().dimensions();
        let bounds = self.canvas_bounds();
        let rect = Rect::from_min_max(
            self.transform
                .image_to_screen(Pos2::new(ax as f32, ay as f32), bounds),
            self.transform
                .image_to_screen(Pos2::new((ax + pw) as f32, (ay + ph) as f32), bounds),
        );
        Some(PatchOverlay {
            rect,
            busy: session.is_loading(),
        })
    }

    fn to_image(&self, screen: Pos2) -> Pos2 {
        self.transform.screen_to_image(screen, self.canvas_bounds())
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    // ---- dispatch -----------------------------------------------------------

    pub fn dispatch(&mut self, action: Action) -> Vec<Effect> {
        let mut effects = Vec::new();
        match action {
            Action::Resize { viewport } => self.viewport = viewport,
            Action::SourceLoaded(source) => self.load_source(source),
            Action::BaseLoaded(base) => self.load_base(base),
            Action::SelectSwatch(swatch) => self.swatch = swatch,
            Action::SelectBrush(brush) => self.brush = brush,
            Action::PointerDown { pos, button } => self.pointer_down(pos, button, &mut effects),
            Action::PointerMove { pos } => self.pointer_move(pos, &mut effects),
            Action::PointerUp { pos } => self.pointer_up(pos, &mut effects),
            Action::Click { pos, button } => self.click(pos, button),
            Action::Wheel { delta_y } => {
                let factor = if delta_y < 0.0 { ZOOM_IN_STEP } else { ZOOM_OUT_STEP };
                self.transform.zoom_by(factor);
            }
            Action::Zoom { factor } => self.transform.zoom_by(factor),
            Action::Undo => self.undo(&mut effects),
            Action::ToggleAutoUpdate => {
                if let Some(req) = self.session.as_mut().and_then(|s| s.toggle_auto_update()) {
                    effects.push(Effect::RequestPaintFill(req));
                }
            }
            Action::ApplyPaintFill => self.apply_paint_fill(&mut effects),
            Action::CancelPaintFill => {
                if let Some(session) = self.session.take() {
                    crate::log_info!("paint fill {}: cancelled", session.id());
                }
                self.gesture = Gesture::Idle;
            }
            Action::PaintFillResponse {
                session,
                seq,
                result,
            } => match self.session.as_mut() {
                Some(active) => {
                    let (outcome, follow_up) = active.apply_response(session, seq, result);
                    if outcome == ResponseOutcome::Applied {
                        self.touch();
                    }
                    if let Some(req) = follow_up {
                        effects.push(Effect::RequestPaintFill(req));
                    }
                }
                None => {
                    crate::log_warn!("paint fill: response #{} for closed session {} dropped", seq, session);
                }
            },
            Action::PaintFillFailed { session, seq } => {
                if let Some(active) = self.session.as_mut() {
                    active.request_failed(session, seq);
                }
                effects.push(Effect::Notify(Notice::new(NoticeLevel::Error, UNKNOWN_ERROR)));
            }
        }
        effects
    }

    // ---- image loading ------------------------------------------------------

    fn load_source(&mut self, source: Raster) {
        let (w, h) = source.dimensions();
        crate::log_info!("controller: source image {}x{}", w, h);
        self.raster = Raster::new(w, h);
        self.history.clear();
        self.session = None;
        self.gesture = Gesture::Idle;
        self.source = Some(source);
        render_full(&mut self.raster, self.base.as_ref(), &self.history);
        self.touch();
    }

    /// Slide `base` underneath whatever is already drawn. With an empty
    /// history this is the same as a full render.
    fn load_base(&mut self, base: Raster) {
        if self.history.is_empty() {
            render_full(&mut self.raster, Some(&base), &self.history);
        } else {
            let (w, h) = self.raster.dimensions();
            let mut composed = Raster::new(w, h);
            composed.blit(&base, 0, 0, BlendMode::Over);
            composed.blit(&self.raster, 0, 0, BlendMode::Over);
            self.raster = composed;
        }
        self.base = Some(base);
        self.touch();
    }

    // ---- pointer routing ----------------------------------------------------

    fn pointer_down(&mut self, pos: Pos2, button: PointerButton, effects: &mut Vec<Effect>) {
        let is_drag = button == PointerButton::Secondary || self.swatch == Swatch::Drag;

        if self.session.is_some() {
            let image_pos = self.to_image(pos);
            let keep = button == PointerButton::Primary;
            let stamped = self.session.as_mut().and_then(|session| {
                let at = session.to_patch(image_pos)?;
                Some(session.stamp_mask(at, keep))
            });
            match stamped {
                Some(request) => {
                    self.gesture = Gesture::Mask { keep };
                    effects.extend(request.map(Effect::RequestPaintFill));
                    self.touch();
                }
                None if is_drag => {
                    self.gesture = Gesture::Pan(DragStatus::begin(pos, &self.transform));
                }
                None => {}
            }
            return;
        }

        if is_drag {
            self.gesture = Gesture::Pan(DragStatus::begin(pos, &self.transform));
            return;
        }
        if self.source.is_none() {
            return;
        }

        match self.brush.tool {
            // Fill happens on click.
            Tool::Fill => {}
            Tool::PaintFill => {
                self.gesture = Gesture::Selecting(DragStatus::begin(pos, &self.transform));
            }
            Tool::Brush => {
                let Some(ink) = self.swatch.ink() else {
                    return;
                };
                let width = self.brush.size as f32 / self.transform.zoom;
                let start = self.to_image(pos);
                self.history
                    .append(Operation::stroke(ink, width, start), &self.raster);
                render_incremental(&mut self.raster, &self.history);
                self.gesture = Gesture::Stroke;
                self.touch();
            }
        }
    }

    fn pointer_move(&mut self, pos: Pos2, effects: &mut Vec<Effect>) {
        match self.gesture {
            Gesture::Idle => {}
            Gesture::Pan(mut drag) => {
                drag.update(pos);
                self.transform.pan = drag.panned(self.transform.zoom);
                self.gesture = Gesture::Pan(drag);
            }
            Gesture::Selecting(mut drag) => {
                drag.update(pos);
                self.gesture = Gesture::Selecting(drag);
            }
            Gesture::Stroke => {
                let point = self.to_image(pos);
                if self.history.extend_last_stroke(point) {
                    render_incremental(&mut self.raster, &self.history);
                    self.touch();
                }
            }
            Gesture::Mask { keep } => {
                let image_pos = self.to_image(pos);
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                let Some(at) = session.to_patch(image_pos) else {
                    return;
                };
                if let Some(req) = session.stamp_mask(at, keep) {
                    effects.push(Effect::RequestPaintFill(req));
                }
                self.touch();
            }
        }
    }

    fn pointer_up(&mut self, pos: Pos2, effects: &mut Vec<Effect>) {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match gesture {
            Gesture::Selecting(mut drag) => {
                drag.update(pos);
                self.finish_selection(drag, effects);
            }
            Gesture::Mask { .. } => {
                if let Some(session) = self.session.as_mut() {
                    effects.push(Effect::RequestPaintFill(session.finish_mask_stroke()));
                }
            }
            Gesture::Pan(mut drag) => {
                drag.update(pos);
                self.transform.pan = drag.panned(self.transform.zoom);
            }
            Gesture::Stroke | Gesture::Idle => {}
        }
    }

    fn finish_selection(&mut self, drag: DragStatus, effects: &mut Vec<Effect>) {
        let Some(source) = self.source.as_ref() else {
            return;
        };
        let selection = bounding_box(
            drag.start,
            drag.current,
            self.canvas_bounds(),
            &self.transform,
            source.dimensions(),
        );
        match validate_selection(&selection, self.swatch) {
            Ok(color) => {
                let mut session = PaintFillSession::begin(source, &selection, color);
                effects.push(Effect::RequestPaintFill(session.request()));
                self.session = Some(session);
                self.touch();
            }
            Err(rejected) => {
                crate::log_info!("paint fill: selection rejected ({:?})", rejected);
                effects.push(Effect::warn(rejected.to_string()));
            }
        }
    }

    fn click(&mut self, pos: Pos2, button: PointerButton) {
        if button != PointerButton::Primary || self.session.is_some() {
            return;
        }
        if self.brush.tool != Tool::Fill {
            return;
        }
        let Some(color) = self.swatch.color() else {
            return;
        };
        let p = self.to_image(pos);
        let seed = (p.x.floor() as i64, p.y.floor() as i64);
        if !self.raster.contains(seed.0, seed.1) {
            return;
        }
        self.history
            .append(Operation::ScanlineFill { color, seed }, &self.raster);
        render_incremental(&mut self.raster, &self.history);
        self.touch();
    }

    // ---- history / session commands -----------------------------------------

    fn undo(&mut self, effects: &mut Vec<Effect>) {
        if self.session.is_some() {
            crate::log_info!("controller: undo ignored during paint fill");
            return;
        }
        match self.history.undo(&mut self.raster) {
            Ok(UndoOutcome::Ignored) => {}
            Ok(UndoOutcome::Restored) => self.touch(),
            Ok(UndoOutcome::Cleared) => {
                render_full(&mut self.raster, self.base.as_ref(), &self.history);
                self.touch();
            }
            Err(e) => {
                crate::log_err!("controller: undo failed: {}", e);
                effects.push(Effect::Notify(Notice::new(NoticeLevel::Error, UNKNOWN_ERROR)));
            }
        }
    }

    fn apply_paint_fill(&mut self, effects: &mut Vec<Effect>) {
        let Some(session) = self.session.take() else {
            return;
        };
        match session.into_patch() {
            Ok((anchor, result)) => {
                self.history
                    .append(Operation::PaintFillPatch { anchor, result }, &self.raster);
                render_incremental(&mut self.raster, &self.history);
                self.gesture = Gesture::Idle;
                self.touch();
            }
            Err(session) => {
                self.session = Some(session);
                effects.push(Effect::warn("No paint fill result yet. Wait for the update to finish."));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::tools::brush_by_id;
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREY: Rgba<u8> = Rgba([80, 80, 80, 255]);

    /// 100×100 source, 200×200 viewport, zoom 1: image origin at screen (50, 50).
    fn controller() -> DrawingController {
        let mut c = DrawingController::new(1.0);
        c.dispatch(Action::Resize {
            viewport: Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 200.0)),
        });
        c.dispatch(Action::SourceLoaded(Raster::new_filled(100, 100, GREY)));
        c
    }

    fn screen(x: f32, y: f32) -> Pos2 {
        Pos2::new(50.0 + x, 50.0 + y)
    }

    fn down(c: &mut DrawingController, x: f32, y: f32, button: PointerButton) -> Vec<Effect> {
        c.dispatch(Action::PointerDown {
            pos: screen(x, y),
            button,
        })
    }

    #[test]
    fn starts_in_drag_mode_with_default_brush() {
        let c = controller();
        assert_eq!(c.swatch(), Swatch::Drag);
        assert_eq!(c.brush().size, 25);
        assert_eq!(c.canvas_bounds().min, Pos2::new(50.0, 50.0));
    }

    #[test]
    fn drag_swatch_pans_instead_of_drawing() {
        let mut c = controller();
        down(&mut c, 10.0, 10.0, PointerButton::Primary);
        c.dispatch(Action::PointerMove { pos: screen(30.0, 20.0) });
        c.dispatch(Action::PointerUp { pos: screen(30.0, 20.0) });
        assert!(c.history().is_empty());
        assert_eq!(c.transform().pan, Vec2::new(20.0, 10.0));
    }

    #[test]
    fn secondary_button_pans_with_colour_selected() {
        let mut c = controller();
        c.dispatch(Action::SelectSwatch(Swatch::Color(RED)));
        down(&mut c, 0.0, 0.0, PointerButton::Secondary);
        c.dispatch(Action::PointerMove { pos: screen(-10.0, 0.0) });
        assert!(c.history().is_empty());
        assert_eq!(c.transform().pan, Vec2::new(-10.0, 0.0));
    }

    #[test]
    fn stroke_width_scales_with_zoom() {
        let mut c = controller();
        c.dispatch(Action::SelectSwatch(Swatch::Color(RED)));
        c.dispatch(Action::Zoom { factor: 2.0 });
        let bounds = c.canvas_bounds();
        c.dispatch(Action::PointerDown {
            pos: bounds.min + Vec2::new(20.0, 20.0),
            button: PointerButton::Primary,
        });
        c.dispatch(Action::PointerMove {
            pos: bounds.min + Vec2::new(60.0, 20.0),
        });
        c.dispatch(Action::PointerUp {
            pos: bounds.min + Vec2::new(60.0, 20.0),
        });
        match c.history().last() {
            Some(Operation::Stroke { width, points, .. }) => {
                assert_eq!(*width, 12.5);
                assert_eq!(points, &vec![Pos2::new(10.0, 10.0), Pos2::new(30.0, 10.0)]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.raster().get_pixel(20, 10), RED);
    }

    #[test]
    fn wheel_direction_picks_zoom_step() {
        let mut c = controller();
        c.dispatch(Action::Wheel { delta_y: -3.0 });
        assert!((c.transform().zoom - 1.1).abs() < 1e-6);
        c.dispatch(Action::Wheel { delta_y: 3.0 });
        assert!((c.transform().zoom - 0.99).abs() < 1e-6);
    }

    #[test]
    fn fill_tool_fills_on_click_only_with_real_colour() {
        let mut c = controller();
        c.dispatch(Action::SelectBrush(brush_by_id(5).unwrap()));
        c.dispatch(Action::SelectSwatch(Swatch::Erase));
        c.dispatch(Action::Click {
            pos: screen(5.0, 5.0),
            button: PointerButton::Primary,
        });
        assert!(c.history().is_empty());

        c.dispatch(Action::SelectSwatch(Swatch::Color(RED)));
        c.dispatch(Action::Click {
            pos: screen(5.0, 5.0),
            button: PointerButton::Primary,
        });
        assert_eq!(c.history().len(), 1);
        // Blank annotation layer: the whole raster is one region.
        assert_eq!(c.raster().get_pixel(99, 99), RED);
    }

    #[test]
    fn rejected_selection_leaves_history_untouched() {
        let mut c = controller();
        c.dispatch(Action::SelectBrush(brush_by_id(6).unwrap()));
        c.dispatch(Action::SelectSwatch(Swatch::Color(RED)));
        down(&mut c, 0.0, 0.0, PointerButton::Primary);
        let fx = c.dispatch(Action::PointerUp { pos: screen(30.0, 30.0) });
        assert!(c.session().is_none());
        assert!(c.history().is_empty());
        assert!(matches!(
            fx.as_slice(),
            [Effect::Notify(Notice { level: NoticeLevel::Warning, .. })]
        ));
    }

    fn open_session(c: &mut DrawingController) -> PaintFillRequest {
        c.dispatch(Action::SelectBrush(brush_by_id(6).unwrap()));
        c.dispatch(Action::SelectSwatch(Swatch::Color(RED)));
        down(c, 10.0, 10.0, PointerButton::Primary);
        c.dispatch(Action::PointerMove { pos: screen(90.0, 80.0) });
        let fx = c.dispatch(Action::PointerUp { pos: screen(90.0, 80.0) });
        match fx.as_slice() {
            [Effect::RequestPaintFill(req)] => req.clone(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn reserved_colour_selection_is_rejected() {
        let mut c = controller();
        c.dispatch(Action::SelectBrush(brush_by_id(6).unwrap()));
        c.dispatch(Action::SelectSwatch(Swatch::Erase));
        down(&mut c, 10.0, 10.0, PointerButton::Primary);
        c.dispatch(Action::PointerMove { pos: screen(90.0, 80.0) });
        let fx = c.dispatch(Action::PointerUp { pos: screen(90.0, 80.0) });
        assert!(c.session().is_none());
        assert!(c.history().is_empty());
        match fx.as_slice() {
            [Effect::Notify(Notice { level, message })] => {
                assert_eq!(*level, NoticeLevel::Warning);
                assert_eq!(message, "Invalid color. You must choose color for paint fill tool.");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn patch_overlay_is_busy_until_the_reply_lands() {
        let mut c = controller();
        assert_eq!(c.paint_fill_overlay(), None);
        let req = open_session(&mut c);
        let overlay = c.paint_fill_overlay().unwrap();
        assert!(overlay.busy);
        assert_eq!(overlay.rect, Rect::from_min_max(screen(10.0, 10.0), screen(90.0, 80.0)));

        c.dispatch(Action::PaintFillResponse {
            session: req.session,
            seq: req.seq,
            result: Raster::new(80, 70),
        });
        assert!(!c.paint_fill_overlay().unwrap().busy);
    }

    #[test]
    fn paint_fill_session_round_trip() {
        let mut c = controller();
        let req = open_session(&mut c);
        assert_eq!(req.patch.dimensions(), (80, 70));
        assert!(c.is_loading());

        // Undo is disabled while the session is open.
        c.dispatch(Action::Undo);

        c.dispatch(Action::PaintFillResponse {
            session: req.session,
            seq: req.seq,
            result: Raster::new_filled(80, 70, RED),
        });
        assert!(!c.is_loading());

        c.dispatch(Action::ApplyPaintFill);
        assert!(c.session().is_none());
        assert_eq!(c.history().len(), 1);
        assert_eq!(c.raster().get_pixel(10, 10), RED);
        assert_eq!(c.raster().get_pixel(9, 10), crate::raster::TRANSPARENT);
    }

    #[test]
    fn apply_without_result_keeps_session() {
        let mut c = controller();
        open_session(&mut c);
        let fx = c.dispatch(Action::ApplyPaintFill);
        assert!(c.session().is_some());
        assert!(c.history().is_empty());
        assert_eq!(fx.len(), 1);
    }

    #[test]
    fn mask_edit_then_release_requests_update() {
        let mut c = controller();
        let first = open_session(&mut c);
        c.dispatch(Action::PaintFillResponse {
            session: first.session,
            seq: first.seq,
            result: Raster::new(80, 70),
        });
        let fx = down(&mut c, 20.0, 20.0, PointerButton::Secondary);
        assert_eq!(fx.len(), 1, "live update on first stamp");
        let fx = c.dispatch(Action::PointerUp { pos: screen(20.0, 20.0) });
        match fx.as_slice() {
            [Effect::RequestPaintFill(req)] => {
                assert_eq!(req.mask.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn response_after_cancel_is_ignored() {
        let mut c = controller();
        let req = open_session(&mut c);
        c.dispatch(Action::CancelPaintFill);
        let before = c.revision();
        let fx = c.dispatch(Action::PaintFillResponse {
            session: req.session,
            seq: req.seq,
            result: Raster::new_filled(80, 70, RED),
        });
        assert!(fx.is_empty());
        assert_eq!(c.revision(), before);
        assert!(c.history().is_empty());
    }

    #[test]
    fn undo_to_empty_brings_base_back() {
        let mut c = controller();
        c.dispatch(Action::BaseLoaded(Raster::new_filled(100, 100, GREY)));
        c.dispatch(Action::SelectSwatch(Swatch::Erase));
        c.dispatch(Action::SelectBrush(brush_by_id(3).unwrap()));
        down(&mut c, 50.0, 50.0, PointerButton::Primary);
        c.dispatch(Action::PointerUp { pos: screen(50.0, 50.0) });
        assert_eq!(c.raster().get_pixel(50, 50), Rgba([0, 0, 0, 0]));
        c.dispatch(Action::Undo);
        assert!(c.history().is_empty());
        assert_eq!(c.raster().get_pixel(50, 50), GREY);
    }
}
