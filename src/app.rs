use std::path::PathBuf;
use std::sync::{Arc, mpsc};

use eframe::egui;
use egui::{Color32, Pos2, Rect, Stroke, TextureHandle, TextureOptions};

use annotator::api::{AnnotationBackend, FileRecord, HttpBackend, MemoryBackend, ServiceError};
use annotator::cli::LaunchTarget;
use annotator::components::tools::{BRUSH_PALETTE, Category, parse_hex_color};
use annotator::controller::{Action, Effect, Notice, NoticeLevel, PointerButton};
use annotator::io;
use annotator::project::{AnnotationProject, SaveStatus};
use annotator::raster::Raster;
use annotator::settings::AnnotatorSettings;
use annotator::{log_err, log_info, log_warn};
use uuid::Uuid;

pub const NOTHING_LEFT: &str = "Done! Nothing more to annotate!";
const TOAST_SECONDS: f64 = 3.0;
const OFFLINE_FILE_ID: i64 = 1;

// ============================================================================
// BACKGROUND JOBS
// ============================================================================

/// What a background job should open.
#[derive(Clone, Copy, Debug)]
enum OpenRequest {
    File { file_id: i64, job_id: Option<i64> },
    Annotation { annotation_id: i64, job_id: Option<i64> },
    Next { after: i64, job_id: Option<i64> },
}

/// Everything needed to start annotating one file.
struct LoadedFile {
    file: FileRecord,
    categories: Vec<Category>,
    source: Raster,
    base: Option<(String, Raster)>,
}

/// Results sent back from `rayon::spawn` jobs, polled every frame.
enum JobResult {
    Opened(Box<LoadedFile>),
    NothingLeft,
    OpenFailed(String),
    Saved {
        file_id: i64,
        result: Result<(), String>,
        advance: bool,
    },
    PaintFill {
        session: Uuid,
        seq: u64,
        result: Result<Raster, String>,
    },
}

fn load_file(backend: &dyn AnnotationBackend, request: OpenRequest) -> Result<Option<LoadedFile>, ServiceError> {
    let (file, job_override, base_url) = match request {
        OpenRequest::File { file_id, job_id } => (backend.fetch_file(file_id)?, job_id, None),
        OpenRequest::Annotation {
            annotation_id,
            job_id,
        } => {
            let record = backend.fetch_annotation(annotation_id)?;
            (backend.fetch_file(record.file_id)?, job_id, Some(record.image_url))
        }
        OpenRequest::Next { after, job_id } => match backend.fetch_next_file(after)? {
            Some(file) => (file, job_id, None),
            None => return Ok(None),
        },
    };
    let categories = backend.fetch_categories(job_override.unwrap_or(file.job_id))?;
    let source = backend.fetch_image(&file.signed_url)?;
    let base = match base_url {
        Some(url) => {
            let image = backend.fetch_image(&url)?;
            Some((url, image))
        }
        None => None,
    };
    Ok(Some(LoadedFile {
        file,
        categories,
        source,
        base,
    }))
}

/// Categories offered when annotating a local image.
fn offline_categories() -> Vec<Category> {
    [("Foreground", "#ff0000"), ("Background", "#0000ff"), ("Other", "#00ff00")]
        .iter()
        .zip(1..)
        .map(|(&(name, color), id)| Category {
            id,
            name: name.to_string(),
            color: color.to_string(),
            job_id: 0,
        })
        .collect()
}

// ============================================================================
// TEXTURES / TOASTS
// ============================================================================

/// GPU copy of a raster, re-uploaded when its revision moves on.
struct LayerTexture {
    revision: u64,
    handle: TextureHandle,
}

fn color_image(raster: &Raster) -> egui::ColorImage {
    let (w, h) = raster.dimensions();
    egui::ColorImage::from_rgba_unmultiplied([w as usize, h as usize], raster.as_raw())
}

fn sync_texture(ctx: &egui::Context, slot: &mut Option<LayerTexture>, name: &str, raster: Option<&Raster>, revision: u64) {
    let Some(raster) = raster else {
        *slot = None;
        return;
    };
    match slot {
        Some(tex) if tex.revision == revision => {}
        Some(tex) => {
            tex.handle.set(color_image(raster), TextureOptions::NEAREST);
            tex.revision = revision;
        }
        None => {
            *slot = Some(LayerTexture {
                revision,
                handle: ctx.load_texture(name, color_image(raster), TextureOptions::NEAREST),
            });
        }
    }
}

struct Toast {
    notice: Notice,
    shown_at: f64,
}

fn notice_color(level: NoticeLevel) -> Color32 {
    match level {
        NoticeLevel::Info => Color32::from_rgb(70, 110, 170),
        NoticeLevel::Success => Color32::from_rgb(50, 140, 70),
        NoticeLevel::Warning => Color32::from_rgb(190, 130, 30),
        NoticeLevel::Error => Color32::from_rgb(180, 50, 50),
    }
}

// ============================================================================
// POINTER
// ============================================================================

/// One frame of egui pointer state over the canvas.
#[derive(Clone, Copy, Debug, Default)]
struct PointerFrame {
    pressed: Option<PointerButton>,
    released: bool,
    /// `None` once the cursor has left the window.
    pos: Option<Pos2>,
    hovered: bool,
    clicked: bool,
}

/// Turns per-frame pointer state into controller pointer actions. A press
/// has to start on the canvas; its release always ends the gesture, even
/// outside the window.
#[derive(Debug, Default)]
struct PointerTracker {
    held: bool,
    last: Option<Pos2>,
}

impl PointerTracker {
    fn route(&mut self, frame: PointerFrame) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(pos) = frame.pos {
            if !self.held
                && frame.hovered
                && let Some(button) = frame.pressed
            {
                self.held = true;
                self.last = Some(pos);
                actions.push(Action::PointerDown { pos, button });
            } else if self.held && self.last != Some(pos) {
                self.last = Some(pos);
                actions.push(Action::PointerMove { pos });
            }
        }

        if self.held && frame.released {
            self.held = false;
            if let Some(pos) = frame.pos.or(self.last.take()) {
                actions.push(Action::PointerUp { pos });
            }
            self.last = None;
        }
        if frame.clicked
            && let Some(pos) = frame.pos
        {
            actions.push(Action::Click {
                pos,
                button: PointerButton::Primary,
            });
        }
        actions
    }
}

// ============================================================================
// APP
// ============================================================================

pub struct AnnotatorApp {
    settings: AnnotatorSettings,
    backend: Option<Arc<dyn AnnotationBackend>>,
    /// `--job-id` override carried to every file opened this session.
    job_override: Option<i64>,
    /// Offline mode writes each save here as PNG.
    offline_output: Option<PathBuf>,
    project: Option<AnnotationProject>,

    job_sender: mpsc::Sender<JobResult>,
    job_receiver: mpsc::Receiver<JobResult>,
    /// Open/save jobs in flight; shows the spinner.
    pending_jobs: usize,
    status: String,

    toasts: Vec<Toast>,
    source_tex: Option<LayerTexture>,
    annotation_tex: Option<LayerTexture>,
    preview_tex: Option<LayerTexture>,
    mask_tex: Option<LayerTexture>,
    pointer: PointerTracker,
}

impl AnnotatorApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: AnnotatorSettings, target: LaunchTarget) -> Self {
        let (job_sender, job_receiver) = mpsc::channel();
        let mut app = Self {
            settings,
            backend: None,
            job_override: None,
            offline_output: None,
            project: None,
            job_sender,
            job_receiver,
            pending_jobs: 0,
            status: String::new(),
            toasts: Vec::new(),
            source_tex: None,
            annotation_tex: None,
            preview_tex: None,
            mask_tex: None,
            pointer: PointerTracker::default(),
        };

        let request = match target {
            LaunchTarget::File { file_id, job_id } => {
                app.connect();
                app.job_override = job_id;
                OpenRequest::File { file_id, job_id }
            }
            LaunchTarget::Annotation {
                annotation_id,
                job_id,
            } => {
                app.connect();
                app.job_override = job_id;
                OpenRequest::Annotation {
                    annotation_id,
                    job_id,
                }
            }
            LaunchTarget::Offline { image, output } => {
                match io::load_image(&image) {
                    Ok(raster) => {
                        let file = FileRecord {
                            id: OFFLINE_FILE_ID,
                            job_id: 0,
                            signed_url: format!("file://{}", image.display()),
                        };
                        let backend = MemoryBackend::new()
                            .with_file(file, raster)
                            .with_categories(offline_categories());
                        app.backend = Some(Arc::new(backend));
                        app.offline_output = Some(output);
                    }
                    Err(e) => {
                        log_err!("offline: cannot open {}: {}", image.display(), e);
                        app.notify(Notice::new(
                            NoticeLevel::Error,
                            format!("Cannot open {}: {}", image.display(), e),
                        ));
                    }
                }
                OpenRequest::File {
                    file_id: OFFLINE_FILE_ID,
                    job_id: None,
                }
            }
        };
        app.spawn_open(request);
        app
    }

    fn connect(&mut self) {
        match HttpBackend::new(&self.settings.api_url, self.settings.request_timeout()) {
            Ok(backend) => {
                log_info!("app: using services at {}", self.settings.api_url);
                self.backend = Some(Arc::new(backend));
            }
            Err(e) => {
                log_err!("app: cannot create HTTP client: {}", e);
                self.notify(Notice::new(NoticeLevel::Error, e.to_string()));
            }
        }
    }

    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Warning | NoticeLevel::Error => log_warn!("notice: {}", notice.message),
            _ => log_info!("notice: {}", notice.message),
        }
        self.toasts.push(Toast {
            notice,
            shown_at: f64::NAN,
        });
    }

    // ---- jobs ---------------------------------------------------------------

    fn spawn_open(&mut self, request: OpenRequest) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        let sender = self.job_sender.clone();
        self.pending_jobs += 1;
        self.status = "Loading...".to_string();
        rayon::spawn(move || {
            let msg = match load_file(backend.as_ref(), request) {
                Ok(Some(loaded)) => JobResult::Opened(Box::new(loaded)),
                Ok(None) => JobResult::NothingLeft,
                Err(e) => JobResult::OpenFailed(e.to_string()),
            };
            let _ = sender.send(msg);
        });
    }

    fn start_save(&mut self, advance: bool) {
        let (Some(backend), Some(project)) = (self.backend.clone(), self.project.as_mut()) else {
            return;
        };
        if project.save_status() == SaveStatus::Saving {
            return;
        }
        let upload = match project.prepare_save() {
            Ok(u) => u,
            Err(e) => {
                log_err!("save: encoding failed: {}", e);
                self.notify(Notice::new(NoticeLevel::Error, e.to_string()));
                return;
            }
        };
        let file_id = project.file.id;
        let offline = self
            .offline_output
            .clone()
            .map(|path| (path, project.controller.raster().clone()));
        let sender = self.job_sender.clone();
        self.pending_jobs += 1;
        self.status = "Saving...".to_string();
        rayon::spawn(move || {
            let mut result = backend.save_annotation(&upload).map_err(|e| e.to_string());
            if result.is_ok()
                && let Some((path, composite)) = offline
            {
                result = io::save_png(&composite, &path).map_err(|e| e.to_string());
            }
            let _ = sender.send(JobResult::Saved {
                file_id,
                result,
                advance,
            });
        });
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify(notice) => self.notify(notice),
                Effect::RequestPaintFill(request) => {
                    let Some(backend) = self.backend.clone() else {
                        continue;
                    };
                    let sender = self.job_sender.clone();
                    rayon::spawn(move || {
                        let result = backend.paint_fill(&request).map_err(|e| e.to_string());
                        let _ = sender.send(JobResult::PaintFill {
                            session: request.session,
                            seq: request.seq,
                            result,
                        });
                    });
                }
            }
        }
    }

    fn dispatch(&mut self, action: Action) {
        let Some(project) = self.project.as_mut() else {
            return;
        };
        let effects = project.controller.dispatch(action);
        self.run_effects(effects);
    }

    fn poll_jobs(&mut self, ctx: &egui::Context) {
        while let Ok(result) = self.job_receiver.try_recv() {
            match result {
                JobResult::Opened(loaded) => {
                    self.finish_job();
                    self.open_loaded(*loaded);
                }
                JobResult::NothingLeft => {
                    self.finish_job();
                    self.notify(Notice::new(NoticeLevel::Info, NOTHING_LEFT));
                }
                JobResult::OpenFailed(e) => {
                    self.finish_job();
                    log_err!("open failed: {}", e);
                    self.notify(Notice::new(NoticeLevel::Error, e));
                }
                JobResult::Saved {
                    file_id,
                    result,
                    advance,
                } => {
                    self.finish_job();
                    let current = self.project.as_ref().map(|p| p.file.id);
                    if current != Some(file_id) {
                        continue;
                    }
                    let ok = result.is_ok();
                    if let Some(project) = self.project.as_mut() {
                        project.finish_save(ok);
                    }
                    match result {
                        Ok(()) if advance => self.spawn_open(OpenRequest::Next {
                            after: file_id,
                            job_id: self.job_override,
                        }),
                        Ok(()) => self.notify(Notice::new(NoticeLevel::Success, "Saved")),
                        Err(e) => self.notify(Notice::new(NoticeLevel::Error, e)),
                    }
                }
                JobResult::PaintFill {
                    session,
                    seq,
                    result,
                } => match result {
                    Ok(result) => self.dispatch(Action::PaintFillResponse {
                        session,
                        seq,
                        result,
                    }),
                    Err(e) => {
                        log_warn!("paint fill #{} failed: {}", seq, e);
                        self.dispatch(Action::PaintFillFailed { session, seq });
                    }
                },
            }
            ctx.request_repaint();
        }
    }

    fn finish_job(&mut self) {
        self.pending_jobs = self.pending_jobs.saturating_sub(1);
        if self.pending_jobs == 0 {
            self.status.clear();
        }
    }

    fn open_loaded(&mut self, loaded: LoadedFile) {
        let LoadedFile {
            file,
            categories,
            source,
            base,
        } = loaded;
        log_info!("app: annotating file {} (job {})", file.id, file.job_id);
        let base_url = base.as_ref().map(|(url, _)| url.clone());
        let mut project = AnnotationProject::new(file, base_url, self.settings.initial_zoom);
        project.set_categories(categories);
        project.controller.dispatch(Action::SourceLoaded(source));
        if let Some((_, base)) = base {
            project.controller.dispatch(Action::BaseLoaded(base));
        }
        self.project = Some(project);
        self.source_tex = None;
        self.annotation_tex = None;
        self.preview_tex = None;
        self.mask_tex = None;
        self.pointer = PointerTracker::default();
    }

    // ---- UI -----------------------------------------------------------------

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let (status, has_project, session_open) = match self.project.as_ref() {
                Some(p) => (p.save_status(), true, p.controller.session().is_some()),
                None => (SaveStatus::Dirty, false, false),
            };
            let can_undo = self
                .project
                .as_ref()
                .is_some_and(|p| p.controller.history().can_undo());

            if ui
                .add_enabled(can_undo && !session_open, egui::Button::new("Undo"))
                .clicked()
            {
                self.dispatch(Action::Undo);
            }
            ui.separator();
            if ui
                .add_enabled(has_project && status == SaveStatus::Dirty, egui::Button::new(status.label()))
                .clicked()
            {
                self.start_save(false);
            }
            if ui
                .add_enabled(has_project && status != SaveStatus::Saving, egui::Button::new("Save and Next"))
                .clicked()
            {
                self.start_save(true);
            }
            ui.separator();
            if ui.button("-").clicked() {
                self.dispatch(Action::Zoom {
                    factor: annotator::canvas::ZOOM_OUT_STEP,
                });
            }
            if let Some(p) = self.project.as_ref() {
                ui.label(format!("{:.0}%", p.controller.transform().zoom * 100.0));
            }
            if ui.button("+").clicked() {
                self.dispatch(Action::Zoom {
                    factor: annotator::canvas::ZOOM_IN_STEP,
                });
            }
            ui.separator();
            ui.label("Opacity");
            let slider = ui.add(egui::Slider::new(&mut self.settings.mask_opacity, 0.0..=1.0).show_value(false));
            if slider.drag_released() {
                self.settings.save();
            }

            let loading = self.pending_jobs > 0 || self.project.as_ref().is_some_and(|p| p.controller.is_loading());
            if loading {
                ui.separator();
                ui.add(egui::Spinner::new());
                if !self.status.is_empty() {
                    ui.label(self.status.as_str());
                }
            }
        });
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        let Some(project) = self.project.as_mut() else {
            ui.label("No file loaded");
            return;
        };

        ui.heading("Categories");
        let active_id = project.active_category().map(|c| c.id);
        let mut picked = None;
        for (idx, category) in project.categories().iter().enumerate() {
            ui.horizontal(|ui| {
                let swatch = parse_hex_color(&category.color)
                    .map(|c| Color32::from_rgb(c[0], c[1], c[2]))
                    .unwrap_or(Color32::DARK_GRAY);
                let (rect, _) = ui.allocate_exact_size(egui::vec2(14.0, 14.0), egui::Sense::hover());
                ui.painter().rect_filled(rect, 2.0, swatch);
                if ui
                    .selectable_label(active_id == Some(category.id), category.name.as_str())
                    .clicked()
                {
                    picked = Some(idx);
                }
            });
        }
        if let Some(idx) = picked {
            project.select_category(idx);
        }

        ui.separator();
        ui.heading("Brush");
        let active_brush = project.controller.brush().id;
        for brush in BRUSH_PALETTE {
            if ui
                .selectable_label(active_brush == brush.id, brush.label())
                .clicked()
            {
                project.select_brush(brush.id);
            }
        }

        let Some(session) = project.controller.session() else {
            return;
        };
        let mut auto_update = session.auto_update;
        let has_result = session.result().is_some();
        ui.separator();
        ui.heading("Paint Fill");
        ui.label("Primary paints keep, secondary paints remove.");
        let toggled = ui.checkbox(&mut auto_update, "Auto update").changed();
        let mut apply = false;
        let mut cancel = false;
        ui.horizontal(|ui| {
            apply = ui.add_enabled(has_result, egui::Button::new("Apply")).clicked();
            cancel = ui.button("Cancel").clicked();
        });
        if toggled {
            self.dispatch(Action::ToggleAutoUpdate);
        }
        if apply {
            self.dispatch(Action::ApplyPaintFill);
        }
        if cancel {
            self.dispatch(Action::CancelPaintFill);
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let (viewport, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        let Some(project) = self.project.as_mut() else {
            return;
        };
        project.controller.dispatch(Action::Resize { viewport });
        self.handle_input(ctx, &response);

        let Some(project) = self.project.as_ref() else {
            return;
        };
        let controller = &project.controller;
        let revision = controller.revision();
        sync_texture(ctx, &mut self.source_tex, "source", controller.source(), 0);
        sync_texture(ctx, &mut self.annotation_tex, "annotation", Some(controller.raster()), revision);
        let session = controller.session();
        sync_texture(ctx, &mut self.preview_tex, "paint_fill_result", session.and_then(|s| s.result()), revision);
        sync_texture(ctx, &mut self.mask_tex, "paint_fill_mask", session.and_then(|s| s.mask()), revision);

        let painter = ui.painter_at(viewport);
        let bounds = controller.canvas_bounds();
        let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        let alpha = (self.settings.mask_opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        let tint = Color32::from_white_alpha(alpha);

        if let Some(tex) = &self.source_tex {
            painter.image(tex.handle.id(), bounds, uv, Color32::WHITE);
        }
        if let Some(tex) = &self.annotation_tex {
            painter.image(tex.handle.id(), bounds, uv, tint);
        }

        if let Some(overlay) = controller.paint_fill_overlay() {
            if let Some(tex) = &self.preview_tex {
                painter.image(tex.handle.id(), overlay.rect, uv, tint);
            }
            if let Some(tex) = &self.mask_tex {
                painter.image(tex.handle.id(), overlay.rect, uv, tint);
            }
            if overlay.busy {
                painter.rect_filled(overlay.rect, 0.0, Color32::from_black_alpha(120));
            }
            painter.rect_stroke(overlay.rect, 0.0, Stroke::new(1.0, Color32::YELLOW));
        }

        if let Some(selection) = controller.selection_overlay() {
            painter.rect_stroke(selection, 0.0, Stroke::new(1.0, Color32::WHITE));
        }
    }

    /// Translate egui pointer, wheel and key input into controller actions.
    fn handle_input(&mut self, ctx: &egui::Context, response: &egui::Response) {
        let (primary_pressed, secondary_pressed, released, pos, scroll, undo) = ctx.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.secondary_pressed(),
                i.pointer.any_released(),
                i.pointer.interact_pos(),
                i.scroll_delta.y,
                i.modifiers.command && i.key_pressed(egui::Key::Z),
            )
        });

        if undo {
            self.dispatch(Action::Undo);
        }
        let session_open = self
            .project
            .as_ref()
            .is_some_and(|p| p.controller.session().is_some());
        if session_open {
            if ctx.input(|i| i.key_pressed(egui::Key::Enter)) {
                self.dispatch(Action::ApplyPaintFill);
            }
            if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
                self.dispatch(Action::CancelPaintFill);
            }
        }

        if response.hovered() && scroll.abs() > 0.1 {
            self.dispatch(Action::Wheel { delta_y: -scroll });
        }

        let pressed = if primary_pressed {
            Some(PointerButton::Primary)
        } else if secondary_pressed {
            Some(PointerButton::Secondary)
        } else {
            None
        };
        let actions = self.pointer.route(PointerFrame {
            pressed,
            released,
            pos,
            hovered: response.hovered(),
            clicked: response.clicked(),
        });
        for action in actions {
            self.dispatch(action);
        }
    }

    fn show_toasts(&mut self, ctx: &egui::Context) {
        let now = ctx.input(|i| i.time);
        for toast in &mut self.toasts {
            if toast.shown_at.is_nan() {
                toast.shown_at = now;
            }
        }
        self.toasts.retain(|t| now - t.shown_at < TOAST_SECONDS);
        if self.toasts.is_empty() {
            return;
        }
        egui::Area::new("toasts")
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
            .show(ctx, |ui| {
                for toast in &self.toasts {
                    egui::Frame::popup(ui.style())
                        .fill(notice_color(toast.notice.level))
                        .show(ui, |ui| {
                            ui.colored_label(Color32::WHITE, toast.notice.message.as_str());
                        });
                }
            });
        ctx.request_repaint();
    }
}

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_jobs(ctx);

        let title = match self.project.as_ref() {
            Some(p) => format!("Annotator - {}", p.display_title()),
            None => "Annotator".to_string(),
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::SidePanel::left("palette")
            .resizable(false)
            .default_width(170.0)
            .show(ctx, |ui| self.side_panel(ui));
        egui::CentralPanel::default()
            .frame(egui::Frame {
                fill: Color32::from_gray(40),
                ..Default::default()
            })
            .show(ctx, |ui| self.canvas(ui, ctx));

        self.show_toasts(ctx);

        // Keep polling while work is in flight.
        if self.pending_jobs > 0 || self.project.as_ref().is_some_and(|p| p.controller.is_loading()) {
            ctx.request_repaint();
        }
    }
}
