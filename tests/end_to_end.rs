//! Whole-surface scenarios driven through the public controller API.

use annotator::api::{AnnotationBackend, FileRecord, MemoryBackend};
use annotator::components::history::HISTORY_WINDOW;
use annotator::components::paint_fill::PaintFillRequest;
use annotator::components::tools::{Category, Swatch, brush_by_id};
use annotator::controller::{Action, DrawingController, Effect, Notice, NoticeLevel, PointerButton};
use annotator::io;
use annotator::project::{AnnotationProject, SaveStatus};
use annotator::raster::{Raster, TRANSPARENT};
use annotator::render::render_full;
use egui::{Pos2, Rect, Vec2};
use image::Rgba;

const A: Rgba<u8> = Rgba([255, 0, 0, 255]);
const B: Rgba<u8> = Rgba([0, 0, 255, 255]);

/// 100×100 blank source in a 200×200 viewport at zoom 1: image (0, 0) sits
/// at screen (50, 50).
fn surface() -> DrawingController {
    let mut c = DrawingController::new(1.0);
    c.dispatch(Action::Resize {
        viewport: Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 200.0)),
    });
    c.dispatch(Action::SourceLoaded(Raster::new(100, 100)));
    c
}

fn at(x: f32, y: f32) -> Pos2 {
    Pos2::new(50.0 + x, 50.0 + y)
}

fn stroke(c: &mut DrawingController, from: (f32, f32), to: (f32, f32)) {
    c.dispatch(Action::PointerDown {
        pos: at(from.0, from.1),
        button: PointerButton::Primary,
    });
    c.dispatch(Action::PointerMove { pos: at(to.0, to.1) });
    c.dispatch(Action::PointerUp { pos: at(to.0, to.1) });
}

/// Square outline in A, interior filled with B.
fn outlined_square(c: &mut DrawingController) {
    c.dispatch(Action::SelectBrush(brush_by_id(0).unwrap()));
    c.dispatch(Action::SelectSwatch(Swatch::Color(A)));
    stroke(c, (25.0, 25.0), (75.0, 25.0));
    stroke(c, (75.0, 25.0), (75.0, 75.0));
    stroke(c, (75.0, 75.0), (25.0, 75.0));
    stroke(c, (25.0, 75.0), (25.0, 25.0));

    c.dispatch(Action::SelectBrush(brush_by_id(5).unwrap()));
    c.dispatch(Action::SelectSwatch(Swatch::Color(B)));
    c.dispatch(Action::Click {
        pos: at(50.0, 50.0),
        button: PointerButton::Primary,
    });
}

#[test]
fn outlined_square_fills_inside_only() {
    let mut c = surface();
    outlined_square(&mut c);
    let r = c.raster();

    assert_eq!(c.history().len(), 5);
    for p in [(30, 30), (50, 50), (70, 70), (30, 70), (70, 30)] {
        assert_eq!(r.get_pixel(p.0, p.1), B, "interior {:?}", p);
    }
    for p in [(25, 50), (75, 50), (50, 25), (50, 75), (25, 25)] {
        assert_eq!(r.get_pixel(p.0, p.1), A, "outline {:?}", p);
    }
    for p in [(0, 0), (10, 10), (90, 50), (50, 95), (99, 99)] {
        assert_eq!(r.get_pixel(p.0, p.1), TRANSPARENT, "exterior {:?}", p);
    }
}

#[test]
fn incremental_result_matches_full_replay() {
    let mut c = surface();
    outlined_square(&mut c);

    let mut replay = Raster::new(100, 100);
    render_full(&mut replay, None, c.history());
    assert_eq!(&replay, c.raster());
}

#[test]
fn undo_restores_the_pre_fill_raster() {
    let mut c = surface();
    c.dispatch(Action::SelectBrush(brush_by_id(1).unwrap()));
    c.dispatch(Action::SelectSwatch(Swatch::Color(A)));
    stroke(&mut c, (10.0, 50.0), (90.0, 50.0));
    let before_fill = c.raster().clone();

    c.dispatch(Action::SelectBrush(brush_by_id(5).unwrap()));
    c.dispatch(Action::SelectSwatch(Swatch::Color(B)));
    c.dispatch(Action::Click {
        pos: at(50.0, 5.0),
        button: PointerButton::Primary,
    });
    assert_ne!(c.raster(), &before_fill);

    c.dispatch(Action::Undo);
    assert_eq!(c.raster(), &before_fill);
    assert_eq!(c.history().len(), 1);
}

#[test]
fn history_window_is_bounded() {
    let mut c = surface();
    c.dispatch(Action::SelectBrush(brush_by_id(0).unwrap()));
    c.dispatch(Action::SelectSwatch(Swatch::Color(A)));
    for i in 0..(HISTORY_WINDOW + 5) {
        let y = 5.0 + i as f32 * 6.0;
        stroke(&mut c, (5.0, y), (95.0, y));
    }
    assert!(c.history().len() <= HISTORY_WINDOW);

    // Undo back as far as the window allows; nothing panics and the raster
    // never grows strokes.
    let mut previous = c.raster().clone();
    for _ in 0..(HISTORY_WINDOW + 5) {
        c.dispatch(Action::Undo);
        let now = c.raster().clone();
        let painted = |r: &Raster| r.as_raw().chunks_exact(4).filter(|px| px[3] != 0).count();
        assert!(painted(&now) <= painted(&previous));
        previous = now;
    }
}

#[test]
fn undersized_selection_is_rejected_without_touching_history() {
    let mut c = surface();
    c.dispatch(Action::SelectBrush(brush_by_id(6).unwrap()));
    c.dispatch(Action::SelectSwatch(Swatch::Color(A)));
    c.dispatch(Action::PointerDown {
        pos: at(10.0, 10.0),
        button: PointerButton::Primary,
    });
    c.dispatch(Action::PointerMove { pos: at(40.0, 40.0) });
    let fx = c.dispatch(Action::PointerUp { pos: at(40.0, 40.0) });

    assert!(c.session().is_none());
    assert!(c.history().is_empty());
    match fx.as_slice() {
        [Effect::Notify(Notice { level, message })] => {
            assert_eq!(*level, NoticeLevel::Warning);
            assert!(message.starts_with("Invalid size (30, 30) for Paint Fill."));
        }
        other => panic!("unexpected effects {:?}", other),
    }
}

fn only_request(fx: Vec<Effect>) -> PaintFillRequest {
    match fx.as_slice() {
        [Effect::RequestPaintFill(req)] => req.clone(),
        other => panic!("expected one request, got {:?}", other),
    }
}

#[test]
fn late_paint_fill_reply_does_not_override_newer_one() {
    let mut c = surface();
    c.dispatch(Action::SelectBrush(brush_by_id(6).unwrap()));
    c.dispatch(Action::SelectSwatch(Swatch::Color(A)));
    c.dispatch(Action::PointerDown {
        pos: at(10.0, 10.0),
        button: PointerButton::Primary,
    });
    c.dispatch(Action::PointerMove { pos: at(70.0, 70.0) });
    let opened = only_request(c.dispatch(Action::PointerUp { pos: at(70.0, 70.0) }));
    c.dispatch(Action::PaintFillResponse {
        session: opened.session,
        seq: opened.seq,
        result: Raster::new(60, 60),
    });

    let live = only_request(c.dispatch(Action::PointerDown {
        pos: at(20.0, 20.0),
        button: PointerButton::Primary,
    }));
    let settled = only_request(c.dispatch(Action::PointerUp { pos: at(20.0, 20.0) }));
    assert!(settled.seq > live.seq);

    c.dispatch(Action::PaintFillResponse {
        session: settled.session,
        seq: settled.seq,
        result: Raster::new_filled(60, 60, A),
    });
    c.dispatch(Action::PaintFillResponse {
        session: live.session,
        seq: live.seq,
        result: Raster::new_filled(60, 60, B),
    });

    c.dispatch(Action::ApplyPaintFill);
    assert!(c.session().is_none());
    assert_eq!(c.raster().get_pixel(10, 10), A);
    assert_eq!(c.raster().get_pixel(69, 69), A);
    assert_eq!(c.raster().get_pixel(70, 70), TRANSPARENT);
}

#[test]
fn save_then_advance_through_memory_backend() {
    let file = |id: i64| FileRecord {
        id,
        job_id: 3,
        signed_url: format!("memory://files/{}", id),
    };
    let backend = MemoryBackend::new()
        .with_file(file(1), Raster::new(100, 100))
        .with_file(file(2), Raster::new(100, 100))
        .with_categories(vec![Category {
            id: 1,
            name: "Road".into(),
            color: "#ff0000".into(),
            job_id: 3,
        }]);

    let record = backend.fetch_file(1).unwrap();
    let mut project = AnnotationProject::new(record, None, 1.0);
    project.set_categories(backend.fetch_categories(3).unwrap());
    project.controller.dispatch(Action::Resize {
        viewport: Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 200.0)),
    });
    project
        .controller
        .dispatch(Action::SourceLoaded(backend.fetch_image("memory://files/1").unwrap()));
    assert!(project.select_category(0));
    outlined_square(&mut project.controller);

    let upload = project.prepare_save().unwrap();
    backend.save_annotation(&upload).unwrap();
    project.finish_save(true);
    assert_eq!(project.save_status(), SaveStatus::Saved);

    let saved = backend.fetch_annotation(1).unwrap();
    assert_eq!(saved.file_id, 1);
    assert_eq!(&backend.fetch_image(&saved.image_url).unwrap(), project.controller.raster());
    let cats: Vec<Category> = serde_json::from_str(&backend.uploads()[0].categories).unwrap();
    assert_eq!(cats.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, -1, -2]);

    assert_eq!(backend.fetch_next_file(1).unwrap().map(|f| f.id), Some(2));
    assert_eq!(backend.fetch_next_file(2).unwrap(), None);

    // Edit mode: the saved composite comes back as the base.
    let mut resumed = DrawingController::new(1.0);
    resumed.dispatch(Action::SourceLoaded(Raster::new(100, 100)));
    resumed.dispatch(Action::BaseLoaded(io::from_data_url(&upload.image_data).unwrap()));
    assert_eq!(resumed.raster().get_pixel(50, 50), B);
    assert!(resumed.history().is_empty());
}
