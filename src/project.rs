use uuid::Uuid;

use crate::api::{AnnotationUpload, FileRecord};
use crate::components::tools::{BrushChoice, Category, Swatch, brush_by_id, with_sentinels};
use crate::controller::{Action, DrawingController};
use crate::io::{self, CodecError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveStatus {
    Dirty,
    Saving,
    Saved,
}

impl SaveStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SaveStatus::Dirty => "Save",
            SaveStatus::Saving => "Saving",
            SaveStatus::Saved => "Saved",
        }
    }
}

/// One file being annotated: its record, the category palette, the drawing
/// controller and the save state.
pub struct AnnotationProject {
    pub id: Uuid,
    pub file: FileRecord,
    /// Saved composite to continue from (edit mode).
    pub base_image_url: Option<String>,
    pub controller: DrawingController,
    categories: Vec<Category>,
    active_category: usize,
    save_status: SaveStatus,
}

impl AnnotationProject {
    pub fn new(file: FileRecord, base_image_url: Option<String>, initial_zoom: f32) -> Self {
        let mut project = Self {
            id: Uuid::new_v4(),
            file,
            base_image_url,
            controller: DrawingController::new(initial_zoom),
            categories: Vec::new(),
            active_category: 0,
            save_status: SaveStatus::Dirty,
        };
        project.set_categories(Vec::new());
        project
    }

    // ---- categories ---------------------------------------------------------

    /// Install the served categories plus the sentinels and select Drag&Drop.
    pub fn set_categories(&mut self, served: Vec<Category>) {
        self.categories = with_sentinels(served);
        let drag = self
            .categories
            .iter()
            .position(|c| c.swatch() == Some(Swatch::Drag))
            .unwrap_or(0);
        self.select_category(drag);
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn active_category(&self) -> Option<&Category> {
        self.categories.get(self.active_category)
    }

    /// Categories with an unparseable colour cannot be selected.
    pub fn select_category(&mut self, index: usize) -> bool {
        let Some(swatch) = self.categories.get(index).and_then(Category::swatch) else {
            return false;
        };
        self.active_category = index;
        self.controller.dispatch(Action::SelectSwatch(swatch));
        true
    }

    pub fn select_brush(&mut self, id: u32) -> Option<BrushChoice> {
        let brush = brush_by_id(id)?;
        self.controller.dispatch(Action::SelectBrush(brush));
        Some(brush)
    }

    // ---- save state ---------------------------------------------------------

    pub fn save_status(&self) -> SaveStatus {
        match self.save_status {
            SaveStatus::Saved if self.controller.history().is_dirty() => SaveStatus::Dirty,
            status => status,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.save_status() == SaveStatus::Dirty
    }

    pub fn mark_dirty(&mut self) {
        self.controller.history_mut().mark_dirty();
        if self.save_status == SaveStatus::Saved {
            self.save_status = SaveStatus::Dirty;
        }
    }

    /// Snapshot the composite and category list for upload and enter
    /// `Saving`. Edits made while the upload runs mark the project dirty
    /// again.
    pub fn prepare_save(&mut self) -> Result<AnnotationUpload, CodecError> {
        let upload = AnnotationUpload {
            categories: serde_json::to_string(&self.categories)?,
            file_id: self.file.id,
            image_data: io::to_data_url(self.controller.raster())?,
        };
        self.controller.history_mut().mark_clean();
        self.save_status = SaveStatus::Saving;
        crate::log_info!("project: saving file {}", self.file.id);
        Ok(upload)
    }

    pub fn finish_save(&mut self, succeeded: bool) {
        if succeeded {
            self.save_status = SaveStatus::Saved;
            crate::log_info!("project: file {} saved", self.file.id);
        } else {
            self.save_status = SaveStatus::Dirty;
            self.controller.history_mut().mark_dirty();
            crate::log_warn!("project: save of file {} failed", self.file.id);
        }
    }

    /// Window title with a dirty marker.
    pub fn display_title(&self) -> String {
        let name = format!("File {} (job {})", self.file.id, self.file.job_id);
        if self.is_dirty() {
            format!("{}*", name)
        } else {
            name
        }
    }
}
