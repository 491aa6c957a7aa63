//! Service client for the annotation backend.
//!
//! [`AnnotationBackend`] has one method per remote call the surface makes.
//! [`HttpBackend`] talks JSON over blocking `reqwest`; it is only ever called
//! from rayon workers, never from the UI thread. [`MemoryBackend`] serves the
//! same calls in-process for offline sessions and tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::components::paint_fill::{MASK_KEEP, PaintFillRequest};
use crate::components::tools::Category;
use crate::io::{self, CodecError};
use crate::raster::{Raster, TRANSPARENT};

// ============================================================================
// WIRE TYPES
// ============================================================================

/// File metadata record. Unknown fields are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub job_id: i64,
    pub signed_url: String,
}

/// Body of `POST file_annotations`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationUpload {
    /// JSON-encoded category list (a string inside the JSON body).
    pub categories: String,
    pub file_id: i64,
    /// PNG data URL of the flattened composite.
    pub image_data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub file_id: i64,
    pub image_url: String,
}

/// Body of `POST paint_fill`.
#[derive(Clone, Debug, Serialize)]
pub struct PaintFillBody {
    pub color: [u8; 3],
    #[serde(rename = "dataString")]
    pub data_string: String,
    #[serde(rename = "maskData")]
    pub mask_data: String,
    /// Reserved by the service; always empty.
    pub points: Vec<[i64; 2]>,
}

impl PaintFillBody {
    pub fn from_request(request: &PaintFillRequest) -> Result<Self, CodecError> {
        Ok(Self {
            color: request.color,
            data_string: io::to_data_url(&request.patch)?,
            mask_data: io::to_data_url(&request.mask)?,
            points: Vec::new(),
        })
    }
}

#[derive(Deserialize)]
struct PaintFillReply {
    image_data: String,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum ServiceError {
    Http(reqwest::Error),
    /// Non-success HTTP status.
    Status(u16),
    Codec(CodecError),
    NotFound(String),
    Backend(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Http(e) => write!(f, "Request failed: {}", e),
            ServiceError::Status(code) => write!(f, "HTTP error: {}", code),
            ServiceError::Codec(e) => write!(f, "{}", e),
            ServiceError::NotFound(what) => write!(f, "Not found: {}", what),
            ServiceError::Backend(e) => write!(f, "Backend error: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ServiceError::Status(status.as_u16()),
            None => ServiceError::Http(e),
        }
    }
}

impl From<CodecError> for ServiceError {
    fn from(e: CodecError) -> Self {
        ServiceError::Codec(e)
    }
}

// ============================================================================
// BACKEND TRAIT
// ============================================================================

pub trait AnnotationBackend: Send + Sync {
    fn fetch_file(&self, file_id: i64) -> Result<FileRecord, ServiceError>;
    /// `Ok(None)` once there is nothing left to annotate.
    fn fetch_next_file(&self, file_id: i64) -> Result<Option<FileRecord>, ServiceError>;
    fn fetch_categories(&self, job_id: i64) -> Result<Vec<Category>, ServiceError>;
    fn save_annotation(&self, upload: &AnnotationUpload) -> Result<(), ServiceError>;
    fn fetch_annotation(&self, annotation_id: i64) -> Result<AnnotationRecord, ServiceError>;
    /// Download and decode an image (signed file URL or saved annotation URL).
    fn fetch_image(&self, url: &str) -> Result<Raster, ServiceError>;
    fn paint_fill(&self, request: &PaintFillRequest) -> Result<Raster, ServiceError>;
}

// ============================================================================
// HTTP BACKEND
// ============================================================================

pub struct HttpBackend {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let url = self.url(path);
        crate::log_info!("GET {}", url);
        let response = self.client.get(&url).send()?.error_for_status()?;
        Ok(response.json()?)
    }
}

impl AnnotationBackend for HttpBackend {
    fn fetch_file(&self, file_id: i64) -> Result<FileRecord, ServiceError> {
        self.get_json(&format!("files/{}", file_id))
    }

    fn fetch_next_file(&self, file_id: i64) -> Result<Option<FileRecord>, ServiceError> {
        match self.get_json(&format!("files/{}/next", file_id)) {
            Ok(file) => Ok(Some(file)),
            Err(ServiceError::Status(404)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn fetch_categories(&self, job_id: i64) -> Result<Vec<Category>, ServiceError> {
        let url = self.url("categories");
        crate::log_info!("GET {}?job_id={}", url, job_id);
        let response = self
            .client
            .get(&url)
            .query(&[("job_id", job_id)])
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    fn save_annotation(&self, upload: &AnnotationUpload) -> Result<(), ServiceError> {
        let url = self.url("file_annotations");
        crate::log_info!("POST {} (file {})", url, upload.file_id);
        self.client
            .post(&url)
            .json(upload)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn fetch_annotation(&self, annotation_id: i64) -> Result<AnnotationRecord, ServiceError> {
        self.get_json(&format!("file_annotations/{}", annotation_id))
    }

    fn fetch_image(&self, url: &str) -> Result<Raster, ServiceError> {
        if url.starts_with("data:") {
            return Ok(io::from_data_url(url)?);
        }
        crate::log_info!("GET image {}", url);
        let bytes = self.client.get(url).send()?.error_for_status()?.bytes()?;
        Ok(io::decode_image(&bytes)?)
    }

    fn paint_fill(&self, request: &PaintFillRequest) -> Result<Raster, ServiceError> {
        let url = self.url("paint_fill");
        crate::log_info!(
            "POST {} (session {}, #{})",
            url,
            request.session,
            request.seq
        );
        let body = PaintFillBody::from_request(request)?;
        let reply: PaintFillReply = self
            .client
            .post(&url)
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(io::from_data_url(&reply.image_data)?)
    }
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

#[derive(Default)]
struct MemoryState {
    images: HashMap<String, Raster>,
    annotations: HashMap<i64, AnnotationRecord>,
    uploads: Vec<AnnotationUpload>,
}

/// In-process backend. Files are served in id order; paint fill colours the
/// pixels the mask marks as keep.
#[derive(Default)]
pub struct MemoryBackend {
    files: Vec<FileRecord>,
    categories: Vec<Category>,
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file: FileRecord, image: Raster) -> Self {
        if let Ok(state) = self.state.get_mut() {
            state.images.insert(file.signed_url.clone(), image);
        }
        self.files.push(file);
        self.files.sort_by_key(|f| f.id);
        self
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    /// Uploads received so far, oldest first.
    pub fn uploads(&self) -> Vec<AnnotationUpload> {
        self.state
            .lock()
            .map(|s| s.uploads.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, ServiceError> {
        self.state
            .lock()
            .map_err(|_| ServiceError::Backend("memory backend lock poisoned".into()))
    }
}

impl AnnotationBackend for MemoryBackend {
    fn fetch_file(&self, file_id: i64) -> Result<FileRecord, ServiceError> {
        self.files
            .iter()
            .find(|f| f.id == file_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("file {}", file_id)))
    }

    fn fetch_next_file(&self, file_id: i64) -> Result<Option<FileRecord>, ServiceError> {
        Ok(self.files.iter().find(|f| f.id > file_id).cloned())
    }

    fn fetch_categories(&self, job_id: i64) -> Result<Vec<Category>, ServiceError> {
        Ok(self
            .categories
            .iter()
            .filter(|c| c.job_id == job_id || c.job_id == 0)
            .cloned()
            .collect())
    }

    fn save_annotation(&self, upload: &AnnotationUpload) -> Result<(), ServiceError> {
        let image = io::from_data_url(&upload.image_data)?;
        let mut state = self.lock()?;
        let id = state.uploads.len() as i64 + 1;
        let image_url = format!("memory://file_annotations/{}", id);
        state.images.insert(image_url.clone(), image);
        state.annotations.insert(
            id,
            AnnotationRecord {
                file_id: upload.file_id,
                image_url,
            },
        );
        state.uploads.push(upload.clone());
        Ok(())
    }

    fn fetch_annotation(&self, annotation_id: i64) -> Result<AnnotationRecord, ServiceError> {
        self.lock()?
            .annotations
            .get(&annotation_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("annotation {}", annotation_id)))
    }

    fn fetch_image(&self, url: &str) -> Result<Raster, ServiceError> {
        if url.starts_with("data:") {
            return Ok(io::from_data_url(url)?);
        }
        self.lock()?
            .images
            .get(url)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(url.to_string()))
    }

    fn paint_fill(&self, request: &PaintFillRequest) -> Result<Raster, ServiceError> {
        let (w, h) = request.patch.dimensions();
        let [r, g, b] = request.color;
        let mut out = Raster::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let px = if request.mask.get_pixel(x, y) == MASK_KEEP {
                    image::Rgba([r, g, b, 255])
                } else {
                    TRANSPARENT
                };
                out.put_pixel(x, y, px);
            }
        }
        Ok(out)
    }
}
