// ============================================================================
// Annotator CLI: launch arguments and headless export
// ============================================================================
//
// Usage examples:
//   annotator --file-id 42                          (annotate file 42, job taken from the file)
//   annotator --file-id 42 --job-id 7 --api-url https://host/api
//   annotator --annotation-id 913                   (continue a saved annotation)
//   annotator --image street.jpg --output street_mask.png   (offline, no services)
//   annotator --annotation-id 913 --export mask.png (headless: download a saved composite)

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::api::{AnnotationBackend, HttpBackend};
use crate::io;
use crate::settings::AnnotatorSettings;

/// Raster annotation surface.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "annotator",
    about = "Paint, fill and paint-fill annotation masks over images",
    long_about = "Opens the annotation surface for one file of an annotation job.\n\
                  With --image the surface runs offline against a local file and\n\
                  saves the composite to --output. With --export nothing is shown:\n\
                  the saved composite of --annotation-id is written to disk."
)]
pub struct CliArgs {
    /// File to annotate.
    #[arg(long, value_name = "ID")]
    pub file_id: Option<i64>,

    /// Job whose categories are offered. Defaults to the file's job.
    #[arg(long, value_name = "ID")]
    pub job_id: Option<i64>,

    /// Saved annotation to continue drawing on (edit mode).
    #[arg(long, value_name = "ID", conflicts_with = "image")]
    pub annotation_id: Option<i64>,

    /// Service base URL; overrides the settings file and ANNOTATOR_API_URL.
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Annotate a local image without any services.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["file_id", "annotation_id"])]
    pub image: Option<PathBuf>,

    /// Where offline saves are written. Defaults to `<image stem>_annotation.png`.
    #[arg(short, long, value_name = "FILE", requires = "image")]
    pub output: Option<PathBuf>,

    /// Headless: write the saved composite of --annotation-id to this PNG and exit.
    #[arg(long, value_name = "FILE", requires = "annotation_id")]
    pub export: Option<PathBuf>,
}

/// What the surface should open.
#[derive(Clone, Debug, PartialEq)]
pub enum LaunchTarget {
    File { file_id: i64, job_id: Option<i64> },
    Annotation { annotation_id: i64, job_id: Option<i64> },
    Offline { image: PathBuf, output: PathBuf },
}

impl CliArgs {
    /// Headless mode runs without opening a window.
    pub fn is_headless(&self) -> bool {
        self.export.is_some()
    }

    pub fn target(&self) -> Result<LaunchTarget, String> {
        if let Some(image) = &self.image {
            let output = self
                .output
                .clone()
                .unwrap_or_else(|| default_output_path(image));
            return Ok(LaunchTarget::Offline {
                image: image.clone(),
                output,
            });
        }
        if let Some(annotation_id) = self.annotation_id {
            return Ok(LaunchTarget::Annotation {
                annotation_id,
                job_id: self.job_id,
            });
        }
        match self.file_id {
            Some(file_id) => Ok(LaunchTarget::File {
                file_id,
                job_id: self.job_id,
            }),
            None => Err("one of --file-id, --annotation-id or --image is required".to_string()),
        }
    }

    /// Settings with the command-line override applied.
    pub fn apply_to(&self, settings: &mut AnnotatorSettings) {
        if let Some(url) = &self.api_url {
            settings.api_url = url.trim_end_matches('/').to_string();
        }
    }
}

fn default_output_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    image.with_file_name(format!("{}_annotation.png", stem))
}

/// Headless export of a saved annotation.
pub fn run(args: CliArgs, settings: &AnnotatorSettings) -> ExitCode {
    let (Some(annotation_id), Some(output)) = (args.annotation_id, args.export.as_ref()) else {
        eprintln!("Error: --export needs --annotation-id");
        return ExitCode::FAILURE;
    };

    let start = Instant::now();
    let backend = match HttpBackend::new(&settings.api_url, settings.request_timeout()) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match export_annotation(&backend, annotation_id, output) {
        Ok((w, h)) => {
            println!(
                "Exported annotation {} ({}x{}) to {} in {:.1}s",
                annotation_id,
                w,
                h,
                output.display(),
                start.elapsed().as_secs_f32()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            crate::log_err!("export of annotation {} failed: {}", annotation_id, e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Fetch the annotation record, download its image and write it as PNG.
pub fn export_annotation(
    backend: &dyn AnnotationBackend,
    annotation_id: i64,
    output: &Path,
) -> Result<(u32, u32), String> {
    let record = backend
        .fetch_annotation(annotation_id)
        .map_err(|e| e.to_string())?;
    let image = backend
        .fetch_image(&record.image_url)
        .map_err(|e| e.to_string())?;
    io::save_png(&image, output).map_err(|e| e.to_string())?;
    Ok(image.dimensions())
}
