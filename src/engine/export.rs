//! Export of finished composites as downloadable PNG files

use std::path::{Path, PathBuf};

use base64::Engine;
use bytes::Bytes;
use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::info;

use super::compositor::CompositeCanvas;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A composite ready to be handed to the user as a file
#[derive(Debug, Clone)]
pub struct ExportedImage {
    /// Which canvas this came from, e.g. "pbp"
    pub label: String,
    pub filename: String,
    pub bytes: Bytes,
}

impl ExportedImage {
    pub fn content_type(&self) -> &'static str {
        "image/png"
    }

    pub fn data_uri(&self) -> String {
        png_data_uri(&self.bytes)
    }
}

/// `YYMMDD_<width>x<height>.png`
pub fn export_filename(date: NaiveDate, width: u32, height: u32) -> String {
    format!("{}_{}x{}.png", date.format("%y%m%d"), width, height)
}

pub fn png_data_uri(bytes: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Package a composite for download, named after the given date
pub fn export_on(canvas: &CompositeCanvas, label: &str, date: NaiveDate) -> ExportedImage {
    ExportedImage {
        label: label.to_string(),
        filename: export_filename(date, canvas.width(), canvas.height()),
        bytes: canvas.png.clone(),
    }
}

/// Package a composite for download, named after today's local date
pub fn export(canvas: &CompositeCanvas, label: &str) -> ExportedImage {
    export_on(canvas, label, Local::now().date_naive())
}

/// Write an export into `dir` under its filename. Existing files are overwritten.
pub async fn save_to_dir(dir: &Path, exported: &ExportedImage) -> Result<PathBuf, ExportError> {
    let path = dir.join(&exported.filename);

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ExportError::Write { path: dir.to_path_buf(), source })?;
    tokio::fs::write(&path, &exported.bytes)
        .await
        .map_err(|source| ExportError::Write { path: path.clone(), source })?;

    info!(
        path = %path.display(),
        label = %exported.label,
        bytes = exported.bytes.len(),
        "Saved composite"
    );

    Ok(path)
}
