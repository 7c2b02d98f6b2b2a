//! Text extraction from uploaded files.
//!
//! Plain-text formats are read directly; binary document formats (PDF,
//! DOCX, spreadsheets) are rejected as unsupported — parsing them is the
//! job of a dedicated extraction service in front of this one.

use std::path::Path;

use crate::error::PipelineError;

const BINARY_FORMATS: &[&str] = &["pdf", "docx", "doc", "xls", "xlsx", "ppt", "pptx"];

/// Read the extracted text of the file at `path`.
pub fn extract_text(path: &Path) -> Result<String, PipelineError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    if BINARY_FORMATS.contains(&ext.as_str()) {
        return Err(PipelineError::UnsupportedFormat(ext));
    }

    let bytes = std::fs::read(path)
        .map_err(|e| PipelineError::CorruptFile(format!("{}: {e}", path.display())))?;

    // Tolerate stray invalid sequences the way the upload path tolerates
    // arbitrary text files.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
