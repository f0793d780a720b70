//! File admission rules applied when files are enqueued.
//!
//! The processing backend only understands a fixed set of document
//! formats, so files with other extensions are rejected up front unless
//! the caller opts out of the check.

use std::path::Path;

use crate::error::CoreError;

/// Extensions the processing backend accepts (lower-case, without dot).
pub const ACCEPTED_EXTENSIONS: &[&str] = &[
    "html", "htm", "txt", "json", "xml", "csv", "xls", "xlsx", "pdf",
];

/// Check whether `file_name` carries one of [`ACCEPTED_EXTENSIONS`].
pub fn is_accepted_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ACCEPTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Derive the identity key (the bare file name) for a path.
pub fn file_name_of(path: &Path) -> Result<String, CoreError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            CoreError::Validation(format!("path {} has no usable file name", path.display()))
        })
}

/// Validate a file for submission and return its identity key.
///
/// When `any_type` is set the extension check is skipped.
pub fn admit(path: &Path, any_type: bool) -> Result<String, CoreError> {
    let name = file_name_of(path)?;
    if !any_type && !is_accepted_extension(&name) {
        return Err(CoreError::UnsupportedFileType(name));
    }
    Ok(name)
}
