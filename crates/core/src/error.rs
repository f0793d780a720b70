#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("File {0} is already queued or in flight")]
    DuplicateFile(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
}
