use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ClauseMapError {
    #[error("PDF extraction failed: {0}")]
    Extraction(String),

    #[error("encrypted PDF documents are not supported")]
    Encrypted,

    #[error("PDF document has no pages")]
    NoPages,

    #[error("pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftotextNotFound,

    #[error("pdftotext failed with exit code {code}: {stderr}")]
    PdftotextFailed { code: i32, stderr: String },

    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClauseMapError {
    /// True when the document itself could not be turned into fragments.
    ///
    /// Callers mark the owning document as failed on these; they are not
    /// worth retrying with the same bytes.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            ClauseMapError::Extraction(_)
                | ClauseMapError::Encrypted
                | ClauseMapError::NoPages
                | ClauseMapError::PdftotextNotFound
                | ClauseMapError::PdftotextFailed { .. }
        )
    }
}
