pub mod config;
pub mod extract;
pub mod locate;
pub mod text;

use clausemap_core::error::ClauseMapError;
use clausemap_core::extraction::BackendKind;

/// Resolve a `--backend` flag, falling back to `default` when absent.
fn backend_or(name: Option<&str>, default: BackendKind) -> Result<BackendKind, ClauseMapError> {
    match name {
        None => Ok(default),
        Some(name) => BackendKind::from_str_loose(name).ok_or_else(|| {
            ClauseMapError::ConfigInvalid(format!(
                "unknown backend '{name}' (expected 'native' or 'pdftotext')"
            ))
        }),
    }
}
