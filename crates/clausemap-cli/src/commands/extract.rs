use clausemap_core::error::ClauseMapError;
use clausemap_core::extraction::BackendKind;
use std::path::PathBuf;

use crate::output;

pub fn run(
    pdf_file: PathBuf,
    output_format: &str,
    backend: Option<&str>,
) -> Result<(), ClauseMapError> {
    let pdf_bytes = std::fs::read(&pdf_file)?;
    let extractor = super::backend_or(backend, BackendKind::default())?.extractor();
    let layout = clausemap_core::extract_document(&pdf_bytes, extractor.as_ref())?;

    match output_format {
        "json" => output::json::print(&layout)?,
        _ => print!("{}", output::table::format_layout(&layout)),
    }

    Ok(())
}
