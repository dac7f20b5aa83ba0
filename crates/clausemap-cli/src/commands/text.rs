use clausemap_core::error::ClauseMapError;
use clausemap_core::extraction::BackendKind;
use std::path::PathBuf;

pub fn run(pdf_file: PathBuf, backend: Option<&str>) -> Result<(), ClauseMapError> {
    let pdf_bytes = std::fs::read(&pdf_file)?;
    let extractor = super::backend_or(backend, BackendKind::default())?.extractor();
    let text = clausemap_core::extract_text(&pdf_bytes, extractor.as_ref())?;
    print!("{text}");
    Ok(())
}
