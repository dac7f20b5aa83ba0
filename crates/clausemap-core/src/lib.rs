pub mod config;
pub mod error;
pub mod extraction;
pub mod locate;
pub mod model;
pub mod trace;

use config::LocatorConfig;
use error::ClauseMapError;
use extraction::LayoutExtractor;
use model::{ClauseMatch, ClauseQuery, DocumentLayout, TextFragment};
use tracing::info;

pub use locate::{place_clauses, PlacementResult};

/// Extract pages and positioned fragments from PDF bytes.
pub fn extract_document(
    pdf_bytes: &[u8],
    extractor: &dyn LayoutExtractor,
) -> Result<DocumentLayout, ClauseMapError> {
    info!(
        backend = extractor.backend_name(),
        bytes = pdf_bytes.len(),
        "extracting layout"
    );
    extractor.extract(pdf_bytes)
}

/// Extract the positioned fragments of every page, in page order.
pub fn extract_layout(
    pdf_bytes: &[u8],
    extractor: &dyn LayoutExtractor,
) -> Result<Vec<TextFragment>, ClauseMapError> {
    Ok(extract_document(pdf_bytes, extractor)?.fragments)
}

/// Plain text of the document: each page's fragments joined with spaces,
/// every page followed by a blank line.
pub fn extract_text(
    pdf_bytes: &[u8],
    extractor: &dyn LayoutExtractor,
) -> Result<String, ClauseMapError> {
    Ok(extract_document(pdf_bytes, extractor)?.plain_text())
}

/// Candidates for one clause on its expected page, best first.
pub fn locate_clause(
    fragments: &[TextFragment],
    clause_text: &str,
    expected_page: u32,
) -> Vec<ClauseMatch> {
    locate::locate_clause(fragments, clause_text, expected_page)
}

/// Main API entry point: extract a PDF and place every clause on it.
///
/// Extraction errors propagate. Clauses that cannot be located are resolved
/// by the configured fallback policy instead.
pub fn locate_pdf(
    pdf_bytes: &[u8],
    extractor: &dyn LayoutExtractor,
    queries: &[ClauseQuery],
    config: &LocatorConfig,
) -> Result<PlacementResult, ClauseMapError> {
    let layout = extract_document(pdf_bytes, extractor)?;
    let result = place_clauses(&layout.fragments, queries, config);

    let located = result
        .placements
        .iter()
        .filter(|p| p.status == locate::PlacementStatus::Located)
        .count();
    info!(
        clauses = queries.len(),
        located,
        pages = layout.page_count(),
        "placed clauses"
    );
    Ok(result)
}
