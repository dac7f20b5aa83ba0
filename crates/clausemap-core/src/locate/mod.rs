pub mod matcher;
pub mod normalize;
pub mod placement;

pub use matcher::{find_candidates, MatchOptions, DEFAULT_MAX_EXTENSION};
pub use placement::{place_clauses, ClausePlacement, PlacementResult, PlacementStatus};

use crate::model::{ClauseMatch, TextFragment};

/// Candidates for one clause on its expected page, best first, using the
/// default extension window.
pub fn locate_clause(
    fragments: &[TextFragment],
    clause_text: &str,
    expected_page: u32,
) -> Vec<ClauseMatch> {
    find_candidates(fragments, clause_text, expected_page, &MatchOptions::default())
}
