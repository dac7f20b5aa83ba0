use crate::config::{FallbackPolicy, LocatorConfig};
use crate::locate::matcher::{count_valid_starts, find_candidates, MatchOptions};
use crate::model::{BoundingBox, ClauseQuery, TextFragment};
use crate::trace::{TraceBundle, TraceEntry, TraceSeverity, TraceStep, TraceStepType, TraceWarning};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    /// Best candidate on the expected page.
    Located,
    /// No candidate; the fallback position was used.
    Fallback,
    /// No candidate and the policy drops the clause.
    Omitted,
}

/// Final position reported for one clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClausePlacement {
    pub query: ClauseQuery,
    pub status: PlacementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
    pub candidate_count: usize,
}

impl ClausePlacement {
    /// Page and box, unless the clause was omitted.
    pub fn position(&self) -> Option<(u32, BoundingBox)> {
        Some((self.page?, self.bounding_box?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementResult {
    /// One entry per query, in input order.
    pub placements: Vec<ClausePlacement>,
    pub trace: TraceBundle,
}

/// Place every clause against one document's fragments.
///
/// Clauses are independent: a clause without candidates gets the configured
/// fallback and never aborts the batch.
pub fn place_clauses(
    fragments: &[TextFragment],
    queries: &[ClauseQuery],
    config: &LocatorConfig,
) -> PlacementResult {
    let options = config.match_options();
    let fallback = config.fallback;

    let outcomes: Vec<(ClausePlacement, TraceEntry)> = if config.parallel {
        queries
            .par_iter()
            .enumerate()
            .map(|(index, query)| place_one(fragments, index, query, &options, fallback))
            .collect()
    } else {
        queries
            .iter()
            .enumerate()
            .map(|(index, query)| place_one(fragments, index, query, &options, fallback))
            .collect()
    };

    let mut trace = TraceBundle::default();
    let mut placements = Vec::with_capacity(outcomes.len());
    for (index, (placement, entry)) in outcomes.into_iter().enumerate() {
        match placement.status {
            PlacementStatus::Located => {
                if let Some(quality) = placement.quality.filter(|q| *q < 1.0) {
                    trace.warnings.push(TraceWarning {
                        clause_index: Some(index),
                        message: format!(
                            "partial match on page {}, quality {quality:.3}",
                            placement.query.expected_page
                        ),
                        severity: TraceSeverity::Info,
                    });
                }
            }
            PlacementStatus::Fallback => trace.warnings.push(TraceWarning {
                clause_index: Some(index),
                message: format!(
                    "clause not found on page {}, reported at fallback position",
                    placement.query.expected_page
                ),
                severity: TraceSeverity::Important,
            }),
            PlacementStatus::Omitted => trace.warnings.push(TraceWarning {
                clause_index: Some(index),
                message: format!(
                    "clause not found on page {}, omitted",
                    placement.query.expected_page
                ),
                severity: TraceSeverity::Important,
            }),
        }
        trace.entries.push(entry);
        placements.push(placement);
    }

    PlacementResult { placements, trace }
}

fn place_one(
    fragments: &[TextFragment],
    index: usize,
    query: &ClauseQuery,
    options: &MatchOptions,
    fallback: FallbackPolicy,
) -> (ClausePlacement, TraceEntry) {
    let page = query.expected_page;
    let fragments_on_page = fragments.iter().filter(|f| f.page == page).count();
    let valid_starts = count_valid_starts(fragments, &query.text, page);
    let candidates = find_candidates(fragments, &query.text, page, options);
    debug!(
        clause = index,
        page,
        candidates = candidates.len(),
        "located clause candidates"
    );

    let mut steps = vec![
        TraceStep {
            step_type: TraceStepType::FilterPage,
            message: format!("{fragments_on_page} fragments on page {page}"),
        },
        TraceStep {
            step_type: TraceStepType::FindStarts,
            message: format!("{valid_starts} fragments begin the clause"),
        },
    ];

    let placement = match candidates.first() {
        Some(best) => {
            steps.push(TraceStep {
                step_type: TraceStepType::RankCandidates,
                message: format!(
                    "{} candidates, best quality {:.3} at {}",
                    candidates.len(),
                    best.quality,
                    best.bounding_box
                ),
            });
            ClausePlacement {
                query: query.clone(),
                status: PlacementStatus::Located,
                page: Some(best.page),
                bounding_box: Some(best.bounding_box),
                quality: Some(best.quality),
                candidate_count: candidates.len(),
            }
        }
        None => match fallback {
            FallbackPolicy::ZeroBox { page: fallback_page } => {
                warn!(
                    clause = index,
                    expected_page = page,
                    fallback_page,
                    "clause not found, using fallback position"
                );
                steps.push(TraceStep {
                    step_type: TraceStepType::ApplyFallback,
                    message: format!("zero box on page {fallback_page}"),
                });
                ClausePlacement {
                    query: query.clone(),
                    status: PlacementStatus::Fallback,
                    page: Some(fallback_page),
                    bounding_box: Some(BoundingBox::zero()),
                    quality: None,
                    candidate_count: 0,
                }
            }
            FallbackPolicy::Omit => {
                warn!(clause = index, expected_page = page, "clause not found, omitting");
                steps.push(TraceStep {
                    step_type: TraceStepType::ApplyFallback,
                    message: "omitted".into(),
                });
                ClausePlacement {
                    query: query.clone(),
                    status: PlacementStatus::Omitted,
                    page: None,
                    bounding_box: None,
                    quality: None,
                    candidate_count: 0,
                }
            }
        },
    };

    let entry = TraceEntry {
        entry_id: format!("clause_{index}"),
        clause_index: index,
        expected_page: page,
        fragments_on_page,
        valid_starts,
        candidate_count: candidates.len(),
        chosen_quality: placement.quality,
        steps,
    };

    (placement, entry)
}
