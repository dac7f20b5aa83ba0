use serde::{Deserialize, Serialize};

pub const TRACE_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceSeverity {
    /// The clause has no real position.
    Important,
    /// Positioned, but only part of the clause was matched.
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStepType {
    FilterPage,
    FindStarts,
    RankCandidates,
    ApplyFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub step_type: TraceStepType,
    pub message: String,
}

/// How one clause was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub entry_id: String,
    pub clause_index: usize,
    pub expected_page: u32,
    pub fragments_on_page: usize,
    /// Fragments whose text is a prefix of the clause.
    pub valid_starts: usize,
    pub candidate_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_quality: Option<f64>,
    pub steps: Vec<TraceStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceWarning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause_index: Option<usize>,
    pub message: String,
    pub severity: TraceSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceBundle {
    pub trace_schema_version: String,
    pub entries: Vec<TraceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<TraceWarning>,
}

impl Default for TraceBundle {
    fn default() -> Self {
        Self {
            trace_schema_version: TRACE_SCHEMA_VERSION.to_string(),
            entries: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bundle_omits_warnings() {
        let json = serde_json::to_value(TraceBundle::default()).unwrap();
        assert_eq!(json["trace_schema_version"], TRACE_SCHEMA_VERSION);
        assert!(json.get("warnings").is_none());
    }

    #[test]
    fn test_step_type_is_snake_case() {
        let step = TraceStep {
            step_type: TraceStepType::RankCandidates,
            message: "2 candidates".into(),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step_type"], "rank_candidates");
    }
}
