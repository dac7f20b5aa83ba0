use clausemap_core::config::{load_config, LocatorConfig};
use clausemap_core::error::ClauseMapError;
use clausemap_core::locate::{ClausePlacement, PlacementStatus};
use clausemap_core::model::{BoundingBox, ClauseQuery};
use clausemap_core::trace::TraceBundle;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::output;

/// Keys this command writes; stale copies in the input are dropped.
const OUTPUT_KEYS: [&str; 3] = ["position", "status", "quality"];

/// One clause as produced upstream. Fields other than `text` and `page`
/// (tags, label, explanation, ...) are carried through untouched.
#[derive(Debug, Deserialize)]
struct ClauseInput {
    text: String,
    page: u32,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct ClauseOutput {
    #[serde(flatten)]
    extra: Map<String, Value>,
    text: String,
    page: u32,
    position: BoundingBox,
    status: PlacementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<f64>,
}

#[derive(Debug, Serialize)]
struct LocateReport {
    clauses: Vec<ClauseOutput>,
    trace: TraceBundle,
}

pub fn run(
    pdf_file: PathBuf,
    clauses_file: PathBuf,
    config_file: Option<PathBuf>,
    backend: Option<&str>,
    output_format: &str,
) -> Result<(), ClauseMapError> {
    let mut config = match config_file {
        Some(path) => load_config(&path)?,
        None => LocatorConfig::default(),
    };
    config.backend = super::backend_or(backend, config.backend)?;

    let clauses_json = std::fs::read_to_string(&clauses_file)?;
    let inputs: Vec<ClauseInput> = serde_json::from_str(&clauses_json)?;
    let queries: Vec<ClauseQuery> = inputs
        .iter()
        .map(|c| ClauseQuery::new(c.text.clone(), c.page))
        .collect();

    let pdf_bytes = std::fs::read(&pdf_file)?;
    let extractor = config.backend.extractor();
    let result = clausemap_core::locate_pdf(&pdf_bytes, extractor.as_ref(), &queries, &config)?;

    match output_format {
        "json" => {
            let report = LocateReport {
                clauses: merge(inputs, &result.placements),
                trace: result.trace,
            };
            output::json::print(&report)?;
        }
        _ => print!("{}", output::table::format_placements(&result.placements)),
    }

    Ok(())
}

/// Re-attach positions to the caller's clause records. Omitted clauses are
/// left out.
fn merge(inputs: Vec<ClauseInput>, placements: &[ClausePlacement]) -> Vec<ClauseOutput> {
    inputs
        .into_iter()
        .zip(placements)
        .filter_map(|(input, placement)| {
            let (page, position) = placement.position()?;
            let mut extra = input.extra;
            for key in OUTPUT_KEYS {
                extra.remove(key);
            }
            Some(ClauseOutput {
                extra,
                text: input.text,
                page,
                position,
                status: placement.status,
                quality: placement.quality,
            })
        })
        .collect()
}
