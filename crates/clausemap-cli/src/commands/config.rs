use clausemap_core::config::{FallbackPolicy, LocatorConfig};
use clausemap_core::error::ClauseMapError;
use std::path::Path;

use crate::output;

pub fn show() -> Result<(), ClauseMapError> {
    output::json::print(&LocatorConfig::default())
}

pub fn schema() -> Result<(), ClauseMapError> {
    print!(
        r#"Locator Config Schema
=====================

A config file tunes how `clausemap locate` matches clause text against
the fragments of a page. Every field is optional.

Fields:
  max_extension (integer, default 50)
                How many fragments past its first fragment a match may
                grow. Clauses longer than this many fragments are reported
                as partial matches. Range: 1 to 1000.
  fallback      (object, default {{"policy": "zero_box", "page": 1}})
                What to report when a clause is not found on its page.
                  {{"policy": "zero_box", "page": N}}
                      A 0x0 box at the top-left corner of page N.
                  {{"policy": "omit"}}
                      Leave the clause out of the output.
  backend       (string, default "native")
                "native" reads content streams in-process.
                "pdftotext" runs poppler's `pdftotext -bbox` (one
                fragment per word).
  parallel      (boolean, default true)
                Locate clauses on all cores. Output order is unaffected.

Example:
{{
  "max_extension": 80,
  "fallback": {{ "policy": "omit" }},
  "backend": "native",
  "parallel": true
}}

Clause files passed with --clauses are JSON arrays of objects with
"text" and "page". Other fields are copied to the output unchanged.
"#
    );
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), ClauseMapError> {
    let config = clausemap_core::config::load_config(file)?;

    println!("Config '{}' is valid.", file.display());
    println!("  max_extension: {}", config.max_extension);
    match config.fallback {
        FallbackPolicy::ZeroBox { page } => println!("  fallback: zero box on page {page}"),
        FallbackPolicy::Omit => println!("  fallback: omit"),
    }
    println!("  backend: {}", config.backend);
    println!("  parallel: {}", config.parallel);

    Ok(())
}
