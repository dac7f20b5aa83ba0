pub mod content_stream;
pub mod fonts;
pub mod geometry;
pub mod pdftotext;

use crate::error::ClauseMapError;
use crate::model::DocumentLayout;
use lopdf::{Document, Object};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait for PDF layout extraction backends.
pub trait LayoutExtractor: Send + Sync {
    /// Extract positioned text fragments from PDF bytes.
    ///
    /// Fragments are grouped by increasing page number and keep
    /// content-stream order within a page.
    fn extract(&self, pdf_bytes: &[u8]) -> Result<DocumentLayout, ClauseMapError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Selectable extraction backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process content-stream interpretation (lopdf).
    #[default]
    Native,
    /// poppler's `pdftotext -bbox`, one fragment per word.
    Pdftotext,
}

impl BackendKind {
    pub fn extractor(self) -> Box<dyn LayoutExtractor> {
        match self {
            BackendKind::Native => Box::new(content_stream::ContentStreamExtractor::new()),
            BackendKind::Pdftotext => Box::new(pdftotext::PdftotextExtractor::new()),
        }
    }

    pub fn from_str_loose(s: &str) -> Option<BackendKind> {
        match s.trim().to_lowercase().as_str() {
            "native" | "lopdf" => Some(BackendKind::Native),
            "pdftotext" | "poppler" => Some(BackendKind::Pdftotext),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native"),
            BackendKind::Pdftotext => write!(f, "pdftotext"),
        }
    }
}

/// Follow an indirect reference; direct objects are returned as-is.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}
