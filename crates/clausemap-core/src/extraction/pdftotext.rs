use crate::error::ClauseMapError;
use crate::extraction::LayoutExtractor;
use crate::model::{BoundingBox, DocumentLayout, PageInfo, TextFragment};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Write;
use std::process::Command;
use tracing::{debug, info};

/// Layout extraction backend using pdftotext (from poppler-utils).
///
/// Runs `pdftotext -bbox`, which reports one box per word with a top-left
/// origin already, so each `<word>` becomes one fragment.
pub struct PdftotextExtractor;

impl PdftotextExtractor {
    pub fn new() -> Self {
        PdftotextExtractor
    }
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutExtractor for PdftotextExtractor {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<DocumentLayout, ClauseMapError> {
        let mut tmpfile = tempfile::NamedTempFile::new()
            .map_err(|e| ClauseMapError::Extraction(e.to_string()))?;
        tmpfile
            .write_all(pdf_bytes)
            .map_err(|e| ClauseMapError::Extraction(e.to_string()))?;

        let output = Command::new("pdftotext")
            .arg("-bbox")
            .arg(tmpfile.path())
            .arg("-") // output to stdout
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ClauseMapError::PdftotextNotFound
                } else {
                    ClauseMapError::Extraction(format!("pdftotext failed: {e}"))
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(ClauseMapError::PdftotextFailed { code, stderr });
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        debug!(bytes = xml.len(), "parsing pdftotext -bbox output");
        let layout = parse_bbox_xml(&xml)?;
        if layout.pages.is_empty() {
            return Err(ClauseMapError::NoPages);
        }

        info!(
            pages = layout.pages.len(),
            fragments = layout.fragments.len(),
            "extracted document layout"
        );
        Ok(layout)
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

/// Parse the XHTML written by `pdftotext -bbox`.
fn parse_bbox_xml(xml: &str) -> Result<DocumentLayout, ClauseMapError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut layout = DocumentLayout::default();
    let mut open_word: Option<(BoundingBox, String)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ClauseMapError::Extraction(format!("malformed pdftotext output: {e}")))?;
        match event {
            Event::Start(tag) | Event::Empty(tag) if tag.name().as_ref() == b"page" => {
                let number = layout.pages.len() as u32 + 1;
                layout.pages.push(PageInfo {
                    number,
                    width: attr_f64(&tag, b"width")?.unwrap_or(0.0),
                    height: attr_f64(&tag, b"height")?.unwrap_or(0.0),
                });
            }
            Event::Start(tag) if tag.name().as_ref() == b"word" => {
                let edges = (
                    attr_f64(&tag, b"xMin")?,
                    attr_f64(&tag, b"yMin")?,
                    attr_f64(&tag, b"xMax")?,
                    attr_f64(&tag, b"yMax")?,
                );
                if let (Some(x0), Some(y0), Some(x1), Some(y1)) = edges {
                    open_word = Some((BoundingBox::from_edges(x0, y0, x1, y1), String::new()));
                }
            }
            Event::Text(text) => {
                if let Some((_, word)) = open_word.as_mut() {
                    let unescaped = text.unescape().map_err(|e| {
                        ClauseMapError::Extraction(format!("malformed pdftotext output: {e}"))
                    })?;
                    word.push_str(&unescaped);
                }
            }
            Event::End(tag) if tag.name().as_ref() == b"word" => {
                if let Some((bounding_box, word)) = open_word.take() {
                    let page = layout.pages.len() as u32;
                    if page > 0 {
                        layout
                            .fragments
                            .push(TextFragment::new(word, page, bounding_box));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(layout)
}

fn attr_f64(tag: &BytesStart<'_>, name: &[u8]) -> Result<Option<f64>, ClauseMapError> {
    for attr in tag.attributes() {
        let attr = attr
            .map_err(|e| ClauseMapError::Extraction(format!("malformed pdftotext output: {e}")))?;
        if attr.key.as_ref() == name {
            let value = attr.unescape_value().map_err(|e| {
                ClauseMapError::Extraction(format!("malformed pdftotext output: {e}"))
            })?;
            return Ok(value.trim().parse().ok());
        }
    }
    Ok(None)
}
