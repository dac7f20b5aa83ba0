//! Native extraction backend interpreting page content streams with lopdf.
//!
//! One fragment is emitted per text-showing operator (`Tj`, `TJ`, `'`, `"`),
//! positioned by the current text matrix and CTM and converted to
//! top-left page coordinates.

use crate::error::ClauseMapError;
use crate::extraction::fonts::{FontInfo, FontTable};
use crate::extraction::geometry::{Matrix, Rect, DEFAULT_MEDIA_BOX};
use crate::extraction::{number, resolve, LayoutExtractor};
use crate::model::{BoundingBox, DocumentLayout, PageInfo, TextFragment};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Form XObjects may invoke other forms; stop following them past this depth.
const MAX_FORM_DEPTH: usize = 8;
/// Page tree inheritance walk limit.
const MAX_TREE_DEPTH: usize = 32;
/// A `TJ` adjustment below this (thousandths of an em) reads as a word gap.
const SPACE_ADJUSTMENT_THRESHOLD: f64 = -100.0;

/// Native backend: lopdf parsing plus a small text-state interpreter.
pub struct ContentStreamExtractor;

impl ContentStreamExtractor {
    pub fn new() -> Self {
        ContentStreamExtractor
    }
}

impl Default for ContentStreamExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutExtractor for ContentStreamExtractor {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<DocumentLayout, ClauseMapError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ClauseMapError::Extraction(format!("failed to parse PDF: {e}")))?;
        extract_from_document(&doc)
    }

    fn backend_name(&self) -> &str {
        "native"
    }
}

/// Extract the layout of an already parsed document.
pub fn extract_from_document(doc: &Document) -> Result<DocumentLayout, ClauseMapError> {
    // lopdf decrypts empty-password documents on load and drops /Encrypt.
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(ClauseMapError::Encrypted);
    }

    let page_ids = doc.get_pages();
    if page_ids.is_empty() {
        return Err(ClauseMapError::NoPages);
    }

    let mut layout = DocumentLayout::default();

    // BTreeMap iteration gives increasing page numbers.
    for (&page_number, &page_id) in page_ids.iter() {
        let media_box = media_box(doc, page_id);
        let resources = inherited(doc, page_id, b"Resources")
            .and_then(|obj| resolve(doc, obj).as_dict().ok());
        let content = doc.get_page_content(page_id).map_err(|e| {
            ClauseMapError::Extraction(format!(
                "page {page_number}: cannot read content stream: {e}"
            ))
        })?;

        let mut interpreter = PageInterpreter {
            doc,
            page_number,
            media_box,
            fragments: Vec::new(),
        };
        interpreter.run(&content, resources, GraphicsState::new(), 0)?;

        debug!(
            page = page_number,
            fragments = interpreter.fragments.len(),
            "extracted page"
        );
        layout.pages.push(PageInfo {
            number: page_number,
            width: media_box.width(),
            height: media_box.height(),
        });
        layout.fragments.extend(interpreter.fragments);
    }

    info!(
        pages = layout.pages.len(),
        fragments = layout.fragments.len(),
        "extracted document layout"
    );
    Ok(layout)
}

/// Look up a page attribute, walking up the page tree for inheritable keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve(doc, parent).as_dict().ok()?;
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> Rect {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| resolve(doc, obj).as_array().ok())
        .and_then(|arr| {
            let v: Vec<f64> = arr.iter().filter_map(|o| number(resolve(doc, o))).collect();
            if v.len() < 4 {
                return None;
            }
            Rect::from_points(&[(v[0], v[1]), (v[2], v[3])])
        })
        .filter(|r| r.width() > 0.0 && r.height() > 0.0)
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

#[derive(Debug, Clone)]
struct TextState {
    font: Arc<FontInfo>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// `Tz` as a fraction (100% = 1.0).
    horizontal_scaling: f64,
    leading: f64,
    rise: f64,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

impl GraphicsState {
    fn new() -> Self {
        GraphicsState {
            ctm: Matrix::identity(),
            text: TextState {
                font: Arc::new(FontInfo::fallback()),
                font_size: 12.0,
                char_spacing: 0.0,
                word_spacing: 0.0,
                horizontal_scaling: 1.0,
                leading: 0.0,
                rise: 0.0,
            },
        }
    }
}

struct PageInterpreter<'a> {
    doc: &'a Document,
    page_number: u32,
    media_box: Rect,
    fragments: Vec<TextFragment>,
}

impl<'a> PageInterpreter<'a> {
    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) -> Result<(), ClauseMapError> {
        let content = Content::decode(content).map_err(|e| {
            ClauseMapError::Extraction(format!(
                "page {}: cannot decode content stream: {e}",
                self.page_number
            ))
        })?;
        let fonts = FontTable::from_resources(self.doc, resources);

        let mut state = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::identity();
        let mut lm = Matrix::identity();

        for op in &content.operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(prev) = stack.pop() {
                        state = prev;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operand(operands) {
                        state.ctm = m.multiply(&state.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::identity();
                    lm = Matrix::identity();
                }
                "Tc" => {
                    if let Some(v) = first_number(operands) {
                        state.text.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(v) = first_number(operands) {
                        state.text.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(v) = first_number(operands) {
                        state.text.horizontal_scaling = v / 100.0;
                    }
                }
                "TL" => {
                    if let Some(v) = first_number(operands) {
                        state.text.leading = v;
                    }
                }
                "Ts" => {
                    if let Some(v) = first_number(operands) {
                        state.text.rise = v;
                    }
                }
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(size)) =
                        (operands.first(), operands.get(1).and_then(number))
                    {
                        state.text.font = fonts.get(name);
                        state.text.font_size = size;
                    }
                }
                "Td" | "TD" => {
                    if let (Some(tx), Some(ty)) = (
                        operands.first().and_then(number),
                        operands.get(1).and_then(number),
                    ) {
                        if op.operator == "TD" {
                            state.text.leading = -ty;
                        }
                        lm = Matrix::translation(tx, ty).multiply(&lm);
                        tm = lm;
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_operand(operands) {
                        tm = m;
                        lm = m;
                    }
                }
                "T*" => next_line(&state.text, &mut tm, &mut lm),
                "Tj" => {
                    if let Some(s) = operands.first() {
                        self.show(&state, &mut tm, std::slice::from_ref(s));
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        self.show(&state, &mut tm, items);
                    }
                }
                "'" => {
                    next_line(&state.text, &mut tm, &mut lm);
                    if let Some(s) = operands.first() {
                        self.show(&state, &mut tm, std::slice::from_ref(s));
                    }
                }
                "\"" => {
                    if let [aw, ac, s, ..] = operands {
                        if let Some(aw) = number(aw) {
                            state.text.word_spacing = aw;
                        }
                        if let Some(ac) = number(ac) {
                            state.text.char_spacing = ac;
                        }
                        next_line(&state.text, &mut tm, &mut lm);
                        self.show(&state, &mut tm, std::slice::from_ref(s));
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.run_xobject(name, resources, &state, depth)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Emit one fragment for a string or `TJ` array and advance the text matrix.
    fn show(&mut self, state: &GraphicsState, tm: &mut Matrix, items: &[Object]) {
        let ts = &state.text;
        let mut text = String::new();
        let mut advance = 0.0;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    for glyph in ts.font.decode(bytes) {
                        let mut w = glyph.width / 1000.0 * ts.font_size + ts.char_spacing;
                        if glyph.is_word_space {
                            w += ts.word_spacing;
                        }
                        advance += w * ts.horizontal_scaling;
                        text.push_str(&glyph.text);
                    }
                }
                other => {
                    if let Some(adjustment) = number(other) {
                        advance -= adjustment / 1000.0 * ts.font_size * ts.horizontal_scaling;
                        if adjustment < SPACE_ADJUSTMENT_THRESHOLD
                            && !text.is_empty()
                            && !text.ends_with(' ')
                        {
                            text.push(' ');
                        }
                    }
                }
            }
        }

        let text_space = Rect::from_points(&[(0.0, ts.rise), (advance, ts.rise + ts.font_size)])
            .unwrap_or(Rect {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 0.0,
                max_y: 0.0,
            });
        let user_space = text_space.transformed(&tm.multiply(&state.ctm));

        // Flip to top-left origin relative to the MediaBox.
        let bounding_box = BoundingBox::from_edges(
            user_space.min_x - self.media_box.min_x,
            self.media_box.max_y - user_space.max_y,
            user_space.max_x - self.media_box.min_x,
            self.media_box.max_y - user_space.min_y,
        );
        self.fragments
            .push(TextFragment::new(text, self.page_number, bounding_box));

        *tm = Matrix::translation(advance, 0.0).multiply(tm);
    }

    fn run_xobject(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        state: &GraphicsState,
        depth: usize,
    ) -> Result<(), ClauseMapError> {
        let doc = self.doc;
        let Some(xobject) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
            .and_then(|d| d.get(name).ok())
        else {
            warn!(
                page = self.page_number,
                xobject = %String::from_utf8_lossy(name),
                "XObject not found in resources"
            );
            return Ok(());
        };

        let Object::Stream(stream) = resolve(doc, xobject) else {
            return Ok(());
        };
        let is_form =
            matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Form");
        if !is_form {
            return Ok(());
        }
        if depth >= MAX_FORM_DEPTH {
            warn!(
                page = self.page_number,
                depth, "form XObject nesting too deep, skipping"
            );
            return Ok(());
        }

        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_array().ok())
            .and_then(|arr| {
                let values: Vec<f64> = arr.iter().filter_map(number).collect();
                Matrix::from_slice(&values)
            })
            .unwrap_or_else(Matrix::identity);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
            .or(resources);
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let mut form_state = state.clone();
        form_state.ctm = form_matrix.multiply(&state.ctm);
        self.run(&content, form_resources, form_state, depth + 1)
    }
}

fn next_line(text: &TextState, tm: &mut Matrix, lm: &mut Matrix) {
    *lm = Matrix::translation(0.0, -text.leading).multiply(lm);
    *tm = *lm;
}

fn first_number(operands: &[Object]) -> Option<f64> {
    operands.first().and_then(number)
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    let values: Vec<f64> = operands.iter().filter_map(number).collect();
    if values.len() != operands.len() {
        return None;
    }
    Matrix::from_slice(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{Stream, StringFormat};
    use pretty_assertions::assert_eq;

    fn int(v: i64) -> Object {
        Object::Integer(v)
    }

    fn name(n: &str) -> Object {
        Object::Name(n.as_bytes().to_vec())
    }

    fn lit(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    /// Build a PDF whose pages run the given operations, optionally sharing
    /// one resource dictionary.
    fn build_pdf_with(
        pages: Vec<Vec<Operation>>,
        resources: Option<Dictionary>,
        extra: impl FnOnce(&mut Document) -> Vec<(String, ObjectId)>,
    ) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut resources = resources.unwrap_or_default();
        let xobjects = extra(&mut doc);
        if !xobjects.is_empty() {
            let dict = Dictionary::from_iter(
                xobjects
                    .into_iter()
                    .map(|(n, id)| (n, Object::Reference(id))),
            );
            resources.set("XObject", Object::Dictionary(dict));
        }

        let mut kids = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page = Dictionary::from_iter(vec![
                ("Type", name("Page")),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
                ("Resources", Object::Dictionary(resources.clone())),
            ]);
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let count = kids.len() as i64;
        let pages = Dictionary::from_iter(vec![
            ("Type", name("Pages")),
            ("Count", int(count)),
            ("Kids", Object::Array(kids)),
            (
                "MediaBox",
                Object::Array(vec![int(0), int(0), int(612), int(792)]),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", name("Catalog")),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn build_pdf(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        build_pdf_with(pages, None, |_| Vec::new())
    }

    fn text_at(x: i64, y: i64, s: &str) -> Vec<Operation> {
        vec![
            op("BT", vec![]),
            op("Tf", vec![name("F1"), int(12)]),
            op("Td", vec![int(x), int(y)]),
            op("Tj", vec![lit(s)]),
            op("ET", vec![]),
        ]
    }

    fn extract(bytes: &[u8]) -> DocumentLayout {
        ContentStreamExtractor::new().extract(bytes).unwrap()
    }

    #[test]
    fn test_single_tj_position_is_top_left_origin() {
        let layout = extract(&build_pdf(vec![text_at(100, 700, "Hello")]));
        assert_eq!(layout.fragments.len(), 1);
        let f = &layout.fragments[0];
        assert_eq!(f.text, "Hello");
        assert_eq!(f.page, 1);
        // 5 glyphs x 500/1000 x 12pt = 30pt wide, 12pt tall, baseline at 700.
        assert_eq!(f.bounding_box, BoundingBox::new(100.0, 80.0, 30.0, 12.0));
        assert_eq!(
            layout.pages,
            vec![PageInfo {
                number: 1,
                width: 612.0,
                height: 792.0
            }]
        );
    }

    #[test]
    fn test_consecutive_tj_advance_text_matrix() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![name("F1"), int(12)]),
            op("Td", vec![int(100), int(700)]),
            op("Tj", vec![lit("Hello")]),
            op("Tj", vec![lit("World")]),
            op("ET", vec![]),
        ];
        let layout = extract(&build_pdf(vec![ops]));
        assert_eq!(layout.fragments.len(), 2);
        assert_eq!(layout.fragments[1].bounding_box.left, 130.0);
    }

    #[test]
    fn test_tj_array_kerning_inserts_word_gap() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![name("F1"), int(12)]),
            op("Td", vec![int(100), int(700)]),
            op(
                "TJ",
                vec![Object::Array(vec![lit("Hello"), int(-250), lit("World")])],
            ),
            op("ET", vec![]),
        ];
        let layout = extract(&build_pdf(vec![ops]));
        let f = &layout.fragments[0];
        assert_eq!(f.text, "Hello World");
        // 30 + 3 (250/1000 x 12) + 30
        assert!((f.bounding_box.width - 63.0).abs() < 1e-9);
    }

    #[test]
    fn test_leading_and_quote_operator() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![name("F1"), int(10)]),
            op("TL", vec![int(14)]),
            op("Tm", vec![int(1), int(0), int(0), int(1), int(72), int(720)]),
            op("Tj", vec![lit("first")]),
            op("'", vec![lit("second")]),
            op("T*", vec![]),
            op("Tj", vec![lit("third")]),
            op("ET", vec![]),
        ];
        let layout = extract(&build_pdf(vec![ops]));
        let tops: Vec<f64> = layout
            .fragments
            .iter()
            .map(|f| f.bounding_box.top)
            .collect();
        // Baselines 720, 706, 692; the box top is baseline + 10.
        assert_eq!(tops, vec![62.0, 76.0, 90.0]);
        assert!(layout.fragments.iter().all(|f| f.bounding_box.left == 72.0));
    }

    #[test]
    fn test_cm_scales_fragment_box() {
        let ops = vec![
            op("q", vec![]),
            op("cm", vec![int(2), int(0), int(0), int(2), int(0), int(0)]),
            op("BT", vec![]),
            op("Tf", vec![name("F1"), int(12)]),
            op("Td", vec![int(10), int(10)]),
            op("Tj", vec![lit("Hi")]),
            op("ET", vec![]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Td", vec![int(10), int(10)]),
            op("Tj", vec![lit("Hi")]),
            op("ET", vec![]),
        ];
        let layout = extract(&build_pdf(vec![ops]));
        assert_eq!(
            layout.fragments[0].bounding_box,
            BoundingBox::new(20.0, 748.0, 24.0, 24.0)
        );
        // After Q the CTM is back to identity.
        assert_eq!(
            layout.fragments[1].bounding_box,
            BoundingBox::new(10.0, 770.0, 12.0, 12.0)
        );
    }

    #[test]
    fn test_font_widths_from_resources() {
        let font = Dictionary::from_iter(vec![
            ("Type", name("Font")),
            ("Subtype", name("Type1")),
            ("BaseFont", name("Helvetica")),
            ("FirstChar", int(65)),
            ("LastChar", int(66)),
            ("Widths", Object::Array(vec![int(600), int(800)])),
        ]);
        let resources = Dictionary::from_iter(vec![(
            "Font",
            Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Dictionary(font))])),
        )]);
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![name("F1"), int(10)]),
            op("Td", vec![int(50), int(500)]),
            op("Tj", vec![lit("AB")]),
            op("ET", vec![]),
        ];
        let bytes = build_pdf_with(vec![ops], Some(resources), |_| Vec::new());
        let layout = extract(&bytes);
        assert!((layout.fragments[0].bounding_box.width - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_form_xobject_is_followed() {
        let form_ops = Content {
            operations: text_at(100, 700, "Inside"),
        };
        let page_ops = vec![
            op("q", vec![]),
            op("Do", vec![name("X1")]),
            op("Q", vec![]),
        ];
        let bytes = build_pdf_with(vec![page_ops], None, |doc| {
            let dict = Dictionary::from_iter(vec![
                ("Type", name("XObject")),
                ("Subtype", name("Form")),
                (
                    "BBox",
                    Object::Array(vec![int(0), int(0), int(612), int(792)]),
                ),
                (
                    "Matrix",
                    Object::Array(vec![int(1), int(0), int(0), int(1), int(0), int(-100)]),
                ),
            ]);
            let id = doc.add_object(Stream::new(dict, form_ops.encode().unwrap()));
            vec![("X1".to_string(), id)]
        });
        let layout = extract(&bytes);
        assert_eq!(layout.fragments.len(), 1);
        assert_eq!(layout.fragments[0].text, "Inside");
        // Baseline 700 shifted down by 100; top edge at 612.
        assert_eq!(layout.fragments[0].bounding_box.top, 180.0);
    }

    #[test]
    fn test_pages_in_order_with_content_order_preserved() {
        let page1 = [text_at(72, 100, "bottom first"), text_at(72, 700, "top second")].concat();
        let page2 = text_at(72, 700, "page two");
        let layout = extract(&build_pdf(vec![page1, page2]));
        let seen: Vec<(u32, &str)> = layout
            .fragments
            .iter()
            .map(|f| (f.page, f.text.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![(1, "bottom first"), (1, "top second"), (2, "page two")]
        );
        assert_eq!(layout.page_count(), 2);
    }

    #[test]
    fn test_malformed_bytes_fail_with_extraction_error() {
        let err = ContentStreamExtractor::new()
            .extract(b"this is not a pdf")
            .unwrap_err();
        assert!(err.is_extraction_failure());
    }

    #[test]
    fn test_encrypted_document_rejected() {
        let mut doc = Document::load_mem(&build_pdf(vec![text_at(72, 700, "x")])).unwrap();
        doc.trailer
            .set("Encrypt", Object::Dictionary(Dictionary::new()));
        assert!(matches!(
            extract_from_document(&doc),
            Err(ClauseMapError::Encrypted)
        ));
    }

    #[test]
    fn test_document_without_pages_rejected() {
        let bytes = build_pdf(vec![]);
        assert!(matches!(
            ContentStreamExtractor::new().extract(&bytes),
            Err(ClauseMapError::NoPages)
        ));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let bytes = build_pdf(vec![text_at(72, 700, "Alpha"), text_at(72, 600, "Beta")]);
        assert_eq!(extract(&bytes), extract(&bytes));
    }

    #[test]
    fn test_matrix_operand_rejects_non_numbers() {
        assert!(matrix_operand(&[int(1), int(0), int(0), int(1), int(0), name("x")]).is_none());
        assert_eq!(
            matrix_operand(&[int(1), int(0), int(0), int(1), int(5), int(6)]),
            Some(Matrix::translation(5.0, 6.0))
        );
    }
}
