use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned box in page space, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        BoundingBox {
            left,
            top,
            width,
            height,
        }
    }

    /// The placeholder box used when a clause cannot be placed.
    pub fn zero() -> Self {
        BoundingBox::default()
    }

    /// Build a box from its edges. Edges given in the wrong order are swapped,
    /// so width and height are never negative.
    pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        let (l, r) = if left <= right {
            (left, right)
        } else {
            (right, left)
        };
        let (t, b) = if top <= bottom {
            (top, bottom)
        } else {
            (bottom, top)
        };
        BoundingBox {
            left: l,
            top: t,
            width: r - l,
            height: b - t,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::from_edges(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Smallest box covering every box in `boxes`, or `None` if there are none.
    pub fn encompassing<'a, I>(boxes: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = &'a BoundingBox>,
    {
        boxes
            .into_iter()
            .fold(None, |acc: Option<BoundingBox>, b| match acc {
                None => Some(*b),
                Some(a) => Some(a.union(b)),
            })
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.1}, {:.1}) {:.1}x{:.1}",
            self.left, self.top, self.width, self.height
        )
    }
}

/// One text-showing operation from a page's content stream.
///
/// `text` is the literal glyph run, not necessarily a whole word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// 1-indexed page number.
    pub page: u32,
    pub bounding_box: BoundingBox,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, page: u32, bounding_box: BoundingBox) -> Self {
        TextFragment {
            text: text.into(),
            page,
            bounding_box,
        }
    }
}

/// Page geometry, in the same coordinate space as the fragment boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub number: u32,
    pub width: f64,
    pub height: f64,
}

/// Everything an extraction backend produces for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    pub pages: Vec<PageInfo>,
    /// Grouped by non-decreasing page, content-stream order within a page.
    pub fragments: Vec<TextFragment>,
}

impl DocumentLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn fragments_on(&self, page: u32) -> impl Iterator<Item = &TextFragment> {
        self.fragments.iter().filter(move |f| f.page == page)
    }

    /// Plain text of the document: per page, fragment texts joined with a
    /// single space and terminated by a blank line.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for page in &self.pages {
            let page_text = self
                .fragments_on(page.number)
                .map(|f| f.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            text.push_str(&page_text);
            text.push_str("\n\n");
        }
        text
    }
}

/// A clause to place, as produced by the upstream extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseQuery {
    pub text: String,
    /// Page hint. Only fragments on this page are searched.
    #[serde(alias = "page")]
    pub expected_page: u32,
}

impl ClauseQuery {
    pub fn new(text: impl Into<String>, expected_page: u32) -> Self {
        ClauseQuery {
            text: text.into(),
            expected_page,
        }
    }
}

/// A candidate location for a clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseMatch {
    pub page: u32,
    /// Union of the boxes of every fragment in the run.
    pub bounding_box: BoundingBox,
    /// Matched length over target length, at most 1.0. Only meaningful for
    /// ranking candidates of the same clause.
    pub quality: f64,
    /// First fragment of the run, indexed within the page's fragments.
    pub first_fragment: usize,
    /// Last fragment of the run (inclusive), indexed within the page's fragments.
    pub last_fragment: usize,
}

impl ClauseMatch {
    /// Ranking key: distance from an exact-length match.
    pub fn distance(&self) -> f64 {
        (1.0 - self.quality).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_edges_normalizes_order() {
        let b = BoundingBox::from_edges(50.0, 40.0, 10.0, 20.0);
        assert_eq!(b, BoundingBox::new(10.0, 20.0, 40.0, 20.0));
    }

    #[test]
    fn test_union_covers_both() {
        let a = BoundingBox::new(10.0, 10.0, 20.0, 5.0);
        let b = BoundingBox::new(5.0, 30.0, 10.0, 10.0);
        let u = a.union(&b);
        assert_eq!(u.left, 5.0);
        assert_eq!(u.top, 10.0);
        assert_eq!(u.right(), 30.0);
        assert_eq!(u.bottom(), 40.0);
    }

    #[test]
    fn test_encompassing_empty_is_none() {
        let none: Vec<BoundingBox> = Vec::new();
        assert!(BoundingBox::encompassing(&none).is_none());
    }

    #[test]
    fn test_plain_text_keeps_empty_pages() {
        let layout = DocumentLayout {
            pages: vec![
                PageInfo {
                    number: 1,
                    width: 612.0,
                    height: 792.0,
                },
                PageInfo {
                    number: 2,
                    width: 612.0,
                    height: 792.0,
                },
            ],
            fragments: vec![
                TextFragment::new("Master", 1, BoundingBox::zero()),
                TextFragment::new("Agreement", 1, BoundingBox::zero()),
            ],
        };
        assert_eq!(layout.plain_text(), "Master Agreement\n\n\n\n");
    }

    #[test]
    fn test_clause_query_accepts_page_alias() {
        let q: ClauseQuery =
            serde_json::from_str(r#"{ "text": "Governing law", "page": 4 }"#).unwrap();
        assert_eq!(q.expected_page, 4);
    }
}
