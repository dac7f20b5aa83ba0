use crate::locate::normalize::{char_len, collapse_whitespace, normalize_run, normalize_text};
use crate::model::{BoundingBox, ClauseMatch, TextFragment};

/// Default number of fragments a run may extend past its start.
pub const DEFAULT_MAX_EXTENSION: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// How many fragments past the start a run may grow.
    pub max_extension: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        MatchOptions {
            max_extension: DEFAULT_MAX_EXTENSION,
        }
    }
}

/// Find every run of fragments on `expected_page` whose concatenated text
/// aligns with `clause_text`, best candidate first.
///
/// Algorithm:
/// 1. Normalize the clause (lowercase, trim, collapse whitespace).
/// 2. Keep only fragments on `expected_page`, in their original order.
/// 3. A fragment starts a run only if its normalized text is a non-empty
///    prefix of the clause.
/// 4. Extend the run one fragment at a time (joined with a space) while the
///    clause still starts with the concatenation. Stop once the
///    concatenation covers the clause, or at the fragment before the
///    clause diverges.
/// 5. Rank runs by |1 - quality|. The sort is stable, so ties keep fragment order.
///
/// An empty result means the clause has no position on that page.
pub fn find_candidates(
    fragments: &[TextFragment],
    clause_text: &str,
    expected_page: u32,
    options: &MatchOptions,
) -> Vec<ClauseMatch> {
    let target = normalize_run(clause_text);
    if target.is_empty() {
        return Vec::new();
    }
    let target_len = char_len(&target);

    let page_fragments: Vec<&TextFragment> = fragments
        .iter()
        .filter(|f| f.page == expected_page)
        .collect();

    let mut candidates: Vec<ClauseMatch> = (0..page_fragments.len())
        .filter_map(|start| {
            let end = extend_run(&page_fragments, start, &target, target_len, options)?;
            Some(build_match(&page_fragments, start, end, expected_page, target_len))
        })
        .collect();

    candidates.sort_by(|a, b| a.distance().total_cmp(&b.distance()));
    candidates
}

/// Number of fragments on `expected_page` that could begin a run.
pub fn count_valid_starts(fragments: &[TextFragment], clause_text: &str, expected_page: u32) -> usize {
    let target = normalize_run(clause_text);
    if target.is_empty() {
        return 0;
    }
    fragments
        .iter()
        .filter(|f| f.page == expected_page)
        .filter(|f| start_text(f, &target).is_some())
        .count()
}

/// Normalized text of `fragment` when it is a non-empty prefix of `target`.
fn start_text(fragment: &TextFragment, target: &str) -> Option<String> {
    let text = collapse_whitespace(&normalize_text(&fragment.text));
    (!text.is_empty() && target.starts_with(&text)).then_some(text)
}

/// Returns the inclusive end index of the run starting at `start`, if the
/// start is valid and the run is accepted.
fn extend_run(
    page_fragments: &[&TextFragment],
    start: usize,
    target: &str,
    target_len: usize,
    options: &MatchOptions,
) -> Option<usize> {
    let first = start_text(page_fragments[start], target)?;
    // The whole clause sits inside the start fragment.
    if char_len(&first) >= target_len {
        return Some(start);
    }

    let last = page_fragments
        .len()
        .saturating_sub(1)
        .min(start.saturating_add(options.max_extension));

    let mut concat = first;
    let mut end = start;
    for (j, fragment) in page_fragments
        .iter()
        .enumerate()
        .take(last + 1)
        .skip(start + 1)
    {
        concat.push(' ');
        concat.push_str(&normalize_text(&fragment.text));
        concat = collapse_whitespace(&concat);

        if !target.starts_with(&concat) {
            break;
        }
        // Blank fragments may sit inside a run but never end one.
        if fragment.text.trim().is_empty() {
            continue;
        }
        end = j;
        if char_len(&concat) >= target_len {
            break;
        }
    }

    (end > start).then_some(end)
}

fn build_match(
    page_fragments: &[&TextFragment],
    start: usize,
    end: usize,
    page: u32,
    target_len: usize,
) -> ClauseMatch {
    let run = &page_fragments[start..=end];

    let joined = run
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let matched_len = char_len(&normalize_run(&joined));
    let quality = (matched_len as f64 / target_len as f64).min(1.0);

    let bounding_box = BoundingBox::encompassing(run.iter().map(|f| &f.bounding_box))
        .unwrap_or_else(|| run[0].bounding_box);

    ClauseMatch {
        page,
        bounding_box,
        quality,
        first_fragment: start,
        last_fragment: end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frag(text: &str, page: u32, left: f64, top: f64, width: f64, height: f64) -> TextFragment {
        TextFragment::new(text, page, BoundingBox::new(left, top, width, height))
    }

    fn locate(fragments: &[TextFragment], clause: &str, page: u32) -> Vec<ClauseMatch> {
        find_candidates(fragments, clause, page, &MatchOptions::default())
    }

    #[test]
    fn test_exact_single_fragment_match() {
        let fragments = vec![
            frag("Heading", 1, 72.0, 60.0, 80.0, 14.0),
            frag("Payment is due in 30 days.", 1, 72.0, 100.0, 200.0, 12.0),
        ];
        let matches = locate(&fragments, "payment is due in 30 days.", 1);
        assert_eq!(matches.len(), 1);
        assert!((matches[0].quality - 1.0).abs() < 1e-9);
        assert_eq!(matches[0].bounding_box, fragments[1].bounding_box);
        assert_eq!((matches[0].first_fragment, matches[0].last_fragment), (1, 1));
    }

    #[test]
    fn test_multi_fragment_union() {
        let fragments = vec![
            frag("The Customer", 2, 72.0, 100.0, 70.0, 12.0),
            frag("agrees to", 2, 146.0, 100.0, 50.0, 12.0),
            frag("indemnify.", 2, 72.0, 114.0, 55.0, 12.0),
        ];
        let matches = locate(&fragments, "The Customer agrees to indemnify.", 2);
        assert!(!matches.is_empty());
        let best = &matches[0];
        assert_eq!(best.page, 2);
        assert_eq!(
            best.bounding_box,
            BoundingBox::from_edges(72.0, 100.0, 196.0, 126.0)
        );
        assert!((best.quality - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_page_restriction() {
        let fragments = vec![
            frag("Governing law is Delaware.", 5, 72.0, 100.0, 150.0, 12.0),
            frag("Unrelated", 3, 72.0, 100.0, 50.0, 12.0),
        ];
        assert!(locate(&fragments, "Governing law is Delaware.", 3).is_empty());
        assert_eq!(locate(&fragments, "Governing law is Delaware.", 5).len(), 1);
    }

    #[test]
    fn test_mid_word_fragment_is_not_a_start() {
        let fragments = vec![
            frag("reements to", 1, 72.0, 100.0, 60.0, 12.0),
            frag("pay", 1, 140.0, 100.0, 20.0, 12.0),
        ];
        assert!(locate(&fragments, "agreements to pay", 1).is_empty());
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let fragments = vec![frag("Termination", 1, 0.0, 0.0, 10.0, 10.0)];
        assert!(locate(&fragments, "Confidentiality obligations", 1).is_empty());
    }

    #[test]
    fn test_whitespace_fragments_are_never_starts() {
        let fragments = vec![
            frag("   ", 1, 0.0, 0.0, 5.0, 10.0),
            frag("", 1, 0.0, 0.0, 0.0, 10.0),
        ];
        assert!(locate(&fragments, "anything at all", 1).is_empty());
    }

    #[test]
    fn test_whitespace_fragment_inside_run_is_absorbed() {
        let fragments = vec![
            frag("The Supplier", 1, 72.0, 100.0, 60.0, 12.0),
            frag(" ", 1, 132.0, 100.0, 3.0, 12.0),
            frag("shall deliver", 1, 135.0, 100.0, 70.0, 12.0),
        ];
        let matches = locate(&fragments, "The Supplier shall deliver", 1);
        assert_eq!(matches[0].last_fragment, 2);
        assert!((matches[0].quality - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_divergence_ends_run_at_previous_fragment() {
        let fragments = vec![
            frag("The Customer", 1, 72.0, 100.0, 70.0, 12.0),
            frag("agrees to", 1, 146.0, 100.0, 50.0, 12.0),
            frag("something else", 1, 72.0, 114.0, 80.0, 12.0),
        ];
        let matches = locate(&fragments, "The Customer agrees to indemnify.", 1);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].last_fragment, 1);
        assert!(matches[0].quality < 1.0);
        assert_eq!(
            matches[0].bounding_box,
            BoundingBox::from_edges(72.0, 100.0, 196.0, 112.0)
        );
    }

    #[test]
    fn test_prefix_start_with_immediate_divergence_yields_nothing() {
        let fragments = vec![
            frag("The Customer", 1, 72.0, 100.0, 70.0, 12.0),
            frag("refuses", 1, 146.0, 100.0, 50.0, 12.0),
        ];
        assert!(locate(&fragments, "The Customer agrees", 1).is_empty());
    }

    #[test]
    fn test_extension_window_is_capped() {
        let words: Vec<String> = (0..10).map(|i| format!("w{i}")).collect();
        let fragments: Vec<TextFragment> = words
            .iter()
            .enumerate()
            .map(|(i, w)| frag(w, 1, i as f64 * 10.0, 0.0, 8.0, 10.0))
            .collect();
        let clause = words.join(" ");
        let options = MatchOptions { max_extension: 3 };
        let matches = find_candidates(&fragments, &clause, 1, &options);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].last_fragment, 3);
        assert!(matches[0].quality < 1.0);
    }

    #[test]
    fn test_default_extension_window_is_fifty() {
        let words: Vec<String> = (0..60).map(|i| format!("w{i}")).collect();
        let fragments: Vec<TextFragment> = words
            .iter()
            .enumerate()
            .map(|(i, w)| frag(w, 1, (i % 10) as f64 * 20.0, (i / 10) as f64 * 12.0, 15.0, 10.0))
            .collect();

        let matches = locate(&fragments, &words.join(" "), 1);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].last_fragment, DEFAULT_MAX_EXTENSION);
        assert!(matches[0].quality < 1.0);

        // 51 fragments fit the window exactly.
        let matches = locate(&fragments, &words[..51].join(" "), 1);
        assert_eq!(matches[0].last_fragment, 50);
        assert!((matches[0].quality - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_trailing_blank_fragment_not_in_run() {
        let fragments = vec![
            frag("The Supplier", 1, 72.0, 100.0, 60.0, 12.0),
            frag("shall", 1, 136.0, 100.0, 25.0, 12.0),
            frag(" ", 1, 400.0, 300.0, 5.0, 12.0),
            frag("refuse", 1, 72.0, 114.0, 30.0, 12.0),
        ];
        let matches = locate(&fragments, "The Supplier shall deliver", 1);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].last_fragment, 1);
        assert_eq!(
            matches[0].bounding_box,
            BoundingBox::from_edges(72.0, 100.0, 161.0, 112.0)
        );
    }

    #[test]
    fn test_duplicates_rank_by_quality_then_order() {
        let fragments = vec![
            frag("Late fees apply.", 1, 72.0, 100.0, 90.0, 12.0),
            frag("Late fees", 1, 72.0, 300.0, 50.0, 12.0),
            frag("apply.", 1, 130.0, 300.0, 30.0, 12.0),
            frag("Late fees apply.", 1, 72.0, 500.0, 90.0, 12.0),
        ];
        let matches = locate(&fragments, "Late fees apply.", 1);
        let tops: Vec<f64> = matches.iter().map(|m| m.bounding_box.top).collect();
        assert_eq!(tops, vec![100.0, 300.0, 500.0]);
    }

    #[test]
    fn test_closer_length_wins() {
        let fragments = vec![
            // Partial: stops one character short before diverging.
            frag("Either party may", 1, 72.0, 100.0, 80.0, 12.0),
            frag("terminate", 1, 160.0, 100.0, 45.0, 12.0),
            frag("Section 9", 1, 72.0, 114.0, 50.0, 12.0),
            // Complete.
            frag("Either party may", 1, 72.0, 400.0, 80.0, 12.0),
            frag("terminate.", 1, 160.0, 400.0, 50.0, 12.0),
        ];
        let matches = locate(&fragments, "Either party may terminate.", 1);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].bounding_box.top, 400.0);
        assert!(matches[1].quality < 1.0);
    }

    #[test]
    fn test_case_and_spacing_differences_tolerated() {
        let fragments = vec![
            frag("LIMITATION  OF", 1, 72.0, 100.0, 80.0, 12.0),
            frag("liability", 1, 160.0, 100.0, 50.0, 12.0),
        ];
        let matches = locate(&fragments, "Limitation of Liability", 1);
        assert_eq!(matches.len(), 1);
        assert!((matches[0].quality - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_count_valid_starts() {
        let fragments = vec![
            frag("Late fees", 1, 0.0, 0.0, 10.0, 10.0),
            frag("apply.", 1, 0.0, 0.0, 10.0, 10.0),
            frag("Late", 1, 0.0, 0.0, 10.0, 10.0),
            frag("Late fees", 2, 0.0, 0.0, 10.0, 10.0),
        ];
        assert_eq!(count_valid_starts(&fragments, "Late fees apply.", 1), 2);
        assert_eq!(count_valid_starts(&fragments, "", 1), 0);
    }

    #[test]
    fn test_empty_clause_has_no_candidates() {
        let fragments = vec![frag("Anything", 1, 0.0, 0.0, 10.0, 10.0)];
        assert!(locate(&fragments, "   ", 1).is_empty());
    }
}
