/// Normalize a single piece of text for comparison: lowercase and trim.
pub fn normalize_text(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Collapse every run of whitespace to a single ASCII space.
///
/// Leading and trailing whitespace is collapsed too, not removed, so a
/// concatenation that currently ends in a join space keeps it.
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Full normalization used for clause text and finished runs:
/// lowercase, trim, collapse whitespace.
pub fn normalize_run(raw: &str) -> String {
    collapse_whitespace(&normalize_text(raw))
}

/// Length in characters, which is what match quality is measured in.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  The Customer "), "the customer");
    }

    #[test]
    fn test_collapse_whitespace_keeps_trailing_join_space() {
        assert_eq!(collapse_whitespace("agrees \t to  "), "agrees to ");
    }

    #[test]
    fn test_normalize_run() {
        assert_eq!(
            normalize_run("\n The   Customer\u{a0}AGREES  "),
            "the customer agrees"
        );
    }

    #[test]
    fn test_char_len_counts_chars_not_bytes() {
        assert_eq!(char_len("naïve"), 5);
    }
}
