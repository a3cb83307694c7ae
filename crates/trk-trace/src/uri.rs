//! URI helpers shared by the normalizer and the batch splitter.

pub const SEPARATOR: char = '/';

/// Substring after the last `/`, or the whole string when there is none.
///
/// `"http://x/verbs/completed"` -> `"completed"`, `"completed"` -> `"completed"`.
pub fn uri_tail(s: &str) -> &str {
    match s.rfind(SEPARATOR) {
        Some(idx) => &s[idx + SEPARATOR.len_utf8()..],
        None => s,
    }
}

pub fn ends_with_separator(s: &str) -> bool {
    s.ends_with(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_of_iri() {
        assert_eq!(uri_tail("http://x/verbs/completed"), "completed");
        assert_eq!(
            uri_tail("https://w3id.org/xapi/seriousgames/extensions/progress"),
            "progress"
        );
    }

    #[test]
    fn tail_without_separator_is_identity() {
        assert_eq!(uri_tail("completed"), "completed");
        assert_eq!(uri_tail(""), "");
    }

    #[test]
    fn trailing_separator_yields_empty_tail() {
        assert!(ends_with_separator("http://x/verbs/"));
        assert_eq!(uri_tail("http://x/verbs/"), "");
    }
}
