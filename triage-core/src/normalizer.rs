use crate::parser::{LogEntry, HEADER_REGEX};
use regex::Regex;
use std::sync::LazyLock;

static DIGIT_RUN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Failed to compile digit regex"));

pub const PLACEHOLDER: &str = "#";

/// Reduces an entry to the signature used as its deduplication key.
///
/// Only the first line counts. Entries that differ only in numbers (ids,
/// ports, counts) share a signature; entries without any distinguishing
/// content may collapse into one broad signature.
#[derive(Debug, Clone)]
pub struct PatternNormalizer {
    max_len: usize,
}

impl Default for PatternNormalizer {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PatternNormalizer {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    pub fn normalize(&self, entry: &LogEntry) -> String {
        self.normalize_line(entry.first_line())
    }

    pub fn normalize_line(&self, line: &str) -> String {
        let without_header = HEADER_REGEX.replace(line, "");
        let generalized = DIGIT_RUN_REGEX.replace_all(&without_header, PLACEHOLDER);
        let truncated: String = generalized.chars().take(self.max_len).collect();
        truncated.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_entries;

    #[test]
    fn test_numbers_collapse_to_placeholder() {
        let normalizer = PatternNormalizer::default();
        assert_eq!(
            normalizer.normalize_line("Error at line 42"),
            normalizer.normalize_line("Error at line 987")
        );
        assert_eq!(normalizer.normalize_line("Error at line 42"), "Error at line #");
    }

    #[test]
    fn test_header_is_stripped_before_digits() {
        let normalizer = PatternNormalizer::default();
        let pattern =
            normalizer.normalize_line("[2024-01-01 10:00:00] ERROR Connection refused to db:5432");
        assert_eq!(pattern, "ERROR Connection refused to db:#");
    }

    #[test]
    fn test_only_first_line_is_used() {
        let normalizer = PatternNormalizer::default();
        let entry = parse_entries("[2024-01-01 10:00:00] boom\n  at Foo.bar(Foo.java:12)")
            .next()
            .unwrap();
        assert_eq!(normalizer.normalize(&entry), "boom");
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let normalizer = PatternNormalizer::new(5);
        assert_eq!(normalizer.normalize_line("ééééééé"), "ééééé");
        assert_eq!(normalizer.normalize_line("ab 12 cd 34"), "ab #");
    }
}
