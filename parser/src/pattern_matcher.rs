use crate::{LineMatch, ReportError};
use regex::Regex;

/// One or more mutually exclusive regular expressions treated as a single pattern.
///
/// The regex engine rejects a group name used twice within one expression, so
/// shapes with alternative spellings (sharing capture names) are split into
/// separate alternatives and their captures unified here.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    alternatives: Vec<Regex>,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self, ReportError> {
        Self::any_of(&[pattern])
    }

    pub fn any_of<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ReportError> {
        let alternatives = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { alternatives })
    }

    /// Named captures of `line`, or `None` when no alternative matches.
    ///
    /// When several alternatives provide the same name, the first non-empty
    /// value wins.
    pub fn captures(&self, line: &str) -> Option<LineMatch> {
        let mut found: Option<LineMatch> = None;

        for regex in &self.alternatives {
            let Some(caps) = regex.captures(line) else {
                continue;
            };
            let merged = found.get_or_insert_with(LineMatch::new);
            for name in regex.capture_names().flatten() {
                let Some(value) = caps.name(name) else {
                    continue;
                };
                let slot = merged.entry(name.to_string()).or_default();
                if slot.is_empty() {
                    *slot = value.as_str().to_string();
                }
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_group_is_not_reported() {
        let matcher = PatternMatcher::new(r"^=== RUN\W*(?P<test>[\w/\-]*)(?: (?P<extra>x))?$").unwrap();
        let caps = matcher.captures("=== RUN TestFoo").unwrap();

        assert_eq!(caps.get("test").map(String::as_str), Some("TestFoo"));
        assert!(!caps.contains_key("extra"));
    }

    #[test]
    fn test_no_match() {
        let matcher = PatternMatcher::new(r"^--- (?P<result>\w+):").unwrap();
        assert!(matcher.captures("hello").is_none());
    }

    #[test]
    fn test_first_non_empty_capture_wins() {
        let matcher = PatternMatcher::any_of(&[r"^(?P<word>a*)b", r"^(?P<word>ab)"]).unwrap();
        let caps = matcher.captures("bb").unwrap();
        assert_eq!(caps["word"], "");

        let caps = matcher.captures("ab").unwrap();
        assert_eq!(caps["word"], "a");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(PatternMatcher::new("(?P<x>"), Err(ReportError::Pattern(_))));
    }
}
