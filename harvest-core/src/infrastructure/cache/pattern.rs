//! Glob matching for pattern deletes
//!
//! Only `*` (any run of characters) and `?` (exactly one character) are
//! special. Everything else, brackets included, matches literally.

use regex::Regex;

/// Translate a glob into an anchored regular expression
///
/// Wildcards match any character, newlines included.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 12);
    out.push_str("(?s)^");

    let mut literal = String::new();
    for ch in glob.chars() {
        match ch {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    out.push_str(&regex::escape(&literal));

    out.push('$');
    out
}

/// A compiled glob
#[derive(Debug, Clone)]
pub struct GlobPattern {
    regex: Regex,
}

impl GlobPattern {
    pub fn new(glob: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(&glob_to_regex(glob))?,
        })
    }

    pub fn is_match(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_any_suffix() {
        let pattern = GlobPattern::new("cart:42:*").unwrap();
        assert!(pattern.is_match("cart:42:items"));
        assert!(pattern.is_match("cart:42:"));
        assert!(!pattern.is_match("cart:420:items"));
        assert!(!pattern.is_match("xcart:42:items"));
    }

    #[test]
    fn test_question_mark_matches_one_char() {
        let pattern = GlobPattern::new("farm:?:details").unwrap();
        assert!(pattern.is_match("farm:7:details"));
        assert!(!pattern.is_match("farm:77:details"));
        assert!(!pattern.is_match("farm::details"));
    }

    #[test]
    fn test_brackets_are_literal() {
        let pattern = GlobPattern::new("tags:[a]*").unwrap();
        assert!(pattern.is_match("tags:[a]-list"));
        assert!(!pattern.is_match("tags:a-list"));
    }

    #[test]
    fn test_regex_metacharacters_are_escaped() {
        assert_eq!(glob_to_regex("a.b+c"), r"(?s)^a\.b\+c$");
        assert_eq!(glob_to_regex("user:*"), "(?s)^user:.*$");
        assert_eq!(glob_to_regex("?"), "(?s)^.$");

        let pattern = GlobPattern::new("products:search:(x)").unwrap();
        assert!(pattern.is_match("products:search:(x)"));
        assert!(!pattern.is_match("products:search:x"));
    }

    #[test]
    fn test_wildcards_match_newlines() {
        let star = GlobPattern::new("note:*").unwrap();
        assert!(star.is_match("note:first\nsecond"));

        let single = GlobPattern::new("line:?:end").unwrap();
        assert!(single.is_match("line:\n:end"));
        assert!(!GlobPattern::new("note:x").unwrap().is_match("note:x\n"));
    }

    #[test]
    fn test_empty_glob_matches_only_empty_key() {
        let pattern = GlobPattern::new("").unwrap();
        assert!(pattern.is_match(""));
        assert!(!pattern.is_match("a"));
    }
}
