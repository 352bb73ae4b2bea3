//! Search query builders, one dialect per platform.
//!
//! Hashtag and mention fields are recognized but deliberately left out of
//! every built query: including them made searches so restrictive they
//! returned almost nothing.

use croplisten_core::SearchSpec;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Substituted when a spec carries no positive criteria at all. Searching
/// with an empty string would match everything on some platforms and
/// nothing on others.
pub const DEFAULT_QUERY: &str =
    "(crops OR farming OR agriculture OR \"Western Australia\" OR pesticide OR fungicide)";

/// Resolve literal "AND" / "NOT" tokens inside an and_terms list. "AND" is
/// implied by adjacency and dropped; "NOT x" turns into a negated term; a
/// trailing "NOT" with nothing after it is a no-op.
fn clean_and_terms(and_terms: &[String]) -> Vec<String> {
    let mut cleaned = Vec::new();
    let mut i = 0;
    while i < and_terms.len() {
        let term = &and_terms[i];
        if term.eq_ignore_ascii_case("and") {
            i += 1;
        } else if term.eq_ignore_ascii_case("not") {
            if i + 1 < and_terms.len() {
                cleaned.push(format!("-{}", and_terms[i + 1]));
                i += 2;
            } else {
                i += 1;
            }
        } else {
            cleaned.push(term.clone());
            i += 1;
        }
    }
    cleaned
}

fn or_group(or_terms: &[String]) -> Option<String> {
    match or_terms.len() {
        0 => None,
        1 => Some(or_terms[0].clone()),
        _ => Some(format!("({})", or_terms.join(" OR "))),
    }
}

/// Reddit dialect: implicit AND via spaces, explicit uppercase OR, minus
/// for negation, double quotes for exact phrases.
pub fn build_reddit_query(spec: &SearchSpec) -> String {
    if spec.is_empty() {
        debug!("no search terms provided, using default agriculture query");
        return DEFAULT_QUERY.to_string();
    }

    let mut parts: Vec<String> = Vec::new();

    for phrase in &spec.exact_phrases {
        if phrase.starts_with('"') && phrase.ends_with('"') {
            parts.push(phrase.clone());
        } else {
            parts.push(format!("\"{phrase}\""));
        }
    }

    let and_terms = clean_and_terms(&spec.and_terms);
    if !and_terms.is_empty() {
        parts.push(and_terms.join(" "));
    }

    for term in &spec.not_terms {
        parts.push(format!("-{term}"));
    }

    if let Some(group) = or_group(&spec.or_terms) {
        parts.push(group);
    }

    let query = parts.join(" ").trim().to_string();
    debug!(%query, "constructed Reddit query");
    query
}

/// Twitter advanced-search dialect: `+` marks required terms, quoted
/// location OR-group, `lang:` and `since:`/`until:` qualifiers.
pub fn build_twitter_query(spec: &SearchSpec) -> String {
    if spec.is_empty() {
        return DEFAULT_QUERY.to_string();
    }

    let mut parts: Vec<String> = Vec::new();

    let and_terms = clean_and_terms(&spec.and_terms);
    let required: Vec<String> = and_terms
        .iter()
        .map(|t| {
            if t.starts_with('-') {
                t.clone()
            } else {
                format!("+{t}")
            }
        })
        .collect();
    if !required.is_empty() {
        parts.push(required.join(" "));
    }

    for phrase in &spec.exact_phrases {
        let trimmed = phrase.trim_matches('"');
        parts.push(format!("+\"{trimmed}\""));
    }

    if let Some(group) = or_group(&spec.or_terms) {
        parts.push(group);
    }

    if !spec.location_mentions.is_empty() {
        let quoted: Vec<String> = spec
            .location_mentions
            .iter()
            .map(|loc| format!("\"{loc}\""))
            .collect();
        parts.push(format!("({})", quoted.join(" OR ")));
    }

    if !spec.not_terms.is_empty() {
        let negated: Vec<String> = spec.not_terms.iter().map(|t| format!("-{t}")).collect();
        parts.push(negated.join(" "));
    }

    if let Some(lang) = &spec.language {
        parts.push(format!("lang:{lang}"));
    }

    if let (Some(from), Some(to)) = (&spec.from_date, &spec.to_date) {
        parts.push(format!("since:{from} until:{to}"));
    }

    let query = parts.join(" ").trim().to_string();
    debug!(%query, "constructed Twitter query");
    query
}

fn operator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(AND NOT|AND|OR)\b").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Bluesky's search endpoint has no boolean operators; feeding it a query
/// with literal AND/OR tokens returns nothing. Strip them and collapse the
/// leftover whitespace.
pub fn clean_bluesky_query(query: &str) -> String {
    let stripped = operator_re().replace_all(query, "");
    whitespace_re().replace_all(&stripped, " ").trim().to_string()
}

pub fn build_bluesky_query(spec: &SearchSpec) -> String {
    let query = clean_bluesky_query(&build_reddit_query(spec));
    debug!(%query, "constructed Bluesky query");
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> SearchSpec {
        SearchSpec::default()
    }

    #[test]
    fn test_reddit_full_composition() {
        let mut s = spec();
        s.and_terms = vec!["a".into(), "NOT".into(), "d".into()];
        s.or_terms = vec!["b".into(), "c".into()];
        s.exact_phrases = vec!["e f".into()];
        let q = build_reddit_query(&s);
        assert!(q.contains("\"e f\""));
        assert!(q.contains("a -d"));
        assert!(q.contains("(b OR c)"));
    }

    #[test]
    fn test_reddit_empty_spec_uses_default() {
        let q = build_reddit_query(&spec());
        assert_eq!(q, DEFAULT_QUERY);
        assert!(!q.is_empty());
    }

    #[test]
    fn test_and_operator_tokens_dropped() {
        let mut s = spec();
        s.and_terms = vec!["mildew".into(), "AND".into(), "wheat".into()];
        assert_eq!(build_reddit_query(&s), "mildew wheat");
    }

    #[test]
    fn test_trailing_not_is_noop() {
        let mut s = spec();
        s.and_terms = vec!["wheat".into(), "NOT".into()];
        assert_eq!(build_reddit_query(&s), "wheat");
    }

    #[test]
    fn test_single_or_term_unparenthesized() {
        let mut s = spec();
        s.or_terms = vec!["canola".into()];
        assert_eq!(build_reddit_query(&s), "canola");
    }

    #[test]
    fn test_standalone_not_terms() {
        let mut s = spec();
        s.and_terms = vec!["wheat".into()];
        s.not_terms = vec!["bread".into()];
        assert_eq!(build_reddit_query(&s), "wheat -bread");
    }

    #[test]
    fn test_hashtags_and_mentions_excluded_by_policy() {
        let mut s = spec();
        s.and_terms = vec!["wheat".into()];
        s.hashtags = vec!["farming".into()];
        s.mentions = vec!["agdept".into()];
        let q = build_reddit_query(&s);
        assert!(!q.contains('#'));
        assert!(!q.contains("farming"));
        assert!(!q.contains("agdept"));

        let q = build_twitter_query(&s);
        assert!(!q.contains('#'));
        assert!(!q.contains('@'));
    }

    #[test]
    fn test_twitter_dialect() {
        let mut s = spec();
        s.and_terms = vec!["mildew".into()];
        s.exact_phrases = vec!["crop rust".into()];
        s.or_terms = vec!["wheat".into(), "barley".into()];
        s.location_mentions = vec!["Western Australia".into(), "Perth".into()];
        s.not_terms = vec!["game".into()];
        s.language = Some("en".into());
        s.from_date = Some("2024-01-01".into());
        s.to_date = Some("2024-06-30".into());
        let q = build_twitter_query(&s);
        assert!(q.contains("+mildew"));
        assert!(q.contains("+\"crop rust\""));
        assert!(q.contains("(wheat OR barley)"));
        assert!(q.contains("(\"Western Australia\" OR \"Perth\")"));
        assert!(q.contains("-game"));
        assert!(q.contains("lang:en"));
        assert!(q.contains("since:2024-01-01 until:2024-06-30"));
    }

    #[test]
    fn test_bluesky_strips_operators() {
        assert_eq!(clean_bluesky_query("wheat AND rust OR mildew"), "wheat rust mildew");
        assert_eq!(clean_bluesky_query("wheat AND NOT bread"), "wheat bread");
        assert_eq!(clean_bluesky_query("wheat  and   rust"), "wheat rust");
    }

    #[test]
    fn test_bluesky_from_spec() {
        let mut s = spec();
        s.or_terms = vec!["wheat".into(), "barley".into()];
        // Parens survive, operators do not
        assert_eq!(build_bluesky_query(&s), "(wheat barley)");
    }
}
