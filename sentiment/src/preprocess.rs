//! Text cleanup and agricultural term extraction performed before scoring.

use croplisten_core::AgriculturalTerm;
use regex::Regex;
use std::sync::OnceLock;

const DISEASES: &[&str] = &[
    "rust", "mildew", "smut", "blight", "rot", "spot", "mosaic", "wilt", "canker", "scab",
];
const DISEASE_PHRASES: &[(&str, &str)] = &[
    ("powdery", "mildew"),
    ("leaf", "spot"),
    ("stem", "rust"),
    ("black", "leg"),
    ("root", "rot"),
];

const CROPS: &[&str] = &[
    "wheat", "barley", "corn", "rice", "soybean", "cotton", "canola", "oats", "chickpea",
    "lentil", "lupin", "faba", "mungbean", "safflower", "sorghum",
];

const SYMPTOMS: &[&str] = &[
    "wilting", "yellowing", "spotting", "lesion", "chlorosis", "necrosis",
];
const SYMPTOM_PHRASES: &[(&str, &[&str])] = &[
    ("leaf", &["curl", "spot", "wilt", "burn"]),
    ("stem", &["canker", "rot", "lesion"]),
    ("root", &["rot", "damage", "lesion"]),
];

const SEASONAL: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "spring", "summer", "autumn", "fall", "winter",
];
const SEASONAL_PHRASES: &[(&str, &[&str])] = &[(
    "early",
    &["season", "spring", "summer", "autumn", "fall", "winter"],
), (
    "mid",
    &["season", "spring", "summer", "autumn", "fall", "winter"],
), (
    "late",
    &["season", "spring", "summer", "autumn", "fall", "winter"],
)];

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+|www\.\S+").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[@#]\w+").unwrap())
}

fn punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").unwrap())
}

#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub processed_text: String,
    pub terms: Vec<AgriculturalTerm>,
}

/// Lowercase, strip URLs, hashtags and mentions, drop punctuation, then
/// filter out single-character and purely numeric tokens.
pub fn clean_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let no_urls = url_re().replace_all(lowered.trim(), "");
    let no_tags = tag_re().replace_all(&no_urls, "");
    let plain = punct_re().replace_all(&no_tags, " ");
    plain
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn label_for_pair(first: &str, second: &str) -> Option<&'static str> {
    if DISEASE_PHRASES.iter().any(|(a, b)| *a == first && *b == second) {
        return Some("DISEASE");
    }
    if SYMPTOM_PHRASES
        .iter()
        .any(|(a, bs)| *a == first && bs.contains(&second))
    {
        return Some("SYMPTOM");
    }
    if SEASONAL_PHRASES
        .iter()
        .any(|(a, bs)| *a == first && bs.contains(&second))
    {
        return Some("SEASONAL");
    }
    None
}

fn label_for_word(word: &str) -> Option<&'static str> {
    if DISEASES.contains(&word) {
        Some("DISEASE")
    } else if CROPS.contains(&word) {
        Some("CROP")
    } else if SYMPTOMS.contains(&word) {
        Some("SYMPTOM")
    } else if SEASONAL.contains(&word) {
        Some("SEASONAL")
    } else {
        None
    }
}

/// Scan the cleaned text for agricultural terms. Two-word phrases are
/// matched before single words so "stem rust" comes out as one span
/// rather than a bare "rust".
pub fn extract_terms(processed_text: &str) -> Vec<AgriculturalTerm> {
    let words: Vec<&str> = processed_text.split_whitespace().collect();
    let mut terms = Vec::new();
    let mut i = 0;

    while i < words.len() {
        if i + 1 < words.len() {
            if let Some(label) = label_for_pair(words[i], words[i + 1]) {
                terms.push(AgriculturalTerm {
                    text: format!("{} {}", words[i], words[i + 1]),
                    label: label.to_string(),
                    start: i,
                    end: i + 2,
                });
                i += 2;
                continue;
            }
        }
        if let Some(label) = label_for_word(words[i]) {
            terms.push(AgriculturalTerm {
                text: words[i].to_string(),
                label: label.to_string(),
                start: i,
                end: i + 1,
            });
        }
        i += 1;
    }
    terms
}

pub fn preprocess(text: &str) -> Preprocessed {
    let processed_text = clean_text(text);
    let terms = extract_terms(&processed_text);
    Preprocessed {
        processed_text,
        terms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_urls_tags_and_punctuation() {
        let cleaned = clean_text("Check https://example.com/x #wheat @agdept: rust spotted!!");
        assert_eq!(cleaned, "check rust spotted");
    }

    #[test]
    fn test_clean_drops_numbers_and_single_chars(){
        assert_eq!(clean_text("a 25 paddocks 3 ok"), "paddocks ok");
    }

    #[test]
    fn test_phrase_preferred_over_word() {
        let terms = extract_terms("severe leaf spot on the wheat");
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].text, "leaf spot");
        assert_eq!(terms[0].label, "DISEASE");
        assert_eq!(terms[0].start, 1);
        assert_eq!(terms[0].end, 3);
        assert_eq!(terms[1].text, "wheat");
        assert_eq!(terms[1].label, "CROP");
    }

    #[test]
    fn test_disease_and_seasonal_terms() {
        let terms = extract_terms("stem rust appeared in late spring near the canola");
        let labels: Vec<&str> = terms.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["DISEASE", "SEASONAL", "CROP"]);
        assert_eq!(terms[0].text, "stem rust");
        assert_eq!(terms[1].text, "late spring");
    }

    #[test]
    fn test_no_terms() {
        assert!(extract_terms("nothing agricultural here").is_empty());
    }
}
