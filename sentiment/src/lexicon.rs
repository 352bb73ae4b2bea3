use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Domain keyword weights used to tune the classifier's raw scores.
/// Negative weights are stored as magnitudes and always applied
/// negatively, so a sign mistake in a keywords file cannot flip a term's
/// direction.
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub positive: HashMap<String, f64>,
    pub negative: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct KeywordsFile {
    #[serde(default)]
    positive_keywords: HashMap<String, f64>,
    #[serde(default)]
    negative_keywords: HashMap<String, f64>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::agricultural()
    }
}

impl Lexicon {
    /// Built-in crop-health keywords.
    pub fn agricultural() -> Self {
        let positive = [
            ("healthy", 0.25),
            ("disease-free", 0.2),
            ("thriving", 0.15),
            ("robust", 0.15),
            ("vigorous", 0.15),
        ];
        let negative = [
            ("infected", 0.2),
            ("diseased", 0.2),
            ("unhealthy", 0.15),
            ("sickly", 0.2),
            ("weak", 0.10),
            ("outbreak", 0.3),
            ("pest infestation", 0.3),
        ];
        Self {
            positive: positive
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            negative: negative
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Load keywords from a JSON file, falling back to the built-in set
    /// when the file is missing, malformed or empty.
    pub fn from_file(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "keywords file unreadable, using defaults");
                return Self::agricultural();
            }
        };
        match serde_json::from_str::<KeywordsFile>(&raw) {
            Ok(file) if !file.positive_keywords.is_empty() || !file.negative_keywords.is_empty() => {
                Self {
                    positive: file.positive_keywords,
                    negative: file
                        .negative_keywords
                        .into_iter()
                        .map(|(k, v)| (k, v.abs()))
                        .collect(),
                }
            }
            Ok(_) => {
                warn!(path = %path.display(), "keywords file is empty, using defaults");
                Self::agricultural()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "keywords file malformed, using defaults");
                Self::agricultural()
            }
        }
    }

    /// Net adjustment for a chunk: each positive keyword found adds its
    /// weight, each negative keyword found subtracts its magnitude.
    /// Matching is substring containment on lower-cased text, so
    /// multi-word keywords like "pest infestation" work.
    pub fn tune_score(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let mut tune = 0.0;
        for (keyword, weight) in &self.positive {
            if lower.contains(keyword.as_str()) {
                tune += weight;
            }
        }
        for (keyword, weight) in &self.negative {
            if lower.contains(keyword.as_str()) {
                tune -= weight.abs();
            }
        }
        tune
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lexicon_weights() {
        let lex = Lexicon::agricultural();
        assert_eq!(lex.positive["healthy"], 0.25);
        assert_eq!(lex.negative["outbreak"], 0.3);
        assert_eq!(lex.positive.len(), 5);
        assert_eq!(lex.negative.len(), 7);
    }

    #[test]
    fn test_tune_score_nets_out() {
        let lex = Lexicon::agricultural();
        // healthy (+0.25) and infected (-0.2)
        let tune = lex.tune_score("Mostly HEALTHY but one paddock is infected");
        assert!((tune - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_multi_word_keyword() {
        let lex = Lexicon::agricultural();
        assert!((lex.tune_score("signs of pest infestation") - (-0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let lex = Lexicon::from_file(Path::new("/nonexistent/keywords.json"));
        assert_eq!(lex.positive["healthy"], 0.25);
    }

    #[test]
    fn test_file_negatives_normalized_to_magnitudes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.json");
        std::fs::write(
            &path,
            r#"{"positive_keywords": {"lush": 0.2}, "negative_keywords": {"blighted": -0.4}}"#,
        )
        .unwrap();
        let lex = Lexicon::from_file(&path);
        assert_eq!(lex.positive["lush"], 0.2);
        assert_eq!(lex.negative["blighted"], 0.4);
        assert!((lex.tune_score("blighted crop") - (-0.4)).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.json");
        std::fs::write(&path, "not json at all").unwrap();
        let lex = Lexicon::from_file(&path);
        assert_eq!(lex.positive.len(), 5);
    }
}
