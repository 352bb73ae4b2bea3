use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source platform a post was collected from. Post IDs are only unique
/// within one platform; records from different platforms are never
/// deduplicated against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Reddit,
    Twitter,
    Bluesky,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Reddit, Platform::Twitter, Platform::Bluesky];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Reddit => "Reddit",
            Platform::Twitter => "Twitter",
            Platform::Bluesky => "Bluesky",
        }
    }

    /// Name of the document-store collection holding this platform's posts.
    pub fn collection_name(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit_posts",
            Platform::Twitter => "tweets",
            Platform::Bluesky => "bluesky_posts",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reddit" => Ok(Platform::Reddit),
            "twitter" | "x" => Ok(Platform::Twitter),
            "bluesky" => Ok(Platform::Bluesky),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Common record shape every platform's raw post is normalized into.
///
/// `created_at` stays a string: sources disagree on precision and timezone
/// availability, and unparseable values are carried through as-is rather
/// than dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    pub username: String,
    pub user_location: String,
    pub content_text: String,
    pub url: String,
    pub created_at: String,
    pub likes: u64,
    pub comments: u64,
    pub platform: Platform,
    pub topic_classification: String,
    pub collected_at: DateTime<Utc>,
}

/// A matched agricultural term span (disease, crop, symptom or seasonal
/// marker) in the processed text. `start`/`end` are word offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgriculturalTerm {
    pub text: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
}

/// Five-way sentiment label derived from the compound score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    #[serde(rename = "Positive")]
    Positive,
    #[serde(rename = "Slightly Positive")]
    SlightlyPositive,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Slightly Negative")]
    SlightlyNegative,
    #[serde(rename = "Negative")]
    Negative,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::SlightlyPositive => "Slightly Positive",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::SlightlyNegative => "Slightly Negative",
            SentimentLabel::Negative => "Negative",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaningDirection {
    Positive,
    Negative,
    Balanced,
}

/// How far from dead-neutral the compound score leans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeutralLeaning {
    pub direction: LeaningDirection,
    pub percentage: u8,
}

/// Final blended sentiment for one post. The three class scores sum to 1.0
/// within floating rounding; `compound` is positive minus negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub compound: f64,
    pub sentiment: SentimentLabel,
    pub neutral_leaning: NeutralLeaning,
}

impl SentimentResult {
    pub fn from_scores(positive: f64, negative: f64, neutral: f64) -> Self {
        let compound = positive - negative;
        Self {
            positive,
            negative,
            neutral,
            compound,
            sentiment: label_for_compound(compound),
            neutral_leaning: leaning_for_compound(compound),
        }
    }

    /// Fixed result returned when every scoring path has failed.
    pub fn neutral_fallback() -> Self {
        Self {
            positive: 0.33,
            negative: 0.33,
            neutral: 0.34,
            compound: 0.0,
            sentiment: SentimentLabel::Neutral,
            neutral_leaning: NeutralLeaning {
                direction: LeaningDirection::Balanced,
                percentage: 0,
            },
        }
    }
}

/// Label thresholds on the compound score. Boundary values fall exactly one
/// way: 0.50 is Slightly Positive, 0.10 and -0.10 are Neutral, -0.50 is
/// Slightly Negative.
pub fn label_for_compound(compound: f64) -> SentimentLabel {
    if compound > 0.50 {
        SentimentLabel::Positive
    } else if compound > 0.10 {
        SentimentLabel::SlightlyPositive
    } else if compound >= -0.10 {
        SentimentLabel::Neutral
    } else if compound >= -0.50 {
        SentimentLabel::SlightlyNegative
    } else {
        SentimentLabel::Negative
    }
}

pub fn leaning_for_compound(compound: f64) -> NeutralLeaning {
    if compound > 0.0 {
        NeutralLeaning {
            direction: LeaningDirection::Positive,
            percentage: (compound * 100.0).round() as u8,
        }
    } else if compound < 0.0 {
        NeutralLeaning {
            direction: LeaningDirection::Negative,
            percentage: (compound.abs() * 100.0).round() as u8,
        }
    } else {
        NeutralLeaning {
            direction: LeaningDirection::Balanced,
            percentage: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trip() {
        assert_eq!("reddit".parse::<Platform>().unwrap(), Platform::Reddit);
        assert_eq!("X".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!(Platform::Bluesky.as_str(), "Bluesky");
        assert!("facebook".parse::<Platform>().is_err());
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(Platform::Reddit.collection_name(), "reddit_posts");
        assert_eq!(Platform::Twitter.collection_name(), "tweets");
        assert_eq!(Platform::Bluesky.collection_name(), "bluesky_posts");
    }

    #[test]
    fn test_label_thresholds() {
        assert_eq!(label_for_compound(0.51), SentimentLabel::Positive);
        // 0.50 itself is Slightly Positive, not Positive
        assert_eq!(label_for_compound(0.50), SentimentLabel::SlightlyPositive);
        assert_eq!(label_for_compound(0.11), SentimentLabel::SlightlyPositive);
        // Both edges of the neutral band are inclusive
        assert_eq!(label_for_compound(0.10), SentimentLabel::Neutral);
        assert_eq!(label_for_compound(0.0), SentimentLabel::Neutral);
        assert_eq!(label_for_compound(-0.10), SentimentLabel::Neutral);
        assert_eq!(label_for_compound(-0.11), SentimentLabel::SlightlyNegative);
        assert_eq!(label_for_compound(-0.50), SentimentLabel::SlightlyNegative);
        assert_eq!(label_for_compound(-0.51), SentimentLabel::Negative);
    }

    #[test]
    fn test_leaning() {
        let lean = leaning_for_compound(0.42);
        assert_eq!(lean.direction, LeaningDirection::Positive);
        assert_eq!(lean.percentage, 42);

        let lean = leaning_for_compound(-0.255);
        assert_eq!(lean.direction, LeaningDirection::Negative);
        assert_eq!(lean.percentage, 26);

        let lean = leaning_for_compound(0.0);
        assert_eq!(lean.direction, LeaningDirection::Balanced);
        assert_eq!(lean.percentage, 0);
    }

    #[test]
    fn test_label_serde_names() {
        let json = serde_json::to_string(&SentimentLabel::SlightlyNegative).unwrap();
        assert_eq!(json, "\"Slightly Negative\"");
    }
}
