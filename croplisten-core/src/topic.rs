//! Keyword-count topic classifier applied to every collected post.

/// Ordered topic table. Order matters: on a tied keyword count the topic
/// listed earlier wins, because only a strictly higher count displaces the
/// current best.
const TOPICS: &[(&str, &[&str])] = &[
    (
        "Politics",
        &[
            "government",
            "policy",
            "minister",
            "parliament",
            "election",
            "vote",
            "president",
            "chancellor",
            "trump",
        ],
    ),
    (
        "Education",
        &[
            "university",
            "school",
            "student",
            "education",
            "academic",
            "professor",
            "research",
            "study",
            "campus",
        ],
    ),
    (
        "Economy",
        &[
            "money",
            "economy",
            "economic",
            "finance",
            "market",
            "investment",
            "salary",
            "price",
            "cost",
            "business",
            "tariff",
        ],
    ),
    (
        "Technology",
        &[
            "tech",
            "technology",
            "digital",
            "software",
            "computer",
            "internet",
            "ai",
            "artificial intelligence",
            "app",
        ],
    ),
    (
        "Health",
        &[
            "health",
            "medical",
            "doctor",
            "hospital",
            "disease",
            "treatment",
            "patient",
            "covid",
            "vaccine",
        ],
    ),
    (
        "Environment",
        &[
            "climate",
            "environment",
            "sustainability",
            "renewable",
            "energy",
            "green",
            "pollution",
            "carbon",
        ],
    ),
    (
        "Agriculture",
        &[
            "farm",
            "agriculture",
            "crop",
            "wheat",
            "barley",
            "canola",
            "harvest",
            "farming",
            "farmer",
        ],
    ),
];

/// Classify a post's text into one of the fixed topics, or "General" when
/// no keyword matches. Matching is case-insensitive substring containment,
/// one point per distinct keyword present.
pub fn classify_topic(text: &str) -> &'static str {
    let lower = text.to_lowercase();

    let mut best: Option<(&'static str, usize)> = None;
    for (topic, keywords) in TOPICS {
        let score = keywords.iter().filter(|kw| lower.contains(*kw)).count();
        if score == 0 {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((topic, score)),
        }
    }

    best.map(|(topic, _)| topic).unwrap_or("General")
}
