//! Raw wire shapes for each platform and their conversion into the common
//! `Post` record. A record that cannot be normalized is skipped with a
//! warning; one bad post never aborts a page.

use chrono::{DateTime, NaiveDateTime, Utc};
use croplisten_core::{classify_topic, Platform, Post, StoreError};
use serde::Deserialize;
use tracing::warn;

// --- Reddit ---

#[derive(Debug, Deserialize)]
pub struct RedditListing {
    pub data: RedditListingData,
}

#[derive(Debug, Deserialize)]
pub struct RedditListingData {
    #[serde(default)]
    pub children: Vec<RedditChild>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RedditChild {
    pub data: RedditPost,
}

#[derive(Debug, Deserialize)]
pub struct RedditPost {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
}

pub fn normalize_reddit(raw: &RedditPost) -> Result<Post, StoreError> {
    if raw.id.is_empty() {
        return Err(StoreError::MalformedRecord {
            post_id: String::new(),
            details: "reddit post without an id".to_string(),
        });
    }

    let created_at = DateTime::<Utc>::from_timestamp(raw.created_utc as i64, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default();

    Ok(Post {
        post_id: raw.id.clone(),
        username: raw.author.clone().unwrap_or_else(|| "[deleted]".to_string()),
        // Reddit doesn't provide location
        user_location: String::new(),
        content_text: format!("{}\n\n{}", raw.title, raw.selftext),
        url: format!("https://www.reddit.com{}", raw.permalink),
        created_at,
        likes: raw.score.max(0) as u64,
        comments: raw.num_comments.max(0) as u64,
        platform: Platform::Reddit,
        topic_classification: classify_topic(&format!("{} {}", raw.title, raw.selftext))
            .to_string(),
        collected_at: Utc::now(),
    })
}

// --- Bluesky ---

#[derive(Debug, Deserialize)]
pub struct BlueskySearchResponse {
    #[serde(default)]
    pub posts: Vec<BlueskyPost>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlueskyPost {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub cid: String,
    pub author: BlueskyAuthor,
    pub record: BlueskyRecord,
    #[serde(rename = "likeCount", default)]
    pub like_count: u64,
    #[serde(rename = "replyCount", default)]
    pub reply_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct BlueskyAuthor {
    #[serde(default)]
    pub did: String,
    #[serde(default)]
    pub handle: String,
}

#[derive(Debug, Deserialize)]
pub struct BlueskyRecord {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
}

pub fn normalize_bluesky(raw: &BlueskyPost) -> Result<Post, StoreError> {
    if raw.cid.is_empty() {
        return Err(StoreError::MalformedRecord {
            post_id: String::new(),
            details: "bluesky post without a cid".to_string(),
        });
    }

    // at://did:plc:xyz/app.bsky.feed.post/<tid> — the tid is the URL tail
    let tid = raw.uri.rsplit('/').next().unwrap_or_default();
    let url = if !raw.author.did.is_empty() && !tid.is_empty() {
        format!("https://bsky.app/profile/{}/post/{}", raw.author.did, tid)
    } else {
        String::new()
    };

    Ok(Post {
        post_id: raw.cid.clone(),
        username: raw.author.handle.clone(),
        user_location: String::new(),
        content_text: raw.record.text.clone(),
        url,
        created_at: raw.record.created_at.clone(),
        likes: raw.like_count,
        comments: raw.reply_count,
        platform: Platform::Bluesky,
        topic_classification: classify_topic(&raw.record.text).to_string(),
        collected_at: Utc::now(),
    })
}

// --- Twitter ---

#[derive(Debug, Deserialize)]
pub struct TwitterTweet {
    #[serde(rename = "id_str")]
    pub id: String,
    pub user: TwitterUser,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct TwitterUser {
    #[serde(default)]
    pub screen_name: String,
    #[serde(default)]
    pub location: String,
}

/// Twitter serves "Tue Mar 04 17:35:50 +0000 2025", occasionally without
/// the offset. Anything else is kept verbatim so the record is not lost.
pub fn parse_twitter_date(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y") {
        return dt.to_rfc3339();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %Y") {
        return dt.format("%Y-%m-%dT%H:%M:%S").to_string();
    }
    warn!(date = %raw, "could not parse tweet date format, keeping as-is");
    raw.to_string()
}

pub fn normalize_twitter(raw: &TwitterTweet) -> Result<Post, StoreError> {
    if raw.id.is_empty() {
        return Err(StoreError::MalformedRecord {
            post_id: String::new(),
            details: "tweet without an id".to_string(),
        });
    }

    let url = if !raw.user.screen_name.is_empty() {
        format!(
            "https://twitter.com/{}/status/{}",
            raw.user.screen_name, raw.id
        )
    } else {
        String::new()
    };

    Ok(Post {
        post_id: raw.id.clone(),
        username: raw.user.screen_name.clone(),
        user_location: raw.user.location.clone(),
        content_text: raw.text.clone(),
        url,
        created_at: parse_twitter_date(&raw.created_at),
        likes: raw.favorite_count,
        comments: raw.retweet_count + raw.reply_count,
        platform: Platform::Twitter,
        topic_classification: classify_topic(&raw.text).to_string(),
        collected_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reddit_normalization() {
        let raw = RedditPost {
            id: "abc123".to_string(),
            author: Some("grower".to_string()),
            title: "Wheat rust spotted".to_string(),
            selftext: "Fields near Perth affected".to_string(),
            permalink: "/r/farming/comments/abc123/wheat_rust/".to_string(),
            created_utc: 1714521600.0,
            score: 42,
            num_comments: 7,
        };
        let post = normalize_reddit(&raw).unwrap();
        assert_eq!(post.post_id, "abc123");
        assert_eq!(
            post.content_text,
            "Wheat rust spotted\n\nFields near Perth affected"
        );
        assert_eq!(
            post.url,
            "https://www.reddit.com/r/farming/comments/abc123/wheat_rust/"
        );
        assert!(post.created_at.starts_with("2024-"));
        assert_eq!(post.likes, 42);
        assert_eq!(post.comments, 7);
        assert_eq!(post.platform, Platform::Reddit);
        assert_eq!(post.topic_classification, "Agriculture");
        assert_eq!(post.user_location, "");
    }

    #[test]
    fn test_reddit_deleted_author_and_negative_score() {
        let raw = RedditPost {
            id: "x".to_string(),
            author: None,
            title: "t".to_string(),
            selftext: String::new(),
            permalink: "/r/x/1".to_string(),
            created_utc: 0.0,
            score: -5,
            num_comments: 0,
        };
        let post = normalize_reddit(&raw).unwrap();
        assert_eq!(post.username, "[deleted]");
        assert_eq!(post.likes, 0);
    }

    #[test]
    fn test_bluesky_normalization() {
        let raw: BlueskyPost = serde_json::from_value(serde_json::json!({
            "uri": "at://did:plc:abcd/app.bsky.feed.post/3k44deadbeef",
            "cid": "bafyrei123",
            "author": {"did": "did:plc:abcd", "handle": "farmer.bsky.social"},
            "record": {"text": "canola harvest going well", "createdAt": "2024-05-01T10:00:00.000Z"},
            "likeCount": 3,
            "replyCount": 1
        }))
        .unwrap();
        let post = normalize_bluesky(&raw).unwrap();
        assert_eq!(post.post_id, "bafyrei123");
        assert_eq!(
            post.url,
            "https://bsky.app/profile/did:plc:abcd/post/3k44deadbeef"
        );
        assert_eq!(post.created_at, "2024-05-01T10:00:00.000Z");
        assert_eq!(post.topic_classification, "Agriculture");
    }

    #[test]
    fn test_bluesky_missing_cid_is_malformed() {
        let raw: BlueskyPost = serde_json::from_value(serde_json::json!({
            "uri": "",
            "cid": "",
            "author": {"did": "", "handle": ""},
            "record": {"text": "", "createdAt": ""}
        }))
        .unwrap();
        assert!(matches!(
            normalize_bluesky(&raw),
            Err(StoreError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_twitter_normalization() {
        let raw = TwitterTweet {
            id: "1764".to_string(),
            user: TwitterUser {
                screen_name: "aggrower".to_string(),
                location: "Perth, WA".to_string(),
            },
            text: "barley crop looking healthy".to_string(),
            created_at: "Tue Mar 04 17:35:50 +0000 2025".to_string(),
            favorite_count: 10,
            retweet_count: 2,
            reply_count: 3,
        };
        let post = normalize_twitter(&raw).unwrap();
        assert_eq!(post.url, "https://twitter.com/aggrower/status/1764");
        assert_eq!(post.created_at, "2025-03-04T17:35:50+00:00");
        assert_eq!(post.likes, 10);
        // retweets and replies are folded together
        assert_eq!(post.comments, 5);
        assert_eq!(post.user_location, "Perth, WA");
    }

    #[test]
    fn test_twitter_date_fallback_without_offset() {
        assert_eq!(
            parse_twitter_date("Tue Mar 04 17:35:50 2025"),
            "2025-03-04T17:35:50"
        );
    }

    #[test]
    fn test_twitter_unparseable_date_kept() {
        assert_eq!(parse_twitter_date("sometime in March"), "sometime in March");
    }
}
