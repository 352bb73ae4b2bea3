use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Immutable search criteria for one collection run, loaded from a TOML
/// file. `time_filter` is always forced to "all" regardless of what the
/// file says; narrower windows silently miss older posts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpec {
    #[serde(default)]
    pub and_terms: Vec<String>,
    #[serde(default)]
    pub or_terms: Vec<String>,
    #[serde(default)]
    pub not_terms: Vec<String>,
    #[serde(default)]
    pub exact_phrases: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub subreddits: Vec<String>,
    #[serde(default)]
    pub location_mentions: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub to_date: Option<String>,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_time_filter")]
    pub time_filter: String,
    #[serde(default = "default_max_posts")]
    pub max_posts: usize,
    #[serde(default)]
    pub min_posts: usize,
}

fn default_sort_by() -> String {
    "relevance".to_string()
}

fn default_time_filter() -> String {
    "all".to_string()
}

fn default_max_posts() -> usize {
    1000
}

impl SearchSpec {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let mut spec: SearchSpec = toml::from_str(&raw)?;
        if spec.time_filter != "all" {
            warn!(
                requested = %spec.time_filter,
                "time_filter overridden to 'all' to avoid missing older posts"
            );
            spec.time_filter = "all".to_string();
        }
        Ok(spec)
    }

    /// No positive criteria at all. Builders substitute a default
    /// agricultural query in this case.
    pub fn is_empty(&self) -> bool {
        self.and_terms.is_empty() && self.or_terms.is_empty() && self.exact_phrases.is_empty()
    }
}

/// Reddit OAuth2 client-credentials.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

/// Bluesky app password login. Session JWTs are persisted to `tokens_path`
/// so reruns reuse them instead of re-authenticating.
#[derive(Debug, Clone)]
pub struct BlueskyCredentials {
    pub identifier: String,
    pub app_password: String,
    pub tokens_path: String,
}

/// Twitter session material loaded from a file; there is no programmatic
/// login path.
#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub session_path: String,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub mongo_uri: String,
    pub db_name: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub reddit: Option<RedditCredentials>,
    pub bluesky: Option<BlueskyCredentials>,
    pub twitter: Option<TwitterCredentials>,
    pub sentiment_model_url: String,
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvironmentVariable {
        var_name: name.to_string(),
    })
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl AppConfig {
    /// Load configuration from the environment. `MONGO_URI` is required;
    /// per-platform credentials are optional and absent blocks only the
    /// platforms that need them.
    pub fn from_env() -> Result<Self, ConfigError> {
        let store = StoreConfig {
            mongo_uri: required_env("MONGO_URI")?,
            db_name: optional_env("MONGO_DB_NAME").unwrap_or_else(|| "social-listening".to_string()),
        };

        let reddit = match (
            optional_env("REDDIT_CLIENT_ID"),
            optional_env("REDDIT_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Some(RedditCredentials {
                client_id,
                client_secret,
                user_agent: optional_env("REDDIT_USER_AGENT")
                    .unwrap_or_else(|| "croplisten/0.1".to_string()),
            }),
            _ => None,
        };

        let bluesky = match (
            optional_env("BLUESKY_IDENTIFIER"),
            optional_env("BLUESKY_APP_PASSWORD"),
        ) {
            (Some(identifier), Some(app_password)) => Some(BlueskyCredentials {
                identifier,
                app_password,
                tokens_path: optional_env("BLUESKY_TOKENS_PATH")
                    .unwrap_or_else(|| "bluesky_tokens.json".to_string()),
            }),
            _ => None,
        };

        let twitter = optional_env("TWITTER_SESSION_PATH")
            .map(|session_path| TwitterCredentials { session_path });

        Ok(Self {
            store,
            reddit,
            bluesky,
            twitter,
            sentiment_model_url: optional_env("SENTIMENT_MODEL_URL")
                .unwrap_or_else(|| "http://localhost:8501/v1/models/sentiment:predict".to_string()),
        })
    }

    /// Credentials for the given platform name, as a config error when
    /// missing so callers fail before any network work starts.
    pub fn require_reddit(&self) -> Result<&RedditCredentials, ConfigError> {
        self.reddit.as_ref().ok_or(ConfigError::MissingEnvironmentVariable {
            var_name: "REDDIT_CLIENT_ID / REDDIT_CLIENT_SECRET".to_string(),
        })
    }

    pub fn require_bluesky(&self) -> Result<&BlueskyCredentials, ConfigError> {
        self.bluesky.as_ref().ok_or(ConfigError::MissingEnvironmentVariable {
            var_name: "BLUESKY_IDENTIFIER / BLUESKY_APP_PASSWORD".to_string(),
        })
    }

    pub fn require_twitter(&self) -> Result<&TwitterCredentials, ConfigError> {
        self.twitter.as_ref().ok_or(ConfigError::MissingEnvironmentVariable {
            var_name: "TWITTER_SESSION_PATH".to_string(),
        })
    }
}
