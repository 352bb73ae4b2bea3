use crate::backoff::{classify_status, FetchOutcome, RetryConfig};
use crate::fetch::{fetch_with_policy, FetchClient, FetchPage, PlatformSession};
use crate::normalize::{normalize_twitter, TwitterTweet};
use async_trait::async_trait;
use croplisten_core::{Platform, PlatformApiError, TwitterCredentials};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

const SEARCH_URL: &str = "https://api.twitter.com/1.1/search/tweets.json";
const PAGE_LIMIT: u32 = 100;

/// Session material loaded from a file prepared out of band. There is no
/// programmatic login: if the session dies, an operator has to produce a
/// new file.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterSession {
    pub bearer_token: String,
    #[serde(default)]
    pub cookie: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    statuses: Vec<TwitterTweet>,
    #[serde(default)]
    search_metadata: SearchMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct SearchMetadata {
    #[serde(default)]
    next_results: Option<String>,
}

/// Pull the `max_id` value out of a `next_results` query string like
/// `?max_id=1764...&q=wheat`. That value is the opaque cursor we hand the
/// walker.
fn cursor_from_next_results(next_results: &str) -> Option<String> {
    next_results
        .trim_start_matches('?')
        .split('&')
        .find_map(|pair| pair.strip_prefix("max_id="))
        .map(String::from)
}

pub struct TwitterClient {
    http: reqwest::Client,
    credentials: TwitterCredentials,
    session: Option<TwitterSession>,
    retry: RetryConfig,
}

impl TwitterClient {
    pub fn new(credentials: TwitterCredentials) -> Result<Self, PlatformApiError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PlatformApiError::InvalidResponse {
                details: format!("failed to build HTTP client: {e}"),
            })?;
        let session = load_session(Path::new(&credentials.session_path))?;
        info!("loaded Twitter session file");
        Ok(Self {
            http,
            credentials,
            session: Some(session),
            retry: RetryConfig::twitter(),
        })
    }
}

fn load_session(path: &Path) -> Result<TwitterSession, PlatformApiError> {
    let raw = std::fs::read_to_string(path).map_err(|e| PlatformApiError::AuthenticationFailed {
        platform: Platform::Twitter.to_string(),
        reason: format!("could not read session file {}: {e}", path.display()),
    })?;
    serde_json::from_str(&raw).map_err(|e| PlatformApiError::AuthenticationFailed {
        platform: Platform::Twitter.to_string(),
        reason: format!("session file is not valid JSON: {e}"),
    })
}

fn map_reqwest_error(e: reqwest::Error) -> PlatformApiError {
    if e.is_timeout() {
        PlatformApiError::RequestTimeout
    } else {
        PlatformApiError::EndpointUnavailable {
            endpoint: e
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[async_trait]
impl PlatformSession for TwitterClient {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn send(
        &mut self,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<FetchPage, PlatformApiError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| PlatformApiError::AuthenticationFailed {
                platform: Platform::Twitter.to_string(),
                reason: "no session loaded".to_string(),
            })?;

        let mut request = self
            .http
            .get(SEARCH_URL)
            .bearer_auth(&session.bearer_token)
            .query(&[("q", query), ("result_type", "recent")])
            .query(&[("count", PAGE_LIMIT)]);
        if let Some(cookie) = &session.cookie {
            request = request.header("Cookie", cookie);
        }
        if let Some(max_id) = cursor {
            request = request.query(&[("max_id", max_id)]);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        match classify_status(status) {
            FetchOutcome::Success => {}
            FetchOutcome::AuthExpired => {
                return Err(PlatformApiError::AuthExpired {
                    platform: Platform::Twitter.to_string(),
                })
            }
            FetchOutcome::RateLimited { .. } => {
                let retry_after = response
                    .headers()
                    .get("x-rate-limit-reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|epoch| {
                        let now = chrono::Utc::now().timestamp();
                        (epoch - now).max(0) as u64
                    })
                    .unwrap_or(15 * 60);
                return Err(PlatformApiError::RateLimitExceeded {
                    platform: Platform::Twitter.to_string(),
                    retry_after,
                });
            }
            FetchOutcome::Transient => {
                return Err(PlatformApiError::ServerError {
                    status_code: status,
                })
            }
            FetchOutcome::Permanent => {
                return Err(PlatformApiError::InvalidResponse {
                    details: format!("search endpoint returned {status}"),
                })
            }
        }

        let body: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| PlatformApiError::InvalidResponse {
                    details: format!("search response was not valid JSON: {e}"),
                })?;

        let mut posts = Vec::with_capacity(body.statuses.len());
        for raw in &body.statuses {
            match normalize_twitter(raw) {
                Ok(post) => posts.push(post),
                Err(e) => warn!(error = %e, "skipping malformed tweet"),
            }
        }

        let next_cursor = body
            .search_metadata
            .next_results
            .as_deref()
            .and_then(cursor_from_next_results);

        Ok(FetchPage { posts, next_cursor })
    }

    /// "Refresh" for a file-based session means re-reading the file: an
    /// operator may have replaced it with fresh material while we ran.
    async fn refresh_auth(&mut self) -> Result<(), PlatformApiError> {
        debug!("reloading Twitter session file");
        self.session = Some(load_session(Path::new(&self.credentials.session_path))?);
        Ok(())
    }

    async fn reauthenticate(&mut self) -> Result<(), PlatformApiError> {
        Err(PlatformApiError::AuthenticationFailed {
            platform: Platform::Twitter.to_string(),
            reason: "session rejected and no automated login path exists; \
                     replace the session file"
                .to_string(),
        })
    }
}

#[async_trait]
impl FetchClient for TwitterClient {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn fetch(
        &mut self,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<FetchPage, PlatformApiError> {
        let retry = self.retry.clone();
        fetch_with_policy(self, query, cursor, &retry).await
    }
}
