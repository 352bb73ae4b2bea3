use crate::backoff::{classify_status, FetchOutcome, RetryConfig};
use crate::fetch::{fetch_with_policy, FetchClient, FetchPage, PlatformSession};
use crate::normalize::{normalize_bluesky, BlueskySearchResponse};
use async_trait::async_trait;
use croplisten_core::{BlueskyCredentials, Platform, PlatformApiError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::{debug, info, warn};

const SESSION_URL: &str = "https://bsky.social/xrpc/com.atproto.server.createSession";
const REFRESH_URL: &str = "https://bsky.social/xrpc/com.atproto.server.refreshSession";
const SEARCH_URL: &str = "https://bsky.social/xrpc/app.bsky.feed.searchPosts";
const PAGE_LIMIT: u32 = 100;

/// JWT pair persisted across runs so restarts reuse the session instead
/// of creating a new one every time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    #[serde(rename = "refreshJwt")]
    pub refresh_jwt: String,
}

pub struct BlueskyClient {
    http: reqwest::Client,
    credentials: BlueskyCredentials,
    tokens: Option<SessionTokens>,
    retry: RetryConfig,
}

impl BlueskyClient {
    pub fn new(credentials: BlueskyCredentials) -> Result<Self, PlatformApiError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PlatformApiError::InvalidResponse {
                details: format!("failed to build HTTP client: {e}"),
            })?;
        let tokens = load_tokens(Path::new(&credentials.tokens_path));
        if tokens.is_some() {
            info!("loaded saved Bluesky session tokens");
        }
        Ok(Self {
            http,
            credentials,
            tokens,
            retry: RetryConfig::bluesky(),
        })
    }

    async fn create_session(&mut self) -> Result<(), PlatformApiError> {
        debug!("creating Bluesky session");
        let response = self
            .http
            .post(SESSION_URL)
            .json(&json!({
                "identifier": self.credentials.identifier,
                "password": self.credentials.app_password,
            }))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(PlatformApiError::AuthenticationFailed {
                platform: Platform::Bluesky.to_string(),
                reason: format!("createSession returned {status}"),
            });
        }

        let tokens: SessionTokens =
            response
                .json()
                .await
                .map_err(|e| PlatformApiError::InvalidResponse {
                    details: format!("createSession response was not valid JSON: {e}"),
                })?;
        self.store_tokens(tokens);
        info!("authenticated to Bluesky");
        Ok(())
    }

    async fn refresh_session(&mut self) -> Result<(), PlatformApiError> {
        let refresh_jwt = match &self.tokens {
            Some(t) => t.refresh_jwt.clone(),
            None => return self.create_session().await,
        };

        debug!("refreshing Bluesky session");
        let response = self
            .http
            .post(REFRESH_URL)
            .bearer_auth(refresh_jwt)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            warn!(status, "Bluesky session refresh rejected");
            return Err(PlatformApiError::AuthenticationFailed {
                platform: Platform::Bluesky.to_string(),
                reason: format!("refreshSession returned {status}"),
            });
        }

        let tokens: SessionTokens =
            response
                .json()
                .await
                .map_err(|e| PlatformApiError::InvalidResponse {
                    details: format!("refreshSession response was not valid JSON: {e}"),
                })?;
        self.store_tokens(tokens);
        Ok(())
    }

    fn store_tokens(&mut self, tokens: SessionTokens) {
        if let Err(e) = save_tokens(Path::new(&self.credentials.tokens_path), &tokens) {
            warn!(error = %e, "could not persist Bluesky tokens, session will not survive restart");
        }
        self.tokens = Some(tokens);
    }
}

fn load_tokens(path: &Path) -> Option<SessionTokens> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn save_tokens(path: &Path, tokens: &SessionTokens) -> std::io::Result<()> {
    let raw = serde_json::to_string_pretty(tokens)?;
    std::fs::write(path, raw)
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
impl PlatformSession for BlueskyClient {
    fn platform(&self) -> Platform {
        Platform::Bluesky
    }

    async fn send(
        &mut self,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<FetchPage, PlatformApiError> {
        if self.tokens.is_none() {
            self.create_session().await?;
        }
        let access_jwt = self
            .tokens
            .as_ref()
            .map(|t| t.access_jwt.clone())
            .unwrap_or_default();

        let mut request = self
            .http
            .get(SEARCH_URL)
            .bearer_auth(access_jwt)
            .query(&[("q", query)])
            .query(&[("limit", PAGE_LIMIT)]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        match classify_status(status) {
            FetchOutcome::Success => {}
            FetchOutcome::AuthExpired => {
                return Err(PlatformApiError::AuthExpired {
                    platform: Platform::Bluesky.to_string(),
                })
            }
            FetchOutcome::RateLimited { .. } => {
                let retry_after = response
                    .headers()
                    .get("ratelimit-reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|epoch| {
                        let now = chrono::Utc::now().timestamp();
                        (epoch - now).max(0) as u64
                    })
                    .unwrap_or(60);
                return Err(PlatformApiError::RateLimitExceeded {
                    platform: Platform::Bluesky.to_string(),
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
                    details: format!("searchPosts returned {status}"),
                })
            }
        }

        let body: BlueskySearchResponse =
            response
                .json()
                .await
                .map_err(|e| PlatformApiError::InvalidResponse {
                    details: format!("searchPosts response was not valid JSON: {e}"),
                })?;

        let mut posts = Vec::with_capacity(body.posts.len());
        for raw in &body.posts {
            match normalize_bluesky(raw) {
                Ok(post) => posts.push(post),
                Err(e) => warn!(error = %e, "skipping malformed bluesky post"),
            }
        }

        Ok(FetchPage {
            posts,
            next_cursor: body.cursor,
        })
    }

    async fn refresh_auth(&mut self) -> Result<(), PlatformApiError> {
        self.refresh_session().await
    }

    async fn reauthenticate(&mut self) -> Result<(), PlatformApiError> {
        self.tokens = None;
        self.create_session().await
    }
}

#[async_trait]
impl FetchClient for BlueskyClient {
    fn platform(&self) -> Platform {
        Platform::Bluesky
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let tokens = SessionTokens {
            access_jwt: "access".to_string(),
            refresh_jwt: "refresh".to_string(),
        };
        save_tokens(&path, &tokens).unwrap();
        let loaded = load_tokens(&path).unwrap();
        assert_eq!(loaded.access_jwt, "access");
        assert_eq!(loaded.refresh_jwt, "refresh");
    }

    #[test]
    fn test_missing_tokens_file_is_none() {
        assert!(load_tokens(Path::new("/nonexistent/tokens.json")).is_none());
    }
}
