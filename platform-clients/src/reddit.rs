use crate::backoff::{classify_status, FetchOutcome, RetryConfig};
use crate::fetch::{fetch_with_policy, FetchClient, FetchPage, PlatformSession};
use crate::normalize::{normalize_reddit, RedditListing};
use async_trait::async_trait;
use croplisten_core::{Platform, PlatformApiError, RedditCredentials};
use serde::Deserialize;
use tracing::{debug, info, warn};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const PAGE_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Reddit search client using an OAuth2 client-credentials token. The
/// token is application-scoped, so "refresh" and full re-auth are the same
/// request; both slots of the recovery policy get a fresh token.
pub struct RedditClient {
    http: reqwest::Client,
    credentials: RedditCredentials,
    access_token: Option<String>,
    retry: RetryConfig,
    pub sort_by: String,
    pub time_filter: String,
    /// Restrict the search to these subreddits; empty searches all of
    /// Reddit.
    pub subreddits: Vec<String>,
}

/// Search endpoint for a subreddit set: `/r/a+b/search` restricted to
/// those subreddits, or the sitewide `/search` when none are given.
fn search_url(subreddits: &[String]) -> String {
    if subreddits.is_empty() {
        format!("{API_BASE}/search")
    } else {
        format!("{API_BASE}/r/{}/search", subreddits.join("+"))
    }
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials) -> Result<Self, PlatformApiError> {
        let http = reqwest::Client::builder()
            .user_agent(credentials.user_agent.clone())
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PlatformApiError::InvalidResponse {
                details: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            credentials,
            access_token: None,
            retry: RetryConfig::reddit(),
            sort_by: "relevance".to_string(),
            time_filter: "all".to_string(),
            subreddits: Vec::new(),
        })
    }

    async fn request_token(&mut self) -> Result<(), PlatformApiError> {
        debug!("requesting Reddit OAuth2 client-credentials token");
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(PlatformApiError::AuthenticationFailed {
                platform: Platform::Reddit.to_string(),
                reason: format!("token endpoint returned {status}"),
            });
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| PlatformApiError::InvalidResponse {
                    details: format!("token response was not valid JSON: {e}"),
                })?;
        info!("obtained Reddit access token");
        self.access_token = Some(token.access_token);
        Ok(())
    }
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
impl PlatformSession for RedditClient {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn send(
        &mut self,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<FetchPage, PlatformApiError> {
        if self.access_token.is_none() {
            self.request_token().await?;
        }
        let token = self.access_token.as_deref().unwrap_or_default();

        let mut request = self
            .http
            .get(search_url(&self.subreddits))
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("sort", self.sort_by.as_str()),
                ("t", self.time_filter.as_str()),
            ])
            .query(&[("limit", PAGE_LIMIT)]);
        if !self.subreddits.is_empty() {
            request = request.query(&[("restrict_sr", "1")]);
        }
        if let Some(after) = cursor {
            request = request.query(&[("after", after)]);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        match classify_status(status) {
            FetchOutcome::Success => {}
            FetchOutcome::AuthExpired => {
                return Err(PlatformApiError::AuthExpired {
                    platform: Platform::Reddit.to_string(),
                })
            }
            FetchOutcome::RateLimited { .. } => {
                let retry_after = response
                    .headers()
                    .get("x-ratelimit-reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(PlatformApiError::RateLimitExceeded {
                    platform: Platform::Reddit.to_string(),
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

        let listing: RedditListing =
            response
                .json()
                .await
                .map_err(|e| PlatformApiError::InvalidResponse {
                    details: format!("listing was not valid JSON: {e}"),
                })?;

        let mut posts = Vec::with_capacity(listing.data.children.len());
        for child in &listing.data.children {
            match normalize_reddit(&child.data) {
                Ok(post) => posts.push(post),
                Err(e) => warn!(error = %e, "skipping malformed reddit post"),
            }
        }

        Ok(FetchPage {
            posts,
            next_cursor: listing.data.after,
        })
    }

    async fn refresh_auth(&mut self) -> Result<(), PlatformApiError> {
        self.request_token().await
    }

    async fn reauthenticate(&mut self) -> Result<(), PlatformApiError> {
        self.access_token = None;
        self.request_token().await
    }
}

#[async_trait]
impl FetchClient for RedditClient {
    fn platform(&self) -> Platform {
        Platform::Reddit
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
