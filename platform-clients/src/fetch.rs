use crate::backoff::{calculate_delay, classify_error, FetchOutcome, RetryConfig};
use crate::pacing::rate_limit_wait;
use async_trait::async_trait;
use croplisten_core::{Platform, PlatformApiError, Post, StoreError};
use tokio::time::sleep;
use tracing::{debug, warn};

/// One page of fetched posts plus the token for the next page, if any.
#[derive(Debug, Default)]
pub struct FetchPage {
    pub posts: Vec<Post>,
    pub next_cursor: Option<String>,
}

/// A platform client as the pagination walker sees it: one call, one page.
/// Implementations handle auth recovery, rate-limit waits and transient
/// retries internally, so errors surfacing here are final.
#[async_trait]
pub trait FetchClient: Send {
    fn platform(&self) -> Platform;

    async fn fetch(
        &mut self,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<FetchPage, PlatformApiError>;
}

/// Destination for fetched posts. `save` returns whether the post was new;
/// `flush` persists everything accumulated so far.
#[async_trait]
pub trait PageSink: Send {
    fn save(&mut self, post: Post) -> bool;

    async fn flush(&mut self) -> Result<usize, StoreError>;

    fn saved_count(&self) -> usize;
}

/// The raw request layer a platform client provides underneath the fetch
/// policy: send one request, refresh the token, or re-authenticate from
/// scratch.
#[async_trait]
pub trait PlatformSession: Send {
    fn platform(&self) -> Platform;

    async fn send(
        &mut self,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<FetchPage, PlatformApiError>;

    async fn refresh_auth(&mut self) -> Result<(), PlatformApiError>;

    async fn reauthenticate(&mut self) -> Result<(), PlatformApiError>;
}

/// Drive one logical fetch through the recovery policy:
/// - auth-expired: one token refresh, then one full re-auth, then fail hard
/// - rate-limited: wait out the platform reset plus a random buffer, retry
/// - transient: exponential backoff, at most `retry.max_attempts` tries
/// Cursor progress is never lost: the same (query, cursor) pair is retried
/// until it either succeeds or fails permanently.
pub async fn fetch_with_policy<S: PlatformSession + ?Sized>(
    session: &mut S,
    query: &str,
    cursor: Option<&str>,
    retry: &RetryConfig,
) -> Result<FetchPage, PlatformApiError> {
    let platform = session.platform();
    let mut transient_attempts: u32 = 0;
    let mut refresh_attempted = false;
    let mut reauth_attempted = false;

    loop {
        let err = match session.send(query, cursor).await {
            Ok(page) => return Ok(page),
            Err(err) => err,
        };

        match classify_error(&err) {
            FetchOutcome::AuthExpired => {
                if !refresh_attempted {
                    refresh_attempted = true;
                    warn!(%platform, "access token expired, attempting refresh");
                    // A dead refresh token is the common failure here;
                    // fall through to a full re-auth instead of giving up
                    if let Err(refresh_err) = session.refresh_auth().await {
                        warn!(
                            %platform,
                            error = %refresh_err,
                            "token refresh failed, re-authenticating from scratch"
                        );
                        reauth_attempted = true;
                        session.reauthenticate().await?;
                    }
                } else if !reauth_attempted {
                    reauth_attempted = true;
                    warn!(%platform, "token refresh did not stick, re-authenticating");
                    session.reauthenticate().await?;
                } else {
                    return Err(PlatformApiError::AuthenticationFailed {
                        platform: platform.to_string(),
                        reason: "credentials rejected after refresh and re-authentication"
                            .to_string(),
                    });
                }
            }
            FetchOutcome::RateLimited { retry_after } => {
                let wait = rate_limit_wait(retry_after);
                warn!(
                    %platform,
                    wait_s = wait.as_secs(),
                    "rate limited, waiting for reset plus buffer"
                );
                sleep(wait).await;
            }
            FetchOutcome::Transient => {
                transient_attempts += 1;
                if transient_attempts >= retry.max_attempts {
                    return Err(PlatformApiError::RetriesExhausted {
                        attempts: transient_attempts,
                        details: err.to_string(),
                    });
                }
                let delay = calculate_delay(transient_attempts, retry);
                debug!(
                    %platform,
                    attempt = transient_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient error, backing off"
                );
                sleep(delay).await;
            }
            FetchOutcome::Permanent | FetchOutcome::Success => return Err(err),
        }
    }
}
