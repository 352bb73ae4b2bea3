use croplisten_core::PlatformApiError;
use std::time::Duration;

/// Configuration for transient-error retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts for transient errors
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Retry config tuned for the Reddit search API
    pub fn reddit() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }

    /// Bluesky tolerates quicker retries
    pub fn bluesky() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }

    /// Twitter is the most throttle-happy of the three
    pub fn twitter() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 5000,
            max_delay_ms: 120_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// What a fetch call's outcome means for the caller
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success,
    /// Token no longer accepted; refresh, then re-auth, then fail hard
    AuthExpired,
    /// Blocked until the platform's reset time
    RateLimited { retry_after: u64 },
    /// Worth retrying with backoff
    Transient,
    /// Not worth retrying
    Permanent,
}

/// Classify an HTTP status the way each platform actually behaves. A 404
/// is listed as transient: all three platforms intermittently return it
/// from gateway nodes during rollouts, and the same request succeeds
/// moments later.
pub fn classify_status(status: u16) -> FetchOutcome {
    match status {
        200..=299 => FetchOutcome::Success,
        401 => FetchOutcome::AuthExpired,
        429 => FetchOutcome::RateLimited { retry_after: 60 },
        404 | 408 | 500..=599 => FetchOutcome::Transient,
        _ => FetchOutcome::Permanent,
    }
}

pub fn classify_error(error: &PlatformApiError) -> FetchOutcome {
    match error {
        PlatformApiError::AuthExpired { .. } => FetchOutcome::AuthExpired,
        PlatformApiError::RateLimitExceeded { retry_after, .. } => FetchOutcome::RateLimited {
            retry_after: *retry_after,
        },
        PlatformApiError::ServerError { .. }
        | PlatformApiError::RequestTimeout
        | PlatformApiError::EndpointUnavailable { .. } => FetchOutcome::Transient,
        PlatformApiError::AuthenticationFailed { .. }
        | PlatformApiError::InvalidResponse { .. }
        | PlatformApiError::RetriesExhausted { .. } => FetchOutcome::Permanent,
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponential_delay = if attempt == 0 {
        Duration::from_millis(config.base_delay_ms)
    } else {
        let multiplier = config.backoff_multiplier.powi(attempt as i32);
        let delay_ms = (config.base_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay_ms.min(config.max_delay_ms))
    };

    // Jitter prevents synchronized retries across concurrent walkers
    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);
    let final_delay = exponential_delay + Duration::from_millis(jitter);

    final_delay.min(Duration::from_millis(config.max_delay_ms))
}
