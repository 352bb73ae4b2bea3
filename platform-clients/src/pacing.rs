use std::time::Duration;
use tracing::info;

/// Politeness pacing between consecutive fetch calls. Scraping at full
/// speed gets sessions throttled or banned; each platform tolerates a
/// different cadence.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Minimum delay between requests (seconds)
    pub min_delay_s: u64,
    /// Maximum delay between requests (seconds)
    pub max_delay_s: u64,
    /// Probability that a delay is replaced by a longer rest pause
    pub rest_chance: f64,
    /// Minimum rest pause (seconds)
    pub min_rest_s: u64,
    /// Maximum rest pause (seconds)
    pub max_rest_s: u64,
}

impl PacingConfig {
    /// Reddit's official API allows a steady cadence
    pub fn reddit() -> Self {
        Self {
            min_delay_s: 1,
            max_delay_s: 3,
            rest_chance: 0.0,
            min_rest_s: 0,
            max_rest_s: 0,
        }
    }

    pub fn bluesky() -> Self {
        Self {
            min_delay_s: 3,
            max_delay_s: 8,
            rest_chance: 0.0,
            min_rest_s: 0,
            max_rest_s: 0,
        }
    }

    /// Twitter pacing is conservative: long delays plus occasional
    /// multi-minute rests so the traffic pattern looks human
    pub fn twitter() -> Self {
        Self {
            min_delay_s: 30,
            max_delay_s: 60,
            rest_chance: 0.15,
            min_rest_s: 120,
            max_rest_s: 300,
        }
    }

    /// Pick the next inter-request delay: usually a draw from the
    /// [min,max] window, occasionally a longer rest pause.
    pub fn next_delay(&self) -> Duration {
        if self.rest_chance > 0.0 && fastrand::f64() < self.rest_chance {
            let rest = fastrand::u64(self.min_rest_s..=self.max_rest_s);
            info!(rest_s = rest, "taking a longer rest to avoid throttling");
            return Duration::from_secs(rest);
        }
        Duration::from_secs(fastrand::u64(self.min_delay_s..=self.max_delay_s))
    }
}

/// Wait duration after a rate-limit response: the platform-declared reset
/// plus a random 1-3 minute buffer. Resuming exactly at the reset second
/// trips the limiter again often enough to be worth padding.
pub fn rate_limit_wait(retry_after_s: u64) -> Duration {
    let buffer = fastrand::u64(60..=180);
    Duration::from_secs(retry_after_s + buffer)
}
