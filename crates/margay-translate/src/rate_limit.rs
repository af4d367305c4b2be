//! Sliding-window rate limiting and quota backoff policy.

use std::time::{Duration, Instant};

use regex::Regex;
use std::sync::OnceLock;

fn retry_in_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)retry in (\d+(?:\.\d+)?)s").unwrap())
}

/// Sliding 60-second window over request timestamps.
///
/// Callers loop on [`RateLimiter::reserve`]: `None` means a slot was taken
/// and recorded, `Some(wait)` means the window is full and the caller must
/// sleep until the oldest timestamp leaves it (plus a one-second buffer).
#[derive(Debug)]
pub struct RateLimiter {
    max_requests_per_minute: usize,
    timestamps: Vec<Instant>,
}

const WINDOW: Duration = Duration::from_secs(60);
const BUFFER: Duration = Duration::from_secs(1);

impl RateLimiter {
    pub fn new(max_requests_per_minute: usize) -> Self {
        RateLimiter {
            max_requests_per_minute: max_requests_per_minute.max(1),
            timestamps: Vec::new(),
        }
    }

    /// Try to take a request slot at `now`.
    pub fn reserve_at(&mut self, now: Instant) -> Option<Duration> {
        self.timestamps
            .retain(|t| now.duration_since(*t) < WINDOW);

        if self.timestamps.len() >= self.max_requests_per_minute {
            let oldest = *self.timestamps.iter().min()?;
            let elapsed = now.duration_since(oldest);
            let wait = WINDOW.saturating_sub(elapsed) + BUFFER;
            tracing::info!(wait_secs = wait.as_secs_f64(), "rate limit reached, waiting");
            return Some(wait);
        }

        self.timestamps.push(now);
        None
    }

    pub fn reserve(&mut self) -> Option<Duration> {
        self.reserve_at(Instant::now())
    }

    /// Timestamps currently inside the trailing window.
    pub fn in_window(&self, now: Instant) -> usize {
        self.timestamps
            .iter()
            .filter(|t| now.duration_since(**t) < WINDOW)
            .count()
    }
}

/// Whether a 429 body is a quota complaint worth a long backoff.
pub fn is_quota_error(status: u16, body: &str) -> bool {
    status == 429 && body.to_ascii_lowercase().contains("quota")
}

/// Server-suggested retry delay out of a quota error body.
///
/// Prefers the structured `RetryInfo.retryDelay` token (`"12s"`), falling
/// back to a free-text `retry in Ns` match.
pub fn extract_retry_delay(body: &str) -> Option<Duration> {
    if body.trim_start().starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(details) = value
                .get("error")
                .and_then(|e| e.get("details"))
                .and_then(|d| d.as_array())
            {
                for detail in details {
                    let is_retry_info = detail
                        .get("@type")
                        .and_then(|t| t.as_str())
                        .map(|t| t.ends_with("RetryInfo"))
                        .unwrap_or(false);
                    if !is_retry_info {
                        continue;
                    }
                    if let Some(delay) = detail.get("retryDelay").and_then(|d| d.as_str()) {
                        if let Some(stripped) = delay.strip_suffix('s') {
                            if let Ok(secs) = stripped.parse::<f64>() {
                                return Some(Duration::from_secs_f64(secs));
                            }
                        }
                    }
                }
            }
        }
    }

    retry_in_re()
        .captures(body)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(Duration::from_secs_f64)
}

/// Quota backoff when the server suggests nothing: `min(60 * 2^attempt, 300)`.
pub fn quota_backoff(attempt: u32) -> Duration {
    Duration::from_secs((60u64 << attempt.min(6)).min(300))
}

/// Transport-error backoff: `min(2^attempt, 30)`.
pub fn transport_backoff(attempt: u32) -> Duration {
    Duration::from_secs((1u64 << attempt.min(6)).min(30))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Window accounting
    // ---------------------------------------------------------------

    #[test]
    fn slots_are_granted_up_to_the_limit() {
        let mut limiter = RateLimiter::new(3);
        let now = Instant::now();
        assert!(limiter.reserve_at(now).is_none());
        assert!(limiter.reserve_at(now).is_none());
        assert!(limiter.reserve_at(now).is_none());
        assert_eq!(limiter.in_window(now), 3);
    }

    #[test]
    fn full_window_returns_a_wait() {
        let mut limiter = RateLimiter::new(1);
        let now = Instant::now();
        assert!(limiter.reserve_at(now).is_none());
        let wait = limiter.reserve_at(now).expect("window is full");
        // whole window remains plus the buffer second
        assert!(wait > Duration::from_secs(59));
        assert!(wait <= Duration::from_secs(61));
    }

    #[test]
    fn old_timestamps_fall_out_of_the_window() {
        let mut limiter = RateLimiter::new(1);
        let start = Instant::now();
        assert!(limiter.reserve_at(start).is_none());
        let later = start + Duration::from_secs(61);
        assert!(limiter.reserve_at(later).is_none());
        assert_eq!(limiter.in_window(later), 1);
    }

    #[test]
    fn never_more_than_the_limit_inside_the_window() {
        let mut limiter = RateLimiter::new(5);
        let now = Instant::now();
        for i in 0..20 {
            let _ = limiter.reserve_at(now + Duration::from_millis(i * 100));
        }
        assert!(limiter.in_window(now + Duration::from_secs(2)) <= 5);
    }

    // ---------------------------------------------------------------
    // Quota handling
    // ---------------------------------------------------------------

    #[test]
    fn quota_detection_needs_status_and_keyword() {
        assert!(is_quota_error(429, "Quota exceeded for model"));
        assert!(!is_quota_error(429, "rate limited"));
        assert!(!is_quota_error(500, "quota"));
    }

    #[test]
    fn structured_retry_delay_is_parsed() {
        let body = r#"{"error":{"details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"12s"}]}}"#;
        assert_eq!(extract_retry_delay(body), Some(Duration::from_secs(12)));
    }

    #[test]
    fn free_text_retry_delay_is_parsed() {
        assert_eq!(
            extract_retry_delay("quota exceeded, please retry in 7s"),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            extract_retry_delay("Retry in 2.5s"),
            Some(Duration::from_secs_f64(2.5))
        );
    }

    #[test]
    fn absent_delay_yields_none() {
        assert_eq!(extract_retry_delay("try later"), None);
        assert_eq!(extract_retry_delay("{\"error\":{}}"), None);
    }

    #[test]
    fn quota_backoff_doubles_and_caps() {
        assert_eq!(quota_backoff(0), Duration::from_secs(60));
        assert_eq!(quota_backoff(1), Duration::from_secs(120));
        assert_eq!(quota_backoff(2), Duration::from_secs(240));
        assert_eq!(quota_backoff(3), Duration::from_secs(300));
        assert_eq!(quota_backoff(10), Duration::from_secs(300));
    }

    #[test]
    fn transport_backoff_doubles_and_caps() {
        assert_eq!(transport_backoff(0), Duration::from_secs(1));
        assert_eq!(transport_backoff(1), Duration::from_secs(2));
        assert_eq!(transport_backoff(4), Duration::from_secs(16));
        assert_eq!(transport_backoff(5), Duration::from_secs(30));
        assert_eq!(transport_backoff(20), Duration::from_secs(30));
    }
}
