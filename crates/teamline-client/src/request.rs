//! Request descriptors and the retry policy
//!
//! The policy is fixed by contract with the Teamline API: 429 and the
//! transient 5xx family (500, 502, 503, 504) are retryable, everything else
//! is terminal on first sight. A throttled response's `Retry-After` header is
//! honored exactly; otherwise delays double per attempt.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Method;
use reqwest::header::HeaderMap;

/// One resource request: method, account-relative path (or absolute URL for
/// pagination continuations), query, optional JSON body.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn get(path: &str) -> Self {
        Self {
            method: Method::GET,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: &str, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.to_string(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// POST with no body (completion-style endpoints).
    pub fn post_empty(path: &str) -> Self {
        Self {
            method: Method::POST,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn put(path: &str, body: serde_json::Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.to_string(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn delete(path: &str) -> Self {
        Self {
            method: Method::DELETE,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: &[(&str, &str)]) -> Self {
        self.query = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    /// Whether the path is already a fully-qualified URL (a pagination
    /// continuation) rather than an account-relative path.
    pub fn is_absolute(&self) -> bool {
        self.path.starts_with("http://") || self.path.starts_with("https://")
    }
}

/// Bounded-retry configuration.
///
/// `base_delay` exists so tests can compress the backoff ladder; production
/// uses the default 1 second, giving 1s / 2s / 4s across the three retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (4 attempts total by default).
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Statuses eligible for retry. Any other 4xx/5xx is terminal.
    pub fn is_retryable(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// A server-provided `Retry-After` wins outright; otherwise exponential
    /// backoff `2^(attempt-1) * base_delay`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(delay) = retry_after {
            return delay;
        }
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Parse a `Retry-After` header into a wait duration.
///
/// Accepts integer seconds or an HTTP-date; a date already in the past
/// clamps to zero. Anything else is treated as absent.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after_value(value, Utc::now())
}

fn parse_retry_after_value(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value.trim()) {
        let remaining_millis = (date.with_timezone(&Utc) - now).num_milliseconds().max(0);
        return Some(Duration::from_millis(remaining_millis as u64));
    }
    None
}
