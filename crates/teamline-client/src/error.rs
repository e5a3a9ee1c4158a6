//! Error taxonomy for resource operations
//!
//! The client never formats output; it classifies and returns. Every variant
//! carries enough structure for a caller to both display a message and branch
//! programmatically (e.g. prompting re-login on `Authentication`).

/// Errors from resource operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No account is selected; every resource operation is blocked until
    /// one is. Raised before any network call.
    #[error("no account selected; pick an account before running resource operations")]
    NoAccountSelected,

    /// The API rejected the bearer token (401). Never retried; the caller
    /// should prompt for a fresh login.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The resource does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limited (429) and still throttled after all retries.
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// Transient server error (5xx) that survived all retries.
    #[error("server error {status} after {attempts} attempts")]
    Server { status: u16, attempts: u32 },

    /// Any other non-2xx response. Terminal on first occurrence.
    #[error("request failed with status {status}: {body}")]
    Request { status: u16, body: String },

    /// A pagination chain exceeded the safety cap; the server is most
    /// likely returning a cyclic or unending next-link.
    #[error("pagination exceeded {0} pages")]
    TooManyPages(u32),

    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// The response body did not match the expected resource shape.
    #[error("invalid response body: {0}")]
    Json(String),

    /// Credential, configuration, or OAuth failure from the auth layer.
    #[error(transparent)]
    Auth(#[from] teamline_auth::Error),
}

/// Result alias for resource operations.
pub type Result<T> = std::result::Result<T, Error>;
