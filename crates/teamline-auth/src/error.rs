//! Error types for credential storage and OAuth operations

/// Errors from credential storage and OAuth operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The client secret environment variable is not set.
    #[error("client secret not available: {0}")]
    MissingSecret(String),

    /// No client id / redirect URI has been configured yet.
    #[error("client registration not configured: {0}")]
    NotConfigured(String),

    /// Stored credential material is not in the expected encrypted form.
    /// Callers treat this as "no valid session", never as a crash.
    #[error("corrupt credential: {0}")]
    CorruptCredential(String),

    /// Encryption failure while writing credential material.
    #[error("credential encryption failed: {0}")]
    Crypto(String),

    /// Authorization flow failure: cancelled or timed-out consent,
    /// failed code exchange, failed refresh.
    #[error("authorization flow failed: {0}")]
    Flow(String),

    /// No usable session; the caller should prompt for a fresh login.
    #[error("not authenticated: {0}")]
    Unauthenticated(String),

    /// The selected account is not accessible to the authenticated identity.
    #[error("account {0} is not accessible to the authenticated user")]
    AccountNotAccessible(u64),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
