//! Teamline OAuth and API endpoint configuration
//!
//! The default endpoints point at the hosted Teamline service. The launchpad
//! host handles authorization and identity; the api host serves account-scoped
//! resources. `Endpoints` exists so tests (and self-hosted installations) can
//! point every component at a different base URL.

/// Authorization endpoint (browser consent page)
pub const AUTHORIZE_ENDPOINT: &str = "https://launchpad.teamline.app/authorization/new";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://launchpad.teamline.app/authorization/token";

/// Identity endpoint listing the accounts the authenticated user can access
pub const AUTHORIZATION_ENDPOINT: &str = "https://launchpad.teamline.app/authorization.json";

/// Base URL for account-scoped resource paths (`{api}/{account_id}/...`)
pub const API_ENDPOINT: &str = "https://api.teamline.app";

/// Environment variable supplying the OAuth client secret at runtime.
/// The secret is never persisted to disk.
pub const CLIENT_SECRET_ENV: &str = "TEAMLINE_CLIENT_SECRET";

/// A token with less than this much lifetime left is treated as expired,
/// absorbing clock skew and in-flight request latency.
pub const REFRESH_MARGIN_MILLIS: u64 = 60_000;

/// Resolved endpoint set used by every OAuth and resource operation.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub authorization_url: String,
    pub api_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_ENDPOINT.into(),
            token_url: TOKEN_ENDPOINT.into(),
            authorization_url: AUTHORIZATION_ENDPOINT.into(),
            api_url: API_ENDPOINT.into(),
        }
    }
}
