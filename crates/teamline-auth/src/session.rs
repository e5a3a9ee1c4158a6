//! Session maintenance: refresh-before-expiry
//!
//! Every top-level operation calls `access_token` once near its start. A token
//! with less than `REFRESH_MARGIN_MILLIS` of life left is refreshed eagerly so
//! it cannot expire mid-request. Concurrent refreshes within one process are
//! not deduplicated; each invocation is a short-lived process calling this
//! once per operation.

use tracing::{debug, warn};

use crate::constants::{Endpoints, REFRESH_MARGIN_MILLIS};
use crate::error::{Error, Result};
use crate::store::{CredentialStore, TokenBundle};
use crate::token;

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Whether the bundle is expired or inside the refresh margin at `now`.
pub fn is_expiring(bundle: &TokenBundle, now: u64) -> bool {
    bundle.expires_at <= now + REFRESH_MARGIN_MILLIS
}

/// Return a valid access token, refreshing first when the stored one is
/// expired or about to expire.
///
/// Fails with `Unauthenticated` when there is no stored session or the
/// refresh fails; the caller should prompt for a fresh login. A refresh token
/// the endpoint rejects outright also clears the stored bundle.
pub async fn access_token(
    store: &CredentialStore,
    client: &reqwest::Client,
    endpoints: &Endpoints,
) -> Result<String> {
    let Some(bundle) = store.get_tokens()? else {
        return Err(Error::Unauthenticated(
            "no stored session; log in first".into(),
        ));
    };

    let now = now_millis();
    if !is_expiring(&bundle, now) {
        return Ok(bundle.access_token);
    }

    debug!(
        expires_at = bundle.expires_at,
        "access token expiring, refreshing"
    );
    let registration = store.client_registration()?;

    match token::refresh_token(client, endpoints, &registration, &bundle.refresh_token).await {
        Ok(response) => {
            let refreshed = TokenBundle::from_response(&response, now_millis());
            store.set_tokens(&refreshed)?;
            debug!(expires_at = refreshed.expires_at, "token refresh succeeded");
            Ok(refreshed.access_token)
        }
        Err(Error::Unauthenticated(msg)) => {
            warn!(error = %msg, "refresh token rejected, clearing session");
            store.clear_tokens()?;
            Err(Error::Unauthenticated(msg))
        }
        Err(e) => {
            warn!(error = %e, "token refresh failed");
            Err(Error::Unauthenticated(format!("token refresh failed: {e}")))
        }
    }
}

/// Destroy the stored session (logout).
pub fn logout(store: &CredentialStore) -> Result<()> {
    store.clear_tokens()
}
