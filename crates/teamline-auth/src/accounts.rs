//! Launchpad identity: which accounts can this user touch?
//!
//! The authorization listing is the only resource that lives on the launchpad
//! host rather than the account-scoped API. It backs account selection: a
//! candidate account id is persisted only after it shows up in this listing.

use serde::Deserialize;
use tracing::{debug, info};

use crate::constants::Endpoints;
use crate::error::{Error, Result};
use crate::session;
use crate::store::CredentialStore;

/// The authenticated identity and its reachable accounts.
#[derive(Debug, Deserialize)]
pub struct Authorization {
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
pub struct Identity {
    pub id: u64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// One tenant the identity can operate in.
#[derive(Debug, Deserialize)]
pub struct Account {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
}

/// Fetch the identity and account listing for the current session.
pub async fn list(
    store: &CredentialStore,
    client: &reqwest::Client,
    endpoints: &Endpoints,
) -> Result<Authorization> {
    let access_token = session::access_token(store, client, endpoints).await?;

    let response = client
        .get(&endpoints.authorization_url)
        .bearer_auth(&access_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("authorization listing failed: {e}")))?;

    let status = response.status();
    if status.as_u16() == 401 {
        return Err(Error::Unauthenticated(
            "authorization listing rejected the session".into(),
        ));
    }
    if !status.is_success() {
        return Err(Error::Http(format!(
            "authorization listing returned {status}"
        )));
    }

    let authorization = response
        .json::<Authorization>()
        .await
        .map_err(|e| Error::Json(format!("invalid authorization listing: {e}")))?;
    debug!(accounts = authorization.accounts.len(), "listed accounts");
    Ok(authorization)
}

/// Validate and persist an account selection.
///
/// The id must appear in the launchpad listing for the authenticated
/// identity; anything else fails with `AccountNotAccessible` and leaves the
/// stored selection untouched.
pub async fn select_account(
    store: &CredentialStore,
    client: &reqwest::Client,
    endpoints: &Endpoints,
    account_id: u64,
) -> Result<()> {
    let authorization = list(store, client, endpoints).await?;
    if !authorization.accounts.iter().any(|a| a.id == account_id) {
        return Err(Error::AccountNotAccessible(account_id));
    }
    store.set_account(account_id)?;
    info!(account_id, "account selected");
    Ok(())
}
