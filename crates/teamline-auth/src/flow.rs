//! Browser-based authorization flow
//!
//! Runs the three-legged consent dance: bind a loopback listener on the
//! registered redirect URI, hand the caller an authorization URL to open,
//! then suspend until the provider redirects back with an authorization code.
//! This wait is the single external-suspension point in the system, so it is
//! bounded by a timeout and the listener is torn down on every exit path
//! (success, denial, timeout, drop).
//!
//! A random `state` token rides along for CSRF protection; callbacks with a
//! mismatched state are rejected.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::Endpoints;
use crate::error::{Error, Result};
use crate::session::now_millis;
use crate::store::{ClientRegistration, CredentialStore, TokenBundle};
use crate::token;

/// Generate a random CSRF state token (URL-safe base64, no padding).
fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace('%', "%25")
        .replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('&', "%26")
}

/// Query parameters the provider sends to the redirect URI.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

struct CallbackState {
    expected_state: String,
    tx: Mutex<Option<oneshot::Sender<Result<String>>>>,
}

/// An in-progress authorization: listener bound, URL built, waiting for
/// the redirect.
pub struct AuthorizationFlow {
    authorize_url: String,
    redirect_uri: String,
    rx: oneshot::Receiver<Result<String>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<tokio::task::JoinHandle<()>>,
}

impl AuthorizationFlow {
    /// Bind the loopback listener and build the authorization URL.
    ///
    /// The listener binds to the host:port of the registered redirect URI.
    /// Port 0 is supported: the actually-bound port is reflected into both
    /// the effective redirect URI and the authorization URL, loopback-style
    /// per RFC 8252.
    pub async fn begin(registration: &ClientRegistration, endpoints: &Endpoints) -> Result<Self> {
        let mut redirect = Url::parse(&registration.redirect_uri)
            .map_err(|e| Error::Flow(format!("invalid redirect URI: {e}")))?;
        let host = redirect
            .host_str()
            .ok_or_else(|| Error::Flow("redirect URI has no host".into()))?
            .to_string();
        let port = redirect
            .port()
            .ok_or_else(|| Error::Flow("redirect URI has no explicit port".into()))?;

        let listener = tokio::net::TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|e| Error::Io(format!("binding callback listener on {host}:{port}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Io(format!("reading callback listener address: {e}")))?;

        if port == 0 {
            redirect
                .set_port(Some(local_addr.port()))
                .map_err(|_| Error::Flow("redirect URI does not accept a port".into()))?;
        }
        let redirect_uri = redirect.to_string();

        let state_token = generate_state();
        let authorize_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&state={}",
            endpoints.authorize_url,
            registration.client_id,
            urlencoded(&redirect_uri),
            state_token,
        );

        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let callback_state = Arc::new(CallbackState {
            expected_state: state_token,
            tx: Mutex::new(Some(tx)),
        });

        let path = match redirect.path() {
            "" => "/",
            p => p,
        };
        let app = axum::Router::new()
            .route(path, axum::routing::get(callback_handler))
            .with_state(callback_state);

        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "callback listener error");
            }
        });

        debug!(addr = %local_addr, "callback listener bound");
        Ok(Self {
            authorize_url,
            redirect_uri,
            rx,
            shutdown_tx: Some(shutdown_tx),
            server: Some(server),
        })
    }

    /// The URL the user must open to grant consent.
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    /// The effective redirect URI, with any dynamically-bound port filled in.
    /// This exact value must be passed to the code exchange.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Suspend until the provider redirects back with a code, the user
    /// denies consent, or the timeout elapses. The listener is torn down
    /// before this returns, on every path.
    pub async fn wait(mut self, timeout: Duration) -> Result<String> {
        let outcome = tokio::select! {
            received = &mut self.rx => match received {
                Ok(result) => result,
                Err(_) => Err(Error::Flow("callback listener closed unexpectedly".into())),
            },
            _ = tokio::time::sleep(timeout) => Err(Error::Flow(format!(
                "authorization timed out after {}s",
                timeout.as_secs()
            ))),
        };
        self.teardown().await;
        outcome
    }

    async fn teardown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            let abort = server.abort_handle();
            if tokio::time::timeout(Duration::from_secs(1), server)
                .await
                .is_err()
            {
                abort.abort();
            }
        }
    }
}

impl Drop for AuthorizationFlow {
    fn drop(&mut self) {
        // Covers callers that abandon the flow without calling wait()
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

async fn callback_handler(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let Ok(mut guard) = state.tx.lock() else {
        return Html("<html><body>Authorization already completed.</body></html>");
    };
    let Some(tx) = guard.take() else {
        return Html("<html><body>Authorization already completed.</body></html>");
    };

    let outcome = if let Some(error) = params.error {
        Err(Error::Flow(format!("authorization denied: {error}")))
    } else if params.state.as_deref() != Some(state.expected_state.as_str()) {
        Err(Error::Flow("state mismatch in authorization callback".into()))
    } else if let Some(code) = params.code {
        Ok(code)
    } else {
        Err(Error::Flow("callback carried no authorization code".into()))
    };

    let ok = outcome.is_ok();
    let _ = tx.send(outcome);

    if ok {
        Html("<html><body>Authorized. You can close this tab and return to the terminal.</body></html>")
    } else {
        Html("<html><body>Authorization failed. You can close this tab.</body></html>")
    }
}

/// Complete a login: exchange the authorization code and store the bundle
/// with `expires_at = now + expires_in`.
pub async fn complete_login(
    store: &CredentialStore,
    client: &reqwest::Client,
    endpoints: &Endpoints,
    registration: &ClientRegistration,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenBundle> {
    let response = token::exchange_code(client, endpoints, registration, code, redirect_uri).await?;
    let bundle = TokenBundle::from_response(&response, now_millis());
    store.set_tokens(&bundle)?;
    info!(expires_at = bundle.expires_at, "login complete, session stored");
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Secret;

    fn test_registration(redirect_uri: &str) -> ClientRegistration {
        ClientRegistration {
            client_id: "client-abc".into(),
            redirect_uri: redirect_uri.into(),
            secret: Secret::new("shh".into()),
        }
    }

    fn callback_query(url: &str) -> String {
        // Pull the state parameter back out of the authorization URL
        let parsed = Url::parse(url).unwrap();
        let state = parsed
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.to_string())
            .unwrap();
        format!("code=test-auth-code&state={state}")
    }

    #[tokio::test]
    async fn flow_delivers_code_from_redirect() {
        let registration = test_registration("http://127.0.0.1:0/oauth/callback");
        let flow = AuthorizationFlow::begin(&registration, &Endpoints::default())
            .await
            .unwrap();

        assert!(flow.authorize_url().contains("client_id=client-abc"));
        assert!(flow.authorize_url().contains("response_type=code"));
        // Port 0 was replaced by the bound port
        assert!(!flow.redirect_uri().contains(":0/"));

        // Simulate the provider redirecting the browser back
        let callback = format!("{}?{}", flow.redirect_uri(), callback_query(flow.authorize_url()));
        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });

        let code = flow.wait(Duration::from_secs(5)).await.unwrap();
        assert_eq!(code, "test-auth-code");
    }

    #[tokio::test]
    async fn flow_times_out_and_frees_the_port() {
        let registration = test_registration("http://127.0.0.1:0/oauth/callback");
        let flow = AuthorizationFlow::begin(&registration, &Endpoints::default())
            .await
            .unwrap();
        let redirect = Url::parse(flow.redirect_uri()).unwrap();
        let port = redirect.port().unwrap();

        let result = flow.wait(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(Error::Flow(_))));

        // Teardown released the listener; the port can be re-bound
        let rebound = tokio::net::TcpListener::bind(("127.0.0.1", port)).await;
        assert!(rebound.is_ok(), "callback port still held after timeout");
    }

    #[tokio::test]
    async fn flow_rejects_state_mismatch() {
        let registration = test_registration("http://127.0.0.1:0/oauth/callback");
        let flow = AuthorizationFlow::begin(&registration, &Endpoints::default())
            .await
            .unwrap();

        let callback = format!("{}?code=stolen&state=forged", flow.redirect_uri());
        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });

        let result = flow.wait(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Flow(msg)) if msg.contains("state mismatch")));
    }

    #[tokio::test]
    async fn flow_reports_denied_consent() {
        let registration = test_registration("http://127.0.0.1:0/oauth/callback");
        let flow = AuthorizationFlow::begin(&registration, &Endpoints::default())
            .await
            .unwrap();

        let callback = format!("{}?error=access_denied", flow.redirect_uri());
        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });

        let result = flow.wait(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Flow(msg)) if msg.contains("denied")));
    }

    #[tokio::test]
    async fn dropped_flow_frees_the_port() {
        let registration = test_registration("http://127.0.0.1:0/oauth/callback");
        let flow = AuthorizationFlow::begin(&registration, &Endpoints::default())
            .await
            .unwrap();
        let port = Url::parse(flow.redirect_uri()).unwrap().port().unwrap();

        drop(flow);
        // Give the aborted server task a moment to release the socket
        tokio::time::sleep(Duration::from_millis(50)).await;
        let rebound = tokio::net::TcpListener::bind(("127.0.0.1", port)).await;
        assert!(rebound.is_ok(), "callback port still held after drop");
    }

    #[test]
    fn state_tokens_are_unique() {
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn urlencoded_escapes_uri_characters() {
        assert_eq!(
            urlencoded("http://127.0.0.1:8917/cb"),
            "http%3A%2F%2F127.0.0.1%3A8917%2Fcb"
        );
    }
}
