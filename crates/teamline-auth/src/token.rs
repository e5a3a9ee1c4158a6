//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (initial login)
//! 2. Token refresh (before-expiry refresh at operation start)
//!
//! Both operations POST form-encoded grants to the launchpad token endpoint.
//! The client secret comes from the composed `ClientRegistration` and is sent
//! only over the wire, never logged.

use serde::{Deserialize, Serialize};

use crate::constants::Endpoints;
use crate::error::{Error, Result};
use crate::store::ClientRegistration;

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. The caller
/// converts this to an absolute unix millisecond timestamp when storing
/// the bundle.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
}

/// Exchange an authorization code for tokens (initial login).
///
/// `redirect_uri` must match the URI the consent page redirected to,
/// including any dynamically-bound loopback port.
pub async fn exchange_code(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    registration: &ClientRegistration,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&endpoints.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &registration.client_id),
            ("client_secret", registration.secret.expose()),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Flow(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::Flow(format!("invalid token response: {e}")))
}

/// Refresh an access token using a refresh token.
///
/// A 401/403 means the refresh token is revoked or invalid; the session is
/// gone and the caller must fall back to a fresh login.
pub async fn refresh_token(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    registration: &ClientRegistration,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&endpoints.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", &registration.client_id),
            ("client_secret", registration.secret.expose()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::Unauthenticated(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::Flow(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::Flow(format!("invalid refresh response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Secret;

    fn test_registration() -> ClientRegistration {
        ClientRegistration {
            client_id: "client-abc".into(),
            redirect_uri: "http://127.0.0.1:8917/oauth/callback".into(),
            secret: Secret::new("shh-secret".into()),
        }
    }

    fn endpoints_for(base: &str) -> Endpoints {
        Endpoints {
            token_url: format!("{base}/authorization/token"),
            ..Endpoints::default()
        }
    }

    /// Token endpoint stub that echoes received form fields into the
    /// access token so assertions can inspect what was sent.
    async fn spawn_token_server(status: axum::http::StatusCode) -> String {
        use axum::Form;
        use std::collections::HashMap;

        let app = axum::Router::new().route(
            "/authorization/token",
            axum::routing::post(move |Form(form): Form<HashMap<String, String>>| async move {
                let grant = form.get("grant_type").cloned().unwrap_or_default();
                let body = serde_json::json!({
                    "access_token": format!("at_{grant}_{}", form.get("client_secret").cloned().unwrap_or_default()),
                    "refresh_token": "rt_new",
                    "expires_in": 3600,
                });
                (status, axum::Json(body))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn token_response_deserializes() {
        let json = r#"{"access_token":"at_abc","refresh_token":"rt_def","expires_in":3600}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "at_abc");
        assert_eq!(token.refresh_token, "rt_def");
        assert_eq!(token.expires_in, 3600);
    }

    #[test]
    fn token_response_tolerates_unknown_fields() {
        let json = r#"{"access_token":"at","refresh_token":"rt","expires_in":60,"scope":"all","token_type":"bearer"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.expires_in, 60);
    }

    #[tokio::test]
    async fn exchange_sends_authorization_code_grant_with_secret() {
        let base = spawn_token_server(axum::http::StatusCode::OK).await;
        let client = reqwest::Client::new();

        let token = exchange_code(
            &client,
            &endpoints_for(&base),
            &test_registration(),
            "the-code",
            "http://127.0.0.1:8917/oauth/callback",
        )
        .await
        .unwrap();

        // The stub folds grant type and secret into the returned token
        assert_eq!(token.access_token, "at_authorization_code_shh-secret");
        assert_eq!(token.refresh_token, "rt_new");
        assert_eq!(token.expires_in, 3600);
    }

    #[tokio::test]
    async fn refresh_sends_refresh_token_grant() {
        let base = spawn_token_server(axum::http::StatusCode::OK).await;
        let client = reqwest::Client::new();

        let token = refresh_token(
            &client,
            &endpoints_for(&base),
            &test_registration(),
            "rt_old",
        )
        .await
        .unwrap();

        assert_eq!(token.access_token, "at_refresh_token_shh-secret");
    }

    #[tokio::test]
    async fn exchange_failure_is_flow_error() {
        let base = spawn_token_server(axum::http::StatusCode::BAD_REQUEST).await;
        let client = reqwest::Client::new();

        let result = exchange_code(
            &client,
            &endpoints_for(&base),
            &test_registration(),
            "bad-code",
            "http://127.0.0.1:8917/oauth/callback",
        )
        .await;
        assert!(matches!(result, Err(Error::Flow(_))));
    }

    #[tokio::test]
    async fn rejected_refresh_token_signals_relogin() {
        let base = spawn_token_server(axum::http::StatusCode::UNAUTHORIZED).await;
        let client = reqwest::Client::new();

        let result = refresh_token(
            &client,
            &endpoints_for(&base),
            &test_registration(),
            "rt_revoked",
        )
        .await;
        assert!(matches!(result, Err(Error::Unauthenticated(_))));
    }
}
