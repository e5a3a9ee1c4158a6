//! The resilient request client
//!
//! One `ApiClient` per top-level operation, bound to a resolved account id
//! and bearer token at construction. Every request gets the client
//! identification header, a correlation id, and the bounded-retry treatment
//! described in `request::RetryPolicy`. Exhausted or terminal failures
//! surface as the typed errors in `error::Error`.

use reqwest::Response;
use tracing::{debug, warn};
use uuid::Uuid;

use teamline_auth::{CredentialStore, Endpoints, session};

use crate::error::{Error, Result};
use crate::request::{RequestDescriptor, RetryPolicy, parse_retry_after};

/// Client identification header sent with every request.
pub const USER_AGENT: &str = "teamline-client/0.1.0 (+https://github.com/teamline/teamline-cli)";

/// Error bodies are truncated before they land in an error value.
const MAX_ERROR_BODY: usize = 512;

/// An authenticated client scoped to one account.
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    account_id: u64,
    access_token: String,
    policy: RetryPolicy,
}

impl ApiClient {
    /// Resolve the account selection and a fresh access token, then build a
    /// client bound to both.
    ///
    /// Fails with `NoAccountSelected` before any network call when no
    /// account is selected. Token refresh (when needed) happens here, once,
    /// so resource operations never re-enter the OAuth path.
    pub async fn bind(
        store: &CredentialStore,
        http: reqwest::Client,
        endpoints: Endpoints,
    ) -> Result<Self> {
        let account_id = store
            .account()
            .map_err(Error::Auth)?
            .ok_or(Error::NoAccountSelected)?;

        let access_token = session::access_token(store, &http, &endpoints)
            .await
            .map_err(|e| match e {
                teamline_auth::Error::Unauthenticated(msg) => Error::Authentication(msg),
                other => Error::Auth(other),
            })?;

        debug!(account_id, "client bound");
        Ok(Self {
            http,
            endpoints,
            account_id,
            access_token,
            policy: RetryPolicy::default(),
        })
    }

    /// Override the retry policy (tests compress the backoff ladder).
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The account id this client is bound to.
    pub fn account_id(&self) -> u64 {
        self.account_id
    }

    fn url_for(&self, descriptor: &RequestDescriptor) -> String {
        if descriptor.is_absolute() {
            descriptor.path.clone()
        } else {
            format!(
                "{}/{}{}",
                self.endpoints.api_url.trim_end_matches('/'),
                self.account_id,
                descriptor.path
            )
        }
    }

    /// Execute a descriptor with bounded retry, returning the successful
    /// response.
    ///
    /// Retryable statuses (429, 500, 502, 503, 504) are retried up to three
    /// times; a 429's `Retry-After` is honored exactly, otherwise delays are
    /// exponential. Everything else is classified and returned immediately.
    pub(crate) async fn execute(&self, descriptor: &RequestDescriptor) -> Result<Response> {
        let request_id = format!("req_{}", Uuid::new_v4().as_simple());
        let url = self.url_for(descriptor);
        let mut attempt: u32 = 0; // retries used so far

        loop {
            let mut request = self
                .http
                .request(descriptor.method.clone(), &url)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .bearer_auth(&self.access_token);
            if !descriptor.query.is_empty() {
                request = request.query(&descriptor.query);
            }
            if let Some(body) = &descriptor.body {
                request = request.json(body);
            }

            debug!(%request_id, method = %descriptor.method, %url, attempt, "sending request");
            let response = request
                .send()
                .await
                .map_err(|e| Error::Http(format!("{request_id}: {e}")))?;

            let status = response.status().as_u16();
            if response.status().is_success() {
                return Ok(response);
            }

            match status {
                401 => {
                    return Err(Error::Authentication(format!(
                        "{request_id}: API rejected the bearer token"
                    )));
                }
                404 => {
                    return Err(Error::NotFound(format!(
                        "{} {}",
                        descriptor.method, descriptor.path
                    )));
                }
                s if RetryPolicy::is_retryable(s) && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let retry_after = if s == 429 {
                        parse_retry_after(response.headers())
                    } else {
                        None
                    };
                    let delay = self.policy.delay_for(attempt, retry_after);
                    if s == 429 {
                        warn!(
                            %request_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "rate limited, retrying"
                        );
                    } else {
                        warn!(
                            %request_id,
                            attempt,
                            status = s,
                            delay_ms = delay.as_millis() as u64,
                            "transient server error, retrying"
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
                429 => {
                    return Err(Error::RateLimitExceeded {
                        attempts: attempt + 1,
                    });
                }
                s if RetryPolicy::is_retryable(s) => {
                    return Err(Error::Server {
                        status: s,
                        attempts: attempt + 1,
                    });
                }
                s => {
                    let body = response.text().await.unwrap_or_default();
                    let body = if body.len() > MAX_ERROR_BODY {
                        format!("{}... [truncated]", &body[..MAX_ERROR_BODY])
                    } else {
                        body
                    };
                    return Err(Error::Request { status: s, body });
                }
            }
        }
    }

    /// Execute and deserialize a JSON response body.
    pub(crate) async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<T> {
        let response = self.execute(descriptor).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Json(e.to_string()))
    }

    /// Execute and discard the response body (DELETE / completion POSTs).
    pub(crate) async fn fetch_unit(&self, descriptor: &RequestDescriptor) -> Result<()> {
        self.execute(descriptor).await?;
        Ok(())
    }

    /// A client bound to account 42 against a local mock server, with a
    /// compressed backoff ladder.
    #[cfg(test)]
    pub(crate) fn for_tests(base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints: Endpoints {
                api_url: base.to_string(),
                ..Endpoints::default()
            },
            account_id: 42,
            access_token: "at_test".into(),
            policy: RetryPolicy {
                max_retries: 3,
                base_delay: std::time::Duration::from_millis(10),
            },
        }
    }
}
