//! Pagination: drain a `Link: rel="next"` chain into one ordered list
//!
//! The API expresses continuation as an absolute next-page URL in the `Link`
//! response header. Pages are fetched strictly forward, one at a time, items
//! appended in server order. Termination is whatever the server declares
//! (the chain ends when no `rel="next"` appears), bounded by a safety cap so
//! a misbehaving server cannot loop the client forever.

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::request::RequestDescriptor;

/// Upper bound on pages per collection. A chain longer than this is treated
/// as a server fault rather than drained indefinitely.
const MAX_PAGES: u32 = 10_000;

/// Extract the `rel="next"` target from a `Link` header, if any.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    parse_next_link(value)
}

/// Parse a `Link` header value: `<url>; rel="next", <url>; rel="prev", ...`
fn parse_next_link(value: &str) -> Option<String> {
    for part in value.split(',') {
        let mut sections = part.split(';');
        let Some(target) = sections.next().map(str::trim) else {
            continue;
        };
        if !(target.starts_with('<') && target.ends_with('>')) {
            continue;
        }
        let is_next = sections.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if is_next {
            return Some(target[1..target.len() - 1].to_string());
        }
    }
    None
}

/// GET every page of a collection and return the concatenated items.
///
/// An empty collection yields `[]` after one request; a single page costs
/// exactly one request. No reordering, no deduplication.
pub(crate) async fn fetch_all<T: DeserializeOwned>(
    client: &ApiClient,
    path: &str,
    query: &[(&str, &str)],
) -> Result<Vec<T>> {
    fetch_capped(client, path, query, MAX_PAGES).await
}

async fn fetch_capped<T: DeserializeOwned>(
    client: &ApiClient,
    path: &str,
    query: &[(&str, &str)],
    max_pages: u32,
) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut descriptor = RequestDescriptor::get(path).with_query(query);

    for page in 1..=max_pages {
        let response = client.execute(&descriptor).await?;
        let next = next_link(response.headers());
        let page_items: Vec<T> = response
            .json()
            .await
            .map_err(|e| Error::Json(e.to_string()))?;
        items.extend(page_items);

        match next {
            // The continuation URL is absolute and already carries its own query
            Some(url) => descriptor = RequestDescriptor::get(&url),
            None => {
                debug!(pages = page, items = items.len(), "collection drained");
                return Ok(items);
            }
        }
    }

    Err(Error::TooManyPages(max_pages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn parses_next_target_from_link_header() {
        let value = r#"<https://api.teamline.app/42/projects.json?page=2>; rel="next""#;
        assert_eq!(
            parse_next_link(value).as_deref(),
            Some("https://api.teamline.app/42/projects.json?page=2")
        );
    }

    #[test]
    fn picks_next_out_of_multiple_relations() {
        let value = concat!(
            r#"<https://api.teamline.app/42/p.json?page=1>; rel="first", "#,
            r#"<https://api.teamline.app/42/p.json?page=3>; rel="next", "#,
            r#"<https://api.teamline.app/42/p.json?page=1>; rel="prev""#,
        );
        assert_eq!(
            parse_next_link(value).as_deref(),
            Some("https://api.teamline.app/42/p.json?page=3")
        );
    }

    #[test]
    fn unquoted_rel_is_accepted() {
        let value = "<https://api.teamline.app/42/p.json?page=2>; rel=next";
        assert!(parse_next_link(value).is_some());
    }

    #[test]
    fn absent_or_foreign_relations_yield_none() {
        assert_eq!(parse_next_link(""), None);
        assert_eq!(
            parse_next_link(r#"<https://api.teamline.app/42/p.json?page=1>; rel="prev""#),
            None
        );
        assert_eq!(parse_next_link("not a link header"), None);
    }

    /// Mock collection: `pages` item-arrays served in order, each non-final
    /// response linking to the next via the `Link` header.
    async fn serve_pages(
        pages: Vec<Vec<serde_json::Value>>,
        hits: Arc<AtomicU32>,
    ) -> String {
        use axum::extract::{Query, State};
        use std::collections::HashMap;

        #[derive(Clone)]
        struct PageState {
            pages: Arc<Vec<Vec<serde_json::Value>>>,
            hits: Arc<AtomicU32>,
            base: Arc<std::sync::OnceLock<String>>,
        }

        async fn handler(
            State(state): State<PageState>,
            Query(params): Query<HashMap<String, String>>,
        ) -> axum::response::Response {
            use axum::response::IntoResponse;

            state.hits.fetch_add(1, Ordering::SeqCst);
            let page: usize = params
                .get("page")
                .and_then(|p| p.parse().ok())
                .unwrap_or(1);
            let body = axum::Json(state.pages[page - 1].clone());

            if page < state.pages.len() {
                let base = state.base.get().cloned().unwrap_or_default();
                let link = format!(
                    "<{base}/42/items.json?page={}>; rel=\"next\"",
                    page + 1
                );
                ([("link", link)], body).into_response()
            } else {
                body.into_response()
            }
        }

        let base_cell = Arc::new(std::sync::OnceLock::new());
        let state = PageState {
            pages: Arc::new(pages),
            hits,
            base: base_cell.clone(),
        };
        let app = axum::Router::new()
            .route("/42/items.json", axum::routing::get(handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let base = format!("http://{addr}");
        base_cell.set(base.clone()).unwrap();
        base
    }

    fn test_client(base: &str) -> ApiClient {
        ApiClient::for_tests(base)
    }

    fn item(id: u64) -> serde_json::Value {
        serde_json::json!({"id": id})
    }

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Item {
        id: u64,
    }

    #[tokio::test]
    async fn three_linked_pages_drain_in_order() {
        let hits = Arc::new(AtomicU32::new(0));
        let base = serve_pages(
            vec![
                vec![item(1), item(2)],
                vec![item(3), item(4)],
                vec![item(5)],
            ],
            hits.clone(),
        )
        .await;

        let items: Vec<Item> = fetch_all(&test_client(&base), "/items.json", &[])
            .await
            .unwrap();
        assert_eq!(
            items.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5],
            "items must preserve server order"
        );
        assert_eq!(hits.load(Ordering::SeqCst), 3, "exactly one request per page");
    }

    #[tokio::test]
    async fn single_page_costs_one_request() {
        let hits = Arc::new(AtomicU32::new(0));
        let base = serve_pages(vec![vec![item(1)]], hits.clone()).await;

        let items: Vec<Item> = fetch_all(&test_client(&base), "/items.json", &[])
            .await
            .unwrap();
        assert_eq!(items, vec![Item { id: 1 }]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_collection_yields_empty_vec_after_one_request() {
        let hits = Arc::new(AtomicU32::new(0));
        let base = serve_pages(vec![vec![]], hits.clone()).await;

        let items: Vec<Item> = fetch_all(&test_client(&base), "/items.json", &[])
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cyclic_next_links_hit_the_safety_cap() {
        // Every response links back to itself
        let app = axum::Router::new().route(
            "/42/loop.json",
            axum::routing::get(|headers: axum::http::HeaderMap| async move {
                // Reconstruct our own URL from the Host header
                let host = headers
                    .get("host")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("127.0.0.1")
                    .to_string();
                let link = format!("<http://{host}/42/loop.json>; rel=\"next\"");
                (
                    [("link", link)],
                    axum::Json(serde_json::json!([])),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let result: Result<Vec<Item>> = fetch_capped(
            &test_client(&format!("http://{addr}")),
            "/loop.json",
            &[],
            5,
        )
        .await;
        assert!(matches!(result, Err(Error::TooManyPages(5))));
    }
}
