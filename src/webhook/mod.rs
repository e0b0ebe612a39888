//! Dialogflow fulfillment webhook.
//!
//! [`WebhookRouter`] mounts hooks on POST routes. Every body is shape-checked
//! as a [`WebhookRequest`] before a hook sees it; bodies that fail get a 400
//! and hook failures a 500.

pub mod chatbot;
pub mod dialogflow;
pub mod npm_search;
#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

pub use chatbot::NpmChatbotHook;
pub use dialogflow::{RequestShapeError, WebhookRequest, WebhookResponse, UNRECOGNIZED_REQUEST};
pub use npm_search::{NpmSearchClient, PackageSearch, SearchParams, SearchResult};

/// Route answering package lookups.
pub const FIND_PACKAGE_ROUTE: &str = "/find-package";

const INTERNAL_ERROR: &str = "Webhook failed to fulfill the request.";

/// Fulfillment logic for one route.
#[async_trait]
pub trait WebhookHook: Send + Sync {
    /// Produces the reply for a validated request.
    async fn handle(&self, request: WebhookRequest) -> anyhow::Result<WebhookResponse>;
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Router builder that validates bodies before dispatching to hooks.
pub struct WebhookRouter {
    router: Router,
}

impl WebhookRouter {
    /// Router with only the health check.
    pub fn new() -> Self {
        Self {
            router: Router::new().route("/healthz", get(healthz)),
        }
    }

    /// Mounts `hook` as a POST handler on `path`.
    pub fn use_hook(mut self, path: &str, hook: Arc<dyn WebhookHook>) -> Self {
        self.router = self.router.route(
            path,
            post(move |body: Bytes| dispatch(Arc::clone(&hook), body)),
        );
        self
    }

    /// Finished axum router.
    pub fn into_router(self) -> Router {
        self.router
    }
}

impl Default for WebhookRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Router serving the npm chatbot hook on [`FIND_PACKAGE_ROUTE`].
pub fn router<S>(search: S) -> Router
where
    S: PackageSearch + 'static,
{
    WebhookRouter::new()
        .use_hook(FIND_PACKAGE_ROUTE, Arc::new(NpmChatbotHook::new(search)))
        .into_router()
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn dispatch(
    hook: Arc<dyn WebhookHook>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, (StatusCode, Json<ErrorBody>)> {
    let request = WebhookRequest::from_slice(&body).map_err(bad_request)?;
    let response = hook.handle(request).await.map_err(internal_error)?;
    Ok(Json(response))
}

fn bad_request(err: RequestShapeError) -> (StatusCode, Json<ErrorBody>) {
    tracing::warn!(%err, "rejecting webhook request");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: UNRECOGNIZED_REQUEST.to_string(),
        }),
    )
}

fn internal_error(err: anyhow::Error) -> (StatusCode, Json<ErrorBody>) {
    tracing::error!(error = ?err, "webhook hook failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: INTERNAL_ERROR.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::test_support::FakeSearch;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    struct FailingSearch;

    #[async_trait]
    impl PackageSearch for FailingSearch {
        async fn search(&self, _params: &SearchParams) -> anyhow::Result<SearchResult> {
            anyhow::bail!("registry down")
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}")
    }

    async fn post_json(base: &str, body: String) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(format!("{base}{FIND_PACKAGE_ROUTE}"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("send");
        let status = response.status().as_u16();
        (status, response.json().await.expect("json body"))
    }

    fn webhook_body(parameters: Value) -> String {
        json!({
            "responseId": "r",
            "queryResult": {"queryText": "q", "parameters": parameters, "intent": {}}
        })
        .to_string()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn answers_with_top_package() {
        let base = serve(router(FakeSearch::returning(&["left-pad"]))).await;
        let body = webhook_body(json!({"npmKeywords": ["pad"]}));
        let (status, body) = post_json(&base, body).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"fulfillmentText": "left-pad"}));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn answers_no_package_when_search_is_empty() {
        let base = serve(router(FakeSearch::returning(&[]))).await;
        let (status, body) = post_json(&base, webhook_body(json!({}))).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"fulfillmentText": "No package"}));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_bodies_get_400() {
        let base = serve(router(FakeSearch::returning(&["never"]))).await;
        let bodies = [
            "{}".to_string(),
            "garbage".to_string(),
            json!({"responseId": 1}).to_string(),
        ];
        for body in bodies {
            let (status, reply) = post_json(&base, body).await;
            assert_eq!(status, 400);
            assert_eq!(reply, json!({"error": UNRECOGNIZED_REQUEST}));
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn search_failures_get_500() {
        let base = serve(router(FailingSearch)).await;
        let (status, reply) = post_json(&base, webhook_body(json!({}))).await;
        assert_eq!(status, 500);
        assert_eq!(reply, json!({"error": INTERNAL_ERROR}));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn health_check_is_ok() {
        let base = serve(WebhookRouter::new().into_router()).await;
        let response = reqwest::get(format!("{base}/healthz")).await.expect("get");
        assert_eq!(response.status().as_u16(), 200);
    }
}
