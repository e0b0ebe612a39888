//! npm package finder hook.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::webhook::dialogflow::{WebhookRequest, WebhookResponse};
use crate::webhook::npm_search::{PackageSearch, SearchPackage, SearchParams};
use crate::webhook::WebhookHook;

/// Entity parameter carrying npm keywords.
pub const NPM_KEYWORDS_PARAM: &str = "npmKeywords";
/// Entity parameter carrying technology types.
pub const TYPE_TECHNOLOGIES_PARAM: &str = "typeTechnologies";
/// Reply when nothing matches.
pub const NO_PACKAGE: &str = "No package";

/// Keyword parameters of `request`, npm keywords first.
///
/// A lone string counts as one keyword and a missing parameter as none.
/// Non-string list elements are skipped.
pub fn extract_keywords(request: &WebhookRequest) -> Vec<String> {
    [NPM_KEYWORDS_PARAM, TYPE_TECHNOLOGIES_PARAM]
        .into_iter()
        .flat_map(|name| parameter_strings(request.parameter(name)))
        .collect()
}

fn parameter_strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(text)) => vec![text.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Searches for `keywords` joined by spaces and returns the best hit.
pub async fn find_package_from_keywords<S>(
    search: &S,
    keywords: &[String],
) -> Result<Option<SearchPackage>>
where
    S: PackageSearch + ?Sized,
{
    let params = SearchParams::text(keywords.join(" "));
    let result = search.search(&params).await?;
    Ok(result.top_package().cloned())
}

/// Fulfillment reply naming `package`, or [`NO_PACKAGE`].
pub fn format_response(package: Option<&SearchPackage>) -> WebhookResponse {
    match package {
        Some(package) => WebhookResponse::text(package.name.clone()),
        None => WebhookResponse::text(NO_PACKAGE),
    }
}

/// Answers "find me a package" intents with the top npm search hit.
pub struct NpmChatbotHook<S> {
    search: S,
}

impl<S: PackageSearch> NpmChatbotHook<S> {
    /// Wraps a search backend.
    pub fn new(search: S) -> Self {
        Self { search }
    }
}

#[async_trait]
impl<S: PackageSearch> WebhookHook for NpmChatbotHook<S> {
    async fn handle(&self, request: WebhookRequest) -> Result<WebhookResponse> {
        let keywords = extract_keywords(&request);
        let package = find_package_from_keywords(&self.search, &keywords).await?;
        tracing::info!(
            keywords = %keywords.join(" "),
            package = package.as_ref().map(|p| p.name.as_str()).unwrap_or(NO_PACKAGE),
            "package lookup"
        );
        Ok(format_response(package.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::test_support::FakeSearch;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request(parameters: Value) -> WebhookRequest {
        let body = json!({
            "responseId": "r",
            "queryResult": {"queryText": "q", "parameters": parameters, "intent": {}}
        });
        WebhookRequest::from_slice(body.to_string().as_bytes()).expect("valid request")
    }

    #[test]
    fn keywords_concatenate_both_parameters() {
        let req = request(json!({
            "npmKeywords": ["date", "format"],
            "typeTechnologies": ["react"]
        }));
        assert_eq!(extract_keywords(&req), vec!["date", "format", "react"]);
    }

    #[test]
    fn lone_strings_and_missing_parameters() {
        let req = request(json!({"typeTechnologies": "vue"}));
        assert_eq!(extract_keywords(&req), vec!["vue"]);

        let req = request(json!({"npmKeywords": ["a", 3, null, "b"]}));
        assert_eq!(extract_keywords(&req), vec!["a", "b"]);

        assert!(extract_keywords(&request(json!({}))).is_empty());
    }

    #[test]
    fn formats_package_or_fallback() {
        let package = SearchPackage {
            name: "left-pad".into(),
            version: None,
            description: None,
            keywords: Vec::new(),
            date: None,
        };
        assert_eq!(
            format_response(Some(&package)).fulfillment_text.as_deref(),
            Some("left-pad")
        );
        assert_eq!(
            format_response(None).fulfillment_text.as_deref(),
            Some("No package")
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hook_joins_keywords_into_one_query() {
        let search = FakeSearch::returning(&["moment", "dayjs"]);
        let hook = NpmChatbotHook::new(search);
        let response = hook
            .handle(request(json!({
                "npmKeywords": ["date"],
                "typeTechnologies": ["node"]
            })))
            .await
            .expect("handled");

        assert_eq!(response, WebhookResponse::text("moment"));
        let queries = hook.search.queries.lock().expect("lock");
        assert_eq!(queries.as_slice(), [SearchParams::text("date node")]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_results_reply_no_package() {
        let hook = NpmChatbotHook::new(FakeSearch::returning(&[]));
        let response = hook.handle(request(json!({}))).await.expect("handled");
        assert_eq!(response, WebhookResponse::text(NO_PACKAGE));
    }
}
