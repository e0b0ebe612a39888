//! Dialogflow v2 fulfillment request and response shapes.
//!
//! Only `responseId`, `queryResult.queryText`, `queryResult.parameters` and
//! `queryResult.intent` are required. Optional fields are type-checked when
//! present and unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Body returned with a 400 when a request fails the shape check.
pub const UNRECOGNIZED_REQUEST: &str = "Request not recognized as Dialogflow webhook request.";

/// Free-form JSON object.
pub type JsonObject = Map<String, Value>;

/// Rich message as sent by the agent; kept opaque.
pub type Message = JsonObject;

/// A body that does not look like a Dialogflow webhook request.
#[derive(Debug, Error)]
#[error("request not recognized as Dialogflow webhook request: {0}")]
pub struct RequestShapeError(#[from] serde_json::Error);

/// Conversation context attached to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Fully qualified context name.
    pub name: String,
    /// Remaining turns the context stays active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifespan_count: Option<u32>,
    /// Context parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonObject>,
}

/// Result of matching the user's query to an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Original user text.
    pub query_text: String,
    /// Extracted parameter values keyed by parameter name.
    pub parameters: JsonObject,
    /// Matched intent.
    pub intent: JsonObject,
    /// Language of the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    /// Speech-to-text confidence, when spoken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_recognition_confidence: Option<f64>,
    /// Action name of the matched intent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// False while slot filling is incomplete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_required_params_present: Option<bool>,
    /// Text spoken or shown to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_text: Option<String>,
    /// Rich messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_messages: Option<Vec<Message>>,
    /// Source reported by an earlier webhook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_source: Option<String>,
    /// Payload reported by an earlier webhook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_payload: Option<JsonObject>,
    /// Contexts active after this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_contexts: Option<Vec<Context>>,
    /// Intent match confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_detection_confidence: Option<f64>,
    /// Debugging details from the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_info: Option<JsonObject>,
}

/// Platform request that triggered the detect-intent call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalDetectIntentRequest {
    /// Integration name, e.g. `google`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Platform-specific payload.
    pub payload: JsonObject,
}

/// Fulfillment request posted by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    /// Session the query belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Unique id of this response.
    pub response_id: String,
    /// Matched query.
    pub query_result: QueryResult,
    /// Originating platform request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_detect_intent_request: Option<OriginalDetectIntentRequest>,
}

impl WebhookRequest {
    /// Parses and shape-checks a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, RequestShapeError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Parameter value by name.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.query_result.parameters.get(name)
    }
}

/// Fulfillment reply; absent fields are omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    /// Text spoken or shown to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_text: Option<String>,
    /// Rich messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_messages: Option<Vec<Message>>,
    /// Source label for the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Platform-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonObject>,
    /// Contexts active after this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_contexts: Option<Vec<Context>>,
    /// Event to trigger next.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followup_event_input: Option<JsonObject>,
}

impl WebhookResponse {
    /// Reply carrying only fulfillment text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            fulfillment_text: Some(text.into()),
            ..Self::default()
        }
    }
}
