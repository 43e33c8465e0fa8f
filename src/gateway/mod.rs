//! Network boundary to the remote analysis API.
//!
//! # Architecture
//!
//! - `client` - reqwest-backed [`HttpGateway`] for `/upload`, `/ask` and the cleaning endpoints
//! - `auth` - [`AuthClient`] for `/auth/login` and `/auth/register`
//!
//! Everything above this module talks to [`AnalysisBackend`] so tests can swap
//! in a stub.
mod auth;
mod client;

pub use auth::AuthClient;
pub use client::{CleanSummary, HttpGateway, ProblemType};

use crate::types::{ChartPayload, DatasetFile};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================
// Error Types
// ============================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// No response reached the client.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error {status}: {}", .detail.as_deref().unwrap_or("<no detail>"))]
    Server {
        status: StatusCode,
        detail: Option<String>,
    },

    /// 2xx with a body that does not match the contract.
    #[error("unreadable response: {0}")]
    Decode(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Text shown to the user in place of an answer.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Transport(_) => {
                "Sorry, I encountered an error connecting to the server.".to_string()
            }
            GatewayError::Server {
                detail: Some(detail),
                ..
            } => detail.clone(),
            GatewayError::Server {
                status,
                detail: None,
            } => format!("Server error: {}", status.as_u16()),
            GatewayError::Decode(_) => "The server sent a response I could not read.".to_string(),
            GatewayError::Timeout(_) => "The server took too long to respond.".to_string(),
            GatewayError::Cancelled => "Request cancelled.".to_string(),
        }
    }

    /// Build a server error from a non-2xx body, keeping `detail` when the
    /// body carries one.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            detail: Option<serde_json::Value>,
        }

        let detail = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.detail)
            .and_then(|detail| match detail {
                serde_json::Value::String(text) if !text.is_empty() => Some(text),
                serde_json::Value::Null => None,
                serde_json::Value::String(_) => None,
                other => Some(other.to_string()),
            });
        GatewayError::Server { status, detail }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

// ============================================
// Request / response shapes
// ============================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AskRequest {
    pub question: String,
    pub visualize: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>, visualize: bool) -> Self {
        Self {
            question: question.into(),
            visualize,
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub charts: Option<Vec<ChartPayload>>,
}

/// The two core calls of the analysis API. No retries, no idempotency keys;
/// callers serialize `ask` themselves.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn upload(&self, file: &DatasetFile) -> GatewayResult<()>;

    async fn ask(&self, request: &AskRequest) -> GatewayResult<AskResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_surfaced_verbatim() {
        let err = GatewayError::from_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"detail":"no dataset"}"#,
        );
        assert_eq!(err.user_message(), "no dataset");
    }

    #[test]
    fn unparseable_body_falls_back_to_status() {
        let err = GatewayError::from_status(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(err.user_message(), "Server error: 502");

        let err = GatewayError::from_status(StatusCode::BAD_REQUEST, "{}");
        assert_eq!(err.user_message(), "Server error: 400");
    }

    #[test]
    fn structured_detail_is_rendered_as_json() {
        let err = GatewayError::from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","question"],"msg":"field required"}]}"#,
        );
        assert!(err.user_message().contains("field required"));
    }

    #[test]
    fn transport_error_is_generic() {
        let err = GatewayError::Transport("connection refused".into());
        assert_eq!(
            err.user_message(),
            "Sorry, I encountered an error connecting to the server."
        );
    }

    #[test]
    fn ask_request_omits_missing_user_id() {
        let body = serde_json::to_value(AskRequest::new("avg?", true)).unwrap();
        assert_eq!(body, serde_json::json!({"question": "avg?", "visualize": true}));

        let body = serde_json::to_value(
            AskRequest::new("avg?", false).with_user_id(Some("u1".into())),
        )
        .unwrap();
        assert_eq!(body["user_id"], "u1");
    }

    #[test]
    fn ask_response_charts_are_optional() {
        let parsed: AskResponse = serde_json::from_str(r#"{"answer":"42"}"#).unwrap();
        assert_eq!(parsed.answer, "42");
        assert!(parsed.charts.is_none());

        let parsed: AskResponse =
            serde_json::from_str(r#"{"answer":"see chart","charts":[{"type":"pie"}]}"#).unwrap();
        let charts = parsed.charts.unwrap();
        assert_eq!(charts[0].chart_type(), Some("pie"));
    }
}
