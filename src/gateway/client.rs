use super::{AnalysisBackend, AskRequest, AskResponse, GatewayError, GatewayResult};
use crate::config::AppConfig;
use crate::types::DatasetFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub(crate) const SESSION_HEADER: &str = "x-session-id";
const CSV_MIME: &str = "text/csv";

/// reqwest client for the analysis API.
///
/// Every call carries the profile's session key so the backend can tie an
/// `/ask` to the dataset from the matching `/upload`.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    session_key: String,
    timeout: Option<Duration>,
}

impl HttpGateway {
    pub fn new(config: &AppConfig, session_key: impl Into<String>) -> GatewayResult<Self> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            base_url: config.api_base_url.clone(),
            session_key: session_key.into(),
            timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(SESSION_HEADER, &self.session_key)
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<(StatusCode, String)> {
        let response = self
            .with_session(request)
            .send()
            .await
            .map_err(|err| send_error(err, self.timeout))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| send_error(err, self.timeout))?;
        Ok((status, body))
    }

    /// Run the server-side cleaning pipeline on the current dataset.
    pub async fn clean_advanced(
        &self,
        problem_type: ProblemType,
        target: Option<&str>,
    ) -> GatewayResult<CleanSummary> {
        let mut query = vec![("problem_type", problem_type.as_str())];
        if problem_type.takes_target() {
            if let Some(target) = target.filter(|t| !t.trim().is_empty()) {
                query.push(("target", target));
            }
        }

        let request = self
            .client
            .post(self.endpoint("/clean/advanced"))
            .query(&query);
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(GatewayError::from_status(status, &body));
        }
        serde_json::from_str(&body).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    /// Fetch the CSV produced by the last [`HttpGateway::clean_advanced`] call.
    pub async fn download_cleaned(&self) -> GatewayResult<Vec<u8>> {
        let response = self
            .with_session(self.client.get(self.endpoint("/download/advanced")))
            .send()
            .await
            .map_err(|err| send_error(err, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, &body));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| send_error(err, self.timeout))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AnalysisBackend for HttpGateway {
    async fn upload(&self, file: &DatasetFile) -> GatewayResult<()> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(CSV_MIME)?;
        let request = self
            .client
            .post(self.endpoint("/upload"))
            .multipart(Form::new().part("file", part));

        let (status, body) = self.send(request).await?;
        if status.is_success() {
            tracing::info!(filename = %file.filename, bytes = file.size_bytes(), "dataset uploaded");
            Ok(())
        } else {
            Err(GatewayError::from_status(status, &body))
        }
    }

    async fn ask(&self, request: &AskRequest) -> GatewayResult<AskResponse> {
        let builder = self.client.post(self.endpoint("/ask")).json(request);
        let (status, body) = self.send(builder).await?;
        decode_ask(status, &body)
    }
}

pub(crate) fn build_client(timeout: Option<Duration>) -> GatewayResult<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(GatewayError::from)
}

pub(crate) fn send_error(err: reqwest::Error, timeout: Option<Duration>) -> GatewayError {
    match timeout {
        Some(limit) if err.is_timeout() => GatewayError::Timeout(limit),
        _ => GatewayError::from(err),
    }
}

fn decode_ask(status: StatusCode, body: &str) -> GatewayResult<AskResponse> {
    if !status.is_success() {
        return Err(GatewayError::from_status(status, body));
    }
    serde_json::from_str(body).map_err(|err| GatewayError::Decode(err.to_string()))
}

// ============================================
// Cleaning endpoint types
// ============================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProblemType {
    #[default]
    General,
    SentimentAnalysis,
    Classification,
    BinaryClassification,
}

impl ProblemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemType::General => "general",
            ProblemType::SentimentAnalysis => "sentiment_analysis",
            ProblemType::Classification => "classification",
            ProblemType::BinaryClassification => "binary_classification",
        }
    }

    /// Only supervised problems need a target column.
    pub fn takes_target(self) -> bool {
        matches!(
            self,
            ProblemType::Classification | ProblemType::BinaryClassification
        )
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CleanSummary {
    pub summary: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub download: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_successful_answer() {
        let parsed = decode_ask(
            StatusCode::OK,
            r#"{"answer":"Mean is 4.2","charts":[{"type":"bar","data":[1,2]}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.answer, "Mean is 4.2");
        assert_eq!(parsed.charts.map(|c| c.len()), Some(1));
    }

    #[test]
    fn non_success_uses_detail() {
        let err = decode_ask(StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail":"no dataset"}"#)
            .unwrap_err();
        assert_eq!(err.user_message(), "no dataset");
    }

    #[test]
    fn garbage_success_body_is_decode_error() {
        let err = decode_ask(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[test]
    fn problem_type_target_rules() {
        assert!(!ProblemType::General.takes_target());
        assert!(!ProblemType::SentimentAnalysis.takes_target());
        assert!(ProblemType::Classification.takes_target());
        assert_eq!(
            ProblemType::BinaryClassification.as_str(),
            "binary_classification"
        );
    }

    #[test]
    fn endpoint_joins_base_url() {
        let config = AppConfig {
            api_base_url: "http://localhost:9000".into(),
            ..AppConfig::default()
        };
        let gateway = HttpGateway::new(&config, "abc").unwrap();
        assert_eq!(gateway.endpoint("/ask"), "http://localhost:9000/ask");
        assert_eq!(gateway.base_url(), "http://localhost:9000");
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let config = AppConfig {
            // reserved port on loopback; nothing listens there
            api_base_url: "http://127.0.0.1:9".into(),
            request_timeout: Some(Duration::from_secs(5)),
            ..AppConfig::default()
        };
        let gateway = HttpGateway::new(&config, "abc").unwrap();
        let err = gateway
            .ask(&AskRequest::new("anything", false))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Transport(_) | GatewayError::Timeout(_)
        ));
    }
}
