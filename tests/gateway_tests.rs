//! Integration tests for the HTTP gateway against a local mock server

use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vectora::AppConfig;
use vectora::gateway::{AnalysisBackend, AskRequest, AuthClient, HttpGateway, ProblemType};
use vectora::session::SessionGate;
use vectora::store::MemoryStore;
use vectora::types::DatasetFile;

const SESSION: &str = "3f1c9a5e-7d2b-4c1a-9e0f-2a6b8c4d1e7f";

fn config(server: &Server) -> AppConfig {
    AppConfig {
        api_base_url: server.url(),
        request_timeout: Some(Duration::from_secs(5)),
        ..AppConfig::default()
    }
}

fn gateway(server: &Server) -> HttpGateway {
    HttpGateway::new(&config(server), SESSION).unwrap()
}

mod analysis_tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_sends_file_field_and_session() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/upload")
            .match_header("x-session-id", SESSION)
            .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="file"; filename="sales\.csv""#.into()),
                Matcher::Regex("Content-Type: text/csv".into()),
                Matcher::Regex("region,total\nnorth,10\n".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"message":"ok"}"#)
            .create_async()
            .await;

        let file = DatasetFile::new("sales.csv", "region,total\nnorth,10\n");
        gateway(&server).upload(&file).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_error_detail_reaches_caller() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/upload")
            .with_status(400)
            .with_body(r#"{"detail":"Unsupported file type"}"#)
            .create_async()
            .await;

        let err = gateway(&server)
            .upload(&DatasetFile::new("notes.txt", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Unsupported file type");
    }

    #[tokio::test]
    async fn test_ask_posts_json_with_session() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/ask")
            .match_header("x-session-id", SESSION)
            .match_body(Matcher::Json(json!({
                "question": "What's the average?",
                "visualize": true,
                "user_id": "u-7"
            })))
            .with_status(200)
            .with_body(r#"{"answer":"12.5","charts":[{"type":"bar","data":[1,2]}]}"#)
            .create_async()
            .await;

        let request =
            AskRequest::new("What's the average?", true).with_user_id(Some("u-7".into()));
        let response = gateway(&server).ask(&request).await.unwrap();
        mock.assert_async().await;

        assert_eq!(response.answer, "12.5");
        let charts = response.charts.unwrap();
        assert_eq!(charts[0].chart_type(), Some("bar"));
    }

    #[tokio::test]
    async fn test_ask_server_error_detail_is_verbatim() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/ask")
            .with_status(500)
            .with_body(r#"{"detail":"no dataset"}"#)
            .create_async()
            .await;

        let err = gateway(&server)
            .ask(&AskRequest::new("What's the average?", false))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "no dataset");
    }

    #[tokio::test]
    async fn test_ask_unparseable_error_uses_status() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/ask")
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let err = gateway(&server)
            .ask(&AskRequest::new("anything", false))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Server error: 502");
    }
}

mod cleaning_tests {
    use super::*;

    #[tokio::test]
    async fn test_general_clean_omits_target() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/clean/advanced")
            .match_header("x-session-id", SESSION)
            .match_query(Matcher::Exact("problem_type=general".into()))
            .with_status(200)
            .with_body(r#"{"summary":"Dropped 3 empty rows"}"#)
            .create_async()
            .await;

        let summary = gateway(&server)
            .clean_advanced(ProblemType::General, Some("label"))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(summary.summary, "Dropped 3 empty rows");
        assert_eq!(summary.download, None);
    }

    #[tokio::test]
    async fn test_classification_clean_sends_target() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/clean/advanced")
            .match_header("x-session-id", SESSION)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("problem_type".into(), "classification".into()),
                Matcher::UrlEncoded("target".into(), "label".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"summary":"Encoded 2 columns","download":"/download/advanced"}"#)
            .create_async()
            .await;

        let summary = gateway(&server)
            .clean_advanced(ProblemType::Classification, Some("label"))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(summary.download.as_deref(), Some("/download/advanced"));
    }

    #[tokio::test]
    async fn test_download_returns_bytes() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/download/advanced")
            .match_header("x-session-id", SESSION)
            .with_status(200)
            .with_header("content-type", "text/csv")
            .with_body("a,b\n1,2\n")
            .create_async()
            .await;

        let bytes = gateway(&server).download_cleaned().await.unwrap();
        mock.assert_async().await;
        assert_eq!(bytes, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_download_without_cleaned_file_is_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/download/advanced")
            .with_status(404)
            .with_body(r#"{"detail":"No cleaned file available"}"#)
            .create_async()
            .await;

        let err = gateway(&server).download_cleaned().await.unwrap_err();
        assert_eq!(err.user_message(), "No cleaned file available");
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_login_writes_identity_marker() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .match_body(Matcher::Json(json!({
                "email": "ada@example.com",
                "password": "hunter2"
            })))
            .with_status(200)
            .with_body(r#"{"user_id":"u-1","username":"Ada"}"#)
            .create_async()
            .await;

        let gate = SessionGate::new(Arc::new(MemoryStore::new()));
        let auth = AuthClient::new(&config(&server), gate.clone()).unwrap();
        let identity = auth.login("ada@example.com", "hunter2").await.unwrap();

        assert_eq!(identity.user_id, "u-1");
        assert!(!gate.check().requires_sign_in());
    }

    #[tokio::test]
    async fn test_failed_login_leaves_gate_closed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body("")
            .create_async()
            .await;

        let gate = SessionGate::new(Arc::new(MemoryStore::new()));
        let auth = AuthClient::new(&config(&server), gate.clone()).unwrap();
        let err = auth.login("ada@example.com", "wrong").await.unwrap_err();

        assert_eq!(err.user_message(), "Login failed");
        assert!(gate.check().requires_sign_in());
    }
}
