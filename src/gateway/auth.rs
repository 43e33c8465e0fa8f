use super::client::{build_client, send_error};
use super::{GatewayError, GatewayResult};
use crate::config::AppConfig;
use crate::session::SessionGate;
use crate::types::SessionIdentity;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    first_name: &'a str,
    last_name: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    user_id: String,
    username: String,
}

#[derive(Deserialize)]
struct RegisterResponse {
    user_id: String,
}

/// Client for the `/auth/*` collaborator. A successful login writes the
/// identity marker the chat gate looks for.
pub struct AuthClient {
    client: Client,
    base_url: String,
    timeout: Option<Duration>,
    gate: SessionGate,
}

impl AuthClient {
    pub fn new(config: &AppConfig, gate: SessionGate) -> GatewayResult<Self> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            base_url: config.api_base_url.clone(),
            timeout: config.request_timeout,
            gate,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> GatewayResult<SessionIdentity> {
        let (status, body) = self
            .post_json("/auth/login", &LoginRequest { email, password })
            .await?;
        if !status.is_success() {
            return Err(with_fallback(status, &body, "Login failed"));
        }

        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|err| GatewayError::Decode(err.to_string()))?;
        let identity = SessionIdentity {
            user_id: parsed.user_id,
            username: parsed.username,
        };
        if let Err(err) = self.gate.sign_in(&identity) {
            tracing::warn!(error = %err, "signed in but could not store identity");
        }
        Ok(identity)
    }

    /// Create an account; returns the new user id. Does not sign in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> GatewayResult<String> {
        let request = RegisterRequest {
            email,
            password,
            first_name,
            last_name,
        };
        let (status, body) = self.post_json("/auth/register", &request).await?;
        if !status.is_success() {
            return Err(with_fallback(status, &body, "Registration failed"));
        }
        serde_json::from_str::<RegisterResponse>(&body)
            .map(|parsed| parsed.user_id)
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> GatewayResult<(StatusCode, String)> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(payload)
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
}

/// Auth forms show a fixed message when the server gives no detail.
fn with_fallback(status: StatusCode, body: &str, fallback: &str) -> GatewayError {
    match GatewayError::from_status(status, body) {
        GatewayError::Server { status, detail: None } => GatewayError::Server {
            status,
            detail: Some(fallback.to_string()),
        },
        other => other,
    }
}
