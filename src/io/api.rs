//! HTTP client for the conference registrar API
//!
//! Every call is a single request with no retry. Failures are classified into
//! transport errors, non-2xx statuses (carrying the server's message when it
//! sent one) and undecodable bodies.

use crate::domain::ticket::TicketId;
use crate::domain::types::{
    ErrorBody, HealthStatus, Participant, ParticipantsPage, RegisterResponse, RegistrationRequest,
    Stats, VerifyResponse,
};
use crate::infra::config::Config;
use crate::infra::metrics::ApiMetrics;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Message shown to users whenever the server did not provide one
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

const USER_AGENT: &str = concat!("ticket-desk/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid registrar url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}{}", status_suffix(.message))]
    Status { endpoint: &'static str, status: u16, message: Option<String> },

    #[error("could not decode {endpoint} response: {message}")]
    Decode { endpoint: &'static str, message: String },
}

impl ApiError {
    /// The single message surfaced to users
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message: Some(message), .. } => message.clone(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the registrar could not be reached at all
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }
}

fn status_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default()
}

/// 404 body that explicitly answers a lookup; `valid` has no default
#[derive(Deserialize)]
struct LookupMiss {
    valid: bool,
}

/// A 404 counts as an answer only when it carries `"valid": false`.
/// Anything else (unknown route, proxy page) is a plain status error.
fn is_explicit_miss(body: &[u8]) -> bool {
    serde_json::from_slice::<LookupMiss>(body).is_ok_and(|miss| !miss.valid)
}

/// The registrar operations the workflows depend on
#[async_trait]
pub trait RegistrarApi: Send + Sync {
    /// `POST /api/register`
    async fn register(&self, request: &RegistrationRequest) -> Result<Participant, ApiError>;

    /// `GET /api/verify/{ticket_id}`; a 404 carrying `"valid": false` is a regular response
    async fn verify(&self, ticket: &TicketId) -> Result<VerifyResponse, ApiError>;

    /// `GET /api/participants`
    async fn participants(&self) -> Result<ParticipantsPage, ApiError>;

    /// `GET /api/stats`
    async fn stats(&self) -> Result<Stats, ApiError>;
}

/// Asset path prefixes under the registrar base URL
#[derive(Debug, Clone)]
pub(crate) struct AssetPrefixes {
    pub(crate) avatar: String,
    pub(crate) qr: String,
}

pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
    pub(crate) prefixes: AssetPrefixes,
    metrics: Arc<ApiMetrics>,
}

impl ApiClient {
    /// Build a client for the configured registrar
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            config.base_url(),
            Duration::from_millis(config.timeout_ms()),
            config.avatar_prefix(),
            config.qr_prefix(),
        )
    }

    pub fn new(
        base_url: &str,
        timeout: Duration,
        avatar_prefix: &str,
        qr_prefix: &str,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl {
                url: base_url.to_string(),
                message: "url cannot be a base".to_string(),
            });
        }

        // Create HTTP client once for reuse (connection pooling)
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            base_url,
            http,
            prefixes: AssetPrefixes {
                avatar: avatar_prefix.to_string(),
                qr: qr_prefix.to_string(),
            },
            metrics: Arc::new(ApiMetrics::new()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn metrics(&self) -> Arc<ApiMetrics> {
        self.metrics.clone()
    }

    /// Append path segments to the base URL, percent-encoding each one
    pub(crate) fn url_for<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl {
                url: self.base_url.to_string(),
                message: "url cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments.into_iter().filter(|s| !s.is_empty()));
        Ok(url)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn record(&self, start: Instant, ok: bool) {
        self.metrics.record_request(start.elapsed().as_micros() as u64, ok);
    }

    /// `GET /api/health`
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let url = self.url_for(["api", "health"])?;
        self.send_json("health", self.http.get(url), false).await
    }

    /// Send a request and decode a JSON body, recording metrics either way
    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
        accept_not_found: bool,
    ) -> Result<T, ApiError> {
        let start = Instant::now();
        let result = Self::execute(endpoint, request, accept_not_found).await;
        self.record(start, result.is_ok());

        match &result {
            Ok(_) => {
                debug!(
                    endpoint = %endpoint,
                    latency_us = %start.elapsed().as_micros(),
                    "api_request_ok"
                );
            }
            Err(e) => {
                warn!(
                    endpoint = %endpoint,
                    latency_us = %start.elapsed().as_micros(),
                    error = %e,
                    "api_request_failed"
                );
            }
        }
        result
    }

    async fn execute<T: DeserializeOwned>(
        endpoint: &'static str,
        request: RequestBuilder,
        accept_not_found: bool,
    ) -> Result<T, ApiError> {
        let response =
            request.send().await.map_err(|source| ApiError::Transport { endpoint, source })?;
        let status = response.status();
        let body =
            response.bytes().await.map_err(|source| ApiError::Transport { endpoint, source })?;

        let answered_miss =
            accept_not_found && status == StatusCode::NOT_FOUND && is_explicit_miss(&body);
        if status.is_success() || answered_miss {
            return serde_json::from_slice::<T>(&body)
                .map_err(|e| ApiError::Decode { endpoint, message: e.to_string() });
        }

        let message = serde_json::from_slice::<ErrorBody>(&body).ok().and_then(ErrorBody::into_text);
        Err(ApiError::Status { endpoint, status: status.as_u16(), message })
    }
}

#[async_trait]
impl RegistrarApi for ApiClient {
    async fn register(&self, request: &RegistrationRequest) -> Result<Participant, ApiError> {
        let url = self.url_for(["api", "register"])?;
        let response: RegisterResponse =
            self.send_json("register", self.http.post(url).json(request), false).await?;

        response.participant.ok_or_else(|| ApiError::Decode {
            endpoint: "register",
            message: "response has no participant".to_string(),
        })
    }

    async fn verify(&self, ticket: &TicketId) -> Result<VerifyResponse, ApiError> {
        let url = self.url_for(["api", "verify", ticket.as_str()])?;
        self.send_json("verify", self.http.get(url), true).await
    }

    async fn participants(&self) -> Result<ParticipantsPage, ApiError> {
        let url = self.url_for(["api", "participants"])?;
        self.send_json("participants", self.http.get(url), false).await
    }

    async fn stats(&self) -> Result<Stats, ApiError> {
        let url = self.url_for(["api", "stats"])?;
        self.send_json("stats", self.http.get(url), false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(1), "/uploads", "/qr_codes").unwrap()
    }

    #[test]
    fn test_url_for_plain_base() {
        let client = client("http://localhost:5000");
        let url = client.url_for(["api", "verify", "TC1A2B3C"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/verify/TC1A2B3C");
    }

    #[test]
    fn test_url_for_base_with_path_prefix() {
        let client = client("https://example.org/conf/");
        let url = client.url_for(["api", "stats"]).unwrap();
        assert_eq!(url.as_str(), "https://example.org/conf/api/stats");
    }

    #[test]
    fn test_url_for_encodes_segments() {
        let client = client("http://localhost:5000");
        let url = client.url_for(["uploads", "a b.png"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/uploads/a%20b.png");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ApiClient::new("not a url", Duration::from_secs(1), "/u", "/q").err().unwrap();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);

        let err = ApiClient::new("mailto:a@b.c", Duration::from_secs(1), "/u", "/q").err().unwrap();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
    }

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = ApiError::Status {
            endpoint: "register",
            status: 400,
            message: Some("Email already registered".to_string()),
        };
        assert_eq!(err.user_message(), "Email already registered");
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "register returned HTTP 400: Email already registered");

        let err = ApiError::Status { endpoint: "stats", status: 502, message: None };
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
        assert_eq!(err.to_string(), "stats returned HTTP 502");
    }

    #[test]
    fn test_only_explicit_404_is_a_lookup_answer() {
        assert!(is_explicit_miss(br#"{"valid":false,"message":"Ticket not found"}"#));
        assert!(!is_explicit_miss(br#"{"error":"Endpoint not found"}"#));
        assert!(!is_explicit_miss(br#"{"valid":true}"#));
        assert!(!is_explicit_miss(b"<html>404 Not Found</html>"));
        assert!(!is_explicit_miss(b""));
    }

    #[tokio::test]
    async fn test_unreachable_registrar_is_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = client("http://127.0.0.1:9");
        let err = client.stats().await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
        assert_eq!(client.metrics().failures_total(), 1);
    }
}
