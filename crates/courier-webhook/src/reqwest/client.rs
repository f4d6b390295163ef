//! Reqwest-based HTTP client for webhook delivery.

use std::sync::Arc;

use jiff::Timestamp;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use reqwest::{Client, Response};

use super::{Error, ReqwestConfig, Result, TRACING_TARGET};
use crate::response::RESPONSE_BODY_LIMIT;
use crate::{WebhookProvider, WebhookRequest, WebhookResponse, WebhookService};

/// Bytes read from a response body: [`RESPONSE_BODY_LIMIT`] four-byte
/// characters plus the start of one more.
const BODY_READ_LIMIT: usize = RESPONSE_BODY_LIMIT * 4 + 3;

/// Inner client that holds the HTTP client and configuration.
struct ReqwestClientInner {
    http: Client,
    config: ReqwestConfig,
}

/// Reqwest-based HTTP client for delivering signed webhook payloads.
///
/// Sends the request body unchanged, with the `X-Webhook-*` headers produced by
/// [`WebhookRequest::webhook_headers`]. Every received response, 2xx or not, is
/// returned as `Ok`; so are connect failures and timeouts, with
/// [`WebhookResponse::error`] set. Redirects are not followed, and at most
/// [`RESPONSE_BODY_LIMIT`] characters of a reply body are read.
#[derive(Clone)]
pub struct ReqwestClient {
    inner: Arc<ReqwestClientInner>,
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestClient {
    /// Creates a new reqwest client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ReqwestConfig) -> Result<Self> {
        tracing::debug!(
            target: TRACING_TARGET,
            timeout_secs = config.http_timeout,
            "Creating reqwest client"
        );

        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .redirect(Policy::none())
            .user_agent(&*config.effective_user_agent())
            .build()
            .map_err(Error::from)?;

        let client = Self {
            inner: Arc::new(ReqwestClientInner { http, config }),
        };

        tracing::info!(
            target: TRACING_TARGET,
            "Reqwest client created successfully"
        );

        Ok(client)
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.inner.config
    }

    /// Converts this client into a [`WebhookService`] for use with dependency injection.
    pub fn into_service(self) -> WebhookService {
        WebhookService::new(self)
    }
}

#[async_trait::async_trait]
impl WebhookProvider for ReqwestClient {
    async fn deliver(&self, request: &WebhookRequest) -> crate::Result<WebhookResponse> {
        let started_at = Timestamp::now();
        let timeout = request.timeout.unwrap_or_else(|| self.config().timeout());

        let mut http_request = self
            .inner
            .http
            .post(request.url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout);

        for (name, value) in request.webhook_headers() {
            http_request = http_request.header(name, value);
        }

        let result = http_request.body(request.body.clone()).send().await;

        let http_response = match result {
            Ok(http_response) => http_response,
            Err(err) => {
                let error_message = Error::from(err).transport_message();

                tracing::warn!(
                    target: TRACING_TARGET,
                    request_id = %request.request_id,
                    webhook_id = %request.webhook_id,
                    error = %error_message,
                    "Webhook request did not complete"
                );

                return Ok(WebhookResponse::failed(
                    request.request_id,
                    error_message,
                    started_at,
                ));
            }
        };

        let status_code = http_response.status().as_u16();

        let body = read_body_prefix(http_response).await;
        let response = WebhookResponse::received(request.request_id, status_code, body, started_at);

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            webhook_id = %request.webhook_id,
            status_code,
            success = response.is_success(),
            "Webhook delivery completed"
        );

        Ok(response)
    }
}

/// Reads the start of a reply body, never more than [`BODY_READ_LIMIT`] bytes.
///
/// A body that fails midway keeps what was read; it does not change the
/// outcome of the attempt.
async fn read_body_prefix(mut response: Response) -> Option<String> {
    let mut buf = Vec::new();

    while buf.len() < BODY_READ_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(BODY_READ_LIMIT - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }

    (!buf.is_empty()).then(|| String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use serde_json::json;
    use url::Url;
    use uuid::Uuid;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::{WebhookEnvelope, signature};

    fn signed_request(url: &str) -> WebhookRequest {
        let timestamp: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let envelope = WebhookEnvelope::new("ticket.created", json!({"id": "1"}), timestamp);
        WebhookRequest::signed(
            Uuid::now_v7(),
            Url::parse(url).unwrap(),
            &envelope,
            b"testsecret",
        )
        .unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        assert!(client.config().user_agent.is_none());

        assert!(ReqwestClient::new(ReqwestConfig::new(0)).is_err());
    }

    #[tokio::test]
    async fn test_sends_headers_and_signed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks"))
            .and(header("content-type", "application/json"))
            .and(header("x-webhook-event", "ticket.created"))
            .and(header("x-webhook-timestamp", "2024-01-01T00:00:00.000Z"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let request = signed_request(&format!("{}/hooks", server.uri()));
        let response = client.deliver(&request).await.unwrap();

        assert_eq!(response.status_code, Some(200));
        assert_eq!(response.body.as_deref(), Some("ok"));

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);

        let received = &received[0];
        let header_value = |name: &str| {
            received
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        let signature_header = header_value("x-webhook-signature").unwrap();
        assert!(signature::verify(
            b"testsecret",
            &received.body,
            &signature_header
        ));
        assert_eq!(
            header_value("x-webhook-id"),
            Some(request.webhook_id.to_string())
        );
        assert_eq!(received.body, request.body);
    }

    #[tokio::test]
    async fn test_error_status_is_captured() {
        let server = MockServer::start().await;
        let long_body = "x".repeat(RESPONSE_BODY_LIMIT * 2);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string(long_body))
            .mount(&server)
            .await;

        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let response = client
            .deliver(&signed_request(&server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status_code, Some(503));
        assert!(!response.is_success());
        assert_eq!(response.body.unwrap().len(), RESPONSE_BODY_LIMIT);
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_redirect_is_recorded_not_followed() {
        let server = MockServer::start().await;
        let landing = format!("{}/landing", server.uri());
        Mock::given(path("/hooks"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", landing.as_str()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/landing"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let response = client
            .deliver(&signed_request(&format!("{}/hooks", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status_code, Some(302));
        assert!(!response.is_success());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_large_body_is_cut_on_a_char_boundary() {
        let server = MockServer::start().await;
        let huge_body = "é".repeat(1024 * 1024);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string(huge_body))
            .mount(&server)
            .await;

        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let response = client
            .deliver(&signed_request(&server.uri()))
            .await
            .unwrap();

        let body = response.body.unwrap();
        assert_eq!(body.chars().count(), RESPONSE_BODY_LIMIT);
        assert!(body.chars().all(|c| c == 'é'));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let response = client
            .deliver(&signed_request(&format!("http://127.0.0.1:{port}/hooks")))
            .await
            .unwrap();

        assert!(response.status_code.is_none());
        assert!(response.error.is_some());
    }
}
