//! HTTP dispatch of outbound requests.

use gateway_core::{GatewayError, GatewayResult};
use gateway_providers::{extract_error_message, OutboundRequest};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// Connect timeout of the default client
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends [`OutboundRequest`]s and maps transport and status failures to
/// upstream errors
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
}

impl HttpDispatcher {
    /// Create a dispatcher with a pooled client.
    ///
    /// No overall request timeout is set on the client: streamed bodies can
    /// outlive any fixed deadline, so deadlines are applied per call.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(connect_timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// POST the request and return the response once its status is a success.
    ///
    /// # Errors
    /// Returns an upstream error carrying the extracted message for non-2xx
    /// statuses, and an upstream (or timeout) error when the call fails in
    /// transit
    pub async fn send(&self, platform_id: &str, request: &OutboundRequest) -> GatewayResult<Response> {
        let body = serde_json::to_vec(&request.body)?;

        let mut builder = self.client.post(&request.url).body(body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        debug!(platform = %platform_id, url = %request.url, "Dispatching upstream request");

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(platform_id, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body);
            warn!(
                platform = %platform_id,
                status = status.as_u16(),
                error = %message,
                "Upstream returned error status"
            );
            return Err(GatewayError::upstream(platform_id, Some(status.as_u16()), message));
        }

        Ok(response)
    }

    /// Read a whole response body as text
    ///
    /// # Errors
    /// Returns an upstream error if the body cannot be read
    pub async fn read_text(&self, platform_id: &str, response: Response) -> GatewayResult<String> {
        response
            .text()
            .await
            .map_err(|e| transport_error(platform_id, &e))
    }
}

fn transport_error(platform_id: &str, error: &reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::upstream_timeout(platform_id, error.to_string())
    } else {
        GatewayError::upstream(platform_id, None, format!("request failed: {error}"))
    }
}
