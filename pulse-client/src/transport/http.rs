//! reqwest-backed transport.

use super::{HttpRequest, HttpResponse, Transport, TransportError, CONTENT_TYPE_JSON};
use async_trait::async_trait;
use pulse_core::Method;
use std::time::Duration;

/// Client-wide cap on a whole exchange, connect to last body byte.
pub const RESOURCE_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP transport built on a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    https_only: bool,
}

impl ReqwestTransport {
    /// Create a transport that accepts both `http` and `https` URLs.
    pub fn new() -> Result<Self, TransportError> {
        Self::build(false)
    }

    /// Create a transport that refuses plaintext `http` URLs.
    pub fn https_only() -> Result<Self, TransportError> {
        Self::build(true)
    }

    fn build(https_only: bool) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(RESOURCE_TIMEOUT)
            .https_only(https_only)
            .user_agent(concat!("pulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self { client, https_only })
    }

    /// Wrap an existing client (for testing).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            https_only: false,
        }
    }

    /// Whether plaintext URLs are refused.
    pub fn is_https_only(&self) -> bool {
        self.https_only
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Patch => reqwest::Method::PATCH,
        Method::Post => reqwest::Method::POST,
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::ConnectionFailed(err.to_string())
    } else {
        TransportError::RequestFailed(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        if self.https_only && url.scheme() == "http" {
            return Err(TransportError::PolicyBlocked(url.to_string()));
        }

        let mut builder = self
            .client
            .request(to_reqwest(request.method), url)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_JSON)
                .body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?.to_vec();

        tracing::trace!(status, bytes = body.len(), "collector responded");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn sends_json_body_with_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/users/abc/event"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"payload":"AAAA"}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let request = HttpRequest::json(
            Method::Post,
            format!("{}/v1/users/abc/event", server.uri()),
            br#"{"payload":"AAAA"}"#.to_vec(),
            TIMEOUT,
        );

        let response = transport.send(request).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn non_success_status_is_not_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(422).set_body_string(r#"{"detail":[]}"#))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let request = HttpRequest::json(
            Method::Patch,
            format!("{}/v1/users/abc", server.uri()),
            b"{}".to_vec(),
            TIMEOUT,
        );

        let response = transport.send(request).await.unwrap();
        assert_eq!(response.status, 422);
        assert_eq!(response.body, br#"{"detail":[]}"#);
    }

    #[tokio::test]
    async fn request_timeout_maps_to_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let request = HttpRequest::get(server.uri(), Duration::from_millis(100));

        let result = transport.send(request).await;
        assert!(matches!(result, Err(TransportError::Timeout)));
    }

    #[tokio::test]
    async fn connection_refused_is_an_error() {
        let transport = ReqwestTransport::new().unwrap();
        let request = HttpRequest::get("http://127.0.0.1:1/", TIMEOUT);

        let result = transport.send(request).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn https_only_blocks_plaintext() {
        let transport = ReqwestTransport::https_only().unwrap();
        assert!(transport.is_https_only());

        let request = HttpRequest::get("http://collector.example.com", TIMEOUT);
        let result = transport.send(request).await;
        assert!(matches!(result, Err(TransportError::PolicyBlocked(_))));
    }

    #[tokio::test]
    async fn unparsable_url_rejected() {
        let transport = ReqwestTransport::new().unwrap();
        let request = HttpRequest::get("http://exa mple.com/v1", TIMEOUT);

        let result = transport.send(request).await;
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }
}
