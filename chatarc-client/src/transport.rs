use async_trait::async_trait;
use serde_json::Value;

/// HTTP verbs the backend API needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Patch,
    Delete,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed `retry-after` header, seconds.
    pub retry_after: Option<u64>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport seam under the rate limiter. Tests script status sequences and
/// count calls through this trait; production uses [`ReqwestTransport`].
/// Transport-level failures (connection refused, timeout) come back as a
/// message string and count as retryable attempts.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, String>;
}

pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> std::result::Result<ReqwestTransport, reqwest::Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(ReqwestTransport { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, String> {
        let mut builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Patch => self.http.patch(&request.url),
            Method::Delete => self.http.delete(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| err.to_string())?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        let body = response
            .bytes()
            .await
            .map_err(|err| err.to_string())?
            .to_vec();

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}
