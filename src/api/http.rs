//! HTTP transport for the management REST API

use super::error::{RemoteErrorPayload, TransportError};
use super::locator::is_dot_segment;
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header carrying API keys
const API_KEY_HEADER: &str = "X-API-Key";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// How requests authenticate against the API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    Anonymous,
    /// Access token sent in the `X-API-Key` header
    ApiKey(String),
    /// JWT sent as a bearer token
    Bearer(String),
}

/// HTTP client wrapper shared by every resource accessor
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

impl HttpClient {
    /// Create a new HTTP client for the API rooted at `base_url`
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url).map_err(|source| TransportError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;

        let mut builder = Client::builder().user_agent(format!("portica/{}", crate::VERSION));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|source| TransportError::Request {
            url: base_url.to_string(),
            source,
        })?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an API path against the base URL, keeping the base path prefix
    ///
    /// Paths holding a `.` or `..` segment are rejected, since parsing would
    /// resolve them to another resource.
    pub fn resolve(&self, path: &str) -> Result<Url, TransportError> {
        if let Some(segment) = path.split('/').find(|segment| is_dot_segment(segment)) {
            return Err(TransportError::InvalidRequest(format!(
                "path {} contains the relative segment '{}'",
                path, segment
            )));
        }

        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|source| TransportError::InvalidUrl {
            url: joined,
            source,
        })
    }

    /// Make a GET request
    pub async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        self.send(Method::GET, path, query, None::<&()>).await
    }

    /// Make a POST request with an optional JSON body
    pub async fn post<B, T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, query, body).await
    }

    /// Make a PUT request with an optional JSON body
    pub async fn put<B, T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, query, body).await
    }

    /// Make a DELETE request
    pub async fn delete<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        self.send(Method::DELETE, path, query, None::<&()>).await
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::Anonymous => request,
            Credentials::ApiKey(key) => request.header(API_KEY_HEADER, key),
            Credentials::Bearer(token) => request.bearer_auth(token),
        }
    }

    async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resolve(path)?;
        tracing::debug!("{} {}", method, url);

        let mut request = self.authorize(self.client.request(method, url.clone()));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
            return Err(TransportError::Status {
                url: url.to_string(),
                status,
                payload: RemoteErrorPayload::parse(&text),
            });
        }

        // Empty bodies decode as `null` so `()` and `Option<T>` responses work
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };

        serde_json::from_str(text).map_err(|source| TransportError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpClient {
        HttpClient::new(base, Credentials::Anonymous, None).unwrap()
    }

    #[test]
    fn test_resolve_keeps_base_path() {
        let http = client("http://localhost:9000/api");
        let url = http.resolve("/stacks/7").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/stacks/7");
    }

    #[test]
    fn test_resolve_with_trailing_slash() {
        let http = client("http://localhost:9000/api/");
        let url = http.resolve("endpoints").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/endpoints");
    }

    #[test]
    fn test_resolve_rejects_dot_segments() {
        let http = client("http://localhost:9000/api");
        for path in ["/docker/volumes/..", "/stacks/./start", "/jobs/%2E%2e", "../endpoints"] {
            let err = http.resolve(path).unwrap_err();
            assert!(matches!(err, TransportError::InvalidRequest(_)), "{}", path);
        }
        assert!(http.resolve("/docker/volumes/...").is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpClient::new("not a url", Credentials::Anonymous, None).unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.ends_with("... [truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_handles_multibyte_boundary() {
        let body = format!("{}é{}", "a".repeat(MAX_LOG_BODY_LENGTH - 1), "b".repeat(10));
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated"));
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }
}
