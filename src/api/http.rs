//! HTTP transport for fediverse REST API calls

use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let char_count = body.chars().count();
    let truncated = if char_count > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Prefix a bare hostname with `https://`, leaving explicit schemes alone
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Whether two URLs share scheme, host and port
pub(crate) fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// A completed HTTP exchange: status, headers and the raw body
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decode the body as JSON
    pub fn json(&self) -> Result<Value> {
        serde_json::from_slice(&self.body).map_err(|e| Error::malformed("response body is not valid JSON", e))
    }

    /// Every `Link` header value that is valid visible ASCII
    pub fn links(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(LINK)
            .iter()
            .filter_map(|value| value.to_str().ok())
    }
}

/// HTTP client wrapper bound to one API base endpoint
///
/// The bearer credential is only attached to requests that stay on the
/// origin of the base endpoint, so lookups against other instances go out
/// anonymously.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client for `base`, which must end with a `/`
    pub fn new(base: Url, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("fedi-rest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve a request key against the base endpoint.
    /// Absolute URLs are returned unchanged.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::configuration(format!("invalid request path {path:?}: {e}")))
    }

    fn authorize(&self, url: &Url, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) if same_origin(url, &self.base) => request.bearer_auth(token),
            _ => request,
        }
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<HttpResponse> {
        let url = self.url_for(path)?;
        tracing::debug!("GET {}", url);

        let request = self.authorize(&url, self.client.get(url.clone()));
        self.execute(request).await
    }

    /// Make a POST request with a JSON body
    pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<HttpResponse>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url_for(path)?;
        tracing::debug!("POST {}", url);

        let request = self.authorize(&url, self.client.post(url.clone()).json(body));
        self.execute(request).await
    }

    /// Make a form-encoded POST request, optionally with HTTP Basic credentials
    /// in place of the bearer token
    pub async fn post_form<F>(
        &self,
        path: &str,
        form: &F,
        basic: Option<(&str, &str)>,
    ) -> Result<HttpResponse>
    where
        F: Serialize + ?Sized,
    {
        let url = self.url_for(path)?;
        tracing::debug!("POST {} (form)", url);

        let request = self.client.post(url.clone()).form(form);
        let request = match basic {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => self.authorize(&url, request),
        };
        self.execute(request).await
    }

    async fn execute(&self, request: RequestBuilder) -> Result<HttpResponse> {
        let response = request.send().await.map_err(Error::transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(Error::transport)?;

        if !status.is_success() {
            // Only log a sanitized, truncated body
            tracing::warn!(
                "API error: {} - {}",
                status,
                sanitize_for_log(&String::from_utf8_lossy(&body))
            );
        }

        Ok(HttpResponse::new(status, headers, body.to_vec()))
    }
}

/// Format a library error for display to an end user
pub fn describe_error(error: &Error) -> String {
    match error {
        Error::Resolution {
            status: Some(status),
            ..
        } => match *status {
            401 => "Authentication failed. Check your access token.".to_string(),
            403 => "Permission denied. The token lacks the required scope.".to_string(),
            404 => "Resource not found.".to_string(),
            422 => "The server refused the request parameters.".to_string(),
            429 => "Rate limit exceeded. Please try again later.".to_string(),
            500..=599 => "The instance is temporarily unavailable. Please try again.".to_string(),
            other => format!("Request failed with HTTP {}.", other),
        },
        Error::Resolution { .. } => {
            "Request failed. Check your network connection and try again.".to_string()
        }
        Error::Configuration(message) => message.clone(),
        Error::InvalidPayload { .. } => {
            let sanitized: String = error
                .to_string()
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(80)
                .collect();
            sanitized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("[truncated, 500 bytes total]"));
        assert!(sanitized.len() < 300);
    }

    #[test]
    fn test_sanitize_handles_multibyte_boundary() {
        let body = "é".repeat(300);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated"));
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("mastodon.social"), "https://mastodon.social");
        assert_eq!(normalize_host("http://localhost:3000/"), "http://localhost:3000");
        assert_eq!(normalize_host(" https://example.org "), "https://example.org");
    }

    #[test]
    fn test_same_origin_uses_default_ports() {
        let a = Url::parse("https://example.org/api/v1/").unwrap();
        let b = Url::parse("https://example.org:443/other").unwrap();
        let c = Url::parse("https://other.org/api/v1/").unwrap();
        let d = Url::parse("http://example.org/api/v1/").unwrap();
        assert!(same_origin(&a, &b));
        assert!(!same_origin(&a, &c));
        assert!(!same_origin(&a, &d));
    }

    #[test]
    fn test_url_for_joins_relative_and_keeps_absolute() {
        let client =
            HttpClient::new(Url::parse("https://example.org/api/v1/").unwrap(), None).unwrap();
        assert_eq!(
            client.url_for("accounts/1").unwrap().as_str(),
            "https://example.org/api/v1/accounts/1"
        );
        assert_eq!(
            client
                .url_for("https://remote.example/api/v1/instance")
                .unwrap()
                .as_str(),
            "https://remote.example/api/v1/instance"
        );
    }

    #[test]
    fn test_response_links_and_json() {
        let mut headers = HeaderMap::new();
        headers.append(LINK, HeaderValue::from_static("<https://a/next>; rel=\"next\""));
        headers.append(LINK, HeaderValue::from_static("<https://a/prev>; rel=\"prev\""));
        let response = HttpResponse::new(StatusCode::OK, headers, br#"[1,2]"#.to_vec());

        assert_eq!(response.links().count(), 2);
        assert_eq!(response.json().unwrap(), serde_json::json!([1, 2]));
    }

    #[test]
    fn test_response_json_rejects_garbage() {
        let response = HttpResponse::new(StatusCode::OK, HeaderMap::new(), b"<html>".to_vec());
        assert!(response.json().unwrap_err().is_invalid_payload());
    }

    #[test]
    fn test_describe_error_by_status() {
        let err = Error::rejected(StatusCode::UNAUTHORIZED);
        assert!(describe_error(&err).contains("access token"));
        let err = Error::rejected(StatusCode::SERVICE_UNAVAILABLE);
        assert!(describe_error(&err).contains("temporarily unavailable"));
        let err = Error::no_client();
        assert!(describe_error(&err).contains("no client attached"));
    }
}
