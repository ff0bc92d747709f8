//! Request replay
//!
//! Reissues captured requests with `reqwest` and reports whether the server
//! answered with a 2xx status, the same check the generated test scripts make.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::{CompletedRequest, HeaderEntry};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Headers the HTTP client computes itself
const SKIPPED_HEADERS: [&str; 3] = ["host", "content-length", "transfer-encoding"];

/// Overrides applied to a replayed request
#[derive(Debug, Clone, Default)]
pub struct ReplayParams {
    /// Override the HTTP method
    pub method: Option<String>,
    /// Override the full URL
    pub url: Option<String>,
    /// Override specific headers (merged with original, case-insensitive)
    pub headers: Option<HashMap<String, String>>,
    /// Override the request body
    pub body: Option<String>,
    /// Allow invalid TLS certificates (defaults to false)
    pub accept_invalid_certs: bool,
    /// Request timeout (defaults to 30 seconds)
    pub timeout: Option<Duration>,
}

/// Result of a replay operation
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayResult {
    /// Identifier of the captured request that was replayed
    pub request_id: String,
    /// HTTP status code of the response
    pub status_code: Option<u16>,
    /// Whether the server answered with a 2xx status
    pub success: bool,
    pub response_body: Option<String>,
    /// Error message if the request could not be sent
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Headers to send: originals in order, overrides applied, client-managed ones removed
pub fn replay_headers(
    request: &CompletedRequest,
    overrides: Option<&HashMap<String, String>>,
) -> Vec<HeaderEntry> {
    let mut headers = request.headers.clone();
    if let Some(overrides) = overrides {
        for (name, value) in overrides {
            match headers
                .iter_mut()
                .find(|h| h.name.eq_ignore_ascii_case(name))
            {
                Some(existing) => existing.value = value.clone(),
                None => headers.push(HeaderEntry::new(name.clone(), value.clone())),
            }
        }
    }
    headers.retain(|h| {
        !SKIPPED_HEADERS
            .iter()
            .any(|skip| h.name.eq_ignore_ascii_case(skip))
    });
    headers
}

/// Replay a captured request
pub async fn replay_request(
    request: &CompletedRequest,
    params: ReplayParams,
) -> Result<ReplayResult, String> {
    let headers = replay_headers(request, params.headers.as_ref());
    let ReplayParams {
        method,
        url,
        body,
        accept_invalid_certs,
        timeout,
        ..
    } = params;

    let method = method.unwrap_or_else(|| request.method.clone());
    let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| format!("Invalid HTTP method {}: {}", method, e))?;
    let url = url.unwrap_or_else(|| request.url.clone());
    let body = body.or_else(|| request.body_text().map(str::to_string));

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    let mut request_builder = client.request(method, &url);
    for header in &headers {
        if let Ok(name) = reqwest::header::HeaderName::try_from(header.name.as_str()) {
            if let Ok(value) = reqwest::header::HeaderValue::from_str(&header.value) {
                request_builder = request_builder.header(name, value);
            }
        }
    }
    if let Some(body) = body {
        request_builder = request_builder.body(body);
    }

    let started = Instant::now();
    match request_builder.send().await {
        Ok(response) => {
            let status = response.status();
            let response_body = response.text().await.ok().filter(|b| !b.is_empty());
            let duration_ms = started.elapsed().as_millis() as u64;
            tracing::debug!("Replayed {} -> {} in {}ms", request.request_id, status, duration_ms);
            Ok(ReplayResult {
                request_id: request.request_id.clone(),
                status_code: Some(status.as_u16()),
                success: status.is_success(),
                response_body,
                error: None,
                duration_ms,
            })
        }
        Err(e) => {
            tracing::warn!("Replay of {} failed: {}", request.request_id, e);
            Ok(ReplayResult {
                request_id: request.request_id.clone(),
                status_code: None,
                success: false,
                response_body: None,
                error: Some(e.to_string()),
                duration_ms: started.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Replay every request in order
pub async fn replay_all(requests: &[CompletedRequest], params: ReplayParams) -> Vec<ReplayResult> {
    let mut results = Vec::with_capacity(requests.len());
    for request in requests {
        match replay_request(request, params.clone()).await {
            Ok(result) => results.push(result),
            Err(error) => results.push(ReplayResult {
                request_id: request.request_id.clone(),
                status_code: None,
                success: false,
                response_body: None,
                error: Some(error),
                duration_ms: 0,
            }),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response and hand back the raw request head
    async fn one_shot_server(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    #[test]
    fn client_managed_headers_are_dropped() {
        let req = CompletedRequest::new(
            "1",
            "POST",
            "https://example.com",
            vec![
                HeaderEntry::new("Host", "example.com"),
                HeaderEntry::new("Content-Length", "10"),
                HeaderEntry::new("Transfer-Encoding", "chunked"),
                HeaderEntry::new("Accept", "*/*"),
            ],
        );
        let mut overrides = HashMap::new();
        overrides.insert("accept".to_string(), "application/json".to_string());
        overrides.insert("X-Extra".to_string(), "1".to_string());

        let headers = replay_headers(&req, Some(&overrides));
        assert_eq!(headers[0], HeaderEntry::new("Accept", "application/json"));
        assert!(headers.iter().any(|h| h.name == "X-Extra"));
        assert_eq!(headers.len(), 2);
    }

    #[tokio::test]
    async fn successful_replay_reports_2xx() {
        let (base, server) = one_shot_server(
            "HTTP/1.1 201 Created\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        )
        .await;
        let mut req = CompletedRequest::new(
            "42",
            "POST",
            format!("{}/items", base),
            vec![
                HeaderEntry::new("X-Trace", "abc"),
                HeaderEntry::new("Content-Length", "999"),
            ],
        );
        req.request_body = Some("{}".into());

        let result = replay_request(&req, ReplayParams::default()).await.unwrap();
        assert_eq!(result.request_id, "42");
        assert_eq!(result.status_code, Some(201));
        assert!(result.success);
        assert_eq!(result.response_body.as_deref(), Some("ok"));

        let head = server.await.unwrap().to_lowercase();
        assert!(head.starts_with("post /items"));
        assert!(head.contains("x-trace: abc"));
        assert!(!head.contains("content-length: 999"));
    }

    #[tokio::test]
    async fn non_2xx_is_not_a_success() {
        let (base, _server) = one_shot_server(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let req = CompletedRequest::new("1", "GET", format!("{}/x", base), Vec::new());
        let result = replay_request(&req, ReplayParams::default()).await.unwrap();
        assert_eq!(result.status_code, Some(500));
        assert!(!result.success);
        assert_eq!(result.response_body, None);
    }

    #[tokio::test]
    async fn unreachable_host_is_reported_not_raised() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let req = CompletedRequest::new("1", "GET", format!("http://127.0.0.1:{}/", port), Vec::new());
        let results = replay_all(
            &[req],
            ReplayParams {
                timeout: Some(Duration::from_secs(2)),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert!(results[0].error.is_some());
    }

    #[tokio::test]
    async fn invalid_method_override_is_an_error() {
        let req = CompletedRequest::new("1", "GET", "http://127.0.0.1:1/", Vec::new());
        let err = replay_request(
            &req,
            ReplayParams {
                method: Some("BAD METHOD".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(err.contains("Invalid HTTP method"));
    }
}
