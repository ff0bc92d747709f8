//! Captured request model
//!
//! Represents a single request assembled from the platform's lifecycle events.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single request header, kept in the order the browser reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A fully correlated request
///
/// Built exactly once per request identifier and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRequest {
    /// Platform-assigned request identifier
    pub request_id: String,
    /// HTTP method as reported by the browser (e.g. "POST")
    pub method: String,
    /// Absolute request URL
    pub url: String,
    /// Request headers in arrival order
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
    /// Decoded request body (absent when missing or undecodable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    /// Response body (only in response-capturing mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    /// HTTP status code (only in response-capturing mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// When the request was promoted, milliseconds since epoch
    #[serde(default)]
    pub captured_at: i64,
}

impl CompletedRequest {
    /// Create a request record stamped with the current time
    pub fn new(
        request_id: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        headers: Vec<HeaderEntry>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            url: url.into(),
            headers,
            request_body: None,
            response_body: None,
            status: None,
            captured_at: Utc::now().timestamp_millis(),
        }
    }

    /// Request body, treating an empty string as absent
    pub fn body_text(&self) -> Option<&str> {
        self.request_body.as_deref().filter(|body| !body.is_empty())
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// UI-side list filters, persisted alongside the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewFilters {
    /// Exact method to show; empty shows every method
    #[serde(default)]
    pub method_filter: String,
    /// Case-insensitive substring searched in the URL and request body
    #[serde(default)]
    pub search_filter: String,
}

impl ViewFilters {
    /// Replace whichever fields a query supplies, keeping the rest
    pub fn with_overrides(&self, method: Option<String>, search: Option<String>) -> Self {
        Self {
            method_filter: method.unwrap_or_else(|| self.method_filter.clone()),
            search_filter: search.unwrap_or_else(|| self.search_filter.clone()),
        }
    }

    pub fn matches(&self, request: &CompletedRequest) -> bool {
        if !self.method_filter.is_empty() && request.method != self.method_filter {
            return false;
        }
        if self.search_filter.is_empty() {
            return true;
        }
        // The panel searches the URL concatenated with the JSON-encoded body.
        let body = serde_json::to_string(request.request_body.as_deref().unwrap_or(""))
            .unwrap_or_default();
        format!("{}{}", request.url, body)
            .to_lowercase()
            .contains(&self.search_filter.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(method: &str, url: &str, body: Option<&str>) -> CompletedRequest {
        let mut req = CompletedRequest::new("1", method, url, Vec::new());
        req.request_body = body.map(str::to_string);
        req
    }

    #[test]
    fn serializes_with_camel_case_and_skips_absent_fields() {
        let mut req = sample("GET", "https://api.example.com/x", None);
        req.captured_at = 42;
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["requestId"], "1");
        assert_eq!(json["capturedAt"], 42);
        assert!(json.get("requestBody").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn deserializes_records_without_optional_fields() {
        let req: CompletedRequest = serde_json::from_str(
            r#"{"requestId":"7","method":"POST","url":"https://a.example.com/"}"#,
        )
        .unwrap();
        assert!(req.headers.is_empty());
        assert_eq!(req.request_body, None);
        assert_eq!(req.captured_at, 0);
    }

    #[test]
    fn view_filters_match_method_and_search_text() {
        let req = sample("POST", "https://api.example.com/Users", Some("{\"name\":\"Ada\"}"));

        assert!(ViewFilters::default().matches(&req));
        assert!(ViewFilters {
            method_filter: "POST".into(),
            search_filter: "users".into(),
        }
        .matches(&req));
        assert!(ViewFilters {
            search_filter: "ada".into(),
            ..Default::default()
        }
        .matches(&req));
        assert!(!ViewFilters {
            method_filter: "GET".into(),
            ..Default::default()
        }
        .matches(&req));
        assert!(!ViewFilters {
            search_filter: "orders".into(),
            ..Default::default()
        }
        .matches(&req));
    }
}
