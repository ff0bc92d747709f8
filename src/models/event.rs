//! Platform lifecycle events
//!
//! The browser reports each request through independent callbacks. These
//! types mirror the payloads the extension forwards for each of them.

use serde::{Deserialize, Serialize};

use super::HeaderEntry;

/// Resource type reported by the browser for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    XmlHttpRequest,
    Fetch,
    Other(String),
}

impl ResourceType {
    /// Only XHR and fetch traffic is ever recorded
    pub fn is_recordable(&self) -> bool {
        matches!(self, ResourceType::XmlHttpRequest | ResourceType::Fetch)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::XmlHttpRequest => "xmlhttprequest",
            ResourceType::Fetch => "fetch",
            ResourceType::Other(other) => other,
        }
    }
}

impl From<String> for ResourceType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "xmlhttprequest" | "xhr" => ResourceType::XmlHttpRequest,
            "fetch" => ResourceType::Fetch,
            _ => ResourceType::Other(value),
        }
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        value.as_str().to_string()
    }
}

/// One chunk of a raw request body, base64 encoded on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBodyPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<String>,
}

/// Request body as reported by the body-phase callback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBodyPayload {
    #[serde(default)]
    pub raw: Vec<RawBodyPart>,
}

/// Header-phase event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadersObserved {
    pub request_id: String,
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
}

/// Body-phase event carrying method, URL and the raw body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyObserved {
    pub request_id: String,
    pub method: String,
    pub url: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyPayload>,
}

/// Response-phase event (only delivered by the response-capturing variant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFinished {
    pub request_id: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
}

/// Any event delivered by the host platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Headers(HeadersObserved),
    Body(BodyObserved),
    Response(ResponseFinished),
}

impl PlatformEvent {
    pub fn request_id(&self) -> &str {
        match self {
            PlatformEvent::Headers(ev) => &ev.request_id,
            PlatformEvent::Body(ev) => &ev.request_id,
            PlatformEvent::Response(ev) => &ev.request_id,
        }
    }

    /// Whether this event belongs to an allow-listed request kind.
    /// Header and response events without a reported type are accepted.
    pub fn is_recordable(&self) -> bool {
        match self {
            PlatformEvent::Headers(ev) => ev
                .resource_type
                .as_ref()
                .map_or(true, ResourceType::is_recordable),
            PlatformEvent::Body(ev) => ev.resource_type.is_recordable(),
            PlatformEvent::Response(_) => true,
        }
    }
}
