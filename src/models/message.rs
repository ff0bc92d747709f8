//! Message protocol between the extension and the recorder
//!
//! Every message is a JSON object tagged by its `action` field.

use serde::{Deserialize, Serialize};

use super::{BodyObserved, CompletedRequest, HeadersObserved, ResponseFinished};
use crate::export::ExportFormat;

/// Messages accepted by the recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Begin recording traffic for a domain suffix
    Start { domain: String },
    /// Begin recording using the base domain of the active tab
    StartForTab {
        #[serde(rename = "tabUrl")]
        tab_url: String,
    },
    /// Stop recording and export replay commands
    Stop,
    /// Query the current session status
    Status,
    /// Query captured requests, optionally narrowed by view filters
    Snapshot {
        #[serde(rename = "methodFilter", default)]
        method_filter: Option<String>,
        #[serde(rename = "searchFilter", default)]
        search_filter: Option<String>,
    },
    /// Persist the UI's list filters
    SetViewFilters {
        #[serde(rename = "methodFilter", default)]
        method_filter: String,
        #[serde(rename = "searchFilter", default)]
        search_filter: String,
    },
    /// Render the current capture without stopping
    Export { format: ExportFormat },
    HeadersObserved(HeadersObserved),
    BodyObserved(BodyObserved),
    ResponseFinished(ResponseFinished),
}

/// Session status reported to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderStatus {
    pub is_recording: bool,
    pub domain_filter: String,
    pub captured_count: usize,
    pub pending_count: usize,
    pub method_filter: String,
    pub search_filter: String,
}

/// Messages emitted by the recorder, as replies or pushes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundMessage {
    Started {
        status: String,
        domain: String,
    },
    /// Replay commands produced when recording stops
    Export {
        data: Vec<String>,
    },
    /// A newly captured request
    Update {
        data: CompletedRequest,
    },
    Status(RecorderStatus),
    Requests {
        data: Vec<CompletedRequest>,
    },
    /// A rendered export document
    Document {
        format: ExportFormat,
        #[serde(rename = "fileName")]
        file_name: String,
        content: String,
    },
    Error {
        message: String,
    },
}

impl OutboundMessage {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundMessage::Error {
            message: message.into(),
        }
    }
}
