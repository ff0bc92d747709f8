//! Request correlation
//!
//! Merges the header, body and (optional) response fragments the browser
//! reports separately into one [`CompletedRequest`] per request identifier.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::models::{CompletedRequest, HeaderEntry};

pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(30);

/// Which fragments complete a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Headers and body phases complete a request
    #[default]
    RequestOnly,
    /// The response phase is awaited as well, until the entry expires
    WithResponse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResponseFragment {
    status: u16,
    body: Option<String>,
}

/// Partial view of a request, keyed by request id
#[derive(Debug, Clone)]
struct PendingFragment {
    headers: Option<Vec<HeaderEntry>>,
    method: Option<String>,
    url: Option<String>,
    body: Option<String>,
    response: Option<ResponseFragment>,
    first_seen: Instant,
}

impl PendingFragment {
    fn new(now: Instant) -> Self {
        Self {
            headers: None,
            method: None,
            url: None,
            body: None,
            response: None,
            first_seen: now,
        }
    }

    fn has_request_phases(&self) -> bool {
        self.headers.is_some() && self.method.is_some() && self.url.is_some()
    }

    fn is_complete(&self, mode: CaptureMode) -> bool {
        match mode {
            CaptureMode::RequestOnly => self.has_request_phases(),
            CaptureMode::WithResponse => self.has_request_phases() && self.response.is_some(),
        }
    }

    fn promote(self, request_id: String) -> CompletedRequest {
        let mut request = CompletedRequest::new(
            request_id,
            self.method.unwrap_or_default(),
            self.url.unwrap_or_default(),
            self.headers.unwrap_or_default(),
        );
        request.request_body = self.body;
        if let Some(response) = self.response {
            request.status = Some(response.status);
            request.response_body = response.body;
        }
        request
    }
}

/// Keyed buffer of pending fragments with TTL eviction
#[derive(Debug)]
pub struct RequestCorrelator {
    pending: HashMap<String, PendingFragment>,
    ttl: Duration,
    mode: CaptureMode,
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new(CaptureMode::default(), DEFAULT_PENDING_TTL)
    }
}

impl RequestCorrelator {
    pub fn new(mode: CaptureMode, ttl: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            ttl,
            mode,
        }
    }

    /// Number of requests still waiting for fragments
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Record the header phase of a request
    pub fn on_headers(
        &mut self,
        request_id: &str,
        headers: Vec<HeaderEntry>,
        now: Instant,
    ) -> Option<CompletedRequest> {
        self.merge(request_id, now, |fragment| fragment.headers = Some(headers))
    }

    /// Record the body phase of a request (method, URL and decoded body)
    pub fn on_body(
        &mut self,
        request_id: &str,
        method: String,
        url: String,
        body: Option<String>,
        now: Instant,
    ) -> Option<CompletedRequest> {
        self.merge(request_id, now, |fragment| {
            fragment.method = Some(method);
            fragment.url = Some(url);
            fragment.body = body;
        })
    }

    /// Record the response phase of a request
    pub fn on_response(
        &mut self,
        request_id: &str,
        status: u16,
        body: Option<String>,
        now: Instant,
    ) -> Option<CompletedRequest> {
        self.merge(request_id, now, |fragment| {
            fragment.response = Some(ResponseFragment { status, body })
        })
    }

    fn merge<F>(&mut self, request_id: &str, now: Instant, apply: F) -> Option<CompletedRequest>
    where
        F: FnOnce(&mut PendingFragment),
    {
        let fragment = self
            .pending
            .entry(request_id.to_string())
            .or_insert_with(|| PendingFragment::new(now));
        apply(fragment);

        if !fragment.is_complete(self.mode) {
            return None;
        }
        let (id, fragment) = self.pending.remove_entry(request_id)?;
        Some(fragment.promote(id))
    }

    /// Evict entries older than the TTL.
    ///
    /// In [`CaptureMode::WithResponse`] an expired entry whose request phases
    /// are complete is promoted without a response and returned; everything
    /// else that expires is dropped.
    pub fn sweep(&mut self, now: Instant) -> Vec<CompletedRequest> {
        let ttl = self.ttl;
        let mut expired: Vec<(Instant, String)> = self
            .pending
            .iter()
            .filter(|(_, fragment)| now.saturating_duration_since(fragment.first_seen) >= ttl)
            .map(|(id, fragment)| (fragment.first_seen, id.clone()))
            .collect();
        // Arrival order; ids only break ties.
        expired.sort();

        let mut salvaged = Vec::new();
        for (_, id) in expired {
            let Some(fragment) = self.pending.remove(&id) else {
                continue;
            };
            if self.mode == CaptureMode::WithResponse && fragment.has_request_phases() {
                tracing::debug!("Promoting request {} without a response", id);
                salvaged.push(fragment.promote(id));
            } else {
                tracing::debug!("Evicting orphaned fragment for request {}", id);
            }
        }
        salvaged
    }

    /// Drop every pending fragment
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!("Clearing {} pending fragments", self.pending.len());
        }
        self.pending.clear();
    }
}
