//! Recording session state
//!
//! Holds the recording flag, the active domain filter and the captured
//! requests. Transitions here are pure; the recorder service persists the
//! fields each transition touches.

use uuid::Uuid;

use crate::capture::domain;
use crate::models::{CompletedRequest, RecorderStatus, ViewFilters};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub is_recording: bool,
    pub domain_filter: String,
    pub captured: Vec<CompletedRequest>,
    pub view: ViewFilters,
    /// Identifier of the current recording, for log correlation only
    pub session_id: Option<Uuid>,
}

/// Outcome of offering a completed request to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Appended,
    NotRecording,
    OutOfScope,
}

impl SessionState {
    /// Idle -> Recording. Also re-arms a session that is already recording.
    pub fn start(&mut self, domain: &str) {
        self.is_recording = true;
        self.domain_filter = domain.to_string();
        self.captured.clear();
        self.session_id = Some(Uuid::new_v4());
    }

    /// Recording -> Idle. The captured list stays until it has been exported.
    pub fn stop(&mut self) {
        self.is_recording = false;
    }

    /// Append a completed request if recording and in scope
    pub fn accept(&mut self, request: CompletedRequest) -> Admission {
        if !self.is_recording {
            return Admission::NotRecording;
        }
        if !domain::url_matches(&request.url, &self.domain_filter) {
            return Admission::OutOfScope;
        }
        self.captured.push(request);
        Admission::Appended
    }

    /// Remove and return every captured request
    pub fn take_captured(&mut self) -> Vec<CompletedRequest> {
        std::mem::take(&mut self.captured)
    }

    pub fn find(&self, request_id: &str) -> Option<&CompletedRequest> {
        self.captured.iter().find(|req| req.request_id == request_id)
    }

    /// Captured requests that pass the given view filters
    pub fn snapshot(&self, filters: &ViewFilters) -> Vec<CompletedRequest> {
        self.captured
            .iter()
            .filter(|req| filters.matches(req))
            .cloned()
            .collect()
    }

    pub fn status(&self, pending_count: usize) -> RecorderStatus {
        RecorderStatus {
            is_recording: self.is_recording,
            domain_filter: self.domain_filter.clone(),
            captured_count: self.captured.len(),
            pending_count,
            method_filter: self.view.method_filter.clone(),
            search_filter: self.view.search_filter.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, url: &str) -> CompletedRequest {
        CompletedRequest::new(id, "GET", url, Vec::new())
    }

    #[test]
    fn starts_idle() {
        let state = SessionState::default();
        assert!(!state.is_recording);
        assert!(state.domain_filter.is_empty());
        assert!(state.captured.is_empty());
    }

    #[test]
    fn start_resets_list_and_sets_filter() {
        let mut state = SessionState {
            captured: vec![request("old", "https://example.com")],
            ..Default::default()
        };
        state.start("example.com");
        assert!(state.is_recording);
        assert_eq!(state.domain_filter, "example.com");
        assert!(state.captured.is_empty());
        assert!(state.session_id.is_some());
    }

    #[test]
    fn filter_is_stored_as_given() {
        let mut state = SessionState::default();
        state.start("Shop.Example.com");
        assert_eq!(state.domain_filter, "Shop.Example.com");
        assert_eq!(
            state.accept(request("1", "https://shop.example.com/cart")),
            Admission::OutOfScope
        );
    }

    #[test]
    fn idle_session_discards_requests() {
        let mut state = SessionState::default();
        assert_eq!(
            state.accept(request("1", "https://api.example.com/x")),
            Admission::NotRecording
        );
        assert!(state.captured.is_empty());
    }

    #[test]
    fn recording_session_filters_by_domain() {
        let mut state = SessionState::default();
        state.start("example.com");

        assert_eq!(
            state.accept(request("1", "https://api.example.com/x")),
            Admission::Appended
        );
        assert_eq!(
            state.accept(request("2", "https://tracker.net/pixel")),
            Admission::OutOfScope
        );
        assert_eq!(
            state.accept(request("3", "definitely not a url")),
            Admission::OutOfScope
        );
        assert_eq!(state.captured.len(), 1);
        assert!(state.find("1").is_some());
        assert!(state.find("2").is_none());
    }

    #[test]
    fn stop_keeps_list_until_taken() {
        let mut state = SessionState::default();
        state.start("example.com");
        state.accept(request("1", "https://example.com/a"));
        state.stop();

        assert!(!state.is_recording);
        assert_eq!(state.captured.len(), 1);
        let drained = state.take_captured();
        assert_eq!(drained.len(), 1);
        assert!(state.captured.is_empty());
    }

    #[test]
    fn status_reflects_state() {
        let mut state = SessionState::default();
        state.start("example.com");
        state.accept(request("1", "https://example.com/a"));
        state.view.method_filter = "GET".into();

        let status = state.status(3);
        assert!(status.is_recording);
        assert_eq!(status.captured_count, 1);
        assert_eq!(status.pending_count, 3);
        assert_eq!(status.method_filter, "GET");
    }
}
