//! Session persistence
//!
//! A small key-value store holds the session fields as JSON values. Every
//! session mutation is written through; a failed write is logged and the
//! in-memory state stays authoritative.

mod memory_store;
mod sqlite_store;

pub use memory_store::MemoryStateStore;
pub use sqlite_store::SqliteStateStore;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::models::{CompletedRequest, ViewFilters};
use crate::session::SessionState;

/// Synchronous key-value storage for JSON values
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;
    fn set_many(&self, entries: &[(String, Value)]) -> anyhow::Result<()>;
    fn remove(&self, keys: &[String]) -> anyhow::Result<()>;
}

/// Persisted session fields and their storage keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    IsRecording,
    DomainFilter,
    CapturedRequests,
    MethodFilter,
    SearchFilter,
}

impl StateField {
    pub const ALL: [StateField; 5] = [
        StateField::IsRecording,
        StateField::DomainFilter,
        StateField::CapturedRequests,
        StateField::MethodFilter,
        StateField::SearchFilter,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StateField::IsRecording => "isRecording",
            StateField::DomainFilter => "domainFilter",
            StateField::CapturedRequests => "capturedRequests",
            StateField::MethodFilter => "methodFilter",
            StateField::SearchFilter => "searchFilter",
        }
    }

    fn value_of(self, state: &SessionState) -> serde_json::Result<Value> {
        match self {
            StateField::IsRecording => Ok(Value::Bool(state.is_recording)),
            StateField::DomainFilter => Ok(Value::String(state.domain_filter.clone())),
            StateField::CapturedRequests => serde_json::to_value(&state.captured),
            StateField::MethodFilter => Ok(Value::String(state.view.method_filter.clone())),
            StateField::SearchFilter => Ok(Value::String(state.view.search_filter.clone())),
        }
    }
}

fn read_field<T: DeserializeOwned + Default>(store: &dyn StateStore, field: StateField) -> T {
    match store.get(field.key()) {
        Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|err| {
            tracing::warn!("Ignoring unreadable {} entry: {}", field.key(), err);
            T::default()
        }),
        Ok(None) => T::default(),
        Err(err) => {
            tracing::warn!("Failed to read {}: {:#}", field.key(), err);
            T::default()
        }
    }
}

/// Rebuild the session from the store. Missing or unreadable entries fall
/// back to their defaults.
pub fn load_state_blocking(store: &dyn StateStore) -> SessionState {
    let captured: Vec<CompletedRequest> = read_field(store, StateField::CapturedRequests);
    SessionState {
        is_recording: read_field(store, StateField::IsRecording),
        domain_filter: read_field(store, StateField::DomainFilter),
        captured,
        view: ViewFilters {
            method_filter: read_field(store, StateField::MethodFilter),
            search_filter: read_field(store, StateField::SearchFilter),
        },
        session_id: None,
    }
}

pub async fn load_state(store: Arc<dyn StateStore>) -> SessionState {
    match tokio::task::spawn_blocking(move || load_state_blocking(store.as_ref())).await {
        Ok(state) => state,
        Err(err) => {
            tracing::warn!("State load task failed: {}", err);
            SessionState::default()
        }
    }
}

/// Write the given fields of `state` through to the store
pub async fn persist_fields(store: &Arc<dyn StateStore>, state: &SessionState, fields: &[StateField]) {
    let mut entries = Vec::with_capacity(fields.len());
    for field in fields {
        match field.value_of(state) {
            Ok(value) => entries.push((field.key().to_string(), value)),
            Err(err) => tracing::warn!("Failed to encode {}: {}", field.key(), err),
        }
    }
    if entries.is_empty() {
        return;
    }

    let store = Arc::clone(store);
    let result = tokio::task::spawn_blocking(move || store.set_many(&entries)).await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!("Failed to persist session state: {:#}", err),
        Err(err) => tracing::warn!("Persist task failed: {}", err),
    }
}

/// Remove the given fields from the store
pub async fn remove_fields(store: &Arc<dyn StateStore>, fields: &[StateField]) {
    let keys: Vec<String> = fields.iter().map(|f| f.key().to_string()).collect();
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.remove(&keys)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!("Failed to remove session state: {:#}", err),
        Err(err) => tracing::warn!("Remove task failed: {}", err),
    }
}
