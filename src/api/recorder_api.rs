//! Recorder service
//!
//! Owns the session state and the request correlator behind one async mutex,
//! so control commands and platform events never interleave. Every session
//! mutation is written through to the state store before the lock is
//! released.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::Mutex;

use super::sink::RecorderSink;
use crate::capture::{decode_body, domain, RequestCorrelator};
use crate::config::RecorderConfig;
use crate::export::{self, ExportError, ExportFormat};
use crate::host::{export_frames, FrameError};
use crate::models::{
    CompletedRequest, InboundMessage, OutboundMessage, PlatformEvent, RecorderStatus, ViewFilters,
};
use crate::session::{Admission, SessionState};
use crate::storage::{self, SqliteStateStore, StateField, StateStore};

pub const STARTED_STATUS: &str = "recording started";

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("failed to open state store: {0:#}")]
    Storage(#[from] anyhow::Error),
    #[error("cannot derive a domain from tab URL {0}")]
    InvalidTabUrl(String),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("stop export cannot be delivered, recording kept: {0}")]
    Undeliverable(#[source] FrameError),
}

/// Result of stopping a recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Replay commands, one per captured request
    pub commands: Vec<String>,
    /// The records the commands were built from
    pub requests: Vec<CompletedRequest>,
}

struct Inner {
    session: SessionState,
    correlator: RequestCorrelator,
}

pub struct Recorder {
    inner: Mutex<Inner>,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn RecorderSink>,
    config: RecorderConfig,
}

impl Recorder {
    /// Open the SQLite store under the configured storage path and reload the
    /// persisted session.
    pub async fn open(
        config: RecorderConfig,
        sink: Arc<dyn RecorderSink>,
    ) -> Result<Self, RecorderError> {
        let path = config.ensure_storage_dir()?.to_path_buf();
        let store = tokio::task::spawn_blocking(move || SqliteStateStore::open(path))
            .await
            .map_err(|e| anyhow::anyhow!("store open task failed: {}", e))??;
        Ok(Self::with_store(config, Arc::new(store), sink).await)
    }

    pub async fn with_store(
        config: RecorderConfig,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn RecorderSink>,
    ) -> Self {
        let session = storage::load_state(Arc::clone(&store)).await;
        tracing::info!(
            "Loaded session: recording={} domain={:?} captured={}",
            session.is_recording,
            session.domain_filter,
            session.captured.len()
        );
        Self {
            inner: Mutex::new(Inner {
                session,
                correlator: RequestCorrelator::new(config.capture_mode, config.pending_ttl),
            }),
            store,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Begin (or re-arm) a recording scoped to `domain`. Returns the stored filter.
    pub async fn start(&self, domain: &str) -> String {
        let mut inner = self.inner.lock().await;
        inner.correlator.clear();
        inner.session.start(domain);
        storage::persist_fields(
            &self.store,
            &inner.session,
            &[
                StateField::IsRecording,
                StateField::DomainFilter,
                StateField::CapturedRequests,
            ],
        )
        .await;
        tracing::info!(
            "Recording started for {:?} (session {})",
            inner.session.domain_filter,
            inner
                .session
                .session_id
                .map(|id| id.to_string())
                .unwrap_or_default()
        );
        inner.session.domain_filter.clone()
    }

    /// Start recording the base domain of the given tab URL.
    ///
    /// Only `http` and `https` tabs qualify; anything else leaves the session
    /// untouched.
    pub async fn start_for_tab(&self, tab_url: &str) -> Result<String, RecorderError> {
        let host = domain::web_host_of(tab_url)
            .ok_or_else(|| RecorderError::InvalidTabUrl(tab_url.to_string()))?;
        Ok(self.start(&domain::base_domain(&host)).await)
    }

    /// Stop recording and export the capture.
    ///
    /// The replay commands are pushed to the sink and returned; only then are
    /// the in-memory and persisted lists cleared.
    pub async fn stop(&self) -> StopReport {
        let mut inner = self.inner.lock().await;
        let commands = export::to_curl_list(&inner.session.captured);
        self.finish_stop(&mut inner, commands).await
    }

    /// Like [`Recorder::stop`], but only when every replay command fits in a
    /// message of `max_frame` bytes. Otherwise the session is left as it was,
    /// still recording with its capture intact.
    pub async fn try_stop(&self, max_frame: usize) -> Result<StopReport, RecorderError> {
        let mut inner = self.inner.lock().await;
        let commands = export::to_curl_list(&inner.session.captured);
        if let Err(err) = export_frames(&commands, max_frame) {
            tracing::warn!("Keeping {} captured requests: {}", commands.len(), err);
            return Err(RecorderError::Undeliverable(err));
        }
        Ok(self.finish_stop(&mut inner, commands).await)
    }

    async fn finish_stop(&self, inner: &mut Inner, commands: Vec<String>) -> StopReport {
        inner.session.stop();
        storage::persist_fields(&self.store, &inner.session, &[StateField::IsRecording]).await;

        self.sink.push(OutboundMessage::Export {
            data: commands.clone(),
        });

        let requests = inner.session.take_captured();
        storage::remove_fields(&self.store, &[StateField::CapturedRequests]).await;
        tracing::info!("Recording stopped, exported {} requests", requests.len());
        StopReport { commands, requests }
    }

    /// Feed one platform event through the correlator.
    ///
    /// Returns the requests this event caused to be appended to the session.
    pub async fn ingest(&self, event: PlatformEvent) -> Vec<CompletedRequest> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        let mut completed = inner.correlator.sweep(now);

        if !inner.session.is_recording {
            tracing::trace!("Ignoring event for {} while idle", event.request_id());
        } else if !event.is_recordable() {
            tracing::trace!("Ignoring event for {}: resource type", event.request_id());
        } else {
            let promoted = match event {
                PlatformEvent::Headers(ev) => {
                    inner.correlator.on_headers(&ev.request_id, ev.headers, now)
                }
                PlatformEvent::Body(ev) => {
                    let body = decode_body(ev.request_body.as_ref());
                    inner
                        .correlator
                        .on_body(&ev.request_id, ev.method, ev.url, body, now)
                }
                PlatformEvent::Response(ev) => {
                    inner
                        .correlator
                        .on_response(&ev.request_id, ev.status, ev.response_body, now)
                }
            };
            completed.extend(promoted);
        }

        self.admit(&mut inner, completed).await
    }

    /// Evict expired pending fragments, admitting any salvaged requests
    pub async fn sweep(&self) -> Vec<CompletedRequest> {
        let mut inner = self.inner.lock().await;
        let salvaged = inner.correlator.sweep(Instant::now());
        self.admit(&mut inner, salvaged).await
    }

    async fn admit(
        &self,
        inner: &mut Inner,
        completed: Vec<CompletedRequest>,
    ) -> Vec<CompletedRequest> {
        let mut appended = Vec::new();
        for request in completed {
            let id = request.request_id.clone();
            match inner.session.accept(request.clone()) {
                Admission::Appended => appended.push(request),
                Admission::NotRecording => {
                    tracing::debug!("Dropping request {} completed while idle", id)
                }
                Admission::OutOfScope => {
                    tracing::debug!("Dropping request {} outside {:?}", id, inner.session.domain_filter)
                }
            }
        }
        if appended.is_empty() {
            return appended;
        }

        storage::persist_fields(&self.store, &inner.session, &[StateField::CapturedRequests])
            .await;
        for request in &appended {
            tracing::debug!("Captured {} {} ({})", request.method, request.url, request.request_id);
            self.sink.push(OutboundMessage::Update {
                data: request.clone(),
            });
        }
        appended
    }

    pub async fn status(&self) -> RecorderStatus {
        let inner = self.inner.lock().await;
        inner.session.status(inner.correlator.pending_len())
    }

    pub async fn view_filters(&self) -> ViewFilters {
        self.inner.lock().await.session.view.clone()
    }

    /// Captured requests passing `filters`
    pub async fn snapshot(&self, filters: &ViewFilters) -> Vec<CompletedRequest> {
        self.inner.lock().await.session.snapshot(filters)
    }

    pub async fn find(&self, request_id: &str) -> Option<CompletedRequest> {
        self.inner.lock().await.session.find(request_id).cloned()
    }

    pub async fn set_view_filters(&self, filters: ViewFilters) {
        let mut inner = self.inner.lock().await;
        inner.session.view = filters;
        storage::persist_fields(
            &self.store,
            &inner.session,
            &[StateField::MethodFilter, StateField::SearchFilter],
        )
        .await;
    }

    /// Render the current capture without stopping the session
    pub async fn export(&self, format: ExportFormat) -> Result<String, RecorderError> {
        let inner = self.inner.lock().await;
        Ok(export::render(format, &inner.session.captured)?)
    }

    /// Dispatch one protocol message. Platform events produce no reply.
    pub async fn handle(&self, message: InboundMessage) -> Option<OutboundMessage> {
        match message {
            InboundMessage::Start { domain } => Some(OutboundMessage::Started {
                status: STARTED_STATUS.to_string(),
                domain: self.start(&domain).await,
            }),
            InboundMessage::StartForTab { tab_url } => Some(match self.start_for_tab(&tab_url).await {
                Ok(domain) => OutboundMessage::Started {
                    status: STARTED_STATUS.to_string(),
                    domain,
                },
                Err(err) => OutboundMessage::error(err.to_string()),
            }),
            InboundMessage::Stop => Some(match self.try_stop(self.config.max_export_frame).await {
                Ok(report) => OutboundMessage::Export {
                    data: report.commands,
                },
                Err(err) => OutboundMessage::error(err.to_string()),
            }),
            InboundMessage::Status => Some(OutboundMessage::Status(self.status().await)),
            InboundMessage::Snapshot {
                method_filter,
                search_filter,
            } => {
                let filters = self
                    .view_filters()
                    .await
                    .with_overrides(method_filter, search_filter);
                Some(OutboundMessage::Requests {
                    data: self.snapshot(&filters).await,
                })
            }
            InboundMessage::SetViewFilters {
                method_filter,
                search_filter,
            } => {
                self.set_view_filters(ViewFilters {
                    method_filter,
                    search_filter,
                })
                .await;
                Some(OutboundMessage::Status(self.status().await))
            }
            InboundMessage::Export { format } => Some(match self.export(format).await {
                Ok(content) => OutboundMessage::Document {
                    format,
                    file_name: format.file_name().to_string(),
                    content,
                },
                Err(err) => OutboundMessage::error(err.to_string()),
            }),
            InboundMessage::HeadersObserved(ev) => {
                self.ingest(PlatformEvent::Headers(ev)).await;
                None
            }
            InboundMessage::BodyObserved(ev) => {
                self.ingest(PlatformEvent::Body(ev)).await;
                None
            }
            InboundMessage::ResponseFinished(ev) => {
                self.ingest(PlatformEvent::Response(ev)).await;
                None
            }
        }
    }
}
