//! MCP server implementation using the official rmcp SDK.
//!
//! Exposes the persisted recording session to MCP clients. The server never
//! owns the session: every call reads the state the native host last wrote
//! to the shared store.

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use rmcp::handler::server::tool::{ToolCallContext, ToolRouter};
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::*;
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::export::{self, ExportError, ExportFormat};
use crate::models::CompletedRequest;
use crate::replay::{self, ReplayParams};
use crate::session::SessionState;
use crate::storage::{self, SqliteStateStore, StateStore};

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 500;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the MCP server runtime.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    pub storage_path: PathBuf,
    /// Allow tools that send network traffic
    pub allow_writes: bool,
}

impl McpServerConfig {
    pub fn ensure_storage_dir(&self) -> std::io::Result<()> {
        if !self.storage_path.exists() {
            std::fs::create_dir_all(&self.storage_path)?;
        }
        Ok(())
    }
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            storage_path: crate::config::default_storage_path(),
            allow_writes: false,
        }
    }
}

// ============================================================================
// Tool Parameter Types
// ============================================================================

/// Parameters for listing captured requests
#[derive(Debug, Clone, Deserialize, JsonSchema, Default)]
pub struct RequestsListParams {
    /// Only show this HTTP method (e.g., "POST"). Defaults to the saved view filter.
    #[serde(default)]
    pub method: Option<String>,
    /// Case-insensitive text searched in the URL and request body
    #[serde(default)]
    pub search: Option<String>,
    /// Maximum number of results (default 100, max 500)
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Parameters for fetching a request by ID
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RequestDetailParams {
    /// Request ID to fetch
    pub id: String,
}

/// Parameters for rendering an export document
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExportDocumentParams {
    /// One of "curl", "collection" (Postman) or "test_script" (Playwright)
    pub format: String,
    /// Optional file path; when given the document is written there
    #[serde(default)]
    pub path: Option<String>,
}

/// Parameters for replaying a request
#[derive(Debug, Clone, Deserialize, JsonSchema, Default)]
pub struct ReplayRequestParams {
    /// Request ID to replay
    pub id: String,
    /// Optional: Override the HTTP method
    #[serde(default)]
    pub method: Option<String>,
    /// Optional: Override the full URL
    #[serde(default)]
    pub url: Option<String>,
    /// Optional: Override headers (JSON object)
    #[serde(default)]
    pub headers: Option<std::collections::HashMap<String, String>>,
    /// Optional: Override request body
    #[serde(default)]
    pub body: Option<String>,
    /// Optional: Allow invalid TLS certificates (default: false)
    #[serde(default)]
    pub allow_insecure_tls: bool,
}

// ============================================================================
// Response Types
// ============================================================================

/// Response from recording_status tool
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatusResponse {
    pub is_recording: bool,
    /// Domain suffix being recorded; empty records every host
    pub domain_filter: String,
    pub captured_count: usize,
    pub method_filter: String,
    pub search_filter: String,
    pub storage_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestSummary<'a> {
    request_id: &'a str,
    method: &'a str,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    has_body: bool,
    captured_at: i64,
}

impl<'a> From<&'a CompletedRequest> for RequestSummary<'a> {
    fn from(req: &'a CompletedRequest) -> Self {
        Self {
            request_id: &req.request_id,
            method: &req.method,
            url: &req.url,
            status: req.status,
            has_body: req.body_text().is_some(),
            captured_at: req.captured_at,
        }
    }
}

// ============================================================================
// Server Handler
// ============================================================================

/// API recorder MCP server: read access to the recorded session.
#[derive(Clone)]
pub struct RecorderMcpServer {
    config: Arc<McpServerConfig>,
    store: Arc<OnceCell<Arc<dyn StateStore>>>,
    tool_router: ToolRouter<Self>,
}

impl RecorderMcpServer {
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(OnceCell::new()),
            tool_router: Self::tool_router(),
        }
    }

    /// Build a server over an already-open store
    pub fn with_store(config: McpServerConfig, store: Arc<dyn StateStore>) -> Self {
        let server = Self::new(config);
        let _ = server.store.set(store);
        server
    }

    /// Open the shared state store.
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        if self.store.get().is_some() {
            return Ok(());
        }
        self.config.ensure_storage_dir()?;
        let path = self.config.storage_path.clone();
        let store = tokio::task::spawn_blocking(move || SqliteStateStore::open(path)).await??;
        let _ = self.store.set(Arc::new(store));
        tracing::info!(
            "API recorder MCP server ready (storage: {})",
            self.config.storage_path.display()
        );
        Ok(())
    }

    fn ensure_write_allowed(&self, action: &str) -> Result<(), McpError> {
        if !self.config.allow_writes {
            let msg = format!(
                "Action '{}' sends network traffic. Restart the server with --allow-writes to enable it.",
                action
            );
            return Err(McpError::invalid_request(msg, None));
        }
        Ok(())
    }

    async fn load_session(&self) -> Result<SessionState, McpError> {
        let store = self.store.get().cloned().ok_or_else(|| {
            McpError::internal_error("State store is not initialized", None)
        })?;
        Ok(storage::load_state(store).await)
    }

    async fn find_request(&self, id: &str) -> Result<CompletedRequest, McpError> {
        let session = self.load_session().await?;
        session
            .find(id)
            .cloned()
            .ok_or_else(|| McpError::invalid_params(format!("Request not found: {id}"), None))
    }
}

fn export_error(err: ExportError) -> McpError {
    match err {
        ExportError::NothingToExport | ExportError::UnknownFormat(_) => {
            McpError::invalid_params(err.to_string(), None)
        }
        other => McpError::internal_error(format!("Export failed: {other}"), None),
    }
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl RecorderMcpServer {
    #[tool(
        description = "Get the recording status: whether recording is active, the domain filter, and how many requests have been captured",
        annotations(read_only_hint = true, destructive_hint = false)
    )]
    async fn recording_status(&self) -> Result<Json<RecordingStatusResponse>, McpError> {
        let session = self.load_session().await?;
        Ok(Json(RecordingStatusResponse {
            is_recording: session.is_recording,
            domain_filter: session.domain_filter,
            captured_count: session.captured.len(),
            method_filter: session.view.method_filter,
            search_filter: session.view.search_filter,
            storage_path: self.config.storage_path.to_string_lossy().to_string(),
        }))
    }

    #[tool(
        description = "List captured requests in capture order. Optional method and search filters (search matches URL and request body, case-insensitive). Limit defaults to 100, max 500.",
        annotations(read_only_hint = true, destructive_hint = false)
    )]
    async fn requests_list(
        &self,
        params: Parameters<RequestsListParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let session = self.load_session().await?;
        let filters = session.view.with_overrides(p.method, p.search);
        let limit = p.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);

        let matching = session.snapshot(&filters);
        let summaries: Vec<RequestSummary<'_>> =
            matching.iter().take(limit).map(RequestSummary::from).collect();
        let json = serde_json::json!({
            "total": matching.len(),
            "requests": summaries,
        });
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&json).unwrap_or_default(),
        )]))
    }

    #[tool(
        description = "Fetch a single captured request by ID including headers, body and its curl replay command.",
        annotations(read_only_hint = true, destructive_hint = false)
    )]
    async fn request_detail(
        &self,
        params: Parameters<RequestDetailParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = self.find_request(&params.0.id).await?;
        let json = serde_json::json!({
            "request": request,
            "curl": export::to_curl(&request),
        });
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&json).unwrap_or_default(),
        )]))
    }

    #[tool(
        description = "Render the captured requests as curl commands, a Postman collection or a Playwright test script. Returns the document, or writes it when a path is given.",
        annotations(read_only_hint = false, destructive_hint = false)
    )]
    async fn export_document(
        &self,
        params: Parameters<ExportDocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let format: ExportFormat = p.format.parse().map_err(export_error)?;
        let session = self.load_session().await?;

        match p.path {
            Some(path) => {
                let count =
                    export::export_to_path(format, &session.captured, &path).map_err(export_error)?;
                Ok(CallToolResult::success(vec![Content::text(format!(
                    "Exported {} requests as {} to {}",
                    count, format, path
                ))]))
            }
            None => {
                let content = export::render(format, &session.captured).map_err(export_error)?;
                Ok(CallToolResult::success(vec![Content::text(content)]))
            }
        }
    }

    #[tool(
        description = "Replay a captured request and report its response status. Requires the server to run with --allow-writes.",
        annotations(read_only_hint = false, destructive_hint = true)
    )]
    async fn replay_request(
        &self,
        params: Parameters<ReplayRequestParams>,
    ) -> Result<CallToolResult, McpError> {
        self.ensure_write_allowed("replay_request")?;
        let p = params.0;
        let request = self.find_request(&p.id).await?;

        let replay_params = ReplayParams {
            method: p.method,
            url: p.url,
            headers: p.headers,
            body: p.body,
            accept_invalid_certs: p.allow_insecure_tls,
            timeout: None,
        };
        let result = replay::replay_request(&request, replay_params)
            .await
            .map_err(|e| McpError::internal_error(format!("Replay failed: {e}"), None))?;

        let json = serde_json::to_string_pretty(&result).unwrap_or_default();
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

// ============================================================================
// ServerHandler Implementation
// ============================================================================

impl ServerHandler for RecorderMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "apirecorder".into(),
                version: crate::VERSION.into(),
                title: Some("API Recorder MCP Server".into()),
                icons: None,
                website_url: None,
            },
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            instructions: Some(
                "API Recorder captures the XHR and fetch requests a browser tab makes. \
                 Use tools to inspect the recorded session, export it as curl commands, \
                 a Postman collection or a Playwright test, and replay requests."
                    .into(),
            ),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.tool_router.list_all();
        std::future::ready(Ok(ListToolsResult {
            tools,
            ..Default::default()
        }))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let tool_context = ToolCallContext::new(self, request, context);
            self.tool_router.call(tool_context).await
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        use rmcp::model::{Annotated, RawResource};

        std::future::ready(Ok(ListResourcesResult {
            resources: vec![Annotated {
                raw: RawResource {
                    uri: "recorder://status".into(),
                    name: "Recording Status".into(),
                    title: None,
                    description: Some("Recording flag, domain filter and captured request count".into()),
                    mime_type: Some("application/json".into()),
                    size: None,
                    icons: None,
                    meta: None,
                },
                annotations: None,
            }],
            ..Default::default()
        }))
    }

    fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourceTemplatesResult, McpError>> + Send + '_
    {
        use rmcp::model::{Annotated, RawResourceTemplate};

        std::future::ready(Ok(ListResourceTemplatesResult {
            resource_templates: vec![Annotated {
                raw: RawResourceTemplate {
                    uri_template: "recorder://request/{id}".into(),
                    name: "Captured Request".into(),
                    title: None,
                    description: Some("Full details of a captured request by ID".into()),
                    mime_type: Some("application/json".into()),
                },
                annotations: None,
            }],
            ..Default::default()
        }))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let uri = request.uri.as_str();

            if uri == "recorder://status" {
                let session = self.load_session().await?;
                let json = serde_json::to_value(session.status(0)).unwrap_or_default();
                return Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(
                        serde_json::to_string_pretty(&json).unwrap_or_default(),
                        uri,
                    )],
                });
            }

            if let Some(id) = uri.strip_prefix("recorder://request/") {
                let request = self.find_request(id).await?;
                let json = serde_json::to_string_pretty(&request).unwrap_or_default();
                return Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(json, uri)],
                });
            }

            Err(McpError::invalid_params(
                format!("Unknown resource URI: {}", uri),
                None,
            ))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HeaderEntry;
    use crate::storage::{persist_fields, MemoryStateStore, StateField};
    use tempfile::tempdir;

    fn text_of(result: &CallToolResult) -> String {
        let value = serde_json::to_value(result).unwrap();
        value["content"][0]["text"].as_str().unwrap().to_string()
    }

    async fn server_with_session(allow_writes: bool) -> RecorderMcpServer {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let mut session = SessionState::default();
        session.start("example.com");
        let mut post = CompletedRequest::new(
            "2",
            "POST",
            "https://api.example.com/orders",
            vec![HeaderEntry::new("Content-Type", "application/json")],
        );
        post.request_body = Some("{\"sku\":\"A1\"}".into());
        session.accept(CompletedRequest::new(
            "1",
            "GET",
            "https://api.example.com/users",
            Vec::new(),
        ));
        session.accept(post);
        persist_fields(&store, &session, &StateField::ALL).await;

        RecorderMcpServer::with_store(
            McpServerConfig {
                storage_path: PathBuf::from("./unused"),
                allow_writes,
            },
            store,
        )
    }

    #[test]
    fn test_config_default() {
        let config = McpServerConfig::default();
        assert!(!config.allow_writes);
        assert!(!config.storage_path.as_os_str().is_empty());
    }

    #[tokio::test]
    async fn status_reads_persisted_session() {
        let server = server_with_session(false).await;
        let status = server.recording_status().await.unwrap().0;
        assert!(status.is_recording);
        assert_eq!(status.domain_filter, "example.com");
        assert_eq!(status.captured_count, 2);
    }

    #[tokio::test]
    async fn list_applies_filters_and_limit() {
        let server = server_with_session(false).await;

        let all = server
            .requests_list(Parameters(RequestsListParams::default()))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&text_of(&all)).unwrap();
        assert_eq!(json["total"], 2);

        let posts = server
            .requests_list(Parameters(RequestsListParams {
                search: Some("sku".into()),
                ..Default::default()
            }))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&text_of(&posts)).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["requests"][0]["requestId"], "2");
        assert_eq!(json["requests"][0]["hasBody"], true);

        let limited = server
            .requests_list(Parameters(RequestsListParams {
                limit: Some(1),
                ..Default::default()
            }))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&text_of(&limited)).unwrap();
        assert_eq!(json["requests"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn detail_includes_curl_command() {
        let server = server_with_session(false).await;
        let result = server
            .request_detail(Parameters(RequestDetailParams { id: "2".into() }))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(json["request"]["method"], "POST");
        assert!(json["curl"]
            .as_str()
            .unwrap()
            .starts_with("curl -X POST \"https://api.example.com/orders\""));

        assert!(server
            .request_detail(Parameters(RequestDetailParams { id: "nope".into() }))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn export_renders_or_writes_documents() {
        let server = server_with_session(false).await;
        let result = server
            .export_document(Parameters(ExportDocumentParams {
                format: "postman".into(),
                path: None,
            }))
            .await
            .unwrap();
        assert!(text_of(&result).contains("Recorded XHR Requests"));

        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("tests.spec.ts");
        server
            .export_document(Parameters(ExportDocumentParams {
                format: "test_script".into(),
                path: Some(path.to_string_lossy().to_string()),
            }))
            .await
            .unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("test('Test POST /orders'"));

        assert!(server
            .export_document(Parameters(ExportDocumentParams {
                format: "har".into(),
                path: None,
            }))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn replay_requires_write_access() {
        let server = server_with_session(false).await;
        let err = server
            .replay_request(Parameters(ReplayRequestParams {
                id: "1".into(),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert!(err.message.contains("--allow-writes"));
    }

    #[tokio::test]
    async fn uninitialized_store_is_an_error() {
        let server = RecorderMcpServer::new(McpServerConfig::default());
        assert!(server.recording_status().await.is_err());
    }

    #[tokio::test]
    async fn bootstrap_opens_sqlite_store() {
        let dir = tempdir().expect("temp dir");
        let server = RecorderMcpServer::new(McpServerConfig {
            storage_path: dir.path().to_path_buf(),
            allow_writes: false,
        });
        server.bootstrap().await.expect("bootstrap ok");
        let status = server.recording_status().await.unwrap().0;
        assert!(!status.is_recording);
        assert_eq!(status.captured_count, 0);
    }
}
