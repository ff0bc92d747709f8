//! Export of captured requests
//!
//! Three formats are supported: replay commands, a Postman collection and a
//! Playwright test script.

pub mod collection;
pub mod curl;
pub mod test_script;

pub use collection::{collection_to_requests, requests_to_collection, to_collection_json};
pub use curl::{join_commands, to_curl, to_curl_list};
pub use test_script::to_test_script;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::models::CompletedRequest;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No recorded requests to export.")]
    NothingToExport,
    #[error("unknown export format: {0}")]
    UnknownFormat(String),
    #[error("invalid collection: {0}")]
    InvalidCollection(String),
    #[error("failed to encode document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Curl,
    #[serde(alias = "postman")]
    Collection,
    #[serde(alias = "playwright")]
    TestScript,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Curl => "curl",
            ExportFormat::Collection => "collection",
            ExportFormat::TestScript => "test_script",
        }
    }

    /// Default file name offered for downloads
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Curl => "curl-commands.txt",
            ExportFormat::Collection => "collection.json",
            ExportFormat::TestScript => "playwright-tests.spec.ts",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "curl" => Ok(ExportFormat::Curl),
            "collection" | "postman" => Ok(ExportFormat::Collection),
            "test_script" | "playwright" => Ok(ExportFormat::TestScript),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// URL path used in item and test names; the raw URL when it cannot be parsed
pub(crate) fn display_path(url: &str) -> String {
    Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Render the requests in the given format
pub fn render(format: ExportFormat, requests: &[CompletedRequest]) -> Result<String, ExportError> {
    match format {
        ExportFormat::Curl => Ok(join_commands(&to_curl_list(requests))),
        ExportFormat::Collection => to_collection_json(requests),
        ExportFormat::TestScript => to_test_script(requests),
    }
}

/// Render and write to `output_path`, returning the number of requests written
pub fn export_to_path(
    format: ExportFormat,
    requests: &[CompletedRequest],
    output_path: impl AsRef<Path>,
) -> Result<usize, ExportError> {
    let content = render(format, requests)?;
    std::fs::write(output_path.as_ref(), content)?;
    tracing::info!(
        "Exported {} requests as {} to {:?}",
        requests.len(),
        format,
        output_path.as_ref()
    );
    Ok(requests.len())
}
