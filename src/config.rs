//! Recorder configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::{CaptureMode, DEFAULT_PENDING_TTL};
use crate::host::MAX_OUTBOUND_FRAME;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
const APP_DIR_NAME: &str = "apirecorder";
const FALLBACK_STORAGE_DIR: &str = "./apirecorder_data";

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory holding the state database and release-mode logs
    pub storage_path: PathBuf,
    pub capture_mode: CaptureMode,
    /// How long an incomplete request may wait for its remaining fragments
    pub pending_ttl: Duration,
    /// Interval of the host loop's eviction tick
    pub sweep_interval: Duration,
    /// Largest serialized message the peer accepts. `stop` keeps the capture
    /// when one replay command alone would exceed it.
    pub max_export_frame: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            capture_mode: CaptureMode::default(),
            pending_ttl: DEFAULT_PENDING_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_export_frame: MAX_OUTBOUND_FRAME,
        }
    }
}

impl RecorderConfig {
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Create the storage directory if needed
    pub fn ensure_storage_dir(&self) -> anyhow::Result<&Path> {
        std::fs::create_dir_all(&self.storage_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create storage directory {}: {}",
                self.storage_path.display(),
                e
            )
        })?;
        Ok(&self.storage_path)
    }
}

pub fn default_storage_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_STORAGE_DIR))
}
