//! Server configuration
//!
//! Defaults, overridden by an optional YAML file, overridden by CLI flags and
//! `PRICE_EDITOR_*` environment variables (handled by clap in `main`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PriceEditorError, PriceEditorResult};
use crate::session::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_IDLE};

/// Bundled workbook used when the user has not uploaded one
pub const DEFAULT_WORKBOOK: &str = "your_workbook.xlsx";

/// Largest accepted upload
pub const DEFAULT_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bundled default workbook
    pub workbook: PathBuf,
    /// Where uploaded workbooks are stored for their session
    pub upload_dir: PathBuf,
    pub upload_limit_bytes: usize,
    /// Seconds of inactivity before a session and its upload are dropped
    pub session_idle_secs: u64,
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workbook: PathBuf::from(DEFAULT_WORKBOOK),
            upload_dir: std::env::temp_dir().join("price-editor-uploads"),
            upload_limit_bytes: DEFAULT_UPLOAD_LIMIT,
            session_idle_secs: DEFAULT_SESSION_IDLE.as_secs(),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl ServerConfig {
    pub fn from_yaml_str(yaml: &str) -> PriceEditorResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| PriceEditorError::Config(format!("Invalid config: {}", e)))
    }

    pub fn from_yaml_file(path: &Path) -> PriceEditorResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            PriceEditorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// `host:port` for binding
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
