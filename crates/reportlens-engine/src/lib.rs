//! Network clients, configuration and the session orchestrator for ReportLens.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub mod analysis;
pub mod app;
pub mod chat;
pub mod config;
pub mod identity;
pub mod session;

#[cfg(test)]
mod test_support;

pub use analysis::{AnalysisBackend, HealthStatus, HttpAnalysisClient};
pub use app::{AppShell, Screen};
pub use chat::{ChatBackend, HttpChatClient};
pub use config::{ClientConfig, Settings};
pub use identity::LocalIdentityGateway;
pub use session::{AnalysisOutcome, AnalysisSession};

pub(crate) fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// Hex SHA-256 of a file's contents, or `None` when it cannot be read.
pub(crate) fn file_sha256(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Some(hex::encode(hasher.finalize()))
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
