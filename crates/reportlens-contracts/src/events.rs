use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::session::SessionId;

pub type EventPayload = Map<String, Value>;

/// Append-only `session.jsonl` log of orchestrator transitions, one compact
/// object per line. Each line starts with `type`, `session_id` and `ts`;
/// payload keys are merged after them and win on collision.
///
/// Without a path the log still stamps events but writes nothing.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: Option<PathBuf>,
    session_id: SessionId,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>, session_id: SessionId) -> Self {
        Self {
            path: Some(path.into()),
            session_id,
        }
    }

    pub fn disabled(session_id: SessionId) -> Self {
        Self {
            path: None,
            session_id,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Stamps the event and appends it when a path is set.
    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = json!({
            "type": event_type,
            "session_id": self.session_id.as_str(),
            "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        });
        if let Some(fields) = event.as_object_mut() {
            fields.extend(payload);
        }

        if let Some(path) = &self.path {
            append_line(path, &serde_json::to_string(&event)?)?;
        }
        Ok(event)
    }
}

fn append_line(path: &Path, line: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed opening {}", path.display()))?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Event types in file order. Lines that fail to parse are skipped.
pub fn read_event_types(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("session.jsonl");
        let session_id = SessionId::generate();
        let log = SessionLog::new(&path, session_id.clone());

        let mut payload = EventPayload::new();
        payload.insert("file_name".to_string(), Value::String("cbc.pdf".to_string()));
        let emitted = log.emit("file_staged", payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String("file_staged".to_string()));
        assert_eq!(
            parsed["session_id"],
            Value::String(session_id.as_str().to_string())
        );
        assert_eq!(parsed["file_name"], Value::String("cbc.pdf".to_string()));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn emit_appends_lines_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("session.jsonl");
        let log = SessionLog::new(&path, SessionId::generate());

        log.emit("analysis_started", EventPayload::new())?;
        log.emit("analysis_completed", EventPayload::new())?;

        assert_eq!(
            read_event_types(&path)?,
            vec!["analysis_started", "analysis_completed"]
        );
        Ok(())
    }

    #[test]
    fn disabled_log_writes_nothing() -> anyhow::Result<()> {
        let log = SessionLog::disabled(SessionId::generate());
        let emitted = log.emit("session_started", EventPayload::new())?;
        assert_eq!(emitted["type"], Value::String("session_started".to_string()));
        assert!(log.path().is_none());
        Ok(())
    }
}
