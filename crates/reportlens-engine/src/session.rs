use std::path::{Path, PathBuf};

use reportlens_contracts::chat::ChatTurn;
use reportlens_contracts::errors::{AnalysisError, ViewError};
use reportlens_contracts::events::SessionLog;
use reportlens_contracts::report::AnalysisResult;
use reportlens_contracts::session::SessionId;
use reportlens_contracts::view::{PendingUpload, ReportView, ViewPhase};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::analysis::AnalysisBackend;
use crate::chat::ChatBackend;
use crate::{file_sha256, map_object};

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// The new report is current. Carries the non-fatal warnings, if any.
    Completed { warnings: Vec<String> },
    /// Whatever was shown before is shown again.
    Failed(AnalysisError),
}

/// Drives one report view against the remote service for the lifetime of a session.
///
/// The session identifier is created here, once, and sent with every analysis
/// and every question regardless of how many reports are analyzed.
pub struct AnalysisSession {
    session_id: SessionId,
    view: ReportView,
    analysis: Box<dyn AnalysisBackend>,
    chat: Box<dyn ChatBackend>,
    events: SessionLog,
}

impl AnalysisSession {
    pub fn new(
        analysis: Box<dyn AnalysisBackend>,
        chat: Box<dyn ChatBackend>,
        events_path: Option<PathBuf>,
    ) -> Self {
        let session_id = SessionId::generate();
        let events = match events_path {
            Some(path) => SessionLog::new(path, session_id.clone()),
            None => SessionLog::disabled(session_id.clone()),
        };
        let session = Self {
            session_id,
            view: ReportView::new(),
            analysis,
            chat,
            events,
        };
        session.record("session_started", json!({}));
        info!(session_id = %session.session_id, "analysis session started");
        session
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn phase(&self) -> ViewPhase {
        self.view.phase()
    }

    pub fn report(&self) -> Option<&AnalysisResult> {
        self.view.report()
    }

    pub fn pending(&self) -> Option<&PendingUpload> {
        self.view.pending()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        self.view.turns()
    }

    pub fn can_ask(&self) -> bool {
        self.view.can_ask()
    }

    pub fn events_path(&self) -> Option<&Path> {
        self.events.path()
    }

    pub fn pick(&mut self, path: impl AsRef<Path>) -> Result<&PendingUpload, ViewError> {
        let upload = PendingUpload::from_path(path);
        let file_name = upload.file_name.clone();
        self.view.pick(upload)?;
        self.record("file_staged", json!({ "file_name": file_name }));
        self.view.pending().ok_or(ViewError::NoFileStaged)
    }

    /// Blocks until the backend answers or the analysis timeout elapses.
    pub fn run_analysis(&mut self) -> Result<AnalysisOutcome, ViewError> {
        let ticket = self.view.begin_analysis()?;
        let file_name = ticket.upload().file_name.clone();
        self.record(
            "analysis_started",
            json!({
                "file_name": file_name,
                "sha256": file_sha256(&ticket.upload().path),
            }),
        );
        info!(%file_name, "analysis started");

        match self.analysis.submit(ticket.upload(), &self.session_id) {
            Ok(result) => {
                let warnings = result.warnings.clone();
                let payload = json!({
                    "file_name": file_name,
                    "report_title": result.report_title,
                    "risk_score": result.risk_score,
                    "collection": result.collection_reference(),
                    "warnings": &warnings,
                });
                self.view.analysis_succeeded(ticket, result)?;
                self.record("analysis_completed", payload);
                if !warnings.is_empty() {
                    warn!(count = warnings.len(), "analysis completed with issues");
                }
                Ok(AnalysisOutcome::Completed { warnings })
            }
            Err(err) => {
                self.view.analysis_failed(ticket)?;
                self.record(
                    "analysis_failed",
                    json!({
                        "file_name": file_name,
                        "kind": err.kind(),
                        "error": err.to_string(),
                    }),
                );
                warn!(kind = err.kind(), error = %err, "analysis failed");
                Ok(AnalysisOutcome::Failed(err))
            }
        }
    }

    /// Sends a question about the current report and returns the assistant turn
    /// that was appended. Chat failures come back as the fallback turn.
    pub fn ask_question(&mut self, text: &str) -> Result<ChatTurn, ViewError> {
        let ticket = self.view.begin_question(text)?;
        self.record(
            "chat_question",
            json!({ "collection": ticket.collection(), "question": ticket.question() }),
        );

        let turn = match self
            .chat
            .ask(ticket.question(), ticket.collection(), &self.session_id)
        {
            Ok(answer) => {
                let turn = ChatTurn::assistant(answer);
                self.record("chat_answered", json!({ "collection": ticket.collection() }));
                self.view.question_answered(ticket, turn.text.clone());
                turn
            }
            Err(err) => {
                error!(error = %err, "chat request failed");
                self.record(
                    "chat_failed",
                    json!({ "collection": ticket.collection(), "error": err.to_string() }),
                );
                self.view.question_failed(ticket);
                ChatTurn::fallback()
            }
        };
        Ok(turn)
    }

    /// Drops the report, any staged file and the conversation. The session id stays.
    pub fn reset(&mut self) {
        self.view.reset();
        self.record("view_reset", json!({}));
    }

    fn record(&self, event_type: &str, payload: Value) {
        if let Err(err) = self.events.emit(event_type, map_object(payload)) {
            warn!(event_type, error = %err, "session event not written");
        }
    }
}
