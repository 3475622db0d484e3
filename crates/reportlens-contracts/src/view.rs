//! Report view state machine.
//!
//! Owns the staged upload, the current report and the chat turns bound to it.
//! Network work happens outside: a driver takes a ticket from `begin_*`, runs
//! the request, and hands the ticket back with the outcome.

use std::path::{Path, PathBuf};

use crate::chat::ChatTurn;
use crate::errors::ViewError;
use crate::report::AnalysisResult;

/// A document picked by the user and not yet submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub path: PathBuf,
    pub file_name: String,
}

impl PendingUpload {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .filter(|value| !value.is_empty())
            .unwrap_or("document")
            .to_string();
        Self {
            path: path.to_path_buf(),
            file_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    Empty,
    Staged,
    Analyzing,
    Displayed,
}

impl ViewPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Staged => "staged",
            Self::Analyzing => "analyzing",
            Self::Displayed => "displayed",
        }
    }
}

/// Proof that an analysis was started. Consumed by exactly one completion.
#[derive(Debug)]
pub struct AnalysisTicket {
    id: u64,
    upload: PendingUpload,
}

impl AnalysisTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn upload(&self) -> &PendingUpload {
        &self.upload
    }
}

/// Proof that a question was sent about a specific report.
#[derive(Debug)]
pub struct QuestionTicket {
    id: u64,
    generation: u64,
    question: String,
    collection: String,
}

impl QuestionTicket {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[derive(Debug, Clone)]
struct DisplayedReport {
    generation: u64,
    result: AnalysisResult,
    turns: Vec<ChatTurn>,
}

#[derive(Debug, Default)]
pub struct ReportView {
    pending: Option<PendingUpload>,
    current: Option<DisplayedReport>,
    // Report shown before the in-flight analysis started; restored if it fails.
    stashed: Option<DisplayedReport>,
    analysis_in_flight: Option<u64>,
    question_in_flight: Option<u64>,
    next_id: u64,
}

impl ReportView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ViewPhase {
        if self.analysis_in_flight.is_some() {
            ViewPhase::Analyzing
        } else if self.pending.is_some() {
            ViewPhase::Staged
        } else if self.current.is_some() {
            ViewPhase::Displayed
        } else {
            ViewPhase::Empty
        }
    }

    pub fn report(&self) -> Option<&AnalysisResult> {
        self.current.as_ref().map(|shown| &shown.result)
    }

    pub fn pending(&self) -> Option<&PendingUpload> {
        self.pending.as_ref()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        self.current
            .as_ref()
            .map(|shown| shown.turns.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_analyzing(&self) -> bool {
        self.analysis_in_flight.is_some()
    }

    pub fn is_question_pending(&self) -> bool {
        self.question_in_flight.is_some()
    }

    pub fn can_run_analysis(&self) -> bool {
        self.pending.is_some() && !self.is_analyzing()
    }

    /// Whether the ask action is enabled: a report with a collection is shown
    /// and no earlier question is still unanswered.
    pub fn can_ask(&self) -> bool {
        self.chat_collection().is_some() && !self.is_question_pending()
    }

    fn chat_collection(&self) -> Option<&str> {
        self.report().and_then(AnalysisResult::collection_reference)
    }

    /// Stages a file, replacing any earlier pick. The shown report stays visible.
    pub fn pick(&mut self, upload: PendingUpload) -> Result<(), ViewError> {
        if self.is_analyzing() {
            return Err(ViewError::AnalysisInFlight);
        }
        self.pending = Some(upload);
        Ok(())
    }

    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket, ViewError> {
        if self.is_analyzing() {
            return Err(ViewError::AnalysisInFlight);
        }
        let upload = self.pending.clone().ok_or(ViewError::NoFileStaged)?;
        let id = self.allocate_id();
        self.analysis_in_flight = Some(id);
        self.stashed = self.current.take();
        Ok(AnalysisTicket { id, upload })
    }

    /// Replaces the report wholesale and starts a fresh conversation.
    pub fn analysis_succeeded(
        &mut self,
        ticket: AnalysisTicket,
        result: AnalysisResult,
    ) -> Result<(), ViewError> {
        self.finish_analysis(&ticket)?;
        self.stashed = None;
        self.question_in_flight = None;
        let generation = self.allocate_id();
        self.current = Some(DisplayedReport {
            generation,
            result,
            turns: Vec::new(),
        });
        Ok(())
    }

    /// Brings back whatever was shown before the analysis started.
    pub fn analysis_failed(&mut self, ticket: AnalysisTicket) -> Result<(), ViewError> {
        self.finish_analysis(&ticket)?;
        self.current = self.stashed.take();
        Ok(())
    }

    fn finish_analysis(&mut self, ticket: &AnalysisTicket) -> Result<(), ViewError> {
        if self.analysis_in_flight != Some(ticket.id) {
            return Err(ViewError::StaleTicket);
        }
        self.analysis_in_flight = None;
        self.pending = None;
        Ok(())
    }

    /// Appends the user's turn right away and returns the request to send.
    pub fn begin_question(&mut self, text: &str) -> Result<QuestionTicket, ViewError> {
        let (generation, collection) = {
            let shown = self.current.as_ref().ok_or(ViewError::NoReport)?;
            let collection = shown
                .result
                .collection_reference()
                .ok_or(ViewError::ChatUnavailable)?;
            (shown.generation, collection.to_string())
        };
        if self.is_question_pending() {
            return Err(ViewError::QuestionInFlight);
        }
        let question = text.trim();
        if question.is_empty() {
            return Err(ViewError::EmptyQuestion);
        }

        let id = self.allocate_id();
        if let Some(shown) = self.current.as_mut() {
            shown.turns.push(ChatTurn::user(question));
        }
        self.question_in_flight = Some(id);
        Ok(QuestionTicket {
            id,
            generation,
            question: question.to_string(),
            collection,
        })
    }

    /// Returns `false` when the report the question was about is gone.
    pub fn question_answered(&mut self, ticket: QuestionTicket, answer: impl Into<String>) -> bool {
        self.finish_question(ticket, ChatTurn::assistant(answer))
    }

    pub fn question_failed(&mut self, ticket: QuestionTicket) -> bool {
        self.finish_question(ticket, ChatTurn::fallback())
    }

    fn finish_question(&mut self, ticket: QuestionTicket, turn: ChatTurn) -> bool {
        if self.question_in_flight == Some(ticket.id) {
            self.question_in_flight = None;
        }
        let target = [self.current.as_mut(), self.stashed.as_mut()]
            .into_iter()
            .flatten()
            .find(|shown| shown.generation == ticket.generation);
        match target {
            Some(shown) => {
                shown.turns.push(turn);
                true
            }
            None => false,
        }
    }

    /// Back to `Empty`. Anything still in flight completes as stale.
    pub fn reset(&mut self) {
        self.pending = None;
        self.current = None;
        self.stashed = None;
        self.analysis_in_flight = None;
        self.question_in_flight = None;
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}
