use thiserror::Error;

/// Failure of one document analysis round-trip. Every variant is recoverable:
/// the user re-selects a file and tries again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Non-2xx response. Keeps the raw body for diagnostics.
    #[error("Server Error: {status} - {body}")]
    Server { status: u16, body: String },

    /// The request went out but nothing usable came back (connect failure, reset, timeout).
    #[error("No response from server. Is the backend running?")]
    NoResponse { detail: String, timed_out: bool },

    /// The request could not be built or sent.
    #[error("{0}")]
    Client(String),

    /// 2xx response whose body is not a JSON object.
    #[error("Invalid response from server ({status}): {detail}")]
    InvalidResponse { status: u16, detail: String },
}

impl AnalysisError {
    pub fn no_response(detail: impl Into<String>, timed_out: bool) -> Self {
        Self::NoResponse {
            detail: detail.into(),
            timed_out,
        }
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::NoResponse { timed_out: true, .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Server { .. } => "server",
            Self::NoResponse { .. } => "no_response",
            Self::Client(_) => "client",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }

    /// Text for the blocking acknowledgment shown to the user.
    pub fn user_message(&self) -> String {
        format!("Analysis Failed!\n{self}")
    }
}

/// Any failure in the question-answering round-trip. Never shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("chat transport failed: {0}")]
    Transport(String),

    #[error("chat request failed ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("chat response invalid: {0}")]
    InvalidResponse(String),
}

/// Errors that halt normal rendering of the whole application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("Authentication Error: {0}")]
    Auth(String),
}

impl AppError {
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(message) | Self::Auth(message) => message.as_str(),
        }
    }
}

/// Transition rejected by the report view state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("no document is staged for analysis")]
    NoFileStaged,

    #[error("an analysis is already in flight")]
    AnalysisInFlight,

    #[error("no report is displayed")]
    NoReport,

    #[error("the current report has no chat collection")]
    ChatUnavailable,

    #[error("a question is already awaiting an answer")]
    QuestionInFlight,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("completion does not match the request in flight")]
    StaleTicket,
}
