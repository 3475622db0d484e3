mod command_registry;
mod intent_parser;

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

pub use command_registry::CHAT_HELP_COMMANDS;
pub use intent_parser::{parse_intent, Intent};

pub const CHAT_FALLBACK_ANSWER: &str = "Sorry, I encountered an error answering that.";
pub const CHAT_GREETING: &str = "Hello! I have analyzed the report. Ask me anything about it.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }

    pub fn fallback() -> Self {
        Self::assistant(CHAT_FALLBACK_ANSWER)
    }
}

/// Body of a `POST /chat` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest<'a> {
    pub question: &'a str,
    pub collection_name: &'a str,
    pub session_id: &'a SessionId,
}

/// Body of a `POST /chat` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    pub answer: String,
}
