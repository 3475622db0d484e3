use reportlens_contracts::chat::{ChatReply, ChatRequest};
use reportlens_contracts::errors::ChatError;
use reportlens_contracts::session::SessionId;
use reqwest::blocking::Client as HttpClient;

use crate::config::ClientConfig;
use crate::truncate_text;

/// Answers one question about an indexed report. No retries.
pub trait ChatBackend: Send {
    fn ask(
        &self,
        question: &str,
        collection_name: &str,
        session_id: &SessionId,
    ) -> Result<String, ChatError>;
}

pub struct HttpChatClient {
    config: ClientConfig,
    http: HttpClient,
}

impl HttpChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }
}

impl ChatBackend for HttpChatClient {
    fn ask(
        &self,
        question: &str,
        collection_name: &str,
        session_id: &SessionId,
    ) -> Result<String, ChatError> {
        let payload = ChatRequest {
            question,
            collection_name,
            session_id,
        };
        let response = self
            .http
            .post(self.config.endpoint("/chat"))
            .timeout(self.config.chat_timeout)
            .json(&payload)
            .send()
            .map_err(|err| ChatError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| ChatError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(ChatError::Server {
                status: status.as_u16(),
                body: truncate_text(&body, 512),
            });
        }
        let reply: ChatReply = serde_json::from_str(&body)
            .map_err(|err| ChatError::InvalidResponse(err.to_string()))?;
        Ok(reply.answer)
    }
}
