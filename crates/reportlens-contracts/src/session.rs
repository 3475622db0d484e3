use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque token scoping one browsing session's conversational context.
///
/// Generated once when the orchestrator is created and never regenerated for
/// the rest of its lifetime, no matter how many documents are analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
