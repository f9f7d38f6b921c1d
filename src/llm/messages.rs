//! Role-tagged chat messages and the shared error type for backends

use serde::{Deserialize, Serialize};

/// Who a message is from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Error type for completion backends
#[derive(Debug)]
pub enum CompletionError {
    Request(reqwest::Error),
    Parse(serde_json::Error),
    /// The service answered with a non-success status
    Status { status: u16, body: String },
    EmptyResponse,
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::Request(e) => write!(f, "Request error: {}", e),
            CompletionError::Parse(e) => write!(f, "Parse error: {}", e),
            CompletionError::Status { status, body } => {
                write!(f, "Service returned {}: {}", status, body)
            }
            CompletionError::EmptyResponse => write!(f, "Empty response from completion service"),
        }
    }
}

impl std::error::Error for CompletionError {}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        CompletionError::Request(e)
    }
}

impl From<serde_json::Error> for CompletionError {
    fn from(e: serde_json::Error) -> Self {
        CompletionError::Parse(e)
    }
}
