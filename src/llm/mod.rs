//! Completion service integration
//!
//! - `messages` - role-tagged chat messages and backend errors
//! - `client` - the `CompletionService` seam and the counting `CompletionClient`
//! - `openai` - OpenAI-compatible chat completions backend
//! - `ollama` - Ollama `/api/chat` backend

pub mod client;
pub mod messages;
pub mod ollama;
pub mod openai;

pub use client::{CompletionClient, CompletionService, DEFAULT_MAX_TOKENS};
pub use messages::{ChatMessage, CompletionError, Role};
pub use ollama::OllamaClient;
pub use openai::{load_api_key, OpenAiClient};
