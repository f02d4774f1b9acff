mod engine;
mod models;
mod openai;
mod segmenter;

pub use engine::{EngineError, RunOutput, ToolConversationEngine, DEFAULT_MAX_ROUNDS};
pub use models::{Message, Role, ToolCall, ToolInvocation};
pub use openai::OpenAiClient;
pub use segmenter::{stable_prefix_len, Segments, StreamSegmenter};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Outcome of one completion request against the backend.
#[derive(Debug)]
pub enum ChatOutcome {
    /// The backend answered with plain text.
    Answer(String),
    /// The backend requested tool calls; the assistant message is kept as
    /// received so it can be appended to the conversation verbatim.
    ToolCalls(Message),
}

/// Events emitted while a streaming response is in flight.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A chunk of assistant text.
    Delta(String),
    /// The stream finished successfully.
    Done,
    /// The stream failed; no further events follow.
    Error(String),
}

/// A chat-completion backend. Implementations own all transport concerns;
/// callers see either one structured outcome or a sequence of text fragments.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Request a single completion for the conversation, optionally
    /// advertising a tool catalog and prefixing a system prompt.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
        system_prompt: Option<&str>,
    ) -> Result<ChatOutcome>;

    /// Request a streaming completion. Returns a receiver of incremental
    /// events plus a handle resolving to the full response text.
    async fn stream(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<(mpsc::Receiver<StreamEvent>, JoinHandle<Result<String>>)>;
}
