use serde::{Deserialize, Serialize};

/// Represents the role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MessageRole {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "system")]
    System,
}

/// A message as displayed in the conversation pane. `content` holds only the
/// visible answer text; reasoning captured by the segmenter lands in
/// `thinking` and is rendered separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip, default)]
    pub thinking: String,
    #[serde(skip, default)]
    pub used_tools: Vec<String>,
}

impl UiMessage {
    pub fn new(role: MessageRole, content: String) -> Self {
        Self {
            role,
            content,
            thinking: String::new(),
            used_tools: Vec::new(),
        }
    }

    pub fn user(content: String) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: String) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Assistant message with the reasoning trace attached.
    pub fn assistant_with_thinking(content: String, thinking: String) -> Self {
        let mut msg = Self::assistant(content);
        msg.thinking = thinking;
        msg
    }

    /// Assistant message carrying the names of the tools it ran.
    pub fn assistant_with_tools(content: String, used_tools: Vec<String>) -> Self {
        let mut msg = Self::assistant(content);
        msg.used_tools = used_tools;
        msg
    }

    pub fn system(content: String) -> Self {
        Self::new(MessageRole::System, content)
    }
}
