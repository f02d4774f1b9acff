use anyhow::Result;

use crate::config::Config;
use crate::llm::{
    ChatBackend, Message, OpenAiClient, StreamEvent, StreamSegmenter, ToolConversationEngine,
};
use crate::tools::ToolRegistry;
use crate::tui::message::{MessageRole, UiMessage};

/// Handles one exchange with the backend on behalf of the TUI: plain
/// streaming with reasoning split off, or the tool loop when tools are on.
pub struct LlmHandler {
    client: OpenAiClient,
    registry: ToolRegistry,
    tools_enabled: bool,
    endpoint_name: String,
    model: String,
    stream_response: bool,
}

impl LlmHandler {
    pub fn new(config: &Config) -> Result<Self> {
        let conn = config.connection()?;
        let endpoint_name = config
            .current_endpoint()
            .map(|ep| ep.name.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let model = conn.model.clone();

        Ok(Self {
            client: OpenAiClient::new(conn.base_url, conn.api_key, conn.model)
                .with_max_tokens(conn.max_tokens),
            registry: ToolRegistry::with_default_tools(),
            tools_enabled: false,
            endpoint_name,
            model,
            stream_response: config.settings.stream_response,
        })
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn tools_enabled(&self) -> bool {
        self.tools_enabled
    }

    pub fn toggle_tools(&mut self) {
        self.tools_enabled = !self.tools_enabled;
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    /// Process the latest user message against the conversation so far.
    ///
    /// Backend failures come back as an assistant-styled error message rather
    /// than an `Err`, so the conversation stays usable.
    pub async fn process_message(
        &self,
        history: &[UiMessage],
        user_message: &UiMessage,
        system_prompt: &str,
    ) -> Result<UiMessage> {
        let mut conversation: Vec<Message> = history
            .iter()
            .filter(|msg| msg.role != MessageRole::System)
            .map(|msg| match msg.role {
                MessageRole::User => Message::user(msg.content.clone()),
                _ => Message::assistant(msg.content.clone()),
            })
            .collect();
        conversation.push(Message::user(user_message.content.clone()));

        if self.tools_enabled {
            return Ok(self.run_tool_loop(&conversation, system_prompt).await);
        }

        let raw = if self.stream_response {
            self.stream_text(&conversation, system_prompt).await
        } else {
            self.complete_response(&conversation, system_prompt).await
        };

        match raw {
            Ok(text) => {
                let mut segmenter = StreamSegmenter::new();
                let segments = segmenter.feed(&text);
                Ok(UiMessage::assistant_with_thinking(
                    segments.visible.trim().to_string(),
                    segmenter.reasoning().trim().to_string(),
                ))
            }
            Err(err) => Ok(UiMessage::assistant(format!(
                "Error generating response: {:#}",
                err
            ))),
        }
    }

    async fn run_tool_loop(&self, conversation: &[Message], system_prompt: &str) -> UiMessage {
        let engine = ToolConversationEngine::new(&self.client);
        match engine.run(conversation, &self.registry, Some(system_prompt)).await {
            Ok(output) => {
                let mut used_tools = Vec::new();
                for invocation in &output.invocations {
                    if !used_tools.contains(&invocation.tool) {
                        used_tools.push(invocation.tool.clone());
                    }
                }
                let mut segmenter = StreamSegmenter::new();
                let segments = segmenter.feed(&output.final_text);
                let mut msg = UiMessage::assistant_with_tools(
                    segments.visible.trim().to_string(),
                    used_tools,
                );
                msg.thinking = segmenter.reasoning().trim().to_string();
                msg
            }
            Err(err) => UiMessage::assistant(format!("Error generating response: {}", err)),
        }
    }

    async fn stream_text(
        &self,
        conversation: &[Message],
        system_prompt: &str,
    ) -> Result<String> {
        let (mut rx, handle) = self.client.stream(conversation, Some(system_prompt)).await?;
        while let Some(event) = rx.recv().await {
            if let StreamEvent::Error(e) = event {
                anyhow::bail!("{}", e);
            }
        }
        Ok(handle.await??)
    }

    async fn complete_response(
        &self,
        conversation: &[Message],
        system_prompt: &str,
    ) -> Result<String> {
        match self.client.complete(conversation, &[], Some(system_prompt)).await? {
            crate::llm::ChatOutcome::Answer(text) => Ok(text),
            // No tools were advertised; treat a tool request as empty text.
            crate::llm::ChatOutcome::ToolCalls(msg) => Ok(msg.text().to_string()),
        }
    }
}
