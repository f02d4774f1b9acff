use super::models::{ChatRequest, ChatResponse, Message, StreamChunk};
use super::{ChatBackend, ChatOutcome, StreamEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Client for any endpoint speaking the OpenAI chat-completions protocol
/// (OpenAI, Gemini's compatibility layer, vLLM, llama.cpp, ...).
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
        system_prompt: Option<&str>,
        stream: bool,
    ) -> ChatRequest {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(sys) = system_prompt {
            api_messages.push(Message::system(sys));
        }
        api_messages.extend(messages.iter().cloned());

        ChatRequest {
            model: self.model.clone(),
            messages: api_messages,
            tools: tools.to_vec(),
            max_tokens: Some(self.max_tokens),
            stream: if stream { Some(true) } else { None },
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn send(&self, body: &ChatRequest) -> Result<reqwest::Response> {
        let response = self
            .authorize(self.http.post(self.completions_url()))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.completions_url()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("API error {}: {}", status, text);
        }

        Ok(response)
    }

    /// Minimal round-trip used by `config test`; not part of the chat loop.
    pub async fn test_connection(&self) -> Result<()> {
        let mut request = self.build_request(&[Message::user("ping")], &[], None, false);
        request.max_tokens = Some(1);

        let response = self
            .send(&request)
            .await
            .with_context(|| format!("Connection test against {} failed", self.base_url))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Endpoint replied but not with a chat completion")?;

        if parsed.choices.is_empty() {
            anyhow::bail!("Endpoint replied with no choices; is '{}' a valid model?", self.model);
        }

        Ok(())
    }
}

/// Classify a non-streaming response into an answer or a tool-call request.
fn outcome_from_response(response: ChatResponse) -> Result<ChatOutcome> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .context("Response contained no choices")?;

    if choice.message.tool_calls.is_empty() {
        Ok(ChatOutcome::Answer(choice.message.text().to_string()))
    } else {
        Ok(ChatOutcome::ToolCalls(choice.message))
    }
}

/// Extract the text delta from one SSE data payload, if any.
fn delta_from_data(data: &str) -> Option<String> {
    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
        system_prompt: Option<&str>,
    ) -> Result<ChatOutcome> {
        let request = self.build_request(messages, tools, system_prompt, false);
        let response = self.send(&request).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        outcome_from_response(parsed)
    }

    async fn stream(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<(mpsc::Receiver<StreamEvent>, JoinHandle<Result<String>>)> {
        let request = self.build_request(messages, &[], system_prompt, true);
        let response = self.send(&request).await?;

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let mut byte_stream = response.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut buffer = String::new();
            let mut full_text = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let msg = format!("Stream read error: {}", e);
                        let _ = tx.send(StreamEvent::Error(msg.clone())).await;
                        anyhow::bail!(msg);
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // SSE frames are newline-delimited `data: ` lines.
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer.drain(..=line_end);

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    if let Some(data) = line.strip_prefix("data: ") {
                        if data == "[DONE]" {
                            let _ = tx.send(StreamEvent::Done).await;
                            continue;
                        }
                        if let Some(delta) = delta_from_data(data) {
                            full_text.push_str(&delta);
                            let _ = tx.send(StreamEvent::Delta(delta)).await;
                        }
                    }
                }
            }

            let _ = tx.send(StreamEvent::Done).await;
            Ok(full_text)
        });

        Ok((rx, handle))
    }
}
