use super::{ChatBackend, ChatOutcome, Message, ToolInvocation};
use crate::tools::ToolRegistry;
use thiserror::Error;

/// Ceiling on backend round-trips per run. The backend must not be able to
/// force unbounded local tool execution.
pub const DEFAULT_MAX_ROUNDS: u32 = 8;

/// Failures an engine run can end with. Tool-level problems are not here:
/// they are recovered into result strings and fed back to the backend.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("backend request failed: {0}")]
    Transport(String),

    #[error("backend kept requesting tools for {limit} rounds without answering")]
    RoundLimitExceeded { limit: u32 },
}

/// Result of a completed engine run: the final answer plus an audit trail of
/// every tool execution, in call order.
#[derive(Debug)]
pub struct RunOutput {
    pub final_text: String,
    pub invocations: Vec<ToolInvocation>,
}

/// Drives a bounded multi-round exchange with the backend, transparently
/// executing requested tool calls and feeding their results back until a
/// plain-text answer arrives.
///
/// Each `run` owns its own conversation copy and round counter; the engine
/// performs no I/O beyond the injected backend and the caller's tools.
pub struct ToolConversationEngine<'a> {
    backend: &'a dyn ChatBackend,
    max_rounds: u32,
}

impl<'a> ToolConversationEngine<'a> {
    pub fn new(backend: &'a dyn ChatBackend) -> Self {
        Self {
            backend,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Run the loop to completion.
    ///
    /// Tool calls within one response are executed and their results appended
    /// in exactly the order the backend listed them; a failing or unknown
    /// tool becomes a descriptive result string rather than aborting the run.
    pub async fn run(
        &self,
        conversation: &[Message],
        tools: &ToolRegistry,
        system_prompt: Option<&str>,
    ) -> Result<RunOutput, EngineError> {
        let mut messages = conversation.to_vec();
        let catalog = tools.catalog();
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        for _round in 0..self.max_rounds {
            let outcome = self
                .backend
                .complete(&messages, &catalog, system_prompt)
                .await
                .map_err(|e| EngineError::Transport(format!("{:#}", e)))?;

            match outcome {
                ChatOutcome::Answer(text) => {
                    return Ok(RunOutput {
                        final_text: text,
                        invocations,
                    });
                }
                ChatOutcome::ToolCalls(assistant_msg) => {
                    let calls = assistant_msg.tool_calls.clone();
                    // The assistant's tool-call message goes back as received,
                    // followed by one tool message per request.
                    messages.push(assistant_msg);

                    for call in calls {
                        let (args, result) = self.execute_call(tools, &call).await;
                        messages.push(Message::tool_result(call.id.clone(), result.clone()));
                        invocations.push(ToolInvocation {
                            tool: call.name().to_string(),
                            args,
                            result,
                        });
                    }
                }
            }
        }

        Err(EngineError::RoundLimitExceeded {
            limit: self.max_rounds,
        })
    }

    /// Execute one tool call, converting every failure mode into a result
    /// string the backend can read and adapt to.
    async fn execute_call(
        &self,
        tools: &ToolRegistry,
        call: &super::ToolCall,
    ) -> (serde_json::Value, String) {
        let name = call.name();

        let args = match call.parse_arguments() {
            Ok(args) => args,
            Err(e) => {
                let raw = serde_json::Value::String(call.function.arguments.clone());
                return (
                    raw,
                    format!("Error: invalid arguments for tool '{}': {}", name, e),
                );
            }
        };

        let Some(tool) = tools.get(name) else {
            return (
                args,
                format!(
                    "Error: tool '{}' is not available. Available tools: {}",
                    name,
                    tools.names().join(", ")
                ),
            );
        };

        match tool.call(args.clone()).await {
            Ok(output) => (args, output),
            Err(e) => (args, format!("Error: tool '{}' failed: {:#}", name, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::models::{FunctionCall, Role, ToolCall};
    use crate::llm::StreamEvent;
    use crate::tools::Tool;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    /// Backend that replays a fixed script of outcomes and records every
    /// conversation it was sent.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<ChatOutcome>>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<ChatOutcome>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn conversations(&self) -> Vec<Vec<Message>> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[serde_json::Value],
            _system_prompt: Option<&str>,
        ) -> Result<ChatOutcome> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }

        async fn stream(
            &self,
            _messages: &[Message],
            _system_prompt: Option<&str>,
        ) -> Result<(mpsc::Receiver<StreamEvent>, JoinHandle<Result<String>>)> {
            Err(anyhow!("not scripted"))
        }
    }

    fn tool_calls_outcome(calls: &[(&str, &str, &str)]) -> ChatOutcome {
        ChatOutcome::ToolCalls(Message {
            role: Role::Assistant,
            content: None,
            tool_calls: calls
                .iter()
                .map(|(id, name, args)| ToolCall {
                    id: id.to_string(),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: name.to_string(),
                        arguments: args.to_string(),
                    },
                })
                .collect(),
            tool_call_id: None,
        })
    }

    /// Tool that returns a fixed answer and logs its call order.
    struct RecordingTool {
        name: &'static str,
        reply: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &'static str {
            self.name
        }
        fn description(&self) -> &'static str {
            "test tool"
        }
        fn parameter_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, _args: serde_json::Value) -> Result<String> {
            self.log.lock().unwrap().push(self.name.to_string());
            Ok(self.reply.to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn description(&self) -> &'static str {
            "always fails"
        }
        fn parameter_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, _args: serde_json::Value) -> Result<String> {
            Err(anyhow!("disk on fire"))
        }
    }

    fn registry_with(tools: Vec<Box<dyn Tool>>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for t in tools {
            registry.register(t);
        }
        registry
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(vec![Box::new(RecordingTool {
            name: "x",
            reply: "42",
            log: log.clone(),
        })]);

        let backend = ScriptedBackend::new(vec![
            Ok(tool_calls_outcome(&[("call_1", "x", r#"{"a":1}"#)])),
            Ok(ChatOutcome::Answer("done".to_string())),
        ]);

        let engine = ToolConversationEngine::new(&backend);
        let out = engine
            .run(&[Message::user("go")], &registry, None)
            .await
            .unwrap();

        assert_eq!(out.final_text, "done");
        assert_eq!(out.invocations.len(), 1);
        assert_eq!(out.invocations[0].tool, "x");
        assert_eq!(out.invocations[0].args["a"], 1);
        assert_eq!(out.invocations[0].result, "42");
    }

    #[tokio::test]
    async fn test_tool_messages_appended_in_order_with_call_ids() {
        let registry = registry_with(vec![]);
        let backend = ScriptedBackend::new(vec![
            Ok(tool_calls_outcome(&[("call_1", "x", "{}")])),
            Ok(ChatOutcome::Answer("ok".to_string())),
        ]);

        let engine = ToolConversationEngine::new(&backend);
        engine
            .run(&[Message::user("go")], &registry, None)
            .await
            .unwrap();

        // Second round sees: user, assistant tool-call message, tool result.
        let seen = backend.conversations();
        assert_eq!(seen.len(), 2);
        let second = &seen[1];
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, Role::Assistant);
        assert_eq!(second[1].tool_calls.len(), 1);
        assert_eq!(second[2].role, Role::Tool);
        assert_eq!(second[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_failing_tool_recovers_to_result_string() {
        let registry = registry_with(vec![Box::new(FailingTool)]);
        let backend = ScriptedBackend::new(vec![
            Ok(tool_calls_outcome(&[("call_1", "broken", "{}")])),
            Ok(ChatOutcome::Answer("recovered".to_string())),
        ]);

        let engine = ToolConversationEngine::new(&backend);
        let out = engine
            .run(&[Message::user("go")], &registry, None)
            .await
            .unwrap();

        assert_eq!(out.final_text, "recovered");
        assert!(!out.invocations[0].result.is_empty());
        assert!(out.invocations[0].result.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_as_unavailable() {
        let registry = registry_with(vec![]);
        let backend = ScriptedBackend::new(vec![
            Ok(tool_calls_outcome(&[("call_1", "mystery", "{}")])),
            Ok(ChatOutcome::Answer("ok".to_string())),
        ]);

        let engine = ToolConversationEngine::new(&backend);
        let out = engine
            .run(&[Message::user("go")], &registry, None)
            .await
            .unwrap();

        assert!(out.invocations[0].result.contains("not available"));

        // The result still went back to the backend as a tool message.
        let second = &backend.conversations()[1];
        assert_eq!(second[2].role, Role::Tool);
        assert_eq!(second[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_malformed_arguments_recovered() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(vec![Box::new(RecordingTool {
            name: "x",
            reply: "never",
            log: log.clone(),
        })]);
        let backend = ScriptedBackend::new(vec![
            Ok(tool_calls_outcome(&[("call_1", "x", "{bad json")])),
            Ok(ChatOutcome::Answer("ok".to_string())),
        ]);

        let engine = ToolConversationEngine::new(&backend);
        let out = engine
            .run(&[Message::user("go")], &registry, None)
            .await
            .unwrap();

        assert!(out.invocations[0].result.contains("invalid arguments"));
        // The executor never ran.
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_limit_exceeded() {
        let registry = registry_with(vec![]);
        let script: Vec<Result<ChatOutcome>> = (0..10)
            .map(|i| Ok(tool_calls_outcome(&[(&format!("call_{}", i), "x", "{}")])))
            .collect();
        let backend = ScriptedBackend::new(script);

        let engine = ToolConversationEngine::new(&backend).with_max_rounds(3);
        let err = engine
            .run(&[Message::user("go")], &registry, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::RoundLimitExceeded { limit: 3 }
        ));
        assert_eq!(backend.conversations().len(), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_once() {
        let registry = registry_with(vec![]);
        let backend = ScriptedBackend::new(vec![Err(anyhow!("connection refused"))]);

        let engine = ToolConversationEngine::new(&backend);
        let err = engine
            .run(&[Message::user("go")], &registry, None)
            .await
            .unwrap_err();

        match err {
            EngineError::Transport(msg) => assert!(msg.contains("connection refused")),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_calls_execute_in_request_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(vec![
            Box::new(RecordingTool {
                name: "first",
                reply: "1",
                log: log.clone(),
            }),
            Box::new(RecordingTool {
                name: "second",
                reply: "2",
                log: log.clone(),
            }),
        ]);

        let backend = ScriptedBackend::new(vec![
            Ok(tool_calls_outcome(&[
                ("call_a", "second", "{}"),
                ("call_b", "first", "{}"),
            ])),
            Ok(ChatOutcome::Answer("ok".to_string())),
        ]);

        let engine = ToolConversationEngine::new(&backend);
        let out = engine
            .run(&[Message::user("go")], &registry, None)
            .await
            .unwrap();

        // Both the execution log and the audit trail follow request order,
        // not registration order.
        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
        assert_eq!(out.invocations[0].tool, "second");
        assert_eq!(out.invocations[1].tool, "first");

        let second_round = &backend.conversations()[1];
        assert_eq!(second_round[2].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(second_round[3].tool_call_id.as_deref(), Some("call_b"));
    }
}
