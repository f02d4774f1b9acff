mod file;
mod find;

pub use file::FileTool;
pub use find::FindFileTool;

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;

/// A locally-executable capability the backend can request by name.
///
/// Arguments arrive as a JSON value straight from the backend, so every tool
/// deserializes against its own typed parameter struct; a malformed payload
/// fails as an ordinary tool error, never a crash.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameter_schema(&self) -> serde_json::Value;
    async fn call(&self, args: serde_json::Value) -> Result<String>;
}

/// JSON schema for a tool's parameter struct.
pub(crate) fn schema_of<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

/// Ordered collection of the tools offered to the backend for one run.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the standard file read/write and search tools.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FileTool::new()));
        registry.register(Box::new(FindFileTool::new()));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(AsRef::as_ref)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Serialize the registry as an OpenAI-style tool catalog.
    pub fn catalog(&self) -> Vec<serde_json::Value> {
        self.tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameter_schema(),
                    }
                })
            })
            .collect()
    }
}
