//! Function-calling tools for the assistant
//!
//! Each tool describes its parameters as JSON schema and returns a JSON
//! string result. Handlers are stateless lookups.

mod time;
mod weather;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::{Error, Result};

pub use time::GetTime;
pub use weather::GetWeather;

/// Function-calling tool description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    #[must_use]
    pub fn function(
        name: &'static str,
        description: &'static str,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function",
            name,
            description,
            parameters,
        }
    }
}

/// A callable tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run with parsed arguments, returning a JSON-serialized result
    async fn call(&self, arguments: serde_json::Value) -> Result<String>;
}

/// Named tool lookup
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in weather and time tools
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GetWeather));
        registry.register(Arc::new(GetTime::default()));
        registry
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) {
        let name = tool.definition().name;
        if self.tools.insert(name, tool).is_some() {
            tracing::warn!(name, "tool replaced");
        }
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a tool call
    ///
    /// Arguments that are empty or not valid JSON are treated as `{}`.
    ///
    /// # Errors
    ///
    /// Returns error if the tool is unknown or fails
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::Tool(format!("unknown tool: {name}")))?;

        let args: serde_json::Value = serde_json::from_str(arguments)
            .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::default()));

        tracing::debug!(name, %args, "executing tool");
        tool.call(args).await.inspect_err(|e| {
            tracing::warn!(name, error = %e, "tool call failed");
        })
    }
}
