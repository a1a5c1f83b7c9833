//! Data-gathering tools the reporting agent can call.
//!
//! Tools are looked up by name in a [`ToolRegistry`]. Bad parameters and
//! unknown sessions come back as a failed [`ToolObservation`] so the agent can
//! correct itself; storage errors are returned as `Err` and end the request.

mod charts;
mod session_data;
mod sessions;

pub use charts::{Chart, ChartKind, GenerateChartsTool};
pub use session_data::GetSessionDataTool;
pub use sessions::ListSessionsTool;

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::Database;
use crate::error::ServiceResult;

/// Tool parameters as sent by the model
pub type ToolParameters = Map<String, Value>;

/// What a successful tool call produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ToolPayload {
    Metrics(Map<String, Value>),
    Charts(Vec<Chart>),
}

/// Result of one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolObservation {
    pub tool_name: String,
    pub success: bool,
    pub result: Option<ToolPayload>,
    pub error_message: Option<String>,
}

impl ToolObservation {
    pub fn metrics(tool_name: &str, metrics: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: true,
            result: Some(ToolPayload::Metrics(metrics)),
            error_message: None,
        }
    }

    pub fn charts(tool_name: &str, charts: Vec<Chart>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: true,
            result: Some(ToolPayload::Charts(charts)),
            error_message: None,
        }
    }

    pub fn failure(tool_name: &str, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: false,
            result: None,
            error_message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the parameter object
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, parameters: &ToolParameters) -> ServiceResult<ToolObservation>;
}

/// Name to tool map, in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session reporting tools backed by `db`
    pub fn with_default_tools(db: Arc<Database>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GetSessionDataTool::new(Arc::clone(&db))));
        registry.register(Arc::new(GenerateChartsTool::new(Arc::clone(&db))));
        registry.register(Arc::new(ListSessionsTool::new(db)));
        registry
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        self.tools
            .retain(|existing| !existing.name().eq_ignore_ascii_case(tool.name()));
        self.tools.push(tool);
    }

    /// Case-insensitive exact lookup
    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentTool>> {
        let name = name.trim();
        self.tools
            .iter()
            .find(|tool| tool.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AgentTool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Parameters shared by the per-session tools
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionParams {
    /// Game session to inspect
    pub session_id: String,
}

pub(crate) fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

/// Deserialize tool parameters, describing what was wrong on failure
pub(crate) fn parse_parameters<T: DeserializeOwned>(
    parameters: &ToolParameters,
) -> Result<T, String> {
    serde_json::from_value(Value::Object(parameters.clone()))
        .map_err(|e| format!("Invalid parameters: {}", e))
}

/// `sessionId` from the parameters, rejecting blank values
pub(crate) fn session_id_param(parameters: &ToolParameters) -> Result<String, String> {
    let params: SessionParams = parse_parameters(parameters)
        .map_err(|_| "sessionId parameter is required".to_string())?;
    let session_id = params.session_id.trim();
    if session_id.is_empty() {
        return Err("sessionId parameter is required".to_string());
    }
    Ok(session_id.to_string())
}
