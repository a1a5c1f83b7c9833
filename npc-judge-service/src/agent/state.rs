//! Per-invocation agent state and the reasoning-step parser.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::llm::extract_json_object;
use crate::tools::{Chart, ToolObservation, ToolParameters, ToolPayload};

/// Hard cap on reasoning iterations per request
pub const MAX_ITERATIONS: u32 = 5;

/// One Reasoning step as decided by the model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReasoningStep {
    pub reasoning: String,
    pub next_action: Option<String>,
    pub action_parameters: ToolParameters,
    pub is_complete: bool,
}

impl ReasoningStep {
    /// The tool call this step asks for, if any
    pub fn invocation(&self) -> Option<ToolInvocation> {
        let tool_name = self.next_action.as_deref()?.trim();
        if tool_name.is_empty() {
            return None;
        }
        Some(ToolInvocation {
            tool_name: tool_name.to_string(),
            parameters: self.action_parameters.clone(),
        })
    }
}

/// Result of reading a reasoning reply
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningOutcome {
    Step(ReasoningStep),
    /// No usable JSON object; treated as a request to respond
    Unparseable { raw: String, reason: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelStep {
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    next_action: Option<String>,
    #[serde(default)]
    action_parameters: Option<Value>,
    #[serde(default)]
    is_complete: Option<bool>,
}

/// Parse `{reasoning, nextAction?, actionParameters?, isComplete}` out of
/// model text. Missing fields take their defaults (`isComplete` is false);
/// parameters that are not an object are dropped.
pub fn parse_reasoning(raw: &str) -> ReasoningOutcome {
    let unparseable = |reason: String| ReasoningOutcome::Unparseable {
        raw: raw.to_string(),
        reason,
    };

    let Some(json) = extract_json_object(raw) else {
        return unparseable("no JSON object in reasoning output".to_string());
    };

    match serde_json::from_str::<ModelStep>(json) {
        Ok(step) => ReasoningOutcome::Step(ReasoningStep {
            reasoning: step.reasoning.unwrap_or_default(),
            next_action: step.next_action,
            action_parameters: match step.action_parameters {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            },
            is_complete: step.is_complete.unwrap_or(false),
        }),
        Err(e) => unparseable(format!("malformed reasoning JSON: {}", e)),
    }
}

/// A tool call the agent made
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub parameters: ToolParameters,
}

/// Everything one agent run has reasoned, done and learned so far
#[derive(Debug, Clone)]
pub struct AgentState {
    pub user_query: String,
    pub thoughts: Vec<ReasoningStep>,
    pub actions: Vec<ToolInvocation>,
    pub observations: Vec<ToolObservation>,
    pub collected_metrics: Map<String, Value>,
    pub collected_charts: Vec<Chart>,
    pub iteration_count: u32,
    /// Set once the loop should move on to Responding
    pub terminal: bool,
}

impl AgentState {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            thoughts: Vec::new(),
            actions: Vec::new(),
            observations: Vec::new(),
            collected_metrics: Map::new(),
            collected_charts: Vec::new(),
            iteration_count: 0,
            terminal: false,
        }
    }

    pub fn should_reason(&self) -> bool {
        !self.terminal && self.iteration_count < MAX_ITERATIONS
    }

    /// Record an observation. Successful metrics overwrite same-named keys;
    /// successful charts are appended; failures change nothing else.
    pub fn observe(&mut self, observation: ToolObservation) {
        if observation.success {
            match &observation.result {
                Some(ToolPayload::Metrics(metrics)) => {
                    for (key, value) in metrics {
                        self.collected_metrics.insert(key.clone(), value.clone());
                    }
                }
                Some(ToolPayload::Charts(charts)) => {
                    self.collected_charts.extend(charts.iter().cloned());
                }
                None => {}
            }
        }
        self.observations.push(observation);
    }
}
