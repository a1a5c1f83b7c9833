use std::fmt::Write;

use serde_json::Value;

use super::state::AgentState;
use crate::tools::{Chart, ToolRegistry};

pub const RESPONSE_SYSTEM_PROMPT: &str = "You are a game analytics assistant.
Generate a clear, concise report based on the data provided.
Reference specific numbers and insights from the data.
Do NOT make up numbers - only use what's provided.";

/// Strings render bare, everything else as JSON
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn reasoning_system_prompt(tools: &ToolRegistry) -> String {
    let mut tool_list = String::new();
    for tool in tools.iter() {
        let _ = writeln!(tool_list, "- {}: {}", tool.name(), tool.description());
        let _ = writeln!(tool_list, "  parameters: {}", tool.parameters_schema());
    }

    format!(
        r#"You are a ReAct-style AI agent that reasons about user queries and takes actions.

Available tools:
{tool_list}
Your task:
1. Analyze the user query and current state
2. Decide if you need more information (call a tool) or if you have enough to answer
3. If you need more info, specify which tool to call and its parameters
4. If you have enough info, set isComplete=true

Output JSON with:
- reasoning: Your thought process
- nextAction: Tool name to call (or null if complete)
- actionParameters: Object of parameters for the tool (or null)
- isComplete: true if ready to generate final response"#
    )
}

/// Prior thoughts, action results and collected data for the next Reasoning step
pub fn reasoning_context(state: &AgentState) -> String {
    let mut context = String::new();

    if !state.thoughts.is_empty() {
        context.push_str("Previous Thoughts:\n");
        for thought in &state.thoughts {
            let _ = writeln!(context, "- {}", thought.reasoning);
        }
    }

    if !state.actions.is_empty() && !state.observations.is_empty() {
        context.push_str("\nPrevious Actions & Results:\n");
        for (action, observation) in state.actions.iter().zip(&state.observations) {
            let _ = writeln!(
                context,
                "- Action: {} -> Success: {}",
                action.tool_name, observation.success
            );
            if let Some(error) = &observation.error_message {
                let _ = writeln!(context, "  Error: {}", error);
            }
        }
    }

    if !state.collected_metrics.is_empty() {
        context.push_str("\nCollected Metrics:\n");
        for (key, value) in &state.collected_metrics {
            let _ = writeln!(context, "- {}: {}", key, display_value(value));
        }
    }

    if !state.collected_charts.is_empty() {
        let _ = writeln!(
            context,
            "\nCollected Charts: {} charts available",
            state.collected_charts.len()
        );
    }

    context
}

pub fn reasoning_user_prompt(state: &AgentState) -> String {
    format!(
        "User Query: {}\n\nCurrent State:\n{}\n\nWhat should I do next?",
        state.user_query,
        reasoning_context(state)
    )
}

fn render_charts(charts: &[Chart]) -> String {
    if charts.is_empty() {
        return "No charts available.".to_string();
    }
    charts
        .iter()
        .map(|chart| {
            let values: Vec<String> = chart.values.iter().map(|v| v.to_string()).collect();
            format!(
                "- {} ({} chart):\n  Labels: {}\n  Values: {}",
                chart.title,
                chart.kind,
                chart.labels.join(", "),
                values.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Final Responding prompt: query, compact action log and all collected data
pub fn response_user_prompt(state: &AgentState) -> String {
    let mut summary = format!(
        "Agent executed {} reasoning cycles.",
        state.iteration_count
    );
    if !state.actions.is_empty() {
        let names: Vec<&str> = state.actions.iter().map(|a| a.tool_name.as_str()).collect();
        let _ = write!(summary, "\nActions taken: {}", names.join(", "));
    }

    let metrics = if state.collected_metrics.is_empty() {
        "No metrics available.".to_string()
    } else {
        state
            .collected_metrics
            .iter()
            .map(|(key, value)| format!("{}: {}", key, display_value(value)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "User Query: {}\n\nAgent Process:\n{}\n\nCollected Data:\nMetrics:\n{}\n\nCharts:\n{}\n\n\
         Generate a comprehensive response to the user's query.",
        state.user_query,
        summary,
        metrics,
        render_charts(&state.collected_charts)
    )
}
