//! Reporting agent: a bounded Reason -> Act -> Observe loop over the
//! session tools, followed by one free-text Responding call.

mod prompts;
mod report;
mod state;

pub use report::{HtmlReportRenderer, Report, ReportRenderer, report_requested};
pub use state::{
    AgentState, MAX_ITERATIONS, ReasoningOutcome, ReasoningStep, ToolInvocation, parse_reasoning,
};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::tools::{Chart, ToolObservation, ToolRegistry};

/// Text shown when the Responding call returns nothing
const EMPTY_RESPONSE_TEXT: &str = "AI returned empty response.";

/// Final answer of one agent run
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub text: String,
    pub charts: Vec<Chart>,
    pub report: Option<Report>,
    pub iterations: u32,
}

pub struct ReActAgent {
    llm: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    renderer: Arc<dyn ReportRenderer>,
    config: AgentConfig,
}

impl ReActAgent {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        renderer: Arc<dyn ReportRenderer>,
        config: AgentConfig,
    ) -> Self {
        Self {
            llm,
            tools,
            renderer,
            config,
        }
    }

    /// Answer a natural-language question about game sessions.
    ///
    /// Runs at most [`MAX_ITERATIONS`] reasoning steps. Model transport errors
    /// and storage errors end the run; malformed model output, unknown tools
    /// and renderer failures do not.
    pub async fn run(&self, query: &str) -> ServiceResult<AgentResponse> {
        if query.trim().is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "Query cannot be empty".to_string(),
            });
        }

        let mut state = AgentState::new(query);
        info!(query_len = query.len(), "Agent run started");

        while state.should_reason() {
            state.iteration_count += 1;
            self.step(&mut state).await?;
        }

        metrics::histogram!("agent_iterations").record(f64::from(state.iteration_count));

        self.respond(state).await
    }

    /// One Reasoning step, plus Acting and Observing when a tool is named
    async fn step(&self, state: &mut AgentState) -> ServiceResult<()> {
        let request = ChatRequest::new(
            vec![
                ChatMessage::system(prompts::reasoning_system_prompt(&self.tools)),
                ChatMessage::user(prompts::reasoning_user_prompt(state)),
            ],
            self.config.reasoning_temperature,
        )
        .json();
        let raw = self.llm.chat(request).await?;

        let step = match parse_reasoning(&raw) {
            ReasoningOutcome::Step(step) => step,
            ReasoningOutcome::Unparseable { reason, .. } => {
                warn!(
                    iteration = state.iteration_count,
                    reason = %reason,
                    "Reasoning output unparseable, moving to response"
                );
                state.thoughts.push(ReasoningStep {
                    reasoning: "Failed to parse reasoning response".to_string(),
                    is_complete: true,
                    ..ReasoningStep::default()
                });
                state.terminal = true;
                return Ok(());
            }
        };

        debug!(
            iteration = state.iteration_count,
            next_action = step.next_action.as_deref().unwrap_or("-"),
            is_complete = step.is_complete,
            "Reasoning step"
        );

        let invocation = if step.is_complete {
            None
        } else {
            step.invocation()
        };
        let complete = step.is_complete;
        state.thoughts.push(step);

        if complete {
            state.terminal = true;
            return Ok(());
        }

        if let Some(invocation) = invocation {
            let observation = self.act(&invocation).await?;
            state.actions.push(invocation);
            state.observe(observation);
        }

        Ok(())
    }

    async fn act(&self, invocation: &ToolInvocation) -> ServiceResult<ToolObservation> {
        let observation = match self.tools.get(&invocation.tool_name) {
            Some(tool) => tool.execute(&invocation.parameters).await?,
            None => {
                warn!(tool = %invocation.tool_name, "Agent requested unknown tool");
                ToolObservation::failure(
                    &invocation.tool_name,
                    format!("Tool '{}' not found", invocation.tool_name),
                )
            }
        };

        metrics::counter!(
            "agent_tool_calls_total",
            "tool" => observation.tool_name.clone(),
            "success" => observation.success.to_string()
        )
        .increment(1);

        Ok(observation)
    }

    async fn respond(&self, state: AgentState) -> ServiceResult<AgentResponse> {
        let request = ChatRequest::new(
            vec![
                ChatMessage::system(prompts::RESPONSE_SYSTEM_PROMPT),
                ChatMessage::user(prompts::response_user_prompt(&state)),
            ],
            self.config.response_temperature,
        );
        let mut text = self.llm.chat(request).await?;
        if text.trim().is_empty() {
            text = EMPTY_RESPONSE_TEXT.to_string();
        }

        let report = if report_requested(&state.user_query) {
            match self.renderer.render(&text, &state.collected_charts) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "Report rendering failed, returning text only");
                    None
                }
            }
        } else {
            None
        };

        info!(
            iterations = state.iteration_count,
            actions = state.actions.len(),
            charts = state.collected_charts.len(),
            report = report.is_some(),
            "Agent run finished"
        );

        Ok(AgentResponse {
            text,
            charts: state.collected_charts,
            report,
            iterations: state.iteration_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, StoredVerdict, VerdictSource};
    use crate::error::ReportError;
    use crate::judge::{JudgeVerdict, Tone};
    use crate::testing::{ScriptedChatModel, turn_at};

    struct FailingRenderer;

    impl ReportRenderer for FailingRenderer {
        fn render(&self, _text: &str, _charts: &[Chart]) -> Result<Report, ReportError> {
            Err(ReportError::Rendering {
                message: "no fonts".to_string(),
            })
        }
    }

    fn session_db() -> Arc<Database> {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_conversation_turn(&turn_at("s1", "p1", "guard-1", "hi", "halt", 0))
            .unwrap();
        db.insert_verdict(&StoredVerdict::new(
            "s1",
            "p1",
            "guard-1",
            JudgeVerdict {
                overall_tone: Tone::Hostile,
                in_character: true,
                fairness_score: 4,
                escalation_too_fast: true,
                summary: String::new(),
            },
            VerdictSource::Model,
        ))
        .unwrap();
        db
    }

    fn agent(llm: Arc<ScriptedChatModel>, renderer: Arc<dyn ReportRenderer>) -> ReActAgent {
        ReActAgent::new(
            llm,
            Arc::new(ToolRegistry::with_default_tools(session_db())),
            renderer,
            AgentConfig::default(),
        )
    }

    const FETCH: &str = r#"{"reasoning": "Need metrics", "nextAction": "get_session_data", "actionParameters": {"sessionId": "s1"}, "isComplete": false}"#;
    const CHARTS: &str = r#"{"reasoning": "Need charts", "nextAction": "GENERATE_CHARTS", "actionParameters": {"sessionId": "s1"}, "isComplete": false}"#;
    const DONE: &str = r#"{"reasoning": "Enough data", "nextAction": null, "isComplete": true}"#;

    #[tokio::test]
    async fn test_collects_data_then_responds() {
        let llm = Arc::new(ScriptedChatModel::new(&[
            FETCH,
            CHARTS,
            DONE,
            "The guard was hostile.",
        ]));
        let agent = agent(llm.clone(), Arc::new(HtmlReportRenderer::new()));

        let response = agent.run("How did the guard do in s1?").await.unwrap();
        assert_eq!(response.text, "The guard was hostile.");
        assert_eq!(response.iterations, 3);
        assert_eq!(response.charts.len(), 3);
        assert!(response.report.is_none());

        let requests = llm.requests();
        assert_eq!(requests.len(), 4);
        assert!(requests[0].json_output);
        assert!(!requests[3].json_output);
        assert!(requests[2].messages[1].content.contains("- AvgFairness: 4"));
        assert!(requests[3].messages[1].content.contains("EscalationRate: 1"));
        assert!(
            requests[3].messages[1]
                .content
                .contains("Actions taken: get_session_data, GENERATE_CHARTS")
        );
    }

    #[tokio::test]
    async fn test_never_complete_stops_at_cap_and_responds() {
        let llm = Arc::new(ScriptedChatModel::repeating(FETCH));
        let agent = agent(llm.clone(), Arc::new(HtmlReportRenderer::new()));

        let response = agent.run("Tell me about s1").await.unwrap();
        assert_eq!(response.iterations, MAX_ITERATIONS);
        // five reasoning calls plus the response call
        assert_eq!(llm.call_count(), 6);
        assert_eq!(response.text, FETCH);
    }

    #[tokio::test]
    async fn test_unparseable_reasoning_is_implicit_completion() {
        let llm = Arc::new(ScriptedChatModel::new(&[
            "I am not sure what to do.",
            "Here is what I know.",
        ]));
        let agent = agent(llm.clone(), Arc::new(HtmlReportRenderer::new()));

        let response = agent.run("Summarise s1").await.unwrap();
        assert_eq!(response.iterations, 1);
        assert_eq!(response.text, "Here is what I know.");
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_session_id_leaves_data_unchanged() {
        let missing = r#"{"reasoning": "Try without id", "nextAction": "get_session_data", "actionParameters": {}, "isComplete": false}"#;
        let llm = Arc::new(ScriptedChatModel::new(&[missing, DONE, "No data."]));
        let agent = agent(llm.clone(), Arc::new(HtmlReportRenderer::new()));

        let response = agent.run("Summarise the session").await.unwrap();
        assert!(response.charts.is_empty());

        let requests = llm.requests();
        let second_reasoning = &requests[1].messages[1].content;
        assert!(second_reasoning.contains("- Action: get_session_data -> Success: false"));
        assert!(second_reasoning.contains("sessionId parameter is required"));
        assert!(!second_reasoning.contains("Collected Metrics"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failed_observation() {
        let bogus = r#"{"reasoning": "Try it", "nextAction": "delete_everything", "actionParameters": {}, "isComplete": false}"#;
        let llm = Arc::new(ScriptedChatModel::new(&[bogus, DONE, "Done."]));
        let agent = agent(llm.clone(), Arc::new(HtmlReportRenderer::new()));

        let response = agent.run("Do something").await.unwrap();
        assert_eq!(response.iterations, 2);
        assert!(
            llm.requests()[1].messages[1]
                .content
                .contains("Error: Tool 'delete_everything' not found")
        );
    }

    #[tokio::test]
    async fn test_report_rendered_when_requested() {
        let llm = Arc::new(ScriptedChatModel::new(&[CHARTS, DONE, "Report body."]));
        let agent = agent(llm, Arc::new(HtmlReportRenderer::new()));

        let response = agent.run("Export a report for s1").await.unwrap();
        let report = response.report.unwrap();
        assert!(report.file_name.starts_with("GameReport_"));
        let html = String::from_utf8(report.content).unwrap();
        assert!(html.contains("NPC Tone Distribution"));
    }

    #[tokio::test]
    async fn test_renderer_failure_keeps_text() {
        let llm = Arc::new(ScriptedChatModel::new(&[DONE, "Narrative only."]));
        let agent = agent(llm, Arc::new(FailingRenderer));

        let response = agent.run("Give me a PDF").await.unwrap();
        assert_eq!(response.text, "Narrative only.");
        assert!(response.report.is_none());
    }

    #[tokio::test]
    async fn test_model_failure_is_terminal() {
        let llm = Arc::new(ScriptedChatModel::new(&[FETCH]));
        let agent = agent(llm, Arc::new(HtmlReportRenderer::new()));

        let err = agent.run("Summarise s1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Llm(_)));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let llm = Arc::new(ScriptedChatModel::default());
        let agent = agent(llm.clone(), Arc::new(HtmlReportRenderer::new()));

        let err = agent.run("   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest { .. }));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_response_text_replaced() {
        let llm = Arc::new(ScriptedChatModel::new(&[DONE, ""]));
        let agent = agent(llm, Arc::new(HtmlReportRenderer::new()));

        let response = agent.run("Anything?").await.unwrap();
        assert_eq!(response.text, "AI returned empty response.");
    }
}
