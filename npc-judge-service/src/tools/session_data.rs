use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{AgentTool, SessionParams, ToolObservation, ToolParameters, schema_of, session_id_param};
use crate::db::Database;
use crate::error::ServiceResult;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Headline metrics for one session
pub struct GetSessionDataTool {
    db: Arc<Database>,
}

impl GetSessionDataTool {
    pub const NAME: &'static str = "get_session_data";

    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AgentTool for GetSessionDataTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Retrieves game session data including metrics, NPC summaries, and statistics. \
         Requires 'sessionId' parameter."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SessionParams>()
    }

    async fn execute(&self, parameters: &ToolParameters) -> ServiceResult<ToolObservation> {
        let session_id = match session_id_param(parameters) {
            Ok(id) => id,
            Err(message) => return Ok(ToolObservation::failure(Self::NAME, message)),
        };

        let overview = match self.db.session_overview(&session_id) {
            Ok(overview) => overview,
            Err(e) if e.is_not_found() => {
                return Ok(ToolObservation::failure(Self::NAME, e.to_string()));
            }
            Err(e) => return Err(e),
        };

        let mut metrics = Map::new();
        metrics.insert("SessionId".to_string(), json!(session_id));
        metrics.insert(
            "TotalNpcs".to_string(),
            json!(overview.npc_summaries.len()),
        );
        metrics.insert("TotalMessages".to_string(), json!(overview.total_turns));
        metrics.insert(
            "AvgFairness".to_string(),
            json!(round2(overview.average_fairness())),
        );
        metrics.insert(
            "EscalationRate".to_string(),
            json!(round2(overview.escalation_rate())),
        );

        Ok(ToolObservation::metrics(Self::NAME, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{StoredVerdict, VerdictSource};
    use crate::judge::{JudgeVerdict, Tone};
    use crate::testing::turn_at;
    use crate::tools::ToolPayload;

    #[tokio::test]
    async fn test_session_metrics() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_conversation_turn(&turn_at("s1", "p1", "guard-1", "a", "b", 0))
            .unwrap();
        db.insert_conversation_turn(&turn_at("s1", "p1", "guard-1", "c", "d", 1))
            .unwrap();
        db.insert_conversation_turn(&turn_at("s1", "p1", "merchant-2", "e", "f", 2))
            .unwrap();
        db.insert_verdict(&StoredVerdict::new(
            "s1",
            "p1",
            "guard-1",
            JudgeVerdict {
                overall_tone: Tone::Hostile,
                in_character: true,
                fairness_score: 2,
                escalation_too_fast: true,
                summary: String::new(),
            },
            VerdictSource::Model,
        ))
        .unwrap();

        let tool = GetSessionDataTool::new(db);
        let params = json!({"sessionId": "s1"}).as_object().cloned().unwrap();
        let observation = tool.execute(&params).await.unwrap();

        let Some(ToolPayload::Metrics(metrics)) = observation.result else {
            panic!("expected metrics");
        };
        assert_eq!(metrics["SessionId"], json!("s1"));
        assert_eq!(metrics["TotalNpcs"], json!(2));
        assert_eq!(metrics["TotalMessages"], json!(3));
        // guard judged 2, merchant unjudged defaults to 5
        assert_eq!(metrics["AvgFairness"], json!(3.5));
        assert_eq!(metrics["EscalationRate"], json!(0.5));
    }

    #[tokio::test]
    async fn test_missing_session_id_is_failed_observation() {
        let tool = GetSessionDataTool::new(Arc::new(Database::open_in_memory().unwrap()));
        let params = json!({"session": "s1"}).as_object().cloned().unwrap();

        let observation = tool.execute(&params).await.unwrap();
        assert!(!observation.success);
        assert!(observation.result.is_none());
        assert_eq!(observation.tool_name, "get_session_data");
    }

    #[tokio::test]
    async fn test_unknown_session_is_failed_observation() {
        let tool = GetSessionDataTool::new(Arc::new(Database::open_in_memory().unwrap()));
        let params = json!({"sessionId": "ghost"}).as_object().cloned().unwrap();

        let observation = tool.execute(&params).await.unwrap();
        assert!(!observation.success);
        assert_eq!(
            observation.error_message.as_deref(),
            Some("Session not found: ghost")
        );
    }
}
