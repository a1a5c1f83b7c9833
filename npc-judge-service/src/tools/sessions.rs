use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{AgentTool, ToolObservation, ToolParameters, parse_parameters, schema_of};
use crate::db::Database;
use crate::error::ServiceResult;

/// `list_sessions` takes no parameters
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct NoParams {}

/// Lists known session ids so the agent can resolve "the last session"
pub struct ListSessionsTool {
    db: Arc<Database>,
}

impl ListSessionsTool {
    pub const NAME: &'static str = "list_sessions";

    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AgentTool for ListSessionsTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Lists all recorded game session ids, oldest first. Takes no parameters."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<NoParams>()
    }

    async fn execute(&self, parameters: &ToolParameters) -> ServiceResult<ToolObservation> {
        if let Err(message) = parse_parameters::<NoParams>(parameters) {
            return Ok(ToolObservation::failure(Self::NAME, message));
        }

        let session_ids = self.db.list_session_ids()?;

        let mut metrics = Map::new();
        metrics.insert("TotalSessions".to_string(), json!(session_ids.len()));
        metrics.insert("SessionIds".to_string(), json!(session_ids));

        Ok(ToolObservation::metrics(Self::NAME, metrics))
    }
}
