use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use tracing::debug;

use super::{AgentTool, SessionParams, ToolObservation, ToolParameters, schema_of, session_id_param};
use crate::db::{Database, NpcSessionSummary};
use crate::error::ServiceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Pie,
}

/// Chart data handed to the caller and the report renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

pub(crate) fn tone_distribution_chart(npcs: &[NpcSessionSummary]) -> Chart {
    let mut labels: Vec<String> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    for npc in npcs {
        let tone = npc.overall_tone.to_string();
        match labels.iter().position(|label| *label == tone) {
            Some(index) => values[index] += 1.0,
            None => {
                labels.push(tone);
                values.push(1.0);
            }
        }
    }

    Chart {
        kind: ChartKind::Pie,
        title: "NPC Tone Distribution".to_string(),
        labels,
        values,
    }
}

pub(crate) fn fairness_chart(npcs: &[NpcSessionSummary]) -> Chart {
    Chart {
        kind: ChartKind::Bar,
        title: "NPC Average Fairness".to_string(),
        labels: npcs.iter().map(|n| n.npc_id.clone()).collect(),
        values: npcs.iter().map(|n| f64::from(n.fairness)).collect(),
    }
}

pub(crate) fn escalation_chart(npcs: &[NpcSessionSummary]) -> Chart {
    Chart {
        kind: ChartKind::Bar,
        title: "NPC Escalation (1 = escalated)".to_string(),
        labels: npcs.iter().map(|n| n.npc_id.clone()).collect(),
        values: npcs
            .iter()
            .map(|n| if n.escalation { 1.0 } else { 0.0 })
            .collect(),
    }
}

/// Tone, fairness and escalation charts for one session
pub struct GenerateChartsTool {
    db: Arc<Database>,
}

impl GenerateChartsTool {
    pub const NAME: &'static str = "generate_charts";

    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AgentTool for GenerateChartsTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Generates visualization charts (pie, bar) from session data. Requires 'sessionId' \
         parameter. Returns chart data for tone distribution, fairness, and escalation."
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
                return Ok(ToolObservation::failure(
                    Self::NAME,
                    "No NPC data found for this session",
                ));
            }
            Err(e) => return Err(e),
        };

        let npcs = &overview.npc_summaries;
        let charts = vec![
            tone_distribution_chart(npcs),
            fairness_chart(npcs),
            escalation_chart(npcs),
        ];
        debug!(session_id = %session_id, npcs = npcs.len(), "Generated session charts");

        Ok(ToolObservation::charts(Self::NAME, charts))
    }
}
