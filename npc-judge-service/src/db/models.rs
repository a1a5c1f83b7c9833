//! Database record types.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::judge::{JudgeVerdict, Tone};
use crate::tools::Chart;

/// Fixed-width UTC timestamps so lexical order in SQLite matches time order
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_optional_timestamp(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_timestamp)
}

/// One player message and the NPC's reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub session_id: String,
    pub player_id: String,
    pub npc_id: String,
    pub player_message: String,
    pub npc_response: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let timestamp_str: String = row.get(6)?;

        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            player_id: row.get(2)?,
            npc_id: row.get(3)?,
            player_message: row.get(4)?,
            npc_response: row.get(5)?,
            timestamp: parse_timestamp(&timestamp_str),
        })
    }
}

/// A behavioural rule an NPC is expected to follow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcRule {
    pub id: String,
    pub npc_id: String,
    pub rule_text: String,
    pub created_at: DateTime<Utc>,
}

impl NpcRule {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(3)?;

        Ok(Self {
            id: row.get(0)?,
            npc_id: row.get(1)?,
            rule_text: row.get(2)?,
            created_at: parse_timestamp(&created_at_str),
        })
    }
}

/// Whether a stored verdict came from the model or replaced invalid output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    Model,
    Fallback,
}

/// Append-only verdict record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVerdict {
    pub id: String,
    pub session_id: String,
    pub player_id: String,
    pub npc_id: String,
    pub verdict: JudgeVerdict,
    pub source: VerdictSource,
    pub created_at: DateTime<Utc>,
}

impl StoredVerdict {
    pub fn new(
        session_id: &str,
        player_id: &str,
        npc_id: &str,
        verdict: JudgeVerdict,
        source: VerdictSource,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            player_id: player_id.to_string(),
            npc_id: npc_id.to_string(),
            verdict,
            source,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let tone_str: String = row.get(4)?;
        let source_str: String = row.get(9)?;
        let created_at_str: String = row.get(10)?;

        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            player_id: row.get(2)?,
            npc_id: row.get(3)?,
            verdict: JudgeVerdict {
                overall_tone: tone_str.parse().unwrap_or(Tone::Neutral),
                in_character: row.get(5)?,
                fairness_score: row.get(6)?,
                escalation_too_fast: row.get(7)?,
                summary: row.get(8)?,
            },
            source: source_str.parse().unwrap_or(VerdictSource::Model),
            created_at: parse_timestamp(&created_at_str),
        })
    }
}

/// Lifecycle of a queued judge or agent request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Queued request to judge one (session, player, NPC) conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub id: String,
    pub session_id: String,
    pub player_id: String,
    pub npc_id: String,
    pub status: RequestStatus,
    pub error_code: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JudgeRequest {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status_str: String = row.get(4)?;
        let created_at_str: String = row.get(7)?;

        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            player_id: row.get(2)?,
            npc_id: row.get(3)?,
            status: status_str.parse().unwrap_or(RequestStatus::Failed),
            error_code: row.get(5)?,
            error: row.get(6)?,
            created_at: parse_timestamp(&created_at_str),
            completed_at: parse_optional_timestamp(row.get(8)?),
        })
    }
}

/// Queued natural-language request for the reporting agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub id: String,
    pub requester_id: String,
    pub query: String,
    pub status: RequestStatus,
    pub response_text: Option<String>,
    pub charts: Vec<Chart>,
    pub report_path: Option<String>,
    pub error_code: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AgentRequest {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status_str: String = row.get(3)?;
        let charts_str: Option<String> = row.get(5)?;
        let created_at_str: String = row.get(9)?;

        Ok(Self {
            id: row.get(0)?,
            requester_id: row.get(1)?,
            query: row.get(2)?,
            status: status_str.parse().unwrap_or(RequestStatus::Failed),
            response_text: row.get(4)?,
            charts: charts_str
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            report_path: row.get(6)?,
            error_code: row.get(7)?,
            error: row.get(8)?,
            created_at: parse_timestamp(&created_at_str),
            completed_at: parse_optional_timestamp(row.get(10)?),
        })
    }
}

/// Per-NPC aggregate for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcSessionSummary {
    pub npc_id: String,
    pub overall_tone: Tone,
    pub fairness: u8,
    pub escalation: bool,
    pub total_turns: usize,
    /// False when no verdict exists yet and the fields above are defaults
    pub judged: bool,
}

/// Everything the reporting tools know about one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOverview {
    pub session_id: String,
    pub player_ids: Vec<String>,
    pub npc_summaries: Vec<NpcSessionSummary>,
    pub total_turns: usize,
}
