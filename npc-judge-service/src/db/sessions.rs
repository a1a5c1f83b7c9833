//! Session-level aggregates built from turns and verdicts.

use super::Database;
use super::models::{NpcSessionSummary, SessionOverview};
use crate::error::{ServiceError, ServiceResult};
use crate::judge::JudgeVerdict;

impl Database {
    /// Players, per-NPC summaries and turn counts for one session.
    ///
    /// Each NPC is summarised by its most recent verdict; an NPC that has not
    /// been judged yet gets neutral defaults with `judged = false`.
    pub fn session_overview(&self, session_id: &str) -> ServiceResult<SessionOverview> {
        let turns = self.get_session_turns(session_id)?;
        if turns.is_empty() {
            return Err(ServiceError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        let verdicts = self.get_session_verdicts(session_id)?;

        let mut player_ids: Vec<String> = Vec::new();
        let mut npc_ids: Vec<String> = Vec::new();
        for turn in &turns {
            if !player_ids.contains(&turn.player_id) {
                player_ids.push(turn.player_id.clone());
            }
            if !npc_ids.contains(&turn.npc_id) {
                npc_ids.push(turn.npc_id.clone());
            }
        }

        let npc_summaries = npc_ids
            .into_iter()
            .map(|npc_id| {
                let total_turns = turns.iter().filter(|t| t.npc_id == npc_id).count();
                let latest = verdicts.iter().rev().find(|v| v.npc_id == npc_id);
                let (verdict, judged) = match latest {
                    Some(stored) => (stored.verdict.clone(), true),
                    None => (JudgeVerdict::fallback(), false),
                };

                NpcSessionSummary {
                    npc_id,
                    overall_tone: verdict.overall_tone,
                    fairness: verdict.fairness_score,
                    escalation: verdict.escalation_too_fast,
                    total_turns,
                    judged,
                }
            })
            .collect();

        Ok(SessionOverview {
            session_id: session_id.to_string(),
            player_ids,
            npc_summaries,
            total_turns: turns.len(),
        })
    }
}

impl SessionOverview {
    /// Mean fairness across NPCs, 5.0 when there are none
    pub fn average_fairness(&self) -> f64 {
        if self.npc_summaries.is_empty() {
            return 5.0;
        }
        let total: f64 = self.npc_summaries.iter().map(|n| f64::from(n.fairness)).sum();
        total / self.npc_summaries.len() as f64
    }

    /// Share of NPCs that escalated too fast
    pub fn escalation_rate(&self) -> f64 {
        if self.npc_summaries.is_empty() {
            return 0.0;
        }
        let escalated = self.npc_summaries.iter().filter(|n| n.escalation).count();
        escalated as f64 / self.npc_summaries.len() as f64
    }
}
