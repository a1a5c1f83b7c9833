//! Append-only verdict storage.

use rusqlite::params;

use super::Database;
use super::models::{StoredVerdict, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    pub fn insert_verdict(&self, record: &StoredVerdict) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();
        let verdict = &record.verdict;

        conn.execute(
            r#"
            INSERT INTO judge_results (
                id, session_id, player_id, npc_id, overall_tone, in_character,
                fairness_score, escalation_too_fast, summary, source, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                record.id,
                record.session_id,
                record.player_id,
                record.npc_id,
                verdict.overall_tone.as_ref(),
                verdict.in_character,
                verdict.fairness_score,
                verdict.escalation_too_fast,
                verdict.summary,
                record.source.as_ref(),
                format_timestamp(&record.created_at),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Verdicts recorded for a session, oldest first
    pub fn get_session_verdicts(&self, session_id: &str) -> ServiceResult<Vec<StoredVerdict>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, player_id, npc_id, overall_tone, in_character, \
                 fairness_score, escalation_too_fast, summary, source, created_at \
                 FROM judge_results WHERE session_id = ?1 ORDER BY created_at ASC",
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![session_id], StoredVerdict::from_row)
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }
}
