//! Database schema setup.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Create every table and index. Safe to run on each startup.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        -- Conversation turns written by the game
        CREATE TABLE IF NOT EXISTS conversation_turns (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            npc_id TEXT NOT NULL,
            player_message TEXT NOT NULL,
            npc_response TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_turns_triple
            ON conversation_turns(session_id, player_id, npc_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_turns_npc ON conversation_turns(npc_id);

        -- Behavioural rules per NPC
        CREATE TABLE IF NOT EXISTS npc_rules (
            id TEXT PRIMARY KEY,
            npc_id TEXT NOT NULL,
            rule_text TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_npc_rules_npc ON npc_rules(npc_id);

        -- Append-only verdicts
        CREATE TABLE IF NOT EXISTS judge_results (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            npc_id TEXT NOT NULL,
            overall_tone TEXT NOT NULL,
            in_character INTEGER NOT NULL,
            fairness_score INTEGER NOT NULL,
            escalation_too_fast INTEGER NOT NULL,
            summary TEXT NOT NULL,
            source TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_judge_results_session
            ON judge_results(session_id, created_at);

        -- Judge queue
        CREATE TABLE IF NOT EXISTS judge_requests (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            npc_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            error_code TEXT,
            error TEXT,
            created_at TEXT NOT NULL,
            completed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_judge_requests_status
            ON judge_requests(status, created_at);

        -- Agent queue
        CREATE TABLE IF NOT EXISTS agent_requests (
            id TEXT PRIMARY KEY,
            requester_id TEXT NOT NULL,
            query TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            response_text TEXT,
            charts TEXT,
            report_path TEXT,
            error_code TEXT,
            error TEXT,
            created_at TEXT NOT NULL,
            completed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_agent_requests_status
            ON agent_requests(status, created_at);
        "#,
    )
    .map_err(DatabaseError::Query)?;

    Ok(())
}
