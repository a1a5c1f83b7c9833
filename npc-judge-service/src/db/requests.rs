//! Judge and agent request queues.
//!
//! A request moves `pending -> in_progress -> completed | failed`. Claiming
//! flips the oldest pending row to `in_progress` in a single statement, so two
//! workers never receive the same request.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{AgentRequest, JudgeRequest, RequestStatus, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};
use crate::tools::Chart;

const JUDGE_COLUMNS: &str =
    "id, session_id, player_id, npc_id, status, error_code, error, created_at, completed_at";

const AGENT_COLUMNS: &str = "id, requester_id, query, status, response_text, charts, report_path, \
     error_code, error, created_at, completed_at";

impl Database {
    // ==================== Judge queue ====================

    pub fn enqueue_judge_request(
        &self,
        session_id: &str,
        player_id: &str,
        npc_id: &str,
    ) -> ServiceResult<JudgeRequest> {
        let request = JudgeRequest {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            player_id: player_id.to_string(),
            npc_id: npc_id.to_string(),
            status: RequestStatus::Pending,
            error_code: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO judge_requests (id, session_id, player_id, npc_id, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                request.id,
                request.session_id,
                request.player_id,
                request.npc_id,
                request.status.as_ref(),
                format_timestamp(&request.created_at),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(request)
    }

    /// Claim the oldest pending judge request, marking it in progress
    pub fn claim_next_judge_request(&self) -> ServiceResult<Option<JudgeRequest>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!(
                "UPDATE judge_requests SET status = 'in_progress' \
                 WHERE id = (SELECT id FROM judge_requests WHERE status = 'pending' \
                             ORDER BY created_at ASC, rowid ASC LIMIT 1) \
                 RETURNING {}",
                JUDGE_COLUMNS
            ),
            [],
            JudgeRequest::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    pub fn complete_judge_request(&self, id: &str) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE judge_requests SET status = 'completed', completed_at = ?1 WHERE id = ?2",
            params![format_timestamp(&Utc::now()), id],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    pub fn fail_judge_request(&self, id: &str, error_code: &str, error: &str) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE judge_requests SET status = 'failed', error_code = ?1, error = ?2, \
             completed_at = ?3 WHERE id = ?4",
            params![error_code, error, format_timestamp(&Utc::now()), id],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    pub fn get_judge_request(&self, id: &str) -> ServiceResult<Option<JudgeRequest>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {} FROM judge_requests WHERE id = ?1", JUDGE_COLUMNS),
            params![id],
            JudgeRequest::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    // ==================== Agent queue ====================

    pub fn enqueue_agent_request(
        &self,
        requester_id: &str,
        query: &str,
    ) -> ServiceResult<AgentRequest> {
        let request = AgentRequest {
            id: uuid::Uuid::new_v4().to_string(),
            requester_id: requester_id.to_string(),
            query: query.to_string(),
            status: RequestStatus::Pending,
            response_text: None,
            charts: Vec::new(),
            report_path: None,
            error_code: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_requests (id, requester_id, query, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                request.id,
                request.requester_id,
                request.query,
                request.status.as_ref(),
                format_timestamp(&request.created_at),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(request)
    }

    /// Claim the oldest pending agent request, marking it in progress
    pub fn claim_next_agent_request(&self) -> ServiceResult<Option<AgentRequest>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!(
                "UPDATE agent_requests SET status = 'in_progress' \
                 WHERE id = (SELECT id FROM agent_requests WHERE status = 'pending' \
                             ORDER BY created_at ASC, rowid ASC LIMIT 1) \
                 RETURNING {}",
                AGENT_COLUMNS
            ),
            [],
            AgentRequest::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    pub fn complete_agent_request(
        &self,
        id: &str,
        response_text: &str,
        charts: &[Chart],
        report_path: Option<&str>,
    ) -> ServiceResult<()> {
        let charts_json = serde_json::to_string(charts).map_err(DatabaseError::Serialization)?;
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE agent_requests SET status = 'completed', response_text = ?1, charts = ?2, \
             report_path = ?3, completed_at = ?4 WHERE id = ?5",
            params![
                response_text,
                charts_json,
                report_path,
                format_timestamp(&Utc::now()),
                id
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    pub fn fail_agent_request(&self, id: &str, error_code: &str, error: &str) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE agent_requests SET status = 'failed', error_code = ?1, error = ?2, \
             completed_at = ?3 WHERE id = ?4",
            params![error_code, error, format_timestamp(&Utc::now()), id],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    pub fn get_agent_request(&self, id: &str) -> ServiceResult<Option<AgentRequest>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {} FROM agent_requests WHERE id = ?1", AGENT_COLUMNS),
            params![id],
            AgentRequest::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    // ==================== Recovery ====================

    /// Return requests left `in_progress` by a previous run to the queue.
    /// Returns how many rows were reset.
    pub fn reset_interrupted_requests(&self) -> ServiceResult<usize> {
        let conn = self.conn.lock().unwrap();

        let judge = conn
            .execute(
                "UPDATE judge_requests SET status = 'pending' WHERE status = 'in_progress'",
                [],
            )
            .map_err(DatabaseError::Query)?;
        let agent = conn
            .execute(
                "UPDATE agent_requests SET status = 'pending' WHERE status = 'in_progress'",
                [],
            )
            .map_err(DatabaseError::Query)?;

        Ok(judge + agent)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, RequestStatus};
    use crate::tools::{Chart, ChartKind};

    #[test]
    fn test_judge_queue_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let first = db.enqueue_judge_request("s1", "p1", "guard-1").unwrap();
        let second = db.enqueue_judge_request("s1", "p2", "guard-1").unwrap();

        let claimed = db.claim_next_judge_request().unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, RequestStatus::InProgress);

        let claimed_again = db.claim_next_judge_request().unwrap().unwrap();
        assert_eq!(claimed_again.id, second.id);
        assert!(db.claim_next_judge_request().unwrap().is_none());

        db.complete_judge_request(&first.id).unwrap();
        db.fail_judge_request(&second.id, "conversation_not_found", "no turns")
            .unwrap();

        let done = db.get_judge_request(&first.id).unwrap().unwrap();
        assert_eq!(done.status, RequestStatus::Completed);
        assert!(done.completed_at.is_some());

        let failed = db.get_judge_request(&second.id).unwrap().unwrap();
        assert_eq!(failed.status, RequestStatus::Failed);
        assert_eq!(failed.error_code.as_deref(), Some("conversation_not_found"));
        assert_eq!(failed.error.as_deref(), Some("no turns"));
    }

    #[test]
    fn test_agent_request_stores_charts() {
        let db = Database::open_in_memory().unwrap();
        let request = db
            .enqueue_agent_request("dev-1", "Export a report for session s1")
            .unwrap();
        let claimed = db.claim_next_agent_request().unwrap().unwrap();
        assert_eq!(claimed.query, "Export a report for session s1");

        let charts = vec![Chart {
            kind: ChartKind::Pie,
            title: "NPC Tone Distribution".to_string(),
            labels: vec!["friendly".to_string()],
            values: vec![1.0],
        }];
        db.complete_agent_request(&request.id, "All calm.", &charts, Some("reports/r.html"))
            .unwrap();

        let stored = db.get_agent_request(&request.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Completed);
        assert_eq!(stored.response_text.as_deref(), Some("All calm."));
        assert_eq!(stored.charts, charts);
        assert_eq!(stored.report_path.as_deref(), Some("reports/r.html"));
    }

    #[test]
    fn test_reset_interrupted_requests() {
        let db = Database::open_in_memory().unwrap();
        let judge = db.enqueue_judge_request("s1", "p1", "guard-1").unwrap();
        db.enqueue_agent_request("dev-1", "How did session s1 go?")
            .unwrap();
        db.claim_next_judge_request().unwrap();
        db.claim_next_agent_request().unwrap();

        assert_eq!(db.reset_interrupted_requests().unwrap(), 2);

        let reclaimed = db.claim_next_judge_request().unwrap().unwrap();
        assert_eq!(reclaimed.id, judge.id);
        assert!(db.claim_next_agent_request().unwrap().is_some());
    }

    #[test]
    fn test_missing_request_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_judge_request("nope").unwrap().is_none());
        assert!(db.get_agent_request("nope").unwrap().is_none());
    }
}
