//! Conversation turn storage.

use rusqlite::params;

use super::Database;
use super::models::{ConversationTurn, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};

const TURN_COLUMNS: &str =
    "id, session_id, player_id, npc_id, player_message, npc_response, timestamp";

impl Database {
    pub fn insert_conversation_turn(&self, turn: &ConversationTurn) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO conversation_turns
                (id, session_id, player_id, npc_id, player_message, npc_response, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                turn.id,
                turn.session_id,
                turn.player_id,
                turn.npc_id,
                turn.player_message,
                turn.npc_response,
                format_timestamp(&turn.timestamp),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Turns for one (session, player, NPC) triple, oldest first
    pub fn get_conversation_turns(
        &self,
        session_id: &str,
        player_id: &str,
        npc_id: &str,
    ) -> ServiceResult<Vec<ConversationTurn>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM conversation_turns \
                 WHERE session_id = ?1 AND player_id = ?2 AND npc_id = ?3 \
                 ORDER BY timestamp ASC",
                TURN_COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(
                params![session_id, player_id, npc_id],
                ConversationTurn::from_row,
            )
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }

    /// Every turn of a session, oldest first
    pub fn get_session_turns(&self, session_id: &str) -> ServiceResult<Vec<ConversationTurn>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM conversation_turns WHERE session_id = ?1 ORDER BY timestamp ASC",
                TURN_COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![session_id], ConversationTurn::from_row)
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }

    /// Every stored turn, oldest first
    pub fn list_conversation_turns(&self) -> ServiceResult<Vec<ConversationTurn>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM conversation_turns ORDER BY timestamp ASC",
                TURN_COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], ConversationTurn::from_row)
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }

    /// Distinct session ids, ordered by when each session started
    pub fn list_session_ids(&self) -> ServiceResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT session_id FROM conversation_turns \
                 GROUP BY session_id ORDER BY MIN(timestamp) ASC",
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::testing::turn_at;

    #[test]
    fn test_turns_for_triple_are_filtered_and_ordered() {
        let db = Database::open_in_memory().unwrap();
        db.insert_conversation_turn(&turn_at("s1", "p1", "guard-1", "later", "b", 30))
            .unwrap();
        db.insert_conversation_turn(&turn_at("s1", "p1", "guard-1", "earlier", "a", 10))
            .unwrap();
        db.insert_conversation_turn(&turn_at("s1", "p2", "guard-1", "other player", "c", 0))
            .unwrap();
        db.insert_conversation_turn(&turn_at("s2", "p1", "guard-1", "other session", "d", 0))
            .unwrap();

        let turns = db.get_conversation_turns("s1", "p1", "guard-1").unwrap();
        let messages: Vec<&str> = turns.iter().map(|t| t.player_message.as_str()).collect();
        assert_eq!(messages, vec!["earlier", "later"]);

        assert!(
            db.get_conversation_turns("s1", "p1", "merchant-2")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_turn_round_trips_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let turn = turn_at("s1", "p1", "guard-1", "hello", "halt", 42);
        db.insert_conversation_turn(&turn).unwrap();

        let stored = db.list_conversation_turns().unwrap();
        assert_eq!(stored, vec![turn]);
    }

    #[test]
    fn test_session_ids_ordered_by_start() {
        let db = Database::open_in_memory().unwrap();
        db.insert_conversation_turn(&turn_at("late", "p1", "guard-1", "x", "y", 500))
            .unwrap();
        db.insert_conversation_turn(&turn_at("early", "p1", "guard-1", "x", "y", 5))
            .unwrap();
        db.insert_conversation_turn(&turn_at("early", "p2", "merchant-2", "x", "y", 900))
            .unwrap();

        assert_eq!(db.list_session_ids().unwrap(), vec!["early", "late"]);
        assert_eq!(db.get_session_turns("early").unwrap().len(), 2);
    }
}
