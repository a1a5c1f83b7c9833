use chrono::Utc;
use rusqlite::params;

use super::Database;
use super::models::{NpcRule, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    pub fn insert_npc_rule(&self, npc_id: &str, rule_text: &str) -> ServiceResult<NpcRule> {
        let rule = NpcRule {
            id: uuid::Uuid::new_v4().to_string(),
            npc_id: npc_id.to_string(),
            rule_text: rule_text.to_string(),
            created_at: Utc::now(),
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO npc_rules (id, npc_id, rule_text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                rule.id,
                rule.npc_id,
                rule.rule_text,
                format_timestamp(&rule.created_at)
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(rule)
    }

    pub fn list_npc_rules(&self) -> ServiceResult<Vec<NpcRule>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, npc_id, rule_text, created_at FROM npc_rules ORDER BY created_at ASC",
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], NpcRule::from_row)
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[test]
    fn test_rules_listed_per_npc() {
        let db = Database::open_in_memory().unwrap();
        db.insert_npc_rule("guard-1", "Check papers").unwrap();
        db.insert_npc_rule("merchant-2", "Haggle").unwrap();
        db.insert_npc_rule("guard-1", "Never take bribes").unwrap();

        assert_eq!(db.list_npc_rules().unwrap().len(), 3);

        let guard: Vec<String> = db
            .list_npc_rules()
            .unwrap()
            .into_iter()
            .filter(|r| r.npc_id == "guard-1")
            .map(|r| r.rule_text)
            .collect();
        assert_eq!(guard.len(), 2);
        assert!(guard.contains(&"Check papers".to_string()));
        assert!(guard.contains(&"Never take bribes".to_string()));
    }
}
