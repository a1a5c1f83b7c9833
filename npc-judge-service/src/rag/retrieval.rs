use std::sync::Arc;

use tracing::debug;

use super::vector_store::{SourceType, VectorStore};
use crate::db::ConversationTurn;
use crate::embeddings::Embedder;
use crate::error::ServiceResult;

/// Retrieved context, partitioned by source and kept in rank order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub rules: Vec<String>,
    pub precedents: Vec<String>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.precedents.is_empty()
    }
}

/// Render turns as alternating `Player:` / `NPC:` lines, oldest first
pub fn build_query_document(turns: &[ConversationTurn]) -> String {
    let mut ordered: Vec<&ConversationTurn> = turns.iter().collect();
    ordered.sort_by_key(|turn| turn.timestamp);

    let mut document = String::new();
    for turn in ordered {
        document.push_str("Player: ");
        document.push_str(&turn.player_message);
        document.push('\n');
        document.push_str("NPC: ");
        document.push_str(&turn.npc_response);
        document.push('\n');
    }
    document
}

/// Embeds a conversation and pulls the owner's closest rules and precedents
pub struct RetrievalService {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl RetrievalService {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Retrieve up to `top_k` items belonging to `owner_key`.
    ///
    /// Candidates are filtered to the owner before ranking, so another NPC's
    /// rules can never appear in the result. `group_key` identifies the
    /// session being judged and is only used for logging. Embedder failures
    /// propagate.
    pub async fn query(
        &self,
        owner_key: &str,
        group_key: Option<&str>,
        turns: &[ConversationTurn],
        top_k: usize,
    ) -> ServiceResult<RetrievalResult> {
        let document = build_query_document(turns);
        let query_vector = self.embedder.embed(&document).await?;

        let hits = self
            .store
            .search_where(&query_vector, top_k, |item| item.owner_key == owner_key);

        let mut result = RetrievalResult::default();
        for hit in hits {
            match hit.source_type {
                SourceType::Rule => result.rules.push(hit.content.clone()),
                SourceType::Conversation => result.precedents.push(hit.content.clone()),
            }
        }

        debug!(
            owner_key,
            group_key = group_key.unwrap_or("-"),
            rules = result.rules.len(),
            precedents = result.precedents.len(),
            "Retrieved judging context"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, ServiceError};
    use crate::rag::vector_store::EmbeddedItem;
    use crate::testing::{KeywordEmbedder, turn_at};
    use async_trait::async_trait;

    fn stored(
        id: &str,
        vector: Vec<f32>,
        source_type: SourceType,
        owner: &str,
    ) -> EmbeddedItem {
        EmbeddedItem {
            id: id.to_string(),
            vector,
            content: id.to_string(),
            source_type,
            owner_key: owner.to_string(),
            group_key: None,
        }
    }

    fn guard_turns() -> Vec<ConversationTurn> {
        vec![turn_at("s1", "p1", "guard-1", "let me pass", "halt", 0)]
    }

    #[test]
    fn test_query_document_sorted_by_timestamp() {
        let turns = vec![
            turn_at("s1", "p1", "guard-1", "second", "reply two", 60),
            turn_at("s1", "p1", "guard-1", "first", "reply one", 0),
        ];
        assert_eq!(
            build_query_document(&turns),
            "Player: first\nNPC: reply one\nPlayer: second\nNPC: reply two\n"
        );
    }

    #[tokio::test]
    async fn test_rules_and_precedents_partitioned_in_rank_order() {
        let store = Arc::new(VectorStore::new());
        store.add(stored("rule-a", vec![1.0, 0.0], SourceType::Rule, "guard-1"));
        store.add(stored("rule-b", vec![0.9, 0.1], SourceType::Rule, "guard-1"));
        store.add(stored(
            "conv-a",
            vec![0.8, 0.2],
            SourceType::Conversation,
            "guard-1",
        ));

        let embedder = Arc::new(KeywordEmbedder::fixed(vec![1.0, 0.0]));
        let service = RetrievalService::new(store, embedder);

        let result = service
            .query("guard-1", Some("s1"), &guard_turns(), 3)
            .await
            .unwrap();

        assert_eq!(result.rules, vec!["rule-a", "rule-b"]);
        assert_eq!(result.precedents, vec!["conv-a"]);
    }

    #[tokio::test]
    async fn test_never_returns_other_owner() {
        let store = Arc::new(VectorStore::new());
        store.add(stored("theirs", vec![1.0, 0.0], SourceType::Rule, "merchant-2"));
        store.add(stored(
            "their-conv",
            vec![1.0, 0.0],
            SourceType::Conversation,
            "merchant-2",
        ));
        store.add(stored("mine", vec![0.0, 1.0], SourceType::Rule, "guard-1"));

        let embedder = Arc::new(KeywordEmbedder::fixed(vec![1.0, 0.0]));
        let service = RetrievalService::new(store, embedder);

        let result = service
            .query("guard-1", None, &guard_turns(), 10)
            .await
            .unwrap();
        assert_eq!(result.rules, vec!["mine"]);
        assert!(result.precedents.is_empty());

        let result = service
            .query("innkeeper-3", None, &guard_turns(), 10)
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> ServiceResult<Vec<f32>> {
            Err(EmbeddingError::Generation {
                message: "provider down".to_string(),
            }
            .into())
        }
    }

    #[tokio::test]
    async fn test_embedder_failure_propagates() {
        let store = Arc::new(VectorStore::new());
        store.add(stored("rule", vec![1.0], SourceType::Rule, "guard-1"));
        let service = RetrievalService::new(store, Arc::new(FailingEmbedder));

        let err = service
            .query("guard-1", None, &guard_turns(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Embedding(_)));
    }
}
