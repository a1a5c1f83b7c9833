//! Startup seeding of the vector store from stored rules and conversations.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::vector_store::{EmbeddedItem, SourceType, VectorStore};
use crate::db::{ConversationTurn, Database, NpcRule};
use crate::embeddings::Embedder;
use crate::error::ServiceResult;

/// Counts from one seeding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub rules: usize,
    pub conversations: usize,
    pub skipped: usize,
}

/// Text to embed before it becomes an [`EmbeddedItem`]
struct PendingItem {
    id: String,
    content: String,
    source_type: SourceType,
    owner_key: String,
    group_key: Option<String>,
}

impl PendingItem {
    fn from_rule(rule: NpcRule) -> Self {
        Self {
            id: format!("rule-{}", rule.id),
            content: rule.rule_text,
            source_type: SourceType::Rule,
            owner_key: rule.npc_id,
            group_key: None,
        }
    }

    fn from_turn(turn: ConversationTurn) -> Self {
        Self {
            id: format!("conv-{}", turn.id),
            content: format!("Player: {}\nNPC: {}", turn.player_message, turn.npc_response),
            source_type: SourceType::Conversation,
            owner_key: turn.npc_id,
            group_key: Some(turn.session_id),
        }
    }
}

pub struct VectorSeeder {
    db: Arc<Database>,
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    concurrency: usize,
}

impl VectorSeeder {
    pub fn new(
        db: Arc<Database>,
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            db,
            embedder,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Embed every stored rule and conversation turn into the store.
    ///
    /// Items are stored in database order, rules first, whatever order the
    /// embedding calls finish in. Best-effort: an item whose embedding fails is logged and skipped.
    /// Database errors abort the pass.
    pub async fn seed(&self) -> ServiceResult<SeedReport> {
        let rules = self.db.list_npc_rules()?;
        let turns = self.db.list_conversation_turns()?;
        info!(
            rules = rules.len(),
            turns = turns.len(),
            "Seeding vector store"
        );

        let pending = rules
            .into_iter()
            .map(PendingItem::from_rule)
            .chain(turns.into_iter().map(PendingItem::from_turn));

        let embedded: Vec<Option<EmbeddedItem>> = stream::iter(pending)
            .map(|item| async move {
                match self.embedder.embed(&item.content).await {
                    Ok(vector) => Some(EmbeddedItem {
                        id: item.id,
                        vector,
                        content: item.content,
                        source_type: item.source_type,
                        owner_key: item.owner_key,
                        group_key: item.group_key,
                    }),
                    Err(e) => {
                        warn!(item_id = %item.id, error = %e, "Skipping item that failed to embed");
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = SeedReport::default();
        let mut items = Vec::with_capacity(embedded.len());
        for item in embedded {
            match item {
                Some(item) => {
                    match item.source_type {
                        SourceType::Rule => report.rules += 1,
                        SourceType::Conversation => report.conversations += 1,
                    }
                    items.push(item);
                }
                None => report.skipped += 1,
            }
        }

        self.store.extend(items);

        info!(
            rules = report.rules,
            conversations = report.conversations,
            skipped = report.skipped,
            store_items = self.store.len(),
            "Vector store seeded"
        );

        Ok(report)
    }
}
