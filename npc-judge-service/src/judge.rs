//! Retrieval-augmented judging of NPC-player conversations.

mod prompts;
mod verdict;

pub use verdict::{JudgeVerdict, Tone, VerdictParse, parse_verdict};

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::JudgeConfig;
use crate::db::{Database, StoredVerdict};
use crate::error::{ServiceError, ServiceResult};
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::rag::RetrievalService;

pub struct JudgeEngine {
    db: Arc<Database>,
    retrieval: Arc<RetrievalService>,
    llm: Arc<dyn ChatModel>,
    config: JudgeConfig,
}

impl JudgeEngine {
    pub fn new(
        db: Arc<Database>,
        retrieval: Arc<RetrievalService>,
        llm: Arc<dyn ChatModel>,
        config: JudgeConfig,
    ) -> Self {
        Self {
            db,
            retrieval,
            llm,
            config,
        }
    }

    /// Judge the conversation between one player and one NPC in a session.
    ///
    /// Fails with [`ServiceError::ConversationNotFound`] when there are no
    /// turns, without storing anything. Otherwise a verdict is always stored
    /// and returned: unusable model output is replaced by
    /// [`JudgeVerdict::fallback`]. Embedder and model transport failures
    /// propagate.
    pub async fn judge(
        &self,
        session_id: &str,
        player_id: &str,
        npc_id: &str,
    ) -> ServiceResult<JudgeVerdict> {
        let turns = self
            .db
            .get_conversation_turns(session_id, player_id, npc_id)?;
        if turns.is_empty() {
            return Err(ServiceError::ConversationNotFound {
                session_id: session_id.to_string(),
                player_id: player_id.to_string(),
                npc_id: npc_id.to_string(),
            });
        }

        let context = self
            .retrieval
            .query(npc_id, Some(session_id), &turns, self.config.retrieval_top_k)
            .await?;

        let system = prompts::judge_system_prompt(&context);
        let user = prompts::judge_user_payload(session_id, player_id, npc_id, &turns, &context.rules)
            .map_err(prompt_error)?;

        let raw = self
            .llm
            .chat(
                ChatRequest::new(
                    vec![ChatMessage::system(system), ChatMessage::user(user)],
                    self.config.temperature,
                )
                .json(),
            )
            .await?;

        let parsed = parse_verdict(&raw);
        if let VerdictParse::Invalid { reason, raw } = &parsed {
            warn!(
                session_id,
                npc_id,
                reason = %reason,
                raw_len = raw.len(),
                "Model verdict unusable, storing fallback"
            );
        }
        let (verdict, source) = parsed.resolve();

        self.db.insert_verdict(&StoredVerdict::new(
            session_id,
            player_id,
            npc_id,
            verdict.clone(),
            source,
        ))?;

        metrics::counter!("judge_verdicts_total", "source" => source.to_string()).increment(1);
        info!(
            session_id,
            player_id,
            npc_id,
            tone = %verdict.overall_tone,
            fairness = verdict.fairness_score,
            source = %source,
            "Conversation judged"
        );

        Ok(verdict)
    }
}

/// Prompt assembly failures are ours, not the store's or the model's
fn prompt_error(e: serde_json::Error) -> ServiceError {
    ServiceError::Internal {
        message: format!("Failed to build judge prompt: {}", e),
    }
}
