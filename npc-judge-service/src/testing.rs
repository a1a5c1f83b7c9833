//! Scripted model and embedder doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::db::ConversationTurn;
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, LlmError, ServiceResult};
use crate::llm::{ChatModel, ChatRequest};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub fn turn_at(
    session_id: &str,
    player_id: &str,
    npc_id: &str,
    player_message: &str,
    npc_response: &str,
    offset_secs: i64,
) -> ConversationTurn {
    ConversationTurn {
        id: uuid::Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        player_id: player_id.to_string(),
        npc_id: npc_id.to_string(),
        player_message: player_message.to_string(),
        npc_response: npc_response.to_string(),
        timestamp: base_time() + Duration::seconds(offset_secs),
    }
}

/// Deterministic embedder: a fixed vector, or an 8-bucket bag of words
#[derive(Default)]
pub struct KeywordEmbedder {
    fixed: Option<Vec<f32>>,
}

impl KeywordEmbedder {
    pub fn fixed(vector: Vec<f32>) -> Self {
        Self {
            fixed: Some(vector),
        }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> ServiceResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput.into());
        }
        if let Some(vector) = &self.fixed {
            return Ok(vector.clone());
        }

        let mut vector = vec![0.0; 8];
        for word in text.split_whitespace() {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(0usize, |acc, b| acc.wrapping_add(b as usize))
                % 8;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }
}

/// Chat model that replays scripted replies and records every request.
///
/// Once the script runs out, `repeat` (if set) is returned forever; otherwise
/// the call fails with a generation error.
#[derive(Default)]
pub struct ScriptedChatModel {
    script: Mutex<VecDeque<ServiceResult<String>>>,
    repeat: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            script: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            ..Self::default()
        }
    }

    pub fn repeating(reply: &str) -> Self {
        Self {
            repeat: Some(reply.to_string()),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn chat(&self, request: ChatRequest) -> ServiceResult<String> {
        self.requests.lock().unwrap().push(request);

        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.repeat {
            Some(reply) => Ok(reply.clone()),
            None => Err(LlmError::Generation {
                status: 500,
                message: "script exhausted".to_string(),
            }
            .into()),
        }
    }
}
