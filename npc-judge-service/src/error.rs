use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("No conversation found for session {session_id}, player {player_id}, NPC {npc_id}")]
    ConversationNotFound {
        session_id: String,
        player_id: String,
        npc_id: String,
    },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Embedding error")]
    Embedding(#[from] EmbeddingError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Chat-completion client errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Connection failed to {url} after {attempts} attempt(s)")]
    Connection {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Generation failed (status {status}): {message}")]
    Generation { status: u16, message: String },

    #[error("Invalid response from model endpoint")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),
}

/// Embedding errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Cannot embed empty text")]
    EmptyInput,

    #[error("Embedding generation failed: {message}")]
    Generation { message: String },
}

/// Report rendering errors. These never fail an agent request; the caller
/// downgrades to a text-only response.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report rendering failed: {message}")]
    Rendering { message: String },

    #[error("Failed to write report")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Stable code recorded on failed queue rows
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::ConversationNotFound { .. } => "conversation_not_found",
            ServiceError::SessionNotFound { .. } => "session_not_found",
            ServiceError::Llm(LlmError::Connection { .. }) => "llm_connection",
            ServiceError::Llm(LlmError::Generation { .. }) => "llm_generation",
            ServiceError::Llm(LlmError::InvalidResponse { .. }) => "llm_invalid_response",
            ServiceError::Database(_) => "database_error",
            ServiceError::Embedding(EmbeddingError::EmptyInput) => "embedding_empty_input",
            ServiceError::Embedding(EmbeddingError::Generation { .. }) => "embedding_error",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }

    /// Whether the failure is the caller's fault rather than an upstream one
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::ConversationNotFound { .. } | ServiceError::SessionNotFound { .. }
        )
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error with its full `source()` chain, outermost first
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        out.push_str(": ");
        out.push_str(&source.to_string());
        current = source.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_includes_sources() {
        let err = ServiceError::Database(DatabaseError::Query(
            rusqlite::Error::QueryReturnedNoRows,
        ));
        let chain = format_error_chain(&err);
        assert!(chain.starts_with("Database error: Query failed"));
        assert!(chain.contains("Query returned no rows"));
    }

    #[test]
    fn test_error_codes() {
        let err = ServiceError::ConversationNotFound {
            session_id: "s1".to_string(),
            player_id: "p1".to_string(),
            npc_id: "guard-1".to_string(),
        };
        assert_eq!(err.error_code(), "conversation_not_found");
        assert!(err.is_not_found());

        let err = ServiceError::Embedding(EmbeddingError::EmptyInput);
        assert_eq!(err.error_code(), "embedding_empty_input");
        assert!(!err.is_not_found());
    }
}
