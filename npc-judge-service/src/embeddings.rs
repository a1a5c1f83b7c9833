//! Text embedding client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingsConfig, LlmConfig};
use crate::error::{EmbeddingError, ServiceError, ServiceResult};
use crate::retry::RetryPolicy;

/// Turns text into a fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> ServiceResult<Vec<f32>>;
}

/// OpenAI-compatible `/v1/embeddings` client
pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    pub fn new(
        llm: &LlmConfig,
        config: &EmbeddingsConfig,
        retry: RetryPolicy,
    ) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(llm.request_timeout())
            .build()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        let base_url = config.base_url.as_deref().unwrap_or(&llm.base_url);

        Ok(Self {
            client,
            url: format!("{}/v1/embeddings", base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: llm.api_key.clone(),
            retry,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> ServiceResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput.into());
        }

        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .retry
            .execute(|| {
                let mut builder = self.client.post(&self.url).json(&body);
                if let Some(key) = &self.api_key {
                    builder = builder.bearer_auth(key);
                }
                builder.send()
            })
            .await
            .map_err(|exhausted| EmbeddingError::Generation {
                message: format!(
                    "{} unreachable after {} attempt(s): {}",
                    self.url, exhausted.attempts, exhausted.error
                ),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Generation {
                message: format!("status {}: {}", status, detail),
            }
            .into());
        }

        let parsed: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::Generation {
                    message: format!("Malformed embedding response: {}", e),
                })?;

        parsed.into_first_vector()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_first_vector(self) -> ServiceResult<Vec<f32>> {
        self.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                EmbeddingError::Generation {
                    message: "Response contained no embedding".to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_text_rejected_before_request() {
        let embedder = OpenAiEmbedder::new(
            &LlmConfig::default(),
            &EmbeddingsConfig::default(),
            RetryPolicy::default(),
        )
        .unwrap();

        let err = embedder.embed("   ").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Embedding(EmbeddingError::EmptyInput)
        ));
    }

    #[test]
    fn test_base_url_falls_back_to_llm() {
        let llm = LlmConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..LlmConfig::default()
        };
        let embedder =
            OpenAiEmbedder::new(&llm, &EmbeddingsConfig::default(), RetryPolicy::default())
                .unwrap();
        assert_eq!(embedder.url, "http://localhost:8080/v1/embeddings");

        let config = EmbeddingsConfig {
            base_url: Some("http://embed:9000".to_string()),
            ..EmbeddingsConfig::default()
        };
        let embedder = OpenAiEmbedder::new(&llm, &config, RetryPolicy::default()).unwrap();
        assert_eq!(embedder.url, "http://embed:9000/v1/embeddings");
    }

    #[test]
    fn test_response_without_data_is_an_error() {
        let parsed: EmbeddingResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(parsed.into_first_vector().is_err());

        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [0.5, -0.25]}]}"#).unwrap();
        assert_eq!(parsed.into_first_vector().unwrap(), vec![0.5, -0.25]);
    }
}
