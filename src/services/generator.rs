//! QA pair generation through an OpenAI-compatible chat-completions backend.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::GenerationError;
use crate::models::{GenerationConfig, KEY_ANSWER, KEY_QUESTION, QaRecord, TextChunk};
use crate::utils::retry::{RetryConfig, RetryResult, with_retry};

const SYSTEM_PROMPT: &str =
    "You create an informative question, and a chain-of-thought answer based on the provided text.";

/// Capability that turns one chunk into a question/answer pair.
#[async_trait]
pub trait QaGenerator: Send + Sync {
    async fn generate(&self, chunk: &TextChunk) -> Result<QaRecord, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    response_format: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// Shape the backend must answer with.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QaPayload {
    question: String,
    answer: String,
}

/// Client for a chat-completions endpoint that returns structured QA pairs.
#[derive(Debug, Clone)]
pub struct ChatGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    min_temperature: f32,
    max_temperature: f32,
    retry: RetryConfig,
}

impl ChatGenerator {
    /// Create a generator, reading the API key from the configured variable.
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenerationError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &GenerationConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            min_temperature: config.min_temperature,
            max_temperature: config.max_temperature,
            retry: RetryConfig::from_generation(config),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sample_temperature(&self) -> f32 {
        if self.max_temperature <= self.min_temperature {
            return self.min_temperature;
        }
        rand::thread_rng().gen_range(self.min_temperature..=self.max_temperature)
    }

    fn build_request<'a>(&'a self, chunk_text: &str, temperature: f32) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(chunk_text),
                },
            ],
            response_format: response_format(),
        }
    }

    async fn request_once(&self, request: &ChatRequest<'_>) -> Result<QaRecord, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else if e.is_connect() {
                    GenerationError::Connection(e.to_string())
                } else {
                    GenerationError::Request(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GenerationError::Auth(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        parse_chat_response(&body)
    }
}

#[async_trait]
impl QaGenerator for ChatGenerator {
    async fn generate(&self, chunk: &TextChunk) -> Result<QaRecord, GenerationError> {
        let temperature = self.sample_temperature();
        let request = self.build_request(&chunk.text, temperature);

        tracing::debug!(
            file = %chunk.file_id,
            chunk = chunk.index,
            temperature,
            "requesting QA pair"
        );

        match with_retry(&self.retry, || self.request_once(&request)).await {
            RetryResult::Success(record) => Ok(record),
            RetryResult::Failed {
                last_error,
                attempts,
            } => {
                if attempts > 1 {
                    tracing::warn!(
                        file = %chunk.file_id,
                        chunk = chunk.index,
                        attempts,
                        "giving up on chunk: {last_error}"
                    );
                }
                Err(last_error)
            }
        }
    }
}

fn user_prompt(chunk_text: &str) -> String {
    format!(
        "Context: {chunk_text}\n Based on the previous text, please generate an incredibly \
         in-depth question about the text (this will be the {KEY_QUESTION}), and a detailed and \
         informative answer (this will be the {KEY_ANSWER}). Think your answer through step by step."
    )
}

/// Strict JSON schema asking for exactly a question and an answer.
fn response_format() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "qa_pair",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    KEY_QUESTION: { "type": "string" },
                    KEY_ANSWER: { "type": "string" },
                },
                "required": [KEY_QUESTION, KEY_ANSWER],
                "additionalProperties": false,
            }
        }
    })
}

/// Validate a raw chat-completions body into a record.
fn parse_chat_response(body: &str) -> Result<QaRecord, GenerationError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::InvalidResponse(format!("malformed body: {e}")))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| GenerationError::InvalidResponse("no choices returned".to_string()))?;

    if let Some(refusal) = message.refusal {
        return Err(GenerationError::InvalidResponse(format!(
            "model refused: {refusal}"
        )));
    }

    let content = message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| GenerationError::InvalidResponse("empty content".to_string()))?;

    let payload: QaPayload = serde_json::from_str(strip_code_fence(&content))
        .map_err(|e| GenerationError::InvalidResponse(format!("content is not a QA pair: {e}")))?;

    QaRecord::new(payload.question, payload.answer)
}

/// Some backends wrap JSON content in a markdown code fence.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
