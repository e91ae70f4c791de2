//! Generation Backend: the LLM dependency behind the Response Generator
//! (§4.K). `GoogleGenerationBackend` calls Gemini's `generateContent`;
//! `MockGenerationBackend` echoes a canned response for tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use thema_core::traits::{GenerationBackend, GenerationParams};
use thema_core::{Error, Result};

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "candidateCount")]
    candidate_count: u32,
}

impl From<&GenerationParams> for GeminiGenerationConfig {
    fn from(params: &GenerationParams) -> Self {
        Self {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_output_tokens: params.max_output_tokens,
            candidate_count: 1,
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

/// Generation Backend (§4.K's LLM dependency) calling Gemini's
/// `generateContent` endpoint, with retry on transient failures.
pub struct GoogleGenerationBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_retries: u32,
    timeout: Duration,
}

impl GoogleGenerationBackend {
    pub fn new(api_key: String) -> Self {
        Self::with_config(
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
            "gemini-2.0-flash".to_string(),
            api_key,
        )
    }

    pub fn with_config(base_url: String, model: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build generation HTTP client");
        Self {
            client,
            base_url,
            model,
            api_key,
            max_retries: 3,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| Error::Config("GEMINI_API_KEY or GOOGLE_API_KEY not set".into()))?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
        Ok(Self::with_config(
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model,
            api_key,
        ))
    }
}

#[async_trait]
impl GenerationBackend for GoogleGenerationBackend {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let start = Instant::now();
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GenerateContentRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: params.into(),
        };

        let mut attempt = 0u32;
        loop {
            let result = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: GenerateContentResponse = resp
                        .json()
                        .await
                        .map_err(|e| Error::Generation(format!("failed to parse response: {e}")))?;
                    let text = parsed
                        .candidates
                        .into_iter()
                        .next()
                        .and_then(|c| c.content.parts.into_iter().next())
                        .map(|p| p.text)
                        .unwrap_or_default();
                    debug!(
                        duration_ms = start.elapsed().as_millis() as u64,
                        response_len = text.len(),
                        "generation complete"
                    );
                    return Ok(text);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    let message = format!("gemini generateContent returned {status}: {body}");
                    let (_, _, retryable) = thema_core::error::classify_message(&message);
                    if !retryable || attempt >= self.max_retries {
                        return Err(Error::Generation(message));
                    }
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Generation(format!("request failed: {e}")));
                    }
                }
            }
            let delay = Duration::from_millis(200 * 2u64.pow(attempt));
            warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying generation call");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Deterministic generation backend for tests: returns a fixed or
/// caller-configured response without calling out to any LLM.
pub struct MockGenerationBackend {
    response: String,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            response: "이것은 테스트 응답입니다.".to_string(),
        }
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        Ok(self.response.clone())
    }
}
