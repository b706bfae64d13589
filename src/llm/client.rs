use crate::error::{ExtractionError, Result};
use crate::llm::types::*;
use crate::llm::ExtractionModel;
use async_trait::async_trait;
use reqwest::Client;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_EMBED_MODEL: &str = "text-embedding-004";

/// Gemini-backed implementation of [`ExtractionModel`]. The API key is
/// supplied per call so the key pool can rotate credentials between
/// attempts.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    embed_model: String,
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl GeminiClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.into(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }
}

#[async_trait]
impl ExtractionModel for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );

        let payload = GenerateContentRequest {
            contents: vec![Content::user(user_prompt)],
            system_instruction: Some(Content::user(system_prompt)),
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let res = self.client.post(&url).json(&payload).send().await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(ExtractionError::ExtractionFailed(format!(
                "Model API error (status {}): {}",
                status, err_text
            )));
        }

        let body: GenerateContentResponse = res.json().await?;

        let part = body
            .candidates
            .ok_or_else(|| {
                ExtractionError::ExtractionFailed("No candidates returned".to_string())
            })?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ExtractionError::ExtractionFailed("Empty candidates list".to_string())
            })?
            .content
            .parts
            .into_iter()
            .next()
            .ok_or_else(|| {
                ExtractionError::ExtractionFailed("No parts in content".to_string())
            })?;

        Ok(part.text)
    }

    async fn embed(&self, api_key: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.embed_model, api_key
        );

        let payload = EmbedContentRequest {
            model: format!("models/{}", self.embed_model),
            content: Content::user(text),
        };

        let res = self.client.post(&url).json(&payload).send().await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(ExtractionError::ExtractionFailed(format!(
                "Embedding API error (status {}): {}",
                status, err_text
            )));
        }

        let body: EmbedContentResponse = res.json().await?;
        Ok(body.embedding.values)
    }
}
