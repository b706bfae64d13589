use serde::{Deserialize, Serialize};

/// Progress events emitted over the optional channel during extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExtractionEvent {
    Starting { total: usize },
    Fetching { path: String },
    ExtractingText { path: String },
    Embedding { chunk: usize, total: usize },
    CallingModel { attempt: usize },
    DocumentComplete { path: String, success: bool },
    Progress { completed: usize, total: usize },
    Cancelled { remaining: usize },
    Failed { path: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub response_mime_type: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    pub content: CandidateContent,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbedContentRequest {
    pub model: String,
    pub content: Content,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbedContentResponse {
    pub embedding: Embedding,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Embedding {
    pub values: Vec<f32>,
}
