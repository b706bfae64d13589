//! Model-API boundary.
//!
//! Raw model output never crosses this module unvalidated: the
//! [`ExtractionModel`] trait is the narrow adapter the orchestrator talks
//! to, and everything past it is typed.

pub mod client;
pub mod prompts;
pub mod types;

pub use client::*;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;

/// Narrow adapter over the generative extraction API.
#[async_trait]
pub trait ExtractionModel: Send + Sync {
    /// One structured-extraction round trip; returns the raw response text,
    /// which may contain prose around the JSON payload.
    async fn generate(&self, api_key: &str, system_prompt: &str, user_prompt: &str)
        -> Result<String>;

    /// Embed one text chunk. Callers treat failures as best-effort.
    async fn embed(&self, api_key: &str, text: &str) -> Result<Vec<f32>>;
}
