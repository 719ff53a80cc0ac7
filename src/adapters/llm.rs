use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "deepseek-chat".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// A single-pass sequence of response fragments in emission order. Errors are
/// terminal: after an `Err` item the stream yields nothing further.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn stream_review(&self, request: ReviewRequest) -> Result<TokenStream>;
    fn model_name(&self) -> &str;
}

pub fn create_adapter(config: &ModelConfig) -> Result<Box<dyn LLMAdapter>> {
    // Every hosted provider this tool targets speaks the OpenAI
    // chat-completions protocol; the base URL selects among them.
    Ok(Box::new(crate::adapters::OpenAIAdapter::new(
        config.clone(),
    )?))
}
