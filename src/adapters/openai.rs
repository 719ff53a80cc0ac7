use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::adapters::llm::{LLMAdapter, ModelConfig, ReviewRequest, TokenStream};

pub struct OpenAIAdapter {
    client: Client,
    config: ModelConfig,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: usize,
    stream: bool,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChunkDelta {
    content: Option<String>,
}

impl OpenAIAdapter {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .context("API key not found. Set OPENAI_API_KEY environment variable or provide api_key in config")?;

        let base_url = config
            .base_url
            .clone()
            .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        // No overall request timeout: the response is an open-ended stream.
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
            base_url,
        })
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn stream_review(&self, request: ReviewRequest) -> Result<TokenStream> {
        let chat_request = ChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: request.system_prompt,
                },
                Message {
                    role: "user".to_string(),
                    content: request.user_prompt,
                },
            ],
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&chat_request)
            .send()
            .await
            .context("Failed to reach the completion endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion API error ({}): {}", status, body);
        }

        let (tx, rx) = mpsc::channel::<Result<String>>(100);
        let mut events = response.bytes_stream().eventsource();

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if event.data == "[DONE]" {
                            break;
                        }

                        let chunk: ChatChunk = match serde_json::from_str(&event.data) {
                            Ok(chunk) => chunk,
                            Err(err) => {
                                debug!("skipping undecodable stream event: {}", err);
                                continue;
                            }
                        };

                        let fragment = chunk
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|choice| choice.delta.content);

                        if let Some(fragment) = fragment {
                            if tx.send(Ok(fragment)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(anyhow!("response stream failed: {}", err))).await;
                        break;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: String) -> ModelConfig {
        ModelConfig {
            model_name: "test-model".to_string(),
            api_key: Some("test-key".to_string()),
            base_url: Some(base_url),
            temperature: 0.7,
            max_tokens: 256,
        }
    }

    fn sse_body(fragments: &[&str]) -> String {
        let mut body = String::new();
        for fragment in fragments {
            body.push_str(&format!(
                "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n\n",
                serde_json::to_string(fragment).unwrap()
            ));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    fn review_request() -> ReviewRequest {
        ReviewRequest {
            system_prompt: "you review code".to_string(),
            user_prompt: "review this".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn streamed_tokens_concatenate_to_the_full_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "test-model",
                "stream": true,
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_body(&["Looks ", "good ", "overall."]))
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new(test_config(server.url())).unwrap();
        let mut tokens = adapter.stream_review(review_request()).await.unwrap();

        let mut text = String::new();
        while let Some(token) = tokens.next().await {
            text.push_str(&token.unwrap());
        }

        assert_eq!(text, "Looks good overall.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_request_fails_before_any_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("{\"error\":\"invalid key\"}")
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new(test_config(server.url())).unwrap();
        let err = adapter.stream_review(review_request()).await.err().unwrap();

        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn contentless_events_produce_no_tokens() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"only this\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new(test_config(server.url())).unwrap();
        let mut tokens = adapter.stream_review(review_request()).await.unwrap();

        let mut collected = Vec::new();
        while let Some(token) = tokens.next().await {
            collected.push(token.unwrap());
        }

        assert_eq!(collected, vec!["only this".to_string()]);
    }
}
