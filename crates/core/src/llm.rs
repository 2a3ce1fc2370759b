use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;

/// A generic request/response completion client, used when the LLM leg runs
/// in chat mode: one finalized user transcript in, one reply out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Submits the transcript as a single user message and returns the
    /// model's reply text.
    async fn complete(&self, transcript: &str) -> Result<String>;
}

/// An implementation of `CompletionClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The chat model identifier (e.g., "gpt-4o-mini").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAICompatibleClient {
    async fn complete(&self, transcript: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content(transcript)
                    .build()?
                    .into(),
            ])
            .temperature(0.6)
            .max_completion_tokens(150u32)
            .build()?;

        let response: CreateChatCompletionResponse =
            self.client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .context("Completion response had no choices")?;
        choice
            .message
            .content
            .clone()
            .context("Completion response had no text content")
    }
}
