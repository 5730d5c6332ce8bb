//! Production `LlmClient`: a generic chat-completions style HTTP client.
//! Grounded on the teacher's `agents::ruvector_client::RuVectorClient`
//! (reqwest::Client + endpoint/api_key/timeout config + the shared retry
//! policy wrapping the transport call).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{CostPilotError, Result};
use crate::retry::{RetryConfig, RetryPolicy};

use super::{ChatRequest, ChatRole, LlmClient};

#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

fn role_str(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

/// Generic enough to front any chat-completions style backend (§6: "the
/// core does not depend on any specific provider").
pub struct HttpLlmClient {
    client: Client,
    config: HttpLlmConfig,
    retry: RetryPolicy,
}

impl HttpLlmClient {
    pub fn new(config: HttpLlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client construction should never fail with static config");

        let retry = RetryPolicy::new(RetryConfig::new(
            config.max_retries,
            Duration::from_millis(250),
            Duration::from_secs(5),
        ));

        Self {
            client,
            config,
            retry,
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let wire_messages: Vec<WireMessage> = request
            .messages
            .iter()
            .map(|m| WireMessage {
                role: role_str(m.role),
                content: &m.content,
            })
            .collect();

        let wire_request = WireRequest {
            model: &request.model,
            temperature: request.temperature,
            messages: wire_messages,
        };

        self.retry
            .execute(|| async {
                let response = self
                    .client
                    .post(&self.config.endpoint)
                    .bearer_auth(&self.config.api_key)
                    .json(&wire_request)
                    .send()
                    .await?;

                if !response.status().is_success() {
                    let status = response.status();
                    return Err(CostPilotError::LlmCall(format!(
                        "LLM backend returned status {status}"
                    )));
                }

                let parsed: WireResponse = response.json().await?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| CostPilotError::LlmCall("LLM backend returned no choices".to_string()))
            })
            .await
    }
}
