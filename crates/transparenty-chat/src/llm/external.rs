//! Hosted chat-completion providers (Anthropic Messages, OpenAI-compatible Chat Completions)
//! with SSE streaming.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use super::streaming::{drain_sse_data, STREAM_CHANNEL_CAPACITY};
use super::{ApiProvider, CompletionRequest, LlmProvider, ProviderInfo, TokenStream};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Parse a response body as JSON, returning a clear error if the server returned HTML
/// (e.g. a gateway error page) instead of valid JSON.
pub(crate) async fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;

    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(anyhow!(
            "Endpoint {} returned HTML instead of JSON (HTTP {}). Response: {}",
            endpoint,
            status,
            preview
        ));
    }

    serde_json::from_str::<T>(&body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        anyhow!(
            "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
            endpoint,
            status,
            e,
            preview
        )
    })
}

/// Map a reqwest send failure to a message that says which kind of failure it was.
pub(crate) fn describe_send_error(endpoint: &str, e: reqwest::Error) -> anyhow::Error {
    if e.is_timeout() {
        anyhow!("Request to {} timed out", endpoint)
    } else if e.is_connect() {
        anyhow!("Failed to connect to {}: {}", endpoint, e)
    } else {
        anyhow!("Request to {} failed: {}", endpoint, e)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: String,
}

/// What one SSE `data:` payload means for the text stream.
#[derive(Debug, PartialEq)]
enum StreamEvent {
    Text(String),
    Done,
    Skip,
}

fn anthropic_event(payload: &str) -> StreamEvent {
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(payload) else {
        return StreamEvent::Skip;
    };
    match parsed["type"].as_str() {
        Some("content_block_delta") => match parsed["delta"]["text"].as_str() {
            Some(text) if !text.is_empty() => StreamEvent::Text(text.to_string()),
            _ => StreamEvent::Skip,
        },
        Some("message_stop") | Some("error") => StreamEvent::Done,
        _ => StreamEvent::Skip,
    }
}

fn openai_event(payload: &str) -> StreamEvent {
    if payload == "[DONE]" {
        return StreamEvent::Done;
    }
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(payload) else {
        return StreamEvent::Skip;
    };
    match parsed["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => StreamEvent::Text(content.to_string()),
        _ => StreamEvent::Skip,
    }
}

/// Hosted provider reached over HTTPS
pub struct ExternalProvider {
    provider: ApiProvider,
    api_key: String,
    model: String,
    client: Client,
}

impl ExternalProvider {
    pub fn new(provider: ApiProvider, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        tracing::info!(provider = ?provider, model = %model, "Creating external LLM provider");

        Ok(Self {
            provider,
            api_key,
            model,
            client,
        })
    }

    fn endpoint(&self) -> String {
        match &self.provider {
            ApiProvider::Anthropic => "https://api.anthropic.com/v1/messages".to_string(),
            ApiProvider::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
            ApiProvider::Custom { endpoint } => endpoint.clone(),
        }
    }

    fn request_body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        match self.provider {
            ApiProvider::Anthropic => json!({
                "model": self.model,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
                "system": request.system,
                "messages": [{"role": "user", "content": request.user}],
                "stream": stream
            }),
            _ => json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": request.system},
                    {"role": "user", "content": request.user}
                ],
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
                "stream": stream
            }),
        }
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::Response> {
        let endpoint = self.endpoint();
        tracing::debug!(
            endpoint = %endpoint,
            model = %self.model,
            max_tokens = request.max_tokens,
            stream = stream,
            "Sending chat-completion request"
        );

        let builder = self
            .client
            .post(&endpoint)
            .timeout(request.timeout)
            .json(&self.request_body(request, stream));

        let builder = match self.provider {
            ApiProvider::Anthropic => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            _ => builder.header("Authorization", format!("Bearer {}", self.api_key)),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| describe_send_error(&endpoint, e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !status.is_success() || (stream && content_type.contains("text/html")) {
            let error = response.text().await.unwrap_or_default();
            let preview: String = error.chars().take(300).collect();
            return Err(anyhow!("{} API error (HTTP {}): {}", self.info().name, status, preview));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for ExternalProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let endpoint = self.endpoint();
        let response = self.send(request, false).await?;

        let text = match self.provider {
            ApiProvider::Anthropic => {
                let result: AnthropicResponse = parse_json_response(response, &endpoint).await?;
                result
                    .content
                    .into_iter()
                    .next()
                    .map(|c| c.text)
                    .ok_or_else(|| anyhow!("No content returned from Anthropic API"))?
            }
            _ => {
                let result: OpenAIResponse = parse_json_response(response, &endpoint).await?;
                result
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| anyhow!("No choices returned from API"))?
            }
        };

        tracing::debug!(chars = text.len(), "API response received");
        Ok(text)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream> {
        let response = self.send(request, true).await?;
        let parse: fn(&str) -> StreamEvent = match self.provider {
            ApiProvider::Anthropic => anthropic_event,
            _ => openai_event,
        };

        let (sender, receiver) = mpsc::channel::<String>(STREAM_CHANNEL_CAPACITY);
        let mut byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = Vec::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(error = %e, "LLM stream interrupted");
                        break;
                    }
                };

                for payload in drain_sse_data(&mut buffer, &chunk) {
                    match parse(&payload) {
                        StreamEvent::Text(text) => {
                            if sender.send(text).await.is_err() {
                                return;
                            }
                        }
                        StreamEvent::Done => return,
                        StreamEvent::Skip => {}
                    }
                }
            }
        });

        Ok(TokenStream::new(receiver))
    }

    fn info(&self) -> ProviderInfo {
        let name = match &self.provider {
            ApiProvider::Anthropic => "Anthropic",
            ApiProvider::OpenAI => "OpenAI",
            ApiProvider::Custom { .. } => "Custom",
        };

        ProviderInfo {
            name: name.to_string(),
            model: self.model.clone(),
            supports_streaming: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_anthropic_events() {
        assert_eq!(
            anthropic_event(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Ciao"}}"#),
            StreamEvent::Text("Ciao".into())
        );
        assert_eq!(anthropic_event(r#"{"type":"message_stop"}"#), StreamEvent::Done);
        assert_eq!(anthropic_event(r#"{"type":"ping"}"#), StreamEvent::Skip);
        assert_eq!(anthropic_event("not json"), StreamEvent::Skip);
    }

    #[test]
    fn test_openai_events() {
        assert_eq!(
            openai_event(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#),
            StreamEvent::Text("Hi".into())
        );
        assert_eq!(openai_event(r#"{"choices":[{"delta":{}}]}"#), StreamEvent::Skip);
        assert_eq!(openai_event("[DONE]"), StreamEvent::Done);
    }

    #[test]
    fn test_anthropic_body_uses_system_field() {
        let provider = ExternalProvider::new(
            ApiProvider::Anthropic,
            "key".into(),
            "claude-3-haiku-20240307".into(),
        )
        .unwrap();
        let request = CompletionRequest::classification("sys", "hello", Duration::from_secs(30));
        let body = provider.request_body(&request, false);
        assert_eq!(body["system"], "sys");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn test_openai_body_prepends_system_message() {
        let provider =
            ExternalProvider::new(ApiProvider::OpenAI, "key".into(), "gpt-3.5-turbo".into()).unwrap();
        let request = CompletionRequest::generation("sys", "hello", Duration::from_secs(30));
        let body = provider.request_body(&request, true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["stream"], true);
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");
    }
}
