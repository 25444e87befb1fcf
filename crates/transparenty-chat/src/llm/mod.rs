//! LLM Module - chat-completion providers behind a primary/secondary fail-over chain

pub mod external;
pub mod streaming;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::LlmSettings;

pub use external::ExternalProvider;
pub use streaming::TokenStream;

/// External API providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApiProvider {
    Anthropic,
    OpenAI,
    /// Any OpenAI-compatible chat-completions endpoint.
    Custom { endpoint: String },
}

/// One chat-completion call, already normalized to a system prompt plus a single user turn.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

impl CompletionRequest {
    /// Short, near-deterministic call used for JSON intent classification.
    pub fn classification(system: impl Into<String>, user: impl Into<String>, timeout: Duration) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: 500,
            temperature: 0.1,
            timeout,
        }
    }

    /// Conversational reply generation.
    pub fn generation(system: impl Into<String>, user: impl Into<String>, timeout: Duration) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub supports_streaming: bool,
}

/// Core trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single-shot completion
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Streamed completion; the stream ends when the provider sends its end marker.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream>;

    fn info(&self) -> ProviderInfo;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTier {
    Primary,
    Secondary,
}

impl fmt::Display for ProviderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderTier::Primary => f.write_str("primary"),
            ProviderTier::Secondary => f.write_str("secondary"),
        }
    }
}

/// Holds the configured providers and tries them in priority order.
#[derive(Clone)]
pub struct LlmManager {
    primary: Option<Arc<dyn LlmProvider>>,
    secondary: Option<Arc<dyn LlmProvider>>,
    intent_timeout: Duration,
    generation_timeout: Duration,
    stream_timeout: Duration,
}

impl LlmManager {
    pub fn new(
        primary: Option<Arc<dyn LlmProvider>>,
        secondary: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        Self {
            primary,
            secondary,
            intent_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(30),
            stream_timeout: Duration::from_secs(60),
        }
    }

    /// No providers: every caller drops straight to its deterministic tier.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let build = |cfg: &crate::config::ProviderConfig| -> Result<Arc<dyn LlmProvider>> {
            let provider = ExternalProvider::new(cfg.provider.clone(), cfg.api_key.clone(), cfg.model.clone())?;
            Ok(Arc::new(provider))
        };

        let primary = settings.primary.as_ref().map(build).transpose()?;
        let secondary = settings.secondary.as_ref().map(build).transpose()?;

        Ok(Self {
            primary,
            secondary,
            intent_timeout: Duration::from_secs(settings.intent_timeout_secs),
            generation_timeout: Duration::from_secs(settings.generation_timeout_secs),
            stream_timeout: Duration::from_secs(settings.stream_timeout_secs),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    pub fn intent_timeout(&self) -> Duration {
        self.intent_timeout
    }

    pub fn generation_timeout(&self) -> Duration {
        self.generation_timeout
    }

    pub fn stream_timeout(&self) -> Duration {
        self.stream_timeout
    }

    fn tiers(&self) -> impl Iterator<Item = (ProviderTier, &Arc<dyn LlmProvider>)> {
        [
            (ProviderTier::Primary, self.primary.as_ref()),
            (ProviderTier::Secondary, self.secondary.as_ref()),
        ]
        .into_iter()
        .filter_map(|(tier, provider)| provider.map(|p| (tier, p)))
    }

    /// Run `request` against each configured tier until one returns text that `accept` takes.
    ///
    /// Transport errors, timeouts and rejected output all move on to the next tier.
    pub async fn complete_first<T>(
        &self,
        request: &CompletionRequest,
        mut accept: impl FnMut(&str) -> Result<T>,
    ) -> Result<(ProviderTier, T)> {
        let mut last_error = anyhow!("LLM is disabled or not initialized");

        for (tier, provider) in self.tiers() {
            let start = Instant::now();
            let attempt = tokio::time::timeout(request.timeout, provider.complete(request))
                .await
                .map_err(|_| anyhow!("{} provider timed out after {:?}", tier, request.timeout))
                .and_then(|r| r)
                .and_then(|text| accept(&text));

            match attempt {
                Ok(value) => {
                    tracing::debug!(
                        tier = %tier,
                        model = %provider.info().model,
                        latency_ms = start.elapsed().as_millis() as u64,
                        "LLM completion accepted"
                    );
                    return Ok((tier, value));
                }
                Err(e) => {
                    tracing::warn!(tier = %tier, error = %e, "LLM completion failed, trying next tier");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Open a stream on the first tier that accepts the request.
    pub async fn stream_first(&self, request: &CompletionRequest) -> Result<(ProviderTier, TokenStream)> {
        let mut last_error = anyhow!("LLM is disabled or not initialized");

        for (tier, provider) in self.tiers() {
            let opened = tokio::time::timeout(request.timeout, provider.complete_stream(request))
                .await
                .map_err(|_| anyhow!("{} provider did not start streaming within {:?}", tier, request.timeout))
                .and_then(|r| r)
                .with_context(|| format!("{} stream", tier));

            match opened {
                Ok(stream) => return Ok((tier, stream)),
                Err(e) => {
                    tracing::warn!(tier = %tier, error = %e, "LLM stream failed to open, trying next tier");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest::generation("system", "user", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_disabled_manager_errors() {
        let manager = LlmManager::disabled();
        assert!(!manager.is_configured());
        let result = manager.complete_first(&request(), |t| Ok(t.to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_falls_over_to_secondary() {
        let primary = ScriptedProvider::new("primary", vec![Script::Fail("boom".into())]);
        let secondary = ScriptedProvider::new("secondary", vec![Script::Reply("ok".into())]);
        let manager = manager(Some(primary.clone()), Some(secondary.clone()));

        let (tier, text) = manager
            .complete_first(&request(), |t| Ok(t.to_string()))
            .await
            .unwrap();
        assert_eq!(tier, ProviderTier::Secondary);
        assert_eq!(text, "ok");
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_output_moves_to_next_tier() {
        let primary = ScriptedProvider::new("primary", vec![Script::Reply("not json".into())]);
        let secondary = ScriptedProvider::new("secondary", vec![Script::Reply("42".into())]);
        let manager = manager(Some(primary), Some(secondary));

        let (tier, n) = manager
            .complete_first(&request(), |t| t.parse::<u32>().map_err(|e| anyhow!(e)))
            .await
            .unwrap();
        assert_eq!(tier, ProviderTier::Secondary);
        assert_eq!(n, 42);
    }

    #[tokio::test]
    async fn test_stream_first_uses_primary() {
        let primary = ScriptedProvider::new(
            "primary",
            vec![Script::Chunks(vec!["Hel".into(), "lo".into()])],
        );
        let manager = manager(Some(primary), None);
        let (tier, stream) = manager.stream_first(&request()).await.unwrap();
        assert_eq!(tier, ProviderTier::Primary);
        assert_eq!(stream.collect().await, "Hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_primary_moves_to_secondary() {
        let primary = ScriptedProvider::new("primary", vec![Script::Delayed(Duration::from_secs(60), "late".into())]);
        let secondary = ScriptedProvider::new("secondary", vec![Script::Reply("on time".into())]);
        let manager = manager(Some(primary), Some(secondary));

        let started = tokio::time::Instant::now();
        let (tier, text) = manager
            .complete_first(&request(), |t| Ok(t.to_string()))
            .await
            .unwrap();
        assert_eq!(tier, ProviderTier::Secondary);
        assert_eq!(text, "on time");
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_that_never_opens_moves_to_secondary() {
        let primary = ScriptedProvider::new("primary", vec![Script::Delayed(Duration::from_secs(60), "late".into())]);
        let secondary = ScriptedProvider::new("secondary", vec![Script::Chunks(vec!["a".into(), "b".into()])]);
        let manager = manager(Some(primary), Some(secondary));

        let (tier, stream) = manager.stream_first(&request()).await.unwrap();
        assert_eq!(tier, ProviderTier::Secondary);
        assert_eq!(stream.collect().await, "ab");

        let only_slow = ScriptedProvider::new("primary", vec![Script::Delayed(Duration::from_secs(60), "late".into())]);
        let err = super::testing::manager(Some(only_slow), None)
            .stream_first(&request())
            .await
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("did not start streaming"));
    }
}
