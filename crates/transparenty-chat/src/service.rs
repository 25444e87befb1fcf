//! Conversation service: the caller-facing entry point that ties sessions, classification,
//! routing and generation together for one turn.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::actions::{BackendClient, InstitutionHandler, RecruiterHandler, StudentHandler};
use crate::config::ServiceConfig;
use crate::intent::IntentClassifier;
use crate::llm::streaming::STREAM_CHANNEL_CAPACITY;
use crate::llm::{LlmManager, TokenStream};
use crate::response::{templates, ConversationResponse, ResponseGenerator};
use crate::router::ActionRouter;
use crate::scorers::{CandidateMatcher, HeuristicMarketAnalyzer, MarketAnalyzer, WeightedCandidateMatcher};
use crate::session::{ConversationSession, Role, SessionStore};

#[derive(Clone)]
pub struct ConversationService {
    store: SessionStore,
    classifier: IntentClassifier,
    generator: ResponseGenerator,
}

impl ConversationService {
    pub fn new(store: SessionStore, classifier: IntentClassifier, generator: ResponseGenerator) -> Self {
        Self {
            store,
            classifier,
            generator,
        }
    }

    /// Build the full stack from configuration. Redis being down is not an error here; the
    /// store degrades to process memory.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate().context("Invalid service configuration")?;

        let store = SessionStore::connect(&config.session).await;
        let llm = LlmManager::from_settings(&config.llm).context("Failed to build LLM providers")?;
        let backend = BackendClient::new(&config.backend).context("Failed to build backend client")?;

        let analyzer: Arc<dyn MarketAnalyzer> = Arc::new(HeuristicMarketAnalyzer);
        let matcher: Arc<dyn CandidateMatcher> = Arc::new(WeightedCandidateMatcher);

        let router = ActionRouter::new(
            Arc::new(StudentHandler::new(backend.clone(), analyzer.clone())),
            Arc::new(RecruiterHandler::new(backend.clone(), analyzer, matcher)),
            Arc::new(InstitutionHandler::new(backend)),
            config.routing.confidence_threshold,
        );
        let classifier = IntentClassifier::new(
            llm.clone(),
            config.routing.intent_history,
            Duration::from_secs(config.routing.classification_deadline_secs),
        );

        tracing::info!(
            session_backend = store.backend_name(),
            llm_configured = llm.is_configured(),
            backend_url = %config.backend.base_url,
            threshold = config.routing.confidence_threshold,
            "Conversation service ready"
        );

        let generator = ResponseGenerator::new(router, llm, config.routing.response_history);
        Ok(Self::new(store, classifier, generator))
    }

    pub fn session_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Existing session, or a fresh one opened with the role's greeting. A stored session keeps
    /// the role it was created with.
    async fn load_or_start(&self, session_id: &str, role: Role, user_id: Option<&str>) -> ConversationSession {
        match self.store.get(session_id).await {
            Some(mut session) => {
                if session.role != role {
                    tracing::debug!(session_id, stored = %session.role, requested = %role, "Keeping stored session role");
                }
                if session.user_id.is_none() {
                    session.user_id = user_id.map(str::to_string);
                }
                session
            }
            None => {
                tracing::info!(session_id, role = %role, "Starting new conversation session");
                ConversationSession::start(session_id, role, user_id.map(str::to_string), templates::greeting(role))
            }
        }
    }

    /// Handle one user turn end to end. Always returns a response; failures inside become
    /// fallbacks or the apology.
    pub async fn process_message(
        &self,
        session_id: &str,
        message: &str,
        role: Role,
        user_id: Option<&str>,
    ) -> ConversationResponse {
        let mut session = self.load_or_start(session_id, role, user_id).await;
        session.push_user(message);

        let intent = self
            .classifier
            .detect_intent(message, session.role, Some(&session))
            .await;
        session.record_intent(&intent);

        let reply = self.generator.generate(message, &session, &intent).await;
        if let Some(carry_over) = &reply.carry_over {
            session.extracted_entities.merge(carry_over);
        }
        session.push_assistant(reply.response.message.clone(), &intent);

        if !self.store.save(&mut session).await {
            tracing::warn!(session_id, "Turn answered but session was not persisted");
        }

        reply.response
    }

    /// Stream the reply for one turn. Classification completes before the first chunk. The turn
    /// is persisted only once the stream has been fully delivered; if the receiver is dropped
    /// first, nothing from this turn is saved.
    pub async fn stream_response(
        &self,
        session_id: &str,
        message: &str,
        role: Role,
        user_id: Option<&str>,
    ) -> TokenStream {
        let mut session = self.load_or_start(session_id, role, user_id).await;
        session.push_user(message);

        let intent = self
            .classifier
            .detect_intent(message, session.role, Some(&session))
            .await;
        session.record_intent(&intent);

        let mut upstream = self.generator.stream(message, &session, &intent).await;
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let store = self.store.clone();

        tokio::spawn(async move {
            let mut buffer = String::new();
            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        tracing::info!(session_id = %session.session_id, "Stream receiver dropped, discarding turn");
                        return;
                    }
                    chunk = upstream.next() => match chunk {
                        Some(chunk) => {
                            buffer.push_str(&chunk);
                            if tx.send(chunk).await.is_err() {
                                tracing::info!(session_id = %session.session_id, "Stream receiver dropped, discarding turn");
                                return;
                            }
                        }
                        None => break,
                    },
                }
            }

            session.push_assistant(buffer, &intent);
            if !store.save(&mut session).await {
                tracing::warn!(session_id = %session.session_id, "Streamed turn was not persisted");
            }
        });

        TokenStream::new(rx)
    }

    pub async fn get_session(&self, session_id: &str) -> Option<ConversationSession> {
        self.store.get(session_id).await
    }

    pub async fn delete_session(&self, session_id: &str) -> bool {
        let deleted = self.store.delete(session_id).await;
        tracing::info!(session_id, deleted, "Session deleted");
        deleted
    }
}
