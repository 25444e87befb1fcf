//! Reply generation: handler result, else LLM, else template.

pub mod templates;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::SuggestedAction;
use crate::entities::Entities;
use crate::intent::{Intent, IntentResult};
use crate::llm::{CompletionRequest, LlmManager, TokenStream};
use crate::router::ActionRouter;
use crate::session::ConversationSession;

pub const DEFAULT_RESPONSE_HISTORY: usize = 8;

/// What the caller gets back for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub message: String,
    pub intent: Intent,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub suggested_actions: Vec<SuggestedAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ConversationResponse {
    pub fn apology(intent: Intent) -> Self {
        Self {
            message: templates::APOLOGY.to_string(),
            intent,
            entities: Entities::default(),
            suggested_actions: Vec::new(),
            data: None,
        }
    }
}

/// Blank output counts as a failed tier so the next provider gets a turn.
fn non_empty_reply(text: &str) -> Result<String> {
    let text = text.trim();
    ensure!(!text.is_empty(), "LLM returned an empty reply");
    Ok(text.to_string())
}

/// A generated reply plus any state a handler asked to fold into the session.
#[derive(Debug, Clone)]
pub struct GeneratedReply {
    pub response: ConversationResponse,
    pub carry_over: Option<Entities>,
}

#[derive(Clone)]
pub struct ResponseGenerator {
    router: ActionRouter,
    llm: LlmManager,
    response_history: usize,
}

impl ResponseGenerator {
    pub fn new(router: ActionRouter, llm: LlmManager, response_history: usize) -> Self {
        Self {
            router,
            llm,
            response_history,
        }
    }

    /// Never fails: anything that goes wrong becomes the apology reply.
    pub async fn generate(
        &self,
        message: &str,
        session: &ConversationSession,
        intent: &IntentResult,
    ) -> GeneratedReply {
        match self.try_generate(message, session, intent).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(session_id = %session.session_id, error = %e, "Response generation failed");
                GeneratedReply {
                    response: ConversationResponse::apology(intent.primary_intent),
                    carry_over: None,
                }
            }
        }
    }

    async fn try_generate(
        &self,
        message: &str,
        session: &ConversationSession,
        intent: &IntentResult,
    ) -> Result<GeneratedReply> {
        if let Some(action) = self.router.route(session.role, intent, session, message).await {
            return Ok(GeneratedReply {
                response: ConversationResponse {
                    message: action.message,
                    intent: intent.primary_intent,
                    entities: intent.entities.clone(),
                    suggested_actions: action.suggested_actions,
                    data: action.data,
                },
                carry_over: action.carry_over,
            });
        }

        let text = match self.llm_request(message, session, intent, self.llm.generation_timeout())? {
            Some(request) => match self.llm.complete_first(&request, non_empty_reply).await {
                Ok((tier, text)) => {
                    tracing::info!(tier = %tier, intent = %intent.primary_intent, "LLM reply generated");
                    text
                }
                Err(e) => {
                    tracing::warn!(error = %e, "All LLM tiers failed, using template reply");
                    self.template(session, intent)
                }
            },
            None => self.template(session, intent),
        };

        Ok(GeneratedReply {
            response: ConversationResponse {
                message: text,
                intent: intent.primary_intent,
                entities: intent.entities.clone(),
                suggested_actions: templates::suggested_actions(intent.primary_intent),
                data: None,
            },
            carry_over: None,
        })
    }

    /// Open a reply stream. Handlers are not consulted; with no LLM the template arrives as
    /// one chunk.
    pub async fn stream(&self, message: &str, session: &ConversationSession, intent: &IntentResult) -> TokenStream {
        let request = match self.llm_request(message, session, intent, self.llm.stream_timeout()) {
            Ok(Some(request)) => request,
            Ok(None) => return TokenStream::single(self.template(session, intent)),
            Err(e) => {
                tracing::error!(error = %e, "Could not build streaming prompt");
                return TokenStream::single(templates::APOLOGY);
            }
        };

        match self.llm.stream_first(&request).await {
            Ok((tier, stream)) => {
                tracing::info!(tier = %tier, intent = %intent.primary_intent, "Streaming LLM reply");
                stream
            }
            Err(e) => {
                tracing::warn!(error = %e, "No LLM stream available, sending template reply");
                TokenStream::single(self.template(session, intent))
            }
        }
    }

    fn llm_request(
        &self,
        message: &str,
        session: &ConversationSession,
        intent: &IntentResult,
        timeout: std::time::Duration,
    ) -> Result<Option<CompletionRequest>> {
        if !self.llm.is_configured() {
            return Ok(None);
        }
        let system = templates::response_system_prompt(session.role, intent)?;
        let history = session.history_lines(self.response_history, true);
        let user = templates::response_user_content(&history, message);
        Ok(Some(CompletionRequest::generation(system, user, timeout)))
    }

    fn template(&self, session: &ConversationSession, intent: &IntentResult) -> String {
        templates::fallback_reply(intent.primary_intent, session.role, &intent.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities;
    use crate::llm::testing::{manager, Script, ScriptedProvider};
    use crate::router::testing::{router, RecordingHandlers};
    use crate::session::Role;
    use std::sync::Arc;

    fn session(role: Role) -> ConversationSession {
        let mut s = ConversationSession::start("s1", role, None, templates::greeting(role));
        s.push_user("python jobs in Milan");
        s
    }

    fn generator(llm: LlmManager) -> (ResponseGenerator, Arc<RecordingHandlers>) {
        let handlers = Arc::new(RecordingHandlers::default());
        (ResponseGenerator::new(router(handlers.clone()), llm, DEFAULT_RESPONSE_HISTORY), handlers)
    }

    #[tokio::test]
    async fn test_handler_result_wins_over_llm() {
        let primary = ScriptedProvider::new("primary", vec![Script::Reply("llm text".into())]);
        let (gen, handlers) = generator(manager(Some(primary.clone()), None));
        let intent = IntentResult::new(Intent::JobSearch, 0.9, entities::extract("python jobs in Milan"));

        let reply = gen.generate("python jobs in Milan", &session(Role::Student), &intent).await;
        assert_eq!(reply.response.message, "handled by job_search");
        assert_eq!(reply.response.suggested_actions[0].action, "job_search");
        assert_eq!(reply.response.entities.location.as_deref(), Some("Milan"));
        assert_eq!(handlers.calls(), vec!["job_search"]);
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_llm_reply_gets_table_actions_and_history() {
        let primary = ScriptedProvider::new("primary", vec![Script::Fail("down".into())]);
        let secondary = ScriptedProvider::new("secondary", vec![Script::Reply("  Here are some ideas.  ".into())]);
        let (gen, _) = generator(manager(Some(primary), Some(secondary.clone())));
        let intent = IntentResult::new(Intent::JobSearch, 0.5, Entities::default());

        let reply = gen.generate("python jobs in Milan", &session(Role::Student), &intent).await;
        assert_eq!(reply.response.message, "Here are some ideas.");
        assert_eq!(reply.response.suggested_actions.len(), 3);

        let request = secondary.calls.lock()[0].clone();
        assert_eq!(request.max_tokens, 1000);
        assert!(request.user.starts_with("Conversation so far:\nASSISTANT: 👋 Hi!"));
        assert!(request.user.ends_with("User's new message: python jobs in Milan"));
    }

    #[tokio::test]
    async fn test_blank_primary_reply_tries_secondary() {
        let primary = ScriptedProvider::new("primary", vec![Script::Reply("  \n ".into())]);
        let secondary = ScriptedProvider::new("secondary", vec![Script::Reply("From the backup.".into())]);
        let (gen, _) = generator(manager(Some(primary.clone()), Some(secondary.clone())));
        let intent = IntentResult::new(Intent::JobSearch, 0.5, Entities::default());

        let reply = gen.generate("python jobs in Milan", &session(Role::Student), &intent).await;
        assert_eq!(reply.response.message, "From the backup.");
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 1);

        let blank = ScriptedProvider::new("primary", vec![Script::Reply(String::new())]);
        let (gen, _) = generator(manager(Some(blank), None));
        let reply = gen.generate("python jobs in Milan", &session(Role::Student), &intent).await;
        assert!(reply.response.message.starts_with("I can help you find jobs!"));
    }

    #[tokio::test]
    async fn test_template_when_llm_absent_or_failing() {
        let (gen, _) = generator(LlmManager::disabled());
        let intent = IntentResult::new(Intent::Greeting, 0.9, Entities::default());
        let reply = gen.generate("hi", &session(Role::Recruiter), &intent).await;
        assert_eq!(reply.response.message, templates::greeting(Role::Recruiter));
        assert!(reply.response.suggested_actions.is_empty());

        let primary = ScriptedProvider::new("primary", vec![Script::Fail("boom".into())]);
        let (gen, _) = generator(manager(Some(primary), None));
        let reply = gen.generate("hmm", &session(Role::Student), &IntentResult::unclassified()).await;
        assert!(reply.response.message.starts_with("I'd love to help with that!"));
    }

    #[tokio::test]
    async fn test_failed_handler_falls_through_to_template() {
        let handlers = RecordingHandlers::failing();
        let gen = ResponseGenerator::new(router(handlers), LlmManager::disabled(), DEFAULT_RESPONSE_HISTORY);
        let intent = IntentResult::new(Intent::ProfileBuild, 0.9, Entities::default());
        let reply = gen.generate("profile", &session(Role::Student), &intent).await;
        assert!(reply.response.message.starts_with("Let's build your profile!"));
        assert_eq!(reply.response.suggested_actions[0].action, "add_project");
    }

    #[tokio::test]
    async fn test_stream_uses_llm_chunks_or_single_template() {
        let primary = ScriptedProvider::new(
            "primary",
            vec![Script::Chunks(vec!["Hel".into(), "lo".into()])],
        );
        let (gen, handlers) = generator(manager(Some(primary), None));
        let intent = IntentResult::new(Intent::JobSearch, 0.9, Entities::default());
        let stream = gen.stream("jobs", &session(Role::Student), &intent).await;
        assert_eq!(stream.collect().await, "Hello");
        assert!(handlers.calls().is_empty());

        let (gen, _) = generator(LlmManager::disabled());
        let mut stream = gen.stream("hi", &session(Role::Student), &IntentResult::unclassified()).await;
        assert!(stream.next().await.unwrap().starts_with("I'd love to help"));
        assert!(stream.next().await.is_none());
    }
}
