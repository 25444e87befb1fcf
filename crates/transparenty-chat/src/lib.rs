pub mod actions;
pub mod config;
pub mod entities;
pub mod intent;
pub mod llm;
pub mod logging;
pub mod response;
pub mod router;
pub mod scorers;
pub mod service;
pub mod session;

// Re-export primary types for convenience
pub use config::{ConfigError, ServiceConfig};
pub use entities::{Entities, ExperienceLevel, SearchQuery};
pub use intent::{Intent, IntentClassifier, IntentResult};
pub use response::{ConversationResponse, ResponseGenerator};
pub use router::ActionRouter;
pub use service::ConversationService;
pub use session::{ConversationSession, Role, SessionStore};

// Re-export LLM types
pub use llm::{ApiProvider, CompletionRequest, LlmManager, LlmProvider, ProviderInfo, TokenStream};

// Re-export action types
pub use actions::{ActionResult, HandlerContext, SuggestedAction};

// Re-export common types
pub use anyhow::{Error, Result};
