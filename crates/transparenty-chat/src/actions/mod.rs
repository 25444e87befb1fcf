//! Action handlers
//!
//! Each role has a handler group behind a trait so the router can be built with real
//! backend-backed handlers or with test doubles. Handlers return `Err` only for genuine
//! failures; "no data" is a successful result with a helpful message.

pub mod backend;
pub mod institution;
pub mod recruiter;
pub mod student;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::{Entities, RecentSearch};

pub use backend::BackendClient;
pub use institution::InstitutionHandler;
pub use recruiter::RecruiterHandler;
pub use student::StudentHandler;

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub label: String,
    pub action: String,
}

impl SuggestedAction {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

pub(crate) fn suggestions(pairs: &[(&str, &str)]) -> Vec<SuggestedAction> {
    pairs.iter().map(|(label, action)| SuggestedAction::new(*label, *action)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub suggested_actions: Vec<SuggestedAction>,
    /// State to fold into the session's entities, e.g. a recruiter's last search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carry_over: Option<Entities>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            suggested_actions: Vec::new(),
            carry_over: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_actions(mut self, pairs: &[(&str, &str)]) -> Self {
        self.suggested_actions = suggestions(pairs);
        self
    }

    pub fn with_carry_over(mut self, entities: Entities) -> Self {
        self.carry_over = Some(entities);
        self
    }
}

/// Conversation state a handler may consult.
#[derive(Debug, Clone, Default)]
pub struct HandlerContext {
    pub user_id: Option<String>,
    pub previous_entities: Entities,
    pub recent_search: Option<RecentSearch>,
    pub institution_id: Option<String>,
}

impl HandlerContext {
    /// Accumulated entities with this turn's values layered on top.
    pub fn resolve(&self, current: &Entities) -> Entities {
        let mut resolved = self.previous_entities.without_carried_state();
        resolved.merge(current);
        resolved
    }
}

// ============================================================================
// Handler groups
// ============================================================================

#[async_trait]
pub trait StudentActions: Send + Sync {
    async fn job_search(&self, entities: &Entities, ctx: &HandlerContext) -> Result<ActionResult>;
    async fn skill_analysis(&self, entities: &Entities, ctx: &HandlerContext) -> Result<ActionResult>;
    async fn profile_suggestions(&self, entities: &Entities, ctx: &HandlerContext) -> Result<ActionResult>;
    async fn career_advice(&self, entities: &Entities, ctx: &HandlerContext) -> Result<ActionResult>;
    async fn education_info(&self, entities: &Entities, ctx: &HandlerContext) -> Result<ActionResult>;
}

#[async_trait]
pub trait RecruiterActions: Send + Sync {
    async fn candidate_search(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str)
        -> Result<ActionResult>;
    async fn match_explanation(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str)
        -> Result<ActionResult>;
    async fn job_posting_help(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str)
        -> Result<ActionResult>;
    async fn market_intelligence(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str)
        -> Result<ActionResult>;
}

#[async_trait]
pub trait InstitutionActions: Send + Sync {
    async fn search_analytics(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str)
        -> Result<ActionResult>;
    async fn skill_demand(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str)
        -> Result<ActionResult>;
    async fn at_risk_students(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str)
        -> Result<ActionResult>;
    async fn company_interest(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str)
        -> Result<ActionResult>;
    async fn benchmark(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str) -> Result<ActionResult>;
    async fn partnership_info(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str)
        -> Result<ActionResult>;
}
