//! Intent → handler dispatch.
//!
//! The router owns one handler group per role. A route fires only when the classifier is
//! confident enough; anything else is left to the response generator.

use std::sync::Arc;

use crate::actions::{ActionResult, HandlerContext, InstitutionActions, RecruiterActions, StudentActions};
use crate::intent::{Intent, IntentResult};
use crate::session::{ConversationSession, Role};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

const SEARCH_STEMS: &[&str] = &["search", "cercano", "looking"];
const SKILL_STEMS: &[&str] = &["skill", "competenz", "gap"];
const BENCHMARK_STEMS: &[&str] = &["benchmark", "compare", "ranking"];

fn mentions(message: &str, stems: &[&str]) -> bool {
    stems.iter().any(|s| message.contains(s))
}

#[derive(Clone)]
pub struct ActionRouter {
    student: Arc<dyn StudentActions>,
    recruiter: Arc<dyn RecruiterActions>,
    institution: Arc<dyn InstitutionActions>,
    threshold: f32,
}

impl ActionRouter {
    pub fn new(
        student: Arc<dyn StudentActions>,
        recruiter: Arc<dyn RecruiterActions>,
        institution: Arc<dyn InstitutionActions>,
        threshold: f32,
    ) -> Self {
        Self {
            student,
            recruiter,
            institution,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// True when `role` has a handler for `intent`.
    pub fn handles(role: Role, intent: Intent) -> bool {
        match role {
            Role::Student => matches!(
                intent,
                Intent::JobSearch
                    | Intent::SkillAnalysis
                    | Intent::ProfileBuild
                    | Intent::CareerAdvice
                    | Intent::EducationInfo
            ),
            Role::Recruiter => matches!(
                intent,
                Intent::CandidateSearch
                    | Intent::MatchExplanation
                    | Intent::JobPostingHelp
                    | Intent::MarketIntelligence
            ),
            Role::Institution => matches!(
                intent,
                Intent::StudentAnalytics
                    | Intent::AtRiskStudents
                    | Intent::CompanyTrends
                    | Intent::PartnershipInfo
            ),
        }
    }

    fn context_for(session: &ConversationSession) -> HandlerContext {
        HandlerContext {
            user_id: session.user_id.clone(),
            previous_entities: session.extracted_entities.clone(),
            recent_search: session.extracted_entities.last_search.clone(),
            institution_id: session.extracted_entities.institution_id.clone(),
        }
    }

    /// Run the handler for this turn, if one applies. Handler failures are logged and
    /// reported as "no route" so the caller can fall back to generation.
    pub async fn route(
        &self,
        role: Role,
        intent: &IntentResult,
        session: &ConversationSession,
        raw_message: &str,
    ) -> Option<ActionResult> {
        let primary = intent.primary_intent;
        if !Self::handles(role, primary) || intent.confidence <= self.threshold {
            tracing::debug!(
                role = %role,
                intent = %primary,
                confidence = intent.confidence,
                threshold = self.threshold,
                "No handler route"
            );
            return None;
        }

        let ctx = Self::context_for(session);
        let entities = &intent.entities;
        let lower = raw_message.to_lowercase();

        let outcome = match (role, primary) {
            (Role::Student, Intent::JobSearch) => self.student.job_search(entities, &ctx).await,
            (Role::Student, Intent::SkillAnalysis) => self.student.skill_analysis(entities, &ctx).await,
            (Role::Student, Intent::ProfileBuild) => self.student.profile_suggestions(entities, &ctx).await,
            (Role::Student, Intent::CareerAdvice) => self.student.career_advice(entities, &ctx).await,
            (Role::Student, Intent::EducationInfo) => self.student.education_info(entities, &ctx).await,

            (Role::Recruiter, Intent::CandidateSearch) => {
                self.recruiter.candidate_search(entities, &ctx, raw_message).await
            }
            (Role::Recruiter, Intent::MatchExplanation) => {
                self.recruiter.match_explanation(entities, &ctx, raw_message).await
            }
            (Role::Recruiter, Intent::JobPostingHelp) => {
                self.recruiter.job_posting_help(entities, &ctx, raw_message).await
            }
            (Role::Recruiter, Intent::MarketIntelligence) => {
                self.recruiter.market_intelligence(entities, &ctx, raw_message).await
            }

            (Role::Institution, Intent::StudentAnalytics) => {
                if mentions(&lower, SEARCH_STEMS) {
                    self.institution.search_analytics(entities, &ctx, raw_message).await
                } else if mentions(&lower, SKILL_STEMS) {
                    self.institution.skill_demand(entities, &ctx, raw_message).await
                } else {
                    self.institution.search_analytics(entities, &ctx, raw_message).await
                }
            }
            (Role::Institution, Intent::AtRiskStudents) => {
                self.institution.at_risk_students(entities, &ctx, raw_message).await
            }
            (Role::Institution, Intent::CompanyTrends) => {
                if mentions(&lower, BENCHMARK_STEMS) {
                    self.institution.benchmark(entities, &ctx, raw_message).await
                } else {
                    self.institution.company_interest(entities, &ctx, raw_message).await
                }
            }
            (Role::Institution, Intent::PartnershipInfo) => {
                self.institution.partnership_info(entities, &ctx, raw_message).await
            }

            _ => return None,
        };

        match outcome {
            Ok(result) => {
                tracing::info!(role = %role, intent = %primary, success = result.success, "Handler completed");
                Some(result)
            }
            Err(e) => {
                tracing::warn!(role = %role, intent = %primary, error = %e, "Handler failed");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Handler groups that record which operation ran.

    use super::*;
    use crate::entities::Entities;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct RecordingHandlers {
        pub calls: Mutex<Vec<&'static str>>,
        pub contexts: Mutex<Vec<HandlerContext>>,
        pub fail: bool,
    }

    impl RecordingHandlers {
        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Default::default()
            })
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().clone()
        }

        fn record(&self, name: &'static str, ctx: &HandlerContext) -> Result<ActionResult> {
            self.calls.lock().push(name);
            self.contexts.lock().push(ctx.clone());
            if self.fail {
                return Err(anyhow!("{} exploded", name));
            }
            Ok(ActionResult::ok(format!("handled by {}", name)).with_actions(&[("Next", name)]))
        }
    }

    #[async_trait]
    impl StudentActions for RecordingHandlers {
        async fn job_search(&self, _: &Entities, ctx: &HandlerContext) -> Result<ActionResult> {
            self.record("job_search", ctx)
        }
        async fn skill_analysis(&self, _: &Entities, ctx: &HandlerContext) -> Result<ActionResult> {
            self.record("skill_analysis", ctx)
        }
        async fn profile_suggestions(&self, _: &Entities, ctx: &HandlerContext) -> Result<ActionResult> {
            self.record("profile_suggestions", ctx)
        }
        async fn career_advice(&self, _: &Entities, ctx: &HandlerContext) -> Result<ActionResult> {
            self.record("career_advice", ctx)
        }
        async fn education_info(&self, _: &Entities, ctx: &HandlerContext) -> Result<ActionResult> {
            self.record("education_info", ctx)
        }
    }

    #[async_trait]
    impl RecruiterActions for RecordingHandlers {
        async fn candidate_search(&self, _: &Entities, ctx: &HandlerContext, _: &str) -> Result<ActionResult> {
            self.record("candidate_search", ctx)
        }
        async fn match_explanation(&self, _: &Entities, ctx: &HandlerContext, _: &str) -> Result<ActionResult> {
            self.record("match_explanation", ctx)
        }
        async fn job_posting_help(&self, _: &Entities, ctx: &HandlerContext, _: &str) -> Result<ActionResult> {
            self.record("job_posting_help", ctx)
        }
        async fn market_intelligence(&self, _: &Entities, ctx: &HandlerContext, _: &str) -> Result<ActionResult> {
            self.record("market_intelligence", ctx)
        }
    }

    #[async_trait]
    impl InstitutionActions for RecordingHandlers {
        async fn search_analytics(&self, _: &Entities, ctx: &HandlerContext, _: &str) -> Result<ActionResult> {
            self.record("search_analytics", ctx)
        }
        async fn skill_demand(&self, _: &Entities, ctx: &HandlerContext, _: &str) -> Result<ActionResult> {
            self.record("skill_demand", ctx)
        }
        async fn at_risk_students(&self, _: &Entities, ctx: &HandlerContext, _: &str) -> Result<ActionResult> {
            self.record("at_risk_students", ctx)
        }
        async fn company_interest(&self, _: &Entities, ctx: &HandlerContext, _: &str) -> Result<ActionResult> {
            self.record("company_interest", ctx)
        }
        async fn benchmark(&self, _: &Entities, ctx: &HandlerContext, _: &str) -> Result<ActionResult> {
            self.record("benchmark", ctx)
        }
        async fn partnership_info(&self, _: &Entities, ctx: &HandlerContext, _: &str) -> Result<ActionResult> {
            self.record("partnership_info", ctx)
        }
    }

    pub fn router(handlers: Arc<RecordingHandlers>) -> ActionRouter {
        ActionRouter::new(
            handlers.clone(),
            handlers.clone(),
            handlers,
            DEFAULT_CONFIDENCE_THRESHOLD,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::entities::{Entities, RecentSearch};

    fn session(role: Role) -> ConversationSession {
        ConversationSession::start("s1", role, Some("u1".into()), "hello")
    }

    fn intent(primary: Intent, confidence: f32) -> IntentResult {
        IntentResult::new(primary, confidence, Entities::default())
    }

    #[tokio::test]
    async fn test_threshold_boundary_is_excluded() {
        let handlers = Arc::new(RecordingHandlers::default());
        let router = router(handlers.clone());
        let s = session(Role::Student);

        assert!(router.route(Role::Student, &intent(Intent::JobSearch, 0.6), &s, "jobs").await.is_none());
        assert!(handlers.calls().is_empty());

        let result = router.route(Role::Student, &intent(Intent::JobSearch, 0.61), &s, "jobs").await;
        assert_eq!(result.unwrap().message, "handled by job_search");
        assert_eq!(handlers.calls(), vec!["job_search"]);
    }

    #[tokio::test]
    async fn test_intent_outside_role_group_is_not_routed() {
        let handlers = Arc::new(RecordingHandlers::default());
        let router = router(handlers.clone());
        let s = session(Role::Student);

        assert!(router
            .route(Role::Student, &intent(Intent::CandidateSearch, 0.95), &s, "find devs")
            .await
            .is_none());
        assert!(router.route(Role::Student, &intent(Intent::Greeting, 0.9), &s, "hi").await.is_none());
        assert!(router.route(Role::Student, &intent(Intent::ProjectHelp, 0.9), &s, "x").await.is_none());
        assert!(handlers.calls().is_empty());
    }

    #[tokio::test]
    async fn test_student_and_recruiter_dispatch() {
        let handlers = Arc::new(RecordingHandlers::default());
        let router = router(handlers.clone());

        let student = session(Role::Student);
        for i in [
            Intent::SkillAnalysis,
            Intent::ProfileBuild,
            Intent::CareerAdvice,
            Intent::EducationInfo,
        ] {
            router.route(Role::Student, &intent(i, 0.9), &student, "x").await.unwrap();
        }

        let recruiter = session(Role::Recruiter);
        for i in [
            Intent::CandidateSearch,
            Intent::MatchExplanation,
            Intent::JobPostingHelp,
            Intent::MarketIntelligence,
        ] {
            router.route(Role::Recruiter, &intent(i, 0.9), &recruiter, "x").await.unwrap();
        }

        assert_eq!(
            handlers.calls(),
            vec![
                "skill_analysis",
                "profile_suggestions",
                "career_advice",
                "education_info",
                "candidate_search",
                "match_explanation",
                "job_posting_help",
                "market_intelligence",
            ]
        );
    }

    #[tokio::test]
    async fn test_institution_sub_routes() {
        let handlers = Arc::new(RecordingHandlers::default());
        let router = router(handlers.clone());
        let s = session(Role::Institution);
        let cases = [
            (Intent::StudentAnalytics, "What are companies searching for?"),
            (Intent::StudentAnalytics, "Quali competenze mancano?"),
            (Intent::StudentAnalytics, "show me the skill gap"),
            (Intent::StudentAnalytics, "placement numbers"),
            (Intent::CompanyTrends, "How do we compare to other schools?"),
            (Intent::CompanyTrends, "which companies are active"),
            (Intent::AtRiskStudents, "who needs help"),
            (Intent::PartnershipInfo, "pricing"),
        ];
        for (i, message) in cases {
            router.route(Role::Institution, &intent(i, 0.8), &s, message).await.unwrap();
        }

        assert_eq!(
            handlers.calls(),
            vec![
                "search_analytics",
                "skill_demand",
                "skill_demand",
                "search_analytics",
                "benchmark",
                "company_interest",
                "at_risk_students",
                "partnership_info",
            ]
        );
    }

    #[tokio::test]
    async fn test_context_carries_session_state() {
        let handlers = Arc::new(RecordingHandlers::default());
        let router = router(handlers.clone());
        let mut s = session(Role::Recruiter);
        s.extracted_entities.last_search = Some(RecentSearch::default());
        s.extracted_entities.institution_id = Some("inst_1".into());

        router
            .route(Role::Recruiter, &intent(Intent::MatchExplanation, 0.9), &s, "why")
            .await
            .unwrap();

        let ctx = handlers.contexts.lock()[0].clone();
        assert_eq!(ctx.user_id.as_deref(), Some("u1"));
        assert!(ctx.recent_search.is_some());
        assert_eq!(ctx.institution_id.as_deref(), Some("inst_1"));
    }

    #[tokio::test]
    async fn test_handler_error_yields_none() {
        let handlers = RecordingHandlers::failing();
        let router = router(handlers.clone());
        let s = session(Role::Student);

        assert!(router.route(Role::Student, &intent(Intent::JobSearch, 0.9), &s, "jobs").await.is_none());
        assert_eq!(handlers.calls(), vec!["job_search"]);
    }
}
