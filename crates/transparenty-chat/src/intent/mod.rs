//! Intent vocabulary and classification results.

pub mod classifier;
pub mod rules;

use serde::{Deserialize, Deserializer, Serialize};

use crate::entities::Entities;
use crate::session::Role;

pub use classifier::IntentClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    // Student
    JobSearch,
    ProfileBuild,
    SkillAnalysis,
    CareerAdvice,
    EducationInfo,
    ProjectHelp,

    // Recruiter
    CandidateSearch,
    MatchExplanation,
    JobPostingHelp,
    MarketIntelligence,

    // Institution
    PartnershipInfo,
    StudentAnalytics,
    AtRiskStudents,
    CompanyTrends,

    // General
    Greeting,
    Help,
    Clarification,
    #[default]
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 18] = [
        Intent::JobSearch,
        Intent::ProfileBuild,
        Intent::SkillAnalysis,
        Intent::CareerAdvice,
        Intent::EducationInfo,
        Intent::ProjectHelp,
        Intent::CandidateSearch,
        Intent::MatchExplanation,
        Intent::JobPostingHelp,
        Intent::MarketIntelligence,
        Intent::PartnershipInfo,
        Intent::StudentAnalytics,
        Intent::AtRiskStudents,
        Intent::CompanyTrends,
        Intent::Greeting,
        Intent::Help,
        Intent::Clarification,
        Intent::Unknown,
    ];

    pub const GENERAL: [Intent; 4] = [
        Intent::Greeting,
        Intent::Help,
        Intent::Clarification,
        Intent::Unknown,
    ];

    /// Parse an intent label. Anything not in the vocabulary is `Unknown`.
    pub fn parse(label: &str) -> Intent {
        let normalized = label.trim().trim_matches('"').to_lowercase().replace(['-', ' '], "_");
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str() == normalized)
            .unwrap_or(Intent::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::JobSearch => "job_search",
            Intent::ProfileBuild => "profile_build",
            Intent::SkillAnalysis => "skill_analysis",
            Intent::CareerAdvice => "career_advice",
            Intent::EducationInfo => "education_info",
            Intent::ProjectHelp => "project_help",
            Intent::CandidateSearch => "candidate_search",
            Intent::MatchExplanation => "match_explanation",
            Intent::JobPostingHelp => "job_posting_help",
            Intent::MarketIntelligence => "market_intelligence",
            Intent::PartnershipInfo => "partnership_info",
            Intent::StudentAnalytics => "student_analytics",
            Intent::AtRiskStudents => "at_risk_students",
            Intent::CompanyTrends => "company_trends",
            Intent::Greeting => "greeting",
            Intent::Help => "help",
            Intent::Clarification => "clarification",
            Intent::Unknown => "unknown",
        }
    }

    /// One-line gloss used in the classifier prompt.
    pub fn description(&self) -> &'static str {
        match self {
            Intent::JobSearch => "Looking for jobs, internships, or opportunities",
            Intent::ProfileBuild => "Building or improving their profile",
            Intent::SkillAnalysis => "Understanding skill gaps or market demand",
            Intent::CareerAdvice => "General career guidance",
            Intent::EducationInfo => "Questions about ITS, Master's, courses",
            Intent::ProjectHelp => "Help with showcasing projects",
            Intent::CandidateSearch => "Looking for candidates with specific criteria",
            Intent::MatchExplanation => "Understanding why candidates match",
            Intent::JobPostingHelp => "Creating or improving job postings",
            Intent::MarketIntelligence => "Skill trends, salary insights",
            Intent::PartnershipInfo => "How partnerships work",
            Intent::StudentAnalytics => "Understanding student placement data",
            Intent::AtRiskStudents => "Identifying students needing help",
            Intent::CompanyTrends => "What companies are searching for",
            Intent::Greeting => "Hello, hi, etc.",
            Intent::Help => "General help requests",
            Intent::Clarification => "Asking for more info about previous response",
            Intent::Unknown => "Cannot determine intent",
        }
    }

    /// Intents a role is expected to express, excluding the general ones.
    pub fn focus_for(role: Role) -> &'static [Intent] {
        match role {
            Role::Student => &[
                Intent::JobSearch,
                Intent::ProfileBuild,
                Intent::SkillAnalysis,
                Intent::CareerAdvice,
                Intent::EducationInfo,
                Intent::ProjectHelp,
            ],
            Role::Recruiter => &[
                Intent::CandidateSearch,
                Intent::MatchExplanation,
                Intent::JobPostingHelp,
                Intent::MarketIntelligence,
            ],
            Role::Institution => &[
                Intent::PartnershipInfo,
                Intent::StudentAnalytics,
                Intent::AtRiskStudents,
                Intent::CompanyTrends,
            ],
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Intent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Intent::parse(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IntentResult {
    pub primary_intent: Intent,
    pub confidence: f32,
    #[serde(default)]
    pub secondary_intents: Vec<Intent>,
    #[serde(default)]
    pub entities: Entities,
}

impl IntentResult {
    pub fn new(primary_intent: Intent, confidence: f32, entities: Entities) -> Self {
        Self {
            primary_intent,
            confidence: confidence.clamp(0.0, 1.0),
            secondary_intents: Vec::new(),
            entities,
        }
    }

    /// Neutral result: `unknown`, zero confidence, no entities.
    pub fn unclassified() -> Self {
        Self::new(Intent::Unknown, 0.0, Entities::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip_through_parse() {
        for intent in Intent::ALL {
            assert_eq!(Intent::parse(intent.as_str()), intent);
        }
    }

    #[test]
    fn test_unknown_labels_map_to_unknown() {
        assert_eq!(Intent::parse("book_flight"), Intent::Unknown);
        assert_eq!(Intent::parse(""), Intent::Unknown);
        assert_eq!(Intent::parse("Job Search"), Intent::JobSearch);
        let parsed: Intent = serde_json::from_str("\"teleport\"").unwrap();
        assert_eq!(parsed, Intent::Unknown);
    }

    #[test]
    fn test_focus_sets_are_disjoint() {
        let student = Intent::focus_for(Role::Student);
        let recruiter = Intent::focus_for(Role::Recruiter);
        let institution = Intent::focus_for(Role::Institution);
        assert!(student.iter().all(|i| !recruiter.contains(i) && !institution.contains(i)));
        assert!(recruiter.iter().all(|i| !institution.contains(i)));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(IntentResult::new(Intent::Help, 1.7, Entities::default()).confidence, 1.0);
        assert_eq!(IntentResult::unclassified().confidence, 0.0);
    }
}
