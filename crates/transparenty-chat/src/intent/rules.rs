//! Keyword-rule intent detection, the last classification tier.

use super::{Intent, IntentResult};
use crate::entities::{self, contains_term};
use crate::session::Role;

const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "ciao", "buongiorno", "salve"];
const HELP_WORDS: &[&str] = &["help", "aiuto"];

// Role keyword sets are stems ("candidat", "competenz") and match as plain substrings.
const STUDENT_RULES: &[(Intent, &[&str])] = &[
    (Intent::JobSearch, &["job", "lavoro", "work", "internship", "stage"]),
    (Intent::ProfileBuild, &["profile", "profilo", "build"]),
    (Intent::SkillAnalysis, &["skill", "competenz", "trend"]),
];

const RECRUITER_RULES: &[(Intent, &[&str])] = &[
    (Intent::CandidateSearch, &["find", "cerca", "search", "candidat"]),
    (Intent::MatchExplanation, &["match", "explain", "score"]),
];

const INSTITUTION_RULES: &[(Intent, &[&str])] = &[
    (Intent::PartnershipInfo, &["partnership", "free", "setup"]),
    (Intent::AtRiskStudents, &["at-risk", "intervention", "rischio"]),
];

const GREETING_CONFIDENCE: f32 = 0.9;
const MATCH_CONFIDENCE: f32 = 0.8;
const NO_MATCH_CONFIDENCE: f32 = 0.3;

fn role_rules(role: Role) -> &'static [(Intent, &'static [&'static str])] {
    match role {
        Role::Student => STUDENT_RULES,
        Role::Recruiter => RECRUITER_RULES,
        Role::Institution => INSTITUTION_RULES,
    }
}

/// Deterministic classification: greeting, then help, then the role's keyword sets, else unknown.
pub fn rule_based_intent(message: &str, role: Role) -> IntentResult {
    let lower = message.to_lowercase();
    let entities = entities::extract(message);

    if GREETING_WORDS.iter().any(|w| contains_term(&lower, w)) {
        return IntentResult::new(Intent::Greeting, GREETING_CONFIDENCE, entities);
    }

    if HELP_WORDS.iter().any(|w| contains_term(&lower, w)) {
        return IntentResult::new(Intent::Help, MATCH_CONFIDENCE, entities);
    }

    for (intent, words) in role_rules(role) {
        if words.iter().any(|w| lower.contains(w)) {
            return IntentResult::new(*intent, MATCH_CONFIDENCE, entities);
        }
    }

    IntentResult::new(Intent::Unknown, NO_MATCH_CONFIDENCE, entities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting() {
        let r = rule_based_intent("hi", Role::Student);
        assert_eq!(r.primary_intent, Intent::Greeting);
        assert_eq!(r.confidence, 0.9);
    }

    #[test]
    fn test_greeting_needs_whole_word() {
        // "machine" and "this" contain "hi" but are not greetings.
        let r = rule_based_intent("machine learning jobs like this", Role::Student);
        assert_eq!(r.primary_intent, Intent::JobSearch);
        assert!(r.entities.skills.contains("machine learning"));
    }

    #[test]
    fn test_help_precedes_role_rules() {
        let r = rule_based_intent("aiuto con il lavoro", Role::Student);
        assert_eq!(r.primary_intent, Intent::Help);
        assert_eq!(r.confidence, 0.8);
    }

    #[test]
    fn test_student_rule_order() {
        assert_eq!(rule_based_intent("cerco lavoro a Roma", Role::Student).primary_intent, Intent::JobSearch);
        assert_eq!(rule_based_intent("improve my profilo", Role::Student).primary_intent, Intent::ProfileBuild);
        assert_eq!(rule_based_intent("quali competenze servono", Role::Student).primary_intent, Intent::SkillAnalysis);
    }

    #[test]
    fn test_recruiter_rules() {
        let r = rule_based_intent("find me candidates with python skills in Milan", Role::Recruiter);
        assert_eq!(r.primary_intent, Intent::CandidateSearch);
        assert_eq!(r.confidence, 0.8);
        assert_eq!(r.entities.location.as_deref(), Some("Milan"));
        assert!(r.entities.skills.contains("python"));

        let r = rule_based_intent("why is the score 87?", Role::Recruiter);
        assert_eq!(r.primary_intent, Intent::MatchExplanation);
    }

    #[test]
    fn test_institution_rules() {
        assert_eq!(
            rule_based_intent("how does the free setup work", Role::Institution).primary_intent,
            Intent::PartnershipInfo
        );
        assert_eq!(
            rule_based_intent("show at-risk students", Role::Institution).primary_intent,
            Intent::AtRiskStudents
        );
    }

    #[test]
    fn test_role_keywords_do_not_leak_across_roles() {
        let r = rule_based_intent("find candidates", Role::Student);
        assert_eq!(r.primary_intent, Intent::Unknown);
        assert_eq!(r.confidence, 0.3);
    }

    #[test]
    fn test_deterministic() {
        let a = rule_based_intent("internship in Torino with react", Role::Student);
        let b = rule_based_intent("internship in Torino with react", Role::Student);
        assert_eq!(a, b);
        assert_eq!(a.entities.location.as_deref(), Some("Turin"));
    }
}
