//! Fixed reply texts: greetings, the no-LLM templates, and the generation prompts.

use anyhow::Result;

use crate::actions::{suggestions, SuggestedAction};
use crate::entities::Entities;
use crate::intent::{Intent, IntentResult};
use crate::session::Role;

pub const APOLOGY: &str =
    "I apologize, but I encountered an issue processing your request. Could you please rephrase your question?";

const DEFAULT_REPLY: &str = "I'd love to help with that! Could you tell me more about what you're looking for? \
     I can assist with job searching, profile building, career advice, and more.";

/// First assistant message of every new session.
pub fn greeting(role: Role) -> &'static str {
    match role {
        Role::Student => {
            "👋 Hi! I'm Transparenty, your AI career assistant. I can help you:\n\n\
             • Build your profile from projects\n\
             • Find jobs matching your skills\n\
             • Get career advice and skill insights\n\
             • Understand what companies are looking for\n\n\
             What would you like to do?"
        }
        Role::Recruiter => {
            "👋 Hi! I'm Transparenty, your AI recruiting assistant. I can help you:\n\n\
             • Find verified candidates across all disciplines\n\
             • Understand match explanations\n\
             • Get sourcing tips and market insights\n\
             • See skill demand trends\n\n\
             How can I assist your search?"
        }
        Role::Institution => {
            "👋 Hi! I'm Transparenty, your institutional assistant. I can help you:\n\n\
             • Set up free partnership\n\
             • Understand dashboard analytics\n\
             • Get early intervention alerts\n\
             • Explore European job opportunities\n\n\
             What would you like to know?"
        }
    }
}

fn skills_list(entities: &Entities) -> Option<String> {
    (!entities.skills.is_empty()).then(|| entities.skills.iter().cloned().collect::<Vec<_>>().join(", "))
}

/// Deterministic reply used when no LLM tier produced one. Never empty.
pub fn fallback_reply(intent: Intent, role: Role, entities: &Entities) -> String {
    match intent {
        Intent::JobSearch => {
            let mut scope = String::new();
            if let Some(location) = &entities.location {
                scope.push_str(&format!(" in {}", location));
            }
            if let Some(skills) = skills_list(entities) {
                scope.push_str(&format!(" matching skills like {}", skills));
            }
            format!(
                "I can help you find jobs! Based on your profile, I'll search for opportunities{}.\n\n\
                 To get the best results:\n\
                 • Make sure your profile is complete\n\
                 • Add your key projects\n\
                 • Specify your preferences (location, job type)\n\n\
                 Would you like me to show you top matches?",
                scope
            )
        }
        Intent::ProfileBuild => "Let's build your profile! Here's what makes a strong profile:\n\n\
             1. **Projects** - Add your best work (thesis, code, designs)\n\
             2. **Skills** - I'll verify them from your projects\n\
             3. **Education** - Courses and grades that matter\n\
             4. **Bio** - A compelling 2-3 sentence summary\n\n\
             Which area would you like to start with?"
            .to_string(),
        Intent::CandidateSearch => {
            let mut scope = String::new();
            if let Some(location) = &entities.location {
                scope.push_str(&format!(" in {}", location));
            }
            if let Some(skills) = skills_list(entities) {
                scope.push_str(&format!(" with {}", skills));
            }
            format!(
                "I'll help you find candidates{}.\n\n\
                 Our AI-powered search provides:\n\
                 • Verified skill profiles (not self-reported)\n\
                 • Transparent match scores with explanations\n\
                 • Project-based evidence of capabilities\n\n\
                 Tell me more about your ideal candidate!",
                scope
            )
        }
        Intent::Greeting => greeting(role).to_string(),
        Intent::Help => {
            let capabilities = match role {
                Role::Student => {
                    "• Finding jobs matching your skills\n• Building your profile\n• Career advice\n• Skill gap analysis"
                }
                Role::Recruiter => {
                    "• Finding verified candidates\n• Understanding match scores\n• Market intelligence\n• Job posting tips"
                }
                Role::Institution => {
                    "• Setting up partnership\n• Student analytics\n• At-risk student identification\n• Company trends"
                }
            };
            let article = if role == Role::Institution { "an" } else { "a" };
            format!(
                "I'm here to help! As {} {}, I can assist you with:\n\n{}\n\nWhat would you like to explore?",
                article, role, capabilities
            )
        }
        _ => DEFAULT_REPLY.to_string(),
    }
}

/// Follow-ups attached to every reply that did not come from a handler.
pub fn suggested_actions(intent: Intent) -> Vec<SuggestedAction> {
    match intent {
        Intent::JobSearch => suggestions(&[
            ("View Job Matches", "view_jobs"),
            ("Update Preferences", "edit_preferences"),
            ("See Skill Trends", "skill_trends"),
        ]),
        Intent::ProfileBuild => suggestions(&[
            ("Add Project", "add_project"),
            ("Edit Profile", "edit_profile"),
            ("View Tips", "profile_tips"),
        ]),
        Intent::CandidateSearch => suggestions(&[
            ("Advanced Search", "advanced_search"),
            ("Save Search", "save_search"),
            ("View Saved Candidates", "view_saved"),
        ]),
        Intent::SkillAnalysis => suggestions(&[
            ("View Skill Report", "skill_report"),
            ("Market Trends", "market_trends"),
            ("Recommended Courses", "courses"),
        ]),
        _ => Vec::new(),
    }
}

pub fn response_system_prompt(role: Role, intent: &IntentResult) -> Result<String> {
    let entities = serde_json::to_string(&intent.entities.without_carried_state())?;

    Ok(format!(
        "You are Transparenty, the AI assistant for InTransparency platform.\n\
         You're helping a {}.\n\n\
         Guidelines:\n\
         - Be helpful, concise, and professional\n\
         - Use emojis sparingly for visual structure\n\
         - Format responses with bullet points and bold for key info\n\
         - Always be transparent about how data is used\n\
         - Suggest actionable next steps\n\
         - If you don't have specific data, explain what you CAN help with\n\
         - Keep responses under 300 words unless detailed analysis is needed\n\n\
         The user's intent is: {}\n\
         Extracted entities: {}\n\n\
         Respond naturally and helpfully to their message.",
        role, intent.primary_intent, entities
    ))
}

/// `history` is the already rendered transcript; blank means this is the opening turn.
pub fn response_user_content(history: &str, message: &str) -> String {
    if history.trim().is_empty() {
        message.to_string()
    } else {
        format!("Conversation so far:\n{}\n\nUser's new message: {}", history, message)
    }
}
