//! Conversation sessions: the per-conversation aggregate and its key-value persistence.

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::Entities;
use crate::intent::{Intent, IntentResult};

pub use store::{InMemoryBackend, KvBackend, RedisBackend, SessionStore};

// ============================================================================
// Roles
// ============================================================================

/// Canonical caller role. `company` and `university` are accepted aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    #[serde(alias = "company")]
    Recruiter,
    #[serde(alias = "university")]
    Institution,
}

impl Role {
    /// Map a caller-supplied role label onto a canonical role. Unknown labels become `Student`.
    pub fn normalize(label: &str) -> Role {
        match label.trim().to_lowercase().as_str() {
            "student" => Role::Student,
            "recruiter" | "company" => Role::Recruiter,
            "institution" | "university" => Role::Institution,
            other => {
                tracing::debug!(role = %other, "Unrecognized role label, defaulting to student");
                Role::Student
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Recruiter => "recruiter",
            Role::Institution => "institution",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub intent: Intent,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl SessionMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn assistant(content: impl Into<String>, metadata: Option<MessageMetadata>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

// ============================================================================
// Session aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
    #[serde(default)]
    pub detected_intents: Vec<Intent>,
    #[serde(default)]
    pub extracted_entities: Entities,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ConversationSession {
    /// Fresh session whose first message is the assistant's `greeting`.
    pub fn start(
        session_id: impl Into<String>,
        role: Role,
        user_id: Option<String>,
        greeting: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id,
            role,
            messages: vec![SessionMessage::assistant(greeting, None)],
            detected_intents: Vec::new(),
            extracted_entities: Entities::default(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(SessionMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, intent: &IntentResult) {
        self.messages.push(SessionMessage::assistant(
            content,
            Some(MessageMetadata {
                intent: intent.primary_intent,
                confidence: intent.confidence,
            }),
        ));
    }

    /// Fold one classified turn into the audit trail and the slot-filling memory.
    pub fn record_intent(&mut self, intent: &IntentResult) {
        self.detected_intents.push(intent.primary_intent);
        self.extracted_entities.merge(&intent.entities);
    }

    /// The trailing `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[SessionMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Render the trailing window as `role: content` lines.
    pub fn history_lines(&self, n: usize, uppercase_roles: bool) -> String {
        self.recent(n)
            .iter()
            .map(|m| {
                let role = match (m.role, uppercase_roles) {
                    (MessageRole::User, false) => "user",
                    (MessageRole::User, true) => "USER",
                    (MessageRole::Assistant, false) => "assistant",
                    (MessageRole::Assistant, true) => "ASSISTANT",
                };
                format!("{}: {}", role, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities;

    #[test]
    fn test_role_aliases_normalize() {
        assert_eq!(Role::normalize("company"), Role::Recruiter);
        assert_eq!(Role::normalize("University"), Role::Institution);
        assert_eq!(Role::normalize("alien"), Role::Student);
        let role: Role = serde_json::from_str("\"company\"").unwrap();
        assert_eq!(role, Role::Recruiter);
        assert_eq!(serde_json::to_string(&Role::Institution).unwrap(), "\"institution\"");
    }

    #[test]
    fn test_start_inserts_greeting() {
        let session = ConversationSession::start("s1", Role::Student, None, "hello there");
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, MessageRole::Assistant);
        assert_eq!(session.messages[0].content, "hello there");
    }

    #[test]
    fn test_recent_window_and_history_format() {
        let mut session = ConversationSession::start("s1", Role::Recruiter, None, "g");
        for i in 0..5 {
            session.push_user(format!("u{}", i));
        }
        assert_eq!(session.recent(2).len(), 2);
        assert_eq!(session.recent(100).len(), 6);
        assert_eq!(session.history_lines(2, false), "user: u3\nuser: u4");
        assert!(session.history_lines(1, true).starts_with("USER: "));
    }

    #[test]
    fn test_record_intent_merges_entities() {
        let mut session = ConversationSession::start("s1", Role::Student, None, "g");
        session.record_intent(&IntentResult::new(Intent::JobSearch, 0.8, entities::extract("python in Rome")));
        session.record_intent(&IntentResult::new(Intent::JobSearch, 0.8, entities::extract("Milan instead")));
        assert_eq!(session.detected_intents, vec![Intent::JobSearch, Intent::JobSearch]);
        assert_eq!(session.extracted_entities.location.as_deref(), Some("Milan"));
        assert!(session.extracted_entities.skills.contains("python"));
    }

    #[test]
    fn test_json_round_trip() {
        let mut session = ConversationSession::start("s1", Role::Institution, Some("u7".into()), "g");
        session.push_user("at-risk students?");
        let intent = IntentResult::new(Intent::AtRiskStudents, 0.8, entities::extract("Bologna"));
        session.record_intent(&intent);
        session.push_assistant("Here they are", &intent);

        let json = serde_json::to_string(&session).unwrap();
        let back: ConversationSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
