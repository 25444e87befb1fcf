//! LLM-Based Intent Classifier
//!
//! Asks the configured LLM tiers for a JSON classification and falls back to keyword rules
//! when every tier fails. Classification never returns an error.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};

use super::rules::rule_based_intent;
use super::{Intent, IntentResult};
use crate::entities::{self, Entities};
use crate::llm::{CompletionRequest, LlmManager};
use crate::session::{ConversationSession, Role};

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

pub(crate) fn build_system_prompt(role: Role) -> String {
    let vocabulary = Intent::ALL.iter().map(|i| i.as_str()).collect::<Vec<_>>().join(", ");

    let mut prompt = format!(
        "You are an intent classifier for InTransparency, a platform connecting students with jobs.\n\
         The user is a {role}.\n\n\
         Analyze the message and return a JSON object with:\n\
         - primary_intent: The main intent (one of: {vocabulary})\n\
         - confidence: A score from 0.0 to 1.0\n\
         - secondary_intents: List of other possible intents\n\
         - entities: Extracted entities like skills, location, universities, experience_level, languages\n\n\
         For {role}, focus on these intents:\n"
    );

    for intent in Intent::focus_for(role).iter().chain(Intent::GENERAL.iter()) {
        prompt.push_str(&format!("- {}: {}\n", intent.as_str(), intent.description()));
    }

    prompt.push_str("\nReturn ONLY valid JSON, no explanation.");
    prompt
}

pub(crate) fn build_user_content(message: &str, session: Option<&ConversationSession>, window: usize) -> String {
    let history = session
        .map(|s| s.history_lines(window, false))
        .unwrap_or_default();

    if history.is_empty() {
        message.to_string()
    } else {
        format!("Previous conversation:\n{}\n\nNew message: {}", history, message)
    }
}

// ---------------------------------------------------------------------------
// Response Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawClassification {
    primary_intent: String,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
    #[serde(default)]
    secondary_intents: Vec<serde_json::Value>,
    #[serde(default)]
    entities: serde_json::Value,
}

const DEFAULT_LLM_CONFIDENCE: f32 = 0.5;

fn confidence_from(value: Option<&serde_json::Value>) -> f32 {
    let parsed = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|c| c.is_finite())
        .map(|c| c as f32)
        .unwrap_or(DEFAULT_LLM_CONFIDENCE)
        .clamp(0.0, 1.0)
}

/// Parse the LLM's JSON into an IntentResult.
/// Handles common LLM quirks: markdown fences, trailing text, partial JSON.
pub(crate) fn parse_intent_response(raw: &str) -> Result<IntentResult> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json_str = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => &cleaned[start..=end],
        _ => cleaned,
    };

    // Strict parse first
    if let Ok(parsed) = serde_json::from_str::<RawClassification>(json_str) {
        let mut result = IntentResult::new(
            Intent::parse(&parsed.primary_intent),
            confidence_from(parsed.confidence.as_ref()),
            Entities::from_llm_value(&parsed.entities),
        );
        result.secondary_intents = parsed
            .secondary_intents
            .iter()
            .filter_map(|v| v.as_str())
            .map(Intent::parse)
            .filter(|i| *i != Intent::Unknown && *i != result.primary_intent)
            .collect();
        return Ok(result);
    }

    // Lenient parse: pull out what we can
    let primary = extract_json_string(json_str, "primary_intent")
        .ok_or_else(|| anyhow!("Classifier reply has no primary_intent"))?;
    let confidence = extract_json_number(json_str, "confidence");

    Ok(IntentResult::new(
        Intent::parse(&primary),
        confidence_from(confidence.map(serde_json::Value::from).as_ref()),
        Entities::default(),
    ))
}

/// Extract a JSON string field value by scanning for `"field":"value"`.
fn extract_json_string(json: &str, field: &str) -> Option<String> {
    let pattern = format!("\"{}\"", field);
    let pos = json.find(&pattern)?;
    let after_colon = json[pos + pattern.len()..].trim_start().strip_prefix(':')?;
    let content = after_colon.trim_start().strip_prefix('"')?;

    let mut escaped = false;
    for (i, ch) in content.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' if i > 0 => return Some(content[..i].to_string()),
            '"' => return None,
            _ => {}
        }
    }
    None
}

/// Extract a bare numeric field by scanning for `"field": 0.8`.
fn extract_json_number(json: &str, field: &str) -> Option<f64> {
    let pattern = format!("\"{}\"", field);
    let pos = json.find(&pattern)?;
    let after_colon = json[pos + pattern.len()..].trim_start().strip_prefix(':')?.trim_start();
    let end = after_colon
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(after_colon.len());
    after_colon[..end].parse().ok()
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct IntentClassifier {
    llm: LlmManager,
    history_window: usize,
    deadline: Duration,
}

impl IntentClassifier {
    pub fn new(llm: LlmManager, history_window: usize, deadline: Duration) -> Self {
        Self {
            llm,
            history_window,
            deadline,
        }
    }

    /// Classify `message`. Tier order: primary LLM, secondary LLM, keyword rules.
    ///
    /// The deadline bounds the LLM tiers together; once it passes the keyword rules answer, so
    /// a result is always produced.
    pub async fn detect_intent(
        &self,
        message: &str,
        role: Role,
        session: Option<&ConversationSession>,
    ) -> IntentResult {
        if self.llm.is_configured() {
            match tokio::time::timeout(self.deadline, self.classify_with_llm(message, role, session)).await {
                Ok(Ok(result)) => return result,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "LLM intent detection failed, falling back to rule-based detection");
                }
                Err(_) => {
                    tracing::warn!(
                        deadline = ?self.deadline,
                        "LLM intent detection overran its deadline, falling back to rule-based detection"
                    );
                }
            }
        }

        let result = rule_based_intent(message, role);
        tracing::debug!(intent = %result.primary_intent, confidence = result.confidence, "Rule-based intent decision");
        result
    }

    async fn classify_with_llm(
        &self,
        message: &str,
        role: Role,
        session: Option<&ConversationSession>,
    ) -> Result<IntentResult> {
        let request = CompletionRequest::classification(
            build_system_prompt(role),
            build_user_content(message, session, self.history_window),
            self.llm.intent_timeout(),
        );

        let start = Instant::now();
        let (tier, mut result) = self.llm.complete_first(&request, parse_intent_response).await?;

        // LLM entities are layered over what the dictionaries find.
        let mut merged = entities::extract(message);
        merged.merge(&result.entities);
        result.entities = merged;

        tracing::info!(
            tier = %tier,
            intent = %result.primary_intent,
            confidence = result.confidence,
            secondary = ?result.secondary_intents,
            latency_ms = start.elapsed().as_millis() as u64,
            "LLM intent decision"
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
