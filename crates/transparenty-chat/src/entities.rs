//! Deterministic entity extraction
//!
//! Keyword dictionaries (Italian and English surface forms) mapped onto a closed, typed entity
//! record. Used by the rule-based intent tier, to normalize entities coming back from an LLM,
//! and directly by action handlers that parse the raw message.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static GPA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:gpa|voto|grade|media)\b[^0-9]{0,12}(\d{1,3}(?:[.,]\d{1,2})?)")
        .expect("gpa regex is valid")
});

// ============================================================================
// Dictionaries
// ============================================================================

/// Surface form -> canonical location. Order matters: the first match is the message's location.
const LOCATIONS: &[(&str, &str)] = &[
    ("milano", "Milan"),
    ("milan", "Milan"),
    ("roma", "Rome"),
    ("rome", "Rome"),
    ("torino", "Turin"),
    ("turin", "Turin"),
    ("bologna", "Bologna"),
    ("firenze", "Florence"),
    ("florence", "Florence"),
    ("napoli", "Naples"),
    ("naples", "Naples"),
    ("venezia", "Venice"),
    ("venice", "Venice"),
    ("genova", "Genoa"),
    ("genoa", "Genoa"),
    ("palermo", "Palermo"),
    ("bari", "Bari"),
    ("catania", "Catania"),
    ("verona", "Verona"),
    ("padova", "Padua"),
    ("padua", "Padua"),
    ("trieste", "Trieste"),
    ("brescia", "Brescia"),
    ("parma", "Parma"),
    ("modena", "Modena"),
    ("reggio emilia", "Reggio Emilia"),
    ("pisa", "Pisa"),
    ("lombardia", "Lombardy"),
    ("lombardy", "Lombardy"),
    ("lazio", "Lazio"),
    ("piemonte", "Piedmont"),
    ("piedmont", "Piedmont"),
    ("emilia romagna", "Emilia-Romagna"),
    ("emilia-romagna", "Emilia-Romagna"),
    ("veneto", "Veneto"),
    ("toscana", "Tuscany"),
    ("tuscany", "Tuscany"),
    ("campania", "Campania"),
    ("sicilia", "Sicily"),
    ("sicily", "Sicily"),
];

/// Canonical skill -> surface forms.
const SKILLS: &[(&str, &[&str])] = &[
    ("python", &["python", "py", "django", "flask", "fastapi"]),
    ("javascript", &["javascript", "js", "node", "nodejs", "node.js"]),
    ("typescript", &["typescript", "ts"]),
    ("java", &["java", "spring", "spring boot", "springboot"]),
    ("react", &["react", "reactjs", "react.js", "next.js", "nextjs"]),
    ("angular", &["angular", "angularjs"]),
    ("vue", &["vue", "vuejs", "vue.js", "nuxt"]),
    ("sql", &["sql", "mysql", "postgresql", "postgres", "oracle", "database"]),
    ("aws", &["aws", "amazon web services", "ec2", "s3", "lambda"]),
    ("docker", &["docker", "container", "kubernetes", "k8s"]),
    (
        "machine learning",
        &["machine learning", "ml", "ai", "artificial intelligence", "deep learning"],
    ),
    ("data science", &["data science", "data scientist", "analytics", "data analysis"]),
    (
        "cybersecurity",
        &["cybersecurity", "security", "infosec", "penetration testing", "ethical hacking"],
    ),
    ("devops", &["devops", "ci/cd", "jenkins", "github actions"]),
    (
        "mobile",
        &["mobile", "ios", "android", "swift", "kotlin", "flutter", "react native"],
    ),
    ("cloud", &["cloud", "azure", "gcp", "google cloud"]),
    ("marketing", &["marketing", "digital marketing", "seo", "sem", "social media"]),
    ("design", &["design", "ux", "ui", "figma", "sketch", "adobe"]),
    ("autocad", &["autocad", "cad"]),
    (
        "project management",
        &["project management", "pm", "agile", "scrum", "jira"],
    ),
    ("sales", &["sales", "business development", "account management"]),
    ("finance", &["finance", "accounting", "financial analysis", "excel"]),
];

const UNIVERSITIES: &[(&str, &str)] = &[
    ("politecnico milano", "Politecnico di Milano"),
    ("politecnico di milano", "Politecnico di Milano"),
    ("polimi", "Politecnico di Milano"),
    ("politecnico torino", "Politecnico di Torino"),
    ("politecnico di torino", "Politecnico di Torino"),
    ("polito", "Politecnico di Torino"),
    ("bocconi", "Università Bocconi"),
    ("sapienza", "Sapienza Università di Roma"),
    ("unibo", "Università di Bologna"),
    ("statale milano", "Università degli Studi di Milano"),
    ("unimi", "Università degli Studi di Milano"),
    ("bicocca", "Università di Milano-Bicocca"),
    ("cattolica", "Università Cattolica"),
    ("luiss", "LUISS"),
    ("its academy", "ITS"),
    ("istituto tecnico superiore", "ITS"),
    ("istituti tecnici superiori", "ITS"),
];

/// Upper-case acronym for the technical institutes. Matched on the original casing so the
/// English possessive "its" never counts.
const ITS_ACRONYM: &str = "ITS";

const EXPERIENCE: &[(ExperienceLevel, &[&str])] = &[
    (
        ExperienceLevel::Junior,
        &["junior", "entry level", "entry-level", "neo laureato", "neolaureato", "fresh graduate"],
    ),
    (
        ExperienceLevel::Mid,
        &["mid", "mid-level", "middle", "2-3 years", "2-4 years", "3-5 years", "some experience"],
    ),
    (
        ExperienceLevel::Senior,
        &["senior", "lead", "5+ years", "experienced", "expert"],
    ),
    (
        ExperienceLevel::Intern,
        &["intern", "internship", "stage", "tirocinio", "stagista"],
    ),
];

const LANGUAGES: &[(&str, &[&str])] = &[
    ("english", &["english", "inglese"]),
    ("italian", &["italian", "italiano"]),
    ("german", &["german", "tedesco"]),
    ("french", &["french", "francese"]),
    ("spanish", &["spanish", "spagnolo"]),
];

const DISCIPLINES: &[(&str, &[&str])] = &[
    ("tech", &["tech", "software", "developer", "engineer", "programmer", "informatica"]),
    ("business", &["business", "commerce", "economia", "management"]),
    ("design", &["design", "creative", "graphic", "visual"]),
    ("marketing", &["marketing", "communication", "comunicazione"]),
    ("data", &["data", "analytics", "scientist"]),
    ("healthcare", &["healthcare", "medical", "medicina", "sanità"]),
];

const IMMEDIATE_WORDS: &[&str] = &["immediate", "immediately", "immediata", "subito", "now", "asap"];
const MONTH_WORDS: &[&str] = &["month", "months", "mese", "mesi", "weeks", "settimane"];
const REMOTE_WORDS: &[&str] = &["remote", "remoto", "hybrid", "ibrido"];
const ONSITE_WORDS: &[&str] = &["on-site", "onsite", "in sede", "office"];

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Intern,
    Junior,
    Mid,
    Senior,
}

impl ExperienceLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        EXPERIENCE
            .iter()
            .find(|(level, forms)| {
                level.as_str() == lower || forms.iter().any(|f| contains_term(&lower, f))
            })
            .map(|(level, _)| *level)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Intern => "intern",
            ExperienceLevel::Junior => "junior",
            ExperienceLevel::Mid => "mid",
            ExperienceLevel::Senior => "senior",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Immediate,
    OneMonth,
}

impl Availability {
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        if lower == "one_month" || lower == "1_month" || MONTH_WORDS.iter().any(|w| contains_term(&lower, w)) {
            Some(Availability::OneMonth)
        } else if IMMEDIATE_WORDS.iter().any(|w| contains_term(&lower, w)) {
            Some(Availability::Immediate)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Immediate => "immediate",
            Availability::OneMonth => "1_month",
        }
    }
}

/// Structured recruiter query parsed from free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub skills: BTreeSet<String>,
    pub locations: Vec<String>,
    pub universities: BTreeSet<String>,
    pub experience_level: Option<ExperienceLevel>,
    pub languages: BTreeSet<String>,
    pub availability: Option<Availability>,
    pub disciplines: BTreeSet<String>,
    pub min_gpa: Option<f32>,
    pub remote_preference: Option<bool>,
    pub raw_query: String,
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
            && self.locations.is_empty()
            && self.universities.is_empty()
            && self.experience_level.is_none()
            && self.languages.is_empty()
            && self.disciplines.is_empty()
            && self.min_gpa.is_none()
    }

    /// Query-string parameters for `GET /api/students`. The endpoint filters on a single
    /// location, university and discipline, so only the first of each is sent.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(",");

        let mut params = Vec::new();
        if !self.skills.is_empty() {
            params.push(("skills", join(&self.skills)));
        }
        if let Some(location) = self.locations.first() {
            params.push(("location", location.clone()));
        }
        if let Some(university) = self.universities.iter().next() {
            params.push(("university", university.clone()));
        }
        if let Some(level) = self.experience_level {
            params.push(("experience_level", level.as_str().to_string()));
        }
        if !self.languages.is_empty() {
            params.push(("languages", join(&self.languages)));
        }
        if let Some(discipline) = self.disciplines.iter().next() {
            params.push(("discipline", discipline.clone()));
        }
        if let Some(remote) = self.remote_preference {
            params.push(("remote", remote.to_string()));
        }
        if let Some(availability) = self.availability {
            params.push(("availability", availability.as_str().to_string()));
        }
        params
    }

    /// Short human-readable summary, e.g. "python, react · Milan · junior".
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.skills.is_empty() {
            parts.push(self.skills.iter().cloned().collect::<Vec<_>>().join(", "));
        }
        if !self.locations.is_empty() {
            parts.push(self.locations.join(", "));
        }
        if let Some(level) = self.experience_level {
            parts.push(level.as_str().to_string());
        }
        if !self.universities.is_empty() {
            parts.push(self.universities.iter().cloned().collect::<Vec<_>>().join(", "));
        }
        if parts.is_empty() {
            "all candidates".to_string()
        } else {
            parts.join(" · ")
        }
    }
}

/// A candidate surfaced by a previous search, kept so follow-up turns can refer to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateHit {
    pub id: String,
    pub name: String,
    pub match_score: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentSearch {
    pub query: SearchQuery,
    pub candidates: Vec<CandidateHit>,
}

/// Typed slot-filling record accumulated across a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub skills: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub languages: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub disciplines: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub universities: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_search: Option<RecentSearch>,
    /// Keys an LLM produced that have no typed slot.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unrecognized: BTreeMap<String, Value>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        *self == Entities::default()
    }

    /// Key-wise merge; present values in `other` overwrite, absent or empty ones never do.
    pub fn merge(&mut self, other: &Entities) {
        fn take<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>) {
            if incoming.is_some() {
                slot.clone_from(incoming);
            }
        }
        fn take_set(slot: &mut BTreeSet<String>, incoming: &BTreeSet<String>) {
            if !incoming.is_empty() {
                slot.clone_from(incoming);
            }
        }

        take(&mut self.location, &other.location);
        take_set(&mut self.skills, &other.skills);
        take(&mut self.experience_level, &other.experience_level);
        take_set(&mut self.languages, &other.languages);
        take_set(&mut self.disciplines, &other.disciplines);
        take_set(&mut self.universities, &other.universities);
        take(&mut self.availability, &other.availability);
        take(&mut self.remote, &other.remote);
        take(&mut self.institution_id, &other.institution_id);
        take(&mut self.last_search, &other.last_search);
        for (k, v) in &other.unrecognized {
            self.unrecognized.insert(k.clone(), v.clone());
        }
    }

    /// Same record without carried conversation state, for prompts and responses.
    pub fn without_carried_state(&self) -> Entities {
        Entities {
            last_search: None,
            ..self.clone()
        }
    }

    /// Normalize an LLM-produced `entities` object onto the typed slots.
    pub fn from_llm_value(value: &Value) -> Entities {
        let mut entities = Entities::default();
        let Some(object) = value.as_object() else {
            return entities;
        };

        for (key, raw) in object {
            if raw.is_null() {
                continue;
            }
            let strings = string_list(raw);
            let handled = match key.to_lowercase().as_str() {
                "location" | "locations" | "city" => {
                    entities.location = strings.first().map(|s| canonical_location(s));
                    entities.location.is_some()
                }
                "skills" | "skill" => {
                    entities.skills = strings.iter().map(|s| canonical_skill(s)).collect();
                    !entities.skills.is_empty()
                }
                "experience_level" | "experience" | "seniority" => {
                    entities.experience_level = strings.first().and_then(|s| ExperienceLevel::parse(s));
                    entities.experience_level.is_some()
                }
                "languages" | "language" => {
                    entities.languages = strings.iter().map(|s| s.to_lowercase()).collect();
                    !entities.languages.is_empty()
                }
                "disciplines" | "discipline" | "field" => {
                    entities.disciplines = strings.iter().map(|s| s.to_lowercase()).collect();
                    !entities.disciplines.is_empty()
                }
                "universities" | "university" => {
                    entities.universities = strings.iter().map(|s| canonical_university(s)).collect();
                    !entities.universities.is_empty()
                }
                "availability" => {
                    entities.availability = strings.first().and_then(|s| Availability::parse(s));
                    entities.availability.is_some()
                }
                "remote" | "remote_preference" => {
                    entities.remote = raw.as_bool().or_else(|| {
                        strings.first().map(|s| {
                            let lower = s.to_lowercase();
                            REMOTE_WORDS.iter().any(|w| contains_term(&lower, w)) || lower == "yes" || lower == "true"
                        })
                    });
                    entities.remote.is_some()
                }
                "institution_id" => {
                    entities.institution_id = strings.first().cloned();
                    entities.institution_id.is_some()
                }
                _ => false,
            };

            if !handled {
                entities.unrecognized.insert(key.clone(), raw.clone());
            }
        }

        entities
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// True when `term` occurs in `haystack` without being glued to surrounding letters or digits.
/// Case-sensitive: callers lowercase both sides unless the casing itself matters.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    haystack.match_indices(term).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn matching_keys<'a>(text: &str, table: &'a [(&'a str, &'a [&'a str])]) -> BTreeSet<String> {
    table
        .iter()
        .filter(|(_, forms)| forms.iter().any(|f| contains_term(text, f)))
        .map(|(canonical, _)| canonical.to_string())
        .collect()
}

fn all_locations(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for (form, canonical) in LOCATIONS {
        if contains_term(text, form) && !found.iter().any(|f| f == canonical) {
            found.push(canonical.to_string());
        }
    }
    found
}

fn remote_preference(text: &str) -> Option<bool> {
    if REMOTE_WORDS.iter().any(|w| contains_term(text, w)) {
        Some(true)
    } else if ONSITE_WORDS.iter().any(|w| contains_term(text, w)) {
        Some(false)
    } else {
        None
    }
}

fn availability(text: &str) -> Option<Availability> {
    if IMMEDIATE_WORDS.iter().any(|w| contains_term(text, w)) {
        Some(Availability::Immediate)
    } else if MONTH_WORDS.iter().any(|w| contains_term(text, w)) {
        Some(Availability::OneMonth)
    } else {
        None
    }
}

/// Extract typed entities from free text. Pure and deterministic.
pub fn extract(text: &str) -> Entities {
    let lower = text.to_lowercase();

    let location = LOCATIONS
        .iter()
        .find(|(form, _)| contains_term(&lower, form))
        .map(|(_, canonical)| canonical.to_string());

    let mut universities: BTreeSet<String> = UNIVERSITIES
        .iter()
        .filter(|(form, _)| contains_term(&lower, form))
        .map(|(_, canonical)| canonical.to_string())
        .collect();
    if contains_term(text, ITS_ACRONYM) {
        universities.insert(ITS_ACRONYM.to_string());
    }

    let experience_level = EXPERIENCE
        .iter()
        .find(|(_, forms)| forms.iter().any(|f| contains_term(&lower, f)))
        .map(|(level, _)| *level);

    Entities {
        location,
        skills: matching_keys(&lower, SKILLS),
        experience_level,
        languages: matching_keys(&lower, LANGUAGES),
        disciplines: matching_keys(&lower, DISCIPLINES),
        universities,
        availability: availability(&lower),
        remote: remote_preference(&lower),
        ..Entities::default()
    }
}

/// Recruiter-grade parse: every location, minimum grade, and the raw text kept for the backend.
pub fn extract_search_query(text: &str) -> SearchQuery {
    let lower = text.to_lowercase();
    let base = extract(text);

    let min_gpa = GPA_RE
        .captures(&lower)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace(',', ".").parse::<f32>().ok());

    SearchQuery {
        skills: base.skills,
        locations: all_locations(&lower),
        universities: base.universities,
        experience_level: base.experience_level,
        languages: base.languages,
        availability: base.availability,
        disciplines: base.disciplines,
        min_gpa,
        remote_preference: base.remote,
        raw_query: text.to_string(),
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.iter().flat_map(string_list).collect(),
        _ => Vec::new(),
    }
}

fn canonical_location(raw: &str) -> String {
    let lower = raw.to_lowercase();
    LOCATIONS
        .iter()
        .find(|(form, _)| *form == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn canonical_skill(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    SKILLS
        .iter()
        .find(|(canonical, forms)| *canonical == lower || forms.contains(&lower.as_str()))
        .map(|(canonical, _)| canonical.to_string())
        .unwrap_or(lower)
}

fn canonical_university(raw: &str) -> String {
    let lower = raw.to_lowercase();
    UNIVERSITIES
        .iter()
        .find(|(form, _)| *form == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recruiter_query_entities() {
        let e = extract("find me candidates with python skills in Milan");
        assert_eq!(e.skills.iter().collect::<Vec<_>>(), vec!["python"]);
        assert_eq!(e.location.as_deref(), Some("Milan"));
    }

    #[test]
    fn test_short_forms_need_word_boundaries() {
        let e = extract("I want to build html pages");
        assert!(!e.skills.contains("machine learning"));
        assert!(!e.skills.contains("design"));

        let e = extract("ML and UI work");
        assert!(e.skills.contains("machine learning"));
        assert!(e.skills.contains("design"));
    }

    #[test]
    fn test_first_location_in_dictionary_wins() {
        let e = extract("Open to Rome or Milano");
        assert_eq!(e.location.as_deref(), Some("Milan"));
        let q = extract_search_query("Open to Rome or Milano");
        assert_eq!(q.locations, vec!["Milan", "Rome"]);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "Senior react and docker engineer, english, remote, asap";
        let a = extract(text);
        let b = extract(text);
        assert_eq!(a, b);
        assert_eq!(a.experience_level, Some(ExperienceLevel::Senior));
        assert_eq!(a.availability, Some(Availability::Immediate));
        assert_eq!(a.remote, Some(true));
        assert!(a.languages.contains("english"));
        assert!(a.disciplines.contains("tech"));
    }

    #[test]
    fn test_search_query_min_gpa_and_universities() {
        let q = extract_search_query("Junior data analysts from Polimi with voto 27, in sede");
        assert_eq!(q.min_gpa, Some(27.0));
        assert!(q.universities.contains("Politecnico di Milano"));
        assert_eq!(q.experience_level, Some(ExperienceLevel::Junior));
        assert_eq!(q.remote_preference, Some(false));

        let q = extract_search_query("gpa 3,5 minimum");
        assert_eq!(q.min_gpa, Some(3.5));
    }

    #[test]
    fn test_its_needs_the_acronym_or_full_name() {
        assert!(extract("what about its salary in Milan?").universities.is_empty());
        assert!(extract("Its location matters").universities.is_empty());
        assert!(extract("graduates from an ITS in Turin").universities.contains("ITS"));
        assert!(extract("istituto tecnico superiore Maker").universities.contains("ITS"));
    }

    #[test]
    fn test_search_params_send_first_location_and_university() {
        let q = extract_search_query("python developers in Milan or Rome from Polimi, gpa 28");
        let params = q.to_params();
        let value = |key: &str| params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str());

        assert_eq!(value("skills"), Some("python"));
        assert_eq!(value("location"), Some("Milan"));
        assert_eq!(value("university"), Some("Politecnico di Milano"));
        for absent in ["locations", "universities", "disciplines", "min_gpa", "limit"] {
            assert!(value(absent).is_none(), "{}", absent);
        }
    }

    #[test]
    fn test_merge_later_values_win_and_empty_never_overwrites() {
        let mut acc = extract("python jobs in Milan");
        acc.merge(&extract("what about Rome"));
        assert_eq!(acc.location.as_deref(), Some("Rome"));
        assert!(acc.skills.contains("python"));

        let mut other = Entities::default();
        other.unrecognized.insert("company_size".into(), json!("small"));
        acc.merge(&other);
        assert_eq!(acc.location.as_deref(), Some("Rome"));
        assert_eq!(acc.unrecognized["company_size"], json!("small"));
    }

    #[test]
    fn test_merge_is_union_with_overwrite() {
        let turns = [
            extract("python developer in Turin"),
            extract("senior level please"),
            extract("actually Bologna, react"),
        ];
        let mut acc = Entities::default();
        for t in &turns {
            acc.merge(t);
        }
        assert_eq!(acc.location.as_deref(), Some("Bologna"));
        assert_eq!(acc.skills.iter().collect::<Vec<_>>(), vec!["react"]);
        assert_eq!(acc.experience_level, Some(ExperienceLevel::Senior));
    }

    #[test]
    fn test_from_llm_value_normalizes_and_keeps_unknown() {
        let value = json!({
            "skills": ["Django", "React"],
            "location": "milano",
            "experience_level": "entry-level",
            "job_type": "full-time",
            "remote": "yes",
            "institution_id": 42,
            "universities": null
        });
        let e = Entities::from_llm_value(&value);
        assert_eq!(e.skills.iter().collect::<Vec<_>>(), vec!["python", "react"]);
        assert_eq!(e.location.as_deref(), Some("Milan"));
        assert_eq!(e.experience_level, Some(ExperienceLevel::Junior));
        assert_eq!(e.remote, Some(true));
        assert_eq!(e.institution_id.as_deref(), Some("42"));
        assert_eq!(e.unrecognized["job_type"], json!("full-time"));
        assert!(e.universities.is_empty());
    }

    #[test]
    fn test_serialization_skips_empty_slots() {
        let json = serde_json::to_value(extract("python in Milan")).unwrap();
        assert_eq!(json, json!({"location": "Milan", "skills": ["python"]}));
    }
}
