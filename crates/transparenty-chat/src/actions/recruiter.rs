//! Recruiter handlers: natural-language candidate search, match explanations, posting help and
//! market intelligence.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{ActionResult, BackendClient, HandlerContext, RecruiterActions};
use crate::entities::{extract_search_query, CandidateHit, Entities, ExperienceLevel, RecentSearch, SearchQuery};
use crate::scorers::{CandidateMatcher, CandidateProfile, MarketAnalyzer, MATCH_WEIGHTS};

const CANDIDATE_FETCH_LIMIT: usize = 10;
const CANDIDATES_SHOWN: usize = 5;
const CANDIDATES_EXPLAINED: usize = 3;

/// A candidate as the backend search endpoint returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRecord {
    pub id: String,
    pub name: String,
    pub university: String,
    pub location: String,
    pub skills: Vec<String>,
    pub experience_level: Option<String>,
    pub match_score: Option<u8>,
    pub projects: Vec<Value>,
    pub anonymous: bool,
}

impl CandidateRecord {
    fn display_name(&self, index: usize) -> String {
        if self.anonymous {
            let short: String = self.id.chars().take(6).collect();
            format!("Candidate #{}", short)
        } else if self.name.is_empty() {
            format!("Candidate {}", index + 1)
        } else {
            self.name.clone()
        }
    }

    fn score(&self, index: usize) -> u8 {
        self.match_score.unwrap_or(90u8.saturating_sub(index as u8 * 3))
    }

    fn to_profile(&self) -> CandidateProfile {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());
        CandidateProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            skills: self.skills.iter().map(|s| s.to_lowercase()).collect(),
            experience_level: self.experience_level.as_deref().and_then(ExperienceLevel::parse),
            project_count: self.projects.len() as u32,
            university: non_empty(&self.university),
            location: non_empty(&self.location),
            remote_ok: false,
        }
    }
}

fn sample_candidates(query: &SearchQuery) -> Vec<CandidateRecord> {
    let skills: Vec<String> = if query.skills.is_empty() {
        vec!["python".to_string()]
    } else {
        query.skills.iter().cloned().collect()
    };
    let location = query.locations.first().cloned().unwrap_or_else(|| "Milan".to_string());
    let with = |extra: [&str; 2]| {
        let mut all = skills.clone();
        all.extend(extra.iter().map(|s| s.to_string()));
        all
    };
    let projects = |titles: &[&str]| titles.iter().map(|t| json!({ "title": t })).collect::<Vec<_>>();

    vec![
        CandidateRecord {
            id: "cand_001".into(),
            name: "Marco Rossi".into(),
            university: "Politecnico di Milano".into(),
            location: location.clone(),
            skills: with(["React", "Node.js"]),
            experience_level: Some("junior".into()),
            match_score: Some(94),
            projects: projects(&["E-commerce Platform", "ML Pipeline"]),
            anonymous: false,
        },
        CandidateRecord {
            id: "cand_002".into(),
            name: "Giulia Bianchi".into(),
            university: "Università di Bologna".into(),
            location,
            skills: with(["TypeScript", "AWS"]),
            experience_level: Some("mid".into()),
            match_score: Some(89),
            projects: projects(&["FinTech App", "API Gateway"]),
            anonymous: false,
        },
        CandidateRecord {
            id: "cand_003".into(),
            name: "Alessandro Verdi".into(),
            university: "Sapienza Università di Roma".into(),
            location: "Rome".into(),
            skills: with(["Docker", "PostgreSQL"]),
            experience_level: Some("junior".into()),
            match_score: Some(85),
            projects: projects(&["DevOps Pipeline"]),
            anonymous: false,
        },
    ]
}

pub struct RecruiterHandler {
    backend: BackendClient,
    analyzer: Arc<dyn MarketAnalyzer>,
    matcher: Arc<dyn CandidateMatcher>,
}

impl RecruiterHandler {
    pub fn new(backend: BackendClient, analyzer: Arc<dyn MarketAnalyzer>, matcher: Arc<dyn CandidateMatcher>) -> Self {
        Self {
            backend,
            analyzer,
            matcher,
        }
    }

    async fn fetch_candidates(&self, query: &SearchQuery) -> Vec<CandidateRecord> {
        match self.backend.get_list("/api/students", "students", &query.to_params()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Candidate search failed, using sample candidates");
                sample_candidates(query)
            }
        }
    }

    /// Full record for a previously surfaced candidate. Falls back to the sample pool, then
    /// to what the hit itself carries.
    async fn candidate_profile(&self, hit: &CandidateHit, query: &SearchQuery) -> CandidateProfile {
        match self.backend.get::<CandidateRecord>(&format!("/api/students/{}", hit.id), &[]).await {
            Ok(record) => return record.to_profile(),
            Err(e) => tracing::debug!(candidate = %hit.id, error = %e, "Candidate fetch failed"),
        }

        sample_candidates(query)
            .into_iter()
            .find(|c| c.id == hit.id)
            .map(|c| c.to_profile())
            .unwrap_or_else(|| CandidateProfile {
                id: hit.id.clone(),
                name: hit.name.clone(),
                ..Default::default()
            })
    }

    fn no_results(query: &SearchQuery) -> ActionResult {
        ActionResult::ok(format!(
            "I searched for candidates matching **{}** but didn't find exact matches.\n\n\
             **Suggestions:**\n\
             • Broaden your skill requirements\n\
             • Consider nearby locations\n\
             • Try 'junior' or 'intern' levels for wider pool\n\
             • Check back - new candidates join daily!\n\n\
             Would you like me to adjust the search?",
            query.describe()
        ))
        .with_data(json!({ "candidates_count": 0, "query": query }))
        .with_actions(&[
            ("Broaden Search", "broaden_search"),
            ("Set Alert", "set_alert"),
            ("Try Different Skills", "different_skills"),
        ])
    }

    fn how_matching_works() -> ActionResult {
        let dimensions = MATCH_WEIGHTS
            .iter()
            .enumerate()
            .map(|(i, (factor, weight))| format!("{}. **{}** ({:.0}%)", i + 1, factor, weight * 100.0))
            .collect::<Vec<_>>()
            .join("\n");

        ActionResult::ok(format!(
            "**🎯 How Our Matching Works**\n\n\
             Candidates are scored across **{} dimensions**:\n\n{}\n\n\
             Scores are based on **verified evidence** from actual projects, not just claims.\n\n\
             Run a search and I can explain a specific candidate's match score.",
            MATCH_WEIGHTS.len(),
            dimensions
        ))
        .with_data(json!({
            "match_weights": MATCH_WEIGHTS
                .iter()
                .map(|(f, w)| (f.to_string(), *w))
                .collect::<std::collections::BTreeMap<_, _>>()
        }))
        .with_actions(&[
            ("View Top Matches", "view_matches"),
            ("Adjust Weights", "adjust_weights"),
            ("Search Candidates", "search"),
        ])
    }
}

#[async_trait]
impl RecruiterActions for RecruiterHandler {
    async fn candidate_search(
        &self,
        entities: &Entities,
        _ctx: &HandlerContext,
        raw_message: &str,
    ) -> Result<ActionResult> {
        let mut query = extract_search_query(raw_message);
        query.skills.extend(entities.skills.iter().cloned());
        if query.locations.is_empty() {
            query.locations.extend(entities.location.clone());
        }
        if query.experience_level.is_none() {
            query.experience_level = entities.experience_level;
        }

        let candidates = self.fetch_candidates(&query).await;
        tracing::info!(query = %query.describe(), found = candidates.len(), "Candidate search");

        if candidates.is_empty() {
            return Ok(Self::no_results(&query));
        }

        let total = candidates.len();
        let shown: Vec<&CandidateRecord> = candidates.iter().take(CANDIDATES_SHOWN).collect();

        let summaries = shown
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let skills = if c.skills.is_empty() {
                    "Various skills".to_string()
                } else {
                    c.skills.iter().take(4).cloned().collect::<Vec<_>>().join(", ")
                };
                format!(
                    "**{}** - {}% match\n   🎓 {}\n   📍 {}\n   🛠️ {}",
                    c.display_name(i),
                    c.score(i),
                    c.university,
                    c.location,
                    skills
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let more = if total > CANDIDATES_SHOWN {
            format!("Showing top {} of {}. ", CANDIDATES_SHOWN, total)
        } else {
            String::new()
        };

        let last_search = RecentSearch {
            query: query.clone(),
            candidates: shown
                .iter()
                .enumerate()
                .map(|(i, c)| CandidateHit {
                    id: c.id.clone(),
                    name: c.display_name(i),
                    match_score: c.score(i),
                })
                .collect(),
        };

        Ok(ActionResult::ok(format!(
            "Found **{} candidates** matching {}:\n\n{}\n\n{}\
             Match scores are based on skills, projects, and profile completeness.\n\n\
             What would you like to do next?",
            total,
            query.describe(),
            summaries,
            more
        ))
        .with_data(json!({
            "candidates_count": total,
            "candidates": candidates.iter().take(CANDIDATE_FETCH_LIMIT).collect::<Vec<_>>(),
            "query": query,
        }))
        .with_actions(&[
            ("View Full Profiles", "view_profiles"),
            ("Refine Search", "refine_search"),
            ("Compare Top 3", "compare_candidates"),
            ("Save Search", "save_search"),
        ])
        .with_carry_over(Entities {
            last_search: Some(last_search),
            ..Entities::default()
        }))
    }

    async fn match_explanation(
        &self,
        _entities: &Entities,
        ctx: &HandlerContext,
        _raw_message: &str,
    ) -> Result<ActionResult> {
        let Some(recent) = ctx.recent_search.as_ref().filter(|r| !r.candidates.is_empty()) else {
            return Ok(Self::how_matching_works());
        };

        let mut sections = Vec::new();
        let mut explanations = Vec::new();
        for hit in recent.candidates.iter().take(CANDIDATES_EXPLAINED) {
            let profile = self.candidate_profile(hit, &recent.query).await;
            let explanation = self.matcher.explain(&profile, &recent.query).await?;

            let strengths = if explanation.strengths.is_empty() {
                "No major strengths identified".to_string()
            } else {
                explanation.strengths.iter().map(|s| format!("✅ {}", s)).collect::<Vec<_>>().join("\n")
            };
            let gaps = if explanation.gaps.is_empty() {
                "No significant gaps".to_string()
            } else {
                explanation.gaps.iter().map(|g| format!("⚠️ {}", g)).collect::<Vec<_>>().join("\n")
            };

            sections.push(format!(
                "**Match Analysis: {}** ({}% overall)\n\n**Strengths:**\n{}\n\n**Areas to Explore:**\n{}\n\n**Recommendation:** {}",
                hit.name,
                explanation.overall,
                strengths,
                gaps,
                explanation.recommendation()
            ));
            explanations.push(explanation);
        }

        Ok(ActionResult::ok(format!(
            "Here's how your top candidates for **{}** line up:\n\n{}",
            recent.query.describe(),
            sections.join("\n\n---\n\n")
        ))
        .with_data(json!({ "explanations": explanations }))
        .with_actions(&[
            ("View Full Profile", "view_profile"),
            ("Send Message", "message_candidate"),
            ("Compare Others", "compare"),
        ]))
    }

    async fn job_posting_help(
        &self,
        entities: &Entities,
        ctx: &HandlerContext,
        _raw_message: &str,
    ) -> Result<ActionResult> {
        let resolved = ctx.resolve(entities);
        let skills: Vec<String> = resolved.skills.iter().cloned().collect();

        let title_example = match (resolved.experience_level, skills.first()) {
            (Some(level), Some(skill)) => format!("'{} Developer ({})'", capitalize(level.as_str()), skill),
            (None, Some(skill)) => format!("'Junior Developer ({})'", skill),
            _ => "'Junior Frontend Developer (React)'".to_string(),
        };

        let requirements = if skills.is_empty() {
            "   - List must-have vs nice-to-have skills\n".to_string()
        } else {
            format!(
                "   - Must-have: {}\n   - Keep nice-to-haves separate from the core stack\n",
                skills.join(", ")
            )
        };

        Ok(ActionResult::ok(format!(
            "**📝 Job Posting Checklist**\n\n\
             1. **Clear Title**\n   ✅ {}\n   ❌ 'Ninja Rockstar Developer'\n\n\
             2. **Specific Requirements**\n{}   - Be realistic about experience level\n\n\
             3. **Transparent Compensation**\n   - Jobs with salary get 3x more applications\n   - Include benefits and perks\n\n\
             4. **Company Culture**\n   - Remote/hybrid policy\n   - Team size and growth opportunities\n\n\
             5. **Clear Process**\n   - Interview steps\n   - Timeline expectations\n\n\
             Would you like me to help draft a job posting?",
            title_example, requirements
        ))
        .with_data(json!({ "skills": skills }))
        .with_actions(&[
            ("Draft New Posting", "draft_posting"),
            ("Review My Posting", "review_posting"),
            ("View Templates", "templates"),
        ]))
    }

    async fn market_intelligence(
        &self,
        entities: &Entities,
        ctx: &HandlerContext,
        _raw_message: &str,
    ) -> Result<ActionResult> {
        let resolved = ctx.resolve(entities);
        let skills: Vec<String> = resolved.skills.iter().take(5).cloned().collect();

        if skills.is_empty() {
            return Ok(ActionResult::ok(
                "**📊 What Market Intelligence Do You Need?**\n\n\
                 I can provide insights on:\n\n\
                 • **Skill Trends** - Which skills are rising or declining\n\
                 • **Salary Data** - Compensation benchmarks by role/skill\n\
                 • **Candidate Supply** - Availability of talent in specific areas\n\
                 • **Geographic Insights** - Talent distribution by location\n\n\
                 What would you like to explore?",
            )
            .with_actions(&[
                ("Tech Skill Trends", "tech_trends"),
                ("Salary Benchmarks", "salaries"),
                ("Talent Availability", "talent_supply"),
            ]));
        }

        let market = self.analyzer.analyze_market_trends(&skills, "1_year").await?;

        let trends = market
            .trends
            .iter()
            .map(|t| {
                let emoji = match t.direction {
                    d if d.is_hot() => "📈",
                    crate::scorers::TrendDirection::Stable => "📊",
                    _ => "📉",
                };
                format!(
                    "{} **{}**: {}\n   Demand: {:.0}% | Growth: {:.0}%",
                    emoji,
                    t.technology,
                    t.direction.as_str(),
                    t.demand_score * 100.0,
                    t.growth_rate
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let recommendations = market
            .recommendations
            .iter()
            .take(3)
            .map(|r| format!("• {}", r))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ActionResult::ok(format!(
            "**📊 Market Intelligence Report**\n\n{}\n\n**Key Insights:**\n• {}\n\n**Recommendations for Hiring:**\n{}",
            trends,
            market.market_summary,
            if recommendations.is_empty() { "• Widen the candidate pool to adjacent skills" } else { recommendations.as_str() }
        ))
        .with_data(serde_json::to_value(&market)?)
        .with_actions(&[
            ("Salary Insights", "salary_insights"),
            ("Candidate Supply", "candidate_supply"),
            ("Hiring Trends", "hiring_trends"),
        ]))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::backend::testing::{client, serve, serve_recording, unreachable};
    use crate::entities;
    use crate::scorers::{HeuristicMarketAnalyzer, WeightedCandidateMatcher};

    fn handler(backend: BackendClient) -> RecruiterHandler {
        RecruiterHandler::new(backend, Arc::new(HeuristicMarketAnalyzer), Arc::new(WeightedCandidateMatcher))
    }

    const MESSAGE: &str = "find me candidates with python skills in Milan";

    #[tokio::test]
    async fn test_candidate_search_sample_fallback_sets_last_search() {
        let result = handler(unreachable())
            .candidate_search(&entities::extract(MESSAGE), &HandlerContext::default(), MESSAGE)
            .await
            .unwrap();

        assert!(result.message.contains("**Marco Rossi** - 94% match"));
        assert!(result.message.contains("Found **3 candidates**"));

        let last = result.carry_over.unwrap().last_search.unwrap();
        assert!(last.query.skills.contains("python"));
        assert_eq!(last.query.locations, vec!["Milan"]);
        assert_eq!(last.candidates.len(), 3);
        assert_eq!(last.candidates[0].match_score, 94);
    }

    #[tokio::test]
    async fn test_candidate_search_merges_entity_skills() {
        let mut turn = Entities::default();
        turn.skills.insert("docker".into());
        let result = handler(unreachable())
            .candidate_search(&turn, &HandlerContext::default(), MESSAGE)
            .await
            .unwrap();
        let last = result.carry_over.unwrap().last_search.unwrap();
        assert!(last.query.skills.contains("python"));
        assert!(last.query.skills.contains("docker"));
    }

    #[tokio::test]
    async fn test_candidate_search_no_results() {
        let url = serve(200, r#"{"students":[]}"#, 1).await;
        let result = handler(client(&url))
            .candidate_search(&Entities::default(), &HandlerContext::default(), MESSAGE)
            .await
            .unwrap();
        assert!(result.message.contains("didn't find exact matches"));
        assert!(result.carry_over.is_none());
    }

    #[tokio::test]
    async fn test_candidate_search_hits_students_endpoint() {
        let (url, request_line) = serve_recording(200, r#"{"students":[{"id":"c1","name":"Sara","match_score":91}]}"#).await;
        let message = "python developers in Milan or Rome";
        let result = handler(client(&url))
            .candidate_search(&entities::extract(message), &HandlerContext::default(), message)
            .await
            .unwrap();
        assert!(result.message.contains("**Sara** - 91% match"));

        let line = request_line.await.unwrap();
        assert!(line.starts_with("GET /api/students?"), "{}", line);
        assert!(line.contains("skills=python"));
        assert!(line.contains("location=Milan"));
        assert!(!line.contains("Rome"));
        assert!(!line.contains("limit="));
    }

    #[tokio::test]
    async fn test_anonymous_and_unscored_candidates() {
        let url = serve(
            200,
            r#"[{"id":"abcdef123","anonymous":true,"skills":[]},{"id":"x","name":"Ada"}]"#,
            1,
        )
        .await;
        let result = handler(client(&url))
            .candidate_search(&Entities::default(), &HandlerContext::default(), MESSAGE)
            .await
            .unwrap();
        assert!(result.message.contains("**Candidate #abcdef** - 90% match"));
        assert!(result.message.contains("**Ada** - 87% match"));
        assert!(result.message.contains("Various skills"));
    }

    #[tokio::test]
    async fn test_match_explanation_without_search_describes_weights() {
        let result = handler(unreachable())
            .match_explanation(&Entities::default(), &HandlerContext::default(), "why?")
            .await
            .unwrap();
        assert!(result.message.contains("How Our Matching Works"));
        assert!(result.data.unwrap()["match_weights"]["skills"].is_number());
    }

    #[tokio::test]
    async fn test_match_explanation_uses_recent_search() {
        let h = handler(unreachable());
        let search = h
            .candidate_search(&Entities::default(), &HandlerContext::default(), MESSAGE)
            .await
            .unwrap();
        let ctx = HandlerContext {
            recent_search: search.carry_over.and_then(|e| e.last_search),
            ..Default::default()
        };

        let result = h.match_explanation(&Entities::default(), &ctx, "why is Marco a match").await.unwrap();
        assert!(result.message.contains("**Match Analysis: Marco Rossi**"));
        assert!(result.message.contains("**Match Analysis: Alessandro Verdi**"));
        assert_eq!(result.data.unwrap()["explanations"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_job_posting_help_tailors_to_skills() {
        let result = handler(unreachable())
            .job_posting_help(&entities::extract("senior rust and react role"), &HandlerContext::default(), "")
            .await
            .unwrap();
        assert!(result.message.contains("'Senior Developer (react)'"));
        assert!(result.message.contains("Must-have: react"));
    }

    #[tokio::test]
    async fn test_market_intelligence_with_and_without_skills() {
        let h = handler(unreachable());
        let general = h
            .market_intelligence(&Entities::default(), &HandlerContext::default(), "")
            .await
            .unwrap();
        assert!(general.message.contains("What Market Intelligence"));

        let report = h
            .market_intelligence(&entities::extract("python and aws demand"), &HandlerContext::default(), "")
            .await
            .unwrap();
        assert!(report.message.contains("**python**: rising"));
        assert!(report.message.contains("**aws**: rising"));
    }
}
