//! Scorer services used by action handlers: market analysis and candidate match explanation.
//!
//! Both are trait seams. The shipped implementations are deterministic heuristics so handlers
//! always have something to show; a model-backed analyzer can be injected in their place.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::entities::{ExperienceLevel, SearchQuery};

// ============================================================================
// Market analysis
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Stable,
    Declining,
    Emerging,
}

impl TrendDirection {
    pub fn is_hot(&self) -> bool {
        matches!(self, TrendDirection::Rising | TrendDirection::Emerging)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Rising => "rising",
            TrendDirection::Stable => "stable",
            TrendDirection::Declining => "declining",
            TrendDirection::Emerging => "emerging",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyTrend {
    pub technology: String,
    pub direction: TrendDirection,
    /// Percent per year.
    pub growth_rate: f32,
    /// 0.0 - 1.0
    pub demand_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTrends {
    pub trends: Vec<TechnologyTrend>,
    pub hot_technologies: Vec<String>,
    pub declining_technologies: Vec<String>,
    pub recommendations: Vec<String>,
    pub market_summary: String,
    pub time_horizon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: u32,
    pub max: u32,
    pub median: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMarketInsight {
    pub role_title: String,
    pub demand_level: f32,
    pub salary_range: SalaryRange,
    /// Percent per year.
    pub growth_projection: f32,
    pub required_skills: Vec<String>,
    pub emerging_skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMarketReport {
    pub insights: Vec<JobMarketInsight>,
    pub experience_level: Option<ExperienceLevel>,
}

#[async_trait]
pub trait MarketAnalyzer: Send + Sync {
    async fn analyze_market_trends(&self, technologies: &[String], horizon: &str) -> Result<MarketTrends>;

    async fn analyze_job_market(&self, roles: &[String], level: Option<ExperienceLevel>) -> Result<JobMarketReport>;
}

/// (technology, direction, growth %, demand)
const TECH_TRENDS: &[(&str, TrendDirection, f32, f32)] = &[
    ("python", TrendDirection::Rising, 18.0, 0.92),
    ("javascript", TrendDirection::Stable, 6.0, 0.88),
    ("typescript", TrendDirection::Rising, 22.0, 0.84),
    ("react", TrendDirection::Rising, 12.0, 0.86),
    ("machine learning", TrendDirection::Emerging, 30.0, 0.9),
    ("data science", TrendDirection::Rising, 15.0, 0.82),
    ("aws", TrendDirection::Rising, 20.0, 0.88),
    ("cloud", TrendDirection::Rising, 19.0, 0.87),
    ("docker", TrendDirection::Rising, 14.0, 0.8),
    ("devops", TrendDirection::Rising, 16.0, 0.81),
    ("cybersecurity", TrendDirection::Rising, 21.0, 0.85),
    ("sql", TrendDirection::Stable, 4.0, 0.82),
    ("java", TrendDirection::Stable, 2.0, 0.78),
    ("vue", TrendDirection::Stable, 5.0, 0.62),
    ("angular", TrendDirection::Declining, -6.0, 0.58),
    ("php", TrendDirection::Declining, -8.0, 0.45),
    ("jquery", TrendDirection::Declining, -20.0, 0.25),
];

const DEFAULT_GROWTH: f32 = 5.0;
const DEFAULT_DEMAND: f32 = 0.7;
const MARKET_SUMMARY_FALLBACK: &str = "Technology market shows continued growth with opportunities in cloud \
     computing, AI/ML, and modern development frameworks.";

/// (role keyword, demand, salary min/max/median at mid level, growth %, required skills)
const ROLE_MARKETS: &[(&str, f32, [u32; 3], f32, &[&str])] = &[
    ("software", 0.85, [35_000, 65_000, 48_000], 12.0, &["Programming", "Git", "Testing", "System Design"]),
    ("data", 0.82, [38_000, 70_000, 52_000], 15.0, &["Python", "SQL", "Statistics", "Visualization"]),
    ("ml", 0.86, [42_000, 80_000, 58_000], 22.0, &["Python", "Machine Learning", "Math", "MLOps"]),
    ("devops", 0.8, [40_000, 72_000, 54_000], 14.0, &["Linux", "Docker", "CI/CD", "Cloud"]),
    ("designer", 0.65, [30_000, 55_000, 40_000], 7.0, &["Figma", "User Research", "Prototyping"]),
    ("marketing", 0.6, [28_000, 50_000, 36_000], 6.0, &["SEO", "Analytics", "Content", "Communication"]),
    ("analyst", 0.7, [32_000, 58_000, 42_000], 9.0, &["Excel", "SQL", "Reporting", "Communication"]),
];

const DEFAULT_ROLE_MARKET: (f32, [u32; 3], f32) = (0.6, [60_000, 120_000, 90_000], 8.0);
const DEFAULT_REQUIRED_SKILLS: &[&str] = &["Programming", "Problem Solving", "Communication"];
const EMERGING_SKILLS: &[&str] = &["Cloud Computing", "AI/ML", "DevOps"];

fn level_multiplier(level: Option<ExperienceLevel>) -> f32 {
    match level {
        Some(ExperienceLevel::Intern) => 0.35,
        Some(ExperienceLevel::Junior) => 0.7,
        Some(ExperienceLevel::Mid) | None => 1.0,
        Some(ExperienceLevel::Senior) => 1.4,
    }
}

/// Table-driven analyzer. Unknown technologies are reported as stable.
#[derive(Debug, Default, Clone)]
pub struct HeuristicMarketAnalyzer;

impl HeuristicMarketAnalyzer {
    fn trend_for(technology: &str) -> TechnologyTrend {
        let lower = technology.trim().to_lowercase();
        let (direction, growth_rate, demand_score) = TECH_TRENDS
            .iter()
            .find(|(name, ..)| *name == lower)
            .map(|(_, d, g, s)| (*d, *g, *s))
            .unwrap_or((TrendDirection::Stable, DEFAULT_GROWTH, DEFAULT_DEMAND));

        TechnologyTrend {
            technology: technology.trim().to_string(),
            direction,
            growth_rate,
            demand_score,
        }
    }

    fn insight_for(role: &str, level: Option<ExperienceLevel>) -> JobMarketInsight {
        let lower = role.to_lowercase();
        let found = ROLE_MARKETS.iter().find(|(key, ..)| lower.contains(key));

        let (demand_level, salary, growth_projection, required) = match found {
            Some((_, demand, salary, growth, skills)) => (*demand, *salary, *growth, *skills),
            None => {
                let (demand, salary, growth) = DEFAULT_ROLE_MARKET;
                (demand, salary, growth, DEFAULT_REQUIRED_SKILLS)
            }
        };

        let scale = |v: u32| ((v as f32 * level_multiplier(level)) / 1000.0).round() as u32 * 1000;

        JobMarketInsight {
            role_title: role.to_string(),
            demand_level,
            salary_range: SalaryRange {
                min: scale(salary[0]),
                max: scale(salary[1]),
                median: scale(salary[2]),
            },
            growth_projection,
            required_skills: required.iter().map(|s| s.to_string()).collect(),
            emerging_skills: EMERGING_SKILLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl MarketAnalyzer for HeuristicMarketAnalyzer {
    async fn analyze_market_trends(&self, technologies: &[String], horizon: &str) -> Result<MarketTrends> {
        let trends: Vec<TechnologyTrend> = technologies.iter().map(|t| Self::trend_for(t)).collect();

        let hot_technologies: Vec<String> = trends
            .iter()
            .filter(|t| t.direction.is_hot())
            .map(|t| t.technology.clone())
            .collect();
        let declining_technologies = trends
            .iter()
            .filter(|t| t.direction == TrendDirection::Declining)
            .map(|t| t.technology.clone())
            .collect();

        let recommendations = trends
            .iter()
            .filter(|t| t.demand_score > 0.7 && t.direction.is_hot())
            .take(5)
            .map(|t| match t.direction {
                TrendDirection::Emerging => {
                    format!("Consider early adoption of {} for competitive advantage", t.technology)
                }
                _ => format!(
                    "Invest in {} skills - high demand and {:.0}% growth",
                    t.technology, t.growth_rate
                ),
            })
            .collect();

        let market_summary = match hot_technologies.as_slice() {
            [] => MARKET_SUMMARY_FALLBACK.to_string(),
            hot => format!(
                "{} lead demand over the next {}.",
                hot.join(", "),
                horizon.replace('_', " ")
            ),
        };

        Ok(MarketTrends {
            trends,
            hot_technologies,
            declining_technologies,
            recommendations,
            market_summary,
            time_horizon: horizon.to_string(),
        })
    }

    async fn analyze_job_market(&self, roles: &[String], level: Option<ExperienceLevel>) -> Result<JobMarketReport> {
        Ok(JobMarketReport {
            insights: roles.iter().map(|r| Self::insight_for(r, level)).collect(),
            experience_level: level,
        })
    }
}

// ============================================================================
// Candidate matching
// ============================================================================

/// What the matcher knows about a candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProfile {
    pub id: String,
    pub name: String,
    pub skills: BTreeSet<String>,
    pub experience_level: Option<ExperienceLevel>,
    pub project_count: u32,
    pub university: Option<String>,
    pub location: Option<String>,
    pub remote_ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor: String,
    pub weight: f32,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchExplanation {
    pub candidate_id: String,
    pub name: String,
    /// 0 - 100
    pub overall: u8,
    pub factors: Vec<FactorScore>,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
}

impl MatchExplanation {
    pub fn recommendation(&self) -> &'static str {
        match self.overall {
            80.. => "Strong candidate - consider reaching out!",
            60..=79 => "Good potential - review projects carefully.",
            _ => "May need additional screening.",
        }
    }
}

#[async_trait]
pub trait CandidateMatcher: Send + Sync {
    async fn explain(&self, candidate: &CandidateProfile, query: &SearchQuery) -> Result<MatchExplanation>;
}

pub const MATCH_WEIGHTS: [(&str, f32); 6] = [
    ("skills", 0.30),
    ("experience", 0.25),
    ("projects", 0.20),
    ("education", 0.15),
    ("location", 0.05),
    ("culture", 0.05),
];

const STRENGTH_THRESHOLD: f32 = 0.8;
const GAP_THRESHOLD: f32 = 0.6;
const NEUTRAL_SCORE: f32 = 0.7;

/// Fixed-weight breakdown over six factors.
#[derive(Debug, Default, Clone)]
pub struct WeightedCandidateMatcher;

impl WeightedCandidateMatcher {
    fn factor_score(factor: &str, candidate: &CandidateProfile, query: &SearchQuery) -> f32 {
        match factor {
            "skills" => {
                if query.skills.is_empty() {
                    return NEUTRAL_SCORE;
                }
                let have: BTreeSet<String> = candidate.skills.iter().map(|s| s.to_lowercase()).collect();
                let hits = query.skills.iter().filter(|s| have.contains(&s.to_lowercase())).count();
                hits as f32 / query.skills.len() as f32
            }
            "experience" => match (query.experience_level, candidate.experience_level) {
                (None, _) => NEUTRAL_SCORE,
                (Some(_), None) => 0.5,
                (Some(want), Some(have)) => {
                    let rank = |l: ExperienceLevel| l as i32;
                    match (rank(want) - rank(have)).abs() {
                        0 => 1.0,
                        1 => 0.6,
                        _ => 0.3,
                    }
                }
            },
            "projects" => (candidate.project_count as f32 / 4.0).min(1.0),
            "education" => match &candidate.university {
                Some(u) if query.universities.contains(u) => 1.0,
                Some(_) => 0.8,
                None => 0.5,
            },
            "location" => {
                if query.locations.is_empty() {
                    return 1.0;
                }
                match &candidate.location {
                    Some(l) if query.locations.iter().any(|q| q.eq_ignore_ascii_case(l)) => 1.0,
                    _ if candidate.remote_ok || query.remote_preference == Some(true) => 0.8,
                    _ => 0.3,
                }
            }
            _ => 0.8,
        }
    }
}

#[async_trait]
impl CandidateMatcher for WeightedCandidateMatcher {
    async fn explain(&self, candidate: &CandidateProfile, query: &SearchQuery) -> Result<MatchExplanation> {
        let factors: Vec<FactorScore> = MATCH_WEIGHTS
            .iter()
            .map(|(factor, weight)| FactorScore {
                factor: factor.to_string(),
                weight: *weight,
                score: Self::factor_score(factor, candidate, query),
            })
            .collect();

        let overall = factors.iter().map(|f| f.weight * f.score).sum::<f32>();
        let overall = (overall * 100.0).round().clamp(0.0, 100.0) as u8;

        let strengths = factors
            .iter()
            .filter(|f| f.score >= STRENGTH_THRESHOLD)
            .map(|f| format!("Strong {} alignment ({:.0}%)", f.factor, f.score * 100.0))
            .collect();
        let gaps = factors
            .iter()
            .filter(|f| f.score < GAP_THRESHOLD)
            .map(|f| format!("{} could be stronger ({:.0}%)", capitalize(&f.factor), f.score * 100.0))
            .collect();

        Ok(MatchExplanation {
            candidate_id: candidate.id.clone(),
            name: candidate.name.clone(),
            overall,
            factors,
            strengths,
            gaps,
        })
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
