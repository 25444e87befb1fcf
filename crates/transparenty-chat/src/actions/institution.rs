//! Institution handlers: career-office analytics over the platform backend.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use super::{ActionResult, BackendClient, HandlerContext, InstitutionActions};
use crate::entities::{contains_term, Entities};

// ============================================================================
// Backend payloads
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchAnalytics {
    pub total_searches: u64,
    pub unique_companies: u32,
    pub top_skills_searched: Vec<(String, u32)>,
    pub top_locations_searched: Vec<(String, u32)>,
    pub search_trend: String,
    pub your_students_viewed: u32,
    pub conversion_rate: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillGap {
    pub skill: String,
    #[serde(default = "default_market_demand")]
    pub market_demand: f32,
    #[serde(default = "default_student_supply")]
    pub student_supply: f32,
}

fn default_market_demand() -> f32 {
    0.8
}

fn default_student_supply() -> f32 {
    0.3
}

impl SkillGap {
    pub fn gap(&self) -> f32 {
        self.market_demand - self.student_supply
    }

    pub fn marker(&self) -> &'static str {
        match self.gap() {
            g if g > 0.4 => "🔴",
            g if g > 0.2 => "🟡",
            _ => "🟢",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillDemand {
    pub skill_gaps: Vec<SkillGap>,
    pub strengths: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentRisk {
    pub student_id: String,
    pub name: String,
    pub risk_level: String,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub profile_completeness: f32,
    pub job_applications: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyEngagement {
    pub name: String,
    pub industry: String,
    pub student_views: u32,
    pub messages_sent: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInterest {
    pub unique_companies: u32,
    pub total_views: u64,
    pub total_messages: u32,
    pub trend: String,
    pub top_companies: Vec<CompanyEngagement>,
    pub industry_breakdown: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ranking {
    pub position: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricComparison {
    pub your_value: f32,
    pub average: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Benchmark {
    pub ranking: Ranking,
    pub metrics: BTreeMap<String, MetricComparison>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

// ============================================================================
// Samples shown when the backend has nothing for us
// ============================================================================

fn sample_search_analytics() -> SearchAnalytics {
    let counts = |pairs: &[(&str, u32)]| pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    SearchAnalytics {
        total_searches: 2847,
        unique_companies: 156,
        top_skills_searched: counts(&[
            ("Python", 342),
            ("React", 289),
            ("JavaScript", 256),
            ("AWS", 198),
            ("Machine Learning", 167),
            ("SQL", 145),
            ("Docker", 132),
            ("TypeScript", 118),
            ("Node.js", 98),
            ("Cybersecurity", 87),
        ]),
        top_locations_searched: counts(&[
            ("Milan", 523),
            ("Rome", 412),
            ("Turin", 234),
            ("Bologna", 198),
            ("Remote", 456),
        ]),
        search_trend: "increasing".into(),
        your_students_viewed: 423,
        conversion_rate: 0.12,
    }
}

fn sample_skill_demand() -> SkillDemand {
    let gap = |skill: &str, market_demand, student_supply| SkillGap {
        skill: skill.into(),
        market_demand,
        student_supply,
    };
    SkillDemand {
        skill_gaps: vec![
            gap("Cloud Computing (AWS/Azure)", 0.85, 0.35),
            gap("Machine Learning", 0.78, 0.28),
            gap("Cybersecurity", 0.82, 0.22),
            gap("DevOps/CI-CD", 0.75, 0.30),
            gap("React/Modern Frontend", 0.80, 0.55),
        ],
        strengths: strings(&[
            "Strong Python fundamentals",
            "Good database knowledge",
            "Solid problem-solving skills",
            "Project-based learning evident",
        ]),
        recommendations: strings(&[
            "Add cloud computing modules to curriculum",
            "Partner with AWS/Azure for student certifications",
            "Introduce cybersecurity fundamentals course",
            "Expand ML/AI practical projects",
        ]),
    }
}

fn sample_at_risk() -> Vec<StudentRisk> {
    let now = Utc::now();
    vec![
        StudentRisk {
            student_id: "stu_001".into(),
            name: "Giuseppe Esposito".into(),
            risk_level: "high".into(),
            risk_factors: strings(&["Profile 25% complete", "No activity in 45 days", "Zero applications"]),
            recommendations: strings(&["Personal outreach", "Profile workshop"]),
            last_activity: Some(now - Duration::days(45)),
            profile_completeness: 0.25,
            job_applications: 0,
        },
        StudentRisk {
            student_id: "stu_002".into(),
            name: "Francesca Romano".into(),
            risk_level: "high".into(),
            risk_factors: strings(&["No projects uploaded", "Missing skills section"]),
            recommendations: strings(&["Project guidance", "Skill assessment"]),
            last_activity: Some(now - Duration::days(30)),
            profile_completeness: 0.40,
            job_applications: 1,
        },
        StudentRisk {
            student_id: "stu_003".into(),
            name: "Andrea Colombo".into(),
            risk_level: "medium".into(),
            risk_factors: strings(&["Only 1 project", "Low engagement"]),
            recommendations: strings(&["Encourage project uploads"]),
            last_activity: Some(now - Duration::days(14)),
            profile_completeness: 0.60,
            job_applications: 2,
        },
    ]
}

fn sample_company_interest() -> CompanyInterest {
    let company = |name: &str, industry: &str, student_views, messages_sent| CompanyEngagement {
        name: name.into(),
        industry: industry.into(),
        student_views,
        messages_sent,
    };
    CompanyInterest {
        unique_companies: 89,
        total_views: 1247,
        total_messages: 156,
        trend: "increasing".into(),
        top_companies: vec![
            company("Accenture", "Consulting", 89, 12),
            company("Intesa Sanpaolo", "Banking", 67, 8),
            company("Reply", "Tech", 54, 15),
            company("Deloitte", "Consulting", 48, 6),
            company("Amazon", "Tech", 45, 9),
            company("Enel", "Energy", 38, 4),
            company("TIM", "Telecom", 34, 5),
            company("UniCredit", "Banking", 31, 3),
        ],
        industry_breakdown: [
            ("Tech", 0.35),
            ("Consulting", 0.25),
            ("Banking/Finance", 0.18),
            ("Manufacturing", 0.12),
            ("Other", 0.10),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect(),
    }
}

fn sample_benchmark() -> Benchmark {
    let metric = |your_value, average| MetricComparison { your_value, average };
    Benchmark {
        ranking: Ranking { position: 12, total: 85 },
        metrics: [
            ("profile_completion", metric(72.0, 65.0)),
            ("projects_per_student", metric(1.8, 1.5)),
            ("company_engagement", metric(45.0, 52.0)),
            ("placement_rate", metric(78.0, 71.0)),
            ("student_activity", metric(68.0, 61.0)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect(),
        strengths: strings(&[
            "Higher than average profile completion",
            "Good placement rate",
            "Active student base",
        ]),
        improvements: strings(&[
            "Company engagement could improve",
            "Increase average projects per student",
            "More industry partnerships needed",
        ]),
    }
}

// ============================================================================
// Formatting helpers
// ============================================================================

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn title_case(raw: &str) -> String {
    raw.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 2847 -> "2,847"
fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn trend_marker(trend: &str) -> &'static str {
    match trend {
        "increasing" => "📈",
        "decreasing" => "📉",
        _ => "➡️",
    }
}

fn percent(ratio: f32) -> i32 {
    (ratio * 100.0).round() as i32
}

/// Reporting window named in the message; a month unless said otherwise.
fn period_from(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if contains_term(&lower, "week") || contains_term(&lower, "settimana") {
        "week"
    } else if contains_term(&lower, "quarter") || contains_term(&lower, "trimestre") {
        "quarter"
    } else if contains_term(&lower, "year") || contains_term(&lower, "anno") {
        "year"
    } else {
        "month"
    }
}

fn risk_level_from(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if contains_term(&lower, "high") || contains_term(&lower, "alto") {
        "high"
    } else if contains_term(&lower, "medium") || contains_term(&lower, "medio") {
        "medium"
    } else {
        "all"
    }
}

fn compare_to_from(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if contains_term(&lower, "regional") || contains_term(&lower, "region") {
        "regional"
    } else if contains_term(&lower, "similar") {
        "similar"
    } else {
        "national"
    }
}

// ============================================================================
// Handler
// ============================================================================

pub struct InstitutionHandler {
    backend: BackendClient,
}

impl InstitutionHandler {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    fn params(
        entities: &Entities,
        ctx: &HandlerContext,
        extra: (&'static str, &'static str),
    ) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(2);
        if let Some(id) = entities.institution_id.as_ref().or(ctx.institution_id.as_ref()) {
            params.push(("institution_id", id.clone()));
        }
        if !extra.1.is_empty() {
            params.push((extra.0, extra.1.to_string()));
        }
        params
    }

    async fn fetch_or_sample<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        sample: impl FnOnce() -> T,
    ) -> T {
        match self.backend.get(path, params).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(endpoint = path, error = %e, "Analytics fetch failed, using sample data");
                sample()
            }
        }
    }
}

#[async_trait]
impl InstitutionActions for InstitutionHandler {
    async fn search_analytics(
        &self,
        entities: &Entities,
        ctx: &HandlerContext,
        raw_message: &str,
    ) -> Result<ActionResult> {
        let period = period_from(raw_message);
        let params = Self::params(entities, ctx, ("period", period));
        let analytics = self
            .fetch_or_sample("/api/analytics/searches", &params, sample_search_analytics)
            .await;

        let skills = analytics
            .top_skills_searched
            .iter()
            .take(10)
            .map(|(skill, count)| {
                let marker = if *count > 50 { "📈" } else { "📊" };
                format!("{} **{}**: {} searches", marker, skill, count)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let locations = analytics
            .top_locations_searched
            .iter()
            .take(5)
            .map(|(location, count)| format!("📍 {}: {} searches", location, count))
            .collect::<Vec<_>>()
            .join("\n");
        let top_skill = analytics
            .top_skills_searched
            .first()
            .map(|(s, _)| s.as_str())
            .unwrap_or("various skills");

        Ok(ActionResult::ok(format!(
            "**📊 Search Analytics - Last {}**\n\n\
             **Overview:**\n\
             • Total searches: **{}**\n\
             • Unique companies: **{}**\n\
             • Your students viewed: **{}** times\n\
             • View-to-contact rate: **{:.1}%**\n\
             • Trend: {} {}\n\n\
             **🔥 Most Searched Skills:**\n{}\n\n\
             **📍 Top Locations:**\n{}\n\n\
             **💡 Insight:** Companies are increasingly searching for {}. \
             Consider highlighting students with these skills.",
            period,
            with_thousands(analytics.total_searches),
            analytics.unique_companies,
            analytics.your_students_viewed,
            analytics.conversion_rate * 100.0,
            trend_marker(&analytics.search_trend),
            title_case(&analytics.search_trend),
            skills,
            locations,
            top_skill
        ))
        .with_data(json!({ "analytics": analytics, "period": period }))
        .with_actions(&[
            ("Skill Gap Analysis", "skill_gaps"),
            ("Student Recommendations", "recommend_students"),
            ("Export Report", "export_analytics"),
        ]))
    }

    async fn skill_demand(
        &self,
        entities: &Entities,
        ctx: &HandlerContext,
        _raw_message: &str,
    ) -> Result<ActionResult> {
        let params = Self::params(entities, ctx, ("", ""));
        let demand = self
            .fetch_or_sample("/api/analytics/skill-demand", &params, sample_skill_demand)
            .await;

        let gaps = demand
            .skill_gaps
            .iter()
            .take(5)
            .map(|gap| {
                format!(
                    "{} **{}**\n   Market demand: {}% | Your students: {}% | Gap: {}%",
                    gap.marker(),
                    gap.skill,
                    percent(gap.market_demand),
                    percent(gap.student_supply),
                    percent(gap.gap())
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let strengths = demand.strengths.iter().take(5).map(|s| format!("✅ {}", s)).collect::<Vec<_>>();
        let recommendations = demand
            .recommendations
            .iter()
            .take(4)
            .map(|r| format!("• {}", r))
            .collect::<Vec<_>>();

        Ok(ActionResult::ok(format!(
            "**📊 Skill Demand Analysis**\n\n\
             **🎯 Biggest Skill Gaps:**\n{}\n\n\
             **💪 Your Strengths:**\n{}\n\n\
             **💡 Recommendations:**\n{}\n\n\
             These insights can help align curriculum with market needs.",
            gaps,
            strengths.join("\n"),
            recommendations.join("\n")
        ))
        .with_data(serde_json::to_value(&demand)?)
        .with_actions(&[
            ("Detailed Report", "detailed_gaps"),
            ("Student Training", "training_suggestions"),
            ("Compare to Market", "market_comparison"),
        ]))
    }

    async fn at_risk_students(
        &self,
        entities: &Entities,
        ctx: &HandlerContext,
        raw_message: &str,
    ) -> Result<ActionResult> {
        let risk_level = risk_level_from(raw_message);
        let params = Self::params(entities, ctx, ("risk_level", risk_level));
        let students: Vec<StudentRisk> = match self
            .backend
            .get_list("/api/analytics/at-risk-students", "students", &params)
            .await
        {
            Ok(students) => students,
            Err(e) => {
                tracing::warn!(error = %e, "At-risk fetch failed, using sample data");
                sample_at_risk()
                    .into_iter()
                    .filter(|s| risk_level == "all" || s.risk_level == risk_level)
                    .collect()
            }
        };

        if students.is_empty() {
            return Ok(ActionResult::ok(
                "**✅ Great news!**\n\n\
                 No students are currently flagged as high-risk. \
                 Your students are actively engaged with the platform.\n\n\
                 **Keep up the good work by:**\n\
                 • Encouraging project uploads\n\
                 • Reminding students to complete profiles\n\
                 • Sharing job opportunities",
            )
            .with_data(json!({ "at_risk_count": 0 }))
            .with_actions(&[("View All Students", "view_students"), ("Send Encouragement", "bulk_message")]));
        }

        let high: Vec<&StudentRisk> = students.iter().filter(|s| s.risk_level == "high").collect();
        let medium_count = students.iter().filter(|s| s.risk_level == "medium").count();
        let now = Utc::now();

        let high_text = if high.is_empty() {
            "None".to_string()
        } else {
            high.iter()
                .take(5)
                .map(|s| {
                    let idle = s
                        .last_activity
                        .map(|t| format!(" | Last active {} days ago", (now - t).num_days()))
                        .unwrap_or_default();
                    format!(
                        "🔴 **{}**\n   Profile: {}% | Applications: {}{}\n   Issues: {}",
                        s.name,
                        percent(s.profile_completeness),
                        s.job_applications,
                        idle,
                        s.risk_factors.iter().take(2).cloned().collect::<Vec<_>>().join(", ")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        Ok(ActionResult::ok(format!(
            "**⚠️ At-Risk Students Report**\n\n\
             **Summary:**\n\
             • 🔴 High risk: **{}** students\n\
             • 🟡 Medium risk: **{}** students\n\
             • Total needing attention: **{}**\n\n\
             **🔴 High Risk Students:**\n{}\n\n\
             **Common Risk Factors:**\n\
             • Incomplete profiles (< 50%)\n\
             • No job applications in 30+ days\n\
             • Missing projects\n\
             • No recent activity\n\n\
             **Recommended Actions:**\n\
             • Send personalized outreach\n\
             • Offer profile completion workshop\n\
             • Connect with career counselor",
            high.len(),
            medium_count,
            students.len(),
            high_text
        ))
        .with_data(json!({
            "at_risk_count": students.len(),
            "high_risk": high.iter().take(10).collect::<Vec<_>>(),
            "medium_risk_count": medium_count,
        }))
        .with_actions(&[
            ("Contact High Risk", "contact_high_risk"),
            ("Schedule Workshop", "schedule_workshop"),
            ("Export List", "export_at_risk"),
        ]))
    }

    async fn company_interest(
        &self,
        entities: &Entities,
        ctx: &HandlerContext,
        raw_message: &str,
    ) -> Result<ActionResult> {
        let period = period_from(raw_message);
        let params = Self::params(entities, ctx, ("period", period));
        let interest = self
            .fetch_or_sample("/api/analytics/company-interest", &params, sample_company_interest)
            .await;

        let companies = interest
            .top_companies
            .iter()
            .take(8)
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "**{}. {}** ({})\n   👁️ {} profile views | 💬 {} messages sent",
                    i + 1,
                    if c.name.is_empty() { "Company" } else { c.name.as_str() },
                    if c.industry.is_empty() { "Tech" } else { c.industry.as_str() },
                    c.student_views,
                    c.messages_sent
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut industries: Vec<(&String, &f32)> = interest.industry_breakdown.iter().collect();
        industries.sort_by(|a, b| b.1.total_cmp(a.1));
        let industries = industries
            .iter()
            .take(5)
            .map(|(name, share)| format!("• {}: {}%", name, percent(**share)))
            .collect::<Vec<_>>()
            .join("\n");

        let trend = if interest.trend.is_empty() { "stable" } else { interest.trend.as_str() };

        Ok(ActionResult::ok(format!(
            "**🏢 Company Interest Report - Last {}**\n\n\
             **Overview:**\n\
             • Companies viewing your students: **{}**\n\
             • Total student views: **{}**\n\
             • Messages to students: **{}**\n\
             • Trend: {} {}\n\n\
             **🏆 Most Active Companies:**\n{}\n\n\
             **📊 Industry Breakdown:**\n{}\n\n\
             **💡 Opportunity:** Consider reaching out to top companies for career days or partnerships.",
            period,
            interest.unique_companies,
            with_thousands(interest.total_views),
            interest.total_messages,
            trend_marker(trend),
            title_case(trend),
            companies,
            industries
        ))
        .with_data(serde_json::to_value(&interest)?)
        .with_actions(&[
            ("Contact Top Companies", "contact_companies"),
            ("Schedule Career Day", "career_day"),
            ("View All Companies", "all_companies"),
        ]))
    }

    async fn benchmark(&self, entities: &Entities, ctx: &HandlerContext, raw_message: &str) -> Result<ActionResult> {
        let compare_to = compare_to_from(raw_message);
        let params = Self::params(entities, ctx, ("compare_to", compare_to));
        let benchmark = self
            .fetch_or_sample("/api/analytics/benchmark", &params, sample_benchmark)
            .await;

        let metrics = benchmark
            .metrics
            .iter()
            .map(|(name, m)| {
                let diff = m.your_value - m.average;
                let marker = if diff > 0.0 {
                    "✅"
                } else if diff < -10.0 {
                    "⚠️"
                } else {
                    "➡️"
                };
                let diff_text = if diff > 0.0 { format!("+{:.0}", diff) } else { format!("{:.0}", diff) };
                format!(
                    "{} **{}**\n   You: {:.0}% | Average: {:.0}% | {}%",
                    marker,
                    title_case(name),
                    m.your_value,
                    m.average,
                    diff_text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let strengths = benchmark.strengths.iter().take(3).map(|s| format!("✅ {}", s)).collect::<Vec<_>>();
        let improvements = benchmark
            .improvements
            .iter()
            .take(3)
            .map(|s| format!("⚠️ {}", s))
            .collect::<Vec<_>>();
        let focus = benchmark
            .improvements
            .first()
            .map(|s| s.as_str())
            .unwrap_or("overall engagement");

        Ok(ActionResult::ok(format!(
            "**📊 Benchmark Comparison - {} Average**\n\n\
             **Your Ranking:** #{} of {} institutions\n\n\
             **Key Metrics:**\n{}\n\n\
             **💪 Your Strengths:**\n{}\n\n\
             **📈 Areas to Improve:**\n{}\n\n\
             **💡 Recommendation:** Focus on improving {} to move up in rankings.",
            title_case(compare_to),
            benchmark.ranking.position,
            benchmark.ranking.total,
            metrics,
            strengths.join("\n"),
            improvements.join("\n"),
            focus
        ))
        .with_data(serde_json::to_value(&benchmark)?)
        .with_actions(&[
            ("Detailed Breakdown", "detailed_benchmark"),
            ("Improvement Plan", "improvement_plan"),
            ("Compare Similar Schools", "similar_comparison"),
        ]))
    }

    async fn partnership_info(
        &self,
        _entities: &Entities,
        _ctx: &HandlerContext,
        _raw_message: &str,
    ) -> Result<ActionResult> {
        Ok(ActionResult::ok(
            "**🤝 InTransparency Partnership Program**\n\n\
             **Free Tier (You're here!):**\n\
             • Basic analytics dashboard\n\
             • Student profile visibility\n\
             • Company interest tracking\n\
             • Monthly reports\n\n\
             **Premium Features:**\n\
             • 📊 Advanced analytics & benchmarking\n\
             • 🎯 At-risk student identification\n\
             • 🏢 Company partnership management\n\
             • 📧 Bulk communication tools\n\
             • 🔗 Embeddable widget for your website\n\
             • 📈 Custom reporting\n\
             • 👥 Priority support\n\n\
             **Cost Comparison:**\n\
             • InTransparency: Starting at €99/month\n\
             • vs AlmaLaurea: ~€2,500/year\n\
             • **Save 50%+** while getting more features!\n\n\
             Would you like to explore premium features?",
        )
        .with_data(json!({
            "current_tier": "free",
            "premium_price": 99,
            "comparison_savings": "50%+",
        }))
        .with_actions(&[
            ("Upgrade to Premium", "upgrade"),
            ("Schedule Demo", "demo"),
            ("View Current Features", "features"),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::backend::testing::{client, serve, unreachable};

    fn ctx() -> HandlerContext {
        HandlerContext {
            institution_id: Some("inst_42".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(with_thousands(2847), "2,847");
        assert_eq!(with_thousands(999), "999");
        assert_eq!(with_thousands(1_234_567), "1,234,567");
        assert_eq!(title_case("projects_per_student"), "Projects Per Student");
        assert_eq!(period_from("searches this week"), "week");
        assert_eq!(period_from("what are companies looking for"), "month");
        assert_eq!(risk_level_from("show high risk students"), "high");
        assert_eq!(compare_to_from("compare with similar schools"), "similar");
    }

    #[test]
    fn test_skill_gap_markers() {
        let gap = |d, s| SkillGap {
            skill: "x".into(),
            market_demand: d,
            student_supply: s,
        };
        assert_eq!(gap(0.85, 0.35).marker(), "🔴");
        assert_eq!(gap(0.80, 0.55).marker(), "🟡");
        assert_eq!(gap(0.50, 0.40).marker(), "🟢");
    }

    #[test]
    fn test_params_prefer_entity_institution() {
        let mut entities = Entities::default();
        assert_eq!(
            InstitutionHandler::params(&entities, &ctx(), ("period", "month")),
            vec![("institution_id", "inst_42".to_string()), ("period", "month".to_string())]
        );
        entities.institution_id = Some("inst_7".into());
        assert_eq!(
            InstitutionHandler::params(&entities, &HandlerContext::default(), ("", "")),
            vec![("institution_id", "inst_7".to_string())]
        );
    }

    #[tokio::test]
    async fn test_search_analytics_sample_fallback() {
        let result = InstitutionHandler::new(unreachable())
            .search_analytics(&Entities::default(), &ctx(), "what are companies searching for")
            .await
            .unwrap();
        assert!(result.message.contains("Total searches: **2,847**"));
        assert!(result.message.contains("📈 **Python**: 342 searches"));
        assert!(result.message.contains("View-to-contact rate: **12.0%**"));
        assert!(result.message.contains("searching for Python."));
    }

    #[tokio::test]
    async fn test_search_analytics_from_backend() {
        let url = serve(
            200,
            r#"{"total_searches":12,"unique_companies":3,"top_skills_searched":[["Rust",7]],"search_trend":"decreasing"}"#,
            1,
        )
        .await;
        let result = InstitutionHandler::new(client(&url))
            .search_analytics(&Entities::default(), &ctx(), "searches")
            .await
            .unwrap();
        assert!(result.message.contains("Total searches: **12**"));
        assert!(result.message.contains("📊 **Rust**: 7 searches"));
        assert!(result.message.contains("📉 Decreasing"));
    }

    #[tokio::test]
    async fn test_skill_demand_lists_gaps() {
        let result = InstitutionHandler::new(unreachable())
            .skill_demand(&Entities::default(), &ctx(), "skill gaps")
            .await
            .unwrap();
        assert!(result.message.contains("🔴 **Cloud Computing (AWS/Azure)**"));
        assert!(result.message.contains("🟡 **React/Modern Frontend**"));
        assert!(result.message.contains("Gap: 50%"));
    }

    #[tokio::test]
    async fn test_at_risk_counts_and_filter() {
        let handler = InstitutionHandler::new(unreachable());
        let all = handler
            .at_risk_students(&Entities::default(), &ctx(), "at-risk students")
            .await
            .unwrap();
        assert!(all.message.contains("High risk: **2** students"));
        assert!(all.message.contains("Medium risk: **1** students"));
        assert!(all.message.contains("Last active 45 days ago"));

        let high = handler
            .at_risk_students(&Entities::default(), &ctx(), "only high risk")
            .await
            .unwrap();
        assert_eq!(high.data.unwrap()["at_risk_count"], 2);
    }

    #[tokio::test]
    async fn test_at_risk_empty_is_good_news() {
        let url = serve(200, r#"{"students":[]}"#, 1).await;
        let result = InstitutionHandler::new(client(&url))
            .at_risk_students(&Entities::default(), &ctx(), "at risk")
            .await
            .unwrap();
        assert!(result.message.contains("Great news"));
    }

    #[tokio::test]
    async fn test_company_interest_and_benchmark() {
        let handler = InstitutionHandler::new(unreachable());
        let interest = handler
            .company_interest(&Entities::default(), &ctx(), "company trends")
            .await
            .unwrap();
        assert!(interest.message.contains("**1. Accenture** (Consulting)"));
        assert!(interest.message.contains("Total student views: **1,247**"));
        assert!(interest.message.contains("• Tech: 35%"));

        let benchmark = handler
            .benchmark(&Entities::default(), &ctx(), "benchmark vs national")
            .await
            .unwrap();
        assert!(benchmark.message.contains("#12 of 85 institutions"));
        assert!(benchmark.message.contains("✅ **Profile Completion**"));
        assert!(benchmark.message.contains("➡️ **Company Engagement**"));
        assert!(benchmark.message.contains("Focus on improving Company engagement could improve"));
    }

    #[tokio::test]
    async fn test_partnership_info_is_fixed() {
        let result = InstitutionHandler::new(unreachable())
            .partnership_info(&Entities::default(), &HandlerContext::default(), "")
            .await
            .unwrap();
        assert!(result.message.contains("€99/month"));
        assert_eq!(result.data.unwrap()["premium_price"], 99);
    }
}
