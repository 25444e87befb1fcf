//! Student handlers: job search, skill analysis, profile review, career and education guidance.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{ActionResult, BackendClient, HandlerContext, StudentActions};
use crate::entities::{Entities, ExperienceLevel};
use crate::scorers::MarketAnalyzer;

const JOB_FETCH_LIMIT: usize = 10;
const JOBS_SHOWN: usize = 5;
const DEFAULT_SKILLS: [&str; 3] = ["python", "javascript", "react"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPosting {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary_range: String,
    pub match_score: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentProfile {
    pub projects: Vec<Value>,
    pub skills: Vec<String>,
    pub bio: Option<String>,
    pub education: Option<Value>,
    pub photo_url: Option<String>,
    pub location: Option<String>,
}

/// (section, weight, suggestion when missing)
const PROFILE_SECTIONS: [(&str, u32, &str); 6] = [
    ("projects", 30, "📁 Add projects to showcase your work"),
    ("skills", 20, "🛠️ Add your technical skills"),
    ("bio", 15, "📝 Write a compelling bio"),
    ("education", 15, "🎓 Add your education details"),
    ("photo", 10, "📸 Add a professional photo"),
    ("location", 10, "📍 Add your location for better job matches"),
];

impl StudentProfile {
    fn has(&self, section: &str) -> bool {
        let filled = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        match section {
            "projects" => !self.projects.is_empty(),
            "skills" => !self.skills.is_empty(),
            "bio" => filled(&self.bio),
            "education" => self.education.as_ref().is_some_and(|e| !e.is_null()),
            "photo" => filled(&self.photo_url),
            "location" => filled(&self.location),
            _ => false,
        }
    }

    /// Completeness score out of 100 and the suggestions for what is missing.
    pub fn completeness(&self) -> (u32, Vec<&'static str>) {
        let mut score = 0;
        let mut missing = Vec::new();
        for (section, weight, suggestion) in PROFILE_SECTIONS {
            if self.has(section) {
                score += weight;
            } else {
                missing.push(suggestion);
            }
        }
        (score, missing)
    }
}

fn profile_tier(score: u32) -> (&'static str, &'static str) {
    match score {
        80.. => ("excellent", "🌟"),
        60..=79 => ("good", "👍"),
        40..=59 => ("improving", "💪"),
        _ => ("needs work", "🚀"),
    }
}

fn sample_jobs(location: Option<&str>) -> Vec<JobPosting> {
    let location = location.unwrap_or("Milan").to_string();
    vec![
        JobPosting {
            id: "1".into(),
            title: "Junior Software Developer".into(),
            company: "TechCorp".into(),
            location: location.clone(),
            salary_range: "€30,000 - €40,000".into(),
            match_score: Some(92),
        },
        JobPosting {
            id: "2".into(),
            title: "Frontend Developer Intern".into(),
            company: "StartupXYZ".into(),
            location,
            salary_range: "€800/month".into(),
            match_score: Some(88),
        },
    ]
}

const FIELD_ROLES: &[(&str, [&str; 3])] = &[
    ("computer science", ["Software Developer", "Data Engineer", "DevOps Engineer"]),
    ("informatica", ["Software Developer", "Data Engineer", "DevOps Engineer"]),
    ("tech", ["Software Developer", "Data Engineer", "DevOps Engineer"]),
    ("engineering", ["Software Engineer", "Systems Engineer", "Product Manager"]),
    ("ingegneria", ["Software Engineer", "Systems Engineer", "Product Manager"]),
    ("business", ["Business Analyst", "Product Manager", "Marketing Manager"]),
    ("economia", ["Business Analyst", "Financial Analyst", "Consultant"]),
    ("economics", ["Financial Analyst", "Data Analyst", "Consultant"]),
    ("marketing", ["Marketing Manager", "Digital Marketing Specialist", "Content Manager"]),
    ("design", ["UX Designer", "Product Designer", "Creative Director"]),
    ("data", ["Data Scientist", "ML Engineer", "Data Analyst"]),
    ("law", ["Legal Analyst", "Compliance Officer", "Contract Manager"]),
    ("giurisprudenza", ["Legal Analyst", "Compliance Officer", "Contract Manager"]),
];

fn roles_for_field(field: &str) -> Vec<String> {
    let lower = field.to_lowercase();
    FIELD_ROLES
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, roles)| roles.to_vec())
        .unwrap_or_else(|| vec!["Analyst", "Consultant", "Project Manager"])
        .into_iter()
        .map(String::from)
        .collect()
}

fn unrecognized_str<'a>(entities: &'a Entities, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| entities.unrecognized.get(*k))
        .find_map(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

pub struct StudentHandler {
    backend: BackendClient,
    analyzer: Arc<dyn MarketAnalyzer>,
}

impl StudentHandler {
    pub fn new(backend: BackendClient, analyzer: Arc<dyn MarketAnalyzer>) -> Self {
        Self { backend, analyzer }
    }

    async fn fetch_jobs(&self, params: &[(&str, String)], location: Option<&str>) -> Vec<JobPosting> {
        match self.backend.get_list("/api/jobs", "jobs", params).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::warn!(error = %e, "Job fetch failed, using sample jobs");
                sample_jobs(location)
            }
        }
    }

    async fn fetch_profile(&self, user_id: &str) -> Option<StudentProfile> {
        match self.backend.get(&format!("/api/students/{}", user_id), &[]).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Profile fetch failed");
                None
            }
        }
    }
}

#[async_trait]
impl StudentActions for StudentHandler {
    async fn job_search(&self, entities: &Entities, ctx: &HandlerContext) -> Result<ActionResult> {
        let resolved = ctx.resolve(entities);
        let location = resolved.location.as_deref();
        let skills: Vec<String> = resolved.skills.iter().cloned().collect();

        let mut params = vec![("limit", JOB_FETCH_LIMIT.to_string())];
        if !skills.is_empty() {
            params.push(("skills", skills.join(",")));
        }
        if let Some(loc) = location {
            params.push(("location", loc.to_string()));
        }

        let jobs = self.fetch_jobs(&params, location).await;
        let location_text = location.map(|l| format!(" in {}", l)).unwrap_or_default();

        if jobs.is_empty() {
            let skills_text = if skills.is_empty() {
                String::new()
            } else {
                format!(" matching {}", skills.join(", "))
            };
            return Ok(ActionResult::ok(format!(
                "I searched for jobs{}{}, but didn't find exact matches right now.\n\n\
                 **Suggestions:**\n\
                 • Broaden your search criteria\n\
                 • Check back soon - new jobs are posted daily\n\
                 • Set up job alerts for your preferences\n\n\
                 Would you like me to help you set up job alerts or explore different criteria?",
                location_text, skills_text
            ))
            .with_data(json!({ "jobs_count": 0 }))
            .with_actions(&[
                ("Set Job Alerts", "set_alerts"),
                ("Broaden Search", "broaden_search"),
                ("View All Jobs", "view_all_jobs"),
            ]));
        }

        let summaries = jobs
            .iter()
            .take(JOBS_SHOWN)
            .enumerate()
            .map(|(i, job)| {
                format!(
                    "**{}** at {}\n   📍 {} | 💰 {} | 🎯 {}% match",
                    job.title,
                    job.company,
                    if job.location.is_empty() { "Location TBD" } else { job.location.as_str() },
                    if job.salary_range.is_empty() { "Competitive" } else { job.salary_range.as_str() },
                    job.match_score.unwrap_or(85 + i as u8)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let shown: Vec<&JobPosting> = jobs.iter().take(JOBS_SHOWN).collect();
        Ok(ActionResult::ok(format!(
            "I found **{} jobs**{} that might interest you:\n\n{}\n\n\
             These are ranked by how well they match your profile. \
             Would you like more details on any of these positions?",
            jobs.len(),
            location_text,
            summaries
        ))
        .with_data(json!({
            "jobs_count": jobs.len(),
            "jobs": shown,
            "search_params": params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<std::collections::BTreeMap<_, _>>(),
        }))
        .with_actions(&[
            ("View More Jobs", "view_more_jobs"),
            ("Refine Search", "refine_search"),
            ("Apply to Top Match", "apply_top"),
        ]))
    }

    async fn skill_analysis(&self, entities: &Entities, ctx: &HandlerContext) -> Result<ActionResult> {
        let resolved = ctx.resolve(entities);
        let technologies: Vec<String> = if resolved.skills.is_empty() {
            DEFAULT_SKILLS.iter().map(|s| s.to_string()).collect()
        } else {
            resolved.skills.iter().take(10).cloned().collect()
        };

        let market = self.analyzer.analyze_market_trends(&technologies, "1_year").await?;

        let insights = market
            .trends
            .iter()
            .take(5)
            .map(|t| {
                let emoji = if t.direction.is_hot() {
                    "📈"
                } else if t.direction == crate::scorers::TrendDirection::Stable {
                    "📊"
                } else {
                    "📉"
                };
                format!(
                    "{} **{}**: {} ({:.0}% growth, {:.0}% demand)",
                    emoji,
                    t.technology,
                    t.direction.as_str(),
                    t.growth_rate,
                    t.demand_score * 100.0
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let recommendations = market
            .recommendations
            .iter()
            .take(3)
            .map(|r| format!("• {}", r))
            .collect::<Vec<_>>()
            .join("\n");

        let mut message = format!("**📊 Skills Market Analysis**\n\n{}\n\n", insights);
        if !market.hot_technologies.is_empty() {
            message.push_str(&format!("**🔥 Hot:** {}\n", market.hot_technologies.join(", ")));
        }
        if !market.declining_technologies.is_empty() {
            message.push_str(&format!("**⚠️ Declining:** {}\n", market.declining_technologies.join(", ")));
        }
        if !recommendations.is_empty() {
            message.push_str(&format!("\n**🎯 Recommendations:**\n{}\n", recommendations));
        }
        message.push_str(&format!(
            "\n{}\n\nWant me to suggest skills to learn or analyze your skill gaps?",
            market.market_summary
        ));

        Ok(ActionResult::ok(message)
            .with_data(serde_json::to_value(&market)?)
            .with_actions(&[
                ("Skill Gap Analysis", "skill_gaps"),
                ("Learning Path", "learning_path"),
                ("Salary Insights", "salary_insights"),
            ]))
    }

    async fn profile_suggestions(&self, _entities: &Entities, ctx: &HandlerContext) -> Result<ActionResult> {
        let profile = match ctx.user_id.as_deref() {
            Some(user_id) => self.fetch_profile(user_id).await,
            None => None,
        };

        let Some(profile) = profile else {
            return Ok(ActionResult::ok(
                "I'd love to help you build a standout profile! Here's what makes profiles successful:\n\n\
                 **🌟 Profile Checklist:**\n\
                 1. **Projects** - Add 2-3 of your best works\n\
                 2. **Skills** - List technologies you know\n\
                 3. **Education** - Add your university and courses\n\
                 4. **Bio** - Write 2-3 compelling sentences\n\
                 5. **Photo** - Add a professional headshot\n\n\
                 Which area would you like to work on first?",
            )
            .with_actions(&[
                ("Add Project", "add_project"),
                ("Add Skills", "add_skills"),
                ("Write Bio", "write_bio"),
            ]));
        };

        let (score, missing) = profile.completeness();
        let (status, emoji) = profile_tier(score);
        let suggestions_text = if missing.is_empty() {
            "Your profile looks great!".to_string()
        } else {
            missing.iter().map(|s| format!("• {}", s)).collect::<Vec<_>>().join("\n")
        };

        Ok(ActionResult::ok(format!(
            "{} **Profile Score: {}%** ({})\n\n\
             **Suggestions to improve:**\n{}\n\n\
             A complete profile gets **3x more views** from recruiters!\n\n\
             What would you like to work on?",
            emoji, score, status, suggestions_text
        ))
        .with_data(json!({
            "score": score,
            "status": status,
            "suggestions": missing,
            "profile_sections": PROFILE_SECTIONS
                .iter()
                .map(|(section, ..)| (section.to_string(), profile.has(section)))
                .collect::<std::collections::BTreeMap<_, _>>(),
        }))
        .with_actions(&[
            ("Improve Profile", "improve_profile"),
            ("AI Profile Review", "ai_review"),
            ("View Public Profile", "view_profile"),
        ]))
    }

    async fn career_advice(&self, entities: &Entities, ctx: &HandlerContext) -> Result<ActionResult> {
        let resolved = ctx.resolve(entities);
        let field = unrecognized_str(&resolved, &["field", "major"])
            .map(str::to_string)
            .or_else(|| resolved.disciplines.iter().next().cloned());

        let Some(field) = field else {
            return Ok(ActionResult::ok(
                "I'd love to give you personalized career advice! Tell me more about:\n\n\
                 • **Your field** - What did you study or what interests you?\n\
                 • **Your goals** - What kind of role are you aiming for?\n\
                 • **Your timeline** - Are you graduating soon or exploring options?\n\n\
                 For example, you can ask:\n\
                 • 'Career advice for Computer Science graduates'\n\
                 • 'How to become a Data Scientist'\n\
                 • 'Best entry-level jobs in Marketing'",
            )
            .with_actions(&[
                ("Tech Careers", "career_tech"),
                ("Business Careers", "career_business"),
                ("Design Careers", "career_design"),
            ]));
        };

        let roles = roles_for_field(&field);
        let level = resolved.experience_level.or(Some(ExperienceLevel::Junior));
        let market = self.analyzer.analyze_job_market(&roles, level).await?;

        let paths = market
            .insights
            .iter()
            .take(3)
            .map(|i| {
                format!(
                    "**{}**\n   💼 Demand: {}\n   💰 Salary: €{} - €{}\n   📈 Growth: {:.0}%/year\n   🛠️ Key Skills: {}",
                    i.role_title,
                    if i.demand_level > 0.7 { "High" } else { "Moderate" },
                    i.salary_range.min,
                    i.salary_range.max,
                    i.growth_projection,
                    i.required_skills.iter().take(4).cloned().collect::<Vec<_>>().join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ActionResult::ok(format!(
            "**Career Paths for {}:**\n\n{}\n\n\
             **💡 My Advice:**\n\
             1. Build projects that showcase relevant skills\n\
             2. Network through LinkedIn and events\n\
             3. Consider internships for experience\n\
             4. Learn emerging skills in your field\n\n\
             Want me to dive deeper into any of these paths?",
            field, paths
        ))
        .with_data(serde_json::to_value(&market)?)
        .with_actions(&[
            ("Skill Roadmap", "skill_roadmap"),
            ("Find Mentors", "find_mentors"),
            ("View Related Jobs", "related_jobs"),
        ]))
    }

    async fn education_info(&self, entities: &Entities, ctx: &HandlerContext) -> Result<ActionResult> {
        let resolved = ctx.resolve(entities);
        let education_type = unrecognized_str(&resolved, &["education_type"])
            .unwrap_or_default()
            .to_lowercase();

        let asks_its = education_type.contains("its")
            || education_type.contains("istituto tecnico")
            || resolved.universities.contains("ITS");
        let asks_master = education_type.contains("master") || education_type.contains("magistrale");

        if asks_its {
            return Ok(ActionResult::ok(
                "**📚 ITS (Istituti Tecnici Superiori)**\n\n\
                 ITS are post-diploma courses that provide specialized technical training.\n\n\
                 **Key Facts:**\n\
                 • Duration: 2 years (1800-2000 hours)\n\
                 • 30% internship with companies\n\
                 • 80%+ employment rate\n\
                 • Free or low-cost (regional funding)\n\n\
                 **Popular ITS Areas:**\n\
                 • ICT & Digital Technologies\n\
                 • Mechatronics & Industry 4.0\n\
                 • Tourism & Cultural Heritage\n\
                 • Agri-food & Sustainability\n\n\
                 Want me to help you find ITS programs in your area?",
            )
            .with_actions(&[
                ("Find ITS Programs", "find_its"),
                ("ITS vs University", "its_comparison"),
                ("Job Outcomes", "its_outcomes"),
            ]));
        }

        if asks_master {
            return Ok(ActionResult::ok(
                "**🎓 Master's Degree (Laurea Magistrale)**\n\n\
                 A Master's degree deepens your expertise and opens senior roles.\n\n\
                 **Types of Master's:**\n\
                 • **Laurea Magistrale** (2 years) - Academic path\n\
                 • **Master Universitario** (1 year) - Professional focus\n\
                 • **MBA** - Business leadership\n\n\
                 ✅ **Consider if** you want research roles, your field requires it, or you want to specialize deeply.\n\
                 ⚠️ **Maybe skip if** you want to start working immediately or your field values experience over degrees.\n\n\
                 What field are you considering for your Master's?",
            )
            .with_actions(&[
                ("Master's in Tech", "masters_tech"),
                ("Master's in Business", "masters_business"),
                ("Work vs Study", "work_vs_study"),
            ]));
        }

        Ok(ActionResult::ok(
            "**🎓 Education Pathways**\n\n\
             I can help you explore different educational options:\n\n\
             **After High School/Diploma:**\n\
             • **ITS** - 2-year technical programs (high employment)\n\
             • **Laurea Triennale** - 3-year bachelor's degree\n\n\
             **After Bachelor's:**\n\
             • **Laurea Magistrale** - 2-year master's\n\
             • **Master Professionale** - 1-year specialized\n\
             • **Work + Learning** - Entry-level job + courses\n\n\
             What would you like to know more about?",
        )
        .with_actions(&[
            ("ITS Programs", "its_info"),
            ("Master's Degrees", "masters_info"),
            ("Online Courses", "online_courses"),
        ]))
    }
}
