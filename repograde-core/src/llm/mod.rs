//! Enrichment of a combination result with a role classification and
//! narrative from a text-generation service.

use std::fmt::Write as _;

use tracing::{debug, info};

use crate::error::LlmError;
use crate::types::{CombinationResult, Enrichment};

mod openai;

pub use openai::{create_chat_model, OpenAiChat};

/// Seam to a chat-completion provider.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;
    fn model_id(&self) -> &str;

    /// Send one system + user message pair, return the raw completion
    /// text.
    async fn complete(&self, system: &str, user: &str) -> crate::error::Result<String>;
}

/// The instructions travel as the system message; the user message
/// carries only analysis data.
pub const SYSTEM_PROMPT: &str = "\
You are a senior engineering recruiter reviewing the static-analysis \
results of a developer's repository portfolio. Based on the data the \
user provides, classify the developer's primary role and write a short \
assessment.

Respond with ONLY a JSON object, no prose and no code fences, with \
exactly these fields:
{
  \"primary_role\": \"<one of: Backend Developer, Frontend Developer, \
Full-Stack Developer, Mobile Developer, Data Engineer, DevOps Engineer>\",
  \"role_scores\": <integer 0-100, confidence in the role fit>,
  \"ai_analysis\": {
    \"analysis_summary\": [\"<2-4 short observations>\"],
    \"improvement_suggestions\": [\"<2-4 short suggestions>\"]
  }
}";

/// Runs the enrichment stage: prompt construction, one provider call,
/// strict response parsing.
pub struct Enricher {
    model: Box<dyn ChatModel>,
}

impl Enricher {
    pub fn new(model: Box<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Enrich an already-scored combination result. A response that
    /// does not parse into the expected shape is an error; there is no
    /// repair or retry here.
    pub async fn enrich(&self, result: &CombinationResult) -> crate::error::Result<Enrichment> {
        let prompt = build_prompt(result);
        debug!(
            provider = self.model.name(),
            model = self.model.model_id(),
            prompt_chars = prompt.len(),
            "Requesting enrichment"
        );

        let response = self.model.complete(SYSTEM_PROMPT, &prompt).await?;
        let enrichment = parse_enrichment(&response)?;
        info!(role = %enrichment.primary_role, "Enrichment complete");
        Ok(enrichment)
    }
}

fn build_prompt(result: &CombinationResult) -> String {
    let mut prompt = String::from("Analysis data:\n");
    let _ = writeln!(prompt, "Overall score: {}/100", result.overall_score);

    let languages: Vec<String> = result
        .language_ratios
        .iter()
        .map(|(language, ratio)| format!("{language} {ratio:.1}%"))
        .collect();
    let _ = writeln!(prompt, "Language distribution: {}", languages.join(", "));

    let _ = writeln!(
        prompt,
        "Activity: {} stars, {} commits, {} pull requests, {} issues",
        result.activity.total_stars,
        result.activity.total_commits,
        result.activity.total_prs,
        result.activity.total_issues
    );

    for (repo, repo_result) in result.repositories.iter().zip(&result.repo_results) {
        let _ = writeln!(
            prompt,
            "Repository {}: score {}/100, {:.2} commits/day",
            repo.full_name, repo_result.score, repo_result.commit_frequency
        );
        for (metric, value) in &repo_result.project_measures {
            let _ = writeln!(prompt, "  {metric}: {value}");
        }
    }
    prompt
}

/// Parse the completion into the enrichment shape. Code fences are
/// tolerated; any other deviation fails.
fn parse_enrichment(response: &str) -> Result<Enrichment, LlmError> {
    let trimmed = response.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();

    serde_json::from_str(trimmed).map_err(|e| LlmError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityMetrics, UserId};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn result_fixture() -> CombinationResult {
        let mut ratios = BTreeMap::new();
        ratios.insert("java".to_string(), 80.0);
        ratios.insert("xml".to_string(), 20.0);
        CombinationResult {
            id: "r1".into(),
            user_id: UserId(1),
            selection_id: "s1".into(),
            analyzed_at: Utc::now(),
            repositories: vec![],
            language_ratios: ratios,
            repo_results: vec![],
            overall_score: 87,
            activity: ActivityMetrics {
                total_stars: 15,
                total_commits: 100,
                total_prs: 5,
                total_issues: 8,
            },
            enrichment: None,
        }
    }

    #[test]
    fn prompt_carries_scores_and_activity() {
        let prompt = build_prompt(&result_fixture());
        assert!(prompt.contains("Overall score: 87/100"));
        assert!(prompt.contains("java 80.0%"));
        assert!(prompt.contains("100 commits"));
    }

    #[test]
    fn instructions_stay_out_of_the_user_prompt() {
        let prompt = build_prompt(&result_fixture());
        assert!(!prompt.contains("ONLY a JSON object"));
        assert!(!prompt.contains("recruiter"));
        assert!(SYSTEM_PROMPT.contains("ONLY a JSON object"));
    }

    #[test]
    fn parses_bare_json() {
        let response = r#"{
            "primary_role": "Backend Developer",
            "role_scores": 78,
            "ai_analysis": {
                "analysis_summary": ["good coverage"],
                "improvement_suggestions": ["fewer code smells"]
            }
        }"#;
        let enrichment = parse_enrichment(response).unwrap();
        assert_eq!(enrichment.primary_role, "Backend Developer");
        assert_eq!(enrichment.role_scores, 78);
    }

    #[test]
    fn tolerates_code_fences_only() {
        let fenced = "```json\n{\"primary_role\":\"Data Engineer\",\"role_scores\":60,\
                      \"ai_analysis\":{\"analysis_summary\":[],\"improvement_suggestions\":[]}}\n```";
        assert!(parse_enrichment(fenced).is_ok());

        let prose = "Sure! Here is the analysis: {\"primary_role\": \"x\"}";
        assert!(parse_enrichment(prose).is_err());
    }

    #[test]
    fn missing_fields_fail_strict_parse() {
        let missing = r#"{"primary_role": "Backend Developer", "role_scores": 70}"#;
        assert!(parse_enrichment(missing).is_err());
    }
}
