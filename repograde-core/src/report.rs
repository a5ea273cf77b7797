//! Presentation of stored results: letter grades and status messages.

use std::fmt::Write as _;

use crate::types::{AnalysisState, CombinationResult};

/// Letter grade for a 0–100 score. Bands are exclusive at the lower
/// edge: exactly 90 is an A, not an A+.
pub fn grade_letter(score: i64) -> &'static str {
    if score > 90 {
        "A+"
    } else if score > 80 {
        "A"
    } else if score > 70 {
        "B+"
    } else if score > 60 {
        "B"
    } else if score > 50 {
        "C+"
    } else if score > 40 {
        "C"
    } else {
        "D"
    }
}

/// Human-readable line for an analysis state.
pub fn state_message(state: AnalysisState) -> &'static str {
    match state {
        AnalysisState::Pending => "Analysis has not started yet",
        AnalysisState::Analyzing => "Analysis is in progress",
        AnalysisState::Complete => "Analysis is complete",
        AnalysisState::Fail => "Analysis failed",
    }
}

/// Render a result document for terminal display.
pub fn render_result(result: &CombinationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Combination {} — analyzed {}",
        result.selection_id,
        result.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "Overall: {}/100 ({})",
        result.overall_score,
        grade_letter(result.overall_score)
    );

    if !result.language_ratios.is_empty() {
        let languages: Vec<String> = result
            .language_ratios
            .iter()
            .map(|(language, ratio)| format!("{language} {ratio:.1}%"))
            .collect();
        let _ = writeln!(out, "Languages: {}", languages.join(", "));
    }

    let _ = writeln!(
        out,
        "Activity: {} stars, {} commits, {} PRs, {} issues",
        result.activity.total_stars,
        result.activity.total_commits,
        result.activity.total_prs,
        result.activity.total_issues
    );

    for (repo, repo_result) in result.repositories.iter().zip(&result.repo_results) {
        let _ = writeln!(
            out,
            "  {} — {}/100 ({}), {:.2} commits/day",
            repo.full_name,
            repo_result.score,
            grade_letter(repo_result.score),
            repo_result.commit_frequency
        );
    }

    if let Some(enrichment) = &result.enrichment {
        let _ = writeln!(
            out,
            "Role: {} (confidence {})",
            enrichment.primary_role, enrichment.role_scores
        );
        for line in &enrichment.ai_analysis.analysis_summary {
            let _ = writeln!(out, "  • {line}");
        }
        if !enrichment.ai_analysis.improvement_suggestions.is_empty() {
            let _ = writeln!(out, "Suggestions:");
            for line in &enrichment.ai_analysis.improvement_suggestions {
                let _ = writeln!(out, "  • {line}");
            }
        }
    }
    out
}
