//! Selection-level aggregation: pure folds over per-repository results.
//!
//! Nothing here touches the store or the network, so every derived
//! number is reproducible from the inputs alone.

use std::collections::BTreeMap;

use crate::types::{ActivityMetrics, CommitRecord, RepoResult};

/// Integer mean of per-repository scores. An empty selection scores 0
/// rather than dividing by zero.
#[allow(clippy::cast_possible_wrap)]
pub fn overall_score(results: &[RepoResult]) -> i64 {
    if results.is_empty() {
        return 0;
    }
    let sum: i64 = results.iter().map(|r| r.score).sum();
    sum / results.len() as i64
}

/// Merge per-repository language line counts into one map.
pub fn merged_language_lines(results: &[RepoResult]) -> BTreeMap<String, i64> {
    let mut merged: BTreeMap<String, i64> = BTreeMap::new();
    for result in results {
        for (language, lines) in &result.languages {
            *merged.entry(language.clone()).or_insert(0) += lines;
        }
    }
    merged
}

/// Language line counts → percentage of total lines per language.
///
/// When no lines were counted at all, every language maps to 0.0
/// instead of NaN.
#[allow(clippy::cast_precision_loss)]
pub fn language_ratios(lines: &BTreeMap<String, i64>) -> BTreeMap<String, f64> {
    let total: i64 = lines.values().sum();
    lines
        .iter()
        .map(|(language, &count)| {
            let ratio = if total > 0 {
                (count as f64) * 100.0 / (total as f64)
            } else {
                0.0
            };
            (language.clone(), ratio)
        })
        .collect()
}

/// Sum activity counts (stars, commits, PRs, issues) across results.
pub fn activity_metrics(results: &[RepoResult]) -> ActivityMetrics {
    results.iter().fold(ActivityMetrics::default(), |acc, r| {
        ActivityMetrics {
            total_stars: acc.total_stars + u64::from(r.stats.stargazers_count),
            total_commits: acc.total_commits + u64::from(r.stats.commit_count),
            total_prs: acc.total_prs + u64::from(r.stats.pr_count),
            total_issues: acc.total_issues + u64::from(r.stats.issue_count),
        }
    })
}

/// Commits per day over the history's span. A history whose first and
/// last commits land on the same day reports the raw commit count.
#[allow(clippy::cast_precision_loss)]
pub fn commit_frequency(commits: &[CommitRecord]) -> f64 {
    if commits.is_empty() {
        return 0.0;
    }
    let first = commits.iter().map(|c| c.committed_at).min();
    let last = commits.iter().map(|c| c.committed_at).max();
    let count = commits.len() as f64;
    match (first, last) {
        (Some(first), Some(last)) => {
            let days = (last - first).num_days();
            if days > 0 {
                count / days as f64
            } else {
                count
            }
        }
        _ => 0.0,
    }
}

// ── Tests ──────────────────────────────────────────────────────────
