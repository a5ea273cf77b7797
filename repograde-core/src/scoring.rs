//! Pure scoring engine: raw metrics in, penalties and a 0–100 score out.
//!
//! Two independent penalty computations feed one score. Generic metrics
//! from the analysis service use log10 damping; lint violations use
//! natural-log damping. The bases differ on purpose — they were tuned
//! independently and must not be unified.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use tracing::warn;

use crate::types::{Measure, Severity, SeverityCounts};

const BASE_SCORE: f64 = 100.0;
const DEFAULT_METRIC_WEIGHT: f64 = 10.0;

// ── Generic (non-language) penalty ─────────────────────────────────

/// Fixed weight of a generic metric in the penalty sum.
pub fn metric_weight(metric: &str) -> f64 {
    match metric {
        "coverage" => 8.0,
        "bugs" => 16.0,
        "code_smells" => 12.0,
        "vulnerabilities" => 20.0,
        "duplicated_lines_density" => 4.0,
        _ => DEFAULT_METRIC_WEIGHT,
    }
}

/// Penalty contribution of one metric value.
///
/// Count-style metrics saturate at the full weight once the count gets
/// large (the log10 term reaches 1.0 around 99). Unrecognized metrics
/// contribute nothing even though they carry a weight.
pub fn metric_penalty(metric: &str, value: f64) -> f64 {
    let weight = metric_weight(metric);
    match metric {
        "coverage" => weight * ((100.0 - value) / 100.0),
        "duplicated_lines_density" => weight * (value / 100.0),
        "bugs" | "code_smells" | "vulnerabilities" => {
            weight * f64::min(1.0, (value + 1.0).log10() / 2.0)
        }
        _ => 0.0,
    }
}

/// Sum the penalties of all parseable measures. Non-numeric values are
/// skipped without contributing.
pub fn non_language_penalty(measures: &[Measure]) -> f64 {
    measures
        .iter()
        .filter_map(|m| m.value.parse::<f64>().ok().map(|v| (m.metric.as_str(), v)))
        .map(|(metric, value)| metric_penalty(metric, value))
        .sum()
}

/// `max(0, 100 - Σ penalties)`, truncated to an integer.
#[allow(clippy::cast_possible_truncation)]
pub fn non_language_score(measures: &[Measure]) -> i64 {
    f64::max(0.0, BASE_SCORE - non_language_penalty(measures)) as i64
}

// ── Language-specific (lint) penalty ───────────────────────────────

/// Weight of one violation severity bucket.
pub fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Blocker => 6.0,
        Severity::Critical => 4.0,
        Severity::Major => 2.4,
        Severity::Minor => 1.0,
        Severity::Info => 0.4,
    }
}

/// `Σ weight × ln(count + 1)` across all severity buckets.
#[allow(clippy::cast_precision_loss)]
pub fn lint_penalty(counts: &SeverityCounts) -> f64 {
    Severity::ALL
        .iter()
        .map(|&s| severity_weight(s) * ((counts.count(s) as f64) + 1.0).ln())
        .sum()
}

/// Informational lint-only score; not itself the final score.
pub fn lint_quality_score(penalty: f64) -> f64 {
    f64::max(0.0, BASE_SCORE - penalty)
}

/// Final per-repository score: the lint penalty comes directly off the
/// already-penalized generic score, not off 100. The compounding is
/// intentional and must stay.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn overall_score(non_language: i64, lint: f64) -> i64 {
    f64::max(0.0, (non_language as f64) - lint) as i64
}

// ── Full breakdown ─────────────────────────────────────────────────

/// Every intermediate number of one repository's scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub non_language_penalty: f64,
    pub non_language_score: i64,
    pub violations: SeverityCounts,
    pub lint_penalty: f64,
    pub lint_quality_score: f64,
    pub overall_score: i64,
}

/// Run both penalty computations and combine them.
pub fn score_repository(measures: &[Measure], violations: SeverityCounts) -> ScoreBreakdown {
    let generic_penalty = non_language_penalty(measures);
    let generic_score = non_language_score(measures);
    let lint = lint_penalty(&violations);
    ScoreBreakdown {
        non_language_penalty: generic_penalty,
        non_language_score: generic_score,
        violations,
        lint_penalty: lint,
        lint_quality_score: lint_quality_score(lint),
        overall_score: overall_score(generic_score, lint),
    }
}

/// Render the stored insight text: every intermediate number, for
/// observability of the scoring pass. Part of the artifact.
pub fn render_insights(
    breakdown: &ScoreBreakdown,
    lint_language: &str,
    languages: &BTreeMap<String, i64>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Generic analysis:");
    let _ = writeln!(
        out,
        "  - Base score: 100 - total penalty ({:.2}) = {}",
        breakdown.non_language_penalty, breakdown.non_language_score
    );
    let _ = writeln!(out, "Lint analysis ({lint_language}):");
    let v = &breakdown.violations;
    let _ = writeln!(
        out,
        "  - BLOCKER: {} violations, CRITICAL: {} violations, MAJOR: {} violations, \
         MINOR: {} violations, INFO: {} violations",
        v.blocker, v.critical, v.major, v.minor, v.info
    );
    let _ = writeln!(
        out,
        "  - Total lint penalty: {:.2} => lint quality score: 100 - penalty = {:.2}",
        breakdown.lint_penalty, breakdown.lint_quality_score
    );
    let _ = writeln!(
        out,
        "Overall score: generic score ({}) - lint penalty ({:.2}) = {}",
        breakdown.non_language_score, breakdown.lint_penalty, breakdown.overall_score
    );
    let langs: Vec<String> = languages.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let _ = writeln!(out, "Language distribution (LOC): {}", langs.join(", "));
    out
}

// ── Language distribution ──────────────────────────────────────────

/// Parse the analysis service's `;`-separated `key=value` line
/// distribution measure. Malformed entries are skipped.
#[allow(clippy::cast_possible_truncation)]
pub fn parse_language_distribution(raw: &str) -> BTreeMap<String, i64> {
    let mut distribution = BTreeMap::new();
    for entry in raw.split(';') {
        let Some((key, value)) = entry.split_once('=') else {
            continue;
        };
        match value.parse::<f64>() {
            Ok(parsed) => {
                distribution.insert(key.to_string(), parsed as i64);
            }
            Err(e) => warn!(key, value, error = %e, "Skipping unparseable distribution entry"),
        }
    }
    distribution
}

/// File extension of a language as the lint tool names it.
pub fn language_extension(language: &str) -> Option<&'static str> {
    match language.to_ascii_lowercase().as_str() {
        "java" => Some("java"),
        "kotlin" => Some("kt"),
        "rust" => Some("rs"),
        "python" => Some("py"),
        "go" => Some("go"),
        "javascript" => Some("js"),
        "typescript" => Some("ts"),
        "ruby" => Some("rb"),
        "c" => Some("c"),
        "cpp" | "c++" => Some("cpp"),
        "csharp" | "c#" => Some("cs"),
        "swift" => Some("swift"),
        "php" => Some("php"),
        _ => None,
    }
}

/// Count lines of all `*.{extension}` files under a working copy. The
/// generic distribution metric undercounts the lint language, so this
/// directly measured value overwrites it. Unreadable files are skipped.
pub fn count_language_lines(root: &Path, extension: &str) -> i64 {
    let pattern = format!("{}/**/*.{}", root.display(), extension);
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(e) => {
            warn!(pattern, error = %e, "Bad line-count glob pattern");
            return 0;
        }
    };

    let mut total: i64 = 0;
    for entry in paths {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path during line count");
                continue;
            }
        };
        match std::fs::read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                total += text.lines().count() as i64;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable file"),
        }
    }
    total
}

// ── Tests ──────────────────────────────────────────────────────────
