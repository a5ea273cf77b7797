use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Typed ID wrappers ──────────────────────────────────────────────

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

typed_id!(UserId);
typed_id!(RepoId);

// ── Repository snapshot ────────────────────────────────────────────

/// One repository as known from the hosting provider at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub repo_id: RepoId,
    pub repo_name: String,
    /// `owner/name` as reported by the hosting provider.
    pub full_name: String,
    /// Primary language, if the provider reports one.
    pub language: Option<String>,
    pub stargazers_count: u32,
    pub forks_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: DateTime<Utc>,
    pub description: Option<String>,
}

impl Repository {
    /// HTTPS clone URL on the hosting provider.
    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}.git", self.full_name)
    }

    /// Deterministic key used for the local working copy and the
    /// analysis-service project: `owner_name`.
    pub fn project_key(&self) -> String {
        self.full_name.replace('/', "_")
    }
}

/// A user-chosen, immutable combination of repositories.
///
/// Re-selecting an identical repository set is a duplicate and rejected
/// at creation time; changing a combination means creating a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub id: String,
    pub user_id: UserId,
    pub repositories: Vec<Repository>,
    pub created_at: DateTime<Utc>,
}

impl Selection {
    /// The order-independent identity of this selection.
    pub fn repo_id_set(&self) -> BTreeSet<RepoId> {
        self.repositories.iter().map(|r| r.repo_id).collect()
    }
}

/// Canonical textual form of a repository-id set, used for exact-set
/// duplicate detection in the store.
pub fn repo_set_key(ids: &BTreeSet<RepoId>) -> String {
    let parts: Vec<String> = ids.iter().map(ToString::to_string).collect();
    parts.join(",")
}

// ── Analysis status ────────────────────────────────────────────────

/// State machine for one analysis run.
///
/// ```text
/// PENDING --(orchestrator starts)--> ANALYZING --(pipeline succeeds)--> COMPLETE
///                                            \--(any stage fails)-----> FAIL
/// ```
///
/// `COMPLETE` and `FAIL` are terminal for a run, but a new trigger for
/// the same selection re-enters `ANALYZING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisState {
    Pending,
    Analyzing,
    Complete,
    Fail,
}

impl AnalysisState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Analyzing => "ANALYZING",
            Self::Complete => "COMPLETE",
            Self::Fail => "FAIL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "ANALYZING" => Some(Self::Analyzing),
            "COMPLETE" => Some(Self::Complete),
            "FAIL" => Some(Self::Fail),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable status row — at most one per (user, selection) pair.
///
/// This row is the authoritative success signal for a run; a result
/// document alone is not sufficient evidence of success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisStatus {
    pub user_id: UserId,
    pub selection_id: String,
    pub state: AnalysisState,
    pub updated_at: DateTime<Utc>,
}

// ── Ingestion records ──────────────────────────────────────────────
//
// Collected by a separate hosting-provider ingestion path; the
// analyzer only reads them.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
    pub author: String,
    pub files_changed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

// ── Scan measures ──────────────────────────────────────────────────

/// One raw metric from the analysis service. Values stay textual;
/// non-numeric values are skipped by the scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub metric: String,
    pub value: String,
}

/// Lint violation severities, most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Blocker,
    Critical,
    Major,
    Minor,
    Info,
}

impl Severity {
    pub const ALL: [Self; 5] = [
        Self::Blocker,
        Self::Critical,
        Self::Major,
        Self::Minor,
        Self::Info,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocker => "BLOCKER",
            Self::Critical => "CRITICAL",
            Self::Major => "MAJOR",
            Self::Minor => "MINOR",
            Self::Info => "INFO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BLOCKER" => Some(Self::Blocker),
            "CRITICAL" => Some(Self::Critical),
            "MAJOR" => Some(Self::Major),
            "MINOR" => Some(Self::Minor),
            "INFO" => Some(Self::Info),
            _ => None,
        }
    }
}

/// Violation counts bucketed by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub blocker: u64,
    pub critical: u64,
    pub major: u64,
    pub minor: u64,
    pub info: u64,
}

impl SeverityCounts {
    pub fn count(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Blocker => self.blocker,
            Severity::Critical => self.critical,
            Severity::Major => self.major,
            Severity::Minor => self.minor,
            Severity::Info => self.info,
        }
    }

    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Blocker => self.blocker += 1,
            Severity::Critical => self.critical += 1,
            Severity::Major => self.major += 1,
            Severity::Minor => self.minor += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.blocker + self.critical + self.major + self.minor + self.info
    }
}

// ── Per-repository result ──────────────────────────────────────────

/// Hosting-provider stats snapshot for one repository at analysis time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub stargazers_count: u32,
    pub commit_count: u32,
    pub pr_count: u32,
    pub issue_count: u32,
}

/// The outcome of analyzing a single repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoResult {
    pub repo_id: RepoId,
    /// Composite quality score, clamped to `[0, 100]`.
    pub score: i64,
    /// Human-readable breakdown of every intermediate number. Part of
    /// the stored artifact, not just a log line.
    pub insights: String,
    /// Language name → line count.
    pub languages: BTreeMap<String, i64>,
    pub stats: Stats,
    /// Raw metric name → value, passed through from the analysis service.
    pub project_measures: BTreeMap<String, String>,
    /// Commits per active day; the raw commit count when the history
    /// spans a single day.
    pub commit_frequency: f64,
}

// ── Combination result ─────────────────────────────────────────────

/// Summed activity counts across a selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityMetrics {
    pub total_stars: u64,
    pub total_commits: u64,
    pub total_prs: u64,
    pub total_issues: u64,
}

/// Narrative produced by the text-generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiNarrative {
    pub analysis_summary: Vec<String>,
    pub improvement_suggestions: Vec<String>,
}

/// Role classification and narrative from the enrichment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub primary_role: String,
    pub role_scores: i64,
    pub ai_analysis: AiNarrative,
}

/// The persisted artifact for one analysis run of one selection.
///
/// History is retained: every run appends a new document, and readers
/// take the most recent by `analyzed_at`. Enrichment fields are only
/// populated once the enrichment stage has succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationResult {
    pub id: String,
    pub user_id: UserId,
    pub selection_id: String,
    pub analyzed_at: DateTime<Utc>,
    pub repositories: Vec<Repository>,
    /// Language name → percentage of total lines. Sums to ≈100 when
    /// any lines were counted, and is all-zero otherwise.
    pub language_ratios: BTreeMap<String, f64>,
    pub repo_results: Vec<RepoResult>,
    /// Integer mean of per-repository scores; 0 for an empty selection.
    pub overall_score: i64,
    pub activity: ActivityMetrics,
    pub enrichment: Option<Enrichment>,
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(id: i64, full_name: &str) -> Repository {
        Repository {
            repo_id: RepoId(id),
            repo_name: full_name.split('/').next_back().unwrap().to_string(),
            full_name: full_name.to_string(),
            language: Some("Java".to_string()),
            stargazers_count: 3,
            forks_count: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            pushed_at: Utc::now(),
            description: None,
        }
    }

    #[test]
    fn clone_url_and_project_key() {
        let r = repo(1, "octocat/hello-world");
        assert_eq!(r.clone_url(), "https://github.com/octocat/hello-world.git");
        assert_eq!(r.project_key(), "octocat_hello-world");
    }

    #[test]
    fn selection_repo_set_is_order_independent() {
        let a = Selection {
            id: "s1".into(),
            user_id: UserId(1),
            repositories: vec![repo(2, "o/b"), repo(1, "o/a")],
            created_at: Utc::now(),
        };
        let b = Selection {
            id: "s2".into(),
            user_id: UserId(1),
            repositories: vec![repo(1, "o/a"), repo(2, "o/b")],
            created_at: Utc::now(),
        };
        assert_eq!(a.repo_id_set(), b.repo_id_set());
        assert_eq!(repo_set_key(&a.repo_id_set()), "1,2");
    }

    #[test]
    fn analysis_state_round_trip() {
        for state in [
            AnalysisState::Pending,
            AnalysisState::Analyzing,
            AnalysisState::Complete,
            AnalysisState::Fail,
        ] {
            assert_eq!(AnalysisState::parse(state.as_str()), Some(state));
            let json = serde_json::to_string(&state).unwrap();
            let back: AnalysisState = serde_json::from_str(&json).unwrap();
            assert_eq!(back, state);
        }
        assert_eq!(AnalysisState::parse("pending"), None);
    }

    #[test]
    fn severity_counts_record_and_total() {
        let mut counts = SeverityCounts::default();
        counts.record(Severity::Blocker);
        counts.record(Severity::Major);
        counts.record(Severity::Major);
        assert_eq!(counts.count(Severity::Blocker), 1);
        assert_eq!(counts.count(Severity::Major), 2);
        assert_eq!(counts.count(Severity::Info), 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn severity_parse_matches_wire_names() {
        for severity in Severity::ALL {
            assert_eq!(Severity::parse(severity.as_str()), Some(severity));
        }
        assert_eq!(Severity::parse("WARNING"), None);
    }

    #[test]
    fn narrative_serde_uses_snake_case_fields() {
        let json = r#"{
            "primary_role": "Backend Developer",
            "role_scores": 82,
            "ai_analysis": {
                "analysis_summary": ["solid test coverage"],
                "improvement_suggestions": ["reduce duplication"]
            }
        }"#;
        let enrichment: Enrichment = serde_json::from_str(json).unwrap();
        assert_eq!(enrichment.primary_role, "Backend Developer");
        assert_eq!(enrichment.role_scores, 82);
        assert_eq!(enrichment.ai_analysis.analysis_summary.len(), 1);
    }
}
