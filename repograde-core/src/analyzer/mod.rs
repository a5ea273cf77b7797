//! Per-repository analysis: working copy, scanner run, measures,
//! violations, score.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::aggregate;
use crate::config::ScannerSection;
use crate::scoring;
use crate::types::{
    CommitRecord, IssueRecord, Measure, PullRequestRecord, RepoResult, Repository, SeverityCounts,
    Stats,
};

mod clone;
pub mod process;
mod sonar;

pub use sonar::SonarGateway;

/// Seam to the static-analysis toolchain: the scanner child process and
/// the measures/issues HTTP API behind it.
#[async_trait::async_trait]
pub trait QualityGateway: Send + Sync {
    /// Run the full scan toolchain over a working copy. Must fail on a
    /// non-zero scanner exit.
    async fn scan(&self, workdir: &std::path::Path, project_key: &str)
    -> crate::error::Result<()>;

    /// Fetch the generic quality measures for an analyzed project.
    async fn fetch_measures(&self, project_key: &str) -> crate::error::Result<Vec<Measure>>;

    /// Fetch lint violation counts for an analyzed project, bucketed by
    /// severity.
    async fn fetch_violations(&self, project_key: &str) -> crate::error::Result<SeverityCounts>;
}

/// Runs one repository through clone → scan → measure → score.
pub struct RepoAnalyzer<G> {
    gateway: G,
    config: ScannerSection,
}

impl<G: QualityGateway> RepoAnalyzer<G> {
    pub fn new(gateway: G, config: ScannerSection) -> Self {
        Self { gateway, config }
    }

    /// Local working-copy path for a repository.
    pub fn workdir(&self, repository: &Repository) -> PathBuf {
        self.config.clone_root.join(repository.project_key())
    }

    /// Analyze one repository. Ingestion records (commits, PRs, issues)
    /// are read-only inputs collected by a separate path.
    pub async fn analyze(
        &self,
        repository: &Repository,
        commits: &[CommitRecord],
        pull_requests: &[PullRequestRecord],
        issues: &[IssueRecord],
    ) -> crate::error::Result<RepoResult> {
        let project_key = repository.project_key();
        info!(repo = %repository.full_name, project_key = %project_key, "Analyzing repository");

        let workdir = self.workdir(repository);
        clone::prepare_working_copy(&repository.clone_url(), &workdir).await?;

        self.gateway.scan(&workdir, &project_key).await?;

        let measures = self.gateway.fetch_measures(&project_key).await?;
        debug!(count = measures.len(), "Fetched measures");

        let mut languages = measures
            .iter()
            .find(|m| m.metric == "ncloc_language_distribution")
            .map(|m| scoring::parse_language_distribution(&m.value))
            .unwrap_or_default();

        // The generic scanner excludes the lint language, so its line
        // count in the distribution is wrong. Overwrite it with a
        // direct count from the working copy, unless the count came up
        // empty (a service-reported figure beats a miss on disk).
        let lint_language = self.config.lint_language.clone();
        let extension =
            scoring::language_extension(&lint_language).unwrap_or(self.config.lint_language.as_str());
        let lint_lines = scoring::count_language_lines(&workdir, extension);
        if lint_lines > 0 {
            languages.insert(lint_language.clone(), lint_lines);
        }

        let violations = self.gateway.fetch_violations(&project_key).await?;

        let breakdown = scoring::score_repository(&measures, violations);
        let insights = scoring::render_insights(&breakdown, &lint_language, &languages);
        info!(
            repo = %repository.full_name,
            score = breakdown.overall_score,
            violations = breakdown.violations.total(),
            "Repository scored"
        );

        let stats = Stats {
            stargazers_count: repository.stargazers_count,
            commit_count: u32::try_from(commits.len()).unwrap_or(u32::MAX),
            pr_count: u32::try_from(pull_requests.len()).unwrap_or(u32::MAX),
            issue_count: u32::try_from(issues.len()).unwrap_or(u32::MAX),
        };

        Ok(RepoResult {
            repo_id: repository.repo_id,
            score: breakdown.overall_score,
            insights,
            languages,
            stats,
            project_measures: measures
                .into_iter()
                .map(|m| (m.metric, m.value))
                .collect(),
            commit_frequency: aggregate::commit_frequency(commits),
        })
    }
}
