use crate::types::{
    AnalysisStatus, CombinationResult, CommitRecord, IssueRecord, PullRequestRecord, RepoId,
    Repository, Selection, UserId,
};

/// Persistence seam for the analysis platform.
///
/// Two tiers live behind one trait: the relational status row is the
/// authoritative record of whether a run succeeded, while selection and
/// result documents are stored whole. A result document without a
/// COMPLETE status row is not evidence of success.
#[async_trait::async_trait]
pub trait AnalysisStore: Send + Sync {
    // ── Repository snapshot ────────────────────────────────────────

    /// Replace a user's repository snapshot.
    async fn put_repositories(
        &self,
        user_id: UserId,
        repositories: &[Repository],
    ) -> crate::error::Result<()>;

    async fn repositories(&self, user_id: UserId) -> crate::error::Result<Vec<Repository>>;

    // ── Selections ─────────────────────────────────────────────────

    async fn save_selection(&self, selection: &Selection) -> crate::error::Result<()>;

    async fn get_selection(&self, selection_id: &str) -> crate::error::Result<Option<Selection>>;

    async fn list_selections(&self, user_id: UserId) -> crate::error::Result<Vec<Selection>>;

    /// Look up a selection by its exact repository-id set.
    async fn find_selection_by_set(
        &self,
        user_id: UserId,
        repo_set_key: &str,
    ) -> crate::error::Result<Option<Selection>>;

    /// Delete a selection along with its status row and results.
    async fn delete_selection(&self, selection_id: &str) -> crate::error::Result<()>;

    // ── Analysis status ────────────────────────────────────────────

    /// Upsert the single status row for a (user, selection) pair.
    async fn set_status(&self, status: &AnalysisStatus) -> crate::error::Result<()>;

    async fn get_status(
        &self,
        user_id: UserId,
        selection_id: &str,
    ) -> crate::error::Result<Option<AnalysisStatus>>;

    // ── Analysis results ───────────────────────────────────────────

    /// Append one result document. Earlier runs are retained.
    async fn put_result(&self, result: &CombinationResult) -> crate::error::Result<()>;

    /// Most recent result for a selection, by analysis time.
    async fn latest_result(
        &self,
        selection_id: &str,
    ) -> crate::error::Result<Option<CombinationResult>>;

    async fn list_results(
        &self,
        selection_id: &str,
    ) -> crate::error::Result<Vec<CombinationResult>>;

    // ── Ingestion records (read-mostly) ────────────────────────────

    async fn put_commits(
        &self,
        repo_id: RepoId,
        commits: &[CommitRecord],
    ) -> crate::error::Result<()>;

    async fn commits(&self, repo_id: RepoId) -> crate::error::Result<Vec<CommitRecord>>;

    async fn put_pull_requests(
        &self,
        repo_id: RepoId,
        pull_requests: &[PullRequestRecord],
    ) -> crate::error::Result<()>;

    async fn pull_requests(
        &self,
        repo_id: RepoId,
    ) -> crate::error::Result<Vec<PullRequestRecord>>;

    async fn put_issues(&self, repo_id: RepoId, issues: &[IssueRecord])
    -> crate::error::Result<()>;

    async fn issues(&self, repo_id: RepoId) -> crate::error::Result<Vec<IssueRecord>>;

    // ── Device tokens ──────────────────────────────────────────────

    async fn set_device_token(&self, user_id: UserId, token: &str) -> crate::error::Result<()>;

    async fn device_token(&self, user_id: UserId) -> crate::error::Result<Option<String>>;
}
