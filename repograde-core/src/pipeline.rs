//! The analysis orchestrator: status transitions, per-repository runs,
//! aggregation, enrichment, persistence, notification.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate;
use crate::analyzer::{QualityGateway, RepoAnalyzer};
use crate::error::NotFoundError;
use crate::llm::Enricher;
use crate::notify::{Notification, Notifier};
use crate::report;
use crate::store::AnalysisStore;
use crate::types::{
    AnalysisState, AnalysisStatus, CombinationResult, RepoResult, Selection, UserId,
};

/// Drives one selection through ANALYZING to COMPLETE or FAIL.
///
/// Repositories are analyzed sequentially; the scanner toolchain is a
/// singleton resource, so there is nothing to gain from parallel scans.
pub struct AnalysisPipeline<G> {
    store: Arc<dyn AnalysisStore>,
    analyzer: RepoAnalyzer<G>,
    enricher: Option<Enricher>,
    notifier: Box<dyn Notifier>,
}

impl<G: QualityGateway> AnalysisPipeline<G> {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        analyzer: RepoAnalyzer<G>,
        enricher: Option<Enricher>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            analyzer,
            enricher,
            notifier,
        }
    }

    /// Run a full analysis for a selection.
    ///
    /// The status row flips to ANALYZING before any work starts, so
    /// observers see the run immediately. Any stage failure (clone,
    /// scan, measures, enrichment, persistence) marks the run FAIL and
    /// propagates the error. Notification failures are logged only.
    pub async fn trigger(
        &self,
        user_id: UserId,
        selection_id: &str,
    ) -> crate::error::Result<CombinationResult> {
        // Resolve first: an unknown selection must not leave a status
        // row behind.
        let selection = self
            .store
            .get_selection(selection_id)
            .await?
            .ok_or_else(|| NotFoundError::Selection(selection_id.to_string()))?;

        self.set_state(user_id, selection_id, AnalysisState::Analyzing)
            .await?;
        info!(selection_id, user_id = %user_id, "Analysis started");

        match self.run_analysis(user_id, &selection).await {
            Ok(result) => {
                self.set_state(user_id, selection_id, AnalysisState::Complete)
                    .await?;
                info!(
                    selection_id,
                    score = result.overall_score,
                    "Analysis complete"
                );
                self.notify_completion(user_id, &result).await;
                Ok(result)
            }
            Err(e) => {
                warn!(selection_id, error = %e, "Analysis failed");
                // FAIL must be durable even though the run error is
                // what the caller sees.
                if let Err(status_err) = self
                    .set_state(user_id, selection_id, AnalysisState::Fail)
                    .await
                {
                    warn!(selection_id, error = %status_err, "Could not record FAIL status");
                }
                Err(e)
            }
        }
    }

    async fn run_analysis(
        &self,
        user_id: UserId,
        selection: &Selection,
    ) -> crate::error::Result<CombinationResult> {
        let repo_results = self.analyze_selection(selection).await?;

        let merged_lines = aggregate::merged_language_lines(&repo_results);
        let mut result = CombinationResult {
            id: Uuid::new_v4().to_string(),
            user_id,
            selection_id: selection.id.clone(),
            analyzed_at: Utc::now(),
            repositories: selection.repositories.clone(),
            language_ratios: aggregate::language_ratios(&merged_lines),
            overall_score: aggregate::overall_score(&repo_results),
            activity: aggregate::activity_metrics(&repo_results),
            repo_results,
            enrichment: None,
        };

        if let Some(enricher) = &self.enricher {
            result.enrichment = Some(enricher.enrich(&result).await?);
        }

        self.store.put_result(&result).await?;
        Ok(result)
    }

    async fn analyze_selection(
        &self,
        selection: &Selection,
    ) -> crate::error::Result<Vec<RepoResult>> {
        let mut results = Vec::with_capacity(selection.repositories.len());
        for repository in &selection.repositories {
            let commits = self.store.commits(repository.repo_id).await?;
            let pull_requests = self.store.pull_requests(repository.repo_id).await?;
            let issues = self.store.issues(repository.repo_id).await?;
            let result = self
                .analyzer
                .analyze(repository, &commits, &pull_requests, &issues)
                .await?;
            results.push(result);
        }
        Ok(results)
    }

    async fn set_state(
        &self,
        user_id: UserId,
        selection_id: &str,
        state: AnalysisState,
    ) -> crate::error::Result<()> {
        self.store
            .set_status(&AnalysisStatus {
                user_id,
                selection_id: selection_id.to_string(),
                state,
                updated_at: Utc::now(),
            })
            .await
    }

    async fn notify_completion(&self, user_id: UserId, result: &CombinationResult) {
        let token = match self.store.device_token(user_id).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                warn!(user_id = %user_id, "No device token registered, skipping notification");
                return;
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Device token lookup failed");
                return;
            }
        };

        let notification = Notification {
            title: "Analysis complete".to_string(),
            body: format!(
                "Combination {} scored {}/100 ({})",
                result.selection_id,
                result.overall_score,
                report::grade_letter(result.overall_score)
            ),
            selection_id: result.selection_id.clone(),
        };
        if let Err(e) = self.notifier.notify(&token, &notification).await {
            warn!(user_id = %user_id, error = %e, "Notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerSection;
    use crate::error::{RepogradeError, ScanError};
    use crate::notify::NullNotifier;
    use crate::store::SqliteStore;
    use crate::types::{Measure, RepoId, Repository, SeverityCounts};
    use std::path::{Path, PathBuf};

    struct FakeGateway {
        measures: Vec<Measure>,
        violations: SeverityCounts,
        fail_scan: bool,
    }

    #[async_trait::async_trait]
    impl QualityGateway for FakeGateway {
        async fn scan(&self, _workdir: &Path, project_key: &str) -> crate::error::Result<()> {
            if self.fail_scan {
                return Err(ScanError::ExitCode {
                    code: 2,
                    project_key: project_key.to_string(),
                }
                .into());
            }
            Ok(())
        }

        async fn fetch_measures(&self, _project_key: &str) -> crate::error::Result<Vec<Measure>> {
            Ok(self.measures.clone())
        }

        async fn fetch_violations(&self, _project_key: &str) -> crate::error::Result<SeverityCounts> {
            Ok(self.violations)
        }
    }

    fn repo(id: i64, full_name: &str) -> Repository {
        Repository {
            repo_id: RepoId(id),
            repo_name: full_name.split('/').next_back().unwrap().to_string(),
            full_name: full_name.to_string(),
            language: Some("Java".to_string()),
            stargazers_count: 4,
            forks_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            pushed_at: Utc::now(),
            description: None,
        }
    }

    fn scanner_config(clone_root: PathBuf) -> ScannerSection {
        ScannerSection {
            clone_root,
            ..ScannerSection::default()
        }
    }

    async fn setup(
        gateway: FakeGateway,
    ) -> (Arc<SqliteStore>, AnalysisPipeline<FakeGateway>, String, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let repository = repo(1, "octo/app");

        // Pre-seeded working copy so no clone is attempted.
        std::fs::create_dir_all(tmp.path().join(repository.project_key())).unwrap();

        store
            .put_repositories(UserId(1), std::slice::from_ref(&repository))
            .await
            .unwrap();
        let selection = crate::selection::create_selection(store.as_ref(), UserId(1), &[RepoId(1)])
            .await
            .unwrap();

        let analyzer = RepoAnalyzer::new(gateway, scanner_config(tmp.path().to_path_buf()));
        let pipeline = AnalysisPipeline::new(
            store.clone() as Arc<dyn AnalysisStore>,
            analyzer,
            None,
            Box::new(NullNotifier),
        );
        (store, pipeline, selection.id, tmp)
    }

    #[tokio::test]
    async fn successful_run_ends_complete_with_result() {
        let gateway = FakeGateway {
            measures: vec![
                Measure {
                    metric: "coverage".into(),
                    value: "80".into(),
                },
                Measure {
                    metric: "bugs".into(),
                    value: "2".into(),
                },
            ],
            violations: SeverityCounts::default(),
            fail_scan: false,
        };
        let (store, pipeline, selection_id, _tmp) = setup(gateway).await;

        let result = pipeline.trigger(UserId(1), &selection_id).await.unwrap();
        assert_eq!(result.overall_score, 94);

        let status = store
            .get_status(UserId(1), &selection_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.state, AnalysisState::Complete);
        assert!(store.latest_result(&selection_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn scan_failure_ends_fail_and_propagates() {
        let gateway = FakeGateway {
            measures: vec![],
            violations: SeverityCounts::default(),
            fail_scan: true,
        };
        let (store, pipeline, selection_id, _tmp) = setup(gateway).await;

        let err = pipeline.trigger(UserId(1), &selection_id).await.unwrap_err();
        assert!(matches!(err, RepogradeError::Scan(_)));

        let status = store
            .get_status(UserId(1), &selection_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.state, AnalysisState::Fail);
        assert!(store.latest_result(&selection_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_selection_fails_without_touching_status() {
        let gateway = FakeGateway {
            measures: vec![],
            violations: SeverityCounts::default(),
            fail_scan: false,
        };
        let (store, pipeline, _selection_id, _tmp) = setup(gateway).await;

        let err = pipeline.trigger(UserId(1), "no-such-id").await.unwrap_err();
        assert!(matches!(err, RepogradeError::NotFound(_)));

        // The trigger resolved nothing, so no status row may exist for
        // the phantom id.
        assert!(store
            .get_status(UserId(1), "no-such-id")
            .await
            .unwrap()
            .is_none());
    }
}
