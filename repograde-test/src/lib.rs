//! Shared fixtures for Repograde integration tests: fake external
//! seams and store seeding helpers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};

use repograde_core::analyzer::QualityGateway;
use repograde_core::error::{LlmError, RepogradeError, ScanError};
use repograde_core::llm::ChatModel;
use repograde_core::notify::{Notification, Notifier};
use repograde_core::store::{AnalysisStore, SqliteStore};
use repograde_core::types::{
    CommitRecord, IssueRecord, Measure, PullRequestRecord, RepoId, Repository, SeverityCounts,
    UserId,
};

// ── Fake quality gateway ───────────────────────────────────────────

/// In-memory stand-in for the scanner toolchain and analysis service.
#[derive(Default)]
pub struct FakeGateway {
    measures: HashMap<String, Vec<Measure>>,
    violations: HashMap<String, SeverityCounts>,
    failing_projects: Vec<String>,
    scanned: Arc<Mutex<Vec<String>>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_measures(mut self, project_key: &str, measures: &[(&str, &str)]) -> Self {
        self.measures.insert(
            project_key.to_string(),
            measures
                .iter()
                .map(|(metric, value)| Measure {
                    metric: (*metric).to_string(),
                    value: (*value).to_string(),
                })
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn with_violations(mut self, project_key: &str, violations: SeverityCounts) -> Self {
        self.violations.insert(project_key.to_string(), violations);
        self
    }

    /// Make the scan step fail for a project with a non-zero exit.
    #[must_use]
    pub fn failing(mut self, project_key: &str) -> Self {
        self.failing_projects.push(project_key.to_string());
        self
    }

    /// Handle to the scan log; stays valid after the gateway moves
    /// into an analyzer.
    pub fn scanned_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.scanned.clone()
    }
}

#[async_trait::async_trait]
impl QualityGateway for FakeGateway {
    async fn scan(&self, _workdir: &Path, project_key: &str) -> repograde_core::Result<()> {
        self.scanned.lock().unwrap().push(project_key.to_string());
        if self.failing_projects.iter().any(|p| p == project_key) {
            return Err(ScanError::ExitCode {
                code: 2,
                project_key: project_key.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn fetch_measures(&self, project_key: &str) -> repograde_core::Result<Vec<Measure>> {
        Ok(self.measures.get(project_key).cloned().unwrap_or_default())
    }

    async fn fetch_violations(&self, project_key: &str) -> repograde_core::Result<SeverityCounts> {
        Ok(self.violations.get(project_key).copied().unwrap_or_default())
    }
}

// ── Fake chat model ────────────────────────────────────────────────

/// One recorded chat call: the system and user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub system: String,
    pub user: String,
}

/// Chat model returning a canned response (or failing).
pub struct FakeChat {
    response: Option<String>,
    exchanges: Arc<Mutex<Vec<Exchange>>>,
}

impl FakeChat {
    /// Always answers with `response`.
    pub fn answering(response: &str) -> Self {
        Self {
            response: Some(response.to_string()),
            exchanges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always fails with a network error.
    pub fn failing() -> Self {
        Self {
            response: None,
            exchanges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the call log; stays valid after the model moves into
    /// an enricher.
    pub fn exchanges_handle(&self) -> Arc<Mutex<Vec<Exchange>>> {
        self.exchanges.clone()
    }

    /// A syntactically valid enrichment response.
    pub fn valid_enrichment_json() -> &'static str {
        r#"{
            "primary_role": "Backend Developer",
            "role_scores": 82,
            "ai_analysis": {
                "analysis_summary": ["consistent commit cadence", "few open bugs"],
                "improvement_suggestions": ["raise coverage", "reduce duplication"]
            }
        }"#
    }
}

#[async_trait::async_trait]
impl ChatModel for FakeChat {
    fn name(&self) -> &str {
        "fake"
    }

    fn model_id(&self) -> &str {
        "fake-1"
    }

    async fn complete(&self, system: &str, user: &str) -> repograde_core::Result<String> {
        self.exchanges.lock().unwrap().push(Exchange {
            system: system.to_string(),
            user: user.to_string(),
        });
        match &self.response {
            Some(response) => Ok(response.clone()),
            None => Err(RepogradeError::Llm(LlmError::Network(
                "connection refused".to_string(),
            ))),
        }
    }
}

// ── Recording notifier ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub device_token: String,
    pub notification: Notification,
}

/// Notifier that records every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that stays valid after the notifier moves into a
    /// pipeline.
    pub fn sent_handle(&self) -> Arc<Mutex<Vec<SentNotification>>> {
        self.sent.clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        device_token: &str,
        notification: &Notification,
    ) -> repograde_core::Result<()> {
        self.sent.lock().unwrap().push(SentNotification {
            device_token: device_token.to_string(),
            notification: notification.clone(),
        });
        Ok(())
    }
}

// ── Store seeding ──────────────────────────────────────────────────

pub fn repository(id: i64, full_name: &str) -> Repository {
    Repository {
        repo_id: RepoId(id),
        repo_name: full_name.split('/').next_back().unwrap().to_string(),
        full_name: full_name.to_string(),
        language: Some("Java".to_string()),
        stargazers_count: 5,
        forks_count: 2,
        created_at: Utc::now() - Duration::days(400),
        updated_at: Utc::now(),
        pushed_at: Utc::now(),
        description: Some("fixture repository".to_string()),
    }
}

pub fn commit(sha: &str, days_ago: i64) -> CommitRecord {
    CommitRecord {
        sha: sha.to_string(),
        message: format!("commit {sha}"),
        committed_at: Utc::now() - Duration::days(days_ago),
        author: "dev@example.com".to_string(),
        files_changed: vec!["src/Main.java".to_string()],
    }
}

/// Seed a store with a user snapshot, ingestion records, and on-disk
/// working copies (so the pipeline never attempts a real clone).
pub async fn seed_user(
    store: &SqliteStore,
    clone_root: &Path,
    user_id: UserId,
    repositories: &[Repository],
) {
    store.put_repositories(user_id, repositories).await.unwrap();
    for repo in repositories {
        let workdir = clone_root.join(repo.project_key());
        std::fs::create_dir_all(workdir.join("src")).unwrap();
        std::fs::write(
            workdir.join("src/Main.java"),
            "class Main {\n    void run() {}\n}\n",
        )
        .unwrap();

        store
            .put_commits(
                repo.repo_id,
                &[commit("aaa", 10), commit("bbb", 5), commit("ccc", 0)],
            )
            .await
            .unwrap();
        store
            .put_pull_requests(
                repo.repo_id,
                &[PullRequestRecord {
                    number: 1,
                    title: "Add feature".to_string(),
                    state: "merged".to_string(),
                    created_at: Utc::now() - Duration::days(7),
                }],
            )
            .await
            .unwrap();
        store
            .put_issues(
                repo.repo_id,
                &[IssueRecord {
                    number: 1,
                    title: "Bug report".to_string(),
                    state: "open".to_string(),
                    created_at: Utc::now() - Duration::days(3),
                }],
            )
            .await
            .unwrap();
    }
}
