use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{RepogradeError, StoreError};
use crate::types::{
    AnalysisState, AnalysisStatus, CombinationResult, CommitRecord, IssueRecord,
    PullRequestRecord, RepoId, Repository, Selection, UserId,
};

use super::schema;
use super::AnalysisStore;

/// SQLite-backed implementation of [`AnalysisStore`].
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> crate::error::Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> crate::error::Result<()> {
        let conn = self.lock();

        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(StoreError::Sqlite)?;

        // Try WAL mode — silently ignored for in-memory
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");

        conn.execute_batch(schema::SCHEMA_SQL)
            .map_err(StoreError::Sqlite)?;

        conn.execute(
            "INSERT OR IGNORE INTO repograde_meta (key, value) VALUES ('schema_version', ?1)",
            params![schema::SCHEMA_VERSION],
        )
        .map_err(StoreError::Sqlite)?;

        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("repograde store mutex poisoned")
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
        serde_json::to_string(value).map_err(StoreError::Serialization)
    }

    fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, StoreError> {
        serde_json::from_str(text).map_err(StoreError::Serialization)
    }

    fn parse_time(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
    }

    fn is_unique_violation(error: &rusqlite::Error) -> bool {
        matches!(
            error,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

#[async_trait::async_trait]
impl AnalysisStore for SqliteStore {
    // ── Repository snapshot ────────────────────────────────────────

    async fn put_repositories(
        &self,
        user_id: UserId,
        repositories: &[Repository],
    ) -> crate::error::Result<()> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        tx.execute(
            "DELETE FROM repositories WHERE user_id = ?1",
            params![user_id.0],
        )
        .map_err(StoreError::Sqlite)?;
        for repo in repositories {
            tx.execute(
                "INSERT INTO repositories (user_id, repo_id, document) VALUES (?1, ?2, ?3)",
                params![user_id.0, repo.repo_id.0, Self::to_json(repo)?],
            )
            .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn repositories(&self, user_id: UserId) -> crate::error::Result<Vec<Repository>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT document FROM repositories WHERE user_id = ?1 ORDER BY repo_id",
            )
            .map_err(StoreError::Sqlite)?;
        let documents = stmt
            .query_map(params![user_id.0], |row| row.get::<_, String>(0))
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        documents
            .iter()
            .map(|doc| Self::from_json(doc).map_err(RepogradeError::Store))
            .collect()
    }

    // ── Selections ─────────────────────────────────────────────────

    async fn save_selection(&self, selection: &Selection) -> crate::error::Result<()> {
        let set_key = crate::types::repo_set_key(&selection.repo_id_set());
        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO selections (id, user_id, repo_set_key, created_at, document)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                selection.id,
                selection.user_id.0,
                set_key,
                selection.created_at.to_rfc3339(),
                Self::to_json(selection)?,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if Self::is_unique_violation(&e) => {
                Err(RepogradeError::DuplicateSelection(set_key))
            }
            Err(e) => Err(StoreError::Sqlite(e).into()),
        }
    }

    async fn get_selection(&self, selection_id: &str) -> crate::error::Result<Option<Selection>> {
        let conn = self.lock();
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM selections WHERE id = ?1",
                params![selection_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        document
            .map(|doc| Self::from_json(&doc).map_err(RepogradeError::Store))
            .transpose()
    }

    async fn list_selections(&self, user_id: UserId) -> crate::error::Result<Vec<Selection>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT document FROM selections WHERE user_id = ?1 ORDER BY created_at",
            )
            .map_err(StoreError::Sqlite)?;
        let documents = stmt
            .query_map(params![user_id.0], |row| row.get::<_, String>(0))
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        documents
            .iter()
            .map(|doc| Self::from_json(doc).map_err(RepogradeError::Store))
            .collect()
    }

    async fn find_selection_by_set(
        &self,
        user_id: UserId,
        repo_set_key: &str,
    ) -> crate::error::Result<Option<Selection>> {
        let conn = self.lock();
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM selections WHERE user_id = ?1 AND repo_set_key = ?2",
                params![user_id.0, repo_set_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        document
            .map(|doc| Self::from_json(&doc).map_err(RepogradeError::Store))
            .transpose()
    }

    async fn delete_selection(&self, selection_id: &str) -> crate::error::Result<()> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        tx.execute(
            "DELETE FROM analysis_results WHERE selection_id = ?1",
            params![selection_id],
        )
        .map_err(StoreError::Sqlite)?;
        tx.execute(
            "DELETE FROM analysis_status WHERE selection_id = ?1",
            params![selection_id],
        )
        .map_err(StoreError::Sqlite)?;
        tx.execute(
            "DELETE FROM selections WHERE id = ?1",
            params![selection_id],
        )
        .map_err(StoreError::Sqlite)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    // ── Analysis status ────────────────────────────────────────────

    async fn set_status(&self, status: &AnalysisStatus) -> crate::error::Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO analysis_status (user_id, selection_id, state, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, selection_id)
             DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![
                status.user_id.0,
                status.selection_id,
                status.state.as_str(),
                status.updated_at.to_rfc3339(),
            ],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn get_status(
        &self,
        user_id: UserId,
        selection_id: &str,
    ) -> crate::error::Result<Option<AnalysisStatus>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT state, updated_at FROM analysis_status
                 WHERE user_id = ?1 AND selection_id = ?2",
                params![user_id.0, selection_id],
                |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                },
            )
            .optional()
            .map_err(StoreError::Sqlite)?;

        Ok(row.and_then(|(state, updated_at)| {
            AnalysisState::parse(&state).map(|state| AnalysisStatus {
                user_id,
                selection_id: selection_id.to_string(),
                state,
                updated_at: Self::parse_time(&updated_at),
            })
        }))
    }

    // ── Analysis results ───────────────────────────────────────────

    async fn put_result(&self, result: &CombinationResult) -> crate::error::Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO analysis_results (id, user_id, selection_id, analyzed_at, document)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result.id,
                result.user_id.0,
                result.selection_id,
                result.analyzed_at.to_rfc3339(),
                Self::to_json(result)?,
            ],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn latest_result(
        &self,
        selection_id: &str,
    ) -> crate::error::Result<Option<CombinationResult>> {
        let conn = self.lock();
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM analysis_results
                 WHERE selection_id = ?1
                 ORDER BY analyzed_at DESC LIMIT 1",
                params![selection_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        document
            .map(|doc| Self::from_json(&doc).map_err(RepogradeError::Store))
            .transpose()
    }

    async fn list_results(
        &self,
        selection_id: &str,
    ) -> crate::error::Result<Vec<CombinationResult>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT document FROM analysis_results
                 WHERE selection_id = ?1 ORDER BY analyzed_at DESC",
            )
            .map_err(StoreError::Sqlite)?;
        let documents = stmt
            .query_map(params![selection_id], |row| row.get::<_, String>(0))
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        documents
            .iter()
            .map(|doc| Self::from_json(doc).map_err(RepogradeError::Store))
            .collect()
    }

    // ── Ingestion records ──────────────────────────────────────────

    async fn put_commits(
        &self,
        repo_id: RepoId,
        commits: &[CommitRecord],
    ) -> crate::error::Result<()> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for commit in commits {
            tx.execute(
                "INSERT OR REPLACE INTO commits (repo_id, sha, committed_at, document)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    repo_id.0,
                    commit.sha,
                    commit.committed_at.to_rfc3339(),
                    Self::to_json(commit)?,
                ],
            )
            .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn commits(&self, repo_id: RepoId) -> crate::error::Result<Vec<CommitRecord>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT document FROM commits WHERE repo_id = ?1 ORDER BY committed_at",
            )
            .map_err(StoreError::Sqlite)?;
        let documents = stmt
            .query_map(params![repo_id.0], |row| row.get::<_, String>(0))
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        documents
            .iter()
            .map(|doc| Self::from_json(doc).map_err(RepogradeError::Store))
            .collect()
    }

    async fn put_pull_requests(
        &self,
        repo_id: RepoId,
        pull_requests: &[PullRequestRecord],
    ) -> crate::error::Result<()> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for pr in pull_requests {
            tx.execute(
                "INSERT OR REPLACE INTO pull_requests (repo_id, number, document)
                 VALUES (?1, ?2, ?3)",
                params![repo_id.0, pr.number, Self::to_json(pr)?],
            )
            .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn pull_requests(
        &self,
        repo_id: RepoId,
    ) -> crate::error::Result<Vec<PullRequestRecord>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT document FROM pull_requests WHERE repo_id = ?1 ORDER BY number",
            )
            .map_err(StoreError::Sqlite)?;
        let documents = stmt
            .query_map(params![repo_id.0], |row| row.get::<_, String>(0))
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        documents
            .iter()
            .map(|doc| Self::from_json(doc).map_err(RepogradeError::Store))
            .collect()
    }

    async fn put_issues(
        &self,
        repo_id: RepoId,
        issues: &[IssueRecord],
    ) -> crate::error::Result<()> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for issue in issues {
            tx.execute(
                "INSERT OR REPLACE INTO issues (repo_id, number, document)
                 VALUES (?1, ?2, ?3)",
                params![repo_id.0, issue.number, Self::to_json(issue)?],
            )
            .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn issues(&self, repo_id: RepoId) -> crate::error::Result<Vec<IssueRecord>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare_cached("SELECT document FROM issues WHERE repo_id = ?1 ORDER BY number")
            .map_err(StoreError::Sqlite)?;
        let documents = stmt
            .query_map(params![repo_id.0], |row| row.get::<_, String>(0))
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        documents
            .iter()
            .map(|doc| Self::from_json(doc).map_err(RepogradeError::Store))
            .collect()
    }

    // ── Device tokens ──────────────────────────────────────────────

    async fn set_device_token(&self, user_id: UserId, token: &str) -> crate::error::Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO device_tokens (user_id, token, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id)
             DO UPDATE SET token = excluded.token, updated_at = excluded.updated_at",
            params![user_id.0, token, Utc::now().to_rfc3339()],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn device_token(&self, user_id: UserId) -> crate::error::Result<Option<String>> {
        let conn = self.lock();
        let token = conn
            .query_row(
                "SELECT token FROM device_tokens WHERE user_id = ?1",
                params![user_id.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        Ok(token)
    }
}
