/// Current schema version.
pub const SCHEMA_VERSION: &str = "1";

/// Full SQL schema for Repograde's `SQLite` database.
///
/// Status rows are relational and updated in place; selections and
/// results are stored as whole JSON documents next to the columns
/// queries need.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS repograde_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Per-user repository snapshot from the hosting provider
CREATE TABLE IF NOT EXISTS repositories (
    user_id INTEGER NOT NULL,
    repo_id INTEGER NOT NULL,
    document TEXT NOT NULL,
    PRIMARY KEY (user_id, repo_id)
);

-- Saved repository combinations
CREATE TABLE IF NOT EXISTS selections (
    id TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    repo_set_key TEXT NOT NULL,
    created_at TEXT NOT NULL,
    document TEXT NOT NULL,
    UNIQUE (user_id, repo_set_key)
);
CREATE INDEX IF NOT EXISTS idx_selections_user ON selections(user_id);

-- Authoritative run status, one row per (user, selection)
CREATE TABLE IF NOT EXISTS analysis_status (
    user_id INTEGER NOT NULL,
    selection_id TEXT NOT NULL,
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, selection_id)
);

-- Result documents; history retained, latest wins by analyzed_at
CREATE TABLE IF NOT EXISTS analysis_results (
    id TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    selection_id TEXT NOT NULL,
    analyzed_at TEXT NOT NULL,
    document TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_results_selection
    ON analysis_results(selection_id, analyzed_at);

-- Hosting-provider ingestion records, read-only for the analyzer
CREATE TABLE IF NOT EXISTS commits (
    repo_id INTEGER NOT NULL,
    sha TEXT NOT NULL,
    committed_at TEXT NOT NULL,
    document TEXT NOT NULL,
    PRIMARY KEY (repo_id, sha)
);

CREATE TABLE IF NOT EXISTS pull_requests (
    repo_id INTEGER NOT NULL,
    number INTEGER NOT NULL,
    document TEXT NOT NULL,
    PRIMARY KEY (repo_id, number)
);

CREATE TABLE IF NOT EXISTS issues (
    repo_id INTEGER NOT NULL,
    number INTEGER NOT NULL,
    document TEXT NOT NULL,
    PRIMARY KEY (repo_id, number)
);

-- Push notification targets
CREATE TABLE IF NOT EXISTS device_tokens (
    user_id INTEGER PRIMARY KEY,
    token TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";
