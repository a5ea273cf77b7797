/// Top-level Repograde error type.
///
/// All fallible operations in `repograde-core` return
/// [`Result<T, RepogradeError>`](Result). Each variant wraps a
/// domain-specific error enum, allowing callers to match on the error
/// source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum RepogradeError {
    /// Error from the persistence layer (`SQLite` operations, JSON docs).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error anywhere in a repository analysis (clone, scanner process,
    /// measure fetch/parse). One category by design: every member
    /// failure aborts the enclosing combination run the same way.
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// Error communicating with the text-generation service, including
    /// a response that fails strict parsing.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Error delivering a completion notification. Reported separately
    /// from analysis failures and never demotes a COMPLETE status.
    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    /// The exact repository set has already been saved as a selection.
    #[error("Selection already exists: {0}")]
    DuplicateSelection(String),
}

/// Errors from the SQLite-backed analysis store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization/deserialization of a stored document failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Schema creation or migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Errors during per-repository analysis.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Cloning the working copy failed.
    #[error("Clone failed for {url}: {message}")]
    Clone { url: String, message: String },

    /// The scanner child process could not be started or its streams
    /// could not be drained.
    #[error("Scanner process error: {0}")]
    Process(String),

    /// The scanner exited with a non-zero code. Hard failure for the
    /// repository and the whole combination run.
    #[error("Scanner exited with code {code} for project {project_key}")]
    ExitCode { code: i32, project_key: String },

    /// The analysis service returned an unusable measures/issues payload.
    #[error("Measures error: {0}")]
    Measures(String),

    /// HTTP-level failure talking to the analysis service.
    #[error("Analysis service error: {0}")]
    Http(String),

    /// Filesystem I/O error during analysis.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the text-generation provider.
#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    /// Network-level failure connecting to the provider.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider returned a non-success HTTP status.
    #[error("API error (HTTP {status}): {body}")]
    ApiError {
        /// HTTP status code from the provider.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Response could not be parsed into the enrichment shape.
    #[error("Response parse error: {0}")]
    Parse(String),

    /// Provider configuration is missing or invalid (API key, model).
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors delivering push notifications.
#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    /// Network-level failure connecting to the push gateway.
    #[error("Network error: {0}")]
    Network(String),

    /// Gateway returned a non-success HTTP status.
    #[error("Gateway error (HTTP {status}): {body}")]
    Gateway { status: u16, body: String },

    /// No device token is registered for the user.
    #[error("No device token for user {0}")]
    NoDeviceToken(i64),
}

/// Errors in configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A referenced entity is missing from the store.
#[derive(thiserror::Error, Debug)]
pub enum NotFoundError {
    #[error("repository snapshot for user {0}")]
    Snapshot(i64),

    #[error("selection {0}")]
    Selection(String),
}

/// Convenience alias for `Result<T, RepogradeError>`.
pub type Result<T> = std::result::Result<T, RepogradeError>;
