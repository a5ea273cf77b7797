use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level Repograde configuration, matching `repograde.toml`.
///
/// Tokens and host URLs are carried explicitly through this struct so
/// every stage sees the same values; there is no ambient global state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepogradeConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub scanner: ScannerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub notify: NotifySection,
}

impl RepogradeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::NotFound(path.display().to_string()))?;
        let config: Self =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.scanner.host_url.is_empty() {
            return Err(ConfigError::Invalid("scanner.host_url is empty".into()).into());
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Invalid("llm.max_tokens must be positive".into()).into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// Path of the SQLite database file.
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("repograde.db"),
        }
    }
}

/// Static-analysis toolchain settings: the scanner child process and
/// the measures/issues HTTP API share these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerSection {
    /// Base URL of the analysis service.
    pub host_url: String,
    /// Token passed to the scanner invocation.
    pub analysis_token: String,
    /// Token for the measures HTTP API (may differ from the scanner's).
    pub user_token: String,
    /// Root directory for cloned working copies.
    pub clone_root: PathBuf,
    /// Language handled by the local lint tool. Its files are excluded
    /// from the generic scanner to avoid double-counting.
    pub lint_language: String,
    /// Engine id the converter stamps on imported lint issues; violation
    /// queries filter on it.
    pub lint_engine: String,
    /// Directory for lint reports, one subdirectory per project key.
    pub lint_report_root: PathBuf,
    /// Script converting the lint tool's native report to the analysis
    /// service's external-issues ingestion format.
    pub converter_script: PathBuf,
}

impl Default for ScannerSection {
    fn default() -> Self {
        Self {
            host_url: "http://localhost:9000".to_string(),
            analysis_token: String::new(),
            user_token: String::new(),
            clone_root: PathBuf::from("/tmp/repositories"),
            lint_language: "java".to_string(),
            lint_engine: "pmd".to_string(),
            lint_report_root: PathBuf::from("/tmp/lint_result"),
            converter_script: PathBuf::from("scripts/pmd_to_sonar.py"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    /// Provider id: `openai` or `custom`.
    pub provider: String,
    pub model: String,
    pub api_key: String,
    /// Override for self-hosted or proxy endpoints.
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            base_url: None,
            max_tokens: 500,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySection {
    pub enabled: bool,
    /// Push gateway endpoint.
    pub gateway_url: String,
    /// Server key sent in the gateway's auth header.
    pub server_key: String,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            enabled: false,
            gateway_url: String::new(),
            server_key: String::new(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
