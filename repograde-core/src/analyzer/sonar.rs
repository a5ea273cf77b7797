//! Gateway to the analysis service: scanner invocation plus the
//! measures and issues HTTP APIs.

use std::path::Path;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ScannerSection;
use crate::error::ScanError;
use crate::scoring;
use crate::types::{Measure, Severity, SeverityCounts};

use super::process::run_logged;
use super::QualityGateway;

const METRIC_KEYS: &str =
    "coverage,bugs,code_smells,vulnerabilities,duplicated_lines_density,ncloc_language_distribution";
const ISSUE_PAGE_SIZE: u32 = 500;

/// Production [`QualityGateway`] backed by the scanner toolchain and
/// the analysis service's web API.
#[derive(Debug)]
pub struct SonarGateway {
    client: Client,
    config: ScannerSection,
}

impl SonarGateway {
    pub fn new(config: ScannerSection) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// One shell line running the whole toolchain: lint, convert the
    /// lint report to the external-issues format, then the scanner with
    /// the lint language excluded so its files are not double-counted.
    fn scan_script(&self, workdir: &Path, project_key: &str) -> String {
        let report_dir = self.config.lint_report_root.join(project_key);
        let report_dir = report_dir.display();
        let workdir = workdir.display();
        let extension = scoring::language_extension(&self.config.lint_language)
            .unwrap_or(self.config.lint_language.as_str());
        format!(
            "mkdir -p {report_dir} && \
             pmd check -d {workdir} -R rulesets/java/quickstart.xml -f xml \
             -r {report_dir}/pmd_report.xml; \
             python3 {converter} {report_dir}/pmd_report.xml {report_dir}/sonar_issues.json && \
             sonar-scanner -Dsonar.projectKey={project_key} \
             -Dsonar.projectBaseDir={workdir} \
             -Dsonar.sources=. \
             -Dsonar.host.url={host} \
             -Dsonar.token={token} \
             -Dsonar.exclusions=**/*.{extension} \
             -Dsonar.externalIssuesReportPaths={report_dir}/sonar_issues.json",
            converter = self.config.converter_script.display(),
            host = self.config.host_url,
            token = self.config.analysis_token,
        )
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        // Token-as-username basic auth with an empty password.
        self.client
            .get(format!("{}{path}", self.config.host_url))
            .basic_auth(&self.config.user_token, Some(""))
    }

    /// Issue search parameters. Imported lint issues carry the engine
    /// id, not a language tag, so the filter goes through `engineId`.
    fn violations_query(&self, project_key: &str) -> [(&'static str, String); 3] {
        [
            ("componentKeys", project_key.to_string()),
            ("engineId", self.config.lint_engine.clone()),
            ("ps", ISSUE_PAGE_SIZE.to_string()),
        ]
    }
}

#[async_trait::async_trait]
impl QualityGateway for SonarGateway {
    async fn scan(&self, workdir: &Path, project_key: &str) -> crate::error::Result<()> {
        let script = self.scan_script(workdir, project_key);
        debug!(project_key, "Running scan toolchain");

        let mut command = tokio::process::Command::new("bash");
        command.arg("-c").arg(&script);
        let output = run_logged(command, project_key).await?;

        if !output.success() {
            return Err(ScanError::ExitCode {
                code: output.exit_code,
                project_key: project_key.to_string(),
            }
            .into());
        }
        info!(project_key, "Scan toolchain finished");
        Ok(())
    }

    async fn fetch_measures(&self, project_key: &str) -> crate::error::Result<Vec<Measure>> {
        let response = self
            .get("/api/measures/component")
            .query(&[("component", project_key), ("metricKeys", METRIC_KEYS)])
            .send()
            .await
            .map_err(|e| ScanError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::Measures(format!(
                "measures request for {project_key} returned HTTP {status}: {body}"
            ))
            .into());
        }

        let payload: MeasuresResponse = response
            .json()
            .await
            .map_err(|e| ScanError::Measures(e.to_string()))?;

        // Measures without a value (e.g. coverage with no tests) are
        // simply absent from the result.
        Ok(payload
            .component
            .measures
            .into_iter()
            .filter_map(|m| {
                m.value.map(|value| Measure {
                    metric: m.metric,
                    value,
                })
            })
            .collect())
    }

    async fn fetch_violations(&self, project_key: &str) -> crate::error::Result<SeverityCounts> {
        let response = self
            .get("/api/issues/search")
            .query(&self.violations_query(project_key))
            .send()
            .await
            .map_err(|e| ScanError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::Measures(format!(
                "issues request for {project_key} returned HTTP {status}: {body}"
            ))
            .into());
        }

        let payload: IssuesResponse = response
            .json()
            .await
            .map_err(|e| ScanError::Measures(e.to_string()))?;

        let mut counts = SeverityCounts::default();
        for issue in payload.issues {
            match Severity::parse(&issue.severity) {
                Some(severity) => counts.record(severity),
                None => warn!(severity = %issue.severity, "Skipping unknown issue severity"),
            }
        }
        Ok(counts)
    }
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct MeasuresResponse {
    component: ComponentBody,
}

#[derive(Deserialize)]
struct ComponentBody {
    #[serde(default)]
    measures: Vec<WireMeasure>,
}

#[derive(Deserialize)]
struct WireMeasure {
    metric: String,
    value: Option<String>,
}

#[derive(Deserialize)]
struct IssuesResponse {
    #[serde(default)]
    issues: Vec<WireIssue>,
}

#[derive(Deserialize)]
struct WireIssue {
    severity: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn gateway() -> SonarGateway {
        // Client construction needs a process-wide TLS provider.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        SonarGateway::new(ScannerSection {
            host_url: "http://sonar.internal:9000".to_string(),
            analysis_token: "squ_analysis".to_string(),
            user_token: "squ_user".to_string(),
            clone_root: PathBuf::from("/tmp/repositories"),
            lint_language: "java".to_string(),
            lint_engine: "pmd".to_string(),
            lint_report_root: PathBuf::from("/tmp/lint_result"),
            converter_script: PathBuf::from("/opt/scripts/pmd_to_sonar.py"),
        })
    }

    #[test]
    fn violations_query_filters_by_engine_id() {
        let query = gateway().violations_query("o_r");
        assert_eq!(query[0], ("componentKeys", "o_r".to_string()));
        assert_eq!(query[1], ("engineId", "pmd".to_string()));
        assert_eq!(query[2], ("ps", "500".to_string()));
    }

    #[test]
    fn scan_script_wires_the_toolchain_together() {
        let script = gateway().scan_script(Path::new("/tmp/repositories/o_r"), "o_r");
        assert!(script.contains("mkdir -p /tmp/lint_result/o_r"));
        assert!(script.contains("pmd check -d /tmp/repositories/o_r"));
        assert!(script.contains("-f xml"));
        assert!(script.contains("/opt/scripts/pmd_to_sonar.py"));
        assert!(script.contains("-Dsonar.projectKey=o_r"));
        assert!(script.contains("-Dsonar.host.url=http://sonar.internal:9000"));
        assert!(script.contains("-Dsonar.token=squ_analysis"));
        // lint-language files go to the lint tool, not the scanner
        assert!(script.contains("-Dsonar.exclusions=**/*.java"));
        assert!(script.contains("externalIssuesReportPaths=/tmp/lint_result/o_r/sonar_issues.json"));
    }

    #[test]
    fn measures_payload_drops_valueless_entries() {
        let json = r#"{
            "component": {
                "key": "o_r",
                "measures": [
                    {"metric": "bugs", "value": "2"},
                    {"metric": "coverage"},
                    {"metric": "ncloc_language_distribution", "value": "java=100;xml=20"}
                ]
            }
        }"#;
        let payload: MeasuresResponse = serde_json::from_str(json).unwrap();
        let measures: Vec<Measure> = payload
            .component
            .measures
            .into_iter()
            .filter_map(|m| m.value.map(|value| Measure { metric: m.metric, value }))
            .collect();
        assert_eq!(measures.len(), 2);
        assert!(measures.iter().all(|m| m.metric != "coverage"));
    }

    #[test]
    fn issues_payload_counts_by_severity() {
        let json = r#"{
            "total": 4,
            "issues": [
                {"severity": "BLOCKER"},
                {"severity": "MAJOR"},
                {"severity": "MAJOR"},
                {"severity": "WHIMSICAL"}
            ]
        }"#;
        let payload: IssuesResponse = serde_json::from_str(json).unwrap();
        let mut counts = SeverityCounts::default();
        for issue in payload.issues {
            if let Some(severity) = Severity::parse(&issue.severity) {
                counts.record(severity);
            }
        }
        assert_eq!(counts.blocker, 1);
        assert_eq!(counts.major, 2);
        assert_eq!(counts.total(), 3);
    }
}
