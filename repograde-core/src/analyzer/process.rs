//! Child-process plumbing for the scanner toolchain.
//!
//! Both output streams are drained concurrently while the process runs;
//! a scanner that fills one pipe while we block on the other would
//! deadlock otherwise. The exit status is only observed after both
//! drains finish.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ScanError;

/// Exit code and captured output of a finished child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawn a command, stream its output into the log line by line, and
/// wait for it to exit.
pub async fn run_logged(mut command: Command, label: &str) -> Result<CommandOutput, ScanError> {
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| ScanError::Process(format!("{label}: failed to spawn: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ScanError::Process(format!("{label}: stdout not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ScanError::Process(format!("{label}: stderr not captured")))?;

    let out_label = label.to_string();
    let err_label = label.to_string();
    let out_task = tokio::spawn(drain(stdout, out_label, false));
    let err_task = tokio::spawn(drain(stderr, err_label, true));

    let stdout_lines = out_task
        .await
        .map_err(|e| ScanError::Process(format!("{label}: stdout drain panicked: {e}")))?
        .map_err(ScanError::Io)?;
    let stderr_lines = err_task
        .await
        .map_err(|e| ScanError::Process(format!("{label}: stderr drain panicked: {e}")))?
        .map_err(ScanError::Io)?;

    // Both pipes are at EOF here, so the wait cannot deadlock.
    let status = child
        .wait()
        .await
        .map_err(|e| ScanError::Process(format!("{label}: wait failed: {e}")))?;

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout: stdout_lines,
        stderr: stderr_lines,
    })
}

async fn drain<R>(reader: R, label: String, is_err: bool) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin + Send,
{
    let mut lines = BufReader::new(reader).lines();
    let mut captured = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if is_err {
            warn!(target: "repograde::scanner", %label, "{line}");
        } else {
            debug!(target: "repograde::scanner", %label, "{line}");
        }
        captured.push(line);
    }
    Ok(captured)
}
