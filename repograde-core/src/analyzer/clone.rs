use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ScanError;

/// Ensure a working copy exists at `dest`, cloning if needed.
///
/// An existing directory is reused as-is, without a fetch. The copy may
/// therefore lag the remote until it is removed; repeated runs trade
/// freshness for not re-cloning.
pub async fn prepare_working_copy(url: &str, dest: &Path) -> crate::error::Result<PathBuf> {
    if dest.exists() {
        debug!(path = %dest.display(), "Reusing existing working copy");
        return Ok(dest.to_path_buf());
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(ScanError::Io)?;
    }

    info!(url, path = %dest.display(), "Cloning repository");
    let url_owned = url.to_string();
    let dest_owned = dest.to_path_buf();
    tokio::task::spawn_blocking(move || clone_blocking(&url_owned, &dest_owned))
        .await
        .map_err(|e| ScanError::Process(format!("clone task panicked: {e}")))??;

    Ok(dest.to_path_buf())
}

fn clone_blocking(url: &str, dest: &Path) -> Result<(), ScanError> {
    let clone_err = |e: String| ScanError::Clone {
        url: url.to_string(),
        message: e,
    };

    let mut prepare = gix::prepare_clone(url, dest).map_err(|e| clone_err(e.to_string()))?;
    let (mut checkout, _fetch_outcome) = prepare
        .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| clone_err(e.to_string()))?;
    let (_repo, _checkout_outcome) = checkout
        .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| clone_err(e.to_string()))?;
    Ok(())
}
