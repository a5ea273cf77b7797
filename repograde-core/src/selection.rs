//! Selection lifecycle: create, list, delete.
//!
//! Selections are immutable once saved; a changed repository set is a
//! new selection. Creation also seeds the PENDING status row so every
//! selection has a status from birth.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{NotFoundError, RepogradeError};
use crate::store::AnalysisStore;
use crate::types::{
    repo_set_key, AnalysisState, AnalysisStatus, RepoId, Repository, Selection, UserId,
};

/// Create a selection from repository ids, resolving each against the
/// user's snapshot. An exact repository set saved before (in any order)
/// is rejected as a duplicate.
pub async fn create_selection(
    store: &dyn AnalysisStore,
    user_id: UserId,
    repo_ids: &[RepoId],
) -> crate::error::Result<Selection> {
    let snapshot = store.repositories(user_id).await?;
    if snapshot.is_empty() {
        return Err(NotFoundError::Snapshot(user_id.0).into());
    }

    let repositories = resolve(&snapshot, repo_ids, user_id)?;

    let selection = Selection {
        id: Uuid::new_v4().to_string(),
        user_id,
        repositories,
        created_at: Utc::now(),
    };

    let set_key = repo_set_key(&selection.repo_id_set());
    if store
        .find_selection_by_set(user_id, &set_key)
        .await?
        .is_some()
    {
        return Err(RepogradeError::DuplicateSelection(set_key));
    }

    store.save_selection(&selection).await?;
    store
        .set_status(&AnalysisStatus {
            user_id,
            selection_id: selection.id.clone(),
            state: AnalysisState::Pending,
            updated_at: Utc::now(),
        })
        .await?;

    info!(
        selection_id = %selection.id,
        user_id = %user_id,
        repos = selection.repositories.len(),
        "Selection created"
    );
    Ok(selection)
}

fn resolve(
    snapshot: &[Repository],
    repo_ids: &[RepoId],
    user_id: UserId,
) -> crate::error::Result<Vec<Repository>> {
    repo_ids
        .iter()
        .map(|id| {
            snapshot
                .iter()
                .find(|r| r.repo_id == *id)
                .cloned()
                .ok_or_else(|| NotFoundError::Snapshot(user_id.0).into())
        })
        .collect()
}

/// All of a user's selections, each with its current status row.
pub async fn list_selections(
    store: &dyn AnalysisStore,
    user_id: UserId,
) -> crate::error::Result<Vec<(Selection, Option<AnalysisStatus>)>> {
    let selections = store.list_selections(user_id).await?;
    let mut annotated = Vec::with_capacity(selections.len());
    for selection in selections {
        let status = store.get_status(user_id, &selection.id).await?;
        annotated.push((selection, status));
    }
    Ok(annotated)
}

/// Delete a selection, its status row, and its result history.
pub async fn delete_selection(
    store: &dyn AnalysisStore,
    selection_id: &str,
) -> crate::error::Result<()> {
    if store.get_selection(selection_id).await?.is_none() {
        return Err(NotFoundError::Selection(selection_id.to_string()).into());
    }
    store.delete_selection(selection_id).await?;
    info!(selection_id, "Selection deleted");
    Ok(())
}
