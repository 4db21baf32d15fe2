use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    App,
    error::{AppError, BoardError},
    identity::Viewer,
    store::BoardStore,
};

use super::{REMOVED_BY_AUTHOR, TOMBSTONE};

pub async fn delete_comment(
    State(app): State<App>,
    Path(id): Path<Uuid>,
    Viewer(requester): Viewer,
) -> Result<StatusCode, AppError> {
    remove_comment(app.store.as_ref(), id, requester).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Soft-deletes a comment on behalf of its author. The row stays behind as a
/// tombstone so replies keep their parent.
pub async fn remove_comment(
    store: &dyn BoardStore,
    comment_id: Uuid,
    requester: Uuid,
) -> Result<(), BoardError> {
    let comment = store
        .comment(comment_id)
        .await?
        .filter(|c| !c.is_removed)
        .ok_or(BoardError::NotFound("comment"))?;

    if comment.user_id != Some(requester) {
        return Err(BoardError::Forbidden("comment"));
    }

    store
        .tombstone_comment(comment_id, TOMBSTONE, REMOVED_BY_AUTHOR)
        .await?;

    tracing::info!(%comment_id, thread_id = %comment.thread_id, "comment removed by author");

    Ok(())
}
