use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    App,
    error::{AppError, BoardError},
    identity::Viewer,
    json::Json,
    models::comment::Comment,
    store::BoardStore,
};

use super::{CommentNode, validate_content};

#[derive(Deserialize)]
pub struct CommentEdit {
    content: String,
}

pub async fn patch_comment(
    State(app): State<App>,
    Path(id): Path<Uuid>,
    Viewer(requester): Viewer,
    Json(edit): Json<CommentEdit>,
) -> Result<axum::Json<CommentNode>, AppError> {
    let comment = edit_comment(app.store.as_ref(), id, requester, &edit.content).await?;
    Ok(axum::Json(CommentNode::new(comment, 0)))
}

pub async fn edit_comment(
    store: &dyn BoardStore,
    comment_id: Uuid,
    requester: Uuid,
    content: &str,
) -> Result<Comment, BoardError> {
    let content = validate_content(content)?;

    let comment = store
        .comment(comment_id)
        .await?
        .filter(|c| !c.is_removed)
        .ok_or(BoardError::NotFound("comment"))?;

    if comment.user_id != Some(requester) {
        return Err(BoardError::Forbidden("comment"));
    }

    Ok(store.update_comment_content(comment_id, &content).await?)
}
