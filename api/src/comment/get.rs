use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    App,
    error::{AppError, BoardError},
    identity::MaybeViewer,
    models::comment::Comment,
    store::BoardStore,
    vote::VotableType,
};

use super::{CommentNode, SortPolicy};

/// Levels returned when the request does not ask for a depth.
pub const DEFAULT_DEPTH: usize = 5;

#[derive(Deserialize)]
pub struct TreeQuery {
    sort: Option<SortPolicy>,
    depth: Option<usize>,
}

pub async fn get_comments(
    State(app): State<App>,
    Path(thread_id): Path<Uuid>,
    Query(q): Query<TreeQuery>,
    viewer: MaybeViewer,
) -> Result<Json<Vec<CommentNode>>, AppError> {
    let depth = q
        .depth
        .unwrap_or(DEFAULT_DEPTH)
        .min(app.config.max_comment_depth)
        .max(1);

    let tree = build_comment_tree(
        app.store.as_ref(),
        thread_id,
        q.sort.unwrap_or_default(),
        depth,
        viewer.id(),
    )
    .await?;

    Ok(Json(tree))
}

/// Loads the comment tree of a thread breadth first, one store query per
/// level. `max_depth` is the number of levels returned, so `1` yields only
/// the top-level comments with empty replies.
pub async fn build_comment_tree(
    store: &dyn BoardStore,
    thread_id: Uuid,
    sort: SortPolicy,
    max_depth: usize,
    viewer: Option<Uuid>,
) -> Result<Vec<CommentNode>, BoardError> {
    store
        .thread(thread_id)
        .await?
        .filter(|t| !t.is_removed)
        .ok_or(BoardError::NotFound("thread"))?;

    let max_depth = max_depth.max(1);
    let mut levels: Vec<Vec<CommentNode>> = Vec::new();
    let mut current = store.top_level_comments(thread_id, sort).await?;

    while !current.is_empty() {
        let ids: Vec<Uuid> = current.iter().map(|c| c.id).collect();
        levels.push(attach_votes(store, viewer, current).await?);

        if levels.len() >= max_depth {
            break;
        }

        current = store.child_comments(thread_id, &ids, sort).await?;
    }

    tracing::debug!(%thread_id, levels = levels.len(), ?sort, "loaded comment tree");

    Ok(assemble(levels))
}

async fn attach_votes(
    store: &dyn BoardStore,
    viewer: Option<Uuid>,
    comments: Vec<Comment>,
) -> Result<Vec<CommentNode>, BoardError> {
    let votes = match viewer {
        Some(user_id) => {
            let ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
            store
                .viewer_votes(user_id, VotableType::Comment, &ids)
                .await?
        }
        None => HashMap::new(),
    };

    Ok(comments
        .into_iter()
        .map(|c| {
            let user_vote = votes.get(&c.id).map_or(0, |v| v.signum());
            CommentNode::new(c, user_vote)
        })
        .collect())
}

/// Nests each level under the one above it, deepest level first. Every
/// level must already be in sibling order; the order is kept within each
/// parent's replies.
pub fn assemble(mut levels: Vec<Vec<CommentNode>>) -> Vec<CommentNode> {
    let mut below: HashMap<Uuid, Vec<CommentNode>> = HashMap::new();

    while let Some(level) = levels.pop() {
        let mut grouped: HashMap<Uuid, Vec<CommentNode>> = HashMap::new();
        let mut roots = Vec::new();

        for mut node in level {
            node.replies = below.remove(&node.id).unwrap_or_default();
            match node.parent_id {
                Some(parent_id) => grouped.entry(parent_id).or_default().push(node),
                None => roots.push(node),
            }
        }

        if levels.is_empty() {
            return roots;
        }
        below = grouped;
    }

    vec![]
}
