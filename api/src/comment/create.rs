use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    App,
    error::{AppError, BoardError},
    identity::MaybeViewer,
    json::Json,
    models::comment::{Comment, NewComment},
    store::BoardStore,
};

use super::{CommentNode, MAX_ANONYMOUS_NAME_LEN, validate_content};

pub async fn create_comment(
    State(app): State<App>,
    MaybeViewer(viewer): MaybeViewer,
    Json(submission): Json<CommentSubmission>,
) -> Result<(StatusCode, axum::Json<CommentNode>), AppError> {
    let author = match viewer {
        Ok(id) => Some(id),
        Err(e) if !submission.is_anonymous => return Err(e.into()),
        Err(_) => None,
    };

    let comment = add_comment(app.store.as_ref(), author, submission).await?;

    Ok((StatusCode::CREATED, axum::Json(CommentNode::new(comment, 0))))
}

#[derive(Deserialize, Debug, Clone)]
pub struct CommentSubmission {
    pub thread_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
    pub anonymous_name: Option<String>,
}

impl CommentSubmission {
    fn validate(&mut self) -> Result<(), &'static str> {
        self.content = validate_content(&self.content)?;

        if !self.is_anonymous {
            self.anonymous_name = None;
        }

        if let Some(name) = self.anonymous_name.take() {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err("Anonymous name must not be empty");
            }

            if name.chars().count() > MAX_ANONYMOUS_NAME_LEN {
                return Err("Anonymous name too long (max 50 characters)");
            }

            self.anonymous_name = Some(name);
        }

        Ok(())
    }
}

/// Adds a comment to a thread, as a reply when `parent_id` is set.
/// Anonymous comments are stored without an author.
pub async fn add_comment(
    store: &dyn BoardStore,
    author: Option<Uuid>,
    mut submission: CommentSubmission,
) -> Result<Comment, BoardError> {
    submission.validate()?;

    let user_id = match (submission.is_anonymous, author) {
        (true, _) => None,
        (false, Some(author)) => Some(author),
        (false, None) => {
            return Err(BoardError::Invalid(
                "A comment that is not anonymous needs an author".into(),
            ));
        }
    };

    let thread = store
        .thread(submission.thread_id)
        .await?
        .filter(|t| !t.is_removed)
        .ok_or(BoardError::NotFound("thread"))?;

    if thread.is_locked {
        return Err(BoardError::Locked);
    }

    let parent = match submission.parent_id {
        Some(parent_id) => {
            let parent = store
                .comment(parent_id)
                .await?
                .ok_or(BoardError::NotFound("parent comment"))?;

            if parent.thread_id != thread.id {
                return Err(BoardError::CrossThread);
            }
            Some(parent)
        }
        None => None,
    };

    let new = NewComment {
        id: Uuid::new_v4(),
        thread_id: thread.id,
        parent_id: parent.as_ref().map(|p| p.id),
        user_id,
        content: submission.content,
        is_anonymous: submission.is_anonymous,
        anonymous_name: submission.anonymous_name,
        path: parent.as_ref().map(Comment::child_path).unwrap_or_default(),
        depth: parent.as_ref().map_or(0, |p| p.depth + 1),
    };

    let comment = store.insert_comment(new).await?;
    tracing::debug!(
        comment_id = %comment.id,
        thread_id = %comment.thread_id,
        depth = comment.depth,
        "added comment"
    );

    Ok(comment)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        comment::fixtures::{comment, thread},
        store::MemoryStore,
    };

    fn submission(thread_id: Uuid, parent_id: Option<Uuid>) -> CommentSubmission {
        CommentSubmission {
            thread_id,
            parent_id,
            content: "  Nice thread  ".into(),
            is_anonymous: false,
            anonymous_name: None,
        }
    }

    #[tokio::test]
    async fn test_reply_updates_counters_and_path() {
        let store = MemoryStore::new();
        let t = thread(None);
        store.insert_thread(t.clone()).await;
        let author = Uuid::new_v4();

        let top = add_comment(&store, Some(author), submission(t.id, None))
            .await
            .unwrap();
        assert_eq!(top.content, "Nice thread");
        assert_eq!(top.depth, 0);
        assert_eq!(top.path, "");
        assert_eq!(top.user_id, Some(author));

        let reply = add_comment(&store, Some(author), submission(t.id, Some(top.id)))
            .await
            .unwrap();
        let nested = add_comment(&store, Some(author), submission(t.id, Some(reply.id)))
            .await
            .unwrap();
        assert_eq!(reply.depth, 1);
        assert_eq!(reply.path, top.id.to_string());
        assert_eq!(nested.depth, 2);
        assert_eq!(nested.path, format!("{}.{}", top.id, reply.id));

        let t = store.thread(t.id).await.unwrap().unwrap();
        assert_eq!(t.comment_count, 3);
        let top = store.comment(top.id).await.unwrap().unwrap();
        assert_eq!(top.reply_count, 1);
    }

    #[tokio::test]
    async fn test_anonymous_comment_has_no_author() {
        let store = MemoryStore::new();
        let t = thread(None);
        store.insert_thread(t.clone()).await;

        let mut sub = submission(t.id, None);
        sub.is_anonymous = true;
        sub.anonymous_name = Some(" Ghost ".into());

        let c = add_comment(&store, Some(Uuid::new_v4()), sub).await.unwrap();
        assert!(c.is_anonymous);
        assert_eq!(c.user_id, None);
        assert_eq!(c.anonymous_name.as_deref(), Some("Ghost"));
    }

    #[tokio::test]
    async fn test_named_comment_needs_author() {
        let store = MemoryStore::new();
        let t = thread(None);
        store.insert_thread(t.clone()).await;

        let result = add_comment(&store, None, submission(t.id, None)).await;
        assert!(matches!(result, Err(BoardError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_thread_must_be_open() {
        let store = MemoryStore::new();
        let author = Some(Uuid::new_v4());

        let missing = add_comment(&store, author, submission(Uuid::new_v4(), None)).await;
        assert!(matches!(missing, Err(BoardError::NotFound("thread"))));

        let mut removed = thread(None);
        removed.is_removed = true;
        store.insert_thread(removed.clone()).await;
        let result = add_comment(&store, author, submission(removed.id, None)).await;
        assert!(matches!(result, Err(BoardError::NotFound("thread"))));

        let mut locked = thread(None);
        locked.is_locked = true;
        store.insert_thread(locked.clone()).await;
        let result = add_comment(&store, author, submission(locked.id, None)).await;
        assert!(matches!(result, Err(BoardError::Locked)));
        assert_eq!(
            store.thread(locked.id).await.unwrap().unwrap().comment_count,
            0
        );
    }

    #[tokio::test]
    async fn test_parent_must_exist_in_same_thread() {
        let store = MemoryStore::new();
        let here = thread(None);
        let elsewhere = thread(None);
        store.insert_thread(here.clone()).await;
        store.insert_thread(elsewhere.clone()).await;
        let foreign = comment(elsewhere.id, None, None);
        store.insert_comment_row(foreign.clone()).await;
        let author = Some(Uuid::new_v4());

        let result = add_comment(&store, author, submission(here.id, Some(foreign.id))).await;
        assert!(matches!(result, Err(BoardError::CrossThread)));

        let result = add_comment(&store, author, submission(here.id, Some(Uuid::new_v4()))).await;
        assert!(matches!(result, Err(BoardError::NotFound("parent comment"))));
    }

    #[tokio::test]
    async fn test_content_is_validated() {
        let store = MemoryStore::new();
        let t = thread(None);
        store.insert_thread(t.clone()).await;

        let mut blank = submission(t.id, None);
        blank.content = "   ".into();
        let result = add_comment(&store, Some(Uuid::new_v4()), blank).await;
        assert!(matches!(result, Err(BoardError::Invalid(_))));

        let mut long_name = submission(t.id, None);
        long_name.is_anonymous = true;
        long_name.anonymous_name = Some("x".repeat(51));
        let result = add_comment(&store, None, long_name).await;
        assert!(matches!(result, Err(BoardError::Invalid(_))));
    }
}
