use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    comment::SortPolicy,
    models::{
        comment::{Comment, NewComment},
        thread::Thread,
        user::User,
    },
    vote::{VotableType, VoteChange, VoteKey, VoteValue},
};

use super::{BoardStore, StoreError, Votable};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    threads: HashMap<Uuid, Thread>,
    comments: HashMap<Uuid, Comment>,
    votes: HashMap<VoteKey, VoteValue>,
}

impl State {
    fn visible_comments<F>(&self, keep: F, sort: SortPolicy) -> Vec<Comment>
    where
        F: Fn(&Comment) -> bool,
    {
        let mut rows: Vec<Comment> = self
            .comments
            .values()
            .filter(|c| keep(c) && (!c.is_removed || c.child_count > 0))
            .cloned()
            .collect();
        rows.sort_by(|a, b| sort.compare(a, b));
        rows
    }
}

/// Process-local store. A single lock around the whole state makes every
/// mutation atomic; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    pending_conflicts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_thread(&self, thread: Thread) {
        self.state.lock().await.threads.insert(thread.id, thread);
    }

    /// Stores a comment row as-is, without touching any counters.
    pub async fn insert_comment_row(&self, comment: Comment) {
        self.state.lock().await.comments.insert(comment.id, comment);
    }

    pub async fn user(&self, id: Uuid) -> Option<User> {
        self.state.lock().await.users.get(&id).cloned()
    }

    pub async fn vote_count(&self) -> usize {
        self.state.lock().await.votes.len()
    }

    /// Makes the next `n` calls to [`BoardStore::apply_vote`] fail with a
    /// write conflict before touching any state.
    pub fn fail_next_votes(&self, n: usize) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    fn take_injected_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn thread(&self, id: Uuid) -> Result<Option<Thread>, StoreError> {
        Ok(self.state.lock().await.threads.get(&id).cloned())
    }

    async fn comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        Ok(self.state.lock().await.comments.get(&id).cloned())
    }

    async fn votable(
        &self,
        votable_type: VotableType,
        id: Uuid,
    ) -> Result<Option<Votable>, StoreError> {
        let state = self.state.lock().await;
        Ok(match votable_type {
            VotableType::Thread => state.threads.get(&id).map(Votable::from),
            VotableType::Comment => state.comments.get(&id).map(Votable::from),
        })
    }

    async fn vote(&self, key: &VoteKey) -> Result<Option<VoteValue>, StoreError> {
        Ok(self.state.lock().await.votes.get(key).copied())
    }

    async fn viewer_votes(
        &self,
        user_id: Uuid,
        votable_type: VotableType,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteValue>, StoreError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|&votable_id| {
                let key = VoteKey {
                    user_id,
                    votable_id,
                    votable_type,
                };
                state.votes.get(&key).map(|v| (votable_id, *v))
            })
            .collect())
    }

    async fn top_level_comments(
        &self,
        thread_id: Uuid,
        sort: SortPolicy,
    ) -> Result<Vec<Comment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.visible_comments(
            |c| c.thread_id == thread_id && c.parent_id.is_none(),
            sort,
        ))
    }

    async fn child_comments(
        &self,
        thread_id: Uuid,
        parent_ids: &[Uuid],
        sort: SortPolicy,
    ) -> Result<Vec<Comment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.visible_comments(
            |c| {
                c.thread_id == thread_id
                    && c.parent_id.is_some_and(|p| parent_ids.contains(&p))
            },
            sort,
        ))
    }

    async fn apply_vote(&self, change: &VoteChange) -> Result<i32, StoreError> {
        let mut state = self.state.lock().await;

        if self.take_injected_conflict() {
            return Err(StoreError::Conflict);
        }

        let key = change.key;
        if state.votes.get(&key).copied() != change.previous {
            return Err(StoreError::Conflict);
        }

        let delta = change.delta;
        let (score, author) = match key.votable_type {
            VotableType::Thread => {
                let thread = state
                    .threads
                    .get_mut(&key.votable_id)
                    .ok_or(StoreError::Missing("thread"))?;
                thread.score += delta.score;
                thread.upvote_count += delta.upvotes;
                thread.downvote_count += delta.downvotes;
                (thread.score, thread.karma_owner())
            }
            VotableType::Comment => {
                let comment = state
                    .comments
                    .get_mut(&key.votable_id)
                    .ok_or(StoreError::Missing("comment"))?;
                comment.score += delta.score;
                comment.upvote_count += delta.upvotes;
                comment.downvote_count += delta.downvotes;
                (comment.score, comment.karma_owner())
            }
        };

        match change.next {
            Some(value) => {
                state.votes.insert(key, value);
            }
            None => {
                state.votes.remove(&key);
            }
        }

        if let Some(author) = author
            && delta.score != 0
            && let Some(user) = state.users.get_mut(&author)
        {
            user.karma_score += delta.score;
            match key.votable_type {
                VotableType::Thread => user.post_karma += delta.score,
                VotableType::Comment => user.comment_karma += delta.score,
            }
        }

        Ok(score)
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, StoreError> {
        let mut state = self.state.lock().await;
        let now = chrono::Utc::now().naive_utc();

        if !state.threads.contains_key(&new.thread_id) {
            return Err(StoreError::Missing("thread"));
        }
        if let Some(parent_id) = new.parent_id
            && !state.comments.contains_key(&parent_id)
        {
            return Err(StoreError::Missing("parent comment"));
        }

        if let Some(thread) = state.threads.get_mut(&new.thread_id) {
            thread.comment_count += 1;
            thread.last_activity_at = now;
        }
        if let Some(parent) = new.parent_id.and_then(|p| state.comments.get_mut(&p)) {
            parent.reply_count += 1;
            parent.child_count += 1;
        }

        let comment = Comment {
            id: new.id,
            thread_id: new.thread_id,
            parent_id: new.parent_id,
            user_id: new.user_id,
            content: new.content,
            is_anonymous: new.is_anonymous,
            anonymous_name: new.anonymous_name,
            path: new.path,
            depth: new.depth,
            score: 0,
            upvote_count: 0,
            downvote_count: 0,
            reply_count: 0,
            child_count: 0,
            is_removed: false,
            removed_reason: None,
            is_edited: false,
            edited_at: None,
            created_at: now,
            updated_at: now,
        };
        state.comments.insert(comment.id, comment.clone());

        Ok(comment)
    }

    async fn tombstone_comment(
        &self,
        id: Uuid,
        tombstone: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        let comment = state
            .comments
            .get_mut(&id)
            .filter(|c| !c.is_removed)
            .ok_or(StoreError::Missing("comment"))?;
        comment.is_removed = true;
        comment.content = tombstone.to_string();
        comment.removed_reason = Some(reason.to_string());
        comment.updated_at = chrono::Utc::now().naive_utc();
        let (thread_id, parent_id) = (comment.thread_id, comment.parent_id);

        if let Some(thread) = state.threads.get_mut(&thread_id) {
            thread.comment_count -= 1;
        }
        if let Some(parent) = parent_id.and_then(|p| state.comments.get_mut(&p)) {
            parent.reply_count -= 1;
        }

        Ok(())
    }

    async fn update_comment_content(
        &self,
        id: Uuid,
        content: &str,
    ) -> Result<Comment, StoreError> {
        let mut state = self.state.lock().await;
        let now = chrono::Utc::now().naive_utc();

        let comment = state
            .comments
            .get_mut(&id)
            .filter(|c| !c.is_removed)
            .ok_or(StoreError::Missing("comment"))?;
        comment.content = content.to_string();
        comment.is_edited = true;
        comment.edited_at = Some(now);
        comment.updated_at = now;

        Ok(comment.clone())
    }
}
