//! Persistence port for threads, comments, votes and karma.
//!
//! Every mutating method is a single atomic unit: either all of its effects
//! are committed or none are.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    comment::SortPolicy,
    models::{
        comment::{Comment, NewComment},
        thread::Thread,
    },
    vote::{VotableType, VoteChange, VoteKey, VoteValue},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A concurrent write got there first; the caller may retry.
    #[error("write conflict")]
    Conflict,

    #[error("{0} not found")]
    Missing(&'static str),

    #[error("{0:#}")]
    Backend(eyre::Report),
}

impl From<eyre::Report> for StoreError {
    fn from(e: eyre::Report) -> Self {
        StoreError::Backend(e)
    }
}

/// The parts of a thread or comment the vote ledger needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Votable {
    pub id: Uuid,
    pub votable_type: VotableType,
    pub score: i32,
    /// `None` for anonymous content.
    pub author_id: Option<Uuid>,
}

impl From<&Thread> for Votable {
    fn from(thread: &Thread) -> Self {
        Votable {
            id: thread.id,
            votable_type: VotableType::Thread,
            score: thread.score,
            author_id: thread.karma_owner(),
        }
    }
}

impl From<&Comment> for Votable {
    fn from(comment: &Comment) -> Self {
        Votable {
            id: comment.id,
            votable_type: VotableType::Comment,
            score: comment.score,
            author_id: comment.karma_owner(),
        }
    }
}

#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn thread(&self, id: Uuid) -> Result<Option<Thread>, StoreError>;

    async fn comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError>;

    async fn votable(
        &self,
        votable_type: VotableType,
        id: Uuid,
    ) -> Result<Option<Votable>, StoreError>;

    async fn vote(&self, key: &VoteKey) -> Result<Option<VoteValue>, StoreError>;

    /// The viewer's own votes on the given votables, keyed by votable id.
    async fn viewer_votes(
        &self,
        user_id: Uuid,
        votable_type: VotableType,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteValue>, StoreError>;

    /// Top-level comments of a thread that are visible in the tree: live
    /// comments, plus removed ones that have ever had a reply, so a chain of
    /// tombstones still leads to the live comments below it.
    async fn top_level_comments(
        &self,
        thread_id: Uuid,
        sort: SortPolicy,
    ) -> Result<Vec<Comment>, StoreError>;

    /// Direct replies of `parent_ids`, with the same visibility rule as
    /// [`BoardStore::top_level_comments`], ordered by `sort`.
    async fn child_comments(
        &self,
        thread_id: Uuid,
        parent_ids: &[Uuid],
        sort: SortPolicy,
    ) -> Result<Vec<Comment>, StoreError>;

    /// Writes the vote row, the votable's counters and the author's karma.
    /// Fails with [`StoreError::Conflict`] if the stored vote no longer
    /// matches `change.previous`. Returns the votable's new score.
    async fn apply_vote(&self, change: &VoteChange) -> Result<i32, StoreError>;

    /// Inserts the comment, bumps the thread's comment count and activity
    /// time, and the parent's reply count.
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, StoreError>;

    /// Soft-deletes a live comment and reverses the counters bumped by
    /// [`BoardStore::insert_comment`].
    async fn tombstone_comment(
        &self,
        id: Uuid,
        tombstone: &str,
        reason: &str,
    ) -> Result<(), StoreError>;

    /// Replaces the content of a live comment and marks it edited. A removed
    /// comment is reported as [`StoreError::Missing`].
    async fn update_comment_content(&self, id: Uuid, content: &str)
    -> Result<Comment, StoreError>;
}
