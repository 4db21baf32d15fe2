pub mod create;
pub mod delete;
pub mod get;
pub mod patch;
pub mod routes;

use std::{cmp::Ordering, str::FromStr};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::comment::Comment;

/// Content left behind by a removed comment.
pub const TOMBSTONE: &str = "[deleted]";
pub const REMOVED_BY_AUTHOR: &str = "Deleted by author";

pub const MAX_CONTENT_LEN: usize = 10_000;
pub const MAX_ANONYMOUS_NAME_LEN: usize = 50;

/// Trims the content and checks it is within the allowed length.
pub fn validate_content(content: &str) -> Result<String, &'static str> {
    let content = content.trim();

    if content.is_empty() {
        return Err("Content must not be empty");
    }

    if content.chars().count() > MAX_CONTENT_LEN {
        return Err("Content too long (max 10000 characters)");
    }

    Ok(content.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortPolicy {
    #[default]
    Best,
    New,
    Old,
    /// Most upvotes first, then most downvotes. Rewards engagement rather
    /// than an actual up/down balance.
    Controversial,
}

impl SortPolicy {
    /// Sibling order for this policy. Remaining ties fall back to the id so
    /// the order is total.
    pub fn compare(self, a: &Comment, b: &Comment) -> Ordering {
        let primary = match self {
            SortPolicy::New => b.created_at.cmp(&a.created_at),
            SortPolicy::Old => a.created_at.cmp(&b.created_at),
            SortPolicy::Best => b
                .score
                .cmp(&a.score)
                .then_with(|| b.created_at.cmp(&a.created_at)),
            SortPolicy::Controversial => b
                .upvote_count
                .cmp(&a.upvote_count)
                .then_with(|| b.downvote_count.cmp(&a.downvote_count)),
        };

        primary.then_with(|| a.id.cmp(&b.id))
    }
}

impl FromStr for SortPolicy {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(SortPolicy::Best),
            "new" => Ok(SortPolicy::New),
            "old" => Ok(SortPolicy::Old),
            "controversial" => Ok(SortPolicy::Controversial),
            _ => Err("invalid sort type"),
        }
    }
}

impl<'de> Deserialize<'de> for SortPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

// The model that will be returned to the client
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommentNode {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub parent_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub content: String,
    pub is_anonymous: bool,
    pub anonymous_name: Option<String>,
    pub path: String,
    pub depth: i32,
    pub score: i32,
    pub upvote_count: i32,
    pub downvote_count: i32,
    pub reply_count: i32,
    pub is_removed: bool,
    pub is_edited: bool,
    pub edited_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    /// The viewer's own vote: 1, -1, or 0 when there is none.
    pub user_vote: i16,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn new(comment: Comment, user_vote: i16) -> Self {
        CommentNode {
            id: comment.id,
            thread_id: comment.thread_id,
            parent_id: comment.parent_id,
            user_id: comment.karma_owner(),
            content: comment.content,
            is_anonymous: comment.is_anonymous,
            anonymous_name: comment.anonymous_name,
            path: comment.path,
            depth: comment.depth,
            score: comment.score,
            upvote_count: comment.upvote_count,
            downvote_count: comment.downvote_count,
            reply_count: comment.reply_count,
            is_removed: comment.is_removed,
            is_edited: comment.is_edited,
            edited_at: comment.edited_at,
            created_at: comment.created_at,
            user_vote,
            replies: vec![],
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{NaiveDate, NaiveDateTime};
    use uuid::Uuid;

    use crate::models::{comment::Comment, thread::Thread, user::User};

    pub fn at(minutes: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::try_minutes(minutes).unwrap()
    }

    pub fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.into(),
            karma_score: 0,
            post_karma: 0,
            comment_karma: 0,
            created_at: at(0),
        }
    }

    pub fn thread(author: Option<Uuid>) -> Thread {
        Thread {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            user_id: author,
            title: "A thread".into(),
            content: Some("Body".into()),
            is_anonymous: author.is_none(),
            anonymous_name: None,
            score: 0,
            upvote_count: 0,
            downvote_count: 0,
            comment_count: 0,
            is_locked: false,
            is_removed: false,
            last_activity_at: at(0),
            created_at: at(0),
            updated_at: at(0),
        }
    }

    /// A top-level comment when `parent` is `None`, otherwise a reply whose
    /// path and depth follow the parent.
    pub fn comment(thread_id: Uuid, parent: Option<&Comment>, author: Option<Uuid>) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            thread_id,
            parent_id: parent.map(|p| p.id),
            user_id: author,
            content: "Content".into(),
            is_anonymous: author.is_none(),
            anonymous_name: None,
            path: parent.map(Comment::child_path).unwrap_or_default(),
            depth: parent.map_or(0, |p| p.depth + 1),
            score: 0,
            upvote_count: 0,
            downvote_count: 0,
            reply_count: 0,
            child_count: 0,
            is_removed: false,
            removed_reason: None,
            is_edited: false,
            edited_at: None,
            created_at: at(0),
            updated_at: at(0),
        }
    }
}
