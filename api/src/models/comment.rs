use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

// Field order follows the `comments` table so rows load without an explicit
// select clause.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub parent_id: Option<Uuid>,
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
    /// Every reply ever attached, removed or not. Never decremented.
    pub child_count: i32,
    pub is_removed: bool,
    pub removed_reason: Option<String>,
    pub is_edited: bool,
    pub edited_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Comment {
    pub fn karma_owner(&self) -> Option<Uuid> {
        self.user_id.filter(|_| !self.is_anonymous)
    }

    /// Materialized path handed down to this comment's direct replies.
    pub fn child_path(&self) -> String {
        if self.path.is_empty() {
            self.id.to_string()
        } else {
            format!("{}.{}", self.path, self.id)
        }
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::comments)]
pub struct NewComment {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub content: String,
    pub is_anonymous: bool,
    pub anonymous_name: Option<String>,
    pub path: String,
    pub depth: i32,
}
