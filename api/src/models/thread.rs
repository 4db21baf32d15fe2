use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::threads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Thread {
    pub id: Uuid,
    pub category_id: Uuid,
    pub user_id: Option<Uuid>,
    pub title: String,
    pub content: Option<String>,
    pub is_anonymous: bool,
    pub anonymous_name: Option<String>,
    pub score: i32,
    pub upvote_count: i32,
    pub downvote_count: i32,
    pub comment_count: i32,
    pub is_locked: bool,
    pub is_removed: bool,
    pub last_activity_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Thread {
    /// The author whose karma follows this thread's votes, if any.
    pub fn karma_owner(&self) -> Option<Uuid> {
        self.user_id.filter(|_| !self.is_anonymous)
    }
}
