use std::collections::HashMap;

use async_trait::async_trait;
use diesel::{
    pg::Pg,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::{
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
    pooled_connection::{
        AsyncDieselConnectionManager,
        deadpool::{Object, Pool, PoolError},
    },
    scoped_futures::ScopedFutureExt,
};
use uuid::Uuid;

use crate::{
    comment::SortPolicy,
    models::{
        comment::{Comment, NewComment},
        thread::Thread,
        vote::NewVote,
    },
    schema::{comments, threads, users, votes},
    vote::{VotableType, VoteChange, VoteKey, VoteValue},
};

use super::{BoardStore, StoreError, Votable};

pub type DbPool = Pool<AsyncPgConnection>;

impl From<DieselError> for StoreError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                StoreError::Conflict
            }
            e => StoreError::Backend(eyre::Report::new(e)),
        }
    }
}

impl From<PoolError> for StoreError {
    fn from(e: PoolError) -> Self {
        StoreError::Backend(eyre::Report::new(e))
    }
}

fn decode_vote(value: i16) -> Result<VoteValue, StoreError> {
    VoteValue::try_from(value)
        .map_err(|e| StoreError::Backend(eyre::eyre!("corrupt vote row ({value}): {e}")))
}

fn ordered<'a>(
    query: comments::BoxedQuery<'a, Pg>,
    sort: SortPolicy,
) -> comments::BoxedQuery<'a, Pg> {
    match sort {
        SortPolicy::New => query.order((comments::created_at.desc(), comments::id.asc())),
        SortPolicy::Old => query.order((comments::created_at.asc(), comments::id.asc())),
        SortPolicy::Best => query.order((
            comments::score.desc(),
            comments::created_at.desc(),
            comments::id.asc(),
        )),
        SortPolicy::Controversial => query.order((
            comments::upvote_count.desc(),
            comments::downvote_count.desc(),
            comments::id.asc(),
        )),
    }
}

/// Postgres-backed store. Counter updates are written as `col = col + Δ`
/// so concurrent transactions never lose an increment.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn connect(database_url: &str, max_connections: usize) -> Result<Self, eyre::Error> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager).max_size(max_connections).build()?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<Object<AsyncPgConnection>, StoreError> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl BoardStore for PgStore {
    async fn thread(&self, id: Uuid) -> Result<Option<Thread>, StoreError> {
        let mut conn = self.conn().await?;
        Ok(threads::table
            .find(id)
            .first::<Thread>(&mut conn)
            .await
            .optional()?)
    }

    async fn comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        let mut conn = self.conn().await?;
        Ok(comments::table
            .find(id)
            .first::<Comment>(&mut conn)
            .await
            .optional()?)
    }

    async fn votable(
        &self,
        votable_type: VotableType,
        id: Uuid,
    ) -> Result<Option<Votable>, StoreError> {
        let mut conn = self.conn().await?;
        let row = match votable_type {
            VotableType::Thread => {
                threads::table
                    .find(id)
                    .select((threads::score, threads::user_id, threads::is_anonymous))
                    .first::<(i32, Option<Uuid>, bool)>(&mut conn)
                    .await
            }
            VotableType::Comment => {
                comments::table
                    .find(id)
                    .select((comments::score, comments::user_id, comments::is_anonymous))
                    .first::<(i32, Option<Uuid>, bool)>(&mut conn)
                    .await
            }
        }
        .optional()?;

        Ok(row.map(|(score, user_id, is_anonymous)| Votable {
            id,
            votable_type,
            score,
            author_id: user_id.filter(|_| !is_anonymous),
        }))
    }

    async fn vote(&self, key: &VoteKey) -> Result<Option<VoteValue>, StoreError> {
        let mut conn = self.conn().await?;
        votes::table
            .find((key.user_id, key.votable_id, key.votable_type.as_str()))
            .select(votes::vote_value)
            .first::<i16>(&mut conn)
            .await
            .optional()?
            .map(decode_vote)
            .transpose()
    }

    async fn viewer_votes(
        &self,
        user_id: Uuid,
        votable_type: VotableType,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteValue>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.conn().await?;
        let rows = votes::table
            .filter(votes::user_id.eq(user_id))
            .filter(votes::votable_type.eq(votable_type.as_str()))
            .filter(votes::votable_id.eq_any(ids.to_vec()))
            .select((votes::votable_id, votes::vote_value))
            .load::<(Uuid, i16)>(&mut conn)
            .await?;

        rows.into_iter()
            .map(|(id, value)| Ok((id, decode_vote(value)?)))
            .collect()
    }

    async fn top_level_comments(
        &self,
        thread_id: Uuid,
        sort: SortPolicy,
    ) -> Result<Vec<Comment>, StoreError> {
        let mut conn = self.conn().await?;
        let query = comments::table
            .filter(comments::thread_id.eq(thread_id))
            .filter(comments::parent_id.is_null())
            .filter(
                comments::is_removed
                    .eq(false)
                    .or(comments::child_count.gt(0)),
            )
            .into_boxed();

        Ok(ordered(query, sort).load::<Comment>(&mut conn).await?)
    }

    async fn child_comments(
        &self,
        thread_id: Uuid,
        parent_ids: &[Uuid],
        sort: SortPolicy,
    ) -> Result<Vec<Comment>, StoreError> {
        if parent_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.conn().await?;
        let query = comments::table
            .filter(comments::thread_id.eq(thread_id))
            .filter(comments::parent_id.eq_any(parent_ids.to_vec()))
            .filter(
                comments::is_removed
                    .eq(false)
                    .or(comments::child_count.gt(0)),
            )
            .into_boxed();

        Ok(ordered(query, sort).load::<Comment>(&mut conn).await?)
    }

    async fn apply_vote(&self, change: &VoteChange) -> Result<i32, StoreError> {
        let change = *change;
        let mut conn = self.conn().await?;

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let key = change.key;
                let delta = change.delta;
                let now = chrono::Utc::now().naive_utc();

                // Every write is conditional on the row still holding
                // `change.previous`; zero affected rows means another
                // transaction moved the vote first.
                let row = votes::table.find((
                    key.user_id,
                    key.votable_id,
                    key.votable_type.as_str(),
                ));
                let written = match (change.previous, change.next) {
                    (None, Some(value)) => {
                        diesel::insert_into(votes::table)
                            .values(NewVote {
                                user_id: key.user_id,
                                votable_id: key.votable_id,
                                votable_type: key.votable_type.as_str(),
                                vote_value: value.signum(),
                            })
                            .on_conflict((votes::user_id, votes::votable_id, votes::votable_type))
                            .do_nothing()
                            .execute(conn)
                            .await?
                    }
                    (Some(previous), Some(value)) => {
                        diesel::update(row.filter(votes::vote_value.eq(previous.signum())))
                            .set((
                                votes::vote_value.eq(value.signum()),
                                votes::updated_at.eq(now),
                            ))
                            .execute(conn)
                            .await?
                    }
                    (Some(previous), None) => {
                        diesel::delete(row.filter(votes::vote_value.eq(previous.signum())))
                            .execute(conn)
                            .await?
                    }
                    (None, None) => 0,
                };

                if written == 0 {
                    return Err(StoreError::Conflict);
                }

                let (score, user_id, is_anonymous) = match key.votable_type {
                    VotableType::Thread => {
                        diesel::update(threads::table.find(key.votable_id))
                            .set((
                                threads::score.eq(threads::score + delta.score),
                                threads::upvote_count.eq(threads::upvote_count + delta.upvotes),
                                threads::downvote_count
                                    .eq(threads::downvote_count + delta.downvotes),
                            ))
                            .returning((threads::score, threads::user_id, threads::is_anonymous))
                            .get_result::<(i32, Option<Uuid>, bool)>(conn)
                            .await
                    }
                    VotableType::Comment => {
                        diesel::update(comments::table.find(key.votable_id))
                            .set((
                                comments::score.eq(comments::score + delta.score),
                                comments::upvote_count
                                    .eq(comments::upvote_count + delta.upvotes),
                                comments::downvote_count
                                    .eq(comments::downvote_count + delta.downvotes),
                            ))
                            .returning((
                                comments::score,
                                comments::user_id,
                                comments::is_anonymous,
                            ))
                            .get_result::<(i32, Option<Uuid>, bool)>(conn)
                            .await
                    }
                }
                .optional()?
                .ok_or(StoreError::Missing(key.votable_type.noun()))?;

                if let Some(author) = user_id.filter(|_| !is_anonymous)
                    && delta.score != 0
                {
                    let karma = users::table.find(author);
                    match key.votable_type {
                        VotableType::Thread => {
                            diesel::update(karma)
                                .set((
                                    users::karma_score.eq(users::karma_score + delta.score),
                                    users::post_karma.eq(users::post_karma + delta.score),
                                ))
                                .execute(conn)
                                .await?
                        }
                        VotableType::Comment => {
                            diesel::update(karma)
                                .set((
                                    users::karma_score.eq(users::karma_score + delta.score),
                                    users::comment_karma.eq(users::comment_karma + delta.score),
                                ))
                                .execute(conn)
                                .await?
                        }
                    };
                }

                Ok(score)
            }
            .scope_boxed()
        })
        .await
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, StoreError> {
        let mut conn = self.conn().await?;

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let now = chrono::Utc::now().naive_utc();

                let comment = diesel::insert_into(comments::table)
                    .values(&new)
                    .get_result::<Comment>(conn)
                    .await?;

                let bumped = diesel::update(threads::table.find(comment.thread_id))
                    .set((
                        threads::comment_count.eq(threads::comment_count + 1),
                        threads::last_activity_at.eq(now),
                    ))
                    .execute(conn)
                    .await?;
                if bumped == 0 {
                    return Err(StoreError::Missing("thread"));
                }

                if let Some(parent_id) = comment.parent_id {
                    diesel::update(comments::table.find(parent_id))
                        .set((
                            comments::reply_count.eq(comments::reply_count + 1),
                            comments::child_count.eq(comments::child_count + 1),
                        ))
                        .execute(conn)
                        .await?;
                }

                Ok(comment)
            }
            .scope_boxed()
        })
        .await
    }

    async fn tombstone_comment(
        &self,
        id: Uuid,
        tombstone: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        let (tombstone, reason) = (tombstone.to_owned(), reason.to_owned());
        let mut conn = self.conn().await?;

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let now = chrono::Utc::now().naive_utc();

                let (thread_id, parent_id) = diesel::update(
                    comments::table
                        .find(id)
                        .filter(comments::is_removed.eq(false)),
                )
                .set((
                    comments::is_removed.eq(true),
                    comments::content.eq(tombstone),
                    comments::removed_reason.eq(Some(reason)),
                    comments::updated_at.eq(now),
                ))
                .returning((comments::thread_id, comments::parent_id))
                .get_result::<(Uuid, Option<Uuid>)>(conn)
                .await
                .optional()?
                .ok_or(StoreError::Missing("comment"))?;

                diesel::update(threads::table.find(thread_id))
                    .set(threads::comment_count.eq(threads::comment_count - 1))
                    .execute(conn)
                    .await?;

                if let Some(parent_id) = parent_id {
                    diesel::update(comments::table.find(parent_id))
                        .set(comments::reply_count.eq(comments::reply_count - 1))
                        .execute(conn)
                        .await?;
                }

                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    async fn update_comment_content(
        &self,
        id: Uuid,
        content: &str,
    ) -> Result<Comment, StoreError> {
        let mut conn = self.conn().await?;
        let now = chrono::Utc::now().naive_utc();

        diesel::update(
            comments::table
                .find(id)
                .filter(comments::is_removed.eq(false)),
        )
        .set((
            comments::content.eq(content),
            comments::is_edited.eq(true),
            comments::edited_at.eq(Some(now)),
            comments::updated_at.eq(now),
        ))
        .get_result::<Comment>(&mut conn)
        .await
        .optional()?
        .ok_or(StoreError::Missing("comment"))
    }
}
