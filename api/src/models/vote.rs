use diesel::prelude::*;
use uuid::Uuid;

// "No vote" is the absence of a row, so only the signed value is stored.
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::votes)]
pub struct NewVote<'a> {
    pub user_id: Uuid,
    pub votable_id: Uuid,
    pub votable_type: &'a str,
    pub vote_value: i16,
}
