use axum::{Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    App,
    error::{AppError, BoardError},
    identity::Viewer,
    json::Json,
};

use super::{VotableType, VoteKey, VoteValue, ledger::VoteLedger};

pub fn route() -> Router<App> {
    Router::<App>::new().route("/votes", post(cast_vote).delete(retract_vote))
}

#[derive(Deserialize)]
pub struct VoteSubmission {
    votable_id: Uuid,
    votable_type: VotableType,
    vote_value: i16,
}

#[derive(Deserialize)]
pub struct VoteRetraction {
    votable_id: Uuid,
    votable_type: VotableType,
}

#[derive(Serialize)]
pub struct VoteResult {
    new_score: i32,
}

fn ledger(app: &App) -> VoteLedger {
    VoteLedger::new(app.store.clone(), app.config.vote_max_retries)
}

pub async fn cast_vote(
    State(app): State<App>,
    Viewer(user_id): Viewer,
    Json(vote): Json<VoteSubmission>,
) -> Result<axum::Json<VoteResult>, AppError> {
    let value = VoteValue::try_from(vote.vote_value).map_err(BoardError::from)?;

    let key = VoteKey {
        user_id,
        votable_id: vote.votable_id,
        votable_type: vote.votable_type,
    };
    let new_score = ledger(&app).cast(key, value).await?;

    Ok(axum::Json(VoteResult { new_score }))
}

pub async fn retract_vote(
    State(app): State<App>,
    Viewer(user_id): Viewer,
    Json(vote): Json<VoteRetraction>,
) -> Result<StatusCode, AppError> {
    let key = VoteKey {
        user_id,
        votable_id: vote.votable_id,
        votable_type: vote.votable_type,
    };
    ledger(&app).retract(key).await?;

    Ok(StatusCode::NO_CONTENT)
}
