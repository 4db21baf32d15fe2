use std::sync::Arc;

use crate::{
    error::BoardError,
    store::{BoardStore, StoreError},
};

use super::{VoteChange, VoteKey, VoteValue};

/// Casts and retracts votes, keeping vote rows, votable counters and author
/// karma in step.
///
/// Every write is a compare-and-swap against the vote the ledger read. When
/// a concurrent write wins, the ledger reads again and recomputes, up to
/// `max_retries` extra attempts.
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn BoardStore>,
    max_retries: u32,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn BoardStore>, max_retries: u32) -> Self {
        VoteLedger { store, max_retries }
    }

    /// Records `value` as the user's vote and returns the votable's score.
    /// Repeating the current vote changes nothing.
    pub async fn cast(&self, key: VoteKey, value: VoteValue) -> Result<i32, BoardError> {
        self.reconcile(key, Some(value)).await
    }

    /// Removes the user's vote, undoing its effect on score and karma.
    pub async fn retract(&self, key: VoteKey) -> Result<(), BoardError> {
        self.reconcile(key, None).await.map(|_| ())
    }

    async fn reconcile(
        &self,
        key: VoteKey,
        requested: Option<VoteValue>,
    ) -> Result<i32, BoardError> {
        let mut attempt = 0;

        loop {
            let votable = self
                .store
                .votable(key.votable_type, key.votable_id)
                .await?
                .ok_or(BoardError::NotFound(key.votable_type.noun()))?;

            let previous = self.store.vote(&key).await?;
            if previous.is_none() && requested.is_none() {
                return Err(BoardError::NotFound("vote"));
            }

            let change = VoteChange::new(key, previous, requested);
            if change.delta.is_noop() {
                tracing::debug!(
                    votable_id = %key.votable_id,
                    votable_type = key.votable_type.as_str(),
                    "vote unchanged"
                );
                return Ok(votable.score);
            }

            match self.store.apply_vote(&change).await {
                Ok(score) => return Ok(score),
                Err(StoreError::Conflict) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        votable_id = %key.votable_id,
                        attempt,
                        "vote write conflicted, retrying"
                    );
                }
                Err(StoreError::Conflict) => {
                    tracing::warn!(
                        votable_id = %key.votable_id,
                        attempts = attempt + 1,
                        "giving up on contended vote"
                    );
                    return Err(BoardError::Conflict);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
