pub mod ledger;
pub mod routes;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VotableType {
    Thread,
    Comment,
}

impl VotableType {
    pub fn as_str(self) -> &'static str {
        match self {
            VotableType::Thread => "THREAD",
            VotableType::Comment => "COMMENT",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            VotableType::Thread => "thread",
            VotableType::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn signum(self) -> i16 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl TryFrom<i16> for VoteValue {
    type Error = &'static str;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            _ => Err("Vote value must be 1 or -1"),
        }
    }
}

/// Identity of a vote row; there is at most one row per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoteKey {
    pub user_id: Uuid,
    pub votable_id: Uuid,
    pub votable_type: VotableType,
}

/// Counter adjustments caused by one vote transition. `score` is also the
/// karma adjustment for the votable's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteDelta {
    pub score: i32,
    pub upvotes: i32,
    pub downvotes: i32,
}

impl VoteDelta {
    pub const ZERO: VoteDelta = VoteDelta {
        score: 0,
        upvotes: 0,
        downvotes: 0,
    };

    fn contribution(vote: Option<VoteValue>) -> VoteDelta {
        match vote {
            Some(VoteValue::Up) => VoteDelta {
                score: 1,
                upvotes: 1,
                downvotes: 0,
            },
            Some(VoteValue::Down) => VoteDelta {
                score: -1,
                upvotes: 0,
                downvotes: 1,
            },
            None => VoteDelta::ZERO,
        }
    }

    pub fn is_noop(&self) -> bool {
        *self == VoteDelta::ZERO
    }
}

/// Deltas for moving a user's vote from `previous` to `requested`, where
/// `None` on either side means "no vote row".
pub fn transition(previous: Option<VoteValue>, requested: Option<VoteValue>) -> VoteDelta {
    let before = VoteDelta::contribution(previous);
    let after = VoteDelta::contribution(requested);

    VoteDelta {
        score: after.score - before.score,
        upvotes: after.upvotes - before.upvotes,
        downvotes: after.downvotes - before.downvotes,
    }
}

/// A fully computed vote mutation. The store applies it only if the vote row
/// still holds `previous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteChange {
    pub key: VoteKey,
    pub previous: Option<VoteValue>,
    pub next: Option<VoteValue>,
    pub delta: VoteDelta,
}

impl VoteChange {
    pub fn new(key: VoteKey, previous: Option<VoteValue>, next: Option<VoteValue>) -> Self {
        VoteChange {
            key,
            previous,
            next,
            delta: transition(previous, next),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use VoteValue::{Down, Up};

    fn delta(score: i32, upvotes: i32, downvotes: i32) -> VoteDelta {
        VoteDelta {
            score,
            upvotes,
            downvotes,
        }
    }

    #[test]
    fn test_transition_from_no_vote() {
        assert_eq!(transition(None, Some(Up)), delta(1, 1, 0));
        assert_eq!(transition(None, Some(Down)), delta(-1, 0, 1));
    }

    #[test]
    fn test_transition_same_direction_is_noop() {
        assert!(transition(Some(Up), Some(Up)).is_noop());
        assert!(transition(Some(Down), Some(Down)).is_noop());
        assert!(transition(None, None).is_noop());
    }

    #[test]
    fn test_transition_swing() {
        assert_eq!(transition(Some(Up), Some(Down)), delta(-2, -1, 1));
        assert_eq!(transition(Some(Down), Some(Up)), delta(2, 1, -1));
    }

    #[test]
    fn test_transition_retract_inverts_contribution() {
        assert_eq!(transition(Some(Up), None), delta(-1, -1, 0));
        assert_eq!(transition(Some(Down), None), delta(1, 0, -1));
    }

    #[test]
    fn test_vote_value_from_int() {
        assert_eq!(VoteValue::try_from(1), Ok(Up));
        assert_eq!(VoteValue::try_from(-1), Ok(Down));
        assert!(VoteValue::try_from(0).is_err());
        assert!(VoteValue::try_from(2).is_err());
    }

    #[test]
    fn test_votable_type_serde() {
        assert_eq!(
            serde_json::to_string(&VotableType::Comment).unwrap(),
            "\"COMMENT\""
        );
        let parsed: VotableType = serde_json::from_str("\"THREAD\"").unwrap();
        assert_eq!(parsed, VotableType::Thread);
    }
}
