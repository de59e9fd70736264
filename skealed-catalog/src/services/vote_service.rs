//! Up/down voting shared by skills and ideas.
//!
//! A user holds at most one vote per item. Pressing the same direction again
//! withdraws it; pressing the other direction switches it. The counter moves
//! by the difference between the new and old vote values, so a switch moves
//! it by two in a single adjustment.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use skealed_shared::errors::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Stored `vote_type` value.
    pub fn value(self) -> i16 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    pub fn from_value(value: i16) -> Option<Self> {
        match value {
            1 => Some(Self::Up),
            -1 => Some(Self::Down),
            _ => None,
        }
    }
}

fn weight(vote: Option<VoteDirection>) -> i32 {
    vote.map_or(0, |v| i32::from(v.value()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOp {
    Upsert(VoteDirection),
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub next: Option<VoteDirection>,
    pub row: RowOp,
    pub delta: i32,
}

impl VoteTransition {
    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match (self.row, self.delta.abs()) {
            (RowOp::Delete, _) => "withdrawn",
            (RowOp::Upsert(_), 2) => "switched",
            (RowOp::Upsert(_), _) => "cast",
        }
    }
}

pub fn transition(current: Option<VoteDirection>, pressed: VoteDirection) -> VoteTransition {
    let next = if current == Some(pressed) { None } else { Some(pressed) };
    let row = match next {
        Some(direction) => RowOp::Upsert(direction),
        None => RowOp::Delete,
    };

    VoteTransition {
        next,
        row,
        delta: weight(next) - weight(current),
    }
}

/// Persistence behind a vote target. Implementations run inside one
/// transaction so the row change and the counter change land together.
pub trait VoteStore {
    /// Locks the target for the rest of the transaction; fails if it does not exist.
    fn lock_target(&mut self, target_id: i32) -> AppResult<()>;
    fn current_vote(&mut self, user_id: Uuid, target_id: i32) -> AppResult<Option<VoteDirection>>;
    fn upsert_vote(&mut self, user_id: Uuid, target_id: i32, direction: VoteDirection) -> AppResult<()>;
    fn delete_vote(&mut self, user_id: Uuid, target_id: i32) -> AppResult<()>;
    /// Adds `delta` to the counter and returns the new total.
    fn adjust_counter(&mut self, target_id: i32, delta: i32) -> AppResult<i32>;
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub target_id: i32,
    pub vote: Option<VoteDirection>,
    pub votes: i32,
    #[serde(skip)]
    pub transition: Option<VoteTransition>,
}

impl VoteOutcome {
    pub fn vote_value(&self) -> Option<i16> {
        self.vote.map(VoteDirection::value)
    }
}

pub fn cast_vote<S: VoteStore>(
    store: &mut S,
    user_id: Uuid,
    target_id: i32,
    pressed: VoteDirection,
) -> AppResult<VoteOutcome> {
    store.lock_target(target_id)?;

    let current = store.current_vote(user_id, target_id)?;
    let step = transition(current, pressed);

    match step.row {
        RowOp::Upsert(direction) => store.upsert_vote(user_id, target_id, direction)?,
        RowOp::Delete => store.delete_vote(user_id, target_id)?,
    }

    let votes = store.adjust_counter(target_id, step.delta)?;

    Ok(VoteOutcome {
        target_id,
        vote: step.next,
        votes,
        transition: Some(step),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use skealed_shared::errors::{AppError, ErrorCode};
    use std::collections::HashMap;

    use VoteDirection::{Down, Up};

    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub votes: HashMap<(Uuid, i32), VoteDirection>,
        pub counters: HashMap<i32, i32>,
    }

    impl MemoryStore {
        pub fn with_target(target_id: i32, votes: i32) -> Self {
            let mut store = Self::default();
            store.counters.insert(target_id, votes);
            store
        }
    }

    impl VoteStore for MemoryStore {
        fn lock_target(&mut self, target_id: i32) -> AppResult<()> {
            if self.counters.contains_key(&target_id) {
                Ok(())
            } else {
                Err(AppError::new(ErrorCode::SkillNotFound, "skill not found"))
            }
        }

        fn current_vote(&mut self, user_id: Uuid, target_id: i32) -> AppResult<Option<VoteDirection>> {
            Ok(self.votes.get(&(user_id, target_id)).copied())
        }

        fn upsert_vote(&mut self, user_id: Uuid, target_id: i32, direction: VoteDirection) -> AppResult<()> {
            self.votes.insert((user_id, target_id), direction);
            Ok(())
        }

        fn delete_vote(&mut self, user_id: Uuid, target_id: i32) -> AppResult<()> {
            self.votes.remove(&(user_id, target_id));
            Ok(())
        }

        fn adjust_counter(&mut self, target_id: i32, delta: i32) -> AppResult<i32> {
            let counter = self.counters.entry(target_id).or_insert(0);
            *counter += delta;
            Ok(*counter)
        }
    }

    #[test]
    fn transition_table() {
        let cases = [
            (None, Up, Some(Up), RowOp::Upsert(Up), 1),
            (None, Down, Some(Down), RowOp::Upsert(Down), -1),
            (Some(Up), Up, None, RowOp::Delete, -1),
            (Some(Up), Down, Some(Down), RowOp::Upsert(Down), -2),
            (Some(Down), Down, None, RowOp::Delete, 1),
            (Some(Down), Up, Some(Up), RowOp::Upsert(Up), 2),
        ];

        for (current, pressed, next, row, delta) in cases {
            let step = transition(current, pressed);
            assert_eq!(step, VoteTransition { next, row, delta }, "{current:?} + {pressed:?}");
        }
    }

    #[test]
    fn transition_kinds() {
        assert_eq!(transition(None, Up).kind(), "cast");
        assert_eq!(transition(Some(Up), Up).kind(), "withdrawn");
        assert_eq!(transition(Some(Down), Up).kind(), "switched");
    }

    #[test]
    fn upvoting_twice_restores_original_state() {
        let user = Uuid::new_v4();
        let mut store = MemoryStore::with_target(1, 41);

        let first = cast_vote(&mut store, user, 1, Up).unwrap();
        assert_eq!(first.vote, Some(Up));
        assert_eq!(first.votes, 42);

        let second = cast_vote(&mut store, user, 1, Up).unwrap();
        assert_eq!(second.vote, None);
        assert_eq!(second.votes, 41);
        assert!(store.votes.is_empty());
    }

    #[test]
    fn switching_moves_counter_by_exactly_two() {
        let user = Uuid::new_v4();
        let mut store = MemoryStore::with_target(9, 10);

        cast_vote(&mut store, user, 9, Up).unwrap();
        let switched = cast_vote(&mut store, user, 9, Down).unwrap();
        assert_eq!(switched.votes, 11 - 2);
        assert_eq!(switched.vote, Some(Down));
        assert_eq!(store.votes.get(&(user, 9)), Some(&Down));

        let back = cast_vote(&mut store, user, 9, Up).unwrap();
        assert_eq!(back.votes, 9 + 2);
    }

    #[test]
    fn counter_always_equals_sum_of_votes() {
        let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let mut store = MemoryStore::with_target(3, 0);
        let presses = [Up, Down, Down, Up, Up, Up, Down, Up, Down, Down, Up];

        for (i, pressed) in presses.iter().enumerate() {
            let user = users[i % users.len()];
            cast_vote(&mut store, user, 3, *pressed).unwrap();

            let sum: i32 = store.votes.values().map(|v| i32::from(v.value())).sum();
            assert_eq!(store.counters[&3], sum);
        }
    }

    #[test]
    fn users_do_not_share_votes() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut store = MemoryStore::with_target(5, 0);

        cast_vote(&mut store, a, 5, Up).unwrap();
        let outcome = cast_vote(&mut store, b, 5, Up).unwrap();
        assert_eq!(outcome.vote, Some(Up));
        assert_eq!(outcome.votes, 2);
    }

    #[test]
    fn missing_target_leaves_store_untouched() {
        let mut store = MemoryStore::with_target(1, 0);
        let err = cast_vote(&mut store, Uuid::new_v4(), 2, Up).unwrap_err();

        assert_eq!(err.code(), ErrorCode::SkillNotFound);
        assert!(store.votes.is_empty());
        assert!(!store.counters.contains_key(&2));
    }

    #[test]
    fn stored_values_round_trip() {
        assert_eq!(VoteDirection::from_value(1), Some(Up));
        assert_eq!(VoteDirection::from_value(-1), Some(Down));
        assert_eq!(VoteDirection::from_value(0), None);
    }
}
