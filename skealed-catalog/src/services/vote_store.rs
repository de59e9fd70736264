use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{NewIdeaVote, NewUserVote};
use crate::schema::{idea_votes, ideas, skills, user_votes};
use crate::services::account_service;
use crate::services::vote_service::{self, VoteDirection, VoteOutcome, VoteStore};

pub struct SkillVotes<'a> {
    conn: &'a mut PgConnection,
}

impl VoteStore for SkillVotes<'_> {
    fn lock_target(&mut self, target_id: i32) -> AppResult<()> {
        skills::table
            .find(target_id)
            .select(skills::id)
            .for_update()
            .first::<i32>(self.conn)
            .optional()?
            .map(|_| ())
            .ok_or_else(|| AppError::new(ErrorCode::SkillNotFound, "skill not found"))
    }

    fn current_vote(&mut self, user_id: Uuid, target_id: i32) -> AppResult<Option<VoteDirection>> {
        let value = user_votes::table
            .find((user_id, target_id))
            .select(user_votes::vote_type)
            .first::<i16>(self.conn)
            .optional()?;
        Ok(value.and_then(VoteDirection::from_value))
    }

    fn upsert_vote(&mut self, user_id: Uuid, target_id: i32, direction: VoteDirection) -> AppResult<()> {
        diesel::insert_into(user_votes::table)
            .values(&NewUserVote { user_id, skill_id: target_id, vote_type: direction.value() })
            .on_conflict((user_votes::user_id, user_votes::skill_id))
            .do_update()
            .set((
                user_votes::vote_type.eq(direction.value()),
                user_votes::created_at.eq(Utc::now()),
            ))
            .execute(self.conn)?;
        Ok(())
    }

    fn delete_vote(&mut self, user_id: Uuid, target_id: i32) -> AppResult<()> {
        diesel::delete(user_votes::table.find((user_id, target_id))).execute(self.conn)?;
        Ok(())
    }

    fn adjust_counter(&mut self, target_id: i32, delta: i32) -> AppResult<i32> {
        Ok(diesel::update(skills::table.find(target_id))
            .set(skills::votes.eq(skills::votes + delta))
            .returning(skills::votes)
            .get_result(self.conn)?)
    }
}

pub struct IdeaVotes<'a> {
    conn: &'a mut PgConnection,
}

impl VoteStore for IdeaVotes<'_> {
    fn lock_target(&mut self, target_id: i32) -> AppResult<()> {
        ideas::table
            .find(target_id)
            .select(ideas::id)
            .for_update()
            .first::<i32>(self.conn)
            .optional()?
            .map(|_| ())
            .ok_or_else(|| AppError::new(ErrorCode::IdeaNotFound, "idea not found"))
    }

    fn current_vote(&mut self, user_id: Uuid, target_id: i32) -> AppResult<Option<VoteDirection>> {
        let value = idea_votes::table
            .find((user_id, target_id))
            .select(idea_votes::vote_type)
            .first::<i16>(self.conn)
            .optional()?;
        Ok(value.and_then(VoteDirection::from_value))
    }

    fn upsert_vote(&mut self, user_id: Uuid, target_id: i32, direction: VoteDirection) -> AppResult<()> {
        diesel::insert_into(idea_votes::table)
            .values(&NewIdeaVote { user_id, idea_id: target_id, vote_type: direction.value() })
            .on_conflict((idea_votes::user_id, idea_votes::idea_id))
            .do_update()
            .set((
                idea_votes::vote_type.eq(direction.value()),
                idea_votes::created_at.eq(Utc::now()),
            ))
            .execute(self.conn)?;
        Ok(())
    }

    fn delete_vote(&mut self, user_id: Uuid, target_id: i32) -> AppResult<()> {
        diesel::delete(idea_votes::table.find((user_id, target_id))).execute(self.conn)?;
        Ok(())
    }

    fn adjust_counter(&mut self, target_id: i32, delta: i32) -> AppResult<i32> {
        Ok(diesel::update(ideas::table.find(target_id))
            .set(ideas::votes.eq(ideas::votes + delta))
            .returning(ideas::votes)
            .get_result(self.conn)?)
    }
}

pub fn vote_on_skill(
    conn: &mut PgConnection,
    user_id: Uuid,
    skill_id: i32,
    pressed: VoteDirection,
) -> AppResult<VoteOutcome> {
    conn.transaction(|conn| {
        account_service::ensure_active(conn, user_id)?;
        vote_service::cast_vote(&mut SkillVotes { conn }, user_id, skill_id, pressed)
    })
}

pub fn vote_on_idea(
    conn: &mut PgConnection,
    user_id: Uuid,
    idea_id: i32,
    pressed: VoteDirection,
) -> AppResult<VoteOutcome> {
    conn.transaction(|conn| {
        account_service::ensure_active(conn, user_id)?;
        vote_service::cast_vote(&mut IdeaVotes { conn }, user_id, idea_id, pressed)
    })
}

/// The caller's votes on skills, keyed by skill id.
pub fn skill_votes_by_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<HashMap<i32, VoteDirection>> {
    let rows = user_votes::table
        .filter(user_votes::user_id.eq(user_id))
        .select((user_votes::skill_id, user_votes::vote_type))
        .load::<(i32, i16)>(conn)?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, value)| VoteDirection::from_value(value).map(|v| (id, v)))
        .collect())
}

pub fn idea_votes_by_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<HashMap<i32, VoteDirection>> {
    let rows = idea_votes::table
        .filter(idea_votes::user_id.eq(user_id))
        .select((idea_votes::idea_id, idea_votes::vote_type))
        .load::<(i32, i16)>(conn)?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, value)| VoteDirection::from_value(value).map(|v| (id, v)))
        .collect())
}
