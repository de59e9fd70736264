use std::collections::HashSet;

use diesel::prelude::*;
use uuid::Uuid;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::NewFavorite;
use crate::schema::{skills, user_favorites};
use crate::services::account_service;

/// Hearts or un-hearts `skill_id`. Returns whether it is now a favorite.
pub fn toggle(conn: &mut PgConnection, user_id: Uuid, skill_id: i32) -> AppResult<bool> {
    conn.transaction(|conn| {
        account_service::ensure_active(conn, user_id)?;

        let exists = skills::table
            .find(skill_id)
            .select(skills::id)
            .first::<i32>(conn)
            .optional()?
            .is_some();
        if !exists {
            return Err(AppError::new(ErrorCode::SkillNotFound, "skill not found"));
        }

        let removed = diesel::delete(user_favorites::table.find((user_id, skill_id))).execute(conn)?;
        if removed > 0 {
            return Ok(false);
        }

        diesel::insert_into(user_favorites::table)
            .values(&NewFavorite { user_id, skill_id })
            .on_conflict_do_nothing()
            .execute(conn)?;
        Ok(true)
    })
}

/// Idempotent removal. Returns whether a row was deleted.
pub fn remove(conn: &mut PgConnection, user_id: Uuid, skill_id: i32) -> AppResult<bool> {
    let removed = diesel::delete(user_favorites::table.find((user_id, skill_id))).execute(conn)?;
    Ok(removed > 0)
}

pub fn favorite_ids(conn: &mut PgConnection, user_id: Uuid) -> AppResult<HashSet<i32>> {
    Ok(user_favorites::table
        .filter(user_favorites::user_id.eq(user_id))
        .select(user_favorites::skill_id)
        .load::<i32>(conn)?
        .into_iter()
        .collect())
}
