use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::QueryFragment;
use diesel::query_dsl::LoadQuery;
use diesel::sql_types::Text;
use serde::Serialize;
use uuid::Uuid;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};

use crate::schema::{deleted_accounts, idea_votes, ideas, profiles, skills, user_favorites, user_votes};

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct WipeSummary {
    pub votes_cleared: usize,
    pub favorites_cleared: usize,
}

/// Counter corrections that take `votes` back out of their totals, one per target.
pub fn reversal_deltas(votes: impl IntoIterator<Item = (i32, i16)>) -> Vec<(i32, i32)> {
    let mut deltas: Vec<(i32, i32)> = Vec::new();
    for (target_id, value) in votes {
        match deltas.iter_mut().find(|(id, _)| *id == target_id) {
            Some((_, delta)) => *delta -= i32::from(value),
            None => deltas.push((target_id, -i32::from(value))),
        }
    }
    deltas.retain(|(_, delta)| *delta != 0);
    deltas
}

// Lock order for every vote path: account lock, then target rows by id, then vote rows.

fn account_lock_sql(exclusive: bool) -> &'static str {
    if exclusive {
        "SELECT pg_advisory_xact_lock(hashtext($1))"
    } else {
        "SELECT pg_advisory_xact_lock_shared(hashtext($1))"
    }
}

/// Transaction-scoped lock on the user's catalog data. Writers hold it shared,
/// the account purge holds it exclusively.
fn lock_account(conn: &mut PgConnection, user_id: Uuid, exclusive: bool) -> AppResult<()> {
    diesel::sql_query(account_lock_sql(exclusive))
        .bind::<Text, _>(user_id.to_string())
        .execute(conn)?;
    Ok(())
}

fn tombstone_check(user_id: Uuid, deleted_at: Option<DateTime<Utc>>) -> AppResult<()> {
    match deleted_at {
        None => Ok(()),
        Some(at) => {
            tracing::warn!(user_id = %user_id, deleted_at = %at, "write attempted by deleted account");
            Err(AppError::new(ErrorCode::AccountDeleted, "this account has been deleted"))
        }
    }
}

/// Guards a write made on behalf of `user_id`. Call inside the write's transaction:
/// a purge that is running blocks until the write commits, and a finished purge
/// rejects it with `AccountDeleted`.
pub fn ensure_active(conn: &mut PgConnection, user_id: Uuid) -> AppResult<()> {
    lock_account(conn, user_id, false)?;

    let deleted_at = deleted_accounts::table
        .find(user_id)
        .select(deleted_accounts::deleted_at)
        .first::<DateTime<Utc>>(conn)
        .optional()?;

    tombstone_check(user_id, deleted_at)
}

fn skill_lock_query(ids: Vec<i32>) -> impl LoadQuery<'static, PgConnection, i32> + QueryFragment<Pg> {
    skills::table
        .filter(skills::id.eq_any(ids))
        .select(skills::id)
        .order(skills::id.asc())
        .for_update()
}

fn idea_lock_query(ids: Vec<i32>) -> impl LoadQuery<'static, PgConnection, i32> + QueryFragment<Pg> {
    ideas::table
        .filter(ideas::id.eq_any(ids))
        .select(ideas::id)
        .order(ideas::id.asc())
        .for_update()
}

/// Votes cast on targets that were not yet voted when the ids were read are
/// left alone; they commit after this transaction and count normally.
fn revert_skill_votes(conn: &mut PgConnection, user_id: Uuid) -> AppResult<usize> {
    let voted = user_votes::table
        .filter(user_votes::user_id.eq(user_id))
        .select(user_votes::skill_id)
        .load::<i32>(conn)?;
    if voted.is_empty() {
        return Ok(0);
    }

    let locked = skill_lock_query(voted).load::<i32>(conn)?;
    let votes = user_votes::table
        .filter(user_votes::user_id.eq(user_id))
        .filter(user_votes::skill_id.eq_any(&locked))
        .select((user_votes::skill_id, user_votes::vote_type))
        .load::<(i32, i16)>(conn)?;

    for (skill_id, delta) in reversal_deltas(votes) {
        diesel::update(skills::table.find(skill_id))
            .set(skills::votes.eq(skills::votes + delta))
            .execute(conn)?;
    }

    Ok(diesel::delete(
        user_votes::table
            .filter(user_votes::user_id.eq(user_id))
            .filter(user_votes::skill_id.eq_any(&locked)),
    )
    .execute(conn)?)
}

fn revert_idea_votes(conn: &mut PgConnection, user_id: Uuid) -> AppResult<usize> {
    let voted = idea_votes::table
        .filter(idea_votes::user_id.eq(user_id))
        .select(idea_votes::idea_id)
        .load::<i32>(conn)?;
    if voted.is_empty() {
        return Ok(0);
    }

    let locked = idea_lock_query(voted).load::<i32>(conn)?;
    let votes = idea_votes::table
        .filter(idea_votes::user_id.eq(user_id))
        .filter(idea_votes::idea_id.eq_any(&locked))
        .select((idea_votes::idea_id, idea_votes::vote_type))
        .load::<(i32, i16)>(conn)?;

    for (idea_id, delta) in reversal_deltas(votes) {
        diesel::update(ideas::table.find(idea_id))
            .set(ideas::votes.eq(ideas::votes + delta))
            .execute(conn)?;
    }

    Ok(diesel::delete(
        idea_votes::table
            .filter(idea_votes::user_id.eq(user_id))
            .filter(idea_votes::idea_id.eq_any(&locked)),
    )
    .execute(conn)?)
}

/// Clears the user's skill votes and favorites. Vote counters are corrected
/// in the same transaction.
pub fn wipe_activity(conn: &mut PgConnection, user_id: Uuid) -> AppResult<WipeSummary> {
    conn.transaction(|conn| {
        ensure_active(conn, user_id)?;

        let votes_cleared = revert_skill_votes(conn, user_id)?;
        let favorites_cleared =
            diesel::delete(user_favorites::table.filter(user_favorites::user_id.eq(user_id))).execute(conn)?;

        Ok(WipeSummary { votes_cleared, favorites_cleared })
    })
}

/// Removes everything the catalog holds for a deleted account and records the
/// deletion so tokens still in circulation cannot write again.
/// Returns the storage key of the avatar, which the caller deletes afterwards.
pub fn purge_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Option<String>> {
    conn.transaction(|conn| {
        lock_account(conn, user_id, true)?;

        diesel::insert_into(deleted_accounts::table)
            .values(deleted_accounts::user_id.eq(user_id))
            .on_conflict_do_nothing()
            .execute(conn)?;

        let skill_votes = revert_skill_votes(conn, user_id)?;
        let idea_votes_cleared = revert_idea_votes(conn, user_id)?;
        let favorites =
            diesel::delete(user_favorites::table.filter(user_favorites::user_id.eq(user_id))).execute(conn)?;
        let authored = diesel::delete(ideas::table.filter(ideas::user_id.eq(user_id))).execute(conn)?;

        let avatar_key = diesel::delete(profiles::table.find(user_id))
            .returning(profiles::avatar_key)
            .get_result::<Option<String>>(conn)
            .optional()?
            .flatten();

        tracing::info!(
            user_id = %user_id,
            skill_votes,
            idea_votes = idea_votes_cleared,
            favorites,
            ideas = authored,
            "catalog data purged"
        );

        Ok(avatar_key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;

    #[test]
    fn reversal_negates_each_vote() {
        let deltas = reversal_deltas([(1, 1), (2, -1), (3, 1)]);
        assert_eq!(deltas, vec![(1, -1), (2, 1), (3, -1)]);
    }

    #[test]
    fn reversal_merges_and_drops_zero_deltas() {
        let deltas = reversal_deltas([(4, 1), (4, -1), (5, 1), (5, 1)]);
        assert_eq!(deltas, vec![(5, -2)]);
    }

    #[test]
    fn nothing_to_revert() {
        assert!(reversal_deltas(Vec::<(i32, i16)>::new()).is_empty());
        assert_eq!(WipeSummary::default(), WipeSummary { votes_cleared: 0, favorites_cleared: 0 });
    }

    #[test]
    fn counter_rows_are_locked_in_id_order() {
        let sql = debug_query::<Pg, _>(&skill_lock_query(vec![7, 2])).to_string();
        assert!(sql.contains(r#"FROM "skills""#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "skills"."id" ASC"#), "{sql}");
        assert!(sql.contains("FOR UPDATE"), "{sql}");

        let sql = debug_query::<Pg, _>(&idea_lock_query(vec![3])).to_string();
        assert!(sql.contains(r#"FROM "ideas""#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "ideas"."id" ASC"#), "{sql}");
        assert!(sql.contains("FOR UPDATE"), "{sql}");
    }

    #[test]
    fn purge_excludes_writers_and_writers_share() {
        assert!(account_lock_sql(true).contains("pg_advisory_xact_lock("));
        assert!(account_lock_sql(false).contains("pg_advisory_xact_lock_shared("));
    }

    #[test]
    fn tombstoned_account_cannot_write() {
        let user = Uuid::new_v4();
        assert!(tombstone_check(user, None).is_ok());

        let err = tombstone_check(user, Some(Utc::now())).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccountDeleted);
    }
}
