use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use skealed_shared::errors::{AppError, AppResult};

use crate::models::{Profile, ProfileAvatar};
use crate::schema::profiles;
use crate::services::account_service;
use crate::DbPool;

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: Uuid,
    pub avatar_url: Option<String>,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        Self { id: profile.id, avatar_url: profile.avatar_url }
    }
}

/// Creates the empty profile row for a newly registered user.
/// Called from the RabbitMQ subscriber; redelivery is harmless.
pub fn create_default_profile(pool: &DbPool, user_id: Uuid) -> AppResult<()> {
    let mut conn = pool.get().map_err(|e| AppError::internal(e.to_string()))?;

    let inserted = diesel::insert_into(profiles::table)
        .values(profiles::id.eq(user_id))
        .on_conflict(profiles::id)
        .do_nothing()
        .execute(&mut conn)?;

    tracing::info!(user_id = %user_id, created = inserted == 1, "default profile ensured");
    Ok(())
}

/// The caller's profile; users who never uploaded anything get an empty one.
pub fn get_profile(conn: &mut PgConnection, user_id: Uuid) -> AppResult<ProfileView> {
    let profile = profiles::table
        .find(user_id)
        .first::<Profile>(conn)
        .optional()?;

    Ok(profile
        .map(ProfileView::from)
        .unwrap_or(ProfileView { id: user_id, avatar_url: None }))
}

/// Accepted avatar formats and the extension stored with them.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

pub fn avatar_object_key(user_id: Uuid, ext: &str) -> String {
    format!("{user_id}-{}.{ext}", Uuid::new_v4().simple())
}

/// Points the profile at a new avatar. Returns the key of the object it replaced.
pub fn set_avatar(
    conn: &mut PgConnection,
    user_id: Uuid,
    avatar_url: &str,
    avatar_key: &str,
) -> AppResult<Option<String>> {
    conn.transaction(|conn| {
        account_service::ensure_active(conn, user_id)?;

        let previous = profiles::table
            .find(user_id)
            .select(profiles::avatar_key)
            .for_update()
            .first::<Option<String>>(conn)
            .optional()?
            .flatten();

        let row = ProfileAvatar { id: user_id, avatar_url, avatar_key, updated_at: Utc::now() };
        diesel::insert_into(profiles::table)
            .values(&row)
            .on_conflict(profiles::id)
            .do_update()
            .set(&row)
            .execute(conn)?;

        Ok(previous.filter(|key| key != avatar_key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_image_types() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/webp"), Some("webp"));
        assert_eq!(extension_for("application/pdf"), None);
    }

    #[test]
    fn avatar_keys_are_prefixed_by_user_and_unique() {
        let user = Uuid::new_v4();
        let a = avatar_object_key(user, "png");
        let b = avatar_object_key(user, "png");

        assert!(a.starts_with(&format!("{user}-")));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }
}
