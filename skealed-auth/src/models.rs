use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use skealed_shared::types::auth::UserRole;

use crate::schema::{credentials, magic_links, refresh_tokens};

// --- Credentials ---

#[derive(Debug, Queryable, Identifiable, Serialize)]
#[diesel(table_name = credentials)]
pub struct Credential {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn user_role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::User)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = credentials)]
pub struct NewCredential<'a> {
    pub email: &'a str,
    pub role: &'a str,
}

// --- Magic links ---

#[derive(Debug, Queryable, Identifiable)]
#[diesel(table_name = magic_links)]
pub struct MagicLink {
    pub id: Uuid,
    pub email: String,
    pub token_hash: String,
    pub redirect_to: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = magic_links)]
pub struct NewMagicLink {
    pub email: String,
    pub token_hash: String,
    pub redirect_to: String,
    pub expires_at: DateTime<Utc>,
}

// --- Refresh tokens ---

#[derive(Debug, Queryable, Identifiable)]
#[diesel(table_name = refresh_tokens)]
pub struct RefreshToken {
    pub id: Uuid,
    pub credential_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub credential_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}
