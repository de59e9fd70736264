use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};
use skealed_shared::types::auth::UserRole;

use crate::models::{Credential, MagicLink, NewCredential, NewMagicLink};
use crate::schema::{credentials, magic_links};
use crate::services::token_service;

const DEFAULT_LANDING: &str = "/vault";

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Keeps post-sign-in redirects on our own site. Relative paths are resolved
/// against `site_url`; anything else lands on the vault.
pub fn sanitize_redirect(site_url: &str, requested: Option<&str>) -> String {
    let site = site_url.trim_end_matches('/');
    let fallback = format!("{site}{DEFAULT_LANDING}");

    let Some(requested) = requested.map(str::trim).filter(|r| !r.is_empty()) else {
        return fallback;
    };

    if requested.starts_with('/') && !requested.starts_with("//") {
        return format!("{site}{requested}");
    }

    match requested.strip_prefix(site) {
        Some("") => requested.to_string(),
        Some(rest) if rest.starts_with('/') || rest.starts_with('?') => requested.to_string(),
        _ => fallback,
    }
}

pub fn callback_url(site_url: &str, token: &str) -> String {
    format!("{}/auth/callback?token={token}", site_url.trim_end_matches('/'))
}

pub fn role_for(email: &str, admin_email: &str) -> UserRole {
    if !admin_email.is_empty() && email.eq_ignore_ascii_case(admin_email.trim()) {
        UserRole::Admin
    } else {
        UserRole::User
    }
}

/// A link is good for exactly one sign-in before `expires_at`.
pub fn ensure_usable(link: &MagicLink, now: DateTime<Utc>) -> AppResult<()> {
    if link.used_at.is_some() {
        return Err(AppError::new(ErrorCode::MagicLinkInvalid, "this sign-in link was already used"));
    }
    if link.expires_at < now {
        return Err(AppError::new(ErrorCode::MagicLinkExpired, "this sign-in link has expired"));
    }
    Ok(())
}

/// Persists a fresh link for `email` and returns the raw token to embed in the e-mail.
pub fn issue(
    conn: &mut PgConnection,
    email: &str,
    redirect_to: String,
    ttl_minutes: i64,
) -> AppResult<String> {
    let token = token_service::create_opaque_token();

    diesel::insert_into(magic_links::table)
        .values(&NewMagicLink {
            email: email.to_string(),
            token_hash: token_service::hash_token(&token),
            redirect_to,
            expires_at: Utc::now() + Duration::minutes(ttl_minutes),
        })
        .execute(conn)?;

    Ok(token)
}

/// Marks the link behind `token` as used. Must run inside the caller's transaction.
pub fn consume(conn: &mut PgConnection, token: &str) -> AppResult<MagicLink> {
    let link = magic_links::table
        .filter(magic_links::token_hash.eq(token_service::hash_token(token)))
        .for_update()
        .first::<MagicLink>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::MagicLinkInvalid, "invalid sign-in link"))?;

    let now = Utc::now();
    ensure_usable(&link, now)?;

    diesel::update(magic_links::table.find(link.id))
        .set(magic_links::used_at.eq(Some(now)))
        .execute(conn)?;

    Ok(link)
}

/// Returns the credential for `email`, creating it on first sign-in.
/// The flag is true when the credential was created by this call.
pub fn find_or_create_credential(
    conn: &mut PgConnection,
    email: &str,
    admin_email: &str,
) -> AppResult<(Credential, bool)> {
    let role = role_for(email, admin_email);

    let inserted = diesel::insert_into(credentials::table)
        .values(&NewCredential { email, role: role.as_str() })
        .on_conflict(credentials::email)
        .do_nothing()
        .execute(conn)?;

    let now = Utc::now();
    let credential = if role == UserRole::Admin {
        diesel::update(credentials::table.filter(credentials::email.eq(email)))
            .set((credentials::last_sign_in_at.eq(Some(now)), credentials::role.eq(role.as_str())))
            .get_result::<Credential>(conn)?
    } else {
        diesel::update(credentials::table.filter(credentials::email.eq(email)))
            .set(credentials::last_sign_in_at.eq(Some(now)))
            .get_result::<Credential>(conn)?
    };

    Ok((credential, inserted == 1))
}
