use chrono::{Duration, Utc};
use diesel::prelude::*;
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use skealed_shared::errors::AppError;
use skealed_shared::types::auth::{Claims, TokenPair, UserRole};

use crate::config::AppConfig;
use crate::models::{Credential, NewRefreshToken};
use crate::schema::refresh_tokens;

pub fn create_access_token(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, AppError> {
    let claims = Claims::new(user_id, email, role, ttl_secs);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
}

/// 32 random bytes, hex encoded. Used for refresh tokens and magic-link tokens.
pub fn create_opaque_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Only this digest is persisted; the raw token never touches the database.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn create_token_pair(
    credential: &Credential,
    secret: &str,
    access_ttl: i64,
) -> Result<(TokenPair, String), AppError> {
    let access_token = create_access_token(
        credential.id,
        &credential.email,
        credential.user_role(),
        secret,
        access_ttl,
    )?;
    let refresh_token = create_opaque_token();
    let refresh_hash = hash_token(&refresh_token);
    Ok((TokenPair::new(access_token, refresh_token, access_ttl), refresh_hash))
}

/// Issues a token pair and stores the refresh half.
pub fn issue_session(
    conn: &mut PgConnection,
    credential: &Credential,
    config: &AppConfig,
) -> Result<TokenPair, AppError> {
    let (pair, refresh_hash) = create_token_pair(credential, &config.jwt_secret, config.jwt_access_ttl)?;

    diesel::insert_into(refresh_tokens::table)
        .values(&NewRefreshToken {
            credential_id: credential.id,
            token_hash: refresh_hash,
            expires_at: Utc::now() + Duration::seconds(config.jwt_refresh_ttl),
        })
        .execute(conn)?;

    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skealed_shared::middleware::decode_access_token;

    fn credential(role: &str) -> Credential {
        Credential {
            id: Uuid::new_v4(),
            email: "learner@example.com".into(),
            role: role.into(),
            created_at: Utc::now(),
            last_sign_in_at: None,
        }
    }

    #[test]
    fn opaque_tokens_are_unique_hex() {
        let a = create_opaque_token();
        let b = create_opaque_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_and_not_identity() {
        let token = "abc123";
        assert_eq!(hash_token(token), hash_token(token));
        assert_ne!(hash_token(token), token);
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn token_pair_access_half_decodes_to_credential() {
        let cred = credential("admin");
        let (pair, refresh_hash) = create_token_pair(&cred, "secret", 900).unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_eq!(hash_token(&pair.refresh_token), refresh_hash);

        let claims = decode_access_token(&pair.access_token, "secret").unwrap();
        assert_eq!(claims.sub, cred.id);
        assert_eq!(claims.email, cred.email);
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn unknown_stored_role_degrades_to_user() {
        assert_eq!(credential("superuser").user_role(), UserRole::User);
    }
}
