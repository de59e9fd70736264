use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Learners are `user`. `admin` moderates the ideas board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    /// Value stored in `credentials.role`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::User, Self::Admin]
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// Access-token payload. Issued by skealed-auth, verified by every service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    /// Distinguishes tokens minted in the same second.
    pub jti: Uuid,
}

impl Claims {
    pub fn new(user_id: Uuid, email: impl Into<String>, role: UserRole, ttl_secs: i64) -> Self {
        let issued_at = Utc::now().timestamp();
        Self {
            sub: user_id,
            email: email.into(),
            role,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
            jti: Uuid::now_v7(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp < Utc::now().timestamp()
    }
}

/// The signed-in caller behind a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub token_id: Uuid,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        let Claims { sub, email, role, jti, .. } = claims;
        Self { id: sub, email, role, token_id: jti }
    }
}

/// Returned on sign-in and on refresh. `expires_in` is the access token's lifetime in seconds.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenPair {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self { access_token, refresh_token, token_type: "Bearer".into(), expires_in }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_its_stored_form() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(" user ".parse::<UserRole>().unwrap(), UserRole::User);
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert!("moderator".parse::<UserRole>().is_err());
    }

    #[test]
    fn claims_carry_identity_into_auth_user() {
        let id = Uuid::new_v4();
        let claims = Claims::new(id, "learner@example.com", UserRole::User, 60);
        assert!(!claims.is_expired());

        let jti = claims.jti;
        let user = AuthUser::from(claims);
        assert_eq!(user.id, id);
        assert_eq!(user.email, "learner@example.com");
        assert_eq!(user.token_id, jti);
        assert!(!user.is_admin());
    }

    #[test]
    fn negative_ttl_is_already_expired() {
        let claims = Claims::new(Uuid::new_v4(), "a@b.c", UserRole::Admin, -10);
        assert!(claims.is_expired());
        assert!(AuthUser::from(claims).is_admin());
    }
}
