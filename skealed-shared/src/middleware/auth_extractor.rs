use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims};

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

/// Secret used to verify access tokens, shared by every service.
pub fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?;
        let claims = decode_access_token(&token, &jwt_secret())?;

        if claims.is_expired() {
            return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
        }

        Ok(AuthUser::from(claims))
    }
}

/// Bearer header first; `access_token` query parameter for EventSource clients,
/// which cannot set headers.
fn extract_token(parts: &Parts) -> Result<String, AppError> {
    if let Some(header) = parts.headers.get("Authorization") {
        let value = header
            .to_str()
            .map_err(|_| AppError::unauthorized("invalid authorization header"))?;

        return value
            .strip_prefix("Bearer ")
            .map(str::to_string)
            .ok_or_else(|| AppError::unauthorized("authorization header must use Bearer scheme"));
    }

    parts
        .uri
        .query()
        .and_then(|q| {
            q.split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(k, _)| *k == "access_token")
                .map(|(_, v)| v.to_string())
        })
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("sign in required"))
}

pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::new(ErrorCode::TokenExpired, "token has expired")
        }
        _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
    })?;

    Ok(token_data.claims)
}

/// Resolves to `None` for anonymous callers instead of rejecting.
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(_) => Ok(Self(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::auth::UserRole;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn parts_for(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn decodes_token_signed_with_same_secret() {
        let claims = Claims::new(Uuid::new_v4(), "me@example.com", UserRole::User, 300);
        let token = sign(&claims, "s3cret");

        let decoded = decode_access_token(&token, "s3cret").unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.email, "me@example.com");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let claims = Claims::new(Uuid::new_v4(), "me@example.com", UserRole::User, 300);
        let token = sign(&claims, "s3cret");

        let err = decode_access_token(&token, "different").unwrap_err();
        assert_eq!(err.code(), ErrorCode::TokenInvalid);
    }

    #[test]
    fn expired_token_reports_expiry() {
        let claims = Claims::new(Uuid::new_v4(), "me@example.com", UserRole::User, -3600);
        let token = sign(&claims, "s3cret");

        let err = decode_access_token(&token, "s3cret").unwrap_err();
        assert_eq!(err.code(), ErrorCode::TokenExpired);
    }

    #[test]
    fn header_takes_precedence_over_query() {
        let parts = parts_for("/session/events?access_token=from-query", Some("Bearer from-header"));
        assert_eq!(extract_token(&parts).unwrap(), "from-header");

        let parts = parts_for("/session/events?x=1&access_token=from-query", None);
        assert_eq!(extract_token(&parts).unwrap(), "from-query");
    }

    #[test]
    fn missing_or_malformed_credentials_are_unauthorized() {
        let parts = parts_for("/vault", None);
        assert_eq!(extract_token(&parts).unwrap_err().code(), ErrorCode::Unauthorized);

        let parts = parts_for("/vault", Some("Basic abc"));
        assert_eq!(extract_token(&parts).unwrap_err().code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn optional_extractor_tolerates_anonymous_callers() {
        let mut parts = parts_for("/skills", None);
        let OptionalAuthUser(user) = OptionalAuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn router_answers_401_envelope_without_a_session() {
        use axum::body::Body;
        use axum::http::StatusCode;
        use axum::routing::get;
        use axum::Router;
        use tower::ServiceExt;

        let app = Router::new().route("/me", get(|user: AuthUser| async move { user.email }));

        let anonymous = Request::builder().uri("/me").body(Body::empty()).unwrap();
        let res = app.clone().oneshot(anonymous).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let claims = Claims::new(Uuid::new_v4(), "me@example.com", UserRole::User, 300);
        let token = sign(&claims, &jwt_secret());
        let signed_in = Request::builder()
            .uri("/me")
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(signed_in).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
