//! Session verification.
//!
//! Sessions are HS256 JWTs minted by the auth service with the shared
//! `NEXTAUTH_SECRET`. They arrive in the `auth-token` cookie or as a bearer
//! token.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::Role;
use crate::state::AppState;
use crate::utils::error::AppError;

pub const SESSION_COOKIE: &str = "auth-token";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no session token")]
    Missing,

    #[error("session token is malformed")]
    Malformed,

    #[error("unsupported token algorithm")]
    Algorithm,

    #[error("session token signature mismatch")]
    Signature,

    #[error("session expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::Signature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => Self::Algorithm,
            _ => Self::Malformed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub name: String,
    /// Seconds since the epoch.
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, SessionError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }

    /// Mints a token the same way the auth service does.
    pub fn issue(&self, claims: &Claims) -> Result<String, SessionError> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }
}

fn session_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());
    if bearer.is_some() {
        return bearer;
    }

    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
}

/// Any signed-in user.
#[derive(Debug, Clone)]
pub struct Caller(pub Claims);

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or(SessionError::Missing)?;
        Ok(Caller(state.sessions.verify(&token)?))
    }
}

/// A signed-in user with the admin role.
#[derive(Debug, Clone)]
pub struct Admin(pub Claims);

#[axum::async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Caller(claims) = Caller::from_request_parts(parts, state).await?;
        if !claims.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Admin(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::Utc;

    fn claims(role: Role, exp_offset: i64) -> Claims {
        Claims {
            id: Uuid::new_v4(),
            email: "asha@example.com".to_string(),
            role,
            name: "Asha Deshmukh".to_string(),
            exp: Utc::now().timestamp() + exp_offset,
        }
    }

    #[test]
    fn test_issued_token_verifies() {
        let keys = SessionKeys::new("secret");
        let claims = claims(Role::Admin, 3600);
        let token = keys.issue(&claims).unwrap();

        assert_eq!(keys.verify(&token).unwrap(), claims);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = SessionKeys::new("other").issue(&claims(Role::User, 3600)).unwrap();
        assert_eq!(
            SessionKeys::new("secret").verify(&token),
            Err(SessionError::Signature)
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = SessionKeys::new("secret");
        let token = keys.issue(&claims(Role::User, -10)).unwrap();
        assert_eq!(keys.verify(&token), Err(SessionError::Expired));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let keys = SessionKeys::new("secret");
        let token = keys.issue(&claims(Role::User, 3600)).unwrap();
        let forged = keys.issue(&claims(Role::Admin, 3600)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = forged.split('.').nth(1).unwrap();
        let spliced = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(keys.verify(&spliced), Err(SessionError::Signature));
    }

    #[test]
    fn test_other_algorithms_are_rejected() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS384),
            &claims(Role::Admin, 3600),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert_eq!(
            SessionKeys::new("secret").verify(&token),
            Err(SessionError::Algorithm)
        );
    }

    #[test]
    fn test_unsigned_or_garbled_tokens_are_malformed() {
        // {"alg":"none"} . {} . <empty>
        let unsigned = "eyJhbGciOiJub25lIn0.e30.";
        assert_eq!(
            SessionKeys::new("secret").verify(unsigned),
            Err(SessionError::Malformed)
        );
        assert_eq!(
            SessionKeys::new("secret").verify("not-a-jwt"),
            Err(SessionError::Malformed)
        );
    }

    #[test]
    fn test_token_read_from_cookie_or_bearer() {
        let (parts, _) = Request::builder()
            .header(COOKIE, "theme=dark; auth-token=abc.def.ghi")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(session_token(&parts).as_deref(), Some("abc.def.ghi"));

        let (parts, _) = Request::builder()
            .header(AUTHORIZATION, "Bearer xyz")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(session_token(&parts).as_deref(), Some("xyz"));

        let (parts, _) = Request::builder().body(()).unwrap().into_parts();
        assert_eq!(session_token(&parts), None);
    }
}
