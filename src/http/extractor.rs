use async_trait::async_trait;
use axum::extract::{Extension, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderValue;
use time::OffsetDateTime;

use crate::auth::ValidatedClaims;
use crate::http::error::Error;
use crate::http::ApiContext;

const SCHEME: &str = "Bearer";

/// Add this as a parameter to a handler function to require a valid bearer token.
///
/// Parses a JWT from the `Authorization: Bearer <token>` header and checks it against the
/// [`TokenValidationPolicy`][crate::auth::TokenValidationPolicy] in the `ApiContext`.
pub struct AuthUser {
    pub claims: ValidatedClaims,
}

impl AuthUser {
    /// Attempt to parse `Self` from an `Authorization` header.
    fn from_authorization(ctx: &ApiContext, auth_header: &HeaderValue) -> Result<Self, Error> {
        let auth_header = auth_header.to_str().map_err(|_| {
            log::debug!("Authorization header is not UTF-8");
            Error::Unauthorized
        })?;

        let token = bearer_token(auth_header).ok_or_else(|| {
            log::debug!("Authorization header is not using the Bearer scheme");
            Error::Unauthorized
        })?;

        let claims = ctx
            .auth
            .validate(token, OffsetDateTime::now_utc())
            .map_err(|e| {
                log::debug!("rejected bearer token: {}", e);
                Error::Unauthorized
            })?;

        Ok(Self { claims })
    }
}

/// `Bearer <token>` -> `<token>`. The scheme name is case-insensitive (RFC 7235).
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx: Extension<ApiContext> = Extension::from_request_parts(parts, state)
            .await
            .expect("BUG: ApiContext was not added as an extension");

        // Get the value of the `Authorization` header, if it was sent at all.
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(Error::Unauthorized)?;

        Self::from_authorization(&ctx, auth_header)
    }
}
