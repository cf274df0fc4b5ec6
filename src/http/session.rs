use axum::routing::get;
use axum::{Json, Router};
use time::format_description::well_known::Rfc3339;

use crate::http::extractor::AuthUser;
use crate::http::{Error, Result};

pub fn router() -> Router {
    Router::new().route("/api/session", get(get_session))
}

#[derive(serde::Serialize)]
struct SessionBody {
    session: Session,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    subject: Option<String>,
    issuer: String,
    audience: String,
    /// RFC 3339
    expires_at: String,
}

/// Echo back what the bearer token says about the caller.
async fn get_session(auth_user: AuthUser) -> Result<Json<SessionBody>> {
    let claims = auth_user.claims;

    let expires_at = claims
        .expires_at
        .format(&Rfc3339)
        .map_err(|e| Error::Anyhow(e.into()))?;

    Ok(Json(SessionBody {
        session: Session {
            subject: claims.subject,
            issuer: claims.issuer,
            audience: claims.audience,
            expires_at,
        },
    }))
}
