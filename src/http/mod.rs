use std::sync::Arc;

use anyhow::Context;
use axum::{Extension, Router};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::auth::TokenValidationPolicy;
use crate::config::Config;

// Utility modules.

/// Defines a common error type to use for all request handlers.
mod error;

/// Contains definitions for application-specific parameters to handler functions,
/// such as `AuthUser` which checks for the `Authorization: Bearer <token>` header in the request,
/// verifies `<token>` against the policy and deserializes its claims.
mod extractor;

// Modules introducing API routes.
mod health;
mod session;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The core type through which handler functions can access common API state.
///
/// This can be accessed by adding a parameter `Extension<ApiContext>` to a handler function's
/// parameters.
#[derive(Clone)]
struct ApiContext {
    config: Arc<Config>,
    db: PgPool,
    auth: Arc<TokenValidationPolicy>,
}

/// Start the HTTP server.
///
/// The database must already be migrated: handlers assume the schema is current.
pub async fn serve(config: Config, db: PgPool, auth: TokenValidationPolicy) -> anyhow::Result<()> {
    let addr = config.bind_addr;

    let app = api_router(ApiContext {
        config: Arc::new(config),
        db,
        auth: Arc::new(auth),
    });

    log::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("error running HTTP server")
}

fn api_router(ctx: ApiContext) -> Router {
    health::router()
        .merge(session::router())
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                // Enables logging. Use `RUST_LOG=tower_http=debug`
                .layer(TraceLayer::new_for_http())
                .layer(Extension(ctx)),
        )
}

async fn not_found() -> Error {
    Error::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
    use axum::http::{Request, StatusCode};
    use clap::Parser;
    use sqlx::postgres::PgPoolOptions;
    use time::OffsetDateTime;
    use tower::ServiceExt;

    use crate::auth::test_support::{sign, valid_claims, KEY};
    use crate::auth::TokenClaims;

    // The pool never actually connects unless a handler touches the database.
    fn test_router() -> Router {
        let config = Config::parse_from(["auth-service", "--hmac-key", "unused"]);
        let db = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        api_router(ApiContext {
            config: Arc::new(config),
            db,
            auth: Arc::new(TokenValidationPolicy::build(KEY)),
        })
    }

    fn session_request(authorization: Option<&str>) -> Request<Body> {
        let mut request = Request::builder().uri("/api/session");

        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        request.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_session_with_valid_token() {
        let token = sign(&valid_claims(OffsetDateTime::now_utc()), KEY);

        let response = test_router()
            .oneshot(session_request(Some(&format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_scheme_is_case_insensitive() {
        let token = sign(&valid_claims(OffsetDateTime::now_utc()), KEY);

        let response = test_router()
            .oneshot(session_request(Some(&format!("bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_without_token() {
        let response = test_router().oneshot(session_request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn test_session_with_wrong_scheme() {
        let token = sign(&valid_claims(OffsetDateTime::now_utc()), KEY);

        let response = test_router()
            .oneshot(session_request(Some(&format!("Token {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_with_wrong_audience() {
        let claims = TokenClaims {
            aud: Some(crate::auth::Audience::One("someone-else".into())),
            ..valid_claims(OffsetDateTime::now_utc())
        };

        let response = test_router()
            .oneshot(session_request(Some(&format!("Bearer {}", sign(&claims, KEY)))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let request = Request::builder()
            .uri("/api/users")
            .body(Body::empty())
            .unwrap();

        let response = test_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_with_expired_token() {
        let issued = OffsetDateTime::now_utc() - time::Duration::hours(3);
        let token = sign(&valid_claims(issued), KEY);

        let response = test_router()
            .oneshot(session_request(Some(&format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
