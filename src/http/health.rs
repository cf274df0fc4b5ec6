use axum::extract::Extension;
use axum::routing::get;
use axum::{Json, Router};

use crate::http::{ApiContext, Result};

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

#[derive(serde::Serialize)]
struct HealthBody {
    status: &'static str,
    environment: String,
}

/// Unauthenticated liveness check that also makes sure the database answers.
async fn health(ctx: Extension<ApiContext>) -> Result<Json<HealthBody>> {
    sqlx::query("select 1").execute(&ctx.db).await?;

    Ok(Json(HealthBody {
        status: "ok",
        environment: ctx.config.app_environment.clone(),
    }))
}
