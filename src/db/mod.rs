use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod connection;

pub use connection::{resolve, ConnectionString};

/// Open the connection pool.
///
/// This connects eagerly, so a missing or unreachable database fails startup here
/// rather than on the first request.
pub async fn connect(
    connection_string: &ConnectionString,
    max_connections: u32,
) -> anyhow::Result<PgPool> {
    if connection_string.is_empty() {
        log::warn!(
            "no database connection string configured; set {} or {}",
            connection::ENV_SOURCE,
            connection::CONFIG_SOURCE
        );
    }

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(connection_string.as_str())
        .await
        .with_context(|| {
            format!(
                "could not connect to the database (connection string from {})",
                connection_string.source().unwrap_or("<none>")
            )
        })
}

/// Bring the schema up to date with the migrations embedded from `migrations/`.
///
/// The server must not accept requests until this has succeeded.
pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    // This embeds database migrations in the application binary so we can ensure the database
    // is migrated correctly on startup
    sqlx::migrate!()
        .run(db)
        .await
        .context("failed to run migrations")?;

    log::info!("database migrations are up to date");

    Ok(())
}
