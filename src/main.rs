use anyhow::Context;
use clap::Parser;

use auth_service::auth::TokenValidationPolicy;
use auth_service::config::Config;
use auth_service::{db, http};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // This returns an error if the `.env` file doesn't exist, but that's not what we want
    // since we're not going to use a `.env` file if we deploy this application.
    dotenv::dotenv().ok();

    // Initialize the logger.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse our configuration from the environment.
    // This will exit with a help message if something is wrong.
    let config = Config::parse();

    let settings = config
        .load_settings()
        .context("could not load static settings")?;

    let connection_string = db::resolve(
        config.database_url.as_deref(),
        settings.connection_strings.default.as_deref(),
    );

    let policy = TokenValidationPolicy::build(config.hmac_key.as_bytes());

    let db = db::connect(&connection_string, config.database_max_connections).await?;

    // Requests must not be served against a stale schema.
    db::migrate(&db).await?;

    // Finally, we spin up our API.
    http::serve(config, db, policy).await?;

    Ok(())
}
