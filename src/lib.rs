// Modules are documented here rather than with `//!` comments inside each file, so this
// file doubles as a map of the crate.

/// Defines the arguments required to start the server application using [`clap`],
/// and the static settings files read alongside them.
///
/// [`clap`]: https://github.com/clap-rs/clap/
pub mod config;

/// Resolves the database connection string and opens/migrates the Postgres pool.
pub mod db;

/// The validation policy bearer tokens are checked against.
pub mod auth;

/// Contains the setup code for the API built with Axum.
pub mod http;
