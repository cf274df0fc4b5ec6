use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// The error type returned by handlers and extractors.
///
/// Everything maps to a status code with a short plain-text body; internal errors are
/// logged and never shown to the client.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Return `401 Unauthorized` with a `WWW-Authenticate: Bearer` challenge.
    ///
    /// Used for every kind of token failure; the reason is only logged.
    #[error("authentication required")]
    Unauthorized,

    /// Return `404 Not Found`
    #[error("request path not found")]
    NotFound,

    /// Automatically return `500 Internal Server Error` on a `sqlx::Error`,
    /// so handlers can use `?` on database calls.
    #[error("an error occurred with the database")]
    Sqlx(#[from] sqlx::Error),

    /// Return `500 Internal Server Error` on a `anyhow::Error`.
    #[error("an internal server error occurred")]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Sqlx(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => {
                return (
                    self.status_code(),
                    [(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
                    self.to_string(),
                )
                    .into_response();
            }

            Self::Sqlx(ref e) => {
                log::error!("SQLx error: {:?}", e);
            }

            Self::Anyhow(ref e) => {
                log::error!("Generic error: {:?}", e);
            }

            Self::NotFound => (),
        }

        (self.status_code(), self.to_string()).into_response()
    }
}
