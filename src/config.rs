use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// The configuration parameters for the application.
///
/// Every parameter can also be set in the environment or in a `.env` file in the working
/// directory.
#[derive(clap::Parser)]
pub struct Config {
    /// The connection URL for the Postgres database this application should use.
    ///
    /// Takes precedence over `ConnectionStrings:Default` in the settings file.
    #[clap(long, env)]
    pub database_url: Option<String>,

    /// The HMAC key shared with the token issuer, used to verify bearer tokens (JWTs).
    #[clap(long, env)]
    pub hmac_key: String,

    /// Path to the static settings file.
    #[clap(long, env, default_value = "appsettings.json")]
    pub settings_path: PathBuf,

    /// Name of the deployment environment, e.g. `Development`.
    ///
    /// Selects the overlay settings file `appsettings.<environment>.json`.
    #[clap(long, env, default_value = "Production")]
    pub app_environment: String,

    /// The address the HTTP server binds to.
    #[clap(long, env, default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    #[clap(long, env, default_value_t = 50)]
    pub database_max_connections: u32,
}

// The database URL usually carries a password, and the HMAC key is a secret outright.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("hmac_key", &"<redacted>")
            .field("settings_path", &self.settings_path)
            .field("app_environment", &self.app_environment)
            .field("bind_addr", &self.bind_addr)
            .field("database_max_connections", &self.database_max_connections)
            .finish()
    }
}

/// Values read from the static settings files.
///
/// The layout mirrors the JSON document, e.g.:
///
/// ```json
/// { "ConnectionStrings": { "Default": "postgres://localhost/game" } }
/// ```
#[derive(serde::Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(default)]
    pub connection_strings: ConnectionStrings,
}

#[derive(serde::Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectionStrings {
    pub default: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Config {
    /// Load the settings file named by `settings_path`, then the overlay for `app_environment`.
    pub fn load_settings(&self) -> Result<Settings, SettingsError> {
        let overlay = overlay_path(&self.settings_path, &self.app_environment);

        let mut settings = Settings::default();

        for path in [self.settings_path.as_path(), overlay.as_path()] {
            if let Some(layer) = Settings::read_optional(path)? {
                settings.merge(layer);
            }
        }

        Ok(settings)
    }
}

impl Settings {
    /// Read a settings file, returning `Ok(None)` if it doesn't exist.
    ///
    /// A file that exists but can't be read or parsed is an error; silently ignoring
    /// a typo in the settings would be much harder to debug than a failed startup.
    pub fn read_optional(path: &Path) -> Result<Option<Self>, SettingsError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("settings file {:?} not found, skipping", path);
                return Ok(None);
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| SettingsError::Parse {
                path: path.to_owned(),
                source,
            })
    }

    /// Values set in `other` replace the ones in `self`.
    fn merge(&mut self, other: Settings) {
        if other.connection_strings.default.is_some() {
            self.connection_strings.default = other.connection_strings.default;
        }
    }
}

/// `appsettings.json` + `Development` -> `appsettings.Development.json`, in the same directory.
fn overlay_path(base: &Path, environment: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file_name = match base.extension() {
        Some(ext) => format!("{}.{}.{}", stem, environment, ext.to_string_lossy()),
        None => format!("{}.{}", stem, environment),
    };

    base.with_file_name(file_name)
}
