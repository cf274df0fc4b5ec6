use std::borrow::Cow;
use std::fmt;

use percent_encoding::percent_decode_str;

/// Name of the environment variable consulted first for the connection string.
pub const ENV_SOURCE: &str = "DATABASE_URL";

/// Name of the settings key consulted when the environment doesn't provide a value.
pub const CONFIG_SOURCE: &str = "ConnectionStrings:Default";

// Some hosting platforms hand out URLs with the long-form scheme, which the driver rejects.
const ALTERNATE_SCHEME: &str = "postgresql://";
const DRIVER_SCHEME: &str = "postgres://";

/// One candidate for where the connection string comes from.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSource<'a> {
    pub name: &'static str,
    pub value: Option<&'a str>,
}

/// The connection string the database pool is opened with.
///
/// A raw `postgresql://` prefix is rewritten before percent-decoding; a percent-encoded
/// scheme is decoded but not rewritten afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    value: String,
    source: Option<&'static str>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed percent-escape at byte offset {offset}")]
    MalformedEscape { offset: usize },

    #[error("percent-decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

impl<'a> ConnectionSource<'a> {
    pub fn new(name: &'static str, value: Option<&'a str>) -> Self {
        Self { name, value }
    }
}

impl ConnectionString {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The name of the source the value was taken from, if any source had one.
    pub fn source(&self) -> Option<&'static str> {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

// Connection strings usually carry a password, so this only shows where it came from.
impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("source", &self.source)
            .field("is_empty", &self.value.is_empty())
            .finish()
    }
}

/// Resolve the connection string from the `DATABASE_URL` value, falling back to
/// the `ConnectionStrings:Default` setting.
pub fn resolve(env_value: Option<&str>, config_value: Option<&str>) -> ConnectionString {
    resolve_sources(&[
        ConnectionSource::new(ENV_SOURCE, env_value),
        ConnectionSource::new(CONFIG_SOURCE, config_value),
    ])
}

/// Take the first source with a non-empty value, in order, and normalize it.
///
/// If no source has a value the result is empty; that isn't treated as an error here,
/// the database driver will complain when it tries to connect.
pub fn resolve_sources(sources: &[ConnectionSource<'_>]) -> ConnectionString {
    let selected = sources
        .iter()
        .find(|source| source.value.map_or(false, |value| !value.is_empty()));

    let Some(source) = selected else {
        log::debug!("no connection string source provided a value");

        return ConnectionString {
            value: String::new(),
            source: None,
        };
    };

    log::debug!("using connection string from {}", source.name);

    ConnectionString {
        value: normalize(source.value.unwrap_or_default()),
        source: Some(source.name),
    }
}

fn normalize(raw: &str) -> String {
    let rewritten = rewrite_scheme(raw);

    match percent_decode(&rewritten) {
        Ok(decoded) => decoded,
        Err(e) => {
            // Not necessarily a mistake: a key/value connection string may legitimately
            // contain a `%` in a password.
            log::debug!("not percent-decoding connection string: {}", e);
            rewritten.into_owned()
        }
    }
}

/// Replace a leading `postgresql://` with `postgres://`. Nothing after the prefix is touched.
fn rewrite_scheme(raw: &str) -> Cow<'_, str> {
    match raw.strip_prefix(ALTERNATE_SCHEME) {
        Some(rest) => Cow::Owned(format!("{}{}", DRIVER_SCHEME, rest)),
        None => Cow::Borrowed(raw),
    }
}

/// Percent-decode the whole input once.
///
/// Unlike [`percent_decode_str`] on its own, a `%` that isn't followed by two hex digits
/// is an error rather than being passed through, so a half-decoded string never escapes.
pub fn percent_decode(input: &str) -> Result<String, DecodeError> {
    let bytes = input.as_bytes();

    for (offset, _) in input.match_indices('%') {
        let well_formed = bytes
            .get(offset + 1..offset + 3)
            .map_or(false, |hex| hex.iter().all(u8::is_ascii_hexdigit));

        if !well_formed {
            return Err(DecodeError::MalformedEscape { offset });
        }
    }

    percent_decode_str(input)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| DecodeError::InvalidUtf8)
}
