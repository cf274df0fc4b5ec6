use hmac::{Hmac, NewMac};
use jwt::VerifyWithKey;
use sha2::Sha256;
use time::{Duration, OffsetDateTime};

/// The `iss` claim the token issuer puts in every token.
pub const ISSUER: &str = "auth-server";

/// The `aud` claim tokens meant for this service must carry.
pub const AUDIENCE: &str = "game-server";

/// How far apart the clocks of the token issuer and this service are allowed to drift.
pub const CLOCK_SKEW: Duration = Duration::minutes(5);

/// The parameters every bearer token is checked against.
///
/// Built once at startup with [`TokenValidationPolicy::build`] and then only ever read,
/// so it is shared between request handlers behind an `Arc`.
#[derive(Clone)]
pub struct TokenValidationPolicy {
    issuer: &'static str,
    audience: &'static str,
    signing_key: Vec<u8>,
    hmac: Hmac<Sha256>,
    clock_skew: Duration,
    validate_issuer: bool,
    validate_audience: bool,
    validate_signing_key: bool,
    validate_lifetime: bool,
}

/// The registered claims we look at. Anything else in the payload is ignored.
#[derive(serde::Serialize, serde::Deserialize, Debug, Default, Clone)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Standard JWT `exp` claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Standard JWT `nbf` claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

/// RFC 7519 allows `aud` to be either a single string or an array of them.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

/// What a successfully validated token tells us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClaims {
    pub subject: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub expires_at: OffsetDateTime,
}

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("token could not be parsed: {0}")]
    Malformed(jwt::Error),

    #[error("token signature did not verify: {0}")]
    BadSignature(jwt::Error),

    #[error("the configured signing key is empty")]
    EmptySigningKey,

    #[error("unexpected issuer {0:?}")]
    InvalidIssuer(Option<String>),

    #[error("token is not intended for this audience")]
    InvalidAudience,

    #[error("token has no expiration")]
    MissingExpiration,

    #[error("token lifetime is invalid")]
    InvalidLifetime,

    #[error("token expired at {0}")]
    Expired(OffsetDateTime),

    #[error("token is not valid before {0}")]
    NotYetValid(OffsetDateTime),
}

impl TokenValidationPolicy {
    /// Create the policy used for every request: issuer, audience, signature and
    /// lifetime are all validated, with [`CLOCK_SKEW`] of tolerance on the lifetime.
    pub fn build(signing_key: &[u8]) -> Self {
        let hmac = Hmac::<Sha256>::new_from_slice(signing_key)
            .expect("HMAC-SHA-256 can accept any key length");

        Self {
            issuer: ISSUER,
            audience: AUDIENCE,
            signing_key: signing_key.to_vec(),
            hmac,
            clock_skew: CLOCK_SKEW,
            validate_issuer: true,
            validate_audience: true,
            validate_signing_key: true,
            validate_lifetime: true,
        }
    }

    pub fn issuer(&self) -> &str {
        self.issuer
    }

    pub fn audience(&self) -> &str {
        self.audience
    }

    pub fn signing_key(&self) -> &[u8] {
        &self.signing_key
    }

    pub fn clock_skew_seconds(&self) -> i64 {
        self.clock_skew.whole_seconds()
    }

    pub fn validates_issuer(&self) -> bool {
        self.validate_issuer
    }

    pub fn validates_audience(&self) -> bool {
        self.validate_audience
    }

    pub fn validates_signing_key(&self) -> bool {
        self.validate_signing_key
    }

    pub fn validates_lifetime(&self) -> bool {
        self.validate_lifetime
    }

    /// Check a compact-serialized JWT against this policy as of `now`.
    ///
    /// The signature is always verified; the algorithm named in the token header has to be
    /// `HS256` (the `jwt` crate checks it against the key).
    pub fn validate(&self, token: &str, now: OffsetDateTime) -> Result<ValidatedClaims, TokenError> {
        if self.validate_signing_key && self.signing_key.is_empty() {
            return Err(TokenError::EmptySigningKey);
        }

        let jwt = jwt::Token::<jwt::Header, TokenClaims, _>::parse_unverified(token)
            .map_err(TokenError::Malformed)?;

        let jwt = jwt
            .verify_with_key(&self.hmac)
            .map_err(TokenError::BadSignature)?;

        let (_header, claims) = jwt.into();

        let issuer = claims.iss.unwrap_or_default();
        if self.validate_issuer && issuer != self.issuer {
            return Err(TokenError::InvalidIssuer(Some(issuer).filter(|s| !s.is_empty())));
        }

        let audience = match claims.aud {
            Some(aud) if !self.validate_audience || aud.contains(self.audience) => {
                self.audience.to_string()
            }
            None if !self.validate_audience => String::new(),
            _ => return Err(TokenError::InvalidAudience),
        };

        let exp = claims.exp.ok_or(TokenError::MissingExpiration)?;
        let expires_at =
            OffsetDateTime::from_unix_timestamp(exp).map_err(|_| TokenError::InvalidLifetime)?;

        if self.validate_lifetime {
            self.check_lifetime(expires_at, claims.nbf, now)?;
        }

        Ok(ValidatedClaims {
            subject: claims.sub,
            issuer,
            audience,
            expires_at,
        })
    }

    fn check_lifetime(
        &self,
        expires_at: OffsetDateTime,
        nbf: Option<i64>,
        now: OffsetDateTime,
    ) -> Result<(), TokenError> {
        if let Some(nbf) = nbf {
            let not_before =
                OffsetDateTime::from_unix_timestamp(nbf).map_err(|_| TokenError::InvalidLifetime)?;

            if not_before > expires_at {
                return Err(TokenError::InvalidLifetime);
            }

            // Underflow means the window opened before any representable time.
            if let Some(earliest) = not_before.checked_sub(self.clock_skew) {
                if now < earliest {
                    return Err(TokenError::NotYetValid(not_before));
                }
            }
        }

        // Overflow means the window closes after any representable time.
        if let Some(latest) = expires_at.checked_add(self.clock_skew) {
            if now > latest {
                return Err(TokenError::Expired(expires_at));
            }
        }

        Ok(())
    }
}

impl Audience {
    fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(aud) => aud == audience,
            Self::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Signing helpers for tests; issuing tokens is the job of a separate service.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use jwt::SignWithKey;

    pub const KEY: &[u8] = b"a shared secret of reasonable length";

    pub fn sign(claims: &TokenClaims, key: &[u8]) -> String {
        let hmac = Hmac::<Sha256>::new_from_slice(key).unwrap();
        claims.clone().sign_with_key(&hmac).unwrap()
    }

    /// Claims that pass the default policy at `now`.
    pub fn valid_claims(now: OffsetDateTime) -> TokenClaims {
        TokenClaims {
            sub: Some("player-42".into()),
            iss: Some(ISSUER.into()),
            aud: Some(Audience::One(AUDIENCE.into())),
            exp: Some((now + Duration::hours(1)).unix_timestamp()),
            nbf: Some(now.unix_timestamp()),
        }
    }
}
