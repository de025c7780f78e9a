// Session tokens
// Stateless HS256 JWTs carrying the admin login and an expiry

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Validity window of a freshly issued session
pub const SESSION_TTL_HOURS: i64 = 12;

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub login: String,
    /// Unix timestamp, seconds
    pub exp: i64,
}

/// Token rejected for a bad signature, a past expiry or a malformed body.
/// All causes collapse into this one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid or expired session")]
pub struct InvalidSession;

#[derive(Debug, Error)]
#[error("failed to sign session token: {0}")]
pub struct SignError(#[from] jsonwebtoken::errors::Error);

/// Signed token together with the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates session tokens with a shared HMAC secret
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, login: &str) -> Result<IssuedToken, SignError> {
        self.issue_at(login, Utc::now())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, login: &str, now: DateTime<Utc>) -> Result<IssuedToken, SignError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            login: login.to_string(),
            exp: expires_at.timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn validate(&self, token: &str) -> Result<Claims, InvalidSession> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| InvalidSession)
    }
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
