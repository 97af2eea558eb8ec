//! Signed identity assertions (HS256 JWT).
//!
//! Responsibility:
//! - Identity Assertion <-> compact token string
//! - signature check first, then claim values (exp / iat)
//!
//! Wire claims follow the authentication service: `{ id, role, iat, exp }`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Decode failures. Closed set: every caller matches all three.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("expiresAt must be after issuedAt")]
    InvalidLifetime,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// The identity carried inside a bearer token.
///
/// Timestamps are kept at whole-second precision (the JWT `iat`/`exp` unit),
/// so an assertion survives an encode/decode round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAssertion {
    subject_id: String,
    role: Role,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl IdentityAssertion {
    pub fn new(
        subject_id: impl Into<String>,
        role: Role,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, IssueError> {
        let issued_at = truncate_to_seconds(issued_at).ok_or(IssueError::InvalidLifetime)?;
        let expires_at = truncate_to_seconds(expires_at).ok_or(IssueError::InvalidLifetime)?;
        if expires_at <= issued_at {
            return Err(IssueError::InvalidLifetime);
        }

        Ok(Self {
            subject_id: subject_id.into(),
            role,
            issued_at,
            expires_at,
        })
    }

    /// Assertion issued now, valid for `ttl`.
    pub fn issue_now(
        subject_id: impl Into<String>,
        role: Role,
        ttl: chrono::Duration,
    ) -> Result<Self, IssueError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(IssueError::InvalidLifetime)?;
        Self::new(subject_id, role, now, expires_at)
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

fn truncate_to_seconds(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.timestamp(), 0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    id: String,
    role: Role,
    iat: i64,
    exp: i64,
}

/// HS256 codec bound to one process-wide secret.
///
/// Key material is not printable via Debug.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is compared against our own clock in `decode_at`, after the signature check.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn encode(&self, assertion: &IdentityAssertion) -> Result<String, IssueError> {
        let claims = Claims {
            id: assertion.subject_id.clone(),
            role: assertion.role,
            iat: assertion.issued_at.timestamp(),
            exp: assertion.expires_at.timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        Ok(jsonwebtoken::encode(&header, &claims, &self.encoding_key)?)
    }

    pub fn decode(&self, token: &str) -> Result<IdentityAssertion, TokenError> {
        self.decode_at(token, Utc::now())
    }

    pub fn decode_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<IdentityAssertion, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(classify)?;
        let claims = data.claims;

        if claims.id.trim().is_empty() {
            return Err(TokenError::Malformed);
        }

        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Malformed)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Malformed)?;
        if expires_at <= issued_at {
            return Err(TokenError::Malformed);
        }

        let assertion = IdentityAssertion {
            subject_id: claims.id,
            role: claims.role,
            issued_at,
            expires_at,
        };

        if assertion.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(assertion)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}
