//! `Authorization: Bearer <token>` -> VerifiedIdentity
//!
//! No user lookup happens here: the token is self-contained. Account status is
//! re-checked by the backends themselves.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::services::auth::token_codec::{Role, TokenCodec, TokenError};

/// Identity extracted from a valid, unexpired bearer token.
/// Lives only as long as the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential header missing")]
    Missing,
    #[error("credential header is not `Bearer <token>`")]
    Malformed,
    #[error("invalid credential: {0}")]
    Invalid(TokenError),
}

#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    codec: TokenCodec,
}

impl IdentityVerifier {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn verify(&self, credential: Option<&str>) -> Result<VerifiedIdentity, CredentialError> {
        let header = credential.ok_or(CredentialError::Missing)?;
        let token = bearer_token(header).ok_or(CredentialError::Malformed)?;

        let assertion = self.codec.decode(token).map_err(CredentialError::Invalid)?;

        Ok(VerifiedIdentity {
            subject_id: assertion.subject_id().to_string(),
            role: assertion.role(),
        })
    }

    /// Same as `verify`, but any failure means "no identity".
    pub fn try_verify(&self, credential: Option<&str>) -> Option<VerifiedIdentity> {
        match self.verify(credential) {
            Ok(identity) => Some(identity),
            Err(CredentialError::Missing) => None,
            Err(err) => {
                tracing::debug!(reason = %err, "ignoring optional credential");
                None
            }
        }
    }
}

/// Exactly two space-separated parts, the first being `Bearer`.
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    let (scheme, token) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || scheme != "Bearer" || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Short, non-reversible token id for log correlation.
pub fn token_fingerprint(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..12].to_string()
}
