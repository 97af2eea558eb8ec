/// Factory: build the `IdentityVerifier` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::{IdentityVerifier, TokenCodec};

pub fn build_identity_verifier(config: &Config) -> Arc<IdentityVerifier> {
    let codec = TokenCodec::new(config.jwt_secret.as_bytes());
    Arc::new(IdentityVerifier::new(codec))
}
