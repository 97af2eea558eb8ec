pub mod factory;
pub mod policy;
pub mod token_codec;
pub mod verifier;

pub use factory::build_identity_verifier;
pub use policy::{AuthRequirement, Decision, DenyReason, authorize};
pub use token_codec::{IdentityAssertion, Role, TokenCodec, TokenError};
pub use verifier::{CredentialError, IdentityVerifier, VerifiedIdentity};
