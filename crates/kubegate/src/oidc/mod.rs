//! OIDC provider integration: discovery, JWKS-backed token verification,
//! and authorization-code exchange, resolved lazily per cluster.

pub mod claims;
pub mod jwks;
pub mod provider;
pub mod resolver;
pub mod verifier;

pub use claims::Claims;
pub use jwks::JwksCache;
pub use provider::ProviderMetadata;
pub use resolver::{ProviderResolver, ResolvedProvider, Tokens};
pub use verifier::IdTokenVerifier;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OidcError {
    #[error("provider discovery failed: {0}")]
    Discovery(String),

    #[error("JWKS fetch failed: {0}")]
    Jwks(String),

    #[error("token header has no key id")]
    MissingKeyId,

    #[error("no JWKS key matches kid {0:?}")]
    KeyNotFound(String),

    #[error("JWKS key {kid:?} is unusable: {source}")]
    InvalidKey {
        kid: String,
        source: jsonwebtoken::errors::Error,
    },

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("token response contained no id_token")]
    MissingIdToken,

    #[error("ID token has expired")]
    Expired,

    #[error("ID token verification failed: {0}")]
    Verification(#[from] jsonwebtoken::errors::Error),

    #[error("required claim {0:?} is missing")]
    ClaimMissing(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
