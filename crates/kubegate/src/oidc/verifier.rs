use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};

use super::claims::Claims;
use super::jwks::JwksCache;
use super::OidcError;

/// Verifies ID tokens for one cluster: RS256 signature against the
/// provider's JWKS, issuer, audience (the cluster's client_id), and expiry.
pub struct IdTokenVerifier {
    issuer: String,
    client_id: String,
    jwks: Arc<JwksCache>,
}

impl IdTokenVerifier {
    pub fn new(issuer: String, client_id: String, jwks: Arc<JwksCache>) -> Self {
        Self {
            issuer,
            client_id,
            jwks,
        }
    }

    /// Full verification, then hand back the claim set.
    pub async fn verify(&self, token: &str) -> Result<Claims, OidcError> {
        let header = decode_header(token)?;
        let kid = header.kid.ok_or(OidcError::MissingKeyId)?;
        let key = self.jwks.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.client_id]);

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
            if matches!(e.kind(), ErrorKind::ExpiredSignature) {
                OidcError::Expired
            } else {
                OidcError::Verification(e)
            }
        })?;
        Ok(data.claims)
    }
}
