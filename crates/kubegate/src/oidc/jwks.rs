use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::OidcError;

const JWKS_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: String,
    #[serde(default)]
    kty: String,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

struct CachedKeys {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
}

/// Signing keys for one provider, fetched from its `jwks_uri` and cached.
///
/// Reads go through an `RwLock`; refreshes serialize on a separate mutex
/// with a double-check so concurrent verifications trigger one fetch, not a
/// stampede. An unknown `kid` forces a refresh once the cache has aged,
/// which covers provider key rotation.
pub struct JwksCache {
    http: reqwest::Client,
    jwks_uri: String,
    state: RwLock<Option<CachedKeys>>,
    refresh_lock: Mutex<()>,
}

impl JwksCache {
    pub fn new(http: reqwest::Client, jwks_uri: String) -> Self {
        Self {
            http,
            jwks_uri,
            state: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Decoding key for `kid`, refreshing the key set if needed.
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, OidcError> {
        if let Some(jwk) = self.lookup_fresh(kid) {
            return decoding_key_from(&jwk);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have refreshed while we waited.
        if let Some(jwk) = self.lookup_fresh(kid) {
            return decoding_key_from(&jwk);
        }

        self.refresh().await?;
        match self.lookup(kid) {
            Some(jwk) => decoding_key_from(&jwk),
            None => Err(OidcError::KeyNotFound(kid.to_string())),
        }
    }

    fn lookup(&self, kid: &str) -> Option<Jwk> {
        let state = self.state.read().ok()?;
        state.as_ref()?.keys.get(kid).cloned()
    }

    fn lookup_fresh(&self, kid: &str) -> Option<Jwk> {
        let state = self.state.read().ok()?;
        let cached = state.as_ref()?;
        if cached.fetched_at.elapsed() >= JWKS_TTL {
            return None;
        }
        cached.keys.get(kid).cloned()
    }

    async fn refresh(&self) -> Result<(), OidcError> {
        let response = self.http.get(&self.jwks_uri).send().await?;
        if !response.status().is_success() {
            return Err(OidcError::Jwks(format!(
                "{} returned {}",
                self.jwks_uri,
                response.status()
            )));
        }
        let set = response
            .json::<JwkSet>()
            .await
            .map_err(|e| OidcError::Jwks(format!("{}: {e}", self.jwks_uri)))?;

        let keys: HashMap<String, Jwk> = set
            .keys
            .into_iter()
            .filter(|k| k.kty == "RSA" && !k.kid.is_empty())
            .map(|k| (k.kid.clone(), k))
            .collect();
        debug!(uri = %self.jwks_uri, count = keys.len(), "refreshed JWKS");

        if let Ok(mut state) = self.state.write() {
            *state = Some(CachedKeys {
                keys,
                fetched_at: Instant::now(),
            });
        }
        Ok(())
    }
}

fn decoding_key_from(jwk: &Jwk) -> Result<DecodingKey, OidcError> {
    DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(|source| OidcError::InvalidKey {
        kid: jwk.kid.clone(),
        source,
    })
}
