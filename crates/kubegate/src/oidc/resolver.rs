use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::info;
use url::Url;

use crate::config::ClusterConfig;

use super::jwks::JwksCache;
use super::provider::{self, ProviderMetadata};
use super::verifier::IdTokenVerifier;
use super::OidcError;

/// Wire shape of the token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Tokens the gateway keeps from a code exchange. Only the ID token and
/// refresh token matter; the access token is never used.
#[derive(Debug, Clone)]
pub struct Tokens {
    pub id_token: String,
    pub refresh_token: Option<String>,
}

/// Everything needed to run the flow against one cluster's provider:
/// discovered endpoints, a bound verifier, and the exchange client.
pub struct ResolvedProvider {
    http: reqwest::Client,
    cluster: Arc<ClusterConfig>,
    pub metadata: ProviderMetadata,
    pub verifier: IdTokenVerifier,
}

impl ResolvedProvider {
    async fn resolve(
        http: reqwest::Client,
        cluster: Arc<ClusterConfig>,
    ) -> Result<Self, OidcError> {
        let metadata = provider::discover(&http, &cluster.provider_url).await?;
        info!(
            cluster = %cluster.name,
            issuer = %metadata.issuer,
            "resolved OIDC provider"
        );
        let jwks = Arc::new(JwksCache::new(http.clone(), metadata.jwks_uri.clone()));
        let verifier = IdTokenVerifier::new(
            metadata.issuer.clone(),
            cluster.client_id.clone(),
            jwks,
        );
        Ok(Self {
            http,
            cluster,
            metadata,
            verifier,
        })
    }

    /// Authorization endpoint URL carrying the CSRF state and the cluster's
    /// scopes and optional audience.
    pub fn authorization_url(&self, state: &str) -> Result<String, OidcError> {
        let mut url = Url::parse(&self.metadata.authorization_endpoint)
            .map_err(|e| OidcError::Discovery(format!("bad authorization_endpoint: {e}")))?;
        let scope = self.cluster.scopes.join(" ");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.cluster.client_id)
                .append_pair("redirect_uri", &self.cluster.redirect_url)
                .append_pair("scope", &scope)
                .append_pair("state", state)
                .append_pair("access_type", "offline")
                .append_pair("prompt", "consent");
            if !self.cluster.audience.is_empty() {
                pairs.append_pair("audience", &self.cluster.audience);
            }
        }
        Ok(url.into())
    }

    /// Exchange an authorization code at the token endpoint.
    pub async fn exchange_code(&self, code: &str) -> Result<Tokens, OidcError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.cluster.redirect_url.as_str()),
            ("client_id", self.cluster.client_id.as_str()),
            ("client_secret", self.cluster.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.metadata.token_endpoint)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OidcError::Exchange(format!("{status}: {body}")));
        }
        let tokens = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OidcError::Exchange(e.to_string()))?;
        let id_token = tokens.id_token.ok_or(OidcError::MissingIdToken)?;
        Ok(Tokens {
            id_token,
            refresh_token: tokens.refresh_token,
        })
    }
}

/// Cluster-keyed, lazily resolved providers.
///
/// Each cluster gets its own memoization cell: the first request resolves
/// discovery and JWKS wiring, later requests reuse the result. A failed
/// resolution leaves the cell empty so the next request retries.
pub struct ProviderResolver {
    http: reqwest::Client,
    entries: DashMap<String, Arc<OnceCell<Arc<ResolvedProvider>>>>,
}

impl ProviderResolver {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            entries: DashMap::new(),
        }
    }

    pub async fn resolve(
        &self,
        cluster: &Arc<ClusterConfig>,
    ) -> Result<Arc<ResolvedProvider>, OidcError> {
        // Clone the cell out so the map shard lock is not held across await.
        let cell = self
            .entries
            .entry(cluster.name.clone())
            .or_default()
            .clone();
        let provider = cell
            .get_or_try_init(|| async {
                ResolvedProvider::resolve(self.http.clone(), cluster.clone())
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(provider.clone())
    }
}
