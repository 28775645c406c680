use serde::Deserialize;

use super::OidcError;

/// Subset of the OIDC discovery document the gateway needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

/// Fetch `{provider_url}/.well-known/openid-configuration`.
pub async fn discover(
    http: &reqwest::Client,
    provider_url: &str,
) -> Result<ProviderMetadata, OidcError> {
    let url = format!(
        "{}/.well-known/openid-configuration",
        provider_url.trim_end_matches('/')
    );
    let response = http.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(OidcError::Discovery(format!(
            "{url} returned {}",
            response.status()
        )));
    }
    response
        .json::<ProviderMetadata>()
        .await
        .map_err(|e| OidcError::Discovery(format!("{url}: {e}")))
}
