//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use crate::config::{ClusterRegistry, Settings};
use crate::oidc::ProviderResolver;
use crate::session;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ClusterRegistry>,
    pub resolver: Arc<ProviderResolver>,
    pub root_path: String,
    pub secure_cookies: bool,
    cookie_key: Key,
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let registry = ClusterRegistry::new(settings.clusters.clone())
            .context("building cluster registry")?;

        let mut builder = reqwest::Client::builder().timeout(HTTP_TIMEOUT);
        for ca in registry.trusted_cas() {
            let cert = reqwest::Certificate::from_pem(ca)
                .context("parsing trusted CA certificate")?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder.build().context("building HTTP client")?;

        Ok(Self {
            registry: Arc::new(registry),
            resolver: Arc::new(ProviderResolver::new(http)),
            root_path: settings.root_path(),
            secure_cookies: settings.secure_cookies(),
            cookie_key: session::derive_key(
                &settings.session_security_key,
                &settings.session_salt,
            ),
        })
    }

    /// Absolute path of the landing page.
    pub fn home_url(&self) -> String {
        if self.root_path.is_empty() {
            "/".to_string()
        } else {
            self.root_path.clone()
        }
    }
}
