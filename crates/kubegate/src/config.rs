//! Configuration loading and validation.
//!
//! Settings come from a YAML file plus `KUBEGATE_*` environment overrides
//! (`__` separates nested keys). All validation and CA file reads happen at
//! startup so the request path never touches the filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard-coded fallback salt, kept for compatibility with existing session
/// keys. Operators should set their own.
const DEFAULT_SESSION_SALT: &str = "MkmfuPNHnZBBivy0L0aW";

const MIN_SALT_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read CA file {path}: {source}")]
    CaRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9080
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "profile".to_string(),
        "email".to_string(),
        "offline_access".to_string(),
    ]
}

fn default_username_claim() -> String {
    "nickname".to_string()
}

fn default_session_salt() -> String {
    DEFAULT_SESSION_SALT.to_string()
}

/// One authenticatable Kubernetes cluster and its OIDC provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,

    /// OIDC issuer base URL. Endpoints are resolved via discovery.
    pub provider_url: String,

    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Some providers (public clients) legitimately have no secret.
    #[serde(default)]
    pub allow_empty_client_secret: bool,

    /// Optional `audience` parameter forwarded to the authorization endpoint.
    #[serde(default)]
    pub audience: String,

    /// Where the provider redirects back to; must be this gateway's
    /// `/callback` route as seen from the browser.
    pub redirect_url: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Claim used as the kubeconfig identity.
    #[serde(default = "default_username_claim")]
    pub username_claim: String,

    /// Deprecated. Only triggers a warning when set; never used as identity.
    #[serde(default)]
    pub email_claim: String,

    pub api_server_url: String,

    /// PEM bundle embedded into the generated kubeconfig for the API server.
    #[serde(default)]
    pub cluster_ca_path: Option<PathBuf>,

    /// PEM bundle trusted when talking to the OIDC provider, also embedded
    /// into the kubeconfig auth-provider block.
    #[serde(default)]
    pub trusted_ca_path: Option<PathBuf>,

    /// Render the full claim set on the commandline page.
    #[serde(default)]
    pub show_claims: bool,

    #[serde(skip)]
    pub cluster_ca: Option<Vec<u8>>,
    #[serde(skip)]
    pub trusted_ca: Option<Vec<u8>>,
}

impl ClusterConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let checks: &[(bool, &str)] = &[
            (self.name.is_empty(), "name is required"),
            (self.provider_url.is_empty(), "provider_url is required"),
            (self.client_id.is_empty(), "client_id is required"),
            (
                self.client_secret.is_empty() && !self.allow_empty_client_secret,
                "client_secret is required (or set allow_empty_client_secret)",
            ),
            (self.redirect_url.is_empty(), "redirect_url is required"),
            (self.api_server_url.is_empty(), "api_server_url is required"),
        ];
        for (failed, msg) in checks {
            if *failed {
                return Err(ConfigError::Invalid(format!(
                    "cluster {:?}: {msg}",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Read configured CA files into memory. A configured but unreadable
    /// path is fatal.
    fn load_certs(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = &self.cluster_ca_path {
            self.cluster_ca = Some(read_ca(path)?);
        }
        if let Some(path) = &self.trusted_ca_path {
            self.trusted_ca = Some(read_ca(path)?);
        }
        Ok(())
    }
}

fn read_ca(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::CaRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Top-level gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional prefix the gateway is served under behind a reverse proxy,
    /// e.g. `/gateway`. Empty means the root.
    #[serde(default)]
    pub http_path: String,

    #[serde(default)]
    pub serve_tls: bool,
    #[serde(default)]
    pub cert_file: Option<PathBuf>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Secret the session cookie key is derived from.
    pub session_security_key: String,
    #[serde(default = "default_session_salt")]
    pub session_salt: String,

    /// Mark session cookies `Secure`. Defaults to the TLS setting.
    #[serde(default)]
    pub secure_cookies: Option<bool>,

    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
}

impl Settings {
    /// Load from an optional YAML file plus `KUBEGATE_*` env overrides,
    /// validate, and read CA files.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("KUBEGATE")
                .separator("__")
                .try_parsing(true),
        );

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        for cluster in &mut settings.clusters {
            cluster.load_certs()?;
        }
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_security_key.is_empty() {
            return Err(ConfigError::Invalid(
                "session_security_key is required".to_string(),
            ));
        }
        if self.session_salt.len() < MIN_SALT_LEN {
            return Err(ConfigError::Invalid(format!(
                "session_salt must be at least {MIN_SALT_LEN} characters"
            )));
        }
        if self.serve_tls && (self.cert_file.is_none() || self.key_file.is_none()) {
            return Err(ConfigError::Invalid(
                "serve_tls requires cert_file and key_file".to_string(),
            ));
        }
        if self.clusters.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one cluster must be configured".to_string(),
            ));
        }
        for cluster in &self.clusters {
            cluster.validate()?;
        }
        Ok(())
    }

    /// Path prefix with no trailing slash, or `""` when serving at the root.
    pub fn root_path(&self) -> String {
        let trimmed = self.http_path.trim_end_matches('/');
        if trimmed.is_empty() || trimmed == "/" {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies.unwrap_or(self.serve_tls)
    }
}

/// Immutable cluster lookup, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ClusterRegistry {
    clusters: HashMap<String, Arc<ClusterConfig>>,
}

impl ClusterRegistry {
    pub fn new(clusters: Vec<ClusterConfig>) -> Result<Self, ConfigError> {
        let mut map = HashMap::with_capacity(clusters.len());
        for cluster in clusters {
            let name = cluster.name.clone();
            if map.insert(name.clone(), Arc::new(cluster)).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "duplicate cluster name {name:?}"
                )));
            }
        }
        Ok(Self { clusters: map })
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<ClusterConfig>> {
        self.clusters.get(name)
    }

    /// Cluster names in stable sorted order, for the picker page.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clusters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// All trusted CA bundles across clusters, for the outbound HTTP client.
    pub fn trusted_cas(&self) -> Vec<&[u8]> {
        let mut cas: Vec<(&str, &[u8])> = self
            .clusters
            .iter()
            .filter_map(|(name, c)| c.trusted_ca.as_deref().map(|ca| (name.as_str(), ca)))
            .collect();
        cas.sort_unstable_by_key(|(name, _)| *name);
        cas.into_iter().map(|(_, ca)| ca).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_cluster() -> ClusterConfig {
        ClusterConfig {
            name: "dev".to_string(),
            provider_url: "https://idp.example.com".to_string(),
            client_id: "kubegate".to_string(),
            client_secret: "secret".to_string(),
            allow_empty_client_secret: false,
            audience: String::new(),
            redirect_url: "https://gate.example.com/callback".to_string(),
            scopes: default_scopes(),
            username_claim: default_username_claim(),
            email_claim: String::new(),
            api_server_url: "https://k8s.example.com:6443".to_string(),
            cluster_ca_path: None,
            trusted_ca_path: None,
            show_claims: false,
            cluster_ca: None,
            trusted_ca: None,
        }
    }

    fn valid_settings() -> Settings {
        Settings {
            host: default_host(),
            port: default_port(),
            http_path: String::new(),
            serve_tls: false,
            cert_file: None,
            key_file: None,
            session_security_key: "0123456789abcdef".to_string(),
            session_salt: default_session_salt(),
            secure_cookies: None,
            clusters: vec![valid_cluster()],
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_fields() {
        struct Case {
            name: &'static str,
            mutate: fn(&mut Settings),
        }
        let cases = [
            Case {
                name: "missing security key",
                mutate: |s| s.session_security_key.clear(),
            },
            Case {
                name: "short salt",
                mutate: |s| s.session_salt = "short".to_string(),
            },
            Case {
                name: "tls without certs",
                mutate: |s| s.serve_tls = true,
            },
            Case {
                name: "no clusters",
                mutate: |s| s.clusters.clear(),
            },
            Case {
                name: "cluster missing client_id",
                mutate: |s| s.clusters[0].client_id.clear(),
            },
            Case {
                name: "cluster missing secret",
                mutate: |s| s.clusters[0].client_secret.clear(),
            },
            Case {
                name: "cluster missing redirect",
                mutate: |s| s.clusters[0].redirect_url.clear(),
            },
            Case {
                name: "cluster missing api server",
                mutate: |s| s.clusters[0].api_server_url.clear(),
            },
        ];
        for case in cases {
            let mut settings = valid_settings();
            (case.mutate)(&mut settings);
            assert!(settings.validate().is_err(), "case: {}", case.name);
        }
    }

    #[test]
    fn empty_secret_allowed_when_opted_in() {
        let mut settings = valid_settings();
        settings.clusters[0].client_secret.clear();
        settings.clusters[0].allow_empty_client_secret = true;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn root_path_normalization() {
        let mut settings = valid_settings();
        for (input, want) in [
            ("", ""),
            ("/", ""),
            ("/gateway", "/gateway"),
            ("/gateway/", "/gateway"),
            ("gateway", "/gateway"),
        ] {
            settings.http_path = input.to_string();
            assert_eq!(settings.root_path(), want, "input: {input:?}");
        }
    }

    #[test]
    fn registry_rejects_duplicates() {
        let clusters = vec![valid_cluster(), valid_cluster()];
        assert!(ClusterRegistry::new(clusters).is_err());
    }

    #[test]
    fn registry_lookup_and_names() {
        let mut other = valid_cluster();
        other.name = "prod".to_string();
        let registry = ClusterRegistry::new(vec![valid_cluster(), other]).unwrap();
        assert!(registry.lookup("dev").is_some());
        assert!(registry.lookup("staging").is_none());
        assert_eq!(registry.names(), vec!["dev", "prod"]);
    }

    #[test]
    fn missing_ca_file_is_fatal() {
        let mut cluster = valid_cluster();
        cluster.cluster_ca_path = Some(PathBuf::from("/nonexistent/ca.pem"));
        assert!(matches!(
            cluster.load_certs(),
            Err(ConfigError::CaRead { .. })
        ));
    }

    #[test]
    fn ca_file_read_at_startup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"-----BEGIN CERTIFICATE-----\n").unwrap();
        let mut cluster = valid_cluster();
        cluster.cluster_ca_path = Some(file.path().to_path_buf());
        cluster.load_certs().unwrap();
        assert!(cluster
            .cluster_ca
            .as_deref()
            .unwrap()
            .starts_with(b"-----BEGIN"));
    }

    #[test]
    fn load_applies_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(
            br#"
session_security_key: "0123456789abcdef"
clusters:
  - name: dev
    provider_url: "https://idp.example.com"
    client_id: kubegate
    client_secret: secret
    redirect_url: "https://gate.example.com/callback"
    api_server_url: "https://k8s.example.com:6443"
"#,
        )
        .unwrap();
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.port, 9080);
        assert_eq!(settings.clusters[0].username_claim, "nickname");
        assert_eq!(
            settings.clusters[0].scopes,
            vec!["openid", "profile", "email", "offline_access"]
        );
    }
}
