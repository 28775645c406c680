//! Kubeconfig assembly.
//!
//! Pure construction of a clientcmd v1 `Config` document from a verified
//! user identity. Identical input yields byte-identical YAML: field order is
//! fixed by declaration and the auth-provider block is a sorted map.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::oidc::Claims;

/// Verified identity plus the cluster material needed downstream: the
/// kubeconfig document and the commandline page.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub cluster_name: String,
    pub username: String,
    /// `{username}@{cluster_name}`, the kubeconfig user entry name.
    pub kube_cfg_user: String,
    pub claims: Claims,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub issuer_url: String,
    pub api_server_url: String,
    pub cluster_ca: Option<Vec<u8>>,
    pub trusted_ca: Option<Vec<u8>>,
    pub show_claims: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    pub current_context: String,
    pub users: Vec<NamedUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub server: String,
    #[serde(
        rename = "certificate-authority-data",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub certificate_authority_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub cluster: String,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "auth-provider")]
    pub auth_provider: AuthProvider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthProvider {
    pub name: String,
    pub config: BTreeMap<String, String>,
}

/// Build the kubeconfig document for one authenticated user.
pub fn assemble(info: &UserInfo) -> Kubeconfig {
    let mut config = BTreeMap::new();
    config.insert("client-id".to_string(), info.client_id.clone());
    config.insert("client-secret".to_string(), info.client_secret.clone());
    config.insert("id-token".to_string(), info.id_token.clone());
    config.insert("idp-issuer-url".to_string(), info.issuer_url.clone());
    if let Some(ca) = &info.trusted_ca {
        config.insert(
            "idp-certificate-authority-data".to_string(),
            BASE64.encode(ca),
        );
    }
    if let Some(token) = &info.refresh_token {
        config.insert("refresh-token".to_string(), token.clone());
    }

    Kubeconfig {
        api_version: "v1".to_string(),
        kind: "Config".to_string(),
        clusters: vec![NamedCluster {
            name: info.cluster_name.clone(),
            cluster: Cluster {
                server: info.api_server_url.clone(),
                certificate_authority_data: info.cluster_ca.as_ref().map(|ca| BASE64.encode(ca)),
            },
        }],
        contexts: vec![NamedContext {
            name: info.cluster_name.clone(),
            context: Context {
                cluster: info.cluster_name.clone(),
                user: info.kube_cfg_user.clone(),
            },
        }],
        current_context: info.cluster_name.clone(),
        users: vec![NamedUser {
            name: info.kube_cfg_user.clone(),
            user: User {
                auth_provider: AuthProvider {
                    name: "oidc".to_string(),
                    config,
                },
            },
        }],
    }
}

pub fn to_yaml(config: &Kubeconfig) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(config)
}
